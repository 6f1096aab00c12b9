//! Room registry: creates, finds, lists and destroys rooms.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use jewelfall_protocol::{RoomId, RoomSummary};
use tokio::sync::{watch, RwLock};

use crate::replay::ReplayStore;
use crate::room::{spawn_room, RoomSpawn};
use crate::{RoomConfig, RoomError, RoomHandle};

/// Publishes a generation counter that moves whenever the room list
/// would look different.
///
/// A `watch` channel keeps only the latest value. Subscribers don't get one
/// message per change; they get woken and see the newest generation. That
/// is what `roomList` pushes want: ten changes in a burst produce one fresh
/// list, not ten.
///
/// Rooms hold a clone of the notifier and bump it after membership or
/// status changes. The `Arc` lets every clone share the one sender.
#[derive(Clone, Debug)]
pub(crate) struct ChangeNotifier(Arc<watch::Sender<u64>>);

impl ChangeNotifier {
    fn new() -> Self {
        let (tx, _) = watch::channel(0);
        Self(Arc::new(tx))
    }

    pub(crate) fn bump(&self) {
        self.0.send_modify(|generation| *generation = generation.wrapping_add(1));
    }

    fn subscribe(&self) -> watch::Receiver<u64> {
        self.0.subscribe()
    }
}

/// All live rooms of a server.
///
/// Owned by the server root and shared behind an `Arc`. Ids come from a
/// per-registry counter and are never reused.
///
/// The map sits behind a Tokio `RwLock`: lookups (every intent that names
/// a room) take the read side and run concurrently, while only create and
/// destroy take the write side. The lock guards the map alone. Talking to
/// a room goes through its cloned [`RoomHandle`] after the lock is
/// released.
pub struct RoomRegistry {
    rooms: RwLock<BTreeMap<RoomId, RoomHandle>>,
    next_id: AtomicU64,
    config: RoomConfig,
    replays: Arc<dyn ReplayStore>,
    changes: ChangeNotifier,
}

impl RoomRegistry {
    pub fn new(config: RoomConfig, replays: Arc<dyn ReplayStore>) -> Self {
        Self {
            rooms: RwLock::new(BTreeMap::new()),
            next_id: AtomicU64::new(1),
            config,
            replays,
            changes: ChangeNotifier::new(),
        }
    }

    /// Creates an empty room in `waiting`.
    pub async fn create(&self, name: String, description: String) -> RoomId {
        let room_id = RoomId(self.next_id.fetch_add(1, Ordering::Relaxed));
        tracing::info!(%room_id, %name, "room created");
        let handle = spawn_room(
            room_id,
            RoomSpawn {
                name,
                description,
                config: self.config.clone(),
                replays: Arc::clone(&self.replays),
                changes: self.changes.clone(),
            },
        );
        self.rooms.write().await.insert(room_id, handle);
        self.changes.bump();
        room_id
    }

    pub async fn get(&self, room_id: RoomId) -> Result<RoomHandle, RoomError> {
        self.rooms
            .read()
            .await
            .get(&room_id)
            .cloned()
            .ok_or(RoomError::NotFound(room_id))
    }

    /// Summaries of every room, ordered by id. Rooms that stop responding
    /// mid-listing are left out.
    pub async fn list(&self) -> Vec<RoomSummary> {
        let handles: Vec<RoomHandle> = self.rooms.read().await.values().cloned().collect();
        let mut summaries = Vec::with_capacity(handles.len());
        for handle in handles {
            if let Ok(summary) = handle.summary().await {
                summaries.push(summary);
            }
        }
        summaries
    }

    /// Stops a room's actor and forgets the room.
    pub async fn destroy(&self, room_id: RoomId) -> Result<(), RoomError> {
        let handle = self
            .rooms
            .write()
            .await
            .remove(&room_id)
            .ok_or(RoomError::NotFound(room_id))?;
        let _ = handle.shutdown().await;
        self.changes.bump();
        tracing::info!(%room_id, "room destroyed");
        Ok(())
    }

    /// A receiver whose value changes every time the room list does.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.changes.subscribe()
    }

    pub async fn room_count(&self) -> usize {
        self.rooms.read().await.len()
    }
}

impl std::fmt::Debug for RoomRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoomRegistry")
            .field("next_id", &self.next_id)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
