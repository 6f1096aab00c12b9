//! `JewelfallServer` builder and server loop.
//!
//! This is the entry point for running a game server. It ties together
//! the layers: transport → protocol → rooms.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use jewelfall_protocol::{Codec, JsonCodec, RoomId, RoomStatus};
use jewelfall_room::{LoggingReplayStore, ReplayStore, RoomConfig, RoomRegistry};
use jewelfall_transport::{Transport, TransportError, WebSocketTransport};
use tokio::time::{Instant, MissedTickBehavior};

use crate::handler::handle_connection;
use crate::{JewelfallError, ServerConfig};

/// Shared server state passed to each connection handler task.
pub(crate) struct ServerState<C: Codec> {
    pub(crate) registry: Arc<RoomRegistry>,
    pub(crate) codec: C,
    pub(crate) idle_timeout: Duration,
    pub(crate) send_timeout: Duration,
    started: Instant,
}

impl<C: Codec> ServerState<C> {
    pub(crate) fn new(registry: Arc<RoomRegistry>, codec: C, config: &ServerConfig) -> Self {
        Self {
            registry,
            codec,
            idle_timeout: config.idle_timeout,
            send_timeout: config.send_timeout,
            started: Instant::now(),
        }
    }

    /// How often the handler pings its client: three times per idle
    /// period, so a peer that answers pings is never timed out.
    pub(crate) fn ping_interval(&self) -> Duration {
        (self.idle_timeout / 3).max(Duration::from_millis(1))
    }

    /// Milliseconds since the server started. Used for envelope
    /// timestamps and heartbeat replies.
    pub(crate) fn uptime_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }
}

/// Builder for configuring and starting a server.
///
/// # Example
///
/// ```rust,ignore
/// use jewelfall::prelude::*;
///
/// let server = JewelfallServer::builder()
///     .bind("0.0.0.0:8080")
///     .idle_timeout(Duration::from_secs(60))
///     .build()
///     .await?;
/// server.run().await
/// ```
pub struct JewelfallServerBuilder {
    config: ServerConfig,
    replays: Option<Arc<dyn ReplayStore>>,
}

impl JewelfallServerBuilder {
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
            replays: None,
        }
    }

    /// Replaces the whole configuration, e.g. one read by
    /// [`ServerConfig::from_env`].
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn bind(mut self, addr: &str) -> Self {
        self.config.bind_addr = addr.to_string();
        self
    }

    pub fn room_config(mut self, room: RoomConfig) -> Self {
        self.config.room = room;
        self
    }

    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.config.idle_timeout = timeout;
        self
    }

    /// Longest a single write to a client may block before the connection
    /// is dropped.
    pub fn send_timeout(mut self, timeout: Duration) -> Self {
        self.config.send_timeout = timeout;
        self
    }

    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        self.config.sweep_interval = interval;
        self
    }

    /// Where finished games go. Defaults to [`LoggingReplayStore`].
    pub fn replay_store(mut self, store: Arc<dyn ReplayStore>) -> Self {
        self.replays = Some(store);
        self
    }

    /// Binds the listener. Uses `JsonCodec` and `WebSocketTransport`.
    pub async fn build(self) -> Result<JewelfallServer<JsonCodec>, JewelfallError> {
        let config = &self.config;
        if config.idle_timeout.is_zero()
            || config.send_timeout.is_zero()
            || config.sweep_interval.is_zero()
        {
            return Err(JewelfallError::Config(
                "idle timeout, send timeout and sweep interval must be non-zero".into(),
            ));
        }
        let transport = WebSocketTransport::bind(&self.config.bind_addr).await?;

        let replays = self
            .replays
            .unwrap_or_else(|| Arc::new(LoggingReplayStore));
        let registry = Arc::new(RoomRegistry::new(self.config.room.clone(), replays));
        let state = Arc::new(ServerState::new(registry, JsonCodec, &self.config));

        Ok(JewelfallServer {
            transport,
            state,
            sweep_interval: self.config.sweep_interval,
        })
    }
}

impl Default for JewelfallServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound game server. Call [`run()`](Self::run) to start accepting
/// connections.
pub struct JewelfallServer<C: Codec> {
    transport: WebSocketTransport,
    state: Arc<ServerState<C>>,
    sweep_interval: Duration,
}

impl JewelfallServer<JsonCodec> {
    pub fn builder() -> JewelfallServerBuilder {
        JewelfallServerBuilder::new()
    }
}

impl<C: Codec> JewelfallServer<C> {
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// The room registry, shared with every connection.
    pub fn registry(&self) -> Arc<RoomRegistry> {
        Arc::clone(&self.state.registry)
    }

    /// Runs the accept loop and the cleanup sweep.
    ///
    /// Each accepted connection gets its own task. A failed accept or
    /// handshake is logged and the loop keeps going, so this only returns
    /// when the process is terminated.
    pub async fn run(mut self) -> Result<(), JewelfallError> {
        tracing::info!(addr = ?self.local_addr().ok(), "Jewelfall server running");

        let registry = Arc::clone(&self.state.registry);
        let sweep_interval = self.sweep_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(sweep_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;
            let mut sweeper = RoomSweeper::new();
            loop {
                ticker.tick().await;
                sweeper.sweep(&registry).await;
            }
        });

        loop {
            match self.transport.accept().await {
                Ok(conn) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(conn, state).await {
                            tracing::debug!(error = %e, "connection ended with error");
                        }
                    });
                }
                Err(e @ TransportError::Handshake { .. }) => {
                    tracing::debug!(error = %e, "WebSocket handshake failed");
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}

/// Periodic cleanup of rooms nobody is using.
///
/// A `finished` room with no players and no viewers goes on the first
/// sweep that sees it. A `waiting` room that is empty is only marked; if
/// it is still empty (and still waiting) at the next sweep it goes too.
/// That gives whoever created it one full interval to join.
#[derive(Debug, Default)]
pub struct RoomSweeper {
    empty_waiting: BTreeSet<RoomId>,
}

impl RoomSweeper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs one sweep over `registry`. Returns how many rooms went away.
    pub async fn sweep(&mut self, registry: &RoomRegistry) -> usize {
        let mut removed = 0;
        let mut still_empty = BTreeSet::new();
        for summary in registry.list().await {
            if summary.player_count > 0 || summary.viewer_count > 0 {
                continue;
            }
            let reclaim = match summary.status {
                RoomStatus::Finished => true,
                RoomStatus::Waiting => {
                    still_empty.insert(summary.room_id);
                    self.empty_waiting.contains(&summary.room_id)
                }
                _ => false,
            };
            if reclaim && registry.destroy(summary.room_id).await.is_ok() {
                still_empty.remove(&summary.room_id);
                removed += 1;
            }
        }
        self.empty_waiting = still_empty;
        if removed > 0 {
            tracing::info!(removed, "swept abandoned rooms");
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jewelfall_protocol::{ConnectionId, ServerEvent};
    use tokio::sync::mpsc;

    fn registry() -> RoomRegistry {
        RoomRegistry::new(RoomConfig::default(), Arc::new(LoggingReplayStore))
    }

    #[tokio::test]
    async fn test_sweep_keeps_occupied_rooms() {
        let registry = registry();
        let room_id = registry.create("lobby".into(), String::new()).await;
        let (tx, _rx) = mpsc::unbounded_channel::<ServerEvent>();
        let room = registry.get(room_id).await.unwrap();
        room.join_player(ConnectionId(1), "ada".into(), None, tx).await.unwrap();

        let mut sweeper = RoomSweeper::new();
        assert_eq!(sweeper.sweep(&registry).await, 0);
        assert_eq!(sweeper.sweep(&registry).await, 0);
        assert_eq!(registry.room_count().await, 1);
    }

    #[tokio::test]
    async fn test_empty_waiting_room_survives_one_sweep() {
        let registry = registry();
        let room_id = registry.create("empty".into(), String::new()).await;

        let mut sweeper = RoomSweeper::new();
        assert_eq!(sweeper.sweep(&registry).await, 0);
        assert_eq!(registry.room_count().await, 1);

        assert_eq!(sweeper.sweep(&registry).await, 1);
        assert!(registry.get(room_id).await.is_err());
    }

    #[tokio::test]
    async fn test_room_joined_between_sweeps_is_kept() {
        let registry = registry();
        let room_id = registry.create("soon".into(), String::new()).await;
        let mut sweeper = RoomSweeper::new();
        sweeper.sweep(&registry).await;

        let (tx, _rx) = mpsc::unbounded_channel::<ServerEvent>();
        let room = registry.get(room_id).await.unwrap();
        room.join_player(ConnectionId(1), "ada".into(), None, tx).await.unwrap();
        assert_eq!(sweeper.sweep(&registry).await, 0);

        // Emptied again: the mark starts over.
        room.leave(ConnectionId(1)).await.unwrap();
        assert_eq!(sweeper.sweep(&registry).await, 0);
        assert_eq!(sweeper.sweep(&registry).await, 1);
    }

    #[tokio::test]
    async fn test_sweep_removes_finished_empty_room() {
        let registry = registry();
        let room_id = registry.create("done".into(), String::new()).await;
        let room = registry.get(room_id).await.unwrap();
        let (tx, _rx) = mpsc::unbounded_channel::<ServerEvent>();

        room.join_player(ConnectionId(1), "ada".into(), None, tx.clone()).await.unwrap();
        room.join_player(ConnectionId(2), "bob".into(), None, tx.clone()).await.unwrap();
        room.join_viewer(ConnectionId(3), tx.clone()).await.unwrap();
        // Forfeit ends the match.
        room.leave(ConnectionId(1)).await.unwrap();

        // The winner and the viewer are still inside.
        let mut sweeper = RoomSweeper::new();
        assert_eq!(sweeper.sweep(&registry).await, 0);

        room.leave(ConnectionId(2)).await.unwrap();
        room.leave(ConnectionId(3)).await.unwrap();
        assert_eq!(sweeper.sweep(&registry).await, 1);
        assert_eq!(registry.room_count().await, 0);
    }

    #[tokio::test]
    async fn test_build_rejects_zero_timeout() {
        let result = JewelfallServer::builder()
            .bind("127.0.0.1:0")
            .idle_timeout(Duration::ZERO)
            .build()
            .await;
        assert!(matches!(result, Err(JewelfallError::Config(_))));
    }

    #[tokio::test]
    async fn test_ping_interval_is_a_third_of_idle() {
        let config = ServerConfig {
            idle_timeout: Duration::from_millis(900),
            ..ServerConfig::default()
        };
        let state = ServerState::new(Arc::new(registry()), JsonCodec, &config);
        assert_eq!(state.ping_interval(), Duration::from_millis(300));
    }
}
