//! Per-connection handler: decoding, intent routing and event delivery.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The task owns the receiving end of the connection's event channel;
//! rooms hold the sending end. One `select!` loop covers:
//!   1. Frames from the client → decode, validate, route to a room
//!   2. Events from rooms (and from this handler) → encode, send
//!   3. Registry changes → push a fresh `roomList` once subscribed
//!   4. Keepalive ticker → ping the client
//!   5. Idle timeout → treat as disconnect
//!
//! Any inbound frame, pongs included, pushes the idle deadline back. Every
//! write is bounded by the send timeout: a client that stops reading is
//! dropped instead of stalling its rooms' event queue.
//!
//! On exit the connection leaves every room it joined.

use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;

use jewelfall_protocol::{ClientIntent, Codec, ConnectionId, Envelope, RoomId, ServerEvent};
use jewelfall_room::EventSender;
use jewelfall_transport::{Connection, Frame, TransportError};
use tokio::sync::{mpsc, watch};
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::server::ServerState;
use crate::JewelfallError;

/// What the handler knows about its connection between frames.
struct Session {
    conn_id: ConnectionId,
    events: EventSender,
    rooms: BTreeSet<RoomId>,
    changes: watch::Receiver<u64>,
    /// Set by the first `listRooms`; from then on every registry change
    /// pushes a new list.
    wants_room_list: bool,
}

/// Handles a single connection from accept to close.
///
/// Generic over the connection so the handler can be driven without a
/// socket; the server always passes a `WebSocketConnection`.
pub(crate) async fn handle_connection<C, T>(
    conn: T,
    state: Arc<ServerState<C>>,
) -> Result<(), JewelfallError>
where
    C: Codec,
    T: Connection<Error = TransportError>,
{
    let conn_id = conn.id();
    tracing::debug!(%conn_id, peer = %conn.peer_addr(), "handling new connection");

    let (events_tx, mut events_rx) = mpsc::unbounded_channel::<ServerEvent>();
    let mut session = Session {
        conn_id,
        events: events_tx,
        rooms: BTreeSet::new(),
        changes: state.registry.subscribe(),
        wants_room_list: false,
    };
    let mut seq: u64 = 1;

    let idle = time::sleep(state.idle_timeout);
    tokio::pin!(idle);

    let ping_every = state.ping_interval();
    let mut keepalive = time::interval_at(Instant::now() + ping_every, ping_every);
    keepalive.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let result = loop {
        tokio::select! {
            incoming = conn.recv() => match incoming {
                Ok(Some(frame)) => {
                    idle.as_mut().reset(Instant::now() + state.idle_timeout);
                    if let Frame::Data(data) = frame {
                        session.dispatch(&state, &data).await;
                    }
                }
                Ok(None) => {
                    tracing::info!(%conn_id, "connection closed cleanly");
                    break Ok(());
                }
                Err(e) => {
                    tracing::debug!(%conn_id, error = %e, "recv error");
                    break Err(e.into());
                }
            },

            Some(event) = events_rx.recv() => {
                if let Err(e) = send_event(&conn, &state, &mut seq, &event).await {
                    break Err(e);
                }
            }

            _ = keepalive.tick() => {
                match bounded_write(&state, conn_id, conn.ping()).await {
                    Ok(()) => tracing::trace!(%conn_id, "sent keepalive ping"),
                    Err(e) => break Err(e),
                }
            }

            changed = session.changes.changed(), if session.wants_room_list => {
                if changed.is_ok() {
                    session.push_room_list(&state).await;
                } else {
                    session.wants_room_list = false;
                }
            }

            () = &mut idle => {
                tracing::info!(%conn_id, "connection timed out");
                break Ok(());
            }
        }
    };

    if let Err(JewelfallError::SendTimeout(_)) = &result {
        tracing::info!(%conn_id, "client stopped reading, dropping connection");
    }
    session.leave_all(&state).await;
    if let Err(e) = bounded_write(&state, conn_id, conn.close()).await {
        tracing::debug!(%conn_id, error = %e, "close failed");
    }
    result
}

/// Wraps an event in an envelope and writes it to the connection.
async fn send_event<C, T>(
    conn: &T,
    state: &ServerState<C>,
    seq: &mut u64,
    event: &ServerEvent,
) -> Result<(), JewelfallError>
where
    C: Codec,
    T: Connection<Error = TransportError>,
{
    let envelope = Envelope::new(next_seq(seq), state.uptime_ms(), event);
    let bytes = state.codec.encode(&envelope)?;
    tracing::trace!(conn_id = %conn.id(), event = event.name(), "sending event");
    bounded_write(state, conn.id(), conn.send(&bytes)).await
}

/// Runs one write under the send timeout.
async fn bounded_write<C, F>(
    state: &ServerState<C>,
    conn_id: ConnectionId,
    write: F,
) -> Result<(), JewelfallError>
where
    C: Codec,
    F: Future<Output = Result<(), TransportError>>,
{
    match time::timeout(state.send_timeout, write).await {
        Ok(result) => Ok(result?),
        Err(_) => Err(JewelfallError::SendTimeout(conn_id)),
    }
}

impl Session {
    /// Decodes one frame and acts on it. Every failure becomes an `error`
    /// event for this connection.
    async fn dispatch<C: Codec>(&mut self, state: &ServerState<C>, data: &[u8]) {
        let envelope: Envelope<ClientIntent> = match state.codec.decode(data) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::debug!(conn_id = %self.conn_id, error = %e, "failed to decode intent");
                self.reject(&JewelfallError::from(e));
                return;
            }
        };

        let intent = envelope.body;
        let result = match intent.validate() {
            Ok(()) => self.handle_intent(state, intent).await,
            Err(e) => Err(JewelfallError::from(e)),
        };
        if let Err(e) = result {
            tracing::debug!(conn_id = %self.conn_id, error = %e, "intent rejected");
            self.reject(&e);
        }
    }

    async fn handle_intent<C: Codec>(
        &mut self,
        state: &ServerState<C>,
        intent: ClientIntent,
    ) -> Result<(), JewelfallError> {
        let registry = &state.registry;
        match intent {
            ClientIntent::ListRooms => {
                self.wants_room_list = true;
                self.changes.borrow_and_update();
                self.push_room_list(state).await;
            }
            ClientIntent::CreateRoom { name, description } => {
                let room_id = registry.create(name, description).await;
                self.send(ServerEvent::RoomCreated { room_id });
            }
            ClientIntent::JoinAsPlayer {
                room_id,
                display_name,
                slot,
            } => {
                registry
                    .get(room_id)
                    .await?
                    .join_player(self.conn_id, display_name, slot, self.events.clone())
                    .await?;
                self.rooms.insert(room_id);
            }
            ClientIntent::JoinAsViewer { room_id } => {
                registry
                    .get(room_id)
                    .await?
                    .join_viewer(self.conn_id, self.events.clone())
                    .await?;
                self.rooms.insert(room_id);
            }
            ClientIntent::Input {
                room_id,
                slot,
                direction,
            } => {
                registry
                    .get(room_id)
                    .await?
                    .input(self.conn_id, slot, direction)
                    .await?;
            }
            ClientIntent::RequestFullState { room_id } => {
                registry
                    .get(room_id)
                    .await?
                    .request_full_state(self.events.clone())
                    .await?;
            }
            ClientIntent::LeaveRoom { room_id } => {
                let room = registry.get(room_id).await?;
                self.rooms.remove(&room_id);
                room.leave(self.conn_id).await?;
            }
            ClientIntent::Heartbeat { client_time } => {
                self.send(ServerEvent::HeartbeatAck {
                    client_time,
                    server_time: state.uptime_ms(),
                });
            }
        }
        Ok(())
    }

    async fn push_room_list<C: Codec>(&self, state: &ServerState<C>) {
        let rooms = state.registry.list().await;
        self.send(ServerEvent::RoomList { rooms });
    }

    /// Leaves every joined room. A room that is already gone is skipped.
    async fn leave_all<C: Codec>(&mut self, state: &ServerState<C>) {
        for room_id in std::mem::take(&mut self.rooms) {
            let Ok(room) = state.registry.get(room_id).await else {
                continue;
            };
            if let Err(e) = room.leave(self.conn_id).await {
                tracing::debug!(conn_id = %self.conn_id, %room_id, error = %e, "leave on disconnect failed");
            }
        }
    }

    fn reject(&self, error: &JewelfallError) {
        self.send(ServerEvent::Error {
            code: error.code(),
            message: error.to_string(),
        });
    }

    fn send(&self, event: ServerEvent) {
        // The receiver lives in this connection's task.
        let _ = self.events.send(event);
    }
}

/// Increments and returns the next sequence number.
fn next_seq(seq: &mut u64) -> u64 {
    let current = *seq;
    *seq += 1;
    current
}
