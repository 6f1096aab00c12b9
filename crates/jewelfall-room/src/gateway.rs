//! Fan-out of room events to the connections watching a room.

use std::collections::BTreeMap;

use jewelfall_protocol::{ConnectionId, RoomId, ServerEvent};
use tokio::sync::mpsc;

/// Outbound event channel of one connection.
///
/// Unbounded so a broadcast never waits on a slow reader. The connection
/// side bounds each socket write with a timeout and drops a client that
/// stops reading, which closes the channel.
pub type EventSender = mpsc::UnboundedSender<ServerEvent>;

/// Per-room delivery to viewers and players.
///
/// A connection may be a viewer, a player, or both. [`to_all`](Self::to_all)
/// delivers once per connection. Delivery is best effort: a send to a
/// closed connection is logged and skipped.
#[derive(Debug)]
pub struct BroadcastGateway {
    room_id: RoomId,
    viewers: BTreeMap<ConnectionId, EventSender>,
    players: BTreeMap<ConnectionId, EventSender>,
}

impl BroadcastGateway {
    pub fn new(room_id: RoomId) -> Self {
        Self {
            room_id,
            viewers: BTreeMap::new(),
            players: BTreeMap::new(),
        }
    }

    /// Returns `false` if the connection was already a viewer.
    pub fn add_viewer(&mut self, conn: ConnectionId, events: EventSender) -> bool {
        self.viewers.insert(conn, events).is_none()
    }

    /// Returns `false` if the connection was not a viewer.
    pub fn remove_viewer(&mut self, conn: ConnectionId) -> bool {
        self.viewers.remove(&conn).is_some()
    }

    pub fn add_player(&mut self, conn: ConnectionId, events: EventSender) {
        self.players.insert(conn, events);
    }

    pub fn remove_player(&mut self, conn: ConnectionId) -> bool {
        self.players.remove(&conn).is_some()
    }

    pub fn is_viewer(&self, conn: ConnectionId) -> bool {
        self.viewers.contains_key(&conn)
    }

    pub fn viewer_count(&self) -> usize {
        self.viewers.len()
    }

    pub fn to_viewers(&self, event: &ServerEvent) {
        for (conn, tx) in &self.viewers {
            self.deliver(*conn, tx, event.clone());
        }
    }

    pub fn to_all(&self, event: &ServerEvent) {
        self.to_viewers(event);
        for (conn, tx) in &self.players {
            if !self.viewers.contains_key(conn) {
                self.deliver(*conn, tx, event.clone());
            }
        }
    }

    /// Drops every member.
    pub fn clear(&mut self) {
        self.viewers.clear();
        self.players.clear();
    }

    fn deliver(&self, conn: ConnectionId, tx: &EventSender, event: ServerEvent) {
        let name = event.name();
        if tx.send(event).is_err() {
            tracing::debug!(
                room_id = %self.room_id,
                %conn,
                event = name,
                "connection closed, event dropped"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc::error::TryRecvError;

    fn channel() -> (EventSender, mpsc::UnboundedReceiver<ServerEvent>) {
        mpsc::unbounded_channel()
    }

    #[test]
    fn test_to_all_delivers_once_per_connection() {
        let mut gw = BroadcastGateway::new(RoomId(1));
        let (tx, mut rx) = channel();
        gw.add_viewer(ConnectionId(1), tx.clone());
        gw.add_player(ConnectionId(1), tx);

        gw.to_all(&ServerEvent::GameResumed);
        assert_eq!(rx.try_recv().unwrap(), ServerEvent::GameResumed);
        assert_eq!(rx.try_recv(), Err(TryRecvError::Empty));
    }

    #[test]
    fn test_viewer_broadcast_skips_players() {
        let mut gw = BroadcastGateway::new(RoomId(1));
        let (vtx, mut vrx) = channel();
        let (ptx, mut prx) = channel();
        gw.add_viewer(ConnectionId(1), vtx);
        gw.add_player(ConnectionId(2), ptx);

        gw.to_viewers(&ServerEvent::GameResumed);
        assert!(vrx.try_recv().is_ok());
        assert!(prx.try_recv().is_err());

        gw.to_all(&ServerEvent::GameResumed);
        assert!(vrx.try_recv().is_ok());
        assert!(prx.try_recv().is_ok());
    }

    #[test]
    fn test_closed_connection_does_not_block_others() {
        let mut gw = BroadcastGateway::new(RoomId(1));
        let (dead_tx, dead_rx) = channel();
        drop(dead_rx);
        let (tx, mut rx) = channel();
        gw.add_viewer(ConnectionId(1), dead_tx);
        gw.add_viewer(ConnectionId(2), tx);

        gw.to_all(&ServerEvent::GameResumed);
        assert_eq!(rx.try_recv().unwrap(), ServerEvent::GameResumed);
    }

    #[test]
    fn test_viewer_add_and_remove_are_idempotent() {
        let mut gw = BroadcastGateway::new(RoomId(1));
        let (tx, _rx) = channel();
        assert!(gw.add_viewer(ConnectionId(4), tx.clone()));
        assert!(!gw.add_viewer(ConnectionId(4), tx));
        assert_eq!(gw.viewer_count(), 1);
        assert!(gw.remove_viewer(ConnectionId(4)));
        assert!(!gw.remove_viewer(ConnectionId(4)));
        assert_eq!(gw.viewer_count(), 0);
    }
}
