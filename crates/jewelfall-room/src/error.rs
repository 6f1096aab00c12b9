//! Error types for the room layer.

use jewelfall_protocol::{ConnectionId, RoomId, Slot};

/// Reasons a room rejects an intent. None of them change room state.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RoomError {
    #[error("room {0} not found")]
    NotFound(RoomId),

    /// Both player slots are taken.
    #[error("room {0} is full")]
    RoomFull(RoomId),

    /// The requested slot is held by someone else.
    #[error("slot {1} in room {0} is already taken")]
    SlotTaken(RoomId, Slot),

    /// The connection already holds a slot in this room.
    #[error("{0} already plays in room {1}")]
    AlreadyInRoom(ConnectionId, RoomId),

    #[error("{0} is not in room {1}")]
    NotInRoom(ConnectionId, RoomId),

    /// Input for a slot the connection does not hold.
    #[error("{0} does not control slot {1}")]
    NotYourSlot(ConnectionId, Slot),

    #[error("invalid room state for this operation: {0}")]
    InvalidState(String),

    /// The room's actor has stopped or its channel is closed.
    #[error("room {0} is unavailable")]
    Unavailable(RoomId),
}

impl RoomError {
    /// HTTP-style status code reported to the client in an `error` event.
    pub fn code(&self) -> u16 {
        match self {
            Self::NotFound(_) => 404,
            Self::NotInRoom(..) | Self::NotYourSlot(..) => 403,
            Self::RoomFull(_)
            | Self::SlotTaken(..)
            | Self::AlreadyInRoom(..)
            | Self::InvalidState(_) => 409,
            Self::Unavailable(_) => 503,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes() {
        let room = RoomId(1);
        let conn = ConnectionId(9);
        assert_eq!(RoomError::NotFound(room).code(), 404);
        assert_eq!(RoomError::SlotTaken(room, Slot::One).code(), 409);
        assert_eq!(RoomError::NotYourSlot(conn, Slot::Two).code(), 403);
        assert_eq!(RoomError::Unavailable(room).code(), 503);
    }

    #[test]
    fn test_messages_name_ids() {
        let err = RoomError::SlotTaken(RoomId(3), Slot::Two);
        assert_eq!(err.to_string(), "slot 2 in room R-3 is already taken");
    }
}
