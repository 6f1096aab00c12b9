//! Unified error type for the server.

use jewelfall_protocol::{ConnectionId, ProtocolError};
use jewelfall_room::RoomError;
use jewelfall_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// `#[from]` on each variant lets `?` convert sub-crate errors.
#[derive(Debug, thiserror::Error)]
pub enum JewelfallError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Room(#[from] RoomError),

    /// A write to the client did not finish within the send timeout.
    #[error("send to {0} timed out")]
    SendTimeout(ConnectionId),

    /// A configuration value could not be used.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl JewelfallError {
    /// Status code carried by the `error` event sent to a client.
    pub fn code(&self) -> u16 {
        match self {
            Self::Protocol(e) => e.code(),
            Self::Room(e) => e.code(),
            Self::Transport(_) | Self::SendTimeout(_) | Self::Config(_) => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jewelfall_protocol::{RoomId, Slot};

    #[test]
    fn test_from_transport_error() {
        let err: JewelfallError = TransportError::ConnectionClosed("gone".into()).into();
        assert!(matches!(err, JewelfallError::Transport(_)));
        assert!(err.to_string().contains("gone"));
        assert_eq!(err.code(), 500);
    }

    #[test]
    fn test_send_timeout_names_connection() {
        let err = JewelfallError::SendTimeout(ConnectionId(9));
        assert_eq!(err.code(), 500);
        assert!(err.to_string().contains('9'));
    }

    #[test]
    fn test_protocol_errors_are_bad_requests() {
        let err: JewelfallError = ProtocolError::InvalidMessage("bad".into()).into();
        assert_eq!(err.code(), 400);
    }

    #[test]
    fn test_room_error_codes_pass_through() {
        let not_found: JewelfallError = RoomError::NotFound(RoomId(1)).into();
        assert_eq!(not_found.code(), 404);

        let not_yours: JewelfallError = RoomError::NotYourSlot(ConnectionId(3), Slot::One).into();
        assert_eq!(not_yours.code(), 403);
    }
}
