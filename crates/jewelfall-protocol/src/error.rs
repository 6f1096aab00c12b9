//! Error types for the protocol layer.

/// Errors that can occur while encoding, decoding or validating messages.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed.
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed: malformed JSON, an unknown intent tag,
    /// a missing field, or a value out of range (e.g. slot 3).
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The message decoded fine but breaks a protocol rule,
    /// such as an empty room name.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}

impl ProtocolError {
    /// HTTP-style status code reported to the client in an `error` event.
    pub fn code(&self) -> u16 {
        400
    }
}
