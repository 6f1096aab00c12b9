//! Codec trait and implementations for serializing/deserializing messages.
//!
//! A "codec" (coder/decoder) turns Rust values into raw bytes and back.
//! The server never calls `serde_json` directly: it holds some `C: Codec`
//! and asks it to encode an `Envelope<ServerEvent>` or decode an
//! `Envelope<ClientIntent>`. Swapping the wire format means writing one
//! more implementation of the trait; nothing else changes.
//!
//! JSON is the one implementation today because every observer (browser
//! client, Unity visualizer) already speaks it. It sits behind the `json`
//! feature, which is on by default.

use serde::{de::DeserializeOwned, Serialize};

use crate::ProtocolError;

/// Encodes Rust values to bytes and decodes bytes back.
///
/// ## Trait bounds
///
/// - `Send + Sync`: one codec is shared by every connection task, and
///   Tokio may run those tasks on any worker thread.
/// - `'static`: the codec owns everything it needs, so it can live inside
///   the `Arc` the server hands to each spawned task.
///
/// ## Why the methods are generic
///
/// `encode<T: Serialize>` accepts any serializable value, and
/// `decode<T: DeserializeOwned>` builds any deserializable one. The caller
/// picks `T` at the call site, usually through a type annotation:
///
/// ```rust,ignore
/// let envelope: Envelope<ClientIntent> = codec.decode(&frame)?;
/// ```
///
/// `DeserializeOwned` rather than `Deserialize<'de>` means the decoded
/// value copies what it needs out of the input. The frame buffer can be
/// dropped as soon as `decode` returns.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if serialization fails.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the bytes are malformed or do
    /// not match the expected shape.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError>;
}

/// A [`Codec`] backed by `serde_json`.
///
/// ```rust
/// use jewelfall_protocol::{ClientIntent, Codec, Envelope, JsonCodec};
///
/// let codec = JsonCodec;
/// let envelope = Envelope::new(1, 250, ClientIntent::ListRooms);
///
/// let bytes = codec.encode(&envelope).unwrap();
/// let decoded: Envelope<ClientIntent> = codec.decode(&bytes).unwrap();
/// assert_eq!(envelope, decoded);
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}

#[cfg(all(test, feature = "json"))]
mod tests {
    use super::*;
    use crate::{ClientIntent, Direction, Envelope, RoomId, Slot};

    #[test]
    fn test_decode_input_intent_from_client_json() {
        let raw = br#"{"seq":4,"timestamp":900,"body":{"intent":"input","roomId":3,"slot":2,"direction":"rotate"}}"#;
        let env: Envelope<ClientIntent> = JsonCodec.decode(raw).unwrap();
        assert_eq!(env.seq, 4);
        assert_eq!(
            env.body,
            ClientIntent::Input {
                room_id: RoomId(3),
                slot: Slot::Two,
                direction: Direction::Rotate,
            }
        );
    }

    #[test]
    fn test_decode_garbage_is_decode_error() {
        let result: Result<Envelope<ClientIntent>, _> = JsonCodec.decode(b"not json");
        assert!(matches!(result, Err(ProtocolError::Decode(_))));
    }
}
