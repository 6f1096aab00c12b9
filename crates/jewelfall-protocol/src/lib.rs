//! Wire protocol for Jewelfall.
//!
//! This crate defines everything that crosses the boundary between the
//! game core and the connections observing it:
//!
//! - **Identity types** ([`RoomId`], [`ConnectionId`], [`Slot`]).
//! - **Intents** ([`ClientIntent`]): what a connection asks the server to do.
//! - **Events** ([`ServerEvent`]): what the server pushes back.
//! - **Replay data** ([`ReplayFrame`], [`Replay`]): the exported record of
//!   a finished game.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): bytes in, typed values out.
//!
//! ```text
//! Transport (frames) → Protocol (Envelope<ClientIntent>) → Room actors
//! Room actors → Protocol (Envelope<ServerEvent>) → Transport (frames)
//! ```

mod codec;
mod error;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{
    ClientIntent, ConnectionId, Direction, EndCause, Envelope, GridSetup,
    GridUpdate, JewelCell, PauseReason, Replay, ReplayFrame, RoomId,
    RoomStatus, RoomSummary, ServerEvent, Slot, ROOM_CAPACITY,
};
