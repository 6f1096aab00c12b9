//! # Jewelfall
//!
//! A server for two-player jewel falling-block matches. Each room holds
//! two players and any number of viewers; the room simulates both boards
//! on its own clock and streams every change to everyone watching.
//!
//! The server ties the layers together:
//! transport (WebSocket frames) → protocol (JSON intents and events) →
//! rooms (one actor per room).
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use jewelfall::prelude::*;
//!
//! # async fn run() -> Result<(), JewelfallError> {
//! let server = JewelfallServer::builder()
//!     .bind("0.0.0.0:8080")
//!     .build()
//!     .await?;
//! server.run().await
//! # }
//! ```

mod config;
mod error;
mod handler;
mod server;

pub use config::ServerConfig;
pub use error::JewelfallError;
pub use server::{JewelfallServer, JewelfallServerBuilder, RoomSweeper};

/// Everything needed to run a server or talk to one from Rust.
pub mod prelude {
    pub use crate::{
        JewelfallError, JewelfallServer, JewelfallServerBuilder, RoomSweeper, ServerConfig,
    };

    pub use jewelfall_protocol::{
        ClientIntent, Codec, ConnectionId, Direction, EndCause, Envelope, GridSetup, GridUpdate,
        JewelCell, JsonCodec, PauseReason, ProtocolError, Replay, ReplayFrame, RoomId,
        RoomStatus, RoomSummary, ServerEvent, Slot,
    };
    pub use jewelfall_room::{LoggingReplayStore, ReplayStore, RoomConfig, RoomError, RoomRegistry};
    pub use jewelfall_tick::TickPolicy;
    pub use jewelfall_transport::TransportError;
}
