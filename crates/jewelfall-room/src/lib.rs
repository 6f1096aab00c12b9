//! Rooms for Jewelfall.
//!
//! Each room runs as an isolated Tokio task (actor) that owns two boards,
//! the list of who is watching, and its own gravity clock.
//!
//! # Key types
//!
//! - [`RoomRegistry`]: creates, lists and destroys rooms
//! - [`RoomHandle`]: sends commands to a running room actor
//! - [`BroadcastGateway`]: per-room fan-out of events to connections
//! - [`Match`]: the pure two-board simulation a room drives
//! - [`ReplayRecorder`] / [`ReplayStore`]: capture and hand-off of finished games
//! - [`RoomConfig`]: tick rate, channel size, seeding

mod config;
mod error;
mod game;
mod gateway;
mod registry;
mod replay;
mod room;

pub use config::RoomConfig;
pub use error::RoomError;
pub use game::{Match, SlotTick};
pub use gateway::{BroadcastGateway, EventSender};
pub use registry::RoomRegistry;
pub use replay::{LoggingReplayStore, ReplayRecorder, ReplayStore};
pub use room::RoomHandle;
