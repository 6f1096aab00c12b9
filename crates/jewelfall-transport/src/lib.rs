//! Transport layer for Jewelfall.
//!
//! A [`Transport`] hands out [`Connection`]s; a connection moves whole
//! frames in both directions. Rooms never see connections directly. The
//! server pumps frames between a connection and its event channel.
//!
//! # Feature Flags
//!
//! - `websocket` (default): WebSocket transport via `tokio-tungstenite`

#![allow(async_fn_in_trait)]

mod error;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
pub use jewelfall_protocol::ConnectionId;
#[cfg(feature = "websocket")]
pub use websocket::{WebSocketConnection, WebSocketTransport};

use std::net::SocketAddr;

/// One inbound frame as seen by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// A text or binary payload.
    Data(Vec<u8>),
    /// A ping or pong. Carries nothing for the server but proves the
    /// peer is still there.
    Keepalive,
}

/// Accepts new incoming connections.
pub trait Transport: Send + Sync + 'static {
    type Connection: Connection;
    type Error: std::error::Error + Send + Sync;

    /// Waits for the next connection and completes its handshake.
    async fn accept(&mut self) -> Result<Self::Connection, Self::Error>;

    /// Address the transport listens on.
    fn local_addr(&self) -> std::io::Result<SocketAddr>;
}

/// One client connection.
///
/// `send` and `recv` may run concurrently from different tasks.
pub trait Connection: Send + Sync + 'static {
    type Error: std::error::Error + Send + Sync;

    /// Sends one frame. UTF-8 payloads go out as text frames, anything
    /// else as binary.
    async fn send(&self, data: &[u8]) -> Result<(), Self::Error>;

    /// Receives the next frame. Pings and pongs come back as
    /// [`Frame::Keepalive`] so callers can count them as activity.
    ///
    /// Returns `Ok(None)` once the peer has closed the connection.
    async fn recv(&self) -> Result<Option<Frame>, Self::Error>;

    /// Sends a ping. A live peer answers with a pong, which shows up in
    /// [`recv`](Self::recv) as [`Frame::Keepalive`].
    async fn ping(&self) -> Result<(), Self::Error>;

    async fn close(&self) -> Result<(), Self::Error>;

    fn id(&self) -> ConnectionId;

    fn peer_addr(&self) -> SocketAddr;
}
