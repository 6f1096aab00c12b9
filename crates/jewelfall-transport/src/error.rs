//! Error types for the transport layer.

/// Errors raised while accepting, reading from or writing to a connection.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The peer is gone or the connection was already closed locally.
    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    #[error("send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] std::io::Error),

    /// Binding the listener or accepting a socket failed.
    #[error("accept failed: {0}")]
    AcceptFailed(#[source] std::io::Error),

    /// The TCP connection was accepted but the WebSocket upgrade failed.
    #[error("handshake with {peer} failed: {reason}")]
    Handshake { peer: std::net::SocketAddr, reason: String },
}

impl TransportError {
    /// Wraps a lower-level failure as an I/O error of the given kind.
    pub(crate) fn io<E>(kind: std::io::ErrorKind, err: E) -> std::io::Error
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        std::io::Error::new(kind, err)
    }
}
