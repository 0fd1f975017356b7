use std::time::Duration;

use crate::ConnectionId;

/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Binding the listening socket failed.
    #[error("bind failed: {0}")]
    BindFailed(#[source] std::io::Error),

    /// The host name or address could not be resolved.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// The TCP connection could not be established.
    #[error("connect failed: {0}")]
    ConnectFailed(#[source] std::io::Error),

    /// The server didn't complete the connection in time.
    #[error("connect timed out after {0:?}")]
    ConnectTimedOut(Duration),

    /// The WebSocket upgrade was refused or cut short.
    #[error("handshake failed: {0}")]
    Handshake(#[source] std::io::Error),

    /// No connected peer has this id.
    #[error("unknown peer {0}")]
    UnknownPeer(ConnectionId),

    /// The peer's connection is gone.
    #[error("connection closed: {0}")]
    ConnectionClosed(ConnectionId),

    /// The host can no longer produce events.
    #[error("endpoint closed")]
    EndpointClosed,
}
