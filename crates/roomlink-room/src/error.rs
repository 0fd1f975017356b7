//! Error types for the room layer.

use roomlink_transport::TransportError;

/// Errors that can occur while opening a room.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    /// `create` was called on a room that is already open.
    #[error("room is already open")]
    AlreadyOpen,

    /// The bind address doesn't parse or resolve.
    #[error("invalid bind address: {0}")]
    InvalidAddress(String),

    /// The listening endpoint couldn't be set up.
    #[error("failed to bind room endpoint: {0}")]
    Bind(#[source] TransportError),

    /// The worker thread or its runtime couldn't be started.
    #[error("failed to start room worker: {0}")]
    Runtime(#[source] std::io::Error),
}
