//! Error types for the member layer.

use roomlink_transport::TransportError;

/// Errors returned by [`RoomMember`](crate::RoomMember) operations.
#[derive(Debug, thiserror::Error)]
pub enum MemberError {
    /// The operation needs a connection (joining or joined).
    #[error("not connected to a room")]
    NotConnected,

    /// The operation needs a completed join.
    #[error("not joined to a room")]
    NotJoined,

    /// The message couldn't be queued for the room.
    #[error(transparent)]
    Transport(#[from] TransportError),
}
