//! Unified error type for roomlink.

use roomlink_announce::AnnounceError;
use roomlink_member::MemberError;
use roomlink_protocol::ProtocolError;
use roomlink_room::RoomError;
use roomlink_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant generates the `From` impl, so
/// `?` converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum RoomlinkError {
    /// A transport-level error (bind, connect, send).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A malformed or unexpected message.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The room couldn't be opened.
    #[error(transparent)]
    Room(#[from] RoomError),

    /// A member operation was refused.
    #[error(transparent)]
    Member(#[from] MemberError),

    /// Announcing failed to start or stop.
    #[error(transparent)]
    Announce(#[from] AnnounceError),
}
