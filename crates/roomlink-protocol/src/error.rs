//! Error types for the protocol layer.
//!
//! Each crate in roomlink defines its own error enum. When you see a
//! `ProtocolError`, you know the bytes arrived fine but their content
//! doesn't match the message layout the two sides agreed on.

use crate::MessageKind;

/// Errors that can occur while decoding a message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    /// The frame carried no bytes at all, not even a tag.
    #[error("empty message")]
    Empty,

    /// The leading tag byte doesn't name any known message kind.
    #[error("unknown message kind {0:#04x}")]
    UnknownKind(u8),

    /// The tag is valid, but this side never receives that kind.
    ///
    /// For example, a room receiving `JoinSuccess` (which only the room
    /// itself sends) gets this error.
    #[error("unexpected {0} message")]
    UnexpectedKind(MessageKind),

    /// The payload ran out of bytes (or held invalid UTF-8 / an unknown
    /// frame type) before the whole message could be read.
    #[error("malformed {0} payload")]
    Malformed(MessageKind),
}
