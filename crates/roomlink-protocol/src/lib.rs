//! Wire protocol for roomlink.
//!
//! This crate defines the "language" that a room and its members speak:
//!
//! - **Packet** ([`Packet`], [`Encode`], [`Decode`]): a byte buffer with
//!   a read cursor that appends and extracts values in network byte order.
//! - **Types** ([`MacAddress`], [`RoomInformation`], [`WifiPacket`], etc.):
//!   the data that travels inside messages.
//! - **Messages** ([`ClientMessage`], [`ServerMessage`], [`MessageKind`]): a
//!   one-byte tag followed by a kind-specific payload.
//! - **Errors** ([`ProtocolError`]): what can go wrong while decoding.
//!
//! # Architecture
//!
//! The protocol layer sits between transport (framed bytes) and the room /
//! member logic. It doesn't know about sockets or threads; it only knows
//! how to turn messages into bytes and back.
//!
//! ```text
//! Transport (frames) → Protocol (ClientMessage / ServerMessage) → Room / RoomMember
//! ```

// ---------------------------------------------------------------------------
// Module declarations
// ---------------------------------------------------------------------------

mod error;
mod message;
mod packet;
mod types;

// ---------------------------------------------------------------------------
// Re-exports
// ---------------------------------------------------------------------------

// Users write `use roomlink_protocol::Packet` instead of
// `use roomlink_protocol::packet::Packet`.

pub use error::ProtocolError;
pub use message::{ClientMessage, MessageKind, ServerMessage};
pub use packet::{Decode, Encode, Packet};
pub use types::{
    BROADCAST_MAC, ChatEntry, DEFAULT_ROOM_PORT, GameInfo, MacAddress,
    MemberInformation, NETWORK_VERSION, NINTENDO_OUI, NO_PREFERRED_MAC,
    RoomInformation, WifiPacket, WifiPacketType,
};
