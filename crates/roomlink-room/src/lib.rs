//! The room server for roomlink.
//!
//! A [`Room`] owns a listening endpoint and a dedicated worker thread.
//! Members connect, send a join request, and once admitted can chat and
//! exchange relayed frames with each other through the room.
//!
//! # Key types
//!
//! - [`Room`]: create / destroy a room and read its state
//! - [`Member`]: one admitted member, as the room tracks it
//! - [`RoomConfig`]: slots, poll timeout, broadcast interval
//! - [`RoomState`]: `Closed` or `Open`

mod config;
mod error;
mod members;
mod room;

pub use config::{MAX_MEMBER_SLOTS, RoomConfig, RoomState};
pub use error::RoomError;
pub use members::Member;
pub use room::Room;
