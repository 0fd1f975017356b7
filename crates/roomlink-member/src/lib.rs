//! The client side of a roomlink room.
//!
//! A [`RoomMember`] connects to one room, performs the join handshake and
//! then runs a receive thread that turns incoming messages into callbacks.
//! Callbacks are registered per event type:
//!
//! - [`WifiPacket`](roomlink_protocol::WifiPacket): a frame relayed from
//!   another member
//! - [`ChatEntry`](roomlink_protocol::ChatEntry): a chat line
//! - [`RoomInformation`](roomlink_protocol::RoomInformation): the room's
//!   description and member list changed
//! - [`ConnectionState`]: the member's own state changed
//!
//! ```no_run
//! use roomlink_member::{ConnectionState, MemberConfig, RoomMember};
//! use roomlink_protocol::{ChatEntry, NO_PREFERRED_MAC};
//!
//! let member = RoomMember::new(MemberConfig::default());
//! member.connect(|state: &ConnectionState| println!("state: {state}"));
//! member.connect(|chat: &ChatEntry| println!("<{}> {}", chat.nickname, chat.message));
//!
//! member.join("alice", "127.0.0.1", 24872, NO_PREFERRED_MAC);
//! ```

mod callbacks;
mod error;
mod member;
mod state;

pub use callbacks::{CallbackHandle, MemberEvent};
pub use error::MemberError;
pub use member::RoomMember;
pub use state::{ConnectionState, MemberConfig};
