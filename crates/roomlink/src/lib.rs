//! # roomlink
//!
//! Room-based multiplayer for emulated local wireless play.
//!
//! Players who would normally sit next to each other join a *room* over
//! the internet instead. The room hands every member a pseudo-MAC address
//! and relays their link-layer frames, chat and game info between them.
//!
//! - [`Room`](roomlink_room::Room): the server side.
//! - [`RoomMember`](roomlink_member::RoomMember): the client side.
//! - [`AnnounceSession`](roomlink_announce::AnnounceSession): lists a
//!   hosted room in a public directory.
//! - [`RoomHost`]: opens a room and its announcement together.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use roomlink::prelude::*;
//!
//! let host = RoomHost::builder("Lobby").port(24872).build()?;
//!
//! let member = RoomMember::new(MemberConfig::default());
//! member.connect(|chat: &ChatEntry| println!("<{}> {}", chat.nickname, chat.message));
//! host.join_local(&member, "host", NO_PREFERRED_MAC);
//! # Ok::<(), RoomlinkError>(())
//! ```

mod error;
mod host;
mod logging;

pub use error::RoomlinkError;
pub use host::{RoomHost, RoomHostBuilder};
pub use logging::init_logging;

pub use roomlink_announce as announce;
pub use roomlink_member as member;
pub use roomlink_protocol as protocol;
pub use roomlink_room as room;
pub use roomlink_transport as transport;

/// Everything a typical host application needs.
pub mod prelude {
    pub use crate::{RoomHost, RoomHostBuilder, RoomlinkError, init_logging};

    pub use roomlink_announce::{
        AnnounceConfig, AnnounceSession, DirectoryBackend, NullBackend, RoomListing, RoomSnapshot,
    };
    #[cfg(feature = "web")]
    pub use roomlink_announce::{WebBackend, WebBackendConfig};
    pub use roomlink_member::{CallbackHandle, ConnectionState, MemberConfig, RoomMember};
    pub use roomlink_protocol::{
        BROADCAST_MAC, ChatEntry, DEFAULT_ROOM_PORT, GameInfo, MacAddress, MemberInformation,
        NETWORK_VERSION, NO_PREFERRED_MAC, RoomInformation, WifiPacket, WifiPacketType,
    };
    pub use roomlink_room::{Member, Room, RoomConfig, RoomState};
}
