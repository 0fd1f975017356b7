//! Room directory support for roomlink.
//!
//! A locally hosted [`Room`](roomlink_room::Room) can be listed in a
//! public directory so others can find it. This crate provides:
//!
//! 1. **Snapshots**: [`RoomSnapshot`] (what we publish) and
//!    [`RoomListing`] (what the directory lists).
//! 2. **Backends**: the [`DirectoryBackend`] trait, with [`NullBackend`]
//!    and, behind the `web` feature, `WebBackend`.
//! 3. **The session**: [`AnnounceSession`] republishes the room
//!    periodically and fetches room lists on request.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use roomlink_announce::{AnnounceConfig, AnnounceSession, NullBackend};
//! use roomlink_room::{Room, RoomConfig};
//!
//! let room = Arc::new(Room::new(RoomConfig::default()));
//! room.create("Lobby", "0.0.0.0", 24872).unwrap();
//!
//! let session = AnnounceSession::new(room, Arc::new(NullBackend), AnnounceConfig::default());
//! session.start().unwrap();
//! ```

mod backend;
mod error;
mod session;
mod snapshot;
#[cfg(feature = "web")]
mod web;

pub use backend::{DirectoryBackend, NullBackend};
pub use error::AnnounceError;
pub use session::{AnnounceConfig, AnnounceSession};
pub use snapshot::{PlayerEntry, RoomListing, RoomSnapshot};
#[cfg(feature = "web")]
pub use web::{API_VERSION, ENV_ENDPOINT_URL, ENV_TOKEN, ENV_USERNAME, WebBackend, WebBackendConfig};
