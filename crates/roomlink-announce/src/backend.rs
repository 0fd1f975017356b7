//! The directory service seam.
//!
//! An [`AnnounceSession`](crate::AnnounceSession) doesn't know where
//! rooms get listed. It talks to a [`DirectoryBackend`], picked when the
//! session is built:
//!
//! - [`NullBackend`]: accepts everything, lists nothing. For builds or
//!   hosts without a directory.
//! - `WebBackend` (feature `web`): JSON over HTTP.
//! - Anything else that implements the trait, e.g. an in-memory
//!   recorder in tests.

use crate::{AnnounceError, RoomListing, RoomSnapshot};

/// A place rooms are announced to and listed from.
///
/// Calls block and may take as long as a network round trip. The session
/// only calls them from its own threads.
pub trait DirectoryBackend: Send + Sync + 'static {
    /// Creates or refreshes the listing for `room`.
    fn publish(&self, room: &RoomSnapshot) -> Result<(), AnnounceError>;

    /// Removes the listing with `guid`.
    fn delete(&self, guid: &str) -> Result<(), AnnounceError>;

    /// Every room the directory currently lists.
    fn fetch_room_list(&self) -> Result<Vec<RoomListing>, AnnounceError>;
}

/// A backend that drops everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullBackend;

impl DirectoryBackend for NullBackend {
    fn publish(&self, _room: &RoomSnapshot) -> Result<(), AnnounceError> {
        Ok(())
    }

    fn delete(&self, _guid: &str) -> Result<(), AnnounceError> {
        Ok(())
    }

    fn fetch_room_list(&self) -> Result<Vec<RoomListing>, AnnounceError> {
        Ok(Vec::new())
    }
}
