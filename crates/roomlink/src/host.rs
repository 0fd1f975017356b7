//! `RoomHost` builder: a room plus its optional directory announcement.
//!
//! This is the entry point for hosting a room. It ties together the room
//! server and the announce session, and tears both down in the right
//! order.

use std::net::SocketAddr;
use std::sync::Arc;

use roomlink_announce::{AnnounceConfig, AnnounceSession, DirectoryBackend};
use roomlink_member::RoomMember;
use roomlink_protocol::{DEFAULT_ROOM_PORT, MacAddress, RoomInformation};
use roomlink_room::{Room, RoomConfig};

use crate::RoomlinkError;

/// Builder for configuring and opening a hosted room.
///
/// # Example
///
/// ```rust,no_run
/// use roomlink::prelude::*;
///
/// let host = RoomHost::builder("Friday night")
///     .port(24872)
///     .member_slots(8)
///     .build()?;
/// println!("room {} is open", host.room_information().guid);
/// host.shutdown();
/// # Ok::<(), RoomlinkError>(())
/// ```
pub struct RoomHostBuilder {
    name: String,
    bind_address: String,
    port: u16,
    room_config: RoomConfig,
    announce: Option<(Arc<dyn DirectoryBackend>, AnnounceConfig)>,
}

impl RoomHostBuilder {
    /// Creates a builder for a room called `name`, listening on all
    /// interfaces on [`DEFAULT_ROOM_PORT`].
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            bind_address: String::new(),
            port: DEFAULT_ROOM_PORT,
            room_config: RoomConfig::default(),
            announce: None,
        }
    }

    /// Sets the address to listen on. Empty means all interfaces.
    pub fn bind_address(mut self, address: &str) -> Self {
        self.bind_address = address.to_owned();
        self
    }

    /// Sets the port. `0` lets the OS pick.
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sets the whole room configuration.
    pub fn room_config(mut self, config: RoomConfig) -> Self {
        self.room_config = config;
        self
    }

    /// Sets how many members the room admits.
    pub fn member_slots(mut self, slots: u32) -> Self {
        self.room_config.member_slots = slots;
        self
    }

    /// Announces the room to `backend` once it is open.
    pub fn announce(mut self, backend: Arc<dyn DirectoryBackend>, config: AnnounceConfig) -> Self {
        self.announce = Some((backend, config));
        self
    }

    /// Opens the room and, if configured, starts announcing it.
    ///
    /// # Errors
    /// [`RoomlinkError::Room`] if the room can't open, or
    /// [`RoomlinkError::Announce`] if announcing can't start (the room is
    /// closed again in that case).
    pub fn build(self) -> Result<RoomHost, RoomlinkError> {
        let room = Arc::new(Room::new(self.room_config));
        room.create(&self.name, &self.bind_address, self.port)?;

        let announce = match self.announce {
            Some((backend, config)) => {
                let session = AnnounceSession::new(Arc::clone(&room), backend, config);
                if let Err(e) = session.start() {
                    room.destroy();
                    return Err(e.into());
                }
                Some(session)
            }
            None => None,
        };

        Ok(RoomHost { room, announce })
    }
}

/// A hosted room, open until [`shutdown`](Self::shutdown) or drop.
pub struct RoomHost {
    room: Arc<Room>,
    announce: Option<AnnounceSession>,
}

impl RoomHost {
    pub fn builder(name: &str) -> RoomHostBuilder {
        RoomHostBuilder::new(name)
    }

    pub fn room(&self) -> &Arc<Room> {
        &self.room
    }

    /// The announce session, if the room is being announced.
    pub fn announce_session(&self) -> Option<&AnnounceSession> {
        self.announce.as_ref()
    }

    pub fn room_information(&self) -> RoomInformation {
        self.room.room_information()
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.room.local_addr()
    }

    /// Has `member` join this room over loopback.
    pub fn join_local(&self, member: &RoomMember, nickname: &str, preferred_mac: MacAddress) {
        let port = self.room.room_information().port;
        member.join(nickname, "127.0.0.1", port, preferred_mac);
    }

    /// Stops announcing, then closes the room.
    pub fn shutdown(self) {
        drop(self);
    }

    fn teardown(&mut self) {
        if let Some(session) = self.announce.take() {
            if let Err(e) = session.stop() {
                tracing::debug!(error = %e, "announce already stopped");
            }
        }
        self.room.destroy();
    }
}

impl Drop for RoomHost {
    fn drop(&mut self) {
        self.teardown();
    }
}
