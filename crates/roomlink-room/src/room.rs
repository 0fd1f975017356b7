//! The room: a listening endpoint plus the worker thread that serves it.
//!
//! The worker owns the [`ServerHost`] outright. Everything other threads
//! can read (state, room information, member table) lives in [`Shared`]
//! behind short-lived locks; only the worker writes to it while the room
//! is open.

use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::thread;
use std::time::Instant;

use parking_lot::Mutex;
use rand::rngs::ThreadRng;
use roomlink_protocol::{
    ChatEntry, ClientMessage, GameInfo, MacAddress, RoomInformation, ServerMessage, WifiPacket,
};
use roomlink_transport::{ConnectionId, HostEvent, ServerHost};

use crate::members::{JoinRequest, Member, MemberTable, generate_guid};
use crate::{RoomConfig, RoomError, RoomState};

/// Connections allowed beyond `member_slots`, so that peers knocking on
/// a full room still get a `RoomIsFull` reply instead of a dropped socket.
const PENDING_CONNECTIONS: usize = 10;

/// Transport channel for replies to peers that haven't joined.
const HANDSHAKE_CHANNEL: u8 = 0;

/// State readable from any thread.
#[derive(Default)]
struct Shared {
    open: AtomicBool,
    info: Mutex<RoomInformation>,
    members: Mutex<MemberTable>,
    local_addr: Mutex<Option<SocketAddr>>,
}

/// A room server.
///
/// All methods take `&self`, so a room can be shared between threads
/// (for example with an announce session) behind an `Arc`.
///
/// ```no_run
/// use roomlink_room::{Room, RoomConfig};
///
/// let room = Room::new(RoomConfig::default());
/// room.create("My room", "", 24872).expect("room should open");
/// println!("guid: {}", room.room_information().guid);
/// room.destroy();
/// ```
pub struct Room {
    config: RoomConfig,
    shared: Arc<Shared>,
    worker: Mutex<Option<thread::JoinHandle<()>>>,
}

impl Room {
    pub fn new(config: RoomConfig) -> Self {
        Self {
            config,
            shared: Arc::new(Shared::default()),
            worker: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &RoomConfig {
        &self.config
    }

    /// Opens the room on `bind_address:port` and starts serving it.
    ///
    /// An empty `bind_address` listens on all interfaces; port `0` lets
    /// the OS pick one (read it back from [`room_information`]).
    ///
    /// # Errors
    /// - [`RoomError::AlreadyOpen`] if the room is open.
    /// - [`RoomError::InvalidAddress`] / [`RoomError::Bind`] if the
    ///   endpoint can't be set up. The room stays closed.
    ///
    /// [`room_information`]: Room::room_information
    pub fn create(&self, name: &str, bind_address: &str, port: u16) -> Result<(), RoomError> {
        let mut worker = self.worker.lock();
        if worker.is_some() {
            return Err(RoomError::AlreadyOpen);
        }

        let host = if bind_address.is_empty() { "0.0.0.0" } else { bind_address };
        let addr = (host, port)
            .to_socket_addrs()
            .map_err(|e| RoomError::InvalidAddress(format!("{host}:{port}: {e}")))?
            .next()
            .ok_or_else(|| RoomError::InvalidAddress(format!("{host}:{port}")))?;

        let slots = self.config.slots();
        *self.shared.members.lock() = MemberTable::new(slots);
        *self.shared.info.lock() = RoomInformation {
            name: name.to_owned(),
            member_slots: slots,
            guid: generate_guid(&mut rand::rng()),
            port: 0,
        };

        // The worker binds inside its own runtime and reports back, so
        // `create` never drives a runtime on the caller's thread.
        let (ready_tx, ready_rx) = mpsc::sync_channel(1);
        let shared = Arc::clone(&self.shared);
        let config = self.config.clone();
        let spawned = thread::Builder::new()
            .name("roomlink-room".into())
            .spawn(move || run_worker(addr, shared, config, ready_tx));
        let handle = match spawned {
            Ok(handle) => handle,
            Err(e) => {
                self.reset();
                return Err(RoomError::Runtime(e));
            }
        };

        let bound = ready_rx.recv().unwrap_or_else(|_| {
            Err(RoomError::Runtime(std::io::Error::other("room worker exited during startup")))
        });
        match bound {
            Ok(local_addr) => {
                *worker = Some(handle);
                tracing::info!(
                    name,
                    %local_addr,
                    slots,
                    guid = %self.shared.info.lock().guid,
                    "room created"
                );
                Ok(())
            }
            Err(e) => {
                let _ = handle.join();
                self.reset();
                Err(e)
            }
        }
    }

    /// Closes the room: members get `CloseRoom` and are disconnected, the
    /// worker stops, and the room information and member table are
    /// cleared. Does nothing on a closed room.
    pub fn destroy(&self) {
        let Some(handle) = self.worker.lock().take() else {
            return;
        };
        self.shared.open.store(false, Ordering::Release);
        if handle.join().is_err() {
            tracing::error!("room worker panicked");
        }
        self.reset();
        tracing::info!("room destroyed");
    }

    pub fn state(&self) -> RoomState {
        if self.shared.open.load(Ordering::Acquire) {
            RoomState::Open
        } else {
            RoomState::Closed
        }
    }

    pub fn is_open(&self) -> bool {
        self.state().is_open()
    }

    /// The room's description. Default-valued while closed.
    pub fn room_information(&self) -> RoomInformation {
        self.shared.info.lock().clone()
    }

    /// A snapshot of the current members.
    pub fn room_member_list(&self) -> Vec<Member> {
        self.shared.members.lock().snapshot()
    }

    /// The address the room listens on, while open.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self.shared.local_addr.lock()
    }

    fn reset(&self) {
        self.shared.open.store(false, Ordering::Release);
        *self.shared.info.lock() = RoomInformation::default();
        self.shared.members.lock().clear();
        *self.shared.local_addr.lock() = None;
    }
}

impl Default for Room {
    fn default() -> Self {
        Self::new(RoomConfig::default())
    }
}

impl Drop for Room {
    fn drop(&mut self) {
        self.destroy();
    }
}

// ---------------------------------------------------------------------------
// Worker
// ---------------------------------------------------------------------------

/// Body of the worker thread: build a runtime, bind, report, serve.
fn run_worker(
    addr: SocketAddr,
    shared: Arc<Shared>,
    config: RoomConfig,
    ready: mpsc::SyncSender<Result<SocketAddr, RoomError>>,
) {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            let _ = ready.send(Err(RoomError::Runtime(e)));
            return;
        }
    };

    runtime.block_on(async move {
        let max_peers = config.slots() as usize + PENDING_CONNECTIONS;
        let host = match ServerHost::bind(addr, max_peers).await {
            Ok(host) => host,
            Err(e) => {
                let _ = ready.send(Err(RoomError::Bind(e)));
                return;
            }
        };

        let local_addr = host.local_addr();
        shared.info.lock().port = local_addr.port();
        *shared.local_addr.lock() = Some(local_addr);
        shared.open.store(true, Ordering::Release);
        if ready.send(Ok(local_addr)).is_err() {
            return;
        }

        RoomWorker {
            host,
            shared,
            config,
            rng: rand::rng(),
            last_broadcast: Instant::now(),
        }
        .run()
        .await;
    });
}

struct RoomWorker {
    host: ServerHost,
    shared: Arc<Shared>,
    config: RoomConfig,
    rng: ThreadRng,
    /// When the last ping went out; members' ping is measured from it.
    last_broadcast: Instant,
}

impl RoomWorker {
    async fn run(mut self) {
        tracing::debug!(local_addr = %self.host.local_addr(), "room worker started");
        let mut next_broadcast = Instant::now() + self.config.broadcast_interval;

        while self.shared.open.load(Ordering::Acquire) {
            match self.host.service(self.config.poll_timeout).await {
                Ok(Some(event)) => self.handle_event(event),
                Ok(None) => {}
                Err(e) => {
                    tracing::error!(error = %e, "room endpoint lost, worker exiting");
                    return;
                }
            }

            if Instant::now() >= next_broadcast {
                self.broadcast_room_information();
                self.send_ping();
                next_broadcast = Instant::now() + self.config.broadcast_interval;
            }
        }

        self.broadcast(&ServerMessage::CloseRoom, None);
        self.host.shutdown().await;
        tracing::debug!("room worker stopped");
    }

    fn handle_event(&mut self, event: HostEvent) {
        match event {
            HostEvent::Connect { peer, addr } => {
                tracing::debug!(%peer, %addr, "peer connected");
            }
            HostEvent::Receive { peer, data, .. } => match ClientMessage::decode(&data) {
                Ok(message) => self.handle_message(peer, message, &data),
                Err(e) => tracing::debug!(%peer, error = %e, "dropping message"),
            },
            HostEvent::Disconnect { peer } => self.handle_disconnect(peer),
        }
    }

    fn handle_message(&mut self, peer: ConnectionId, message: ClientMessage, raw: &[u8]) {
        match message {
            ClientMessage::JoinRequest {
                nickname,
                preferred_mac,
                client_version,
            } => self.handle_join(peer, &nickname, preferred_mac, client_version),
            ClientMessage::SetGameInfo(game_info) => self.handle_game_info(peer, game_info),
            ClientMessage::WifiPacket(frame) => self.handle_wifi_packet(peer, &frame, raw),
            ClientMessage::ChatMessage { message } => self.handle_chat(peer, message),
            ClientMessage::Ping => {
                let elapsed = self.last_broadcast.elapsed();
                if let Some(member) = self.shared.members.lock().by_peer_mut(peer) {
                    member.ping = elapsed;
                }
            }
        }
    }

    fn handle_join(&mut self, peer: ConnectionId, nickname: &str, preferred_mac: MacAddress, client_version: u32) {
        let admitted = {
            let mut members = self.shared.members.lock();
            if members.by_peer(peer).is_some() {
                tracing::debug!(%peer, "ignoring repeated join request");
                return;
            }
            let request = JoinRequest {
                nickname,
                preferred_mac,
                client_version,
                peer,
            };
            members
                .admit(request, &mut self.rng)
                .map(|member| (member.mac_address, member.channel))
        };

        match admitted {
            Ok((mac_address, channel)) => {
                tracing::info!(%peer, nickname, mac = %mac_address, channel, "member joined");
                self.broadcast_room_information();
                self.send_to(
                    peer,
                    transport_channel(channel),
                    &ServerMessage::JoinSuccess { mac_address, channel },
                );
            }
            Err(rejection) => {
                tracing::info!(%peer, nickname, ?rejection, "join rejected");
                self.send_to(peer, HANDSHAKE_CHANNEL, &rejection.reply());
                self.host.disconnect(peer);
            }
        }
    }

    fn handle_game_info(&mut self, peer: ConnectionId, game_info: GameInfo) {
        {
            let mut members = self.shared.members.lock();
            let Some(member) = members.by_peer_mut(peer) else {
                tracing::debug!(%peer, "game info from non-member, ignoring");
                return;
            };
            tracing::debug!(nickname = %member.nickname, game = %game_info.name, "game info updated");
            member.game_info = game_info;
        }
        self.broadcast_room_information();
    }

    /// Forwards `raw` untouched: to every other member for a broadcast
    /// destination, otherwise to the one member with that address.
    fn handle_wifi_packet(&mut self, peer: ConnectionId, frame: &WifiPacket, raw: &[u8]) {
        let targets: Vec<(ConnectionId, u32)> = {
            let members = self.shared.members.lock();
            if members.by_peer(peer).is_none() {
                tracing::debug!(%peer, "frame from non-member, ignoring");
                return;
            }
            if frame.destination_address.is_broadcast() {
                members.iter().filter(|m| m.peer != peer).map(|m| (m.peer, m.channel)).collect()
            } else {
                match members.by_mac(frame.destination_address) {
                    Some(target) => vec![(target.peer, target.channel)],
                    None => {
                        tracing::debug!(destination = %frame.destination_address, "no member with destination address");
                        return;
                    }
                }
            }
        };
        for (target, channel) in targets {
            self.send_raw(target, transport_channel(channel), raw);
        }
    }

    fn handle_chat(&mut self, peer: ConnectionId, message: String) {
        let nickname = match self.shared.members.lock().by_peer(peer) {
            Some(member) => member.nickname.clone(),
            None => {
                tracing::debug!(%peer, "chat from non-member, ignoring");
                return;
            }
        };
        tracing::debug!(%nickname, "relaying chat message");
        self.broadcast(&ServerMessage::ChatMessage(ChatEntry { nickname, message }), Some(peer));
    }

    fn handle_disconnect(&mut self, peer: ConnectionId) {
        let removed = self.shared.members.lock().remove_by_peer(peer);
        match removed {
            Some(member) => {
                tracing::info!(%peer, nickname = %member.nickname, "member left");
                self.broadcast_room_information();
            }
            None => tracing::debug!(%peer, "peer disconnected before joining"),
        }
    }

    fn broadcast_room_information(&mut self) {
        let message = ServerMessage::RoomInformation {
            info: self.shared.info.lock().clone(),
            members: self.shared.members.lock().information(),
        };
        self.broadcast(&message, None);
    }

    fn send_ping(&mut self) {
        self.last_broadcast = Instant::now();
        self.broadcast(&ServerMessage::Ping, None);
    }

    /// Sends `message` to every member except `except`, each on its own
    /// channel.
    fn broadcast(&self, message: &ServerMessage, except: Option<ConnectionId>) {
        let routes = self.shared.members.lock().routes();
        let bytes = message.encode();
        for (peer, channel) in routes {
            if Some(peer) != except {
                self.send_raw(peer, transport_channel(channel), &bytes);
            }
        }
    }

    fn send_to(&self, peer: ConnectionId, channel: u8, message: &ServerMessage) {
        self.send_raw(peer, channel, &message.encode());
    }

    fn send_raw(&self, peer: ConnectionId, channel: u8, bytes: &[u8]) {
        if let Err(e) = self.host.send(peer, channel, bytes) {
            tracing::debug!(%peer, error = %e, "send failed");
        }
    }
}

/// Member channels are bounded by the slot limit, so they fit a byte.
fn transport_channel(channel: u32) -> u8 {
    u8::try_from(channel).unwrap_or(u8::MAX)
}
