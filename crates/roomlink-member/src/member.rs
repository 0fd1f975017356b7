//! `RoomMember`: connection, receive thread, and send operations.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::thread;

use parking_lot::Mutex;
use roomlink_protocol::{
    ClientMessage, GameInfo, MacAddress, MemberInformation, NETWORK_VERSION, RoomInformation,
    ServerMessage, WifiPacket,
};
use roomlink_transport::{ClientHost, HostEvent, PeerSender, TransportError};
use tokio::sync::oneshot;

use crate::callbacks::{CallbackHandle, CallbackRegistry, MemberEvent};
use crate::{ConnectionState, MemberConfig, MemberError};

/// Transport channel members send on.
const CLIENT_CHANNEL: u8 = 0;

/// State shared between the owning thread and the receive thread.
#[derive(Default)]
struct Inner {
    state: Mutex<ConnectionState>,
    nickname: Mutex<String>,
    mac_address: Mutex<MacAddress>,
    /// The room's latest broadcast, replaced as a whole.
    room: Mutex<(RoomInformation, Vec<MemberInformation>)>,
    server: Mutex<Option<PeerSender>>,
    /// Releases a freshly connected receive thread into its loop. Dropping
    /// it instead makes the thread disconnect and exit.
    start: Mutex<Option<oneshot::Sender<()>>>,
    /// Cleared to stop the receive loop; whoever clears it owns the final
    /// state transition.
    running: AtomicBool,
    callbacks: CallbackRegistry,
}

impl Inner {
    fn set_state(&self, state: ConnectionState) {
        *self.state.lock() = state;
        self.announce_state(state);
    }

    /// Like `set_state`, but a no-op once `leave` has taken over.
    fn set_state_if_running(&self, state: ConnectionState) {
        {
            let mut current = self.state.lock();
            if !self.running.load(Ordering::Acquire) {
                return;
            }
            *current = state;
        }
        self.announce_state(state);
    }

    fn announce_state(&self, state: ConnectionState) {
        tracing::debug!(%state, "member state changed");
        self.callbacks.invoke(&state);
    }

    /// Ends the session from the receive side. Returns `false` if `leave`
    /// got there first.
    fn finish(&self, state: ConnectionState) -> bool {
        if !self.running.swap(false, Ordering::AcqRel) {
            return false;
        }
        self.server.lock().take();
        self.set_state(state);
        true
    }

    /// Handles one message. Returns `false` when the session is over.
    fn handle_message(&self, message: ServerMessage, host: &ClientHost) -> bool {
        match message {
            ServerMessage::JoinSuccess { mac_address, channel } => {
                *self.mac_address.lock() = mac_address;
                tracing::info!(mac = %mac_address, channel, "joined room");
                self.set_state_if_running(ConnectionState::Joined);
            }
            ServerMessage::RoomInformation { info, members } => {
                *self.room.lock() = (info.clone(), members);
                self.callbacks.invoke(&info);
            }
            ServerMessage::ChatMessage(entry) => self.callbacks.invoke(&entry),
            ServerMessage::WifiPacket(frame) => self.callbacks.invoke(&frame),
            ServerMessage::Ping => {
                if let Err(e) = host.send(CLIENT_CHANNEL, &ClientMessage::Ping.encode()) {
                    tracing::debug!(error = %e, "ping reply failed");
                }
            }
            ServerMessage::NameCollision => return !self.finish(ConnectionState::NameCollision),
            ServerMessage::MacCollision => return !self.finish(ConnectionState::MacCollision),
            ServerMessage::RoomIsFull => return !self.finish(ConnectionState::RoomIsFull),
            ServerMessage::VersionMismatch { server_version } => {
                tracing::warn!(server_version, client_version = NETWORK_VERSION, "room runs another version");
                return !self.finish(ConnectionState::VersionMismatch);
            }
            ServerMessage::CloseRoom => {
                tracing::info!("room closed");
                return !self.finish(ConnectionState::LostConnection);
            }
        }
        true
    }
}

/// A member of one room at a time.
///
/// All methods take `&self`; callbacks run on the member's receive thread
/// except for the state changes `join` and `leave` make themselves, which
/// run on the calling thread.
pub struct RoomMember {
    config: MemberConfig,
    inner: Arc<Inner>,
    receive_thread: Mutex<Option<thread::JoinHandle<()>>>,
}

impl RoomMember {
    pub fn new(config: MemberConfig) -> Self {
        Self {
            config,
            inner: Arc::new(Inner::default()),
            receive_thread: Mutex::new(None),
        }
    }

    // -- Subscriptions --

    /// Registers `callback` for events of type `T`.
    pub fn connect<T, F>(&self, callback: F) -> CallbackHandle<T>
    where
        T: MemberEvent,
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.inner.callbacks.connect(callback)
    }

    /// Removes a callback registered with [`connect`](Self::connect).
    /// Returns `false` if it was already removed.
    pub fn disconnect<T: MemberEvent>(&self, handle: CallbackHandle<T>) -> bool {
        self.inner.callbacks.disconnect(handle)
    }

    // -- Session --

    /// Connects to the room at `server_address:server_port` and asks to
    /// join as `nickname`.
    ///
    /// Returns once the connection attempt is settled: the state is then
    /// `Joining` (the join request is on its way), `CouldNotConnect`, or
    /// `Error`. The outcome of the join arrives later as a state change.
    /// Calling `join` while connected only logs a warning.
    pub fn join(&self, nickname: &str, server_address: &str, server_port: u16, preferred_mac: MacAddress) {
        let mut receive_thread = self.receive_thread.lock();
        if self.is_connected() {
            tracing::warn!(nickname, "join called while already connected");
            return;
        }
        if let Some(previous) = receive_thread.take() {
            reap(previous);
        }

        *self.inner.nickname.lock() = nickname.to_owned();
        *self.inner.mac_address.lock() = MacAddress::default();
        *self.inner.room.lock() = (RoomInformation::default(), Vec::new());

        let (ready_tx, ready_rx) = mpsc::sync_channel(1);
        let (start_tx, start_rx) = oneshot::channel();
        let inner = Arc::clone(&self.inner);
        let config = self.config.clone();
        let address = server_address.to_owned();
        let spawned = thread::Builder::new()
            .name("roomlink-member".into())
            .spawn(move || run_receive_thread(inner, config, address, server_port, ready_tx, start_rx));
        let handle = match spawned {
            Ok(handle) => handle,
            Err(e) => {
                drop(receive_thread);
                tracing::error!(error = %e, "could not start receive thread");
                self.inner.set_state(ConnectionState::Error);
                return;
            }
        };

        let connected = ready_rx.recv().unwrap_or(Err(ConnectionState::Error));
        let server = match connected {
            Ok(server) => server,
            Err(state) => {
                drop(receive_thread);
                reap(handle);
                tracing::warn!(nickname, server_address, server_port, %state, "could not connect to room");
                self.inner.set_state(state);
                return;
            }
        };

        // `Joining` is recorded before the guard is released, so a `leave`
        // that wins the lock next always has the last word on the state.
        self.inner.running.store(true, Ordering::Release);
        *self.inner.server.lock() = Some(server.clone());
        *self.inner.start.lock() = Some(start_tx);
        *self.inner.state.lock() = ConnectionState::Joining;
        *receive_thread = Some(handle);
        drop(receive_thread);

        // The receive loop only starts once the start sender fires, so
        // nothing it reports can overtake `Joining`.
        if self.inner.running.load(Ordering::Acquire) {
            self.inner.announce_state(ConnectionState::Joining);
        }
        let Some(start_tx) = self.inner.start.lock().take() else {
            tracing::debug!(nickname, "left before the join request went out");
            return;
        };
        let request = ClientMessage::JoinRequest {
            nickname: nickname.to_owned(),
            preferred_mac,
            client_version: NETWORK_VERSION,
        };
        if let Err(e) = server.send(CLIENT_CHANNEL, &request.encode()) {
            tracing::debug!(error = %e, "join request could not be queued");
        }
        tracing::info!(nickname, server_address, server_port, "joining room");
        let _ = start_tx.send(());
    }

    /// Disconnects from the room and returns to `Idle`.
    ///
    /// # Errors
    /// [`MemberError::NotConnected`] if there is no connection.
    pub fn leave(&self) -> Result<(), MemberError> {
        let mut receive_thread = self.receive_thread.lock();
        if !self.inner.running.swap(false, Ordering::AcqRel) {
            tracing::warn!("leave called while not connected");
            return Err(MemberError::NotConnected);
        }
        // A receive thread still waiting to start exits instead.
        self.inner.start.lock().take();
        if let Some(server) = self.inner.server.lock().take() {
            server.disconnect();
        }
        let handle = receive_thread.take();
        drop(receive_thread);

        self.inner.set_state(ConnectionState::Idle);
        tracing::info!(nickname = %self.inner.nickname.lock(), "left room");
        if let Some(handle) = handle {
            reap(handle);
        }
        Ok(())
    }

    // -- Sending --

    pub fn send_chat_message(&self, message: &str) -> Result<(), MemberError> {
        self.send(&ClientMessage::ChatMessage {
            message: message.to_owned(),
        })
    }

    pub fn send_wifi_packet(&self, frame: &WifiPacket) -> Result<(), MemberError> {
        self.send(&ClientMessage::WifiPacket(frame.clone()))
    }

    /// Tells the room (and through it every member) which game this
    /// member is running.
    pub fn send_game_info(&self, game_info: &GameInfo) -> Result<(), MemberError> {
        self.send(&ClientMessage::SetGameInfo(game_info.clone()))
    }

    fn send(&self, message: &ClientMessage) -> Result<(), MemberError> {
        if self.state() != ConnectionState::Joined {
            return Err(MemberError::NotJoined);
        }
        let server = self.inner.server.lock().clone().ok_or(MemberError::NotJoined)?;
        server.send(CLIENT_CHANNEL, &message.encode())?;
        Ok(())
    }

    // -- Accessors --

    pub fn state(&self) -> ConnectionState {
        *self.inner.state.lock()
    }

    pub fn is_connected(&self) -> bool {
        self.state().is_connected()
    }

    /// The nickname of the last `join`.
    pub fn nickname(&self) -> String {
        self.inner.nickname.lock().clone()
    }

    /// The address the room assigned. All zeroes until joined.
    pub fn mac_address(&self) -> MacAddress {
        *self.inner.mac_address.lock()
    }

    /// The room's description from its latest broadcast.
    pub fn room_information(&self) -> RoomInformation {
        self.inner.room.lock().0.clone()
    }

    /// The member list from the room's latest broadcast.
    pub fn member_information(&self) -> Vec<MemberInformation> {
        self.inner.room.lock().1.clone()
    }
}

impl Default for RoomMember {
    fn default() -> Self {
        Self::new(MemberConfig::default())
    }
}

impl Drop for RoomMember {
    fn drop(&mut self) {
        if self.is_connected() {
            tracing::warn!("member dropped while connected, leaving room");
            let _ = self.leave();
        } else if let Some(handle) = self.receive_thread.get_mut().take() {
            reap(handle);
        }
    }
}

/// Joins a finished (or finishing) receive thread, unless we are on it:
/// a callback may call `join`, `leave`, or drop the member.
fn reap(handle: thread::JoinHandle<()>) {
    if handle.thread().id() == thread::current().id() {
        return;
    }
    if handle.join().is_err() {
        tracing::error!("member receive thread panicked");
    }
}

/// How a connection failure shows up in the member's state.
fn failure_state(error: &TransportError) -> ConnectionState {
    match error {
        TransportError::InvalidAddress(_) => ConnectionState::Error,
        _ => ConnectionState::CouldNotConnect,
    }
}

// ---------------------------------------------------------------------------
// Receive thread
// ---------------------------------------------------------------------------

fn run_receive_thread(
    inner: Arc<Inner>,
    config: MemberConfig,
    address: String,
    port: u16,
    ready: mpsc::SyncSender<Result<PeerSender, ConnectionState>>,
    start: oneshot::Receiver<()>,
) {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            tracing::error!(error = %e, "could not build member runtime");
            let _ = ready.send(Err(ConnectionState::Error));
            return;
        }
    };

    runtime.block_on(async move {
        let mut host = match ClientHost::connect(&address, port, config.connect_timeout).await {
            Ok(host) => host,
            Err(e) => {
                tracing::debug!(error = %e, "connect failed");
                let _ = ready.send(Err(failure_state(&e)));
                return;
            }
        };
        if ready.send(Ok(host.sender())).is_err() || start.await.is_err() {
            host.disconnect().await;
            return;
        }

        receive_loop(&inner, &mut host, &config).await;
        host.disconnect().await;
    });
}

async fn receive_loop(inner: &Inner, host: &mut ClientHost, config: &MemberConfig) {
    while inner.running.load(Ordering::Acquire) {
        match host.service(config.poll_timeout).await {
            Ok(None) | Ok(Some(HostEvent::Connect { .. })) => {}
            Ok(Some(HostEvent::Receive { data, .. })) => match ServerMessage::decode(&data) {
                Ok(message) => {
                    if !inner.handle_message(message, host) {
                        return;
                    }
                }
                Err(e) => tracing::debug!(error = %e, "dropping message"),
            },
            Ok(Some(HostEvent::Disconnect { .. })) | Err(_) => {
                if inner.finish(ConnectionState::LostConnection) {
                    tracing::warn!("connection to room lost");
                }
                return;
            }
        }
    }
}
