//! Server and client hosts.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::peer::{Incoming, PeerSender, split_peer};
use crate::{ConnectionId, TransportError};

/// How long an accepted socket gets to finish the WebSocket upgrade.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

/// How long `shutdown` waits for queued frames to be flushed.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

/// Something that happened on a host since the last `service` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    /// A peer finished connecting.
    Connect { peer: ConnectionId, addr: SocketAddr },
    /// A frame arrived from `peer` on `channel`.
    Receive {
        peer: ConnectionId,
        channel: u8,
        data: Vec<u8>,
    },
    /// The remote side of `peer` went away.
    ///
    /// Peers dropped locally with `disconnect` don't produce this event.
    Disconnect { peer: ConnectionId },
}

/// Waits until `deadline` for the next event from the connection tasks.
///
/// `Ok(None)` means the deadline passed.
async fn next_incoming(
    incoming: &mut mpsc::UnboundedReceiver<Incoming>,
    deadline: Instant,
) -> Result<Option<Incoming>, TransportError> {
    match tokio::time::timeout_at(deadline, incoming.recv()).await {
        Err(_) => Ok(None),
        Ok(None) => Err(TransportError::EndpointClosed),
        Ok(Some(event)) => Ok(Some(event)),
    }
}

// ---------------------------------------------------------------------------
// ServerHost
// ---------------------------------------------------------------------------

struct Peer {
    sender: PeerSender,
    writer: JoinHandle<()>,
}

/// Listens for peers and hands their traffic out through [`service`].
///
/// The peer table is only touched by `service` and the calls made on the
/// host itself, so an owner that services from one task never sees a
/// frame from a peer it hasn't been told about.
///
/// [`service`]: ServerHost::service
pub struct ServerHost {
    local_addr: SocketAddr,
    peers: HashMap<ConnectionId, Peer>,
    incoming: mpsc::UnboundedReceiver<Incoming>,
    active: Arc<AtomicUsize>,
    accept_task: JoinHandle<()>,
}

impl ServerHost {
    /// Binds to `addr` and starts accepting up to `max_peers` concurrent
    /// connections. Connections beyond that are closed right away.
    ///
    /// Must be called inside a tokio runtime.
    pub async fn bind(addr: SocketAddr, max_peers: usize) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(TransportError::BindFailed)?;
        let local_addr = listener.local_addr().map_err(TransportError::BindFailed)?;
        tracing::info!(%local_addr, max_peers, "server host listening");

        let (tx, incoming) = mpsc::unbounded_channel();
        let active = Arc::new(AtomicUsize::new(0));
        let accept_task = tokio::spawn(accept_loop(listener, tx, Arc::clone(&active), max_peers));

        Ok(Self {
            local_addr,
            peers: HashMap::new(),
            incoming,
            active,
            accept_task,
        })
    }

    /// The address actually bound (useful after binding port 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Number of connected peers.
    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }

    /// Waits up to `timeout` for the next event.
    ///
    /// # Errors
    /// [`TransportError::EndpointClosed`] if the listener task is gone and
    /// no connection can report anything anymore.
    pub async fn service(&mut self, timeout: Duration) -> Result<Option<HostEvent>, TransportError> {
        let deadline = Instant::now() + timeout;
        loop {
            let Some(incoming) = next_incoming(&mut self.incoming, deadline).await? else {
                return Ok(None);
            };
            match incoming {
                Incoming::Accepted { sender, writer, addr } => {
                    let peer = sender.id();
                    self.peers.insert(peer, Peer { sender, writer });
                    return Ok(Some(HostEvent::Connect { peer, addr }));
                }
                Incoming::Received { peer, channel, data } => {
                    if self.peers.contains_key(&peer) {
                        return Ok(Some(HostEvent::Receive { peer, channel, data }));
                    }
                }
                Incoming::Closed { peer } => {
                    if self.peers.remove(&peer).is_some() {
                        self.active.fetch_sub(1, Ordering::Relaxed);
                        return Ok(Some(HostEvent::Disconnect { peer }));
                    }
                }
            }
        }
    }

    /// Queues a frame for `peer`.
    pub fn send(&self, peer: ConnectionId, channel: u8, data: &[u8]) -> Result<(), TransportError> {
        self.peers
            .get(&peer)
            .ok_or(TransportError::UnknownPeer(peer))?
            .sender
            .send(channel, data)
    }

    /// Closes the connection to `peer` after flushing what is queued for
    /// it. Unknown peers are ignored.
    pub fn disconnect(&mut self, peer: ConnectionId) {
        if let Some(removed) = self.peers.remove(&peer) {
            removed.sender.disconnect();
            self.active.fetch_sub(1, Ordering::Relaxed);
            tracing::debug!(%peer, "peer disconnected locally");
        }
    }

    /// Stops accepting, closes every connection, and waits briefly for
    /// their queued frames to go out.
    pub async fn shutdown(&mut self) {
        self.accept_task.abort();
        let mut writers = Vec::with_capacity(self.peers.len());
        for (_, peer) in self.peers.drain() {
            peer.sender.disconnect();
            writers.push(peer.writer);
        }
        self.active.store(0, Ordering::Relaxed);
        let _ = tokio::time::timeout(SHUTDOWN_GRACE, futures_util::future::join_all(writers)).await;
        tracing::info!(local_addr = %self.local_addr, "server host shut down");
    }
}

impl Drop for ServerHost {
    fn drop(&mut self) {
        self.accept_task.abort();
    }
}

async fn accept_loop(
    listener: TcpListener,
    events: mpsc::UnboundedSender<Incoming>,
    active: Arc<AtomicUsize>,
    max_peers: usize,
) {
    loop {
        let (stream, addr) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                tracing::warn!(error = %e, "accept failed");
                continue;
            }
        };

        if active.fetch_add(1, Ordering::Relaxed) >= max_peers {
            active.fetch_sub(1, Ordering::Relaxed);
            tracing::debug!(%addr, max_peers, "refusing connection, host is full");
            continue;
        }

        let events = events.clone();
        let active = Arc::clone(&active);
        tokio::spawn(async move {
            let _ = stream.set_nodelay(true);
            let ws = match tokio::time::timeout(HANDSHAKE_TIMEOUT, tokio_tungstenite::accept_async(stream)).await {
                Ok(Ok(ws)) => ws,
                Ok(Err(e)) => {
                    tracing::debug!(%addr, error = %e, "handshake failed");
                    active.fetch_sub(1, Ordering::Relaxed);
                    return;
                }
                Err(_) => {
                    tracing::debug!(%addr, "handshake timed out");
                    active.fetch_sub(1, Ordering::Relaxed);
                    return;
                }
            };

            let id = ConnectionId::next();
            tracing::debug!(%id, %addr, "accepted connection");
            let (sender, writer, reader) = split_peer(ws, id);
            if events.send(Incoming::Accepted { sender, writer, addr }).is_ok() {
                reader.spawn(events);
            }
        });
    }
}

// ---------------------------------------------------------------------------
// ClientHost
// ---------------------------------------------------------------------------

/// A connection to one server, driven like a [`ServerHost`].
pub struct ClientHost {
    server: PeerSender,
    writer: Option<JoinHandle<()>>,
    incoming: mpsc::UnboundedReceiver<Incoming>,
    remote_addr: SocketAddr,
}

impl ClientHost {
    /// Resolves `host:port` and connects, giving up after `timeout`.
    ///
    /// # Errors
    /// - [`TransportError::InvalidAddress`] if the name doesn't resolve.
    /// - [`TransportError::ConnectFailed`], [`TransportError::Handshake`]
    ///   or [`TransportError::ConnectTimedOut`] if nobody answered
    ///   properly.
    pub async fn connect(host: &str, port: u16, timeout: Duration) -> Result<Self, TransportError> {
        let remote_addr = tokio::net::lookup_host((host, port))
            .await
            .map_err(|e| TransportError::InvalidAddress(format!("{host}:{port}: {e}")))?
            .next()
            .ok_or_else(|| TransportError::InvalidAddress(format!("{host}:{port}")))?;

        let connecting = async {
            let stream = TcpStream::connect(remote_addr)
                .await
                .map_err(TransportError::ConnectFailed)?;
            let _ = stream.set_nodelay(true);
            let (ws, _response) = tokio_tungstenite::client_async(format!("ws://{remote_addr}/"), stream)
                .await
                .map_err(|e| {
                    TransportError::Handshake(std::io::Error::new(std::io::ErrorKind::ConnectionRefused, e))
                })?;
            Ok::<_, TransportError>(ws)
        };
        let ws = tokio::time::timeout(timeout, connecting)
            .await
            .map_err(|_| TransportError::ConnectTimedOut(timeout))??;

        let id = ConnectionId::next();
        tracing::debug!(%id, %remote_addr, "connected to server");
        let (server, writer, reader) = split_peer(ws, id);
        let (tx, incoming) = mpsc::unbounded_channel();
        reader.spawn(tx);

        Ok(Self {
            server,
            writer: Some(writer),
            incoming,
            remote_addr,
        })
    }

    /// A handle for sending to the server from other threads.
    pub fn sender(&self) -> PeerSender {
        self.server.clone()
    }

    pub fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }

    /// Queues a frame for the server.
    pub fn send(&self, channel: u8, data: &[u8]) -> Result<(), TransportError> {
        self.server.send(channel, data)
    }

    /// Waits up to `timeout` for the next event from the server.
    ///
    /// After the `Disconnect` event every call fails with
    /// [`TransportError::EndpointClosed`].
    pub async fn service(&mut self, timeout: Duration) -> Result<Option<HostEvent>, TransportError> {
        let deadline = Instant::now() + timeout;
        let Some(incoming) = next_incoming(&mut self.incoming, deadline).await? else {
            return Ok(None);
        };
        Ok(match incoming {
            Incoming::Received { peer, channel, data } => Some(HostEvent::Receive { peer, channel, data }),
            Incoming::Closed { peer } => Some(HostEvent::Disconnect { peer }),
            // Only server hosts accept connections.
            Incoming::Accepted { .. } => None,
        })
    }

    /// Closes the connection after flushing what is queued.
    pub async fn disconnect(&mut self) {
        self.server.disconnect();
        if let Some(writer) = self.writer.take() {
            let _ = tokio::time::timeout(SHUTDOWN_GRACE, writer).await;
        }
    }
}
