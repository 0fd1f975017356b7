//! One WebSocket connection split into a writer task and a reader task.

use std::net::SocketAddr;

use futures_util::stream::{SplitStream, StreamExt};
use futures_util::SinkExt;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;

use crate::{ConnectionId, TransportError};

pub(crate) type WsStream = WebSocketStream<TcpStream>;

/// What the writer task is asked to do.
enum Outbound {
    Frame(Vec<u8>),
    Close,
}

/// What the per-connection tasks report back to the host.
pub(crate) enum Incoming {
    /// A server-side handshake finished.
    Accepted {
        sender: PeerSender,
        writer: JoinHandle<()>,
        addr: SocketAddr,
    },
    Received {
        peer: ConnectionId,
        channel: u8,
        data: Vec<u8>,
    },
    Closed {
        peer: ConnectionId,
    },
}

/// A cloneable, thread-safe handle for sending to one connection.
///
/// Frames are queued and written in order by the connection's writer
/// task; `send` only fails once that task is gone.
#[derive(Debug, Clone)]
pub struct PeerSender {
    id: ConnectionId,
    tx: mpsc::UnboundedSender<Outbound>,
}

impl PeerSender {
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Queues `data` as one frame on `channel`.
    pub fn send(&self, channel: u8, data: &[u8]) -> Result<(), TransportError> {
        let mut frame = Vec::with_capacity(data.len() + 1);
        frame.push(channel);
        frame.extend_from_slice(data);
        self.tx
            .send(Outbound::Frame(frame))
            .map_err(|_| TransportError::ConnectionClosed(self.id))
    }

    /// Flushes whatever is queued, then closes the connection.
    pub fn disconnect(&self) {
        // The writer may already be gone, in which case so is the socket.
        let _ = self.tx.send(Outbound::Close);
    }

    /// Returns `true` once the writer task has stopped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// The receiving half of a connection, not yet running.
pub(crate) struct PeerReader {
    id: ConnectionId,
    stream: SplitStream<WsStream>,
}

/// Splits a connection and starts its writer task. The reader is handed
/// back unstarted so the caller can announce the connection before any
/// frame from it can be reported.
pub(crate) fn split_peer(ws: WsStream, id: ConnectionId) -> (PeerSender, JoinHandle<()>, PeerReader) {
    let (mut sink, stream) = ws.split();
    let (tx, mut rx) = mpsc::unbounded_channel();

    let writer = tokio::spawn(async move {
        while let Some(outbound) = rx.recv().await {
            match outbound {
                Outbound::Frame(frame) => {
                    if let Err(e) = sink.send(Message::Binary(frame.into())).await {
                        tracing::debug!(%id, error = %e, "write failed");
                        break;
                    }
                }
                Outbound::Close => break,
            }
        }
        rx.close();
        let _ = sink.close().await;
    });

    (PeerSender { id, tx }, writer, PeerReader { id, stream })
}

impl PeerReader {
    /// Forwards every binary frame to `events`, then reports `Closed`.
    pub(crate) fn spawn(self, events: mpsc::UnboundedSender<Incoming>) -> JoinHandle<()> {
        let Self { id, mut stream } = self;
        tokio::spawn(async move {
            while let Some(msg) = stream.next().await {
                match msg {
                    Ok(Message::Binary(bytes)) => {
                        let Some((&channel, data)) = bytes.split_first() else {
                            tracing::debug!(%id, "dropping empty frame");
                            continue;
                        };
                        let event = Incoming::Received {
                            peer: id,
                            channel,
                            data: data.to_vec(),
                        };
                        if events.send(event).is_err() {
                            return;
                        }
                    }
                    // Keep polling so the close handshake can finish; the
                    // stream ends right after.
                    Ok(Message::Close(_)) => continue,
                    Ok(_) => continue,
                    Err(e) => {
                        tracing::debug!(%id, error = %e, "read failed");
                        break;
                    }
                }
            }
            let _ = events.send(Incoming::Closed { peer: id });
        })
    }
}
