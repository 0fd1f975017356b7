//! Channelled hosts for roomlink, carried over WebSocket.
//!
//! A room and its members talk through *hosts*: a [`ServerHost`] that
//! accepts a bounded number of peers, and a [`ClientHost`] that holds one
//! connection to a server. Both are driven the same way. The owner calls
//! `service(timeout)` in a loop and gets back at most one [`HostEvent`]
//! per call (a peer connected, a frame arrived, a peer went away), or
//! `None` when the timeout passed quietly.
//!
//! Every frame carries a one-byte channel number in front of the message
//! bytes. Frames on one connection arrive in the order they were sent.
//!
//! Sending never blocks: [`PeerSender`] queues the frame for a writer task
//! and returns, so it can be called from any thread.

mod error;
mod host;
mod peer;

pub use error::TransportError;
pub use host::{ClientHost, HostEvent, ServerHost};
pub use peer::PeerSender;

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Names one peer connection of a host. Unique within the process, so
/// ids from different hosts never collide in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn into_inner(self) -> u64 {
        self.0
    }

    /// Allocates an id no other connection in this process has used.
    pub(crate) fn next() -> Self {
        Self(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "peer-{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_id_raw_value_round_trips() {
        assert_eq!(ConnectionId::new(42).into_inner(), 42);
    }

    #[test]
    fn test_connection_id_display() {
        assert_eq!(ConnectionId::new(7).to_string(), "peer-7");
    }

    #[test]
    fn test_connection_id_next_is_unique() {
        let a = ConnectionId::next();
        let b = ConnectionId::next();
        assert_ne!(a, b);
        assert!(b > a);
    }
}
