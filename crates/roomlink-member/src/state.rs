//! Connection state machine and member configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// ConnectionState
// ---------------------------------------------------------------------------

/// Where a member stands with respect to its room.
///
/// ```text
/// Idle ──join──► Joining ──JoinSuccess──► Joined ──leave──► Idle
///   │               │                        │
///   │               ├─► NameCollision        └─► LostConnection
///   │               ├─► MacCollision             (room closed or
///   │               ├─► VersionMismatch           connection dropped)
///   │               └─► RoomIsFull
///   ├─► CouldNotConnect   (nobody answered)
///   └─► Error             (bad address, no runtime)
/// ```
///
/// Every state except `Joining` and `Joined` is at rest: the member has no
/// connection and `join` may be called again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ConnectionState {
    #[default]
    Idle,
    Error,
    Joining,
    Joined,
    LostConnection,
    NameCollision,
    MacCollision,
    VersionMismatch,
    RoomIsFull,
    CouldNotConnect,
}

impl ConnectionState {
    /// `true` while a connection to a room exists.
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Joining | Self::Joined)
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Idle => "Idle",
            Self::Error => "Error",
            Self::Joining => "Joining",
            Self::Joined => "Joined",
            Self::LostConnection => "LostConnection",
            Self::NameCollision => "NameCollision",
            Self::MacCollision => "MacCollision",
            Self::VersionMismatch => "VersionMismatch",
            Self::RoomIsFull => "RoomIsFull",
            Self::CouldNotConnect => "CouldNotConnect",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// MemberConfig
// ---------------------------------------------------------------------------

/// Configuration for a room member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemberConfig {
    /// How long `join` waits for the room to accept the connection.
    pub connect_timeout: Duration,

    /// Longest the receive thread waits per iteration. Bounds how long
    /// `leave` waits for the thread to stop.
    pub poll_timeout: Duration,
}

impl Default for MemberConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            poll_timeout: Duration::from_millis(50),
        }
    }
}
