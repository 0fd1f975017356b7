//! Room configuration and state.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Largest number of members a room can hold.
pub const MAX_MEMBER_SLOTS: u32 = 254;

// ---------------------------------------------------------------------------
// RoomConfig
// ---------------------------------------------------------------------------

/// Configuration for a room instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoomConfig {
    /// Maximum number of members. Clamped to `1..=MAX_MEMBER_SLOTS`.
    pub member_slots: u32,

    /// Longest the worker waits for network activity per iteration. Also
    /// bounds how long `destroy` waits for the worker to notice.
    pub poll_timeout: Duration,

    /// How often the room re-broadcasts its member list and pings members.
    pub broadcast_interval: Duration,
}

impl RoomConfig {
    /// `member_slots` after clamping.
    pub fn slots(&self) -> u32 {
        self.member_slots.clamp(1, MAX_MEMBER_SLOTS)
    }
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            member_slots: 16,
            poll_timeout: Duration::from_millis(50),
            broadcast_interval: Duration::from_secs(5),
        }
    }
}

// ---------------------------------------------------------------------------
// RoomState
// ---------------------------------------------------------------------------

/// The lifecycle state of a room.
///
/// ```text
/// Closed → Open     (create)
/// Open   → Closed   (destroy)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RoomState {
    #[default]
    Closed,
    Open,
}

impl RoomState {
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open)
    }
}

impl std::fmt::Display for RoomState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => write!(f, "Closed"),
            Self::Open => write!(f, "Open"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_room_config_default() {
        let config = RoomConfig::default();
        assert_eq!(config.member_slots, 16);
        assert_eq!(config.poll_timeout, Duration::from_millis(50));
        assert_eq!(config.broadcast_interval, Duration::from_secs(5));
    }

    #[test]
    fn test_room_config_slots_are_clamped() {
        let zero = RoomConfig {
            member_slots: 0,
            ..RoomConfig::default()
        };
        let huge = RoomConfig {
            member_slots: 1000,
            ..RoomConfig::default()
        };
        assert_eq!(zero.slots(), 1);
        assert_eq!(huge.slots(), MAX_MEMBER_SLOTS);
    }

    #[test]
    fn test_room_config_missing_fields_use_defaults() {
        let config: RoomConfig = serde_json::from_str(r#"{ "member_slots": 4 }"#).unwrap();
        assert_eq!(config.member_slots, 4);
        assert_eq!(config.broadcast_interval, Duration::from_secs(5));
    }

    #[test]
    fn test_room_state_display() {
        assert_eq!(RoomState::Closed.to_string(), "Closed");
        assert_eq!(RoomState::Open.to_string(), "Open");
        assert!(RoomState::Open.is_open());
        assert!(!RoomState::default().is_open());
    }
}
