//! What gets published to, and read back from, a room directory.
//!
//! The serde attributes define the directory's JSON shape: camelCase
//! keys, the room GUID under `id`, and members under `players` (left out
//! entirely when the room is empty).

use roomlink_protocol::{MacAddress, NETWORK_VERSION};
use roomlink_room::Room;
use serde::{Deserialize, Serialize};

/// A member as the directory lists it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerEntry {
    pub name: String,
    /// Known locally only; the directory never sees it.
    #[serde(skip)]
    pub mac_address: MacAddress,
    pub game_name: String,
    pub game_id: u64,
}

/// The state of one locally hosted room at publish time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSnapshot {
    #[serde(rename = "id")]
    pub guid: String,
    pub name: String,
    pub port: u16,
    pub max_players: u32,
    pub net_version: u32,
    pub has_password: bool,
    #[serde(rename = "players", default, skip_serializing_if = "Vec::is_empty")]
    pub members: Vec<PlayerEntry>,
}

impl RoomSnapshot {
    /// Captures `room`, or `None` if it isn't open.
    pub fn capture(room: &Room) -> Option<Self> {
        if !room.is_open() {
            return None;
        }
        let info = room.room_information();
        let members = room
            .room_member_list()
            .into_iter()
            .map(|member| PlayerEntry {
                name: member.nickname,
                mac_address: member.mac_address,
                game_name: member.game_info.name,
                game_id: member.game_info.id,
            })
            .collect();
        Some(Self {
            guid: info.guid,
            name: info.name,
            port: info.port,
            max_players: info.member_slots,
            net_version: NETWORK_VERSION,
            has_password: false,
            members,
        })
    }
}

/// A room as the directory reports it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomListing {
    pub address: String,
    pub name: String,
    pub port: u16,
    pub max_players: u32,
    pub net_version: u32,
    pub has_password: bool,
    #[serde(rename = "players", default)]
    pub members: Vec<PlayerEntry>,
}

/// Body of a room-list reply.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct RoomList {
    pub rooms: Vec<RoomListing>,
}
