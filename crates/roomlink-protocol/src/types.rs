//! Data types that travel inside roomlink messages.
//!
//! Every type here knows how to write itself into a [`Packet`] and read
//! itself back (the [`Encode`] / [`Decode`] impls at the bottom of each
//! section). They also derive serde so hosts can log them as JSON or hand
//! them to a directory service.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::packet::{Decode, Encode, Packet};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Version of the session protocol. A room refuses members whose
/// `client_version` differs.
pub const NETWORK_VERSION: u32 = 1;

/// The port a room listens on when the host doesn't choose one.
pub const DEFAULT_ROOM_PORT: u16 = 24872;

/// Organization prefix shared by every MAC address a room hands out.
pub const NINTENDO_OUI: [u8; 3] = [0x00, 0x1F, 0x32];

/// Passed as the preferred MAC in a join request to let the room pick one.
pub const NO_PREFERRED_MAC: MacAddress = MacAddress([0xFF; 6]);

/// Destination address of a frame meant for every member of the room.
///
/// Same value as [`NO_PREFERRED_MAC`], as in link-layer broadcast.
pub const BROADCAST_MAC: MacAddress = MacAddress([0xFF; 6]);

// ---------------------------------------------------------------------------
// MacAddress
// ---------------------------------------------------------------------------

/// A 6-byte pseudo-MAC address naming one member inside a room.
///
/// The room assigns these at join time. The first three bytes are always
/// [`NINTENDO_OUI`]; the last three are random and unique among the
/// room's current members.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MacAddress(pub [u8; 6]);

impl MacAddress {
    /// Builds an address from the organization prefix and a 3-byte suffix.
    pub fn with_oui(suffix: [u8; 3]) -> Self {
        let [a, b, c] = NINTENDO_OUI;
        let [d, e, f] = suffix;
        Self([a, b, c, d, e, f])
    }

    /// Returns `true` if the first three bytes equal `prefix`.
    pub fn has_prefix(&self, prefix: [u8; 3]) -> bool {
        self.0[..3] == prefix
    }

    /// Returns `true` for the reserved all-`0xFF` value.
    pub fn is_broadcast(&self) -> bool {
        *self == BROADCAST_MAC
    }
}

impl Default for MacAddress {
    fn default() -> Self {
        Self([0; 6])
    }
}

/// Prints the familiar `00:1F:32:AB:CD:EF` form.
impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02X}:{b:02X}:{c:02X}:{d:02X}:{e:02X}:{g:02X}")
    }
}

impl Encode for MacAddress {
    fn encode(&self, packet: &mut Packet) {
        self.0.encode(packet);
    }
}

impl Decode for MacAddress {
    fn decode(packet: &mut Packet) -> Option<Self> {
        <[u8; 6]>::decode(packet).map(Self)
    }
}

// ---------------------------------------------------------------------------
// Room and member descriptions
// ---------------------------------------------------------------------------

/// Which game a member is running. `id` is the title ID, `name` the
/// human-readable title. An empty name and id `0` mean "no game".
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GameInfo {
    pub name: String,
    pub id: u64,
}

impl Encode for GameInfo {
    fn encode(&self, packet: &mut Packet) {
        packet.write(&self.name).write(&self.id);
    }
}

impl Decode for GameInfo {
    fn decode(packet: &mut Packet) -> Option<Self> {
        Some(Self {
            name: packet.read()?,
            id: packet.read()?,
        })
    }
}

/// The descriptive half of a room: what it's called, how big it is, and
/// where it listens.
///
/// A closed room reports `RoomInformation::default()`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomInformation {
    /// Display name chosen by the host.
    pub name: String,
    /// Maximum number of members.
    pub member_slots: u32,
    /// Opaque label generated when the room opens. Directory services key
    /// rooms by it.
    pub guid: String,
    /// The port the room is actually bound to.
    pub port: u16,
}

impl Encode for RoomInformation {
    fn encode(&self, packet: &mut Packet) {
        packet
            .write(&self.name)
            .write(&self.member_slots)
            .write(&self.guid)
            .write(&self.port);
    }
}

impl Decode for RoomInformation {
    fn decode(packet: &mut Packet) -> Option<Self> {
        Some(Self {
            name: packet.read()?,
            member_slots: packet.read()?,
            guid: packet.read()?,
            port: packet.read()?,
        })
    }
}

/// One member as every other member sees it, from the periodic
/// room-information broadcast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberInformation {
    pub nickname: String,
    pub mac_address: MacAddress,
    pub game_info: GameInfo,
    /// Latency the room last measured for this member.
    pub ping: Duration,
}

/// On the wire the ping is an `f32` count of milliseconds.
impl Encode for MemberInformation {
    fn encode(&self, packet: &mut Packet) {
        let ping_ms = self.ping.as_secs_f32() * 1000.0;
        packet
            .write(&self.nickname)
            .write(&self.mac_address)
            .write(&self.game_info)
            .write(&ping_ms);
    }
}

impl Decode for MemberInformation {
    fn decode(packet: &mut Packet) -> Option<Self> {
        let nickname = packet.read()?;
        let mac_address = packet.read()?;
        let game_info = packet.read()?;
        let ping_ms: f32 = packet.read()?;
        // NaN, negative, or absurd values from a misbehaving room read as 0.
        let ping = Duration::try_from_secs_f32(ping_ms / 1000.0).unwrap_or_default();
        Some(Self {
            nickname,
            mac_address,
            game_info,
            ping,
        })
    }
}

/// A chat line as members receive it: who said it, and what.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatEntry {
    pub nickname: String,
    pub message: String,
}

impl Encode for ChatEntry {
    fn encode(&self, packet: &mut Packet) {
        packet.write(&self.nickname).write(&self.message);
    }
}

impl Decode for ChatEntry {
    fn decode(packet: &mut Packet) -> Option<Self> {
        Some(Self {
            nickname: packet.read()?,
            message: packet.read()?,
        })
    }
}

// ---------------------------------------------------------------------------
// WifiPacket: relayed link-layer frames
// ---------------------------------------------------------------------------

/// The kind of a relayed frame. The room never looks inside a frame; the
/// kind only matters to the emulated wireless stack on each end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum WifiPacketType {
    #[default]
    Beacon = 0,
    Data = 1,
    Authentication = 2,
    AssociationResponse = 3,
}

impl WifiPacketType {
    fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Beacon),
            1 => Some(Self::Data),
            2 => Some(Self::Authentication),
            3 => Some(Self::AssociationResponse),
            _ => None,
        }
    }
}

impl Encode for WifiPacketType {
    fn encode(&self, packet: &mut Packet) {
        (*self as u8).encode(packet);
    }
}

impl Decode for WifiPacketType {
    fn decode(packet: &mut Packet) -> Option<Self> {
        let raw = u8::decode(packet)?;
        let kind = Self::from_u8(raw);
        if kind.is_none() {
            packet.invalidate();
        }
        kind
    }
}

/// A frame one member wants delivered to another (or to everyone).
///
/// The room routes it by `destination_address` and forwards the original
/// bytes untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WifiPacket {
    pub kind: WifiPacketType,
    /// Raw frame body.
    pub data: Vec<u8>,
    pub transmitter_address: MacAddress,
    /// [`BROADCAST_MAC`] reaches every member except the sender.
    pub destination_address: MacAddress,
    /// Wireless channel the frame was "sent" on. Not the transport channel.
    pub channel: u8,
}

/// Field order on the wire: kind, channel, transmitter, destination, data.
impl Encode for WifiPacket {
    fn encode(&self, packet: &mut Packet) {
        packet
            .write(&self.kind)
            .write(&self.channel)
            .write(&self.transmitter_address)
            .write(&self.destination_address)
            .write(&self.data);
    }
}

impl Decode for WifiPacket {
    fn decode(packet: &mut Packet) -> Option<Self> {
        let kind = packet.read()?;
        let channel = packet.read()?;
        let transmitter_address = packet.read()?;
        let destination_address = packet.read()?;
        let data = packet.read()?;
        Some(Self {
            kind,
            data,
            transmitter_address,
            destination_address,
            channel,
        })
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mac_display_uses_colon_hex() {
        let mac = MacAddress([0x00, 0x1F, 0x32, 0xAB, 0x0C, 0x01]);
        assert_eq!(mac.to_string(), "00:1F:32:AB:0C:01");
    }

    #[test]
    fn test_mac_with_oui_has_prefix() {
        let mac = MacAddress::with_oui([1, 2, 3]);
        assert!(mac.has_prefix(NINTENDO_OUI));
        assert_eq!(mac.0, [0x00, 0x1F, 0x32, 1, 2, 3]);
    }

    #[test]
    fn test_broadcast_and_no_preferred_share_value() {
        assert_eq!(BROADCAST_MAC, NO_PREFERRED_MAC);
        assert!(NO_PREFERRED_MAC.is_broadcast());
        assert!(!MacAddress::with_oui([0xFF; 3]).is_broadcast());
    }

    #[test]
    fn test_mac_serializes_as_byte_array() {
        let json = serde_json::to_string(&MacAddress([1, 2, 3, 4, 5, 6])).unwrap();
        assert_eq!(json, "[1,2,3,4,5,6]");
    }

    #[test]
    fn test_wifi_packet_layout_matches_wire_order() {
        let frame = WifiPacket {
            kind: WifiPacketType::Data,
            data: vec![0xDE, 0xAD],
            transmitter_address: MacAddress([1; 6]),
            destination_address: BROADCAST_MAC,
            channel: 6,
        };
        let mut packet = Packet::new();
        packet.write(&frame);

        let mut expected = vec![1, 6];
        expected.extend([1; 6]);
        expected.extend([0xFF; 6]);
        expected.extend([0, 0, 0, 2, 0xDE, 0xAD]);
        assert_eq!(packet.data(), expected.as_slice());

        assert_eq!(packet.read::<WifiPacket>(), Some(frame));
    }

    #[test]
    fn test_wifi_packet_unknown_kind_invalidates() {
        let mut packet = Packet::from(vec![9, 1]);
        assert_eq!(packet.read::<WifiPacketType>(), None);
        assert!(!packet.is_valid());
    }

    #[test]
    fn test_member_information_ping_travels_as_milliseconds() {
        let member = MemberInformation {
            nickname: "alice".into(),
            mac_address: MacAddress::with_oui([7, 7, 7]),
            game_info: GameInfo {
                name: "Pilotwings".into(),
                id: 0x0004_0000_0008_C300,
            },
            ping: Duration::from_millis(40),
        };
        let mut packet = Packet::new();
        packet.write(&member);

        // The last four bytes are 40.0_f32.
        let bytes = packet.data();
        assert_eq!(&bytes[bytes.len() - 4..], &40.0_f32.to_be_bytes());

        let decoded = packet.read::<MemberInformation>().unwrap();
        assert_eq!(decoded.nickname, "alice");
        assert_eq!(decoded.game_info, member.game_info);
        assert_eq!(decoded.ping.as_millis(), 40);
    }

    #[test]
    fn test_member_information_negative_ping_reads_as_zero() {
        let mut packet = Packet::new();
        packet
            .write("bob")
            .write(&MacAddress::with_oui([1, 1, 1]))
            .write(&GameInfo::default())
            .write(&-5.0_f32);

        let decoded = packet.read::<MemberInformation>().unwrap();
        assert_eq!(decoded.ping, Duration::ZERO);
    }
}
