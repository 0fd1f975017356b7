//! Tagged messages exchanged between a room and its members.
//!
//! Every message is a single transport frame: one tag byte naming the
//! [`MessageKind`], followed by that kind's payload written with a
//! [`Packet`]. The two directions get separate enums so each side can
//! only build (and only accept) what it is supposed to:
//!
//! - [`ClientMessage`]: member → room
//! - [`ServerMessage`]: room → member
//!
//! `WifiPacket`, `ChatMessage` and `Ping` exist in both directions with
//! the same tag. A chat message going up carries only the text; coming
//! down it carries the sender's nickname too.
//!
//! ## Example
//!
//! ```rust
//! use roomlink_protocol::{ClientMessage, MessageKind, NO_PREFERRED_MAC, NETWORK_VERSION};
//!
//! let join = ClientMessage::JoinRequest {
//!     nickname: "alice".into(),
//!     preferred_mac: NO_PREFERRED_MAC,
//!     client_version: NETWORK_VERSION,
//! };
//!
//! let bytes = join.encode();
//! assert_eq!(bytes[0], MessageKind::JoinRequest as u8);
//! assert_eq!(ClientMessage::decode(&bytes).unwrap(), join);
//! ```

use std::fmt;

use crate::packet::Packet;
use crate::types::{ChatEntry, GameInfo, MacAddress, MemberInformation, RoomInformation, WifiPacket};
use crate::ProtocolError;

// ---------------------------------------------------------------------------
// MessageKind
// ---------------------------------------------------------------------------

/// The leading tag byte of every message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageKind {
    JoinRequest = 1,
    JoinSuccess = 2,
    RoomInformation = 3,
    SetGameInfo = 4,
    WifiPacket = 5,
    ChatMessage = 6,
    NameCollision = 7,
    MacCollision = 8,
    VersionMismatch = 9,
    CloseRoom = 10,
    RoomIsFull = 11,
    Ping = 12,
}

impl TryFrom<u8> for MessageKind {
    type Error = ProtocolError;

    fn try_from(tag: u8) -> Result<Self, Self::Error> {
        Ok(match tag {
            1 => Self::JoinRequest,
            2 => Self::JoinSuccess,
            3 => Self::RoomInformation,
            4 => Self::SetGameInfo,
            5 => Self::WifiPacket,
            6 => Self::ChatMessage,
            7 => Self::NameCollision,
            8 => Self::MacCollision,
            9 => Self::VersionMismatch,
            10 => Self::CloseRoom,
            11 => Self::RoomIsFull,
            12 => Self::Ping,
            other => return Err(ProtocolError::UnknownKind(other)),
        })
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::JoinRequest => "JoinRequest",
            Self::JoinSuccess => "JoinSuccess",
            Self::RoomInformation => "RoomInformation",
            Self::SetGameInfo => "SetGameInfo",
            Self::WifiPacket => "WifiPacket",
            Self::ChatMessage => "ChatMessage",
            Self::NameCollision => "NameCollision",
            Self::MacCollision => "MacCollision",
            Self::VersionMismatch => "VersionMismatch",
            Self::CloseRoom => "CloseRoom",
            Self::RoomIsFull => "RoomIsFull",
            Self::Ping => "Ping",
        };
        f.write_str(name)
    }
}

/// Splits a frame into its kind and a packet positioned after the tag.
fn open(bytes: &[u8]) -> Result<(MessageKind, Packet), ProtocolError> {
    let (&tag, _) = bytes.split_first().ok_or(ProtocolError::Empty)?;
    let kind = MessageKind::try_from(tag)?;
    let mut packet = Packet::from(bytes);
    packet.ignore_bytes(1);
    Ok((kind, packet))
}

fn tagged(kind: MessageKind) -> Packet {
    let mut packet = Packet::new();
    packet.write(&(kind as u8));
    packet
}

// ---------------------------------------------------------------------------
// ClientMessage
// ---------------------------------------------------------------------------

/// Messages a member sends to the room.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    /// First message after connecting. `preferred_mac` is
    /// [`NO_PREFERRED_MAC`](crate::NO_PREFERRED_MAC) to let the room choose.
    JoinRequest {
        nickname: String,
        preferred_mac: MacAddress,
        client_version: u32,
    },
    /// "I'm now playing this game."
    SetGameInfo(GameInfo),
    /// A frame for the room to route to other members.
    WifiPacket(WifiPacket),
    /// A chat line. The room adds the sender's nickname.
    ChatMessage { message: String },
    /// Reply to the room's liveness ping.
    Ping,
}

impl ClientMessage {
    pub fn kind(&self) -> MessageKind {
        match self {
            Self::JoinRequest { .. } => MessageKind::JoinRequest,
            Self::SetGameInfo(_) => MessageKind::SetGameInfo,
            Self::WifiPacket(_) => MessageKind::WifiPacket,
            Self::ChatMessage { .. } => MessageKind::ChatMessage,
            Self::Ping => MessageKind::Ping,
        }
    }

    /// Serializes the message into a complete frame, tag included.
    pub fn encode(&self) -> Vec<u8> {
        let mut packet = tagged(self.kind());
        match self {
            Self::JoinRequest {
                nickname,
                preferred_mac,
                client_version,
            } => {
                packet
                    .write(nickname)
                    .write(preferred_mac)
                    .write(client_version);
            }
            Self::SetGameInfo(game_info) => {
                packet.write(game_info);
            }
            Self::WifiPacket(frame) => {
                packet.write(frame);
            }
            Self::ChatMessage { message } => {
                packet.write(message);
            }
            Self::Ping => {}
        }
        packet.into_bytes()
    }

    /// Parses a frame received by the room.
    ///
    /// # Errors
    /// - [`ProtocolError::Empty`] / [`ProtocolError::UnknownKind`] for a
    ///   missing or unrecognized tag.
    /// - [`ProtocolError::UnexpectedKind`] for a kind only the room sends.
    /// - [`ProtocolError::Malformed`] if the payload is cut short.
    pub fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let (kind, mut packet) = open(bytes)?;
        let parsed = match kind {
            MessageKind::JoinRequest => read_join_request(&mut packet),
            MessageKind::SetGameInfo => packet.read().map(Self::SetGameInfo),
            MessageKind::WifiPacket => packet.read().map(Self::WifiPacket),
            MessageKind::ChatMessage => packet.read().map(|message| Self::ChatMessage { message }),
            MessageKind::Ping => Some(Self::Ping),
            other => return Err(ProtocolError::UnexpectedKind(other)),
        };
        parsed.ok_or(ProtocolError::Malformed(kind))
    }
}

// ---------------------------------------------------------------------------
// ServerMessage
// ---------------------------------------------------------------------------

/// Messages the room sends to its members.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerMessage {
    /// The join was accepted. `channel` is the member's transport channel
    /// for the rest of its stay.
    JoinSuccess { mac_address: MacAddress, channel: u32 },
    /// The room's description and its full member list.
    RoomInformation {
        info: RoomInformation,
        members: Vec<MemberInformation>,
    },
    /// A frame routed from another member.
    WifiPacket(WifiPacket),
    /// A chat line from another member.
    ChatMessage(ChatEntry),
    /// Join rejected: the nickname is taken.
    NameCollision,
    /// Join rejected: the preferred MAC address is taken.
    MacCollision,
    /// Join rejected: protocol versions differ.
    VersionMismatch { server_version: u32 },
    /// The room is shutting down.
    CloseRoom,
    /// Join rejected: every slot is taken.
    RoomIsFull,
    /// Liveness check. Members answer with [`ClientMessage::Ping`].
    Ping,
}

impl ServerMessage {
    pub fn kind(&self) -> MessageKind {
        match self {
            Self::JoinSuccess { .. } => MessageKind::JoinSuccess,
            Self::RoomInformation { .. } => MessageKind::RoomInformation,
            Self::WifiPacket(_) => MessageKind::WifiPacket,
            Self::ChatMessage(_) => MessageKind::ChatMessage,
            Self::NameCollision => MessageKind::NameCollision,
            Self::MacCollision => MessageKind::MacCollision,
            Self::VersionMismatch { .. } => MessageKind::VersionMismatch,
            Self::CloseRoom => MessageKind::CloseRoom,
            Self::RoomIsFull => MessageKind::RoomIsFull,
            Self::Ping => MessageKind::Ping,
        }
    }

    /// Serializes the message into a complete frame, tag included.
    pub fn encode(&self) -> Vec<u8> {
        let mut packet = tagged(self.kind());
        match self {
            Self::JoinSuccess {
                mac_address,
                channel,
            } => {
                packet.write(mac_address).write(channel);
            }
            Self::RoomInformation { info, members } => {
                packet.write(info).write(members);
            }
            Self::WifiPacket(frame) => {
                packet.write(frame);
            }
            Self::ChatMessage(entry) => {
                packet.write(entry);
            }
            Self::VersionMismatch { server_version } => {
                packet.write(server_version);
            }
            Self::NameCollision
            | Self::MacCollision
            | Self::CloseRoom
            | Self::RoomIsFull
            | Self::Ping => {}
        }
        packet.into_bytes()
    }

    /// Parses a frame received by a member.
    ///
    /// # Errors
    /// Same cases as [`ClientMessage::decode`], with `JoinRequest` and
    /// `SetGameInfo` being the unexpected kinds.
    pub fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let (kind, mut packet) = open(bytes)?;
        let parsed = match kind {
            MessageKind::JoinSuccess => read_join_success(&mut packet),
            MessageKind::RoomInformation => read_room_information(&mut packet),
            MessageKind::WifiPacket => packet.read().map(Self::WifiPacket),
            MessageKind::ChatMessage => packet.read().map(Self::ChatMessage),
            MessageKind::NameCollision => Some(Self::NameCollision),
            MessageKind::MacCollision => Some(Self::MacCollision),
            MessageKind::VersionMismatch => packet
                .read()
                .map(|server_version| Self::VersionMismatch { server_version }),
            MessageKind::CloseRoom => Some(Self::CloseRoom),
            MessageKind::RoomIsFull => Some(Self::RoomIsFull),
            MessageKind::Ping => Some(Self::Ping),
            other => return Err(ProtocolError::UnexpectedKind(other)),
        };
        parsed.ok_or(ProtocolError::Malformed(kind))
    }
}

fn read_join_request(packet: &mut Packet) -> Option<ClientMessage> {
    Some(ClientMessage::JoinRequest {
        nickname: packet.read()?,
        preferred_mac: packet.read()?,
        client_version: packet.read()?,
    })
}

fn read_join_success(packet: &mut Packet) -> Option<ServerMessage> {
    Some(ServerMessage::JoinSuccess {
        mac_address: packet.read()?,
        channel: packet.read()?,
    })
}

fn read_room_information(packet: &mut Packet) -> Option<ServerMessage> {
    Some(ServerMessage::RoomInformation {
        info: packet.read()?,
        members: packet.read()?,
    })
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{BROADCAST_MAC, NO_PREFERRED_MAC, WifiPacketType};

    // =====================================================================
    // Tags
    // =====================================================================

    #[test]
    fn test_kind_try_from_round_trips_every_tag() {
        for tag in 1..=12u8 {
            let kind = MessageKind::try_from(tag).unwrap();
            assert_eq!(kind as u8, tag);
        }
    }

    #[test]
    fn test_kind_try_from_zero_is_unknown() {
        assert_eq!(
            MessageKind::try_from(0),
            Err(ProtocolError::UnknownKind(0))
        );
        assert_eq!(
            MessageKind::try_from(13),
            Err(ProtocolError::UnknownKind(13))
        );
    }

    // =====================================================================
    // ClientMessage
    // =====================================================================

    #[test]
    fn test_join_request_layout() {
        let bytes = ClientMessage::JoinRequest {
            nickname: "ab".into(),
            preferred_mac: NO_PREFERRED_MAC,
            client_version: 1,
        }
        .encode();

        let mut expected = vec![1, 0, 0, 0, 2, b'a', b'b'];
        expected.extend([0xFF; 6]);
        expected.extend([0, 0, 0, 1]);
        assert_eq!(bytes, expected);
    }

    #[test]
    fn test_client_decode_each_kind() {
        let messages = [
            ClientMessage::SetGameInfo(GameInfo {
                name: "Mario Kart 7".into(),
                id: 0x0004_0000_0003_0800,
            }),
            ClientMessage::WifiPacket(WifiPacket {
                kind: WifiPacketType::Beacon,
                data: vec![1, 2, 3],
                transmitter_address: MacAddress::with_oui([1, 2, 3]),
                destination_address: BROADCAST_MAC,
                channel: 1,
            }),
            ClientMessage::ChatMessage {
                message: "hello".into(),
            },
            ClientMessage::Ping,
        ];
        for message in messages {
            assert_eq!(ClientMessage::decode(&message.encode()), Ok(message));
        }
    }

    #[test]
    fn test_client_decode_empty_frame_fails() {
        assert_eq!(ClientMessage::decode(&[]), Err(ProtocolError::Empty));
    }

    #[test]
    fn test_client_decode_server_only_kind_is_unexpected() {
        let bytes = ServerMessage::CloseRoom.encode();
        assert_eq!(
            ClientMessage::decode(&bytes),
            Err(ProtocolError::UnexpectedKind(MessageKind::CloseRoom))
        );
    }

    #[test]
    fn test_client_decode_truncated_join_is_malformed() {
        let mut bytes = ClientMessage::JoinRequest {
            nickname: "alice".into(),
            preferred_mac: NO_PREFERRED_MAC,
            client_version: 1,
        }
        .encode();
        bytes.truncate(bytes.len() - 2);

        assert_eq!(
            ClientMessage::decode(&bytes),
            Err(ProtocolError::Malformed(MessageKind::JoinRequest))
        );
    }

    // =====================================================================
    // ServerMessage
    // =====================================================================

    #[test]
    fn test_room_information_carries_members() {
        let message = ServerMessage::RoomInformation {
            info: RoomInformation {
                name: "TestRoom".into(),
                member_slots: 2,
                guid: "0123".repeat(8),
                port: 10000,
            },
            members: vec![MemberInformation {
                nickname: "alice".into(),
                mac_address: MacAddress::with_oui([9, 9, 9]),
                game_info: GameInfo::default(),
                ping: Duration::ZERO,
            }],
        };
        assert_eq!(ServerMessage::decode(&message.encode()), Ok(message));
    }

    #[test]
    fn test_server_decode_rejections_have_no_payload() {
        for message in [
            ServerMessage::NameCollision,
            ServerMessage::MacCollision,
            ServerMessage::RoomIsFull,
            ServerMessage::CloseRoom,
            ServerMessage::Ping,
        ] {
            let bytes = message.encode();
            assert_eq!(bytes.len(), 1);
            assert_eq!(ServerMessage::decode(&bytes), Ok(message));
        }
    }

    #[test]
    fn test_server_decode_version_mismatch_keeps_version() {
        let bytes = ServerMessage::VersionMismatch { server_version: 7 }.encode();
        assert_eq!(bytes, vec![9, 0, 0, 0, 7]);
        assert_eq!(
            ServerMessage::decode(&bytes),
            Ok(ServerMessage::VersionMismatch { server_version: 7 })
        );
    }

    #[test]
    fn test_chat_message_down_carries_nickname() {
        let message = ServerMessage::ChatMessage(ChatEntry {
            nickname: "bob".into(),
            message: "gg".into(),
        });
        let bytes = message.encode();
        assert_eq!(bytes[0], MessageKind::ChatMessage as u8);
        assert_eq!(ServerMessage::decode(&bytes), Ok(message));
    }

    #[test]
    fn test_server_decode_join_request_is_unexpected() {
        let bytes = ClientMessage::Ping.encode();
        // Ping is valid both ways.
        assert_eq!(ServerMessage::decode(&bytes), Ok(ServerMessage::Ping));

        let bytes = ClientMessage::SetGameInfo(GameInfo::default()).encode();
        assert_eq!(
            ServerMessage::decode(&bytes),
            Err(ProtocolError::UnexpectedKind(MessageKind::SetGameInfo))
        );
    }
}
