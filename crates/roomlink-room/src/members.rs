//! The member table: who is in the room, and the rules for letting
//! someone new in.
//!
//! This module has no I/O. The worker thread feeds it join requests and
//! departures and sends whatever replies it decides on, which keeps the
//! admission rules testable with a seeded random generator.

use std::collections::BTreeSet;
use std::time::Duration;

use rand::Rng;
use roomlink_protocol::{
    GameInfo, MacAddress, MemberInformation, NETWORK_VERSION, NO_PREFERRED_MAC, ServerMessage,
};
use roomlink_transport::ConnectionId;

/// One admitted member of a room.
#[derive(Debug, Clone, PartialEq)]
pub struct Member {
    pub nickname: String,
    pub mac_address: MacAddress,
    pub game_info: GameInfo,
    /// Time between the room's last ping and this member's answer.
    pub ping: Duration,
    /// The member's transport connection.
    pub peer: ConnectionId,
    /// Transport channel assigned at join. Fixed while the member stays.
    pub channel: u32,
}

impl Member {
    /// The part of the member every other member gets to see.
    pub fn to_information(&self) -> MemberInformation {
        MemberInformation {
            nickname: self.nickname.clone(),
            mac_address: self.mac_address,
            game_info: self.game_info.clone(),
            ping: self.ping,
        }
    }
}

/// Why a join request was turned down, in precedence order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum JoinRejection {
    NameCollision,
    MacCollision,
    VersionMismatch,
    RoomIsFull,
}

impl JoinRejection {
    /// The terminal reply sent to the rejected peer.
    pub(crate) fn reply(self) -> ServerMessage {
        match self {
            Self::NameCollision => ServerMessage::NameCollision,
            Self::MacCollision => ServerMessage::MacCollision,
            Self::VersionMismatch => ServerMessage::VersionMismatch {
                server_version: NETWORK_VERSION,
            },
            Self::RoomIsFull => ServerMessage::RoomIsFull,
        }
    }
}

/// A join request as the table sees it.
pub(crate) struct JoinRequest<'a> {
    pub nickname: &'a str,
    pub preferred_mac: MacAddress,
    pub client_version: u32,
    pub peer: ConnectionId,
}

#[derive(Debug, Default)]
pub(crate) struct MemberTable {
    members: Vec<Member>,
    slots: u32,
}

impl MemberTable {
    pub(crate) fn new(slots: u32) -> Self {
        Self {
            members: Vec::new(),
            slots,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.members.len()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &Member> {
        self.members.iter()
    }

    /// Checks a join request against the current members.
    ///
    /// The checks run in a fixed order and the first failure wins: a taken
    /// nickname is reported even if the MAC and version are also bad.
    pub(crate) fn check(&self, request: &JoinRequest<'_>) -> Result<(), JoinRejection> {
        if self.members.iter().any(|m| m.nickname == request.nickname) {
            return Err(JoinRejection::NameCollision);
        }
        if request.preferred_mac != NO_PREFERRED_MAC && self.by_mac(request.preferred_mac).is_some() {
            return Err(JoinRejection::MacCollision);
        }
        if request.client_version != NETWORK_VERSION {
            return Err(JoinRejection::VersionMismatch);
        }
        if self.members.len() >= self.slots as usize {
            return Err(JoinRejection::RoomIsFull);
        }
        Ok(())
    }

    /// Admits the requester if [`check`](Self::check) passes, assigning a
    /// MAC address (unless a free one was requested) and a channel.
    pub(crate) fn admit<R: Rng + ?Sized>(
        &mut self,
        request: JoinRequest<'_>,
        rng: &mut R,
    ) -> Result<&Member, JoinRejection> {
        self.check(&request)?;

        let mac_address = if request.preferred_mac == NO_PREFERRED_MAC {
            self.generate_mac(rng)
        } else {
            request.preferred_mac
        };
        let channel = self.next_channel();

        self.members.push(Member {
            nickname: request.nickname.to_owned(),
            mac_address,
            game_info: GameInfo::default(),
            ping: Duration::ZERO,
            peer: request.peer,
            channel,
        });
        let index = self.members.len() - 1;
        Ok(&self.members[index])
    }

    /// Draws random OUI-prefixed addresses until one is free.
    fn generate_mac<R: Rng + ?Sized>(&self, rng: &mut R) -> MacAddress {
        loop {
            let candidate = MacAddress::with_oui(rng.random());
            if self.by_mac(candidate).is_none() {
                return candidate;
            }
        }
    }

    /// The lowest channel number `>= 1` no current member holds.
    fn next_channel(&self) -> u32 {
        let taken: BTreeSet<u32> = self.members.iter().map(|m| m.channel).collect();
        (1..).find(|channel| !taken.contains(channel)).unwrap_or(1)
    }

    pub(crate) fn by_peer(&self, peer: ConnectionId) -> Option<&Member> {
        self.members.iter().find(|m| m.peer == peer)
    }

    pub(crate) fn by_peer_mut(&mut self, peer: ConnectionId) -> Option<&mut Member> {
        self.members.iter_mut().find(|m| m.peer == peer)
    }

    pub(crate) fn by_mac(&self, mac: MacAddress) -> Option<&Member> {
        self.members.iter().find(|m| m.mac_address == mac)
    }

    pub(crate) fn remove_by_peer(&mut self, peer: ConnectionId) -> Option<Member> {
        let index = self.members.iter().position(|m| m.peer == peer)?;
        Some(self.members.remove(index))
    }

    pub(crate) fn snapshot(&self) -> Vec<Member> {
        self.members.clone()
    }

    pub(crate) fn information(&self) -> Vec<MemberInformation> {
        self.members.iter().map(Member::to_information).collect()
    }

    /// `(peer, channel)` of every member.
    pub(crate) fn routes(&self) -> Vec<(ConnectionId, u32)> {
        self.members.iter().map(|m| (m.peer, m.channel)).collect()
    }

    pub(crate) fn clear(&mut self) {
        self.members.clear();
    }
}

/// Builds a room GUID: eight random zero-padded 4-digit decimal groups.
pub(crate) fn generate_guid<R: Rng + ?Sized>(rng: &mut R) -> String {
    (0..8)
        .map(|_| format!("{:04}", rng.random_range(0..10_000u32)))
        .collect()
}

// =========================================================================
// Tests
// =========================================================================
