//! Integration tests for `RoomMember` against a real room on loopback.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use roomlink_member::{ConnectionState, MemberConfig, MemberError, RoomMember};
use roomlink_protocol::{
    BROADCAST_MAC, ChatEntry, GameInfo, MacAddress, NINTENDO_OUI, NO_PREFERRED_MAC, RoomInformation,
    WifiPacket, WifiPacketType,
};
use roomlink_room::{Room, RoomConfig};

const PATIENCE: Duration = Duration::from_secs(5);
const STEP: Duration = Duration::from_millis(20);

// =========================================================================
// Helpers
// =========================================================================

fn open_room(member_slots: u32) -> (Room, u16) {
    let room = Room::new(RoomConfig {
        member_slots,
        ..RoomConfig::default()
    });
    room.create("TestRoom", "127.0.0.1", 0).expect("room should open");
    let port = room.room_information().port;
    (room, port)
}

fn quick_member() -> RoomMember {
    RoomMember::new(MemberConfig {
        connect_timeout: Duration::from_secs(1),
        ..MemberConfig::default()
    })
}

fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + PATIENCE;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(STEP);
    }
    condition()
}

fn joined_member(port: u16, nickname: &str) -> RoomMember {
    let member = quick_member();
    member.join(nickname, "127.0.0.1", port, NO_PREFERRED_MAC);
    assert!(
        wait_until(|| member.state() == ConnectionState::Joined),
        "{nickname} should join, state is {}",
        member.state()
    );
    member
}

/// Collects every event of type `T` the member delivers.
fn record<T: roomlink_member::MemberEvent + Clone>(member: &RoomMember) -> Arc<Mutex<Vec<T>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    member.connect(move |event: &T| sink.lock().push(event.clone()));
    seen
}

fn unused_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind scratch listener");
    listener.local_addr().expect("scratch listener addr").port()
}

// =========================================================================
// Joining
// =========================================================================

#[test]
fn test_join_assigns_address_and_room_information() {
    let (room, port) = open_room(2);
    let member = joined_member(port, "alice");

    assert!(member.is_connected());
    assert_eq!(member.nickname(), "alice");
    assert!(member.mac_address().has_prefix(NINTENDO_OUI));
    assert!(wait_until(|| member.room_information().name == "TestRoom"));
    assert_eq!(member.room_information().member_slots, 2);
    assert_eq!(member.room_information().guid, room.room_information().guid);

    let members = room.room_member_list();
    assert_eq!(members.len(), 1);
    assert_eq!(members[0].channel, 1);
    assert_eq!(members[0].mac_address, member.mac_address());
}

#[test]
fn test_join_reports_joining_then_joined_then_idle() {
    let (_room, port) = open_room(4);
    let member = quick_member();
    let states = record::<ConnectionState>(&member);

    member.join("alice", "127.0.0.1", port, NO_PREFERRED_MAC);
    assert!(wait_until(|| member.state() == ConnectionState::Joined));
    member.leave().expect("leave should succeed");

    assert_eq!(
        *states.lock(),
        vec![ConnectionState::Joining, ConnectionState::Joined, ConnectionState::Idle]
    );
    assert!(!member.is_connected());
}

#[test]
fn test_join_with_taken_nickname_is_name_collision() {
    let (room, port) = open_room(4);
    let _alice = joined_member(port, "alice");

    let impostor = quick_member();
    impostor.join("alice", "127.0.0.1", port, NO_PREFERRED_MAC);

    assert!(wait_until(|| impostor.state() == ConnectionState::NameCollision));
    assert!(!impostor.is_connected());
    assert_eq!(room.room_member_list().len(), 1);
}

#[test]
fn test_join_with_taken_mac_is_mac_collision() {
    let (_room, port) = open_room(4);
    let alice = joined_member(port, "alice");

    let bob = quick_member();
    bob.join("bob", "127.0.0.1", port, alice.mac_address());

    assert!(wait_until(|| bob.state() == ConnectionState::MacCollision));
}

#[test]
fn test_join_with_preferred_mac_gets_it() {
    let (_room, port) = open_room(4);
    let wanted = MacAddress([0x00, 0x1F, 0x32, 0x12, 0x34, 0x56]);

    let member = quick_member();
    member.join("alice", "127.0.0.1", port, wanted);

    assert!(wait_until(|| member.state() == ConnectionState::Joined));
    assert_eq!(member.mac_address(), wanted);
}

#[test]
fn test_join_full_room_is_room_is_full() {
    let (_room, port) = open_room(1);
    let _alice = joined_member(port, "alice");

    let bob = quick_member();
    bob.join("bob", "127.0.0.1", port, NO_PREFERRED_MAC);

    assert!(wait_until(|| bob.state() == ConnectionState::RoomIsFull));
}

#[test]
fn test_two_members_see_each_other() {
    let (room, port) = open_room(2);
    let alice = joined_member(port, "alice");
    let bob = joined_member(port, "bob");

    assert!(wait_until(|| alice.member_information().len() == 2));
    assert!(wait_until(|| bob.member_information().len() == 2));
    let nicknames: Vec<String> = alice.member_information().into_iter().map(|m| m.nickname).collect();
    assert!(nicknames.contains(&"alice".to_owned()));
    assert!(nicknames.contains(&"bob".to_owned()));

    let bob_channel = room
        .room_member_list()
        .into_iter()
        .find(|m| m.nickname == "bob")
        .map(|m| m.channel);
    assert_eq!(bob_channel, Some(2));
}

#[test]
fn test_join_while_connected_is_ignored() {
    let (room, port) = open_room(4);
    let member = joined_member(port, "alice");
    let mac = member.mac_address();

    member.join("someone-else", "127.0.0.1", port, NO_PREFERRED_MAC);

    assert_eq!(member.state(), ConnectionState::Joined);
    assert_eq!(member.nickname(), "alice");
    assert_eq!(member.mac_address(), mac);
    assert_eq!(room.room_member_list().len(), 1);
}

#[test]
fn test_member_can_rejoin_after_leaving() {
    let (room, port) = open_room(4);
    let member = joined_member(port, "alice");
    member.leave().expect("leave should succeed");
    assert!(wait_until(|| room.room_member_list().is_empty()));

    member.join("alice", "127.0.0.1", port, NO_PREFERRED_MAC);

    assert!(wait_until(|| member.state() == ConnectionState::Joined));
    assert_eq!(room.room_member_list().len(), 1);
}

#[test]
fn test_leave_from_joining_callback_settles_idle() {
    let (room, port) = open_room(4);
    let member = Arc::new(quick_member());
    let states = record::<ConnectionState>(&member);
    let weak = Arc::downgrade(&member);
    member.connect(move |state: &ConnectionState| {
        if *state == ConnectionState::Joining {
            if let Some(member) = weak.upgrade() {
                member.leave().expect("leave should succeed");
            }
        }
    });

    let (done_tx, done_rx) = mpsc::channel();
    let joiner = Arc::clone(&member);
    thread::spawn(move || {
        joiner.join("alice", "127.0.0.1", port, NO_PREFERRED_MAC);
        let _ = done_tx.send(());
    });

    assert!(done_rx.recv_timeout(PATIENCE).is_ok(), "join should return");
    assert_eq!(member.state(), ConnectionState::Idle);
    assert_eq!(*states.lock(), vec![ConnectionState::Joining, ConnectionState::Idle]);
    thread::sleep(Duration::from_millis(200));
    assert!(room.room_member_list().is_empty());
    assert_eq!(member.state(), ConnectionState::Idle);
}

#[test]
fn test_leave_racing_join_never_strands_joining() {
    let (_room, port) = open_room(4);
    let member = Arc::new(quick_member());

    for _ in 0..20 {
        let joiner = Arc::clone(&member);
        let join = thread::spawn(move || joiner.join("alice", "127.0.0.1", port, NO_PREFERRED_MAC));
        let _ = member.leave();
        join.join().expect("join should not panic");
        let _ = member.leave();

        assert!(
            wait_until(|| !member.is_connected()),
            "state is {}",
            member.state()
        );
    }
}

// =========================================================================

#[test]
fn test_join_closed_port_is_could_not_connect() {
    let port = unused_port();
    let member = quick_member();
    let states = record::<ConnectionState>(&member);

    member.join("alice", "127.0.0.1", port, NO_PREFERRED_MAC);

    assert_eq!(member.state(), ConnectionState::CouldNotConnect);
    assert_eq!(*states.lock(), vec![ConnectionState::CouldNotConnect]);
}

#[test]
fn test_join_unresolvable_address_is_error() {
    let member = quick_member();
    member.join("alice", "no such host name", 24872, NO_PREFERRED_MAC);
    assert_eq!(member.state(), ConnectionState::Error);
}

#[test]
fn test_room_destroy_is_lost_connection() {
    let (room, port) = open_room(4);
    let member = joined_member(port, "alice");

    room.destroy();

    assert!(wait_until(|| member.state() == ConnectionState::LostConnection));
    assert!(matches!(member.leave(), Err(MemberError::NotConnected)));
}

// =========================================================================
// Sending
// =========================================================================

#[test]
fn test_send_before_join_is_not_joined() {
    let member = quick_member();
    assert!(matches!(member.send_chat_message("hi"), Err(MemberError::NotJoined)));
    assert!(matches!(
        member.send_wifi_packet(&WifiPacket::default()),
        Err(MemberError::NotJoined)
    ));
    assert!(matches!(
        member.send_game_info(&GameInfo::default()),
        Err(MemberError::NotJoined)
    ));
}

#[test]
fn test_leave_when_idle_is_not_connected() {
    let member = quick_member();
    assert!(matches!(member.leave(), Err(MemberError::NotConnected)));
    assert_eq!(member.state(), ConnectionState::Idle);
}

#[test]
fn test_chat_reaches_other_members_with_sender_nickname() {
    let (_room, port) = open_room(4);
    let alice = joined_member(port, "alice");
    let bob = joined_member(port, "bob");
    let alice_chat = record::<ChatEntry>(&alice);
    let bob_chat = record::<ChatEntry>(&bob);

    alice.send_chat_message("hello").expect("chat should send");

    let expected = ChatEntry {
        nickname: "alice".into(),
        message: "hello".into(),
    };
    assert!(wait_until(|| bob_chat.lock().contains(&expected)));
    thread::sleep(Duration::from_millis(200));
    assert!(alice_chat.lock().is_empty());
}

#[test]
fn test_broadcast_wifi_packet_skips_sender() {
    let (_room, port) = open_room(4);
    let alice = joined_member(port, "alice");
    let bob = joined_member(port, "bob");
    let carol = joined_member(port, "carol");
    let alice_frames = record::<WifiPacket>(&alice);
    let bob_frames = record::<WifiPacket>(&bob);
    let carol_frames = record::<WifiPacket>(&carol);

    let frame = WifiPacket {
        kind: WifiPacketType::Beacon,
        data: vec![1, 2, 3],
        transmitter_address: alice.mac_address(),
        destination_address: BROADCAST_MAC,
        channel: 1,
    };
    alice.send_wifi_packet(&frame).expect("frame should send");

    assert!(wait_until(|| bob_frames.lock().contains(&frame)));
    assert!(wait_until(|| carol_frames.lock().contains(&frame)));
    thread::sleep(Duration::from_millis(200));
    assert!(alice_frames.lock().is_empty());
}

#[test]
fn test_unicast_wifi_packet_reaches_only_destination() {
    let (_room, port) = open_room(4);
    let alice = joined_member(port, "alice");
    let bob = joined_member(port, "bob");
    let carol = joined_member(port, "carol");
    let bob_frames = record::<WifiPacket>(&bob);
    let carol_frames = record::<WifiPacket>(&carol);

    let frame = WifiPacket {
        kind: WifiPacketType::Data,
        data: vec![0xAB; 64],
        transmitter_address: alice.mac_address(),
        destination_address: bob.mac_address(),
        channel: 6,
    };
    alice.send_wifi_packet(&frame).expect("frame should send");

    assert!(wait_until(|| bob_frames.lock().len() == 1));
    assert_eq!(bob_frames.lock()[0], frame);
    thread::sleep(Duration::from_millis(200));
    assert!(carol_frames.lock().is_empty());
}

#[test]
fn test_game_info_shows_up_for_other_members() {
    let (_room, port) = open_room(4);
    let alice = joined_member(port, "alice");
    let bob = joined_member(port, "bob");
    let game = GameInfo {
        name: "Puzzle League".into(),
        id: 0x0004_0000_0012_3400,
    };

    alice.send_game_info(&game).expect("game info should send");

    assert!(wait_until(|| {
        bob.member_information()
            .iter()
            .any(|m| m.nickname == "alice" && m.game_info == game)
    }));
}

#[test]
fn test_ping_echo_is_measured_by_room() {
    let room = Room::new(RoomConfig {
        member_slots: 4,
        broadcast_interval: Duration::from_millis(50),
        ..RoomConfig::default()
    });
    room.create("TestRoom", "127.0.0.1", 0).expect("room should open");
    let member = joined_member(room.room_information().port, "alice");

    assert!(wait_until(|| room.room_member_list()[0].ping > Duration::ZERO));
    assert!(wait_until(|| {
        member
            .member_information()
            .first()
            .is_some_and(|m| m.ping > Duration::ZERO)
    }));
}

// =========================================================================
// Callbacks
// =========================================================================

#[test]
fn test_room_information_callback_fires_on_membership_change() {
    let (_room, port) = open_room(4);
    let alice = joined_member(port, "alice");
    let updates = record::<RoomInformation>(&alice);

    let bob = joined_member(port, "bob");
    assert!(wait_until(|| !updates.lock().is_empty()));
    assert!(wait_until(|| alice.member_information().len() == 2));

    bob.leave().expect("leave should succeed");
    assert!(wait_until(|| alice.member_information().len() == 1));
}

#[test]
fn test_room_information_callback_sees_matching_member_list() {
    let (_room, port) = open_room(4);
    let alice = Arc::new(joined_member(port, "alice"));
    let seen = Arc::new(Mutex::new(Vec::new()));
    {
        let seen = Arc::clone(&seen);
        let weak = Arc::downgrade(&alice);
        alice.connect(move |info: &RoomInformation| {
            if let Some(alice) = weak.upgrade() {
                seen.lock().push((alice.room_information() == *info, alice.member_information().len()));
            }
        });
    }

    let _bob = joined_member(port, "bob");

    assert!(wait_until(|| seen.lock().iter().any(|&(_, members)| members == 2)));
    assert!(seen.lock().iter().all(|&(matches, _)| matches));
}

#[test]
fn test_disconnected_callback_is_not_called() {
    let (_room, port) = open_room(4);
    let alice = joined_member(port, "alice");
    let bob = joined_member(port, "bob");

    let count = Arc::new(AtomicUsize::new(0));
    let handle = {
        let count = Arc::clone(&count);
        bob.connect(move |_: &ChatEntry| {
            count.fetch_add(1, Ordering::SeqCst);
        })
    };
    let witness = record::<ChatEntry>(&bob);

    alice.send_chat_message("one").expect("chat should send");
    assert!(wait_until(|| witness.lock().len() == 1));
    assert!(bob.disconnect(handle));

    alice.send_chat_message("two").expect("chat should send");
    assert!(wait_until(|| witness.lock().len() == 2));

    assert_eq!(count.load(Ordering::SeqCst), 1);
    assert!(!bob.disconnect(handle));
}

#[test]
fn test_dropping_joined_member_leaves_room() {
    let (room, port) = open_room(4);
    let member = joined_member(port, "alice");
    assert_eq!(room.room_member_list().len(), 1);

    drop(member);

    assert!(wait_until(|| room.room_member_list().is_empty()));
}
