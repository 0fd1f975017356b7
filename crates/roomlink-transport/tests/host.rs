//! Integration tests for the server and client hosts.
//!
//! These run a real server host on a loopback port chosen by the OS and
//! connect real client hosts to it.

use std::net::SocketAddr;
use std::time::Duration;

use roomlink_transport::{ClientHost, HostEvent, ServerHost, TransportError};

const STEP: Duration = Duration::from_millis(50);
const PATIENCE: Duration = Duration::from_secs(5);

/// Services `host` until it produces an event, or panics after a while.
async fn next_server_event(host: &mut ServerHost) -> HostEvent {
    let deadline = tokio::time::Instant::now() + PATIENCE;
    while tokio::time::Instant::now() < deadline {
        if let Some(event) = host.service(STEP).await.expect("server endpoint alive") {
            return event;
        }
    }
    panic!("server host produced no event");
}

async fn next_client_event(host: &mut ClientHost) -> HostEvent {
    let deadline = tokio::time::Instant::now() + PATIENCE;
    while tokio::time::Instant::now() < deadline {
        if let Some(event) = host.service(STEP).await.expect("client endpoint alive") {
            return event;
        }
    }
    panic!("client host produced no event");
}

async fn bind(max_peers: usize) -> (ServerHost, SocketAddr) {
    let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
    let host = ServerHost::bind(addr, max_peers).await.expect("should bind");
    let local = host.local_addr();
    (host, local)
}

#[tokio::test]
async fn test_frames_flow_both_ways_with_channel() {
    let (mut server, addr) = bind(4).await;
    let mut client = ClientHost::connect("127.0.0.1", addr.port(), PATIENCE)
        .await
        .expect("should connect");

    let HostEvent::Connect { peer, .. } = next_server_event(&mut server).await else {
        panic!("expected a connect event");
    };
    assert_eq!(server.peer_count(), 1);

    client.send(3, b"up").unwrap();
    assert_eq!(
        next_server_event(&mut server).await,
        HostEvent::Receive {
            peer,
            channel: 3,
            data: b"up".to_vec(),
        }
    );

    server.send(peer, 7, b"down").unwrap();
    let HostEvent::Receive { channel, data, .. } = next_client_event(&mut client).await else {
        panic!("expected a receive event");
    };
    assert_eq!(channel, 7);
    assert_eq!(data, b"down");
}

#[tokio::test]
async fn test_frames_arrive_in_send_order() {
    let (mut server, addr) = bind(4).await;
    let client = ClientHost::connect("127.0.0.1", addr.port(), PATIENCE)
        .await
        .unwrap();
    let _ = next_server_event(&mut server).await;

    let sender = client.sender();
    for i in 0..50u8 {
        sender.send(1, &[i]).unwrap();
    }
    for i in 0..50u8 {
        let HostEvent::Receive { data, .. } = next_server_event(&mut server).await else {
            panic!("expected a receive event");
        };
        assert_eq!(data, vec![i]);
    }
}

#[tokio::test]
async fn test_client_disconnect_reports_disconnect_on_server() {
    let (mut server, addr) = bind(4).await;
    let mut client = ClientHost::connect("127.0.0.1", addr.port(), PATIENCE)
        .await
        .unwrap();
    let HostEvent::Connect { peer, .. } = next_server_event(&mut server).await else {
        panic!("expected a connect event");
    };

    client.disconnect().await;

    assert_eq!(next_server_event(&mut server).await, HostEvent::Disconnect { peer });
    assert_eq!(server.peer_count(), 0);
}

#[tokio::test]
async fn test_server_disconnect_flushes_then_closes_client() {
    let (mut server, addr) = bind(4).await;
    let mut client = ClientHost::connect("127.0.0.1", addr.port(), PATIENCE)
        .await
        .unwrap();
    let HostEvent::Connect { peer, .. } = next_server_event(&mut server).await else {
        panic!("expected a connect event");
    };

    server.send(peer, 1, b"bye").unwrap();
    server.disconnect(peer);
    assert!(matches!(
        server.send(peer, 1, b"late"),
        Err(TransportError::UnknownPeer(_))
    ));

    let HostEvent::Receive { data, .. } = next_client_event(&mut client).await else {
        panic!("queued frame should arrive before the close");
    };
    assert_eq!(data, b"bye");
    assert!(matches!(
        next_client_event(&mut client).await,
        HostEvent::Disconnect { .. }
    ));
}

#[tokio::test]
async fn test_host_full_refuses_extra_connection() {
    let (mut server, addr) = bind(1).await;
    let _first = ClientHost::connect("127.0.0.1", addr.port(), PATIENCE)
        .await
        .unwrap();
    let _ = next_server_event(&mut server).await;

    let second = ClientHost::connect("127.0.0.1", addr.port(), PATIENCE).await;
    assert!(matches!(
        second,
        Err(TransportError::Handshake(_) | TransportError::ConnectFailed(_))
    ));
}

#[tokio::test]
async fn test_shutdown_disconnects_clients() {
    let (mut server, addr) = bind(4).await;
    let mut client = ClientHost::connect("127.0.0.1", addr.port(), PATIENCE)
        .await
        .unwrap();
    let _ = next_server_event(&mut server).await;

    server.shutdown().await;

    assert!(matches!(
        next_client_event(&mut client).await,
        HostEvent::Disconnect { .. }
    ));
}

#[tokio::test]
async fn test_connect_to_closed_port_fails() {
    // Bind and drop to get a port nobody listens on.
    let (server, addr) = bind(1).await;
    drop(server);
    tokio::time::sleep(STEP).await;

    let result = ClientHost::connect("127.0.0.1", addr.port(), PATIENCE).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_connect_to_unresolvable_host_is_invalid_address() {
    let result = ClientHost::connect("no such host name", 1, PATIENCE).await;
    assert!(matches!(result, Err(TransportError::InvalidAddress(_))));
}
