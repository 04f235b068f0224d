//! Relay integration tests
//!
//! Drives the relay over real WebSocket connections and verifies the
//! broadcast and presence contract end to end: echo-inclusive fan-out,
//! full-set presence synchronization, and delivery stopping on leave.

use std::net::SocketAddr;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use roomcast_core::{
    wire, ChatMessage, ClientFrame, ErrorCode, PresenceMeta, RoomId, ServerFrame, UserId,
    UserProfile, MESSAGE_EVENT,
};
use roomcast_relay::{RelayConfig, RelayServer};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

const RECV_TIMEOUT: Duration = Duration::from_secs(5);
const QUIET_WINDOW: Duration = Duration::from_millis(200);

// ----------------------------------------------------------------------------
// Test Harness
// ----------------------------------------------------------------------------

async fn spawn_relay() -> SocketAddr {
    let server = RelayServer::bind(RelayConfig::for_tests())
        .await
        .expect("relay bind failed");
    let addr = server.local_addr();
    tokio::spawn(server.run());
    addr
}

async fn connect(addr: SocketAddr) -> Client {
    let (client, _) = connect_async(format!("ws://{}", addr))
        .await
        .expect("client connect failed");
    client
}

async fn send(client: &mut Client, frame: &ClientFrame) {
    let text = wire::encode(frame).expect("frame encode failed");
    client
        .send(Message::Text(text))
        .await
        .expect("frame send failed");
}

/// Receive the next protocol frame, skipping transport-level messages
async fn recv_frame(client: &mut Client) -> ServerFrame {
    loop {
        let msg = tokio::time::timeout(RECV_TIMEOUT, client.next())
            .await
            .expect("timed out waiting for frame")
            .expect("stream ended unexpectedly")
            .expect("websocket error");
        if let Message::Text(text) = msg {
            return wire::decode(&text).expect("frame decode failed");
        }
    }
}

/// Assert that no further protocol frame arrives within the quiet window
async fn assert_quiet(client: &mut Client) {
    let outcome = tokio::time::timeout(QUIET_WINDOW, client.next()).await;
    match outcome {
        Err(_) => {}                          // timed out: quiet, as expected
        Ok(None) => {}                        // stream ended: nothing more can fire
        Ok(Some(Ok(Message::Close(_)))) => {} // orderly close, no frame
        Ok(Some(Err(_))) => {}                // torn connection: equally final
        Ok(Some(Ok(msg))) => panic!("expected quiet, got {:?}", msg),
    }
}

fn profile(name: &str) -> UserProfile {
    UserProfile {
        user_id: UserId::new(name),
        email: format!("{}@example.com", name),
        display_name: Some(name.to_string()),
        avatar_url: None,
    }
}

fn members(frame: ServerFrame) -> Vec<UserId> {
    match frame {
        ServerFrame::PresenceSync { members } => members,
        other => panic!("expected presence sync, got {:?}", other),
    }
}

/// Join a room and consume the ack and initial presence snapshot
async fn join(client: &mut Client, room: &RoomId, user: &UserId) -> Vec<UserId> {
    send(
        client,
        &ClientFrame::Join {
            room: room.clone(),
            token: format!("tok-{}", user),
            presence_key: user.clone(),
        },
    )
    .await;
    match recv_frame(client).await {
        ServerFrame::Joined { room: joined } => assert_eq!(&joined, room),
        other => panic!("expected joined ack, got {:?}", other),
    }
    members(recv_frame(client).await)
}

async fn track(client: &mut Client, user: &UserId) {
    send(
        client,
        &ClientFrame::Track {
            meta: PresenceMeta::new(user.clone()),
        },
    )
    .await;
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[tokio::test]
async fn two_clients_exchange_one_message() {
    let addr = spawn_relay().await;
    let room = RoomId::new("room_one");
    let alice = profile("alice");
    let bob = profile("bob");

    let mut a = connect(addr).await;
    let snapshot = join(&mut a, &room, &alice.user_id).await;
    assert!(snapshot.is_empty());
    track(&mut a, &alice.user_id).await;
    assert_eq!(members(recv_frame(&mut a).await), vec![alice.user_id.clone()]);

    let mut b = connect(addr).await;
    // B's initial snapshot already contains A
    let snapshot = join(&mut b, &room, &bob.user_id).await;
    assert_eq!(snapshot, vec![alice.user_id.clone()]);
    track(&mut b, &bob.user_id).await;

    // Both clients converge on the full set
    let full = vec![alice.user_id.clone(), bob.user_id.clone()];
    assert_eq!(members(recv_frame(&mut a).await), full);
    assert_eq!(members(recv_frame(&mut b).await), full);

    // A broadcasts; both A (echo) and B receive exactly one copy
    let message = ChatMessage::compose(room.clone(), &alice, "hi");
    send(
        &mut a,
        &ClientFrame::Broadcast {
            event: MESSAGE_EVENT.to_string(),
            message: message.clone(),
        },
    )
    .await;

    for client in [&mut a, &mut b] {
        match recv_frame(client).await {
            ServerFrame::Broadcast { event, message: received } => {
                assert_eq!(event, MESSAGE_EVENT);
                assert_eq!(received.id, message.id);
                assert_eq!(received.body, "hi");
                assert_eq!(received.sender, alice.user_id);
            }
            other => panic!("expected broadcast, got {:?}", other),
        }
        assert_quiet(client).await;
    }
}

#[tokio::test]
async fn join_requires_token() {
    let addr = spawn_relay().await;
    let mut client = connect(addr).await;

    send(
        &mut client,
        &ClientFrame::Join {
            room: RoomId::new("room_one"),
            token: "  ".to_string(),
            presence_key: UserId::new("alice"),
        },
    )
    .await;

    match recv_frame(&mut client).await {
        ServerFrame::Error { code, .. } => assert_eq!(code, ErrorCode::Unauthorized),
        other => panic!("expected unauthorized error, got {:?}", other),
    }
}

#[tokio::test]
async fn frames_before_join_are_rejected() {
    let addr = spawn_relay().await;
    let room = RoomId::new("room_one");
    let alice = profile("alice");
    let mut client = connect(addr).await;

    send(
        &mut client,
        &ClientFrame::Broadcast {
            event: MESSAGE_EVENT.to_string(),
            message: ChatMessage::compose(room, &alice, "too early"),
        },
    )
    .await;

    match recv_frame(&mut client).await {
        ServerFrame::Error { code, .. } => assert_eq!(code, ErrorCode::NotJoined),
        other => panic!("expected not-joined error, got {:?}", other),
    }
}

#[tokio::test]
async fn heartbeat_is_acknowledged() {
    let addr = spawn_relay().await;
    let room = RoomId::new("room_one");
    let alice = profile("alice");

    let mut client = connect(addr).await;
    join(&mut client, &room, &alice.user_id).await;

    send(&mut client, &ClientFrame::Heartbeat { nonce: 41 }).await;
    match recv_frame(&mut client).await {
        ServerFrame::HeartbeatAck { nonce } => assert_eq!(nonce, 41),
        other => panic!("expected heartbeat ack, got {:?}", other),
    }
}

#[tokio::test]
async fn leave_stops_delivery() {
    let addr = spawn_relay().await;
    let room = RoomId::new("room_one");
    let alice = profile("alice");
    let bob = profile("bob");

    let mut a = connect(addr).await;
    join(&mut a, &room, &alice.user_id).await;
    track(&mut a, &alice.user_id).await;
    assert_eq!(members(recv_frame(&mut a).await), vec![alice.user_id.clone()]);

    let mut b = connect(addr).await;
    join(&mut b, &room, &bob.user_id).await;
    track(&mut b, &bob.user_id).await;
    let full = vec![alice.user_id.clone(), bob.user_id.clone()];
    assert_eq!(members(recv_frame(&mut a).await), full);
    assert_eq!(members(recv_frame(&mut b).await), full);

    // B leaves; A is resynced down to itself
    send(&mut b, &ClientFrame::Leave).await;
    assert_eq!(members(recv_frame(&mut a).await), vec![alice.user_id.clone()]);

    // A broadcast after the leave never reaches B
    send(
        &mut a,
        &ClientFrame::Broadcast {
            event: MESSAGE_EVENT.to_string(),
            message: ChatMessage::compose(room.clone(), &alice, "anyone there?"),
        },
    )
    .await;
    match recv_frame(&mut a).await {
        ServerFrame::Broadcast { message, .. } => assert_eq!(message.body, "anyone there?"),
        other => panic!("expected echo broadcast, got {:?}", other),
    }
    assert_quiet(&mut b).await;
}

#[tokio::test]
async fn disconnect_removes_presence() {
    let addr = spawn_relay().await;
    let room = RoomId::new("room_one");
    let alice = profile("alice");
    let bob = profile("bob");

    let mut a = connect(addr).await;
    join(&mut a, &room, &alice.user_id).await;
    track(&mut a, &alice.user_id).await;
    assert_eq!(members(recv_frame(&mut a).await), vec![alice.user_id.clone()]);

    let mut b = connect(addr).await;
    join(&mut b, &room, &bob.user_id).await;
    track(&mut b, &bob.user_id).await;
    let full = vec![alice.user_id.clone(), bob.user_id.clone()];
    assert_eq!(members(recv_frame(&mut a).await), full);

    // B's transport drops without a leave frame
    drop(b);
    assert_eq!(members(recv_frame(&mut a).await), vec![alice.user_id.clone()]);
}

#[tokio::test]
async fn malformed_frames_do_not_kill_the_connection() {
    let addr = spawn_relay().await;
    let room = RoomId::new("room_one");
    let alice = profile("alice");

    let mut client = connect(addr).await;
    join(&mut client, &room, &alice.user_id).await;

    client
        .send(Message::Text("{\"type\":\"mystery\"}".to_string()))
        .await
        .expect("send failed");
    match recv_frame(&mut client).await {
        ServerFrame::Error { code, .. } => assert_eq!(code, ErrorCode::BadFrame),
        other => panic!("expected bad-frame error, got {:?}", other),
    }

    // The connection is still usable afterwards
    send(&mut client, &ClientFrame::Heartbeat { nonce: 7 }).await;
    match recv_frame(&mut client).await {
        ServerFrame::HeartbeatAck { nonce } => assert_eq!(nonce, 7),
        other => panic!("expected heartbeat ack, got {:?}", other),
    }
}
