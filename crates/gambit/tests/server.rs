//! End-to-end tests: a real server, real WebSocket clients, JSON on
//! the wire. These exercise the full stack the way a browser client
//! would drive it.

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use gambit::GambitServer;
use serde_json::{Value, json};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn start_server() -> SocketAddr {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("info")
        .with_test_writer()
        .try_init();

    let server = GambitServer::<gambit::protocol::JsonCodec>::builder()
        .bind("127.0.0.1:0")
        .build()
        .await
        .expect("bind server");
    let addr = server.local_addr().expect("local addr");
    tokio::spawn(server.run());
    addr
}

async fn connect(addr: SocketAddr) -> Client {
    let (client, _) = connect_async(format!("ws://{addr}")).await.expect("connect");
    client
}

async fn recv_frame(client: &mut Client) -> Value {
    loop {
        let message = timeout(Duration::from_secs(5), client.next())
            .await
            .expect("timed out waiting for frame")
            .expect("connection open")
            .expect("websocket error");
        if let Message::Text(text) = message {
            return serde_json::from_str(&text).expect("valid frame json");
        }
    }
}

/// Sends one request and reads frames until its correlated reply
/// arrives. Events that arrive in between are returned alongside.
async fn call(client: &mut Client, id: u64, op: Value) -> (Value, Vec<Value>) {
    let request = json!({ "id": id, "op": op });
    client
        .send(Message::text(request.to_string()))
        .await
        .expect("send request");

    let mut events = Vec::new();
    loop {
        let frame = recv_frame(client).await;
        if frame["kind"] == "Reply" && frame["id"] == id {
            return (frame["reply"].clone(), events);
        }
        if frame["kind"] == "Event" {
            events.push(frame["event"].clone());
        }
    }
}

/// Reads frames until an event of the given type shows up.
async fn expect_event(client: &mut Client, event_type: &str) -> Value {
    loop {
        let frame = recv_frame(client).await;
        if frame["kind"] == "Event" && frame["event"]["type"] == event_type {
            return frame["event"].clone();
        }
    }
}

/// Creates a private session for `white` and joins `black` through the
/// invite code. Returns the session id.
async fn start_game(white: &mut Client, black: &mut Client) -> String {
    let (reply, _) = call(
        white,
        1,
        json!({
            "type": "CreateSession", "name": "E2E", "private": true,
            "display_name": "Alice", "logical_id": "alice"
        }),
    )
    .await;
    assert_eq!(reply["type"], "SessionCreated");
    let code = reply["invite_code"].as_str().expect("invite code").to_string();

    let (reply, _) = call(
        black,
        1,
        json!({
            "type": "JoinByInviteCode", "code": code,
            "display_name": "Bob", "logical_id": "bob"
        }),
    )
    .await;
    assert_eq!(reply["type"], "Joined");

    reply["snapshot"]["session_id"]
        .as_str()
        .expect("session id")
        .to_string()
}

// =========================================================================

#[tokio::test]
async fn test_create_join_and_move_over_the_wire() {
    let addr = start_server().await;
    let mut alice = connect(addr).await;
    let mut bob = connect(addr).await;

    let (reply, _) = call(
        &mut alice,
        1,
        json!({
            "type": "CreateSession", "name": "Friendly", "private": true,
            "display_name": "Alice", "logical_id": "alice"
        }),
    )
    .await;
    assert_eq!(reply["type"], "SessionCreated");
    assert_eq!(reply["snapshot"]["your_color"], "white");
    assert_eq!(reply["snapshot"]["position_state"], "startpos");
    let code = reply["invite_code"].as_str().unwrap().to_string();
    assert_eq!(code.len(), 8);

    // Codes are case-insensitive on the wire too.
    let (reply, _) = call(
        &mut bob,
        1,
        json!({
            "type": "JoinByInviteCode", "code": code.to_lowercase(),
            "display_name": "Bob", "logical_id": "bob"
        }),
    )
    .await;
    assert_eq!(reply["type"], "Joined");
    assert_eq!(reply["snapshot"]["your_color"], "black");
    assert_eq!(reply["snapshot"]["status"], "InProgress");
    let session_id = reply["snapshot"]["session_id"].as_str().unwrap().to_string();

    // Both sides see the game start.
    let started = expect_event(&mut alice, "GameStarted").await;
    assert_eq!(started["white_name"], "Alice");
    assert_eq!(started["black_name"], "Bob");
    expect_event(&mut bob, "GameStarted").await;

    // White opens; both sides see the move.
    let (reply, _) = call(
        &mut alice,
        2,
        json!({
            "type": "SubmitMove", "session_id": session_id,
            "from": "e2", "to": "e4", "promotion": null,
            "position_after": "after-e4"
        }),
    )
    .await;
    assert_eq!(reply["type"], "MoveAccepted");
    assert_eq!(reply["move_number"], 1);
    assert_eq!(reply["next_turn"], "black");
    assert_eq!(reply["position_state"], "after-e4");

    for client in [&mut alice, &mut bob] {
        let moved = expect_event(client, "MoveApplied").await;
        assert_eq!(moved["from"], "e2");
        assert_eq!(moved["by"], "white");
    }

    // Black answers.
    let (reply, _) = call(
        &mut bob,
        2,
        json!({
            "type": "SubmitMove", "session_id": session_id,
            "from": "e7", "to": "e5", "promotion": null,
            "position_after": null
        }),
    )
    .await;
    assert_eq!(reply["type"], "MoveAccepted");
    assert_eq!(reply["move_number"], 2);
    assert_eq!(reply["next_turn"], "white");
}

#[tokio::test]
async fn test_out_of_turn_move_is_declined_and_connection_survives() {
    let addr = start_server().await;
    let mut alice = connect(addr).await;
    let mut bob = connect(addr).await;
    let session_id = start_game(&mut alice, &mut bob).await;

    let (reply, _) = call(
        &mut bob,
        2,
        json!({
            "type": "SubmitMove", "session_id": session_id,
            "from": "e7", "to": "e5", "promotion": null, "position_after": null
        }),
    )
    .await;
    assert_eq!(reply["type"], "Declined");
    assert_eq!(reply["reason"], "Forbidden");

    // A decline is a reply, not a disconnect: the next call still works.
    let (reply, _) = call(
        &mut bob,
        3,
        json!({ "type": "GetStatus", "session_id": session_id }),
    )
    .await;
    assert_eq!(reply["type"], "Status");
    assert_eq!(reply["snapshot"]["your_color"], "black");
}

#[tokio::test]
async fn test_unknown_session_is_declined_not_found() {
    let addr = start_server().await;
    let mut client = connect(addr).await;

    let (reply, _) = call(
        &mut client,
        1,
        json!({
            "type": "EnsureJoined", "session_id": "missing",
            "display_name": null, "logical_id": null
        }),
    )
    .await;
    assert_eq!(reply["type"], "Declined");
    assert_eq!(reply["reason"], "NotFound");
}

#[tokio::test]
async fn test_malformed_request_gets_uncorrelated_fault() {
    let addr = start_server().await;
    let mut client = connect(addr).await;

    client
        .send(Message::text("this is not json"))
        .await
        .expect("send");

    let frame = recv_frame(&mut client).await;
    assert_eq!(frame["kind"], "Reply");
    assert_eq!(frame["id"], 0);
    assert_eq!(frame["reply"]["type"], "Fault");
}

#[tokio::test]
async fn test_reconnect_resumes_seat_over_the_wire() {
    let addr = start_server().await;
    let mut alice = connect(addr).await;
    let mut bob = connect(addr).await;
    let session_id = start_game(&mut alice, &mut bob).await;

    // Bob's socket dies mid-game.
    bob.close(None).await.expect("close");
    drop(bob);

    // A fresh connection with the same logical id resumes the seat.
    let mut bob2 = connect(addr).await;
    let (reply, _) = call(
        &mut bob2,
        1,
        json!({
            "type": "EnsureJoined", "session_id": session_id,
            "display_name": "Bob", "logical_id": "bob"
        }),
    )
    .await;
    assert_eq!(reply["type"], "Joined");
    assert_eq!(reply["snapshot"]["your_color"], "black");
    assert_eq!(reply["snapshot"]["is_reconnecting"], true);
    assert_eq!(reply["snapshot"]["status"], "InProgress");
    assert_eq!(reply["snapshot"]["opponent_name"], "Alice");
}

#[tokio::test]
async fn test_lobby_lists_public_waiting_sessions() {
    let addr = start_server().await;
    let mut alice = connect(addr).await;
    let mut visitor = connect(addr).await;

    let (reply, _) = call(
        &mut alice,
        1,
        json!({
            "type": "CreateSession", "name": "Open Board", "private": false,
            "display_name": "Alice", "logical_id": "alice"
        }),
    )
    .await;
    assert_eq!(reply["type"], "SessionCreated");
    assert_eq!(reply["invite_code"], Value::Null);

    let (reply, _) = call(&mut visitor, 1, json!({ "type": "ListSessions" })).await;
    assert_eq!(reply["type"], "SessionList");
    let sessions = reply["sessions"].as_array().unwrap();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0]["name"], "Open Board");
    assert_eq!(sessions[0]["player_count"], 1);
    assert_eq!(sessions[0]["status"], "WaitingForSecondPlayer");
}

#[tokio::test]
async fn test_resign_notifies_the_opponent() {
    let addr = start_server().await;
    let mut alice = connect(addr).await;
    let mut bob = connect(addr).await;
    let session_id = start_game(&mut alice, &mut bob).await;

    let (reply, _) = call(
        &mut bob,
        2,
        json!({ "type": "Resign", "session_id": session_id }),
    )
    .await;
    assert_eq!(reply["type"], "Resigned");
    assert_eq!(reply["winner"], "white");

    let resigned = expect_event(&mut alice, "PlayerResigned").await;
    assert_eq!(resigned["by"], "black");
    assert_eq!(resigned["winner"], "white");
    assert_eq!(resigned["player_name"], "Bob");
}
