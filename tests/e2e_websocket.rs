use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

use watchroom::db::MemoryRoomStore;
use watchroom::{build_router, AppState, Config};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn start_server() -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let state = Arc::new(AppState::new(Config::default(), Arc::new(MemoryRoomStore::new())));
    tokio::spawn(async move {
        axum::serve(listener, build_router(state)).await.unwrap();
    });
    addr
}

async fn connect(addr: SocketAddr) -> Socket {
    let (socket, _) = connect_async(format!("ws://{}/ws", addr)).await.unwrap();
    socket
}

async fn send(socket: &mut Socket, value: Value) {
    socket.send(Message::text(value.to_string())).await.unwrap();
}

/// Next JSON message, failing the test after a few seconds of silence
async fn recv(socket: &mut Socket) -> Value {
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(5), socket.next())
            .await
            .expect("timed out waiting for a message")
            .expect("socket closed")
            .unwrap();
        if let Message::Text(text) = frame {
            return serde_json::from_str(text.as_str()).unwrap();
        }
    }
}

async fn recv_type(socket: &mut Socket, kind: &str) -> Value {
    let message = recv(socket).await;
    assert_eq!(message["type"], kind, "unexpected message: {}", message);
    message
}

async fn join(socket: &mut Socket, room_id: &str, user_id: &str) -> Value {
    send(socket, json!({"type": "join", "roomId": room_id, "userId": user_id, "displayName": user_id})).await;
    recv_type(socket, "joined").await
}

#[tokio::test]
async fn test_watch_party_session() {
    let addr = start_server().await;
    let mut host = connect(addr).await;
    let mut guest = connect(addr).await;

    let joined = join(&mut host, "movie", "u1").await;
    assert_eq!(joined["isHost"], true);
    assert_eq!(joined["playbackState"]["positionSeconds"], 0.0);

    let joined = join(&mut guest, "movie", "u2").await;
    assert_eq!(joined["isHost"], false);
    assert_eq!(joined["members"].as_array().unwrap().len(), 2);
    let member_joined = recv_type(&mut host, "memberJoined").await;
    assert_eq!(member_joined["userId"], "u2");

    // Guests cannot drive playback
    send(&mut guest, json!({"type": "play", "position": 3.0})).await;
    let error = recv_type(&mut guest, "error").await;
    assert_eq!(error["code"], "not_host");

    send(&mut host, json!({"type": "setVideo", "url": "https://a.test/v.mp4"})).await;
    assert_eq!(recv_type(&mut host, "videoSet").await["url"], "https://a.test/v.mp4");
    assert_eq!(recv_type(&mut guest, "videoSet").await["url"], "https://a.test/v.mp4");

    send(&mut host, json!({"type": "play", "position": 4.5})).await;
    assert_eq!(recv_type(&mut guest, "play").await["position"], 4.5);

    send(&mut guest, json!({"type": "sendComment", "text": "hi", "position": 12.5})).await;
    for socket in [&mut guest, &mut host] {
        let received = recv_type(socket, "commentReceived").await;
        assert_eq!(received["comment"]["text"], "hi");
        assert_eq!(received["comment"]["authorId"], "u2");
        assert_eq!(received["comment"]["videoPositionSeconds"], 12.5);
    }

    // A late joiner sees the current state and the history
    let mut late = connect(addr).await;
    let joined = join(&mut late, "movie", "u3").await;
    assert_eq!(joined["playbackState"]["videoUrl"], "https://a.test/v.mp4");
    assert_eq!(joined["playbackState"]["isPlaying"], true);
    assert_eq!(joined["commentHistory"][0]["text"], "hi");
    recv_type(&mut host, "memberJoined").await;
    recv_type(&mut guest, "memberJoined").await;

    // Host drops its socket: earliest remaining member takes over
    host.close(None).await.unwrap();
    for socket in [&mut guest, &mut late] {
        assert_eq!(recv_type(socket, "memberLeft").await["userId"], "u1");
        assert_eq!(recv_type(socket, "hostChanged").await["newHostId"], "u2");
    }

    send(&mut guest, json!({"type": "pause", "position": 20.0})).await;
    assert_eq!(recv_type(&mut late, "pause").await["position"], 20.0);
}

#[tokio::test]
async fn test_ping_and_malformed_messages() {
    let addr = start_server().await;
    let mut socket = connect(addr).await;

    send(&mut socket, json!({"type": "ping"})).await;
    assert!(recv_type(&mut socket, "pong").await["date"].is_string());

    socket.send(Message::text("not json")).await.unwrap();
    assert_eq!(recv_type(&mut socket, "error").await["code"], "invalid_message");

    send(&mut socket, json!({"type": "seek", "position": 1.0})).await;
    assert_eq!(recv_type(&mut socket, "error").await["code"], "not_member");

    send(&mut socket, json!({"type": "join", "roomId": "", "userId": "u1"})).await;
    assert_eq!(recv_type(&mut socket, "error").await["code"], "validation");
}

#[tokio::test]
async fn test_http_endpoints() {
    let addr = start_server().await;
    let client = reqwest::Client::new();

    let health: Value = client
        .get(format!("http://{}/api/health", addr))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "ok");
    assert_eq!(health["service"], "watchroom");

    let ready: Value = client
        .get(format!("http://{}/api/ready", addr))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(ready["store"], "memory");

    let mut socket = connect(addr).await;
    join(&mut socket, "movie", "u1").await;

    let diagnostics: Value = client
        .get(format!("http://{}/api/v1/diagnostics", addr))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(diagnostics["n_rooms"], 1);
    assert_eq!(diagnostics["n_members"], 1);
    assert_eq!(diagnostics["n_conn"], 1);

    let missing = client.get(format!("http://{}/api/nope", addr)).send().await.unwrap();
    assert_eq!(missing.status(), reqwest::StatusCode::NOT_FOUND);
}
