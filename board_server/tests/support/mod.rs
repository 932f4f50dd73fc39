// One-time server bootstrap and WebSocket helpers shared by integration tests.
#![allow(dead_code)]

use futures::{SinkExt, StreamExt};
use serde_json::Value;
use std::{
    sync::{Arc, OnceLock},
    time::Duration,
};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};

pub type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

// Global base URL used by all tests after the server publishes its bound address.
static SERVER_URL: OnceLock<String> = OnceLock::new();
static SERVER_READY: OnceLock<()> = OnceLock::new();

const RECV_TIMEOUT: Duration = Duration::from_secs(2);

// Ensure the test server is running and return the shared base URL.
pub fn ensure_server() -> &'static str {
    SERVER_READY.get_or_init(|| {
        let published_url = Arc::new(OnceLock::<String>::new());
        let published_url_thread = Arc::clone(&published_url);
        // The server gets its own OS thread and runtime so it outlives each `#[tokio::test]`.
        std::thread::spawn(move || {
            let runtime = tokio::runtime::Runtime::new().expect("test runtime");
            runtime.block_on(async move {
                let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
                    .await
                    .expect("bind ephemeral test port");
                let addr = listener.local_addr().expect("get local addr");
                let _ = published_url_thread.set(format!("http://{}", addr));
                board_server::run(listener).await.expect("server failed");
            });
        });
        wait_for_server_url_and_readiness(published_url);
    });

    SERVER_URL
        .get()
        .expect("server url should be initialized")
        .as_str()
}

fn wait_for_server_url_and_readiness(published_url: Arc<OnceLock<String>>) {
    let base_url = loop {
        if let Some(url) = published_url.get() {
            break url.clone();
        }
        std::thread::sleep(Duration::from_millis(10));
    };

    let _ = SERVER_URL.set(base_url.clone());

    let addr = base_url
        .strip_prefix("http://")
        .expect("base url should use http://");

    for _ in 0..100 {
        if std::net::TcpStream::connect(addr).is_ok() {
            return;
        }
        std::thread::sleep(Duration::from_millis(20));
    }

    panic!("server did not become ready in time");
}

pub fn unique_room() -> String {
    format!("room-{}", uuid::Uuid::new_v4())
}

pub async fn connect() -> Client {
    let base_url = ensure_server();
    let ws_url = format!("{}/ws", base_url.replacen("http://", "ws://", 1));
    let (client, _response) = connect_async(ws_url).await.expect("websocket connect");
    client
}

pub async fn send_json(client: &mut Client, value: Value) {
    client
        .send(Message::Text(value.to_string().into()))
        .await
        .expect("send frame");
}

pub async fn send_text(client: &mut Client, text: &str) {
    client
        .send(Message::Text(text.to_string().into()))
        .await
        .expect("send frame");
}

pub async fn send_binary(client: &mut Client, bytes: Vec<u8>) {
    client
        .send(Message::Binary(bytes.into()))
        .await
        .expect("send binary frame");
}

// Next text frame as JSON, skipping control frames.
pub async fn recv_json(client: &mut Client) -> Value {
    loop {
        let frame = timeout(RECV_TIMEOUT, client.next())
            .await
            .expect("frame should arrive in time")
            .expect("stream should stay open")
            .expect("frame should be valid");

        match frame {
            Message::Text(text) => return serde_json::from_str(text.as_str()).expect("json frame"),
            Message::Ping(_) | Message::Pong(_) => continue,
            other => panic!("unexpected frame: {other:?}"),
        }
    }
}

pub async fn recv_frame(client: &mut Client) -> Message {
    timeout(RECV_TIMEOUT, client.next())
        .await
        .expect("frame should arrive in time")
        .expect("stream should stay open")
        .expect("frame should be valid")
}

// True when nothing arrives within a short window.
pub async fn stays_silent(client: &mut Client) -> bool {
    timeout(Duration::from_millis(200), client.next())
        .await
        .is_err()
}

pub async fn join(client: &mut Client, room: &str) -> Value {
    send_json(client, serde_json::json!({"type": "join_room", "data": room})).await;
    recv_json(client).await
}

pub async fn room_info(room: &str) -> (reqwest::StatusCode, Value) {
    let base_url = ensure_server();
    let res = reqwest::get(format!("{base_url}/rooms/{room}"))
        .await
        .expect("request should succeed");
    let status = res.status();
    (status, res.json().await.expect("json body"))
}

// Room inspection goes through the room task, so a match means earlier intents were applied.
pub async fn wait_for_elements(room: &str, count: usize) -> Value {
    for _ in 0..100 {
        let (status, body) = room_info(room).await;
        if status.is_success() && body["elements"].as_array().map(Vec::len) == Some(count) {
            return body;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("room {room} never reached {count} elements");
}
