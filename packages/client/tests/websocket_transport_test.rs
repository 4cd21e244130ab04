//! Integration tests for the WebSocket binding against an in-process relay.

use std::{sync::Arc, time::Duration};

use axum::{
    Router,
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    response::IntoResponse,
    routing::get,
};
use relay_chat_client::{
    ClientConfig, ConnectionStatus, SessionController,
    persistence::PersistenceAdapter,
    transport::{Transport, WebSocketTransport},
};
use serde_json::{Value, json};

/// Text that makes the test relay close the socket
const KICK: &str = "/kick";

/// Helper struct owning a relay bound to an ephemeral port
struct TestRelay {
    port: u16,
    handle: tokio::task::JoinHandle<()>,
}

impl TestRelay {
    async fn start() -> Self {
        let app = Router::new().route("/ws", get(websocket_handler));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        TestRelay { port, handle }
    }

    fn url(&self) -> String {
        format!("ws://127.0.0.1:{}/ws", self.port)
    }
}

impl Drop for TestRelay {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn websocket_handler(ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(handle_socket)
}

/// Acknowledge `join_room` with a relay notice and echo `send_message` back
/// as `receive_message`.
async fn handle_socket(mut socket: WebSocket) {
    while let Some(Ok(message)) = socket.recv().await {
        let Message::Text(text) = message else {
            continue;
        };
        let Ok(frame) = serde_json::from_str::<Value>(text.as_str()) else {
            continue;
        };

        let reply = match frame["event"].as_str() {
            Some("join_room") => json!({
                "event": "receive_message",
                "data": {
                    "room": frame["data"],
                    "user": "relay",
                    "text": format!("joined {}", frame["data"].as_str().unwrap_or_default()),
                    "timestamp": "2023-01-01T00:00:00.000Z",
                },
            }),
            Some("send_message") if frame["data"]["text"] == KICK => {
                let _ = socket.send(Message::Close(None)).await;
                return;
            }
            Some("send_message") => json!({"event": "receive_message", "data": frame["data"]}),
            _ => continue,
        };

        if socket
            .send(Message::Text(reply.to_string().into()))
            .await
            .is_err()
        {
            return;
        }
    }
}

fn session(url: &str) -> SessionController {
    SessionController::new(
        || -> Arc<dyn Transport> { Arc::new(WebSocketTransport::new()) },
        PersistenceAdapter::in_memory(),
        ClientConfig::new(url)
            .unwrap()
            .with_connect_timeout(Duration::from_secs(5)),
    )
}

/// Wait until `predicate` holds, re-checking on every session change.
async fn wait_for(session: &SessionController, predicate: impl Fn(&SessionController) -> bool) {
    let mut changes = session.subscribe();
    let waited = tokio::time::timeout(Duration::from_secs(5), async {
        while !predicate(session) {
            if changes.changed().await.is_err() {
                break;
            }
        }
    })
    .await;
    assert!(waited.is_ok(), "timed out waiting for session state");
}

#[tokio::test]
async fn test_connect_joins_room_and_receives_notice() {
    // テスト項目: 接続するとルーム参加が送信され、リレーからの通知を受信する
    // given (前提条件):
    let relay = TestRelay::start().await;
    let session = session(&relay.url());
    session.join_room("lobby");

    // when (操作):
    session.connect();
    wait_for(&session, |s| s.messages().len() == 1).await;

    // then (期待する結果):
    assert_eq!(session.status(), ConnectionStatus::Connected);
    let messages = session.messages();
    assert_eq!(messages[0].user(), "relay");
    assert_eq!(messages[0].room(), "lobby");
    assert_eq!(messages[0].text(), "joined lobby");
}

#[tokio::test]
async fn test_sent_message_round_trips_through_relay() {
    // テスト項目: 送信したメッセージがリレー経由で履歴に追加される
    // given (前提条件):
    let relay = TestRelay::start().await;
    let session = session(&relay.url());
    session.set_identity("Al");
    session.connect();
    wait_for(&session, |s| s.messages().len() == 1).await;

    // when (操作):
    session.send_message("hello relay");
    wait_for(&session, |s| s.messages().len() == 2).await;

    // then (期待する結果):
    let echoed = &session.messages()[1];
    assert_eq!(echoed.user(), "Al");
    assert_eq!(echoed.room(), "general");
    assert_eq!(echoed.text(), "hello relay");
    assert!(!echoed.timestamp().is_invalid());
}

#[tokio::test]
async fn test_relay_closing_socket_marks_disconnected() {
    // テスト項目: リレーが接続を閉じると Disconnected になり、自動再接続しない
    // given (前提条件):
    let relay = TestRelay::start().await;
    let session = session(&relay.url());
    session.connect();
    wait_for(&session, |s| s.status() == ConnectionStatus::Connected).await;

    // when (操作):
    session.send_message(KICK);
    wait_for(&session, |s| s.status() == ConnectionStatus::Disconnected).await;

    // then (期待する結果):
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(session.status(), ConnectionStatus::Disconnected);
}

#[tokio::test]
async fn test_unreachable_relay_returns_to_disconnected() {
    // テスト項目: 接続できないリレーへの接続は Disconnected に戻り、エラーは投げられない
    // given (前提条件):
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    let session = session(&format!("ws://127.0.0.1:{port}/ws"));

    // when (操作):
    session.connect();
    assert_eq!(session.status(), ConnectionStatus::Connecting);
    wait_for(&session, |s| s.status() == ConnectionStatus::Disconnected).await;

    // then (期待する結果):
    assert!(session.messages().is_empty());

    session.connect();
    assert_eq!(session.status(), ConnectionStatus::Connecting);
}

#[tokio::test]
async fn test_disconnect_socket_stops_updates() {
    // テスト項目: disconnect_socket 後はリレーからのメッセージが反映されない
    // given (前提条件):
    let relay = TestRelay::start().await;
    let session = session(&relay.url());
    session.connect();
    wait_for(&session, |s| s.messages().len() == 1).await;

    // when (操作):
    session.disconnect_socket();
    session.send_message("after disconnect");
    tokio::time::sleep(Duration::from_millis(200)).await;

    // then (期待する結果):
    assert_eq!(session.status(), ConnectionStatus::Disconnected);
    assert_eq!(session.messages().len(), 1);
}
