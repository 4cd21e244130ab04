//! WebSocket Transport Binding (tokio-tungstenite).
//!
//! One connection task per `open`. The task owns the socket: it performs the
//! handshake, forwards outbound frames from a channel and dispatches inbound
//! frames to the registry in arrival order. Callers never wait on it.

use std::sync::{
    Arc, Mutex, MutexGuard, PoisonError,
    atomic::{AtomicBool, Ordering},
};

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::{runtime::Handle, sync::mpsc};
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};

use super::{
    ConnectOptions, EVENT_CONNECT, EVENT_DISCONNECT, Endpoint, EventHandler, HandlerRegistry,
    Transport,
};
use crate::dto::WireFrame;

/// Handle to the running connection task
struct Connection {
    outbound: mpsc::UnboundedSender<WireFrame>,
    connected: Arc<AtomicBool>,
}

impl Connection {
    /// The task drops its receiver when the socket ends.
    fn is_alive(&self) -> bool {
        !self.outbound.is_closed()
    }
}

/// Production binding over a WebSocket connection
#[derive(Default)]
pub struct WebSocketTransport {
    registry: Arc<HandlerRegistry>,
    connection: Mutex<Option<Connection>>,
}

impl WebSocketTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn connection_lock(&self) -> MutexGuard<'_, Option<Connection>> {
        self.connection
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Transport for WebSocketTransport {
    fn open(&self, endpoint: &Endpoint, options: &ConnectOptions) {
        let mut connection = self.connection_lock();

        if connection.as_ref().is_some_and(Connection::is_alive) {
            tracing::debug!("Connection to {} already open, ignoring open", endpoint);
            return;
        }

        let runtime = match Handle::try_current() {
            Ok(runtime) => runtime,
            Err(e) => {
                drop(connection);
                tracing::error!("Cannot open {} outside a tokio runtime: {}", endpoint, e);
                self.registry.dispatch(EVENT_DISCONNECT, &Value::Null);
                return;
            }
        };

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let connected = Arc::new(AtomicBool::new(false));

        runtime.spawn(run_connection(
            endpoint.clone(),
            options.clone(),
            self.registry.clone(),
            outbound_rx,
            connected.clone(),
        ));

        *connection = Some(Connection {
            outbound: outbound_tx,
            connected,
        });
        tracing::info!("Opening connection to {}", endpoint);
    }

    fn close(&self) {
        // Dropping the sender makes the task send a close frame and finish.
        if self.connection_lock().take().is_some() {
            tracing::info!("Closing relay connection");
        }
    }

    fn on(&self, event: &str, handler: EventHandler) -> bool {
        self.registry.register(event, handler)
    }

    fn off(&self, event: &str, handler: &EventHandler) -> bool {
        self.registry.deregister(event, handler)
    }

    fn emit(&self, event: &str, payload: Value) {
        let connection = self.connection_lock();

        let Some(conn) = connection
            .as_ref()
            .filter(|c| c.connected.load(Ordering::SeqCst))
        else {
            tracing::warn!("Not connected, dropping outbound '{}'", event);
            return;
        };

        if conn.outbound.send(WireFrame::new(event, payload)).is_err() {
            tracing::warn!("Connection ended, dropping outbound '{}'", event);
        }
    }

    fn is_open(&self) -> bool {
        self.connection_lock()
            .as_ref()
            .is_some_and(Connection::is_alive)
    }
}

/// Drive one connection from handshake to close.
///
/// Dispatches `connect` once the handshake succeeds and `disconnect` when the
/// socket ends for any reason, including a failed handshake.
async fn run_connection(
    endpoint: Endpoint,
    options: ConnectOptions,
    registry: Arc<HandlerRegistry>,
    mut outbound: mpsc::UnboundedReceiver<WireFrame>,
    connected: Arc<AtomicBool>,
) {
    let handshake = tokio::time::timeout(options.connect_timeout, connect_async(endpoint.as_str()));

    let ws_stream = match handshake.await {
        Ok(Ok((ws_stream, _response))) => ws_stream,
        Ok(Err(e)) => {
            tracing::warn!("Failed to connect to {}: {}", endpoint, e);
            drop(outbound);
            registry.dispatch(EVENT_DISCONNECT, &Value::Null);
            return;
        }
        Err(_) => {
            tracing::warn!(
                "Connecting to {} timed out after {:?}",
                endpoint,
                options.connect_timeout
            );
            drop(outbound);
            registry.dispatch(EVENT_DISCONNECT, &Value::Null);
            return;
        }
    };

    tracing::info!("Connected to relay at {}", endpoint);
    let (mut write, mut read) = ws_stream.split();

    connected.store(true, Ordering::SeqCst);
    registry.dispatch(EVENT_CONNECT, &Value::Null);

    loop {
        tokio::select! {
            frame = outbound.recv() => {
                let Some(frame) = frame else {
                    // close() was called
                    if let Err(e) = write.send(Message::Close(None)).await {
                        tracing::debug!("Failed to send close frame: {}", e);
                    }
                    break;
                };

                let json = match serde_json::to_string(&frame) {
                    Ok(json) => json,
                    Err(e) => {
                        tracing::error!("Failed to serialize '{}': {}", frame.event, e);
                        continue;
                    }
                };

                if let Err(e) = write.send(Message::Text(json.into())).await {
                    tracing::warn!("Failed to send '{}': {}", frame.event, e);
                    break;
                }
            }
            message = read.next() => {
                match message {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<WireFrame>(&text) {
                            Ok(frame) => {
                                registry.dispatch(&frame.event, &frame.data);
                            }
                            Err(e) => {
                                tracing::warn!("Skipping unparseable frame: {}", e);
                            }
                        }
                    }
                    Some(Ok(Message::Binary(data))) => {
                        tracing::debug!("Ignoring {} bytes of binary data", data.len());
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        tracing::info!("Relay closed the connection");
                        break;
                    }
                    Some(Err(e)) => {
                        tracing::warn!("WebSocket read error: {}", e);
                        break;
                    }
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    connected.store(false, Ordering::SeqCst);
    drop(outbound);
    registry.dispatch(EVENT_DISCONNECT, &Value::Null);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::handler;
    use std::{sync::atomic::AtomicUsize, time::Duration};

    #[test]
    fn test_emit_without_connection_is_dropped() {
        // テスト項目: 未接続の emit はパニックせずに破棄される
        // given (前提条件):
        let transport = WebSocketTransport::new();

        // when (操作):
        transport.emit("join_room", Value::String("general".to_string()));

        // then (期待する結果):
        assert!(!transport.is_open());
    }

    #[test]
    fn test_close_without_connection_is_safe() {
        // テスト項目: 接続していない状態の close は何もしない
        // given (前提条件):
        let transport = WebSocketTransport::new();

        // when (操作):
        transport.close();
        transport.close();

        // then (期待する結果):
        assert!(!transport.is_open());
    }

    #[test]
    fn test_open_outside_runtime_dispatches_disconnect() {
        // テスト項目: tokio ランタイム外での open は disconnect として通知される
        // given (前提条件):
        let transport = WebSocketTransport::new();
        let disconnects = Arc::new(AtomicUsize::new(0));
        let counter = disconnects.clone();
        transport.on(
            EVENT_DISCONNECT,
            handler(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );
        let endpoint = Endpoint::parse("ws://127.0.0.1:9").unwrap();

        // when (操作):
        transport.open(&endpoint, &ConnectOptions::default());

        // then (期待する結果):
        assert_eq!(disconnects.load(Ordering::SeqCst), 1);
        assert!(!transport.is_open());
    }

    #[tokio::test]
    async fn test_refused_connection_dispatches_disconnect() {
        // テスト項目: 接続拒否は disconnect イベントとして通知され、エラーは投げられない
        // given (前提条件):
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let transport = WebSocketTransport::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        transport.on(
            EVENT_DISCONNECT,
            handler(move |_| {
                let _ = tx.send(());
            }),
        );
        let endpoint = Endpoint::parse(&format!("ws://127.0.0.1:{port}")).unwrap();

        // when (操作):
        transport.open(&endpoint, &ConnectOptions::default());

        // then (期待する結果):
        let notified = tokio::time::timeout(Duration::from_secs(5), rx.recv()).await;
        assert!(matches!(notified, Ok(Some(()))));
    }
}
