//! Minimal Socket.IO server for driving the real transport in tests.
//!
//! Speaks just enough Engine.IO v4 / Socket.IO v5 over a plain WebSocket:
//! the open handshake, namespace connect (accepted or refused), events in
//! both directions and acknowledgments.

#![allow(dead_code)]

use std::{sync::Arc, time::Duration};

use axum::{
    Router,
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::IntoResponse,
    routing::get,
};
use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::{
    net::TcpListener,
    sync::{Mutex, broadcast, mpsc},
    task::JoinHandle,
};

use rookline_client::{ClientConfig, ReconnectPolicy};

/// How the server answers a namespace connect.
#[derive(Debug, Clone)]
pub enum Admission {
    Accept,
    Refuse(String),
}

/// Heartbeat advertised in the open packet. The server itself never pings.
#[derive(Debug, Clone, Copy)]
pub struct Heartbeat {
    pub ping_interval_ms: u64,
    pub ping_timeout_ms: u64,
}

impl Default for Heartbeat {
    fn default() -> Self {
        Self {
            ping_interval_ms: 25000,
            ping_timeout_ms: 20000,
        }
    }
}

#[derive(Clone)]
struct ServerState {
    admission: Admission,
    heartbeat: Heartbeat,
    received: mpsc::UnboundedSender<String>,
    outbound: broadcast::Sender<String>,
    kick: broadcast::Sender<()>,
}

pub struct FakeSocketServer {
    pub base_url: String,
    received: Arc<Mutex<mpsc::UnboundedReceiver<String>>>,
    outbound: broadcast::Sender<String>,
    kick: broadcast::Sender<()>,
    serve: JoinHandle<()>,
}

impl FakeSocketServer {
    /// Start the server on an OS-assigned port.
    pub async fn start(admission: Admission) -> Self {
        Self::start_with(admission, Heartbeat::default()).await
    }

    pub async fn start_with(admission: Admission, heartbeat: Heartbeat) -> Self {
        let (received_tx, received_rx) = mpsc::unbounded_channel();
        let (outbound, _) = broadcast::channel(64);
        let (kick, _) = broadcast::channel(4);
        let state = ServerState {
            admission,
            heartbeat,
            received: received_tx,
            outbound: outbound.clone(),
            kick: kick.clone(),
        };

        let app = Router::new()
            .route("/socket.io/", get(ws_handler))
            .with_state(state);
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let serve = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://127.0.0.1:{}", addr.port()),
            received: Arc::new(Mutex::new(received_rx)),
            outbound,
            kick,
            serve,
        }
    }

    /// Drop every open socket without a close handshake. New connections
    /// are still accepted.
    pub fn drop_connections(&self) {
        let _ = self.kick.send(());
    }

    /// Stop listening and drop every open socket.
    pub fn shutdown(&self) {
        self.serve.abort();
        self.drop_connections();
    }

    /// Client configuration pointing at this server, without reconnection.
    pub fn config(&self) -> ClientConfig {
        let mut config = ClientConfig::new(self.base_url.as_str()).unwrap();
        config.reconnect = ReconnectPolicy::disabled();
        config.connect_timeout = Some(Duration::from_secs(5));
        config
    }

    /// Push an event to every connected client.
    pub fn emit(&self, namespace: &str, event: &str, payload: Value) {
        let frame = format!("42{},{}", namespace, json!([event, payload]));
        let _ = self.outbound.send(frame);
    }

    /// Answer acknowledgment `id` on `namespace`.
    pub fn ack(&self, namespace: &str, id: u64, args: Value) {
        let frame = format!("43{},{}{}", namespace, id, args);
        let _ = self.outbound.send(frame);
    }

    /// Next Socket.IO packet sent by a client (without the Engine.IO prefix).
    pub async fn next_packet(&self) -> String {
        let mut received = self.received.lock().await;
        tokio::time::timeout(Duration::from_secs(5), received.recv())
            .await
            .expect("timed out waiting for a client packet")
            .expect("server stopped")
    }

    /// Whether any client packet arrives within `wait`.
    pub async fn packet_within(&self, wait: Duration) -> Option<String> {
        let mut received = self.received.lock().await;
        tokio::time::timeout(wait, received.recv()).await.ok().flatten()
    }
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<ServerState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: ServerState) {
    let (mut sink, mut stream) = socket.split();
    let mut outbound = state.outbound.subscribe();
    let mut kick = state.kick.subscribe();

    let open = json!({
        "sid": uuid::Uuid::new_v4().to_string(),
        "upgrades": [],
        "pingInterval": state.heartbeat.ping_interval_ms,
        "pingTimeout": state.heartbeat.ping_timeout_ms,
        "maxPayload": 1_000_000
    });
    if sink
        .send(Message::Text(format!("0{}", open).into()))
        .await
        .is_err()
    {
        return;
    }

    loop {
        tokio::select! {
            _ = kick.recv() => break,
            message = stream.next() => {
                let Some(Ok(Message::Text(text))) = message else {
                    break;
                };
                // Engine.IO message packets carry the Socket.IO payload.
                let Some(body) = text.as_str().strip_prefix('4') else {
                    continue;
                };
                if let Some(namespace) = connect_request(body) {
                    let reply = match &state.admission {
                        Admission::Accept => format!(
                            "40{},{}",
                            namespace,
                            json!({ "sid": uuid::Uuid::new_v4().to_string() })
                        ),
                        Admission::Refuse(message) => {
                            format!("44{},{}", namespace, json!({ "message": message }))
                        }
                    };
                    if sink.send(Message::Text(reply.into())).await.is_err() {
                        break;
                    }
                    continue;
                }
                let _ = state.received.send(body.to_string());
            }
            frame = outbound.recv() => {
                let Ok(frame) = frame else {
                    break;
                };
                if sink.send(Message::Text(frame.into())).await.is_err() {
                    break;
                }
            }
        }
    }
}

/// Namespace of a `0/<ns>,` connect packet.
fn connect_request(body: &str) -> Option<&str> {
    let rest = body.strip_prefix('0')?;
    Some(rest.strip_suffix(',').unwrap_or(rest))
}

/// Split a client event packet `2/<ns>,[<id>]["event",payload]` into
/// namespace, ack id and the JSON array.
pub fn parse_event(packet: &str) -> (String, Option<u64>, Value) {
    let rest = packet.strip_prefix('2').expect("not an event packet");
    let (namespace, rest) = rest.split_once(',').expect("missing namespace");
    let digits: String = rest.chars().take_while(char::is_ascii_digit).collect();
    let ack_id = (!digits.is_empty()).then(|| digits.parse().unwrap());
    let body: Value = serde_json::from_str(&rest[digits.len()..]).expect("invalid JSON");
    (namespace.to_string(), ack_id, body)
}
