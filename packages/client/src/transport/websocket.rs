//! Socket.IO client transport over a plain WebSocket.
//!
//! One background task per connection owns the socket. It performs the
//! Engine.IO handshake, joins the namespace, answers heartbeats, forwards
//! events as [`TransportSignal`]s and reconnects with capped exponential
//! backoff when the connection drops.

use std::{collections::HashMap, time::Duration};

use futures_util::{
    SinkExt, StreamExt,
    stream::{SplitSink, SplitStream},
};
use serde_json::Value;
use tokio::{
    net::TcpStream,
    sync::{mpsc, oneshot},
    time::Instant,
};
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async, tungstenite::protocol::Message,
};

use crate::{
    config::Endpoint,
    error::{ConnectionError, TransportError},
};

use super::{
    AckReceiver, Connector, TransportHandle, TransportLink, TransportOptions, TransportSignal,
    packet::{ENGINE_PROTOCOL, EnginePacket, Handshake, SocketPacket, SocketPacketKind},
};

/// Upper bound on the Engine.IO handshake plus namespace join.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(20);

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsWriter = SplitSink<WsStream, Message>;
type WsReader = SplitStream<WsStream>;

/// Build the Socket.IO WebSocket URL for an endpoint's server.
pub fn socket_url(endpoint: &Endpoint) -> Result<String, TransportError> {
    let base = endpoint.base_url();
    let ws_base = if let Some(rest) = base.strip_prefix("http://") {
        format!("ws://{}", rest)
    } else if let Some(rest) = base.strip_prefix("https://") {
        format!("wss://{}", rest)
    } else if base.starts_with("ws://") || base.starts_with("wss://") {
        base.to_string()
    } else {
        return Err(TransportError::InvalidEndpoint(base.to_string()));
    };

    Ok(format!(
        "{}/socket.io/?EIO={}&transport=websocket",
        ws_base.trim_end_matches('/'),
        ENGINE_PROTOCOL
    ))
}

/// [`Connector`] producing Socket.IO-over-WebSocket connections.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketConnector;

impl WebSocketConnector {
    pub fn new() -> Self {
        Self
    }
}

impl Connector for WebSocketConnector {
    fn open(
        &self,
        endpoint: &Endpoint,
        options: &TransportOptions,
    ) -> Result<TransportLink, TransportError> {
        if !options.websocket_only {
            tracing::debug!("Long-polling fallback is not available; using WebSocket only");
        }

        let url = socket_url(endpoint)?;
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (signal_tx, signal_rx) = mpsc::unbounded_channel();

        let connection = Connection {
            url,
            namespace: endpoint.namespace().path().to_string(),
            options: *options,
            commands: command_rx,
            signals: signal_tx,
            next_ack_id: 0,
            pending_acks: HashMap::new(),
        };
        tokio::spawn(connection.run());

        Ok(TransportLink {
            handle: Box::new(WebSocketHandle {
                commands: command_tx,
                closed: false,
            }),
            signals: signal_rx,
        })
    }
}

enum Command {
    Emit {
        event: String,
        payload: Value,
        ack: Option<oneshot::Sender<Vec<Value>>>,
    },
    Close,
}

/// Outbound handle of a WebSocket connection.
///
/// Dropping the handle closes the connection as well: the task treats a
/// closed command queue like an explicit close.
pub struct WebSocketHandle {
    commands: mpsc::UnboundedSender<Command>,
    closed: bool,
}

impl WebSocketHandle {
    fn push(&self, command: Command) -> Result<(), TransportError> {
        self.commands
            .send(command)
            .map_err(|_| TransportError::Closed)
    }
}

impl TransportHandle for WebSocketHandle {
    fn send(&self, event: &str, payload: Value) -> Result<(), TransportError> {
        self.push(Command::Emit {
            event: event.to_string(),
            payload,
            ack: None,
        })
    }

    fn send_with_ack(&self, event: &str, payload: Value) -> Result<AckReceiver, TransportError> {
        let (ack_tx, ack_rx) = oneshot::channel();
        self.push(Command::Emit {
            event: event.to_string(),
            payload,
            ack: Some(ack_tx),
        })?;
        Ok(ack_rx)
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if self.commands.send(Command::Close).is_err() {
            tracing::trace!("Transport task already stopped");
        }
    }
}

/// How an established session ended.
enum SessionEnd {
    /// `close()` was requested or the handle was dropped
    ClosedByClient,
    /// The server disconnected the namespace; no reconnection
    ClosedByServer,
    /// Connection lost; reconnection may follow
    Lost(String),
}

struct Established {
    writer: WsWriter,
    reader: WsReader,
    handshake: Handshake,
}

struct Connection {
    url: String,
    namespace: String,
    options: TransportOptions,
    commands: mpsc::UnboundedReceiver<Command>,
    signals: mpsc::UnboundedSender<TransportSignal>,
    next_ack_id: u64,
    pending_acks: HashMap<u64, oneshot::Sender<Vec<Value>>>,
}

impl Connection {
    async fn run(mut self) {
        let policy = self.options.reconnect;
        let mut reconnect_attempts: u32 = 0;

        loop {
            tracing::debug!(
                "Connecting to {} namespace {} (reconnection attempts so far: {})",
                self.url,
                self.namespace,
                reconnect_attempts
            );

            let established = tokio::select! {
                result = establish(&self.url, &self.namespace) => Some(result),
                _ = drain_until_close(&mut self.commands) => None,
            };

            match established {
                None => return,
                Some(Ok(session)) => {
                    reconnect_attempts = 0;
                    self.signal(TransportSignal::Connected);

                    match self.pump(session).await {
                        SessionEnd::ClosedByClient => return,
                        SessionEnd::ClosedByServer => {
                            self.signal(TransportSignal::Disconnected(
                                "io server disconnect".to_string(),
                            ));
                            return;
                        }
                        SessionEnd::Lost(reason) => {
                            tracing::warn!("Connection to {} lost: {}", self.namespace, reason);
                            self.signal(TransportSignal::Disconnected(reason));
                        }
                    }
                }
                Some(Err(error)) => self.signal(TransportSignal::ConnectError(error)),
            }

            if !policy.allows(reconnect_attempts) {
                tracing::warn!(
                    "Giving up on {} after {} reconnection attempts",
                    self.namespace,
                    reconnect_attempts
                );
                return;
            }

            let delay = policy.delay_for(reconnect_attempts);
            reconnect_attempts += 1;
            tracing::info!(
                "Reconnecting to {} in {:?} (attempt {}/{})",
                self.namespace,
                delay,
                reconnect_attempts,
                policy.max_attempts
            );

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = drain_until_close(&mut self.commands) => return,
            }
        }
    }

    fn signal(&self, signal: TransportSignal) {
        if self.signals.send(signal).is_err() {
            tracing::debug!("Signal receiver for {} dropped", self.namespace);
        }
    }

    async fn pump(&mut self, session: Established) -> SessionEnd {
        let Established {
            mut writer,
            mut reader,
            handshake,
        } = session;
        let liveness = handshake.liveness_window();
        // Reset by server traffic only.
        let heartbeat = tokio::time::sleep(liveness);
        tokio::pin!(heartbeat);

        let end = loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(Command::Emit { event, payload, ack }) => {
                        let ack_id = ack.map(|sender| {
                            let id = self.next_ack_id;
                            self.next_ack_id += 1;
                            self.pending_acks.insert(id, sender);
                            id
                        });
                        let frame = SocketPacket::event(&self.namespace, &event, payload, ack_id).to_frame();
                        if let Err(e) = writer.send(Message::Text(frame.into())).await {
                            break SessionEnd::Lost(format!("send failed: {}", e));
                        }
                        tracing::debug!("Sent '{}' on {}", event, self.namespace);
                    }
                    Some(Command::Close) | None => {
                        let frame = SocketPacket::disconnect(&self.namespace).to_frame();
                        let _ = writer.send(Message::Text(frame.into())).await;
                        let _ = writer.close().await;
                        break SessionEnd::ClosedByClient;
                    }
                },
                _ = &mut heartbeat => break SessionEnd::Lost("ping timeout".to_string()),
                message = reader.next() => {
                    heartbeat.as_mut().reset(Instant::now() + liveness);
                    match message {
                        None => break SessionEnd::Lost("transport close".to_string()),
                        Some(Err(e)) => break SessionEnd::Lost(format!("transport error: {}", e)),
                        Some(Ok(Message::Text(text))) => {
                            if let Some(end) = self.handle_frame(&mut writer, text.as_str()).await {
                                break end;
                            }
                        }
                        Some(Ok(Message::Close(_))) => {
                            break SessionEnd::Lost("transport close".to_string());
                        }
                        Some(Ok(Message::Binary(data))) => {
                            tracing::warn!("Ignoring {} bytes of binary data on {}", data.len(), self.namespace);
                        }
                        Some(Ok(_)) => {}
                    }
                }
            }
        };

        // Outstanding acknowledgments can no longer arrive.
        self.pending_acks.clear();
        end
    }

    async fn handle_frame(&mut self, writer: &mut WsWriter, text: &str) -> Option<SessionEnd> {
        let packet = match EnginePacket::decode(text) {
            Ok(packet) => packet,
            Err(e) => {
                self.signal(TransportSignal::Malformed(e));
                return None;
            }
        };

        match packet {
            EnginePacket::Ping(body) => {
                let pong = EnginePacket::Pong(body).encode();
                if let Err(e) = writer.send(Message::Text(pong.into())).await {
                    return Some(SessionEnd::Lost(format!("send failed: {}", e)));
                }
                None
            }
            EnginePacket::Close => Some(SessionEnd::Lost("transport close".to_string())),
            EnginePacket::Message(body) => self.handle_socket_packet(&body),
            EnginePacket::Open(_) | EnginePacket::Pong(_) | EnginePacket::Upgrade | EnginePacket::Noop => None,
        }
    }

    fn handle_socket_packet(&mut self, body: &str) -> Option<SessionEnd> {
        let packet = match SocketPacket::decode(body) {
            Ok(packet) => packet,
            Err(e) => {
                self.signal(TransportSignal::Malformed(e));
                return None;
            }
        };
        if packet.namespace != self.namespace {
            tracing::trace!("Ignoring packet for namespace {}", packet.namespace);
            return None;
        }

        match packet.kind {
            SocketPacketKind::Event => match packet.into_event() {
                Ok((name, payload)) => {
                    tracing::debug!("Received '{}' on {}", name, self.namespace);
                    self.signal(TransportSignal::Event { name, payload });
                }
                Err(e) => self.signal(TransportSignal::Malformed(e)),
            },
            SocketPacketKind::Ack => {
                let Some(id) = packet.ack_id else {
                    tracing::warn!("Ack without id on {}", self.namespace);
                    return None;
                };
                match self.pending_acks.remove(&id) {
                    Some(sender) => {
                        if sender.send(packet.into_ack_args()).is_err() {
                            tracing::debug!("Ack receiver {} on {} dropped", id, self.namespace);
                        }
                    }
                    None => tracing::debug!("Unexpected ack {} on {}", id, self.namespace),
                }
            }
            SocketPacketKind::Disconnect => return Some(SessionEnd::ClosedByServer),
            SocketPacketKind::ConnectError => {
                return Some(SessionEnd::Lost(packet.error_message()));
            }
            SocketPacketKind::Connect
            | SocketPacketKind::BinaryEvent
            | SocketPacketKind::BinaryAck => {}
        }
        None
    }
}

/// Consume commands until a close is requested. Emits issued while no
/// session is established are dropped, matching the channel's policy.
async fn drain_until_close(commands: &mut mpsc::UnboundedReceiver<Command>) {
    while let Some(command) = commands.recv().await {
        match command {
            Command::Close => return,
            Command::Emit { event, .. } => {
                tracing::warn!("Dropping '{}': transport is not connected", event);
            }
        }
    }
}

/// Open the socket, complete the Engine.IO handshake and join `namespace`.
async fn establish(url: &str, namespace: &str) -> Result<Established, ConnectionError> {
    tokio::time::timeout(HANDSHAKE_TIMEOUT, establish_inner(url, namespace))
        .await
        .unwrap_or(Err(ConnectionError::Timeout(HANDSHAKE_TIMEOUT)))
}

async fn establish_inner(url: &str, namespace: &str) -> Result<Established, ConnectionError> {
    let (stream, _response) = connect_async(url)
        .await
        .map_err(|e| ConnectionError::Transport(e.to_string()))?;
    let (mut writer, mut reader) = stream.split();

    let handshake = loop {
        match next_engine_packet(&mut reader).await? {
            EnginePacket::Open(handshake) => break handshake,
            EnginePacket::Noop => continue,
            other => {
                return Err(ConnectionError::Transport(format!(
                    "expected open packet, got {:?}",
                    other
                )));
            }
        }
    };
    tracing::debug!("Engine.IO session {} opened", handshake.sid);

    let connect = SocketPacket::connect(namespace).to_frame();
    writer
        .send(Message::Text(connect.into()))
        .await
        .map_err(|e| ConnectionError::Transport(e.to_string()))?;

    loop {
        match next_engine_packet(&mut reader).await? {
            EnginePacket::Ping(body) => {
                let pong = EnginePacket::Pong(body).encode();
                writer
                    .send(Message::Text(pong.into()))
                    .await
                    .map_err(|e| ConnectionError::Transport(e.to_string()))?;
            }
            EnginePacket::Message(body) => {
                let packet = SocketPacket::decode(&body)
                    .map_err(|e| ConnectionError::Transport(e.to_string()))?;
                if packet.namespace != namespace {
                    continue;
                }
                match packet.kind {
                    SocketPacketKind::Connect => {
                        return Ok(Established {
                            writer,
                            reader,
                            handshake,
                        });
                    }
                    SocketPacketKind::ConnectError => {
                        return Err(ConnectionError::Rejected(packet.error_message()));
                    }
                    _ => continue,
                }
            }
            EnginePacket::Close => {
                return Err(ConnectionError::Transport(
                    "server closed during handshake".to_string(),
                ));
            }
            _ => continue,
        }
    }
}

async fn next_engine_packet(reader: &mut WsReader) -> Result<EnginePacket, ConnectionError> {
    loop {
        match reader.next().await {
            Some(Ok(Message::Text(text))) => {
                return EnginePacket::decode(text.as_str())
                    .map_err(|e| ConnectionError::Transport(e.to_string()));
            }
            Some(Ok(Message::Close(_))) | None => {
                return Err(ConnectionError::Transport(
                    "connection closed during handshake".to_string(),
                ));
            }
            Some(Ok(_)) => continue,
            Some(Err(e)) => return Err(ConnectionError::Transport(e.to_string())),
        }
    }
}
