//! Engine.IO v4 / Socket.IO v5 text framing.
//!
//! Every WebSocket text frame is one Engine.IO packet (`<type><body>`);
//! Engine.IO `message` packets carry one Socket.IO packet
//! (`<type>[/<namespace>,][<ack id>][<json>]`). Binary attachments are not
//! supported.

use std::{fmt::Write as _, time::Duration};

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::error::ProtocolError;

/// Engine.IO protocol revision requested in the connection URL.
pub const ENGINE_PROTOCOL: u8 = 4;

/// Namespace of the main socket.
pub const ROOT_NAMESPACE: &str = "/";

fn malformed(reason: impl Into<String>) -> ProtocolError {
    ProtocolError::MalformedPacket(reason.into())
}

/// Body of the Engine.IO `open` packet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Handshake {
    pub sid: String,
    #[serde(default)]
    pub upgrades: Vec<String>,
    pub ping_interval: u64,
    pub ping_timeout: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_payload: Option<u64>,
}

impl Handshake {
    /// Longest silence tolerated before the connection is considered dead.
    pub fn liveness_window(&self) -> Duration {
        Duration::from_millis(self.ping_interval.saturating_add(self.ping_timeout))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EnginePacket {
    Open(Handshake),
    Close,
    Ping(String),
    Pong(String),
    Message(String),
    Upgrade,
    Noop,
}

impl EnginePacket {
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        let mut chars = text.chars();
        let kind = chars.next().ok_or_else(|| malformed("empty frame"))?;
        let body = chars.as_str();

        match kind {
            '0' => serde_json::from_str(body)
                .map(EnginePacket::Open)
                .map_err(|e| malformed(format!("invalid handshake: {}", e))),
            '1' => Ok(EnginePacket::Close),
            '2' => Ok(EnginePacket::Ping(body.to_string())),
            '3' => Ok(EnginePacket::Pong(body.to_string())),
            '4' => Ok(EnginePacket::Message(body.to_string())),
            '5' => Ok(EnginePacket::Upgrade),
            '6' => Ok(EnginePacket::Noop),
            other => Err(malformed(format!("unknown engine packet type '{}'", other))),
        }
    }

    pub fn encode(&self) -> String {
        match self {
            EnginePacket::Open(handshake) => {
                format!("0{}", serde_json::to_string(handshake).unwrap_or_default())
            }
            EnginePacket::Close => "1".to_string(),
            EnginePacket::Ping(body) => format!("2{}", body),
            EnginePacket::Pong(body) => format!("3{}", body),
            EnginePacket::Message(body) => format!("4{}", body),
            EnginePacket::Upgrade => "5".to_string(),
            EnginePacket::Noop => "6".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketPacketKind {
    Connect,
    Disconnect,
    Event,
    Ack,
    ConnectError,
    BinaryEvent,
    BinaryAck,
}

impl SocketPacketKind {
    fn from_char(c: char) -> Option<Self> {
        match c {
            '0' => Some(SocketPacketKind::Connect),
            '1' => Some(SocketPacketKind::Disconnect),
            '2' => Some(SocketPacketKind::Event),
            '3' => Some(SocketPacketKind::Ack),
            '4' => Some(SocketPacketKind::ConnectError),
            '5' => Some(SocketPacketKind::BinaryEvent),
            '6' => Some(SocketPacketKind::BinaryAck),
            _ => None,
        }
    }

    fn as_char(&self) -> char {
        match self {
            SocketPacketKind::Connect => '0',
            SocketPacketKind::Disconnect => '1',
            SocketPacketKind::Event => '2',
            SocketPacketKind::Ack => '3',
            SocketPacketKind::ConnectError => '4',
            SocketPacketKind::BinaryEvent => '5',
            SocketPacketKind::BinaryAck => '6',
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SocketPacket {
    pub kind: SocketPacketKind,
    pub namespace: String,
    pub ack_id: Option<u64>,
    pub data: Option<Value>,
}

impl SocketPacket {
    pub fn connect(namespace: &str) -> Self {
        Self::bare(SocketPacketKind::Connect, namespace)
    }

    pub fn disconnect(namespace: &str) -> Self {
        Self::bare(SocketPacketKind::Disconnect, namespace)
    }

    pub fn event(namespace: &str, event: &str, payload: Value, ack_id: Option<u64>) -> Self {
        Self {
            kind: SocketPacketKind::Event,
            namespace: namespace.to_string(),
            ack_id,
            data: Some(json!([event, payload])),
        }
    }

    fn bare(kind: SocketPacketKind, namespace: &str) -> Self {
        Self {
            kind,
            namespace: namespace.to_string(),
            ack_id: None,
            data: None,
        }
    }

    pub fn encode(&self) -> String {
        let mut out = String::new();
        out.push(self.kind.as_char());
        if self.namespace != ROOT_NAMESPACE {
            out.push_str(&self.namespace);
            out.push(',');
        }
        if let Some(id) = self.ack_id {
            let _ = write!(out, "{}", id);
        }
        if let Some(data) = &self.data {
            out.push_str(&data.to_string());
        }
        out
    }

    /// Encode as a complete WebSocket text frame (Engine.IO `message`).
    pub fn to_frame(&self) -> String {
        EnginePacket::Message(self.encode()).encode()
    }

    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        let mut chars = text.chars();
        let kind = chars
            .next()
            .and_then(SocketPacketKind::from_char)
            .ok_or_else(|| malformed(format!("unknown socket packet '{}'", text)))?;
        if matches!(
            kind,
            SocketPacketKind::BinaryEvent | SocketPacketKind::BinaryAck
        ) {
            return Err(malformed("binary attachments are not supported"));
        }

        let mut rest = chars.as_str();
        let namespace = if rest.starts_with('/') {
            let (namespace, tail) = match rest.find(',') {
                Some(i) => (&rest[..i], &rest[i + 1..]),
                None => (rest, ""),
            };
            rest = tail;
            namespace
        } else {
            ROOT_NAMESPACE
        };

        let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
        let ack_id = if digits > 0 {
            let id = rest[..digits]
                .parse()
                .map_err(|_| malformed(format!("ack id out of range in '{}'", text)))?;
            rest = &rest[digits..];
            Some(id)
        } else {
            None
        };

        let data = if rest.is_empty() {
            None
        } else {
            Some(
                serde_json::from_str(rest)
                    .map_err(|e| malformed(format!("invalid packet data: {}", e)))?,
            )
        };

        Ok(Self {
            kind,
            namespace: namespace.to_string(),
            ack_id,
            data,
        })
    }

    /// Split an `EVENT` packet into its name and first argument.
    ///
    /// A missing argument is reported as `null`; extra arguments are ignored.
    pub fn into_event(self) -> Result<(String, Value), ProtocolError> {
        let Some(Value::Array(mut args)) = self.data else {
            return Err(malformed("event packet without argument array"));
        };
        if args.is_empty() {
            return Err(malformed("event packet without name"));
        }
        let name = match args.remove(0) {
            Value::String(name) => name,
            other => return Err(malformed(format!("event name is not a string: {}", other))),
        };
        let payload = if args.is_empty() {
            Value::Null
        } else {
            args.swap_remove(0)
        };
        Ok((name, payload))
    }

    /// Arguments of an `ACK` packet.
    pub fn into_ack_args(self) -> Vec<Value> {
        match self.data {
            Some(Value::Array(args)) => args,
            Some(other) => vec![other],
            None => Vec::new(),
        }
    }

    /// Human-readable reason carried by a `CONNECT_ERROR` packet.
    pub fn error_message(&self) -> String {
        match &self.data {
            Some(Value::Object(map)) => map
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| Value::Object(map.clone()).to_string()),
            Some(Value::String(message)) => message.clone(),
            Some(other) => other.to_string(),
            None => "connection refused".to_string(),
        }
    }
}
