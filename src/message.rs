//! Typed qws messages.
//!
//! Every frame carries a header mapping whose `type` field selects one of five
//! kinds. Protocol-reserved header fields live in typed structs; anything
//! else an application attaches travels in an open `extra` map.

use bytes::Bytes;
use serde_json::{Map, Value};

/// Open mapping of application-defined header fields.
pub type ExtraHeaders = Map<String, Value>;

/// Header keys owned by the protocol. These never appear in [`ExtraHeaders`].
pub const RESERVED_HEADERS: [&str; 6] = ["type", "idx", "route", "readyIdx", "ackIdx", "error"];

/// Wire value of the `type` header for each message kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// Payload with a raw byte body.
    Bin,
    /// Payload with a structured JSON body.
    Json,
    /// Handshake frame advertising the resume index.
    Ready,
    /// Acknowledgment of a received payload.
    Ack,
    /// Failure report.
    Err,
}

impl MessageKind {
    /// The `type` header value for this kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Bin => "bin",
            Self::Json => "json",
            Self::Ready => "ready",
            Self::Ack => "ack",
            Self::Err => "err",
        }
    }

    /// Parse a `type` header value.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "bin" => Some(Self::Bin),
            "json" => Some(Self::Json),
            "ready" => Some(Self::Ready),
            "ack" => Some(Self::Ack),
            "err" => Some(Self::Err),
            _ => None,
        }
    }
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { f.write_str(self.as_str()) }
}

/// Headers carried by payload messages.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PayloadHeaders {
    /// Sequence number stamped by the sender's outbound queue.
    pub idx: Option<u64>,
    /// Routing key selecting a handler on the receiving side.
    pub route: Option<String>,
    /// Application-defined header fields.
    pub extra: ExtraHeaders,
}

impl PayloadHeaders {
    /// Headers addressed to `route` with no extra fields.
    #[must_use]
    pub fn routed(route: impl Into<String>) -> Self {
        Self {
            route: Some(route.into()),
            ..Self::default()
        }
    }

    /// Attach an application header, dropping attempts to set reserved keys.
    #[must_use]
    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let key = key.into();
        if !RESERVED_HEADERS.contains(&key.as_str()) {
            self.extra.insert(key, value.into());
        }
        self
    }

    /// Routing key used for dispatch; empty when absent.
    #[must_use]
    pub fn route_key(&self) -> &str { self.route.as_deref().unwrap_or_default() }
}

/// Payload with an opaque byte body.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BinaryMessage {
    pub headers: PayloadHeaders,
    pub body: Bytes,
}

/// Payload with a JSON body.
#[derive(Clone, Debug, PartialEq)]
pub struct JsonMessage {
    pub headers: PayloadHeaders,
    pub body: Value,
}

/// Handshake frame: the sender is ready to receive from `ready_idx` on.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ReadyMessage {
    pub ready_idx: u64,
    pub extra: ExtraHeaders,
}

/// Acknowledgment: the sender has fully processed `ack_idx`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AckMessage {
    pub ack_idx: u64,
}

/// Failure description reported by the peer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ErrorMessage {
    pub error: String,
}

/// A decoded qws frame.
#[derive(Clone, Debug, PartialEq)]
pub enum Message {
    Bin(BinaryMessage),
    Json(JsonMessage),
    Ready(ReadyMessage),
    Ack(AckMessage),
    Err(ErrorMessage),
}

impl Message {
    /// Wire discriminator of this message.
    #[must_use]
    pub const fn kind(&self) -> MessageKind {
        match self {
            Self::Bin(_) => MessageKind::Bin,
            Self::Json(_) => MessageKind::Json,
            Self::Ready(_) => MessageKind::Ready,
            Self::Ack(_) => MessageKind::Ack,
            Self::Err(_) => MessageKind::Err,
        }
    }

    /// Build a `ready` frame.
    #[must_use]
    pub fn ready(ready_idx: u64) -> Self {
        Self::Ready(ReadyMessage {
            ready_idx,
            extra: ExtraHeaders::new(),
        })
    }

    /// Build an `ack` frame.
    #[must_use]
    pub const fn ack(ack_idx: u64) -> Self { Self::Ack(AckMessage { ack_idx }) }

    /// Build an `err` frame.
    #[must_use]
    pub fn error(error: impl Into<String>) -> Self {
        Self::Err(ErrorMessage {
            error: error.into(),
        })
    }

    /// Split off the payload variant, if this is one.
    #[must_use]
    pub fn into_payload(self) -> Option<Payload> {
        match self {
            Self::Bin(message) => Some(Payload::Bin(message)),
            Self::Json(message) => Some(Payload::Json(message)),
            Self::Ready(_) | Self::Ack(_) | Self::Err(_) => None,
        }
    }
}

/// The message kinds that travel through the outbound queue.
#[derive(Clone, Debug, PartialEq)]
pub enum Payload {
    Bin(BinaryMessage),
    Json(JsonMessage),
}

impl Payload {
    /// Binary payload addressed to `route`.
    #[must_use]
    pub fn bin(route: impl Into<String>, body: impl Into<Bytes>) -> Self {
        Self::Bin(BinaryMessage {
            headers: PayloadHeaders::routed(route),
            body: body.into(),
        })
    }

    /// JSON payload addressed to `route`.
    #[must_use]
    pub fn json(route: impl Into<String>, body: Value) -> Self {
        Self::Json(JsonMessage {
            headers: PayloadHeaders::routed(route),
            body,
        })
    }

    /// Shared payload headers.
    #[must_use]
    pub const fn headers(&self) -> &PayloadHeaders {
        match self {
            Self::Bin(message) => &message.headers,
            Self::Json(message) => &message.headers,
        }
    }

    /// Mutable access to the payload headers.
    pub fn headers_mut(&mut self) -> &mut PayloadHeaders {
        match self {
            Self::Bin(message) => &mut message.headers,
            Self::Json(message) => &mut message.headers,
        }
    }

    /// Merge `extra` into the application headers, dropping reserved keys.
    #[must_use]
    pub fn with_extra_headers(mut self, extra: ExtraHeaders) -> Self {
        let headers = self.headers_mut();
        for (key, value) in extra {
            if !RESERVED_HEADERS.contains(&key.as_str()) {
                headers.extra.insert(key, value);
            }
        }
        self
    }

    /// Sequence number, once produced into a queue.
    #[must_use]
    pub const fn idx(&self) -> Option<u64> { self.headers().idx }
}

impl From<Payload> for Message {
    fn from(payload: Payload) -> Self {
        match payload {
            Payload::Bin(message) => Self::Bin(message),
            Payload::Json(message) => Self::Json(message),
        }
    }
}
