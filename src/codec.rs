//! Frame codec converting typed messages to and from wire buffers.
//!
//! A frame is laid out as:
//!
//! ```text
//! [0..4)    u32 (little-endian)  header section length N
//! [4..4+N)  base64(UTF-8 JSON)   header mapping, always carrying `type`
//! [4+N..)   body                 raw bytes for `bin`, base64(JSON) for `json`,
//!                                absent for `ready`, `ack` and `err`
//! ```
//!
//! Decoding is lenient by policy: [`decode`] never fails. A buffer that cannot
//! be interpreted is delivered as a `bin` message whose body is the whole
//! input, so one corrupt or foreign frame does not tear the connection down.
//! [`try_decode`] exposes the strict variant.

use base64::{Engine as _, engine::general_purpose::STANDARD};
use bytes::{BufMut, Bytes, BytesMut};
use serde_json::{Map, Value};

use crate::{
    byte_order::{PREFIX_LEN, peek_prefix, write_prefix},
    message::{
        AckMessage,
        BinaryMessage,
        ErrorMessage,
        ExtraHeaders,
        JsonMessage,
        Message,
        MessageKind,
        PayloadHeaders,
        RESERVED_HEADERS,
        ReadyMessage,
    },
    metrics,
};

pub mod error;

pub use error::DecodeError;

/// Encode `message` into its wire form.
///
/// # Examples
///
/// ```
/// use qws::{
///     codec::{decode, encode},
///     message::Message,
/// };
///
/// let frame = encode(&Message::ack(7));
/// assert_eq!(decode(frame), Message::ack(7));
/// ```
#[must_use]
pub fn encode(message: &Message) -> Bytes {
    let header_section = encode_json(&Value::Object(header_map(message)));
    let json_body = match message {
        Message::Json(json) => Some(encode_json(&json.body)),
        _ => None,
    };
    let raw_body = match message {
        Message::Bin(bin) => bin.body.as_ref(),
        _ => &[],
    };
    let body_len = json_body.as_ref().map_or(raw_body.len(), String::len);

    let mut buf = BytesMut::with_capacity(PREFIX_LEN + header_section.len() + body_len);
    // A header section beyond u32::MAX bytes cannot be framed; the peer rejects the prefix.
    let declared = u32::try_from(header_section.len()).unwrap_or(u32::MAX);
    buf.put_slice(&write_prefix(declared));
    buf.put_slice(header_section.as_bytes());
    match json_body {
        Some(body) => buf.put_slice(body.as_bytes()),
        None => buf.put_slice(raw_body),
    }
    buf.freeze()
}

/// Decode a frame, degrading malformed input to an opaque binary message.
///
/// The cause of a fallback is logged at `warn` level and never propagated.
#[must_use]
pub fn decode(frame: Bytes) -> Message {
    match try_decode(&frame) {
        Ok(message) => message,
        Err(error) => {
            tracing::warn!(%error, len = frame.len(), "could not decode frame, treating it as binary");
            metrics::inc_decode_fallbacks();
            Message::Bin(BinaryMessage {
                headers: PayloadHeaders::default(),
                body: frame,
            })
        }
    }
}

/// Decode a frame, reporting why it could not be interpreted.
///
/// # Errors
///
/// Returns a [`DecodeError`] when the length prefix, either encoded section,
/// or the header contents are malformed.
pub fn try_decode(frame: &Bytes) -> Result<Message, DecodeError> {
    let declared = peek_prefix(frame).ok_or(DecodeError::TooShort { len: frame.len() })?;
    let available = frame.len() - PREFIX_LEN;
    let header_end = usize::try_from(declared)
        .ok()
        .filter(|len| *len <= available)
        .map(|len| PREFIX_LEN + len)
        .ok_or(DecodeError::HeaderLengthExceeded {
            declared,
            available,
        })?;

    let Value::Object(mut headers) = decode_json(&frame.slice(PREFIX_LEN..header_end))? else {
        return Err(DecodeError::HeaderNotObject);
    };
    let body = frame.slice(header_end..);

    let kind = match headers.remove("type") {
        None => MessageKind::Bin,
        Some(Value::String(kind)) => {
            MessageKind::parse(&kind).ok_or(DecodeError::UnknownType { kind })?
        }
        Some(_) => return Err(DecodeError::InvalidField { field: "type" }),
    };

    let message = match kind {
        MessageKind::Bin => Message::Bin(BinaryMessage {
            headers: payload_headers(headers)?,
            body,
        }),
        MessageKind::Json => Message::Json(JsonMessage {
            headers: payload_headers(headers)?,
            body: decode_json(&body)?,
        }),
        MessageKind::Ready => Message::Ready(ReadyMessage {
            ready_idx: required_index(&mut headers, "readyIdx")?,
            extra: strip_reserved(headers),
        }),
        MessageKind::Ack => Message::Ack(AckMessage {
            ack_idx: required_index(&mut headers, "ackIdx")?,
        }),
        MessageKind::Err => match headers.remove("error") {
            Some(Value::String(error)) => Message::Err(ErrorMessage { error }),
            Some(_) => return Err(DecodeError::InvalidField { field: "error" }),
            None => return Err(DecodeError::MissingField { field: "error" }),
        },
    };
    Ok(message)
}

fn header_map(message: &Message) -> Map<String, Value> {
    let mut map = Map::new();
    match message {
        Message::Bin(BinaryMessage { headers, .. }) | Message::Json(JsonMessage { headers, .. }) => {
            extend_extra(&mut map, &headers.extra);
            if let Some(idx) = headers.idx {
                map.insert("idx".into(), idx.into());
            }
            if let Some(route) = &headers.route {
                map.insert("route".into(), route.clone().into());
            }
        }
        Message::Ready(ready) => {
            extend_extra(&mut map, &ready.extra);
            map.insert("readyIdx".into(), ready.ready_idx.into());
        }
        Message::Ack(ack) => {
            map.insert("ackIdx".into(), ack.ack_idx.into());
        }
        Message::Err(err) => {
            map.insert("error".into(), err.error.clone().into());
        }
    }
    map.insert("type".into(), message.kind().as_str().into());
    map
}

fn extend_extra(map: &mut Map<String, Value>, extra: &ExtraHeaders) {
    for (key, value) in extra {
        if !RESERVED_HEADERS.contains(&key.as_str()) {
            map.insert(key.clone(), value.clone());
        }
    }
}

fn payload_headers(mut headers: Map<String, Value>) -> Result<PayloadHeaders, DecodeError> {
    let idx = optional_index(&mut headers, "idx")?;
    let route = match headers.remove("route") {
        None | Some(Value::Null) => None,
        Some(Value::String(route)) => Some(route),
        Some(_) => return Err(DecodeError::InvalidField { field: "route" }),
    };
    Ok(PayloadHeaders {
        idx,
        route,
        extra: strip_reserved(headers),
    })
}

fn optional_index(
    headers: &mut Map<String, Value>,
    field: &'static str,
) -> Result<Option<u64>, DecodeError> {
    match headers.remove(field) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_u64()
            .map(Some)
            .ok_or(DecodeError::InvalidField { field }),
    }
}

fn required_index(headers: &mut Map<String, Value>, field: &'static str) -> Result<u64, DecodeError> {
    optional_index(headers, field)?.ok_or(DecodeError::MissingField { field })
}

fn strip_reserved(mut headers: Map<String, Value>) -> ExtraHeaders {
    headers.retain(|key, _| !RESERVED_HEADERS.contains(&key.as_str()));
    headers
}

fn encode_json(value: &Value) -> String { STANDARD.encode(value.to_string()) }

fn decode_json(section: &[u8]) -> Result<Value, DecodeError> {
    let text = STANDARD.decode(section)?;
    Ok(serde_json::from_slice(&text)?)
}
