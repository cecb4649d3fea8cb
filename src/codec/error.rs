//! Error types for the frame codec.
//!
//! Decoding errors are never surfaced to applications: [`super::decode`]
//! degrades every variant to an opaque binary message. The taxonomy exists so
//! the fallback can be logged with a precise cause and so strict callers of
//! [`super::try_decode`] can tell the failures apart.
//!
//! - Framing: [`DecodeError::TooShort`] and [`DecodeError::HeaderLengthExceeded`] reject buffers
//!   whose length prefix cannot be honoured.
//! - Encoding: [`DecodeError::Base64`] and [`DecodeError::Json`] cover sections that are not
//!   base64-wrapped JSON.
//! - Protocol: the remaining variants cover headers that parse but do not describe a qws message.

use thiserror::Error;

use crate::byte_order::PREFIX_LEN;

/// Reasons a buffer could not be decoded into a typed message.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DecodeError {
    /// The buffer cannot hold the header-length prefix.
    #[error("invalid buffer size {len}, need at least {PREFIX_LEN} bytes")]
    TooShort {
        /// Length of the rejected buffer.
        len: usize,
    },

    /// The prefix declares more header bytes than the buffer holds.
    #[error("invalid header size {declared} > {available}")]
    HeaderLengthExceeded {
        /// Header length announced by the prefix.
        declared: u32,
        /// Bytes remaining after the prefix.
        available: usize,
    },

    /// A section is not valid base64.
    #[error("section is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    /// A section is not valid UTF-8 JSON.
    #[error("section is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The header section decoded to something other than a JSON object.
    #[error("header section is not a JSON object")]
    HeaderNotObject,

    /// A header required by the message type is absent.
    #[error("missing required header field: {field}")]
    MissingField {
        /// Name of the missing header.
        field: &'static str,
    },

    /// A reserved header holds a value of the wrong shape.
    #[error("invalid value for header field: {field}")]
    InvalidField {
        /// Name of the malformed header.
        field: &'static str,
    },

    /// The `type` header names no known message kind.
    #[error("unknown message type: {kind}")]
    UnknownType {
        /// The unrecognised `type` value.
        kind: String,
    },
}
