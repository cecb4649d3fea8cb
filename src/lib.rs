#![doc(html_root_url = "https://docs.rs/qws/latest")]
//! Queued, acknowledged message delivery over WebSocket connections.
//!
//! Every payload handed to a [`Qws`] connection is numbered and kept in an
//! outbound queue until the peer acknowledges it. When the transport drops,
//! the connection redials with the last acknowledged index and the peer's
//! `ready` frame decides which messages are sent again. Delivery is
//! at-least-once: a payload whose acknowledgment was lost is sent again.
//!
//! The crate is layered:
//!
//! - [`codec`] turns [`message::Message`] values into frames and back.
//! - [`queue`] holds outbound payloads and the send/acknowledge cursors.
//! - [`engine`] is a pure state machine for handshakes, acknowledgments,
//!   cooperative close and reconnection.
//! - [`connection`] drives the engine on Tokio over a [`transport`].
//! - [`router`] selects the application handler for inbound payloads.

pub mod byte_order;
pub mod codec;
pub mod config;
pub mod connection;
pub mod engine;
pub mod error;
pub mod handshake;
pub mod hooks;
pub mod message;
pub mod metrics;
pub mod panic;
pub mod queue;
pub mod router;
pub mod transport;

pub use config::QwsOptions;
pub use connection::{Qws, QwsBuilder, QwsHandle};
pub use error::{ConnectionError, DisconnectReason, QwsError, Result};
pub use hooks::{HandlerError, HandlerResult, Inbound};
pub use message::{Message, Payload, PayloadHeaders};
pub use queue::QueueStats;
pub use router::RouteParams;
