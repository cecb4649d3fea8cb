//! Transport abstraction used by the connection actor.
//!
//! A [`Transport`] moves whole encoded frames. It has no notion of message
//! kinds; encoding and decoding happen in the connection. A [`Connector`]
//! opens new transports for URL-based connections so the actor can reconnect.
//!
//! Three implementations ship with the crate:
//!
//! - [`websocket`] (feature `websocket`): binary WebSocket messages via `tokio-tungstenite`.
//! - [`stream`]: length-delimited frames over any `AsyncRead + AsyncWrite` stream.
//! - [`memory`]: in-process channel pairs for tests and embedding.

use std::io;

use async_trait::async_trait;
use bytes::Bytes;
use url::Url;

pub mod memory;
pub mod stream;
#[cfg(feature = "websocket")]
pub mod websocket;

/// Event observed on an open transport.
#[derive(Debug)]
pub enum TransportEvent {
    /// A complete frame arrived.
    Data(Bytes),
    /// The transport failed. It is treated as closed afterwards.
    Error(io::Error),
    /// The peer closed the transport.
    Closed,
}

/// An open, frame-oriented, bidirectional connection.
#[async_trait]
pub trait Transport: Send + 'static {
    /// Write one frame.
    async fn send(&mut self, frame: Bytes) -> io::Result<()>;

    /// Wait for the next frame or state change.
    ///
    /// Must be cancel safe: the connection polls it inside `tokio::select!`.
    async fn next_event(&mut self) -> TransportEvent;

    /// Close the transport. Errors are reported but the transport is
    /// considered closed regardless.
    async fn close(&mut self) -> io::Result<()>;
}

/// Boxed transport as held by the connection actor.
pub type BoxTransport = Box<dyn Transport>;

#[async_trait]
impl<T: Transport + ?Sized> Transport for Box<T> {
    async fn send(&mut self, frame: Bytes) -> io::Result<()> { (**self).send(frame).await }

    async fn next_event(&mut self) -> TransportEvent { (**self).next_event().await }

    async fn close(&mut self) -> io::Result<()> { (**self).close().await }
}

/// Opens transports to a URL.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Open a transport to `url`.
    async fn connect(&self, url: &Url) -> io::Result<BoxTransport>;
}
