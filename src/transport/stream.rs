//! Length-delimited frames over a byte stream.
//!
//! Each frame is prefixed with its length by
//! [`LengthDelimitedCodec`](tokio_util::codec::LengthDelimitedCodec), so any
//! `AsyncRead + AsyncWrite` stream such as a TCP socket or a
//! [`tokio::io::duplex`] pipe can carry the protocol.

use std::io;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use tokio::{
    io::{AsyncRead, AsyncWrite},
    net::TcpStream,
};
use tokio_util::codec::{Framed, LengthDelimitedCodec};
use url::Url;

use super::{BoxTransport, Connector, Transport, TransportEvent};

/// Trait alias for streams usable by [`StreamTransport`].
pub trait FrameStream: AsyncRead + AsyncWrite + Unpin + Send + 'static {}
impl<T> FrameStream for T where T: AsyncRead + AsyncWrite + Unpin + Send + 'static {}

/// Transport writing length-delimited frames to `S`.
#[derive(Debug)]
pub struct StreamTransport<S: FrameStream> {
    framed: Framed<S, LengthDelimitedCodec>,
}

impl<S: FrameStream> StreamTransport<S> {
    /// Wrap `stream` with the default length-delimited codec.
    pub fn new(stream: S) -> Self {
        Self {
            framed: Framed::new(stream, LengthDelimitedCodec::new()),
        }
    }

    /// Wrap `stream` allowing frames of at most `max_frame_length` bytes.
    pub fn with_max_frame_length(stream: S, max_frame_length: usize) -> Self {
        let codec = LengthDelimitedCodec::builder()
            .max_frame_length(max_frame_length)
            .new_codec();
        Self {
            framed: Framed::new(stream, codec),
        }
    }

    /// Consume the transport and return the underlying stream.
    pub fn into_inner(self) -> S { self.framed.into_inner() }
}

#[async_trait]
impl<S: FrameStream> Transport for StreamTransport<S> {
    async fn send(&mut self, frame: Bytes) -> io::Result<()> { self.framed.send(frame).await }

    async fn next_event(&mut self) -> TransportEvent {
        match self.framed.next().await {
            Some(Ok(frame)) => TransportEvent::Data(frame.freeze()),
            Some(Err(error)) => TransportEvent::Error(error),
            None => TransportEvent::Closed,
        }
    }

    async fn close(&mut self) -> io::Result<()> { SinkExt::<Bytes>::close(&mut self.framed).await }
}

/// Connector dialling `tcp://host:port` URLs.
#[derive(Clone, Copy, Debug, Default)]
pub struct TcpConnector;

#[async_trait]
impl Connector for TcpConnector {
    async fn connect(&self, url: &Url) -> io::Result<BoxTransport> {
        let addrs = url.socket_addrs(|| None)?;
        let stream = TcpStream::connect(&*addrs).await?;
        stream.set_nodelay(true)?;
        Ok(Box::new(StreamTransport::new(stream)))
    }
}
