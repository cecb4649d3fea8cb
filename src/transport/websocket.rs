//! WebSocket transport built on `tokio-tungstenite`.
//!
//! Frames travel as binary WebSocket messages. Incoming text messages are
//! accepted and treated as frames too; ping and pong are handled by the
//! library and never surface.

use std::io;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use tokio::{
    io::{AsyncRead, AsyncWrite},
    net::TcpStream,
};
use tokio_tungstenite::{
    WebSocketStream,
    tungstenite::{
        Error as WsError,
        Message as WsMessage,
        handshake::server::{ErrorResponse, Request, Response},
    },
};
use url::Url;

use super::{BoxTransport, Connector, Transport, TransportEvent};

/// Transport over an established WebSocket stream.
#[derive(Debug)]
pub struct WsTransport<S> {
    inner: WebSocketStream<S>,
}

impl<S> WsTransport<S> {
    /// Wrap an established WebSocket stream.
    pub fn new(inner: WebSocketStream<S>) -> Self { Self { inner } }
}

fn to_io(error: WsError) -> io::Error {
    match error {
        WsError::Io(error) => error,
        other => io::Error::other(other),
    }
}

#[async_trait]
impl<S> Transport for WsTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    async fn send(&mut self, frame: Bytes) -> io::Result<()> {
        self.inner.send(WsMessage::Binary(frame)).await.map_err(to_io)
    }

    async fn next_event(&mut self) -> TransportEvent {
        loop {
            match self.inner.next().await {
                Some(Ok(WsMessage::Binary(data))) => return TransportEvent::Data(data),
                Some(Ok(WsMessage::Text(text))) => {
                    return TransportEvent::Data(Bytes::copy_from_slice(text.as_bytes()));
                }
                Some(Ok(WsMessage::Close(_))) | None => return TransportEvent::Closed,
                Some(Ok(WsMessage::Ping(_) | WsMessage::Pong(_) | WsMessage::Frame(_))) => {}
                Some(Err(WsError::ConnectionClosed | WsError::AlreadyClosed)) => {
                    return TransportEvent::Closed;
                }
                Some(Err(error)) => return TransportEvent::Error(to_io(error)),
            }
        }
    }

    async fn close(&mut self) -> io::Result<()> {
        match self.inner.close(None).await {
            Ok(()) | Err(WsError::ConnectionClosed | WsError::AlreadyClosed) => Ok(()),
            Err(error) => Err(to_io(error)),
        }
    }
}

/// Connector dialling `ws://` and `wss://` URLs.
#[derive(Clone, Copy, Debug, Default)]
pub struct WsConnector;

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, url: &Url) -> io::Result<BoxTransport> {
        let (stream, _response) = tokio_tungstenite::connect_async(url.as_str())
            .await
            .map_err(to_io)?;
        Ok(Box::new(WsTransport::new(stream)))
    }
}

/// Complete the server side of a WebSocket handshake on `stream`.
///
/// Returns the transport together with the URL requested by the client,
/// resolved against `ws://localhost/`, so its query can be inspected with
/// [`handshake::query_params`](crate::handshake::query_params).
///
/// # Errors
///
/// Returns an error if the handshake fails.
pub async fn accept(stream: TcpStream) -> io::Result<(WsTransport<TcpStream>, Url)> {
    let mut requested = None;
    let callback = |request: &Request, response: Response| {
        requested = Some(request.uri().to_string());
        Ok::<Response, ErrorResponse>(response)
    };
    let inner = tokio_tungstenite::accept_hdr_async(stream, callback)
        .await
        .map_err(to_io)?;

    let base = Url::parse("ws://localhost/").map_err(io::Error::other)?;
    let url = base
        .join(requested.as_deref().unwrap_or("/"))
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    Ok((WsTransport::new(inner), url))
}

#[cfg(test)]
mod tests {
    use tokio::net::TcpListener;

    use super::*;

    #[tokio::test]
    async fn client_and_server_exchange_frames() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");
        let url = Url::parse(&format!("ws://{addr}/feed?idx=3")).expect("valid url");

        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.expect("accept");
            let (mut transport, requested) = accept(socket).await.expect("handshake");
            assert_eq!(requested.path(), "/feed");
            assert_eq!(requested.query(), Some("idx=3"));
            let event = transport.next_event().await;
            assert!(matches!(event, TransportEvent::Data(f) if f == "hello"));
            transport.close().await.expect("close");
        });

        let mut client = WsConnector.connect(&url).await.expect("connect");
        client
            .send(Bytes::from_static(b"hello"))
            .await
            .expect("send");
        assert!(matches!(client.next_event().await, TransportEvent::Closed));
        server.await.expect("server task");
    }
}
