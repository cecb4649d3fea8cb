//! In-process transports backed by unbounded channels.
//!
//! [`pair`] returns two connected ends. [`listener`] returns a
//! [`MemoryConnector`] usable for URL-based connections together with the
//! [`MemoryListener`] that receives the accepting ends.

use std::{
    io,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;
use url::Url;

use super::{BoxTransport, Connector, Transport, TransportEvent};

/// One end of an in-memory connection.
#[derive(Debug)]
pub struct MemoryTransport {
    tx: Option<mpsc::UnboundedSender<Bytes>>,
    rx: mpsc::UnboundedReceiver<Bytes>,
}

/// Create two connected in-memory transports.
///
/// Closing or dropping one end makes the other observe
/// [`TransportEvent::Closed`] once buffered frames are drained.
#[must_use]
pub fn pair() -> (MemoryTransport, MemoryTransport) {
    let (a_tx, a_rx) = mpsc::unbounded_channel();
    let (b_tx, b_rx) = mpsc::unbounded_channel();
    (
        MemoryTransport {
            tx: Some(a_tx),
            rx: b_rx,
        },
        MemoryTransport {
            tx: Some(b_tx),
            rx: a_rx,
        },
    )
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn send(&mut self, frame: Bytes) -> io::Result<()> {
        let tx = self
            .tx
            .as_ref()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "transport closed"))?;
        tx.send(frame)
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "peer dropped"))
    }

    async fn next_event(&mut self) -> TransportEvent {
        match self.rx.recv().await {
            Some(frame) => TransportEvent::Data(frame),
            None => TransportEvent::Closed,
        }
    }

    async fn close(&mut self) -> io::Result<()> {
        self.tx = None;
        Ok(())
    }
}

/// Connector handing server ends to a [`MemoryListener`].
#[derive(Clone, Debug)]
pub struct MemoryConnector {
    incoming: mpsc::UnboundedSender<(MemoryTransport, Url)>,
    attempts: Arc<AtomicUsize>,
}

/// Receiving side of [`listener`].
#[derive(Debug)]
pub struct MemoryListener {
    incoming: mpsc::UnboundedReceiver<(MemoryTransport, Url)>,
}

/// Create a connector and the listener accepting its connections.
///
/// Connection attempts fail with [`io::ErrorKind::ConnectionRefused`] once the
/// listener is dropped.
#[must_use]
pub fn listener() -> (MemoryConnector, MemoryListener) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        MemoryConnector {
            incoming: tx,
            attempts: Arc::new(AtomicUsize::new(0)),
        },
        MemoryListener { incoming: rx },
    )
}

impl MemoryConnector {
    /// Number of connection attempts made so far, successful or not.
    #[must_use]
    pub fn attempts(&self) -> usize { self.attempts.load(Ordering::SeqCst) }
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn connect(&self, url: &Url) -> io::Result<BoxTransport> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let (client, server) = pair();
        self.incoming
            .send((server, url.clone()))
            .map_err(|_| io::Error::new(io::ErrorKind::ConnectionRefused, "listener dropped"))?;
        Ok(Box::new(client))
    }
}

impl MemoryListener {
    /// Wait for the next connection, returning the server end and the dialled URL.
    pub async fn accept(&mut self) -> Option<(MemoryTransport, Url)> { self.incoming.recv().await }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn frames_flow_both_ways() {
        let (mut a, mut b) = pair();
        a.send(Bytes::from_static(b"ping")).await.expect("send");
        b.send(Bytes::from_static(b"pong")).await.expect("send");

        assert!(matches!(b.next_event().await, TransportEvent::Data(f) if f == "ping"));
        assert!(matches!(a.next_event().await, TransportEvent::Data(f) if f == "pong"));
    }

    #[tokio::test]
    async fn close_is_observed_by_peer_after_buffered_frames() {
        let (mut a, mut b) = pair();
        a.send(Bytes::from_static(b"last")).await.expect("send");
        a.close().await.expect("close");

        assert!(matches!(b.next_event().await, TransportEvent::Data(_)));
        assert!(matches!(b.next_event().await, TransportEvent::Closed));
        assert!(a.send(Bytes::new()).await.is_err());
    }

    #[tokio::test]
    async fn connector_counts_attempts_and_fails_without_listener() {
        let (connector, mut listener) = listener();
        let url = Url::parse("memory://server/?idx=0").expect("valid url");

        connector.connect(&url).await.expect("listener alive");
        let (_, seen) = listener.accept().await.expect("accepted");
        assert_eq!(seen, url);

        drop(listener);
        let err = connector.connect(&url).await.err().expect("listener gone");
        assert_eq!(err.kind(), io::ErrorKind::ConnectionRefused);
        assert_eq!(connector.attempts(), 2);
    }
}
