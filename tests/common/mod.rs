//! Shared utilities for integration tests.
//!
//! [`Peer`] drives the far end of an in-memory transport by hand, speaking
//! raw qws frames. [`Events`] records lifecycle callbacks in order.

// Items in this shared module may not be used by all test binaries that import it.
#![allow(
    dead_code,
    reason = "shared test utilities are not used by all test binaries"
)]

use std::{
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use qws::{
    Message,
    Payload,
    QwsBuilder,
    codec,
    transport::{Transport, TransportEvent, memory::MemoryTransport},
};
use tokio::time::timeout;

/// Upper bound on how long a test waits for a single frame.
pub const WAIT: Duration = Duration::from_secs(5);

/// The far end of a connection under test.
pub struct Peer {
    transport: MemoryTransport,
}

impl Peer {
    pub fn new(transport: MemoryTransport) -> Self { Self { transport } }

    /// Next decoded frame.
    ///
    /// # Panics
    ///
    /// Panics if the transport closes first or nothing arrives within [`WAIT`].
    pub async fn recv(&mut self) -> Message {
        match self.event().await {
            TransportEvent::Data(frame) => codec::decode(frame),
            other => panic!("expected a frame, got {other:?}"),
        }
    }

    /// Next payload frame, skipping nothing.
    pub async fn recv_payload(&mut self) -> Payload {
        self.recv()
            .await
            .into_payload()
            .expect("expected a payload frame")
    }

    pub async fn send(&mut self, message: &Message) {
        self.transport
            .send(codec::encode(message))
            .await
            .expect("peer send failed");
    }

    pub async fn ready(&mut self, ready_idx: u64) { self.send(&Message::ready(ready_idx)).await; }

    pub async fn ack(&mut self, ack_idx: u64) { self.send(&Message::ack(ack_idx)).await; }

    /// Wait for the connection to close its end.
    pub async fn expect_closed(&mut self) {
        assert!(
            matches!(self.event().await, TransportEvent::Closed),
            "expected the transport to close"
        );
    }

    async fn event(&mut self) -> TransportEvent {
        timeout(WAIT, self.transport.next_event())
            .await
            .expect("timed out waiting for the connection")
    }
}

/// Stamp `idx` onto `payload` as a sending queue would.
pub fn numbered(mut payload: Payload, idx: u64) -> Message {
    payload.headers_mut().idx = Some(idx);
    Message::from(payload)
}

/// Ordered record of lifecycle callbacks.
#[derive(Clone, Default)]
pub struct Events(Arc<Mutex<Vec<String>>>);

impl Events {
    pub fn push(&self, event: impl Into<String>) {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.into());
    }

    pub fn snapshot(&self) -> Vec<String> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Register every lifecycle callback on `builder`, recording into `self`.
    pub fn attach(&self, builder: QwsBuilder) -> QwsBuilder {
        let (ready, disconnect, error, close) = (self.clone(), self.clone(), self.clone(), self.clone());
        builder
            .on_ready(move |idx| ready.push(format!("ready {idx}")))
            .on_erroneous_disconnect(move |reason| disconnect.push(format!("disconnect: {reason}")))
            .on_error(move |err| error.push(format!("error: {err}")))
            .on_close(move || close.push("closed"))
    }
}
