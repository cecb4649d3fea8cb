//! Tokio driver for a [`ProtocolEngine`](crate::engine::ProtocolEngine).
//!
//! Each connection runs as one task that owns the engine, the transport and
//! the reconnect timer. Application calls reach it through an unbounded
//! command channel, so every engine input is serialised in a single
//! `tokio::select!` loop. Handlers are awaited inside that loop; inbound
//! frames are therefore processed strictly in wire order.
//!
//! [`QwsHandle::send`] is synchronous and returns the sequence number
//! immediately, so handlers may send without waiting on the task that is
//! running them.
//!
//! # Examples
//!
//! ```no_run
//! use qws::{Qws, config::QwsOptions};
//! use serde_json::json;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let qws = Qws::builder()
//!     .options(QwsOptions::default().name("uploader"))
//!     .on_json(|inbound| async move {
//!         println!("received {}", inbound.body);
//!         Ok(())
//!     })
//!     .on_error(|error| eprintln!("connection failed: {error}"))
//!     .connect("ws://localhost:3000/mypath/uploader")?;
//!
//! qws.send_json("", &json!({ "message": "Hello World" }))?;
//! qws.send_bin("blobs", b"1234567890-1234567890".as_slice())?;
//! qws.close()?;
//! qws.join().await?;
//! # Ok(())
//! # }
//! ```

mod actor;
mod builder;

use std::sync::{Arc, Mutex, PoisonError};

pub use builder::QwsBuilder;
use bytes::Bytes;
use serde::Serialize;
use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
};

use crate::{
    error::{ConnectionError, QwsError, Result},
    message::Payload,
    queue::QueueStats,
};

/// Request from a handle to the connection task.
#[derive(Debug)]
pub(crate) enum Command {
    Send { idx: u64, payload: Payload },
    Close,
}

#[derive(Debug)]
struct Shared {
    commands: mpsc::UnboundedSender<Command>,
    next_idx: Mutex<u64>,
    stats: watch::Receiver<QueueStats>,
}

/// Cloneable handle to a running connection.
///
/// When every handle (including the one inside [`Qws`]) is dropped the
/// connection closes as if [`close`](Self::close) had been called.
#[derive(Clone, Debug)]
pub struct QwsHandle {
    shared: Arc<Shared>,
}

impl QwsHandle {
    pub(crate) fn new(
        commands: mpsc::UnboundedSender<Command>,
        stats: watch::Receiver<QueueStats>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                commands,
                next_idx: Mutex::new(0),
                stats,
            }),
        }
    }

    /// Queue `payload` for delivery and return its sequence number.
    ///
    /// # Errors
    ///
    /// Returns [`QwsError::Closed`] if the connection task has stopped.
    pub fn send(&self, payload: Payload) -> Result<u64> {
        // Numbering and enqueueing happen under one lock so that sequence
        // numbers match channel order across clones.
        let mut next = self
            .shared
            .next_idx
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let idx = *next;
        self.shared
            .commands
            .send(Command::Send { idx, payload })
            .map_err(|_| QwsError::Closed)?;
        *next += 1;
        Ok(idx)
    }

    /// Queue a binary body addressed to `route`.
    ///
    /// # Errors
    ///
    /// Returns [`QwsError::Closed`] if the connection task has stopped.
    pub fn send_bin(&self, route: &str, body: impl Into<Bytes>) -> Result<u64> {
        self.send(Payload::bin(route, body))
    }

    /// Serialise `body` to JSON and queue it for `route`.
    ///
    /// # Errors
    ///
    /// Returns [`QwsError::Json`] if `body` cannot be serialised or
    /// [`QwsError::Closed`] if the connection task has stopped.
    pub fn send_json<T: Serialize + ?Sized>(&self, route: &str, body: &T) -> Result<u64> {
        let value = serde_json::to_value(body)?;
        self.send(Payload::json(route, value))
    }

    /// Request a cooperative close.
    ///
    /// The transport closes once everything queued has been acknowledged.
    ///
    /// # Errors
    ///
    /// Returns [`QwsError::Closed`] if the connection task has stopped.
    pub fn close(&self) -> Result<()> {
        self.shared
            .commands
            .send(Command::Close)
            .map_err(|_| QwsError::Closed)
    }

    /// Queue statistics as of the last processed event.
    #[must_use]
    pub fn stats(&self) -> QueueStats { *self.shared.stats.borrow() }
}

/// An owned connection: a [`QwsHandle`] plus the task driving it.
#[derive(Debug)]
pub struct Qws {
    handle: QwsHandle,
    task: JoinHandle<std::result::Result<(), ConnectionError>>,
}

impl Qws {
    /// Start configuring a connection.
    #[must_use]
    pub fn builder() -> QwsBuilder { QwsBuilder::new() }

    /// A cloneable handle to this connection.
    #[must_use]
    pub fn handle(&self) -> QwsHandle { self.handle.clone() }

    /// See [`QwsHandle::send`].
    ///
    /// # Errors
    ///
    /// Returns [`QwsError::Closed`] if the connection task has stopped.
    pub fn send(&self, payload: Payload) -> Result<u64> { self.handle.send(payload) }

    /// See [`QwsHandle::send_bin`].
    ///
    /// # Errors
    ///
    /// Returns [`QwsError::Closed`] if the connection task has stopped.
    pub fn send_bin(&self, route: &str, body: impl Into<Bytes>) -> Result<u64> {
        self.handle.send_bin(route, body)
    }

    /// See [`QwsHandle::send_json`].
    ///
    /// # Errors
    ///
    /// Returns [`QwsError::Json`] or [`QwsError::Closed`].
    pub fn send_json<T: Serialize + ?Sized>(&self, route: &str, body: &T) -> Result<u64> {
        self.handle.send_json(route, body)
    }

    /// See [`QwsHandle::close`].
    ///
    /// # Errors
    ///
    /// Returns [`QwsError::Closed`] if the connection task has stopped.
    pub fn close(&self) -> Result<()> { self.handle.close() }

    /// See [`QwsHandle::stats`].
    #[must_use]
    pub fn stats(&self) -> QueueStats { self.handle.stats() }

    /// Wait for the connection to finish.
    ///
    /// This does not request a close; call [`close`](Self::close) first or
    /// let the peer end the connection.
    ///
    /// # Errors
    ///
    /// Returns the terminal [`ConnectionError`] when reconnection was
    /// exhausted, messages were left unacknowledged, or the transport failed
    /// without reconnection.
    pub async fn join(self) -> std::result::Result<(), ConnectionError> {
        let Self { handle, task } = self;
        let outcome = task.await.unwrap_or(Err(ConnectionError::Aborted));
        drop(handle);
        outcome
    }
}

#[cfg(test)]
mod tests;
