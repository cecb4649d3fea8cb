//! FIFO store for outbound payloads awaiting acknowledgment.
//!
//! Messages are encoded once, when produced, and kept until the peer
//! acknowledges them. Three cursors partition the sequence space:
//!
//! ```text
//!   acked (purged)  |  sent, unacked  |  unsent
//! 0 ............ ack_idx ........... read_idx ........... write_idx
//! ```
//!
//! `ack_idx <= read_idx <= write_idx` holds after every operation. Entries in
//! `[ack_idx, write_idx)` stay stored; rewinding `read_idx` with
//! [`OutboundQueue::revert`] therefore never loses data.

use std::collections::VecDeque;

use bytes::Bytes;
use thiserror::Error;

use crate::{codec, message::Payload};

/// Errors returned by queue operations.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum QueueError {
    /// `consume` was called with no unsent messages.
    #[error("no unsent messages in queue")]
    Empty,
}

/// Snapshot of the queue cursors and counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct QueueStats {
    pub write_idx: u64,
    pub read_idx: u64,
    pub ack_idx: u64,
    pub unsent_messages: u64,
    pub unsent_bytes: usize,
    pub unacked_messages: u64,
    pub unacked_bytes: usize,
}

/// Outbound queue owned by a single connection.
///
/// # Examples
///
/// ```
/// use qws::{message::Payload, queue::OutboundQueue};
///
/// let mut queue = OutboundQueue::new();
/// let idx = queue.produce(Payload::bin("", vec![1, 2, 3]));
/// let (sent, _bytes) = queue.consume().expect("one unsent message");
/// assert_eq!(idx, sent);
/// queue.acknowledge(idx);
/// assert_eq!(queue.num_unacked_messages(), 0);
/// ```
#[derive(Debug, Default)]
pub struct OutboundQueue {
    /// Encoded frames for `[ack_idx, write_idx)`, front first.
    entries: VecDeque<Bytes>,
    write_idx: u64,
    read_idx: u64,
    ack_idx: u64,
    unsent_bytes: usize,
    unacked_bytes: usize,
}

impl OutboundQueue {
    /// Create an empty queue starting at sequence number zero.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Stamp `payload` with the next sequence number, encode and store it.
    pub fn produce(&mut self, mut payload: Payload) -> u64 {
        let idx = self.write_idx;
        payload.headers_mut().idx = Some(idx);
        let data = codec::encode(&payload.into());

        self.unsent_bytes += data.len();
        self.unacked_bytes += data.len();
        self.entries.push_back(data);
        self.write_idx += 1;
        idx
    }

    /// Hand out the next unsent message without removing it.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Empty`] when every stored message was already
    /// handed out.
    pub fn consume(&mut self) -> Result<(u64, Bytes), QueueError> {
        let idx = self.read_idx;
        let data = self.entry(idx).cloned().ok_or(QueueError::Empty)?;

        self.unsent_bytes -= data.len();
        self.read_idx += 1;
        Ok((idx, data))
    }

    /// Forget every message with sequence number `<= idx`.
    ///
    /// Already acknowledged indices are ignored, so repeated or stale
    /// acknowledgments are no-ops. Acknowledgments beyond the last produced
    /// message are clamped to it.
    pub fn acknowledge(&mut self, idx: u64) {
        if idx >= self.write_idx {
            tracing::warn!(
                idx,
                write_idx = self.write_idx,
                "acknowledgment beyond last produced message"
            );
        }
        while self.ack_idx <= idx {
            let Some(data) = self.entries.pop_front() else {
                break;
            };
            if self.ack_idx >= self.read_idx {
                // acknowledged before it was handed out
                self.unsent_bytes -= data.len();
                self.read_idx += 1;
            }
            self.unacked_bytes -= data.len();
            self.ack_idx += 1;
        }
    }

    /// Rewind the read cursor to `idx` so those messages are handed out again.
    ///
    /// The cursor never moves forward and never drops below `ack_idx`.
    pub fn revert(&mut self, idx: u64) {
        let target = idx.max(self.ack_idx);
        while self.read_idx > target {
            self.read_idx -= 1;
            if let Some(data) = self.entry(self.read_idx) {
                self.unsent_bytes += data.len();
            }
        }
    }

    /// Next sequence number to be assigned.
    #[must_use]
    pub const fn write_idx(&self) -> u64 { self.write_idx }

    /// Next sequence number to be handed out.
    #[must_use]
    pub const fn read_idx(&self) -> u64 { self.read_idx }

    /// Lowest sequence number not yet acknowledged.
    #[must_use]
    pub const fn ack_idx(&self) -> u64 { self.ack_idx }

    /// Number of messages not yet handed out.
    #[must_use]
    pub const fn num_unsent_messages(&self) -> u64 { self.write_idx - self.read_idx }

    /// Number of messages not yet acknowledged.
    #[must_use]
    pub const fn num_unacked_messages(&self) -> u64 { self.write_idx - self.ack_idx }

    /// Encoded size of the messages not yet handed out.
    #[must_use]
    pub const fn num_unsent_bytes(&self) -> usize { self.unsent_bytes }

    /// Encoded size of the messages not yet acknowledged.
    #[must_use]
    pub const fn num_unacked_bytes(&self) -> usize { self.unacked_bytes }

    /// Snapshot of the cursors and counters.
    #[must_use]
    pub const fn stats(&self) -> QueueStats {
        QueueStats {
            write_idx: self.write_idx,
            read_idx: self.read_idx,
            ack_idx: self.ack_idx,
            unsent_messages: self.num_unsent_messages(),
            unsent_bytes: self.unsent_bytes,
            unacked_messages: self.num_unacked_messages(),
            unacked_bytes: self.unacked_bytes,
        }
    }

    fn entry(&self, idx: u64) -> Option<&Bytes> {
        let offset = idx.checked_sub(self.ack_idx)?;
        self.entries.get(usize::try_from(offset).ok()?)
    }
}

#[cfg(test)]
mod tests;
