//! Outputs emitted by the protocol engine.

use std::time::Duration;

use bytes::Bytes;
use url::Url;

use crate::{
    error::{ConnectionError, DisconnectReason},
    message::{Message, Payload},
};

/// Instruction for the driver.
///
/// Actions must be executed in the order they were emitted.
#[derive(Clone, Debug, PartialEq)]
pub enum Action {
    /// Open a transport to the URL using the configured connector.
    Connect(Url),
    /// Run the application's connect hook and report its result via
    /// [`ProtocolEngine::connect_hook_finished`](super::ProtocolEngine::connect_hook_finished).
    RunConnectHook,
    /// Encode and write a control message.
    Send(Message),
    /// Write an already encoded queued payload.
    SendRaw {
        /// Sequence number of the payload.
        idx: u64,
        /// Encoded frame.
        bytes: Bytes,
    },
    /// Route the payload to a handler and report the outcome via
    /// [`ProtocolEngine::dispatch_finished`](super::ProtocolEngine::dispatch_finished).
    Dispatch(Payload),
    /// Close the open transport, then report
    /// [`ProtocolEngine::on_transport_closed`](super::ProtocolEngine::on_transport_closed).
    CloseTransport,
    /// Call [`ProtocolEngine::on_reconnect_timer`](super::ProtocolEngine::on_reconnect_timer)
    /// after the delay.
    ScheduleReconnect(Duration),
    /// Invoke an application callback.
    Notify(Notification),
    /// Stop driving the engine. No further actions follow.
    Shutdown(Result<(), ConnectionError>),
}

/// Application-visible lifecycle events.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Notification {
    /// The peer sent `ready`; queued payloads are being flushed.
    Ready {
        /// Index the peer is ready to receive from.
        ready_idx: u64,
    },
    /// The connection dropped and a reconnect was scheduled, or a transport
    /// error occurred while reconnection is available.
    ErroneousDisconnect(DisconnectReason),
    /// A failure the application must know about.
    Error(ConnectionError),
    /// The connection closed cleanly with nothing left unacknowledged.
    Closed,
}
