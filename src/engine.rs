//! Sans-I/O protocol state machine.
//!
//! [`ProtocolEngine`] owns the outbound queue and the connection flags. Every
//! input (transport events, handler completions, application calls) returns
//! the [`Action`]s the driver must perform, in order. The engine never
//! touches a socket or a clock, so reconnection and handshake rules can be
//! tested by feeding it inputs directly.
//!
//! ```
//! use qws::{
//!     config::QwsOptions,
//!     engine::{Action, ProtocolEngine},
//!     message::{Message, Payload},
//! };
//! use url::Url;
//!
//! let url = Url::parse("ws://localhost:3000/").expect("valid url");
//! let mut engine = ProtocolEngine::connecting(url, QwsOptions::default());
//! assert!(matches!(engine.start().as_slice(), [Action::Connect(_)]));
//!
//! // Payloads queue up until the peer sends `ready`.
//! let (idx, actions) = engine.send(Payload::bin("", vec![1, 2, 3]));
//! assert_eq!(idx, 0);
//! assert!(actions.is_empty());
//!
//! assert_eq!(engine.on_opened(), vec![Action::RunConnectHook]);
//! let actions = engine.on_frame(Message::ready(0));
//! assert!(actions.iter().any(|a| matches!(a, Action::SendRaw { idx: 0, .. })));
//! ```

mod action;
mod state;

pub use action::{Action, Notification};
pub use state::ConnectionState;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::{
    config::QwsOptions,
    error::{ConnectionError, DisconnectReason},
    handshake,
    message::{Message, Payload},
    metrics,
    queue::{OutboundQueue, QueueStats},
};

#[derive(Debug)]
enum Target {
    Url(Url),
    Adopted,
}

/// Protocol state for one logical connection.
#[derive(Debug)]
pub struct ProtocolEngine {
    options: QwsOptions,
    target: Target,
    queue: OutboundQueue,
    state: ConnectionState,
    attempts: u32,
    needed: bool,
    ready: bool,
    last_error: Option<ConnectionError>,
}

impl ProtocolEngine {
    /// Engine that dials `url` and may reconnect to it.
    #[must_use]
    pub fn connecting(url: Url, options: QwsOptions) -> Self { Self::new(Target::Url(url), options) }

    /// Engine for a transport that is already open, such as one accepted by a
    /// server. Reconnection is never attempted.
    #[must_use]
    pub fn adopted(options: QwsOptions) -> Self { Self::new(Target::Adopted, options) }

    fn new(target: Target, options: QwsOptions) -> Self {
        Self {
            options,
            target,
            queue: OutboundQueue::new(),
            state: ConnectionState::Idle,
            attempts: 0,
            needed: true,
            ready: false,
            last_error: None,
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> ConnectionState { self.state }

    /// Read access to the outbound queue.
    #[must_use]
    pub const fn queue(&self) -> &OutboundQueue { &self.queue }

    /// Snapshot of the outbound queue.
    #[must_use]
    pub const fn stats(&self) -> QueueStats { self.queue.stats() }

    /// Connection options.
    #[must_use]
    pub const fn options(&self) -> &QwsOptions { &self.options }

    /// Whether the peer completed the handshake on the current transport.
    #[must_use]
    pub const fn is_ready(&self) -> bool { self.ready }

    /// `false` once the application requested a close.
    #[must_use]
    pub const fn is_needed(&self) -> bool { self.needed }

    /// Connection attempts since the transport last opened.
    #[must_use]
    pub const fn attempts(&self) -> u32 { self.attempts }

    /// Whether a lost transport can be replaced.
    #[must_use]
    pub const fn reconnect_available(&self) -> bool {
        self.options.reconnect && matches!(self.target, Target::Url(_))
    }

    /// Begin the connection lifecycle.
    pub fn start(&mut self) -> Vec<Action> {
        let mut out = Vec::new();
        if self.state != ConnectionState::Idle {
            warn!(state = %self.state, "engine already started");
            return out;
        }
        match self.target {
            Target::Url(_) => self.attempt(&mut out),
            Target::Adopted => self.opened(&mut out),
        }
        out
    }

    /// The transport requested by [`Action::Connect`] is open.
    pub fn on_opened(&mut self) -> Vec<Action> {
        let mut out = Vec::new();
        if self.state == ConnectionState::Connecting {
            self.opened(&mut out);
        } else {
            warn!(state = %self.state, "unexpected transport open");
        }
        out
    }

    /// The transport requested by [`Action::Connect`] could not be opened.
    pub fn on_connect_failed(&mut self, error: &str) -> Vec<Action> {
        let mut out = Vec::new();
        if self.state != ConnectionState::Connecting {
            return out;
        }
        self.transport_error(error, &mut out);
        self.closed(&mut out);
        out
    }

    /// Result of [`Action::RunConnectHook`]: the index the application is
    /// ready to receive from, or why it cannot accept the connection.
    pub fn connect_hook_finished(&mut self, result: Result<u64, String>) -> Vec<Action> {
        let mut out = Vec::new();
        if !self.state.is_open() {
            debug!(state = %self.state, "connect hook finished after transport loss");
            return out;
        }
        match result {
            Ok(ready_idx) => {
                debug!(ready_idx, "sending ready");
                out.push(Action::Send(Message::ready(ready_idx)));
            }
            Err(error) => {
                warn!(%error, "connect hook failed, rejecting handshake");
                out.push(Action::Send(Message::error(error)));
            }
        }
        out
    }

    /// A frame arrived on the open transport.
    pub fn on_frame(&mut self, message: Message) -> Vec<Action> {
        let mut out = Vec::new();
        if !self.state.is_open() {
            debug!(state = %self.state, kind = %message.kind(), "dropping frame");
            return out;
        }
        match message {
            Message::Ready(ready) => self.peer_ready(ready.ready_idx, &mut out),
            Message::Ack(ack) => {
                self.queue.acknowledge(ack.ack_idx);
                metrics::set_unacked(self.queue.num_unacked_messages());
                debug!(
                    ack_idx = ack.ack_idx,
                    unacked = self.queue.num_unacked_messages(),
                    "acknowledged"
                );
                if self.queue.num_unacked_messages() == 0 && !self.needed {
                    self.close_transport(&mut out);
                }
            }
            Message::Err(err) => {
                error!(error = %err.error, "peer reported error");
                metrics::inc_errors();
                out.push(Action::Notify(Notification::Error(ConnectionError::Peer(
                    err.error,
                ))));
            }
            Message::Bin(message) => out.push(Action::Dispatch(Payload::Bin(message))),
            Message::Json(message) => out.push(Action::Dispatch(Payload::Json(message))),
        }
        out
    }

    /// Result of [`Action::Dispatch`] for the payload with sequence number `idx`.
    pub fn dispatch_finished(&mut self, idx: Option<u64>, result: Result<(), String>) -> Vec<Action> {
        let mut out = Vec::new();
        if !self.state.is_open() {
            return out;
        }
        match (result, idx) {
            (Ok(()), Some(idx)) => out.push(Action::Send(Message::ack(idx))),
            (Ok(()), None) => debug!("payload without idx, nothing to acknowledge"),
            (Err(error), idx) => {
                warn!(?idx, %error, "handler failed");
                out.push(Action::Send(Message::error(error)));
            }
        }
        out
    }

    /// The transport reported an error. A close is expected to follow.
    pub fn on_transport_error(&mut self, error: &str) -> Vec<Action> {
        let mut out = Vec::new();
        if self.state.has_transport() || self.state == ConnectionState::Connecting {
            self.transport_error(error, &mut out);
        }
        out
    }

    /// Writing to the transport failed; it is closed.
    pub fn on_send_failed(&mut self, error: &str) -> Vec<Action> {
        let mut out = Vec::new();
        if self.state.has_transport() {
            self.transport_error(error, &mut out);
            self.close_transport(&mut out);
        }
        out
    }

    /// The transport closed, locally or remotely.
    pub fn on_transport_closed(&mut self) -> Vec<Action> {
        let mut out = Vec::new();
        if self.state.has_transport() || self.state == ConnectionState::Connecting {
            self.closed(&mut out);
        }
        out
    }

    /// The delay from [`Action::ScheduleReconnect`] elapsed.
    pub fn on_reconnect_timer(&mut self) -> Vec<Action> {
        let mut out = Vec::new();
        if self.state != ConnectionState::Reconnecting {
            return out;
        }
        if !self.needed && self.queue.num_unacked_messages() == 0 {
            info!("close requested while disconnected, not reconnecting");
            self.finish(Ok(()), &mut out);
        } else {
            self.attempt(&mut out);
        }
        out
    }

    /// Queue `payload`, returning its sequence number.
    pub fn send(&mut self, payload: Payload) -> (u64, Vec<Action>) {
        let mut out = Vec::new();
        let was_empty = self.queue.num_unsent_messages() == 0;
        let idx = self.queue.produce(payload);
        metrics::set_unacked(self.queue.num_unacked_messages());
        debug!(
            idx,
            unsent = self.queue.num_unsent_messages(),
            unsent_bytes = self.queue.num_unsent_bytes(),
            "queued message"
        );
        if was_empty {
            self.flush(&mut out);
        }
        (idx, out)
    }

    /// Request a cooperative close: the transport closes once every queued
    /// payload has been sent and acknowledged.
    pub fn close(&mut self) -> Vec<Action> {
        let mut out = Vec::new();
        if self.state.is_terminal() {
            return out;
        }
        info!(
            unacked = self.queue.num_unacked_messages(),
            "close requested"
        );
        self.needed = false;
        self.flush(&mut out);
        out
    }

    fn attempt(&mut self, out: &mut Vec<Action>) {
        self.attempts = self.attempts.saturating_add(1);
        if self.attempts > 1 {
            metrics::inc_reconnect_attempts();
        }
        let max_tries = self.options.reconnect_num_tries;
        if self.reconnect_available() && self.attempts > max_tries.saturating_add(1) {
            error!(max_tries, "connection timed out, giving up");
            self.finish(Err(ConnectionError::ReconnectExhausted { max_tries }), out);
            return;
        }
        let Target::Url(base) = &self.target else {
            return;
        };
        let url = handshake::connect_url(base, &self.options.extra_connect_args, self.queue.ack_idx());
        info!(attempt = self.attempts, %url, "connecting");
        self.state = ConnectionState::Connecting;
        out.push(Action::Connect(url));
    }

    fn opened(&mut self, out: &mut Vec<Action>) {
        info!(attempts = self.attempts, "connection established");
        self.attempts = 0;
        self.ready = false;
        self.last_error = None;
        self.state = ConnectionState::Handshaking;
        out.push(Action::RunConnectHook);
    }

    fn peer_ready(&mut self, ready_idx: u64, out: &mut Vec<Action>) {
        info!(ready_idx, "peer ready");
        if let Some(processed) = ready_idx.checked_sub(1) {
            self.queue.acknowledge(processed);
        }
        self.queue.revert(ready_idx);
        metrics::set_unacked(self.queue.num_unacked_messages());
        self.ready = true;
        self.state = ConnectionState::Ready;
        out.push(Action::Notify(Notification::Ready { ready_idx }));
        self.flush(out);
    }

    fn flush(&mut self, out: &mut Vec<Action>) {
        if !(self.state.is_open() && self.ready) {
            return;
        }
        while let Ok((idx, bytes)) = self.queue.consume() {
            debug!(idx, bytes = bytes.len(), "sending queued message");
            out.push(Action::SendRaw { idx, bytes });
        }
        debug!(
            unacked = self.queue.num_unacked_messages(),
            "flush complete"
        );
        if self.queue.num_unacked_messages() == 0 && !self.needed {
            self.close_transport(out);
        }
    }

    fn close_transport(&mut self, out: &mut Vec<Action>) {
        if self.state.has_transport() && self.state != ConnectionState::Closing {
            info!("closing transport");
            self.state = ConnectionState::Closing;
            out.push(Action::CloseTransport);
        }
    }

    fn transport_error(&mut self, error: &str, out: &mut Vec<Action>) {
        if self.reconnect_available() {
            warn!(%error, "transport error");
            out.push(Action::Notify(Notification::ErroneousDisconnect(
                DisconnectReason::Transport(error.to_owned()),
            )));
        } else {
            error!(%error, "transport error");
            metrics::inc_errors();
            let err = ConnectionError::Transport(error.to_owned());
            self.last_error = Some(err.clone());
            out.push(Action::Notify(Notification::Error(err)));
        }
    }

    fn closed(&mut self, out: &mut Vec<Action>) {
        self.ready = false;
        let unacked = self.queue.num_unacked_messages();
        if self.reconnect_available() && self.needed {
            self.schedule_reconnect(DisconnectReason::ClosedPrematurely, out);
        } else if self.reconnect_available() && unacked > 0 {
            self.schedule_reconnect(DisconnectReason::PendingMessages, out);
        } else if unacked > 0 {
            warn!(unacked, "closed with messages still in queue");
            self.finish(
                Err(ConnectionError::PendingOnClose {
                    unacknowledged: unacked,
                }),
                out,
            );
        } else {
            info!("closed correctly");
            let outcome = self.last_error.take().map_or(Ok(()), Err);
            self.finish(outcome, out);
        }
    }

    fn schedule_reconnect(&mut self, reason: DisconnectReason, out: &mut Vec<Action>) {
        let interval = self.options.reconnect_interval;
        info!(%reason, ?interval, "scheduling reconnect");
        self.state = ConnectionState::Reconnecting;
        out.push(Action::ScheduleReconnect(interval));
        out.push(Action::Notify(Notification::ErroneousDisconnect(reason)));
    }

    fn finish(&mut self, outcome: Result<(), ConnectionError>, out: &mut Vec<Action>) {
        self.state = ConnectionState::Closed;
        self.ready = false;
        match &outcome {
            Ok(()) => out.push(Action::Notify(Notification::Closed)),
            Err(error @ ConnectionError::Transport(_)) => {
                // already reported when the transport failed
                debug!(%error, "closed after transport error");
                out.push(Action::Notify(Notification::Closed));
            }
            Err(error) => {
                metrics::inc_errors();
                out.push(Action::Notify(Notification::Error(error.clone())));
            }
        }
        out.push(Action::Shutdown(outcome));
    }
}
