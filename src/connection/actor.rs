//! The connection task.
//!
//! The actor waits on three sources with a biased `tokio::select!`:
//! application commands, transport events and the reconnect deadline. Each
//! event is turned into engine input, and the resulting actions are executed
//! before the next event is awaited.

use std::{collections::VecDeque, future::pending, sync::Arc};

use bytes::Bytes;
use tokio::{
    sync::{mpsc, watch},
    time::{Instant, sleep_until},
};
use tracing::{debug, error, warn};

use super::Command;
use crate::{
    codec,
    engine::{Action, ProtocolEngine},
    error::ConnectionError,
    hooks::Handlers,
    metrics::{self, Direction},
    queue::QueueStats,
    transport::{BoxTransport, Connector, TransportEvent},
};

enum Event {
    Command(Option<Command>),
    Transport(TransportEvent),
    ReconnectDue,
    Idle,
}

pub(crate) struct ConnectionActor {
    engine: ProtocolEngine,
    handlers: Handlers,
    connector: Option<Arc<dyn Connector>>,
    transport: Option<BoxTransport>,
    commands: mpsc::UnboundedReceiver<Command>,
    commands_open: bool,
    reconnect_at: Option<Instant>,
    stats: watch::Sender<QueueStats>,
    outcome: Option<Result<(), ConnectionError>>,
}

impl ConnectionActor {
    pub(crate) fn new(
        engine: ProtocolEngine,
        handlers: Handlers,
        connector: Option<Arc<dyn Connector>>,
        transport: Option<BoxTransport>,
        commands: mpsc::UnboundedReceiver<Command>,
        stats: watch::Sender<QueueStats>,
    ) -> Self {
        Self {
            engine,
            handlers,
            connector,
            transport,
            commands,
            commands_open: true,
            reconnect_at: None,
            stats,
            outcome: None,
        }
    }

    /// Drive the connection until the engine shuts down.
    pub(crate) async fn run(mut self) -> Result<(), ConnectionError> {
        let actions = self.engine.start();
        self.execute(actions).await;

        while self.outcome.is_none() {
            let actions = match self.next_event().await {
                Event::Command(command) => self.on_command(command),
                Event::Transport(event) => self.on_transport_event(event).await,
                Event::ReconnectDue => {
                    self.reconnect_at = None;
                    self.engine.on_reconnect_timer()
                }
                Event::Idle => {
                    error!(state = %self.engine.state(), "no event source left");
                    self.outcome = Some(Err(ConnectionError::Aborted));
                    Vec::new()
                }
            };
            self.execute(actions).await;
        }

        if let Some(mut transport) = self.transport.take() {
            if let Err(error) = transport.close().await {
                debug!(%error, "closing transport after shutdown failed");
            }
        }
        self.outcome.unwrap_or(Err(ConnectionError::Aborted))
    }

    #[expect(
        clippy::integer_division_remainder_used,
        reason = "tokio::select! expands to modulus operations internally"
    )]
    async fn next_event(&mut self) -> Event {
        tokio::select! {
            biased;

            command = self.commands.recv(), if self.commands_open => Event::Command(command),
            event = Self::poll_transport(self.transport.as_mut()), if self.transport.is_some() => {
                Event::Transport(event)
            }
            () = Self::wait_until(self.reconnect_at), if self.reconnect_at.is_some() => {
                Event::ReconnectDue
            }
            else => Event::Idle,
        }
    }

    async fn poll_transport(transport: Option<&mut BoxTransport>) -> TransportEvent {
        match transport {
            Some(transport) => transport.next_event().await,
            None => pending().await,
        }
    }

    async fn wait_until(deadline: Option<Instant>) {
        match deadline {
            Some(deadline) => sleep_until(deadline).await,
            None => pending().await,
        }
    }

    fn on_command(&mut self, command: Option<Command>) -> Vec<Action> {
        match command {
            Some(Command::Send { idx, payload }) => {
                let (assigned, actions) = self.engine.send(payload);
                if assigned != idx {
                    warn!(expected = idx, assigned, "sequence number mismatch");
                }
                actions
            }
            Some(Command::Close) => self.engine.close(),
            None => {
                debug!("all handles dropped, closing");
                self.commands_open = false;
                self.engine.close()
            }
        }
    }

    async fn on_transport_event(&mut self, event: TransportEvent) -> Vec<Action> {
        match event {
            TransportEvent::Data(frame) => {
                metrics::inc_frames(Direction::Inbound);
                self.engine.on_frame(codec::decode(frame))
            }
            TransportEvent::Error(error) => {
                let mut actions = self.engine.on_transport_error(&error.to_string());
                if let Some(mut transport) = self.transport.take() {
                    if let Err(error) = transport.close().await {
                        debug!(%error, "closing failed transport");
                    }
                }
                actions.extend(self.engine.on_transport_closed());
                actions
            }
            TransportEvent::Closed => {
                self.transport = None;
                self.engine.on_transport_closed()
            }
        }
    }

    /// Execute `actions` in order. Follow-up actions produced while executing
    /// one action run before the remaining ones.
    async fn execute(&mut self, actions: Vec<Action>) {
        let mut queue: VecDeque<Action> = actions.into();
        while let Some(action) = queue.pop_front() {
            let follow_up = self.perform(action).await;
            for action in follow_up.into_iter().rev() {
                queue.push_front(action);
            }
        }
        self.stats.send_replace(self.engine.stats());
    }

    async fn perform(&mut self, action: Action) -> Vec<Action> {
        match action {
            Action::Connect(url) => {
                let Some(connector) = self.connector.clone() else {
                    return self.engine.on_connect_failed("no connector configured");
                };
                match connector.connect(&url).await {
                    Ok(transport) => {
                        self.transport = Some(transport);
                        self.engine.on_opened()
                    }
                    Err(error) => {
                        warn!(%error, %url, "connection attempt failed");
                        self.engine.on_connect_failed(&error.to_string())
                    }
                }
            }
            Action::RunConnectHook => {
                let result = self.handlers.run_connect().await;
                self.engine.connect_hook_finished(result)
            }
            Action::Send(message) => self.write(codec::encode(&message)).await,
            Action::SendRaw { bytes, .. } => self.write(bytes).await,
            Action::Dispatch(payload) => {
                let (idx, result) = self.handlers.dispatch(payload).await;
                self.engine.dispatch_finished(idx, result)
            }
            Action::CloseTransport => {
                if let Some(mut transport) = self.transport.take() {
                    if let Err(error) = transport.close().await {
                        debug!(%error, "transport close reported an error");
                    }
                }
                self.engine.on_transport_closed()
            }
            Action::ScheduleReconnect(delay) => {
                self.reconnect_at = Some(Instant::now() + delay);
                Vec::new()
            }
            Action::Notify(notification) => {
                self.handlers.notify(&notification);
                Vec::new()
            }
            Action::Shutdown(outcome) => {
                self.outcome = Some(outcome);
                Vec::new()
            }
        }
    }

    async fn write(&mut self, frame: Bytes) -> Vec<Action> {
        let Some(transport) = self.transport.as_mut() else {
            debug!("no transport, dropping frame");
            return Vec::new();
        };
        match transport.send(frame).await {
            Ok(()) => {
                metrics::inc_frames(Direction::Outbound);
                Vec::new()
            }
            Err(error) => {
                warn!(%error, "write failed");
                self.engine.on_send_failed(&error.to_string())
            }
        }
    }
}
