//! Builder configuring callbacks and options before a connection starts.

use std::{future::Future, sync::Arc};

use bytes::Bytes;
use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tracing::{Instrument, info_span};
use url::Url;

use super::{Qws, QwsHandle, actor::ConnectionActor};
use crate::{
    config::QwsOptions,
    engine::ProtocolEngine,
    error::{ConnectionError, DisconnectReason, Result},
    hooks::{HandlerError, HandlerResult, Handlers, Inbound},
    queue::QueueStats,
    transport::{BoxTransport, Connector, Transport},
};

/// Builder for [`Qws`] connections.
///
/// Callback registration mirrors the connection lifecycle: `on_connect`
/// runs whenever a transport opens, `on_ready` once the peer completes the
/// handshake, payload handlers for each inbound message, and the
/// disconnect, error and close callbacks as the connection degrades or ends.
///
/// # Examples
///
/// ```no_run
/// use qws::{Qws, transport::memory};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), qws::QwsError> {
/// let (client, _server) = memory::pair();
/// let qws = Qws::builder()
///     .on_connect(|| async { Ok(0) })
///     .on_bin_route("files/**", |inbound| async move {
///         println!("{} bytes for {:?}", inbound.body.len(), inbound.params.positional(0));
///         Ok(())
///     })?
///     .adopt(client);
/// # drop(qws);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct QwsBuilder {
    options: QwsOptions,
    handlers: Handlers,
}

impl QwsBuilder {
    /// Create a builder with default options and no callbacks.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Replace the connection options.
    #[must_use]
    pub fn options(mut self, options: QwsOptions) -> Self {
        self.options = options;
        self
    }

    /// Register the hook run each time a transport opens.
    ///
    /// Its result is the index this side is ready to receive from, sent to
    /// the peer in the `ready` frame. An error is sent as an `err` frame
    /// instead and the handshake does not complete.
    #[must_use]
    pub fn on_connect<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<u64, HandlerError>> + Send + 'static,
    {
        self.handlers.on_connect = Some(Arc::new(move || Box::pin(f())));
        self
    }

    /// Register a callback invoked when the peer completes the handshake.
    #[must_use]
    pub fn on_ready<F>(mut self, f: F) -> Self
    where
        F: Fn(u64) + Send + Sync + 'static,
    {
        self.handlers.on_ready = Some(Arc::new(f));
        self
    }

    /// Handle binary payloads that match no registered route.
    #[must_use]
    pub fn on_bin<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Inbound<Bytes>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.handlers
            .on_bin
            .fallback(Arc::new(move |inbound| Box::pin(f(inbound))));
        self
    }

    /// Handle binary payloads whose route matches `pattern`.
    ///
    /// # Errors
    ///
    /// Returns [`QwsError::Router`](crate::QwsError::Router) if the pattern is
    /// malformed or already registered.
    pub fn on_bin_route<F, Fut>(mut self, pattern: &str, f: F) -> Result<Self>
    where
        F: Fn(Inbound<Bytes>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.handlers
            .on_bin
            .route(pattern, Arc::new(move |inbound| Box::pin(f(inbound))))?;
        Ok(self)
    }

    /// Handle JSON payloads that match no registered route.
    #[must_use]
    pub fn on_json<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Inbound<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.handlers
            .on_json
            .fallback(Arc::new(move |inbound| Box::pin(f(inbound))));
        self
    }

    /// Handle JSON payloads whose route matches `pattern`.
    ///
    /// # Errors
    ///
    /// Returns [`QwsError::Router`](crate::QwsError::Router) if the pattern is
    /// malformed or already registered.
    pub fn on_json_route<F, Fut>(mut self, pattern: &str, f: F) -> Result<Self>
    where
        F: Fn(Inbound<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.handlers
            .on_json
            .route(pattern, Arc::new(move |inbound| Box::pin(f(inbound))))?;
        Ok(self)
    }

    /// Register a callback for disconnects that trigger a reconnect, and for
    /// transport errors while reconnection is available.
    #[must_use]
    pub fn on_erroneous_disconnect<F>(mut self, f: F) -> Self
    where
        F: Fn(&DisconnectReason) + Send + Sync + 'static,
    {
        self.handlers.on_erroneous_disconnect = Some(Arc::new(f));
        self
    }

    /// Register a callback for peer errors and terminal failures.
    #[must_use]
    pub fn on_error<F>(mut self, f: F) -> Self
    where
        F: Fn(&ConnectionError) + Send + Sync + 'static,
    {
        self.handlers.on_error = Some(Arc::new(f));
        self
    }

    /// Register a callback for a clean close.
    #[must_use]
    pub fn on_close<F>(mut self, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.handlers.on_close = Some(Arc::new(f));
        self
    }

    /// Dial `url` over WebSocket and start the connection task.
    ///
    /// # Errors
    ///
    /// Returns [`QwsError::InvalidUrl`](crate::QwsError::InvalidUrl) if `url`
    /// does not parse. Connection failures are reported asynchronously.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    #[cfg(feature = "websocket")]
    pub fn connect(self, url: &str) -> Result<Qws> {
        self.connect_with(crate::transport::websocket::WsConnector, url)
    }

    /// Dial `url` using `connector` and start the connection task.
    ///
    /// # Errors
    ///
    /// Returns [`QwsError::InvalidUrl`](crate::QwsError::InvalidUrl) if `url`
    /// does not parse. Connection failures are reported asynchronously.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn connect_with<C: Connector>(self, connector: C, url: &str) -> Result<Qws> {
        let url = Url::parse(url)?;
        let engine = ProtocolEngine::connecting(url, self.options);
        Ok(spawn(engine, self.handlers, Some(Arc::new(connector)), None))
    }

    /// Run the protocol over an already open transport, such as one accepted
    /// by a server. The connection never reconnects.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    #[must_use]
    pub fn adopt<T: Transport>(self, transport: T) -> Qws {
        let engine = ProtocolEngine::adopted(self.options);
        spawn(engine, self.handlers, None, Some(Box::new(transport)))
    }
}

fn spawn(
    engine: ProtocolEngine,
    handlers: Handlers,
    connector: Option<Arc<dyn Connector>>,
    transport: Option<BoxTransport>,
) -> Qws {
    let (commands_tx, commands_rx) = mpsc::unbounded_channel();
    let (stats_tx, stats_rx) = watch::channel(QueueStats::default());
    let span = info_span!("qws", name = %engine.options().name);
    let actor = ConnectionActor::new(engine, handlers, connector, transport, commands_rx, stats_tx);
    Qws {
        handle: QwsHandle::new(commands_tx, stats_rx),
        task: tokio::spawn(actor.run().instrument(span)),
    }
}
