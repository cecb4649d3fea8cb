//! Application callbacks and the tables that hold them.
//!
//! Payload handlers and the connect hook are asynchronous and awaited inline
//! by the connection task, so inbound processing stays in wire order.
//! Lifecycle callbacks are plain closures.

use std::{fmt, future::Future, pin::Pin, sync::Arc};

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::{
    engine::Notification,
    error::{ConnectionError, DisconnectReason},
    message::{Payload, PayloadHeaders},
    panic,
    router::{RouteParams, Router},
};

/// A boxed future that is `Send` with a specified lifetime.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Error type returned by application handlers.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Result returned by payload handlers.
pub type HandlerResult = Result<(), HandlerError>;

/// A payload delivered to a handler.
#[derive(Clone, Debug)]
pub struct Inbound<B> {
    /// Message body.
    pub body: B,
    /// Payload headers, including `idx` and application fields.
    pub headers: PayloadHeaders,
    /// Parameters captured by the matching route pattern.
    pub params: RouteParams,
}

impl Inbound<Value> {
    /// Deserialise the JSON body into `T`.
    ///
    /// # Errors
    ///
    /// Returns an error if the body does not match `T`.
    pub fn parse<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(&self.body)
    }
}

/// Hook invoked each time a transport opens. Returns the index this side is
/// ready to receive from; an error rejects the handshake with an `err` frame.
pub type ConnectHandler = Arc<dyn Fn() -> BoxFuture<'static, Result<u64, HandlerError>> + Send + Sync>;

/// Handler for binary payloads.
pub type BinHandler = Arc<dyn Fn(Inbound<Bytes>) -> BoxFuture<'static, HandlerResult> + Send + Sync>;

/// Handler for JSON payloads.
pub type JsonHandler = Arc<dyn Fn(Inbound<Value>) -> BoxFuture<'static, HandlerResult> + Send + Sync>;

/// Callback invoked once the peer is ready.
pub type ReadyHandler = Arc<dyn Fn(u64) + Send + Sync>;

/// Callback invoked on an erroneous disconnect.
pub type DisconnectHandler = Arc<dyn Fn(&DisconnectReason) + Send + Sync>;

/// Callback invoked for errors the application must know about.
pub type ErrorHandler = Arc<dyn Fn(&ConnectionError) + Send + Sync>;

/// Callback invoked after a clean close.
pub type CloseHandler = Arc<dyn Fn() + Send + Sync>;

/// Every callback registered for one connection.
#[derive(Default)]
#[expect(
    clippy::struct_field_names,
    reason = "on_ prefix is idiomatic for callback fields"
)]
pub(crate) struct Handlers {
    pub(crate) on_connect: Option<ConnectHandler>,
    pub(crate) on_ready: Option<ReadyHandler>,
    pub(crate) on_bin: Router<BinHandler>,
    pub(crate) on_json: Router<JsonHandler>,
    pub(crate) on_erroneous_disconnect: Option<DisconnectHandler>,
    pub(crate) on_error: Option<ErrorHandler>,
    pub(crate) on_close: Option<CloseHandler>,
}

impl fmt::Debug for Handlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handlers")
            .field("on_connect", &self.on_connect.is_some())
            .field("bin_routes", &self.on_bin.len())
            .field("json_routes", &self.on_json.len())
            .finish_non_exhaustive()
    }
}

impl Handlers {
    /// Run the connect hook, defaulting to index zero.
    pub(crate) async fn run_connect(&self) -> Result<u64, String> {
        let Some(hook) = &self.on_connect else {
            return Ok(0);
        };
        match panic::contain_call(hook.as_ref()).await {
            Ok(Ok(idx)) => Ok(idx),
            Ok(Err(error)) => Err(error.to_string()),
            Err(panicked) => Err(panicked),
        }
    }

    /// Route `payload` to its handler.
    ///
    /// Returns the payload's sequence number with the outcome. A payload that
    /// matches no route succeeds without running anything.
    pub(crate) async fn dispatch(&self, payload: Payload) -> (Option<u64>, Result<(), String>) {
        let idx = payload.idx();
        let outcome = match payload {
            Payload::Bin(message) => {
                let key = message.headers.route_key().to_owned();
                match self.on_bin.at(&key) {
                    Some(hit) => {
                        let inbound = Inbound {
                            body: message.body,
                            headers: message.headers,
                            params: hit.params,
                        };
                        Some(panic::contain_call(|| (hit.handler)(inbound)).await)
                    }
                    None => None,
                }
            }
            Payload::Json(message) => {
                let key = message.headers.route_key().to_owned();
                match self.on_json.at(&key) {
                    Some(hit) => {
                        let inbound = Inbound {
                            body: message.body,
                            headers: message.headers,
                            params: hit.params,
                        };
                        Some(panic::contain_call(|| (hit.handler)(inbound)).await)
                    }
                    None => None,
                }
            }
        };

        let result = match outcome {
            Some(Ok(Ok(()))) => Ok(()),
            Some(Ok(Err(error))) => Err(error.to_string()),
            Some(Err(panicked)) => Err(panicked),
            None => {
                debug!(?idx, "no handler matched, passing payload through");
                Ok(())
            }
        };
        (idx, result)
    }

    /// Invoke the callback matching `notification`.
    pub(crate) fn notify(&self, notification: &Notification) {
        match notification {
            Notification::Ready { ready_idx } => {
                if let Some(callback) = &self.on_ready {
                    callback(*ready_idx);
                }
            }
            Notification::ErroneousDisconnect(reason) => {
                if let Some(callback) = &self.on_erroneous_disconnect {
                    callback(reason);
                }
            }
            Notification::Error(error) => {
                if let Some(callback) = &self.on_error {
                    callback(error);
                }
            }
            Notification::Closed => {
                if let Some(callback) = &self.on_close {
                    callback();
                }
            }
        }
    }
}
