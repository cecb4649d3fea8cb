//! Canonical error types for the crate.
//!
//! [`QwsError`] is returned synchronously from API calls. [`ConnectionError`]
//! describes failures surfaced asynchronously through the error callback and
//! [`Qws::join`](crate::connection::Qws::join). [`DisconnectReason`] explains
//! why an erroneous-disconnect notification fired.

use std::fmt;

use thiserror::Error;

use crate::router::RouterError;

/// Errors returned directly by the public API.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum QwsError {
    /// The connection task has already stopped.
    #[error("connection task has stopped")]
    Closed,
    /// A JSON body could not be serialised.
    #[error("failed to serialise JSON body: {0}")]
    Json(#[from] serde_json::Error),
    /// A route pattern was rejected.
    #[error(transparent)]
    Router(#[from] RouterError),
    /// The connection URL could not be parsed.
    #[error("invalid connection URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// Result type used throughout the builder and handle APIs.
pub type Result<T> = std::result::Result<T, QwsError>;

/// Failures reported to the application's error callback.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConnectionError {
    /// The peer sent an `err` frame.
    #[error("{0}")]
    Peer(String),
    /// The transport reported an error and reconnection is unavailable.
    #[error("transport error: {0}")]
    Transport(String),
    /// Every permitted connection attempt failed.
    #[error("WS connection timeout, max tries ({max_tries}) exceeded")]
    ReconnectExhausted {
        /// Configured number of retries.
        max_tries: u32,
    },
    /// The transport closed while messages were still unacknowledged.
    #[error("Closed with messages still in queue")]
    PendingOnClose {
        /// Number of unacknowledged messages at close time.
        unacknowledged: u64,
    },
    /// The connection task ended without reporting an outcome.
    #[error("connection task ended unexpectedly")]
    Aborted,
}

/// Why the connection dropped while it was still wanted.
#[derive(Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum DisconnectReason {
    /// The transport closed before the application requested a close.
    ClosedPrematurely,
    /// The application requested a close but messages remain unacknowledged.
    PendingMessages,
    /// The transport reported an error.
    Transport(String),
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ClosedPrematurely => f.write_str("Closed pre-maturely"),
            Self::PendingMessages => f.write_str("Closed with messages still in queue"),
            Self::Transport(message) => f.write_str(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(ConnectionError::ReconnectExhausted { max_tries: 12 }, "WS connection timeout, max tries (12) exceeded")]
    #[case(ConnectionError::PendingOnClose { unacknowledged: 3 }, "Closed with messages still in queue")]
    #[case(ConnectionError::Peer("boom".into()), "boom")]
    fn connection_errors_render_their_message(#[case] error: ConnectionError, #[case] text: &str) {
        assert_eq!(error.to_string(), text);
    }

    #[rstest]
    #[case(DisconnectReason::ClosedPrematurely, "Closed pre-maturely")]
    #[case(DisconnectReason::PendingMessages, "Closed with messages still in queue")]
    #[case(DisconnectReason::Transport("reset".into()), "reset")]
    fn disconnect_reasons_render_their_message(#[case] reason: DisconnectReason, #[case] text: &str) {
        assert_eq!(reason.to_string(), text);
    }
}
