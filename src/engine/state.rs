//! Connection lifecycle states.

use std::fmt;

/// Lifecycle state of a [`ProtocolEngine`](super::ProtocolEngine).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ConnectionState {
    /// Created but not started.
    #[default]
    Idle,
    /// Waiting for the transport to open.
    Connecting,
    /// Transport open, `ready` not yet received from the peer.
    Handshaking,
    /// Handshake complete; payloads flow.
    Ready,
    /// Transport close requested, waiting for it to finish.
    Closing,
    /// Transport lost; a reconnect attempt is scheduled.
    Reconnecting,
    /// Terminal.
    Closed,
}

impl ConnectionState {
    /// Whether the transport is open and writable.
    #[must_use]
    pub const fn is_open(self) -> bool { matches!(self, Self::Handshaking | Self::Ready) }

    /// Whether a transport exists that still needs to be closed.
    #[must_use]
    pub const fn has_transport(self) -> bool {
        matches!(self, Self::Handshaking | Self::Ready | Self::Closing)
    }

    /// Whether the engine has stopped.
    #[must_use]
    pub const fn is_terminal(self) -> bool { matches!(self, Self::Closed) }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Handshaking => "handshaking",
            Self::Ready => "ready",
            Self::Closing => "closing",
            Self::Reconnecting => "reconnecting",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}
