//! Metric helpers for `qws`.
//!
//! This module defines metric names and simple helper functions wrapping the
//! [`metrics`](https://docs.rs/metrics) crate. With the `metrics` feature
//! disabled every helper compiles to a no-op.

/// Name of the counter tracking frames written or read.
pub const FRAMES_TOTAL: &str = "qws_frames_total";
/// Name of the counter tracking connection attempts after the first.
pub const RECONNECT_ATTEMPTS: &str = "qws_reconnect_attempts_total";
/// Name of the counter tracking frames degraded to opaque binary.
pub const DECODE_FALLBACKS: &str = "qws_decode_fallbacks_total";
/// Name of the counter tracking errors surfaced to applications.
pub const ERRORS_TOTAL: &str = "qws_errors_total";
/// Name of the gauge tracking messages awaiting acknowledgment.
pub const UNACKED_MESSAGES: &str = "qws_unacked_messages";

/// Direction of frame processing.
#[derive(Clone, Copy, Debug)]
pub enum Direction {
    /// Frames received from the peer.
    Inbound,
    /// Frames written to the peer.
    Outbound,
}

impl Direction {
    #[cfg_attr(not(feature = "metrics"), expect(dead_code, reason = "labels only feed metrics"))]
    fn as_str(self) -> &'static str {
        match self {
            Direction::Inbound => "inbound",
            Direction::Outbound => "outbound",
        }
    }
}

/// Record a frame for the given direction.
#[cfg(feature = "metrics")]
pub fn inc_frames(direction: Direction) {
    metrics::counter!(FRAMES_TOTAL, "direction" => direction.as_str()).increment(1);
}

/// Record a reconnection attempt.
#[cfg(feature = "metrics")]
pub fn inc_reconnect_attempts() { metrics::counter!(RECONNECT_ATTEMPTS).increment(1); }

/// Record a decode fallback.
#[cfg(feature = "metrics")]
pub fn inc_decode_fallbacks() { metrics::counter!(DECODE_FALLBACKS).increment(1); }

/// Record an error surfaced to the application.
#[cfg(feature = "metrics")]
pub fn inc_errors() { metrics::counter!(ERRORS_TOTAL).increment(1); }

/// Publish the current number of unacknowledged messages.
#[cfg(feature = "metrics")]
#[expect(
    clippy::cast_precision_loss,
    reason = "gauge values are approximate by nature"
)]
pub fn set_unacked(count: u64) { metrics::gauge!(UNACKED_MESSAGES).set(count as f64); }

#[cfg(not(feature = "metrics"))]
pub fn inc_frames(_direction: Direction) {}

#[cfg(not(feature = "metrics"))]
pub fn inc_reconnect_attempts() {}

#[cfg(not(feature = "metrics"))]
pub fn inc_decode_fallbacks() {}

#[cfg(not(feature = "metrics"))]
pub fn inc_errors() {}

#[cfg(not(feature = "metrics"))]
pub fn set_unacked(_count: u64) {}
