//! Metric helpers for `nym-socket`.
//!
//! This module defines metric names and simple helper functions wrapping the
//! [`metrics`](https://docs.rs/metrics) crate. With the `metrics` feature
//! disabled every helper compiles to a no-op.

#[cfg(feature = "metrics")]
use metrics::{counter, gauge};

/// Name of the gauge tracking open sessions.
pub const SESSIONS_ACTIVE: &str = "nym_socket_sessions_active";
/// Name of the counter tracking frames written or read.
pub const FRAMES_PROCESSED: &str = "nym_socket_frames_processed_total";
/// Name of the counter tracking inbound frames dropped by the dispatcher.
pub const FRAMES_DROPPED: &str = "nym_socket_frames_dropped_total";
/// Name of the counter tracking panics raised by message handlers.
pub const HANDLER_PANICS: &str = "nym_socket_handler_panics_total";

/// Direction of frame processing.
#[derive(Clone, Copy, Debug)]
pub enum Direction {
    /// Frames received from the Nym client.
    Inbound,
    /// Frames sent to the Nym client.
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

/// Increment the open sessions gauge.
pub fn inc_sessions() {
    #[cfg(feature = "metrics")]
    gauge!(SESSIONS_ACTIVE).increment(1.0);
}

/// Decrement the open sessions gauge.
pub fn dec_sessions() {
    #[cfg(feature = "metrics")]
    gauge!(SESSIONS_ACTIVE).decrement(1.0);
}

/// Record a processed frame for the given direction.
pub fn inc_frames(direction: Direction) {
    #[cfg(feature = "metrics")]
    counter!(FRAMES_PROCESSED, "direction" => direction.as_str()).increment(1);
    #[cfg(not(feature = "metrics"))]
    let _ = direction;
}

/// Record an inbound frame the dispatcher could not use.
pub fn inc_dropped_frames() {
    #[cfg(feature = "metrics")]
    counter!(FRAMES_DROPPED).increment(1);
}

/// Record a panic raised by a message handler.
pub fn inc_handler_panics() {
    #[cfg(feature = "metrics")]
    counter!(HANDLER_PANICS).increment(1);
}
