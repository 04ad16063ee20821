//! Span and timing helpers for socket manager operations.

use std::time::Instant;

use tracing::{Level, Span};

use crate::tracing_config::TracingConfig;

/// Create a span at a level chosen at runtime.
///
/// Each arm calls the matching `tracing::<level>_span!` macro so the span
/// metadata stays static per arm.
macro_rules! dynamic_span {
    ($level:expr, $name:expr $(, $($field:tt)*)?) => {
        match $level {
            Level::ERROR => tracing::error_span!($name $(, $($field)*)?),
            Level::WARN  => tracing::warn_span!($name $(, $($field)*)?),
            Level::INFO  => tracing::info_span!($name $(, $($field)*)?),
            Level::DEBUG => tracing::debug_span!($name $(, $($field)*)?),
            Level::TRACE => tracing::trace_span!($name $(, $($field)*)?),
        }
    };
}

#[expect(
    clippy::cognitive_complexity,
    reason = "complexity from dynamic_span! macro expansion"
)]
pub(crate) fn start_span(config: &TracingConfig, parent: &Span, peer_addr: &str) -> Span {
    parent.in_scope(|| dynamic_span!(config.start_level, "socket.start", peer.addr = peer_addr))
}

#[expect(
    clippy::cognitive_complexity,
    reason = "complexity from dynamic_span! macro expansion"
)]
pub(crate) fn stop_span(config: &TracingConfig, parent: &Span) -> Span {
    parent.in_scope(|| dynamic_span!(config.stop_level, "socket.stop"))
}

#[expect(
    clippy::cognitive_complexity,
    reason = "complexity from dynamic_span! macro expansion"
)]
pub(crate) fn send_span(config: &TracingConfig, parent: &Span, kind: &'static str) -> Span {
    parent.in_scope(|| {
        dynamic_span!(
            config.send_level,
            "socket.send",
            message.kind = kind,
            frame.bytes = tracing::field::Empty
        )
    })
}

/// Start a timer when timing is enabled for an operation.
pub(crate) fn start_timer(enabled: bool) -> Option<Instant> { enabled.then(Instant::now) }

/// Emit an `elapsed_us` event if the operation was timed.
pub(crate) fn emit_timing_event(start: Option<Instant>) {
    if let Some(start) = start {
        let elapsed_us = start.elapsed().as_micros();
        tracing::debug!(elapsed_us = elapsed_us, "operation.timing");
    }
}
