//! Tracing configuration for socket manager operations.
//!
//! [`TracingConfig`] controls the level of the spans wrapped around each
//! manager operation and whether an elapsed-time event is emitted when the
//! operation completes.

use tracing::Level;

/// Controls tracing span levels and per-operation timing.
///
/// By default the lifecycle operations (`start`, `stop`) emit spans at `INFO`
/// level and `send` emits spans at `DEBUG` level. Timing is disabled for
/// every operation by default.
///
/// When no `tracing` subscriber is installed, span creation is a no-op. When
/// timing is enabled for an operation, an event recording `elapsed_us` is
/// emitted at `DEBUG` level as the operation completes.
///
/// # Examples
///
/// ```
/// use nym_socket::TracingConfig;
/// use tracing::Level;
///
/// let config = TracingConfig::default()
///     .with_start_timing(true)
///     .with_send_level(Level::TRACE);
/// let _ = config;
/// ```
#[derive(Clone, Debug)]
pub struct TracingConfig {
    pub(crate) start_level: Level,
    pub(crate) stop_level: Level,
    pub(crate) send_level: Level,
    pub(crate) start_timing: bool,
    pub(crate) stop_timing: bool,
    pub(crate) send_timing: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            start_level: Level::INFO,
            stop_level: Level::INFO,
            send_level: Level::DEBUG,
            start_timing: false,
            stop_timing: false,
            send_timing: false,
        }
    }
}

impl TracingConfig {
    /// Set the tracing level for the `start` operation.
    #[must_use]
    pub fn with_start_level(mut self, level: Level) -> Self {
        self.start_level = level;
        self
    }

    /// Enable or disable timing for the `start` operation.
    ///
    /// The recorded time includes the identity handshake.
    #[must_use]
    pub fn with_start_timing(mut self, enabled: bool) -> Self {
        self.start_timing = enabled;
        self
    }

    /// Set the tracing level for the `stop` operation.
    #[must_use]
    pub fn with_stop_level(mut self, level: Level) -> Self {
        self.stop_level = level;
        self
    }

    /// Enable or disable timing for the `stop` operation.
    #[must_use]
    pub fn with_stop_timing(mut self, enabled: bool) -> Self {
        self.stop_timing = enabled;
        self
    }

    /// Set the tracing level for `send` operations, including replies sent by
    /// message handlers.
    #[must_use]
    pub fn with_send_level(mut self, level: Level) -> Self {
        self.send_level = level;
        self
    }

    /// Enable or disable timing for `send` operations.
    #[must_use]
    pub fn with_send_timing(mut self, enabled: bool) -> Self {
        self.send_timing = enabled;
        self
    }

    /// Set the tracing level for all operations at once.
    #[must_use]
    pub fn with_all_levels(mut self, level: Level) -> Self {
        self.start_level = level;
        self.stop_level = level;
        self.send_level = level;
        self
    }

    /// Enable or disable timing for all operations at once.
    #[must_use]
    pub fn with_all_timing(mut self, enabled: bool) -> Self {
        self.start_timing = enabled;
        self.stop_timing = enabled;
        self.send_timing = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use tracing::Level;

    use super::TracingConfig;

    #[test]
    fn lifecycle_spans_default_to_info() {
        let config = TracingConfig::default();
        assert_eq!(config.start_level, Level::INFO);
        assert_eq!(config.stop_level, Level::INFO);
        assert_eq!(config.send_level, Level::DEBUG);
        assert!(!config.start_timing && !config.stop_timing && !config.send_timing);
    }

    #[test]
    fn bulk_setters_touch_every_operation() {
        let config = TracingConfig::default()
            .with_all_levels(Level::TRACE)
            .with_all_timing(true);
        assert_eq!(config.start_level, Level::TRACE);
        assert_eq!(config.stop_level, Level::TRACE);
        assert_eq!(config.send_level, Level::TRACE);
        assert!(config.start_timing && config.stop_timing && config.send_timing);
    }
}
