//! Connection settings for a socket manager.

use std::time::Duration;

use crate::error::ValidationError;

/// How long `start` waits for the identity reply by default.
pub const DEFAULT_IDENTITY_TIMEOUT: Duration = Duration::from_secs(5);

/// How long `stop` waits for the peer to acknowledge a close by default.
pub const DEFAULT_CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Websocket endpoint a local Nym client listens on out of the box.
pub const DEFAULT_CLIENT_URI: &str = "ws://127.0.0.1:1977";

/// Target address and timeouts for a [`SocketManager`](crate::SocketManager).
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use nym_socket::config::SocketConfig;
///
/// let config = SocketConfig::new("ws://127.0.0.1:1977").identity_timeout(Duration::from_secs(2));
/// assert_eq!(config.identity_timeout_value(), Duration::from_secs(2));
/// assert!(config.validate().is_ok());
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SocketConfig {
    address: String,
    identity_timeout: Duration,
    close_timeout: Duration,
}

impl SocketConfig {
    /// Settings for `address` with default timeouts.
    #[must_use]
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            identity_timeout: DEFAULT_IDENTITY_TIMEOUT,
            close_timeout: DEFAULT_CLOSE_TIMEOUT,
        }
    }

    /// Bound the wait for the identity reply during `start`.
    #[must_use]
    pub fn identity_timeout(mut self, timeout: Duration) -> Self {
        self.identity_timeout = timeout;
        self
    }

    /// Bound the wait for the peer's close acknowledgement during `stop`.
    #[must_use]
    pub fn close_timeout(mut self, timeout: Duration) -> Self {
        self.close_timeout = timeout;
        self
    }

    /// Target websocket address.
    #[must_use]
    pub fn address_value(&self) -> &str { &self.address }

    /// Configured identity timeout.
    #[must_use]
    pub const fn identity_timeout_value(&self) -> Duration { self.identity_timeout }

    /// Configured close timeout.
    #[must_use]
    pub const fn close_timeout_value(&self) -> Duration { self.close_timeout }

    /// Check the settings are usable.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] when the address is empty or either
    /// timeout is zero.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.address.trim().is_empty() {
            return Err(ValidationError::EmptyAddress);
        }
        if self.identity_timeout.is_zero() {
            return Err(ValidationError::ZeroTimeout { name: "identity" });
        }
        if self.close_timeout.is_zero() {
            return Err(ValidationError::ZeroTimeout { name: "close" });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use rstest::rstest;

    use super::{DEFAULT_CLOSE_TIMEOUT, DEFAULT_IDENTITY_TIMEOUT, SocketConfig};
    use crate::error::ValidationError;

    #[test]
    fn defaults_are_five_seconds() {
        let config = SocketConfig::new("ws://localhost:1977");
        assert_eq!(config.identity_timeout_value(), DEFAULT_IDENTITY_TIMEOUT);
        assert_eq!(config.close_timeout_value(), DEFAULT_CLOSE_TIMEOUT);
        assert_eq!(DEFAULT_IDENTITY_TIMEOUT, Duration::from_secs(5));
    }

    #[rstest]
    #[case(SocketConfig::new(""), ValidationError::EmptyAddress)]
    #[case(SocketConfig::new("  "), ValidationError::EmptyAddress)]
    #[case(
        SocketConfig::new("ws://x").identity_timeout(Duration::ZERO),
        ValidationError::ZeroTimeout { name: "identity" }
    )]
    #[case(
        SocketConfig::new("ws://x").close_timeout(Duration::ZERO),
        ValidationError::ZeroTimeout { name: "close" }
    )]
    fn invalid_settings_are_rejected(#[case] config: SocketConfig, #[case] expected: ValidationError) {
        assert_eq!(config.validate(), Err(expected));
    }
}
