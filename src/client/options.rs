//! Client connector options.
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use tcp_helper::{ClientOptions, RetryPolicy};
//!
//! let options = ClientOptions::new()
//!     .with_retry(RetryPolicy::new(3, Duration::from_millis(200)))
//!     .with_send_grace(Duration::from_secs(1))
//!     .with_receive_buffer_size(64 * 1024);
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::transport::DEFAULT_RECEIVE_BUFFER_SIZE;

use super::retry::RetryPolicy;

// ============================================================================
// Constants
// ============================================================================

/// Default wait in `send` for a pending connect (3 s).
pub const DEFAULT_SEND_GRACE: Duration = Duration::from_secs(3);

/// Default timeout of a single connect attempt (30 s).
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

// ============================================================================
// ClientOptions
// ============================================================================

/// Client connector configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientOptions {
    /// Connect retry policy.
    pub retry: RetryPolicy,

    /// How long `send` waits for a connection that is not yet established.
    #[serde(rename = "send_grace_ms", with = "crate::duration_ms")]
    pub send_grace: Duration,

    /// Timeout of a single connect attempt.
    #[serde(rename = "connect_timeout_ms", with = "crate::duration_ms")]
    pub connect_timeout: Duration,

    /// Size of the receive buffer.
    pub receive_buffer_size: usize,

    /// Set `TCP_NODELAY` on the socket.
    pub nodelay: bool,
}

// ============================================================================
// Constructors
// ============================================================================

impl ClientOptions {
    /// Creates options with default settings.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            retry: RetryPolicy::disabled(),
            send_grace: DEFAULT_SEND_GRACE,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            receive_buffer_size: DEFAULT_RECEIVE_BUFFER_SIZE,
            nodelay: false,
        }
    }

    /// Parses options from JSON. Missing fields keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the JSON is malformed or invalid.
    pub fn from_json(json: &str) -> Result<Self> {
        let options: Self = serde_json::from_str(json)
            .map_err(|e| Error::config(format!("invalid client options: {e}")))?;
        options.validate()?;
        Ok(options)
    }
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Builder Methods
// ============================================================================

impl ClientOptions {
    /// Sets the retry policy.
    #[inline]
    #[must_use]
    pub const fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the send grace period.
    #[inline]
    #[must_use]
    pub const fn with_send_grace(mut self, grace: Duration) -> Self {
        self.send_grace = grace;
        self
    }

    /// Sets the connect attempt timeout.
    #[inline]
    #[must_use]
    pub const fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the receive buffer size.
    #[inline]
    #[must_use]
    pub const fn with_receive_buffer_size(mut self, size: usize) -> Self {
        self.receive_buffer_size = size;
        self
    }

    /// Enables `TCP_NODELAY`.
    #[inline]
    #[must_use]
    pub const fn with_nodelay(mut self) -> Self {
        self.nodelay = true;
        self
    }
}

// ============================================================================
// Validation
// ============================================================================

impl ClientOptions {
    /// Checks the option values.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for a zero receive buffer or connect timeout.
    pub fn validate(&self) -> Result<()> {
        if self.receive_buffer_size == 0 {
            return Err(Error::config("receive_buffer_size must be greater than 0"));
        }
        if self.connect_timeout.is_zero() {
            return Err(Error::config("connect_timeout must be greater than 0"));
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = ClientOptions::default();
        assert!(!options.retry.enabled);
        assert_eq!(options.send_grace, Duration::from_secs(3));
        assert_eq!(options.connect_timeout, Duration::from_secs(30));
        assert_eq!(options.receive_buffer_size, 10 * 1024 * 1024);
        assert!(!options.nodelay);
    }

    #[test]
    fn test_builder_chain() {
        let options = ClientOptions::new()
            .with_retry(RetryPolicy::new(2, Duration::from_millis(50)))
            .with_send_grace(Duration::from_millis(100))
            .with_receive_buffer_size(4096)
            .with_nodelay();

        assert!(options.retry.enabled);
        assert_eq!(options.retry.max_attempts, 2);
        assert_eq!(options.send_grace, Duration::from_millis(100));
        assert_eq!(options.receive_buffer_size, 4096);
        assert!(options.nodelay);
    }

    #[test]
    fn test_from_json_partial() {
        let options = ClientOptions::from_json(
            r#"{"retry":{"enabled":true,"max_attempts":3},"send_grace_ms":500}"#,
        )
        .expect("valid options");

        assert!(options.retry.enabled);
        assert_eq!(options.retry.max_attempts, 3);
        assert_eq!(options.retry.interval, Duration::from_secs(1));
        assert_eq!(options.send_grace, Duration::from_millis(500));
        assert_eq!(options.receive_buffer_size, DEFAULT_RECEIVE_BUFFER_SIZE);
    }

    #[test]
    fn test_from_json_rejects_zero_buffer() {
        let err = ClientOptions::from_json(r#"{"receive_buffer_size":0}"#).unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn test_from_json_rejects_garbage() {
        assert!(ClientOptions::from_json("not json").is_err());
    }
}
