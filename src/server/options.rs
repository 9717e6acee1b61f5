//! Server listener options.

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::transport::DEFAULT_RECEIVE_BUFFER_SIZE;

// ============================================================================
// Constants
// ============================================================================

/// Default pause between two reads on an accepted connection (20 ms).
pub const DEFAULT_RECEIVE_THROTTLE: Duration = Duration::from_millis(20);

// ============================================================================
// ServerOptions
// ============================================================================

/// Server listener configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerOptions {
    /// Pause before each read on an accepted connection. May be zero.
    #[serde(rename = "receive_throttle_ms", with = "crate::duration_ms")]
    pub receive_throttle: Duration,

    /// Receive buffer size of each accepted connection.
    pub receive_buffer_size: usize,

    /// Set `TCP_NODELAY` on accepted sockets.
    pub nodelay: bool,
}

impl ServerOptions {
    /// Creates options with default settings.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            receive_throttle: DEFAULT_RECEIVE_THROTTLE,
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
            .map_err(|e| Error::config(format!("invalid server options: {e}")))?;
        options.validate()?;
        Ok(options)
    }

    /// Sets the receive throttle.
    #[inline]
    #[must_use]
    pub const fn with_receive_throttle(mut self, throttle: Duration) -> Self {
        self.receive_throttle = throttle;
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

    /// Checks the option values.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for a zero receive buffer.
    pub fn validate(&self) -> Result<()> {
        if self.receive_buffer_size == 0 {
            return Err(Error::config("receive_buffer_size must be greater than 0"));
        }
        Ok(())
    }
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self::new()
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
        let options = ServerOptions::default();
        assert_eq!(options.receive_throttle, Duration::from_millis(20));
        assert_eq!(options.receive_buffer_size, DEFAULT_RECEIVE_BUFFER_SIZE);
        assert!(!options.nodelay);
    }

    #[test]
    fn test_zero_throttle_allowed() {
        let options = ServerOptions::new().with_receive_throttle(Duration::ZERO);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_from_json() {
        let options =
            ServerOptions::from_json(r#"{"receive_throttle_ms":0,"receive_buffer_size":8192}"#)
                .expect("valid options");
        assert_eq!(options.receive_throttle, Duration::ZERO);
        assert_eq!(options.receive_buffer_size, 8192);
    }

    #[test]
    fn test_from_json_rejects_zero_buffer() {
        let err = ServerOptions::from_json(r#"{"receive_buffer_size":0}"#).unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }
}
