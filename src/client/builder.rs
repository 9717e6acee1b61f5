//! Builder pattern for client configuration.
//!
//! Provides a fluent API for configuring and creating [`TcpClient`] instances.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use tcp_helper::TcpClient;
//!
//! # fn example() -> tcp_helper::Result<()> {
//! let client = TcpClient::builder("127.0.0.1", 6200)
//!     .retry(3, Duration::from_millis(200))
//!     .send_grace(Duration::from_secs(1))
//!     .build()?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use crate::error::{Error, Result};

use super::core::TcpClient;
use super::options::ClientOptions;
use super::retry::RetryPolicy;

// ============================================================================
// ClientBuilder
// ============================================================================

/// Builder for configuring a [`TcpClient`] instance.
///
/// Use [`TcpClient::builder()`] to create a new builder.
#[derive(Debug, Clone)]
pub struct ClientBuilder {
    /// Server IP address as given by the caller.
    ip: String,
    /// Server port.
    port: u16,
    /// Client options.
    options: ClientOptions,
}

// ============================================================================
// ClientBuilder Implementation
// ============================================================================

impl ClientBuilder {
    /// Creates a builder for the server at `ip:port`.
    #[inline]
    #[must_use]
    pub fn new(ip: impl Into<String>, port: u16) -> Self {
        Self {
            ip: ip.into(),
            port,
            options: ClientOptions::default(),
        }
    }

    /// Enables connect retry.
    ///
    /// # Arguments
    ///
    /// * `max_attempts` - Retries after the first failed attempt
    /// * `interval` - Delay between attempts
    #[inline]
    #[must_use]
    pub fn retry(mut self, max_attempts: u32, interval: Duration) -> Self {
        self.options.retry = RetryPolicy::new(max_attempts, interval);
        self
    }

    /// Sets how long `send` waits for a pending connect.
    #[inline]
    #[must_use]
    pub fn send_grace(mut self, grace: Duration) -> Self {
        self.options.send_grace = grace;
        self
    }

    /// Sets the timeout of a single connect attempt.
    #[inline]
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.options.connect_timeout = timeout;
        self
    }

    /// Sets the receive buffer size.
    #[inline]
    #[must_use]
    pub fn receive_buffer_size(mut self, size: usize) -> Self {
        self.options.receive_buffer_size = size;
        self
    }

    /// Enables `TCP_NODELAY`.
    #[inline]
    #[must_use]
    pub fn nodelay(mut self) -> Self {
        self.options.nodelay = true;
        self
    }

    /// Replaces all options at once.
    #[inline]
    #[must_use]
    pub fn options(mut self, options: ClientOptions) -> Self {
        self.options = options;
        self
    }

    /// Builds the client with validation.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidAddress`] if the IP address cannot be parsed
    /// - [`Error::Config`] if the options are invalid
    pub fn build(self) -> Result<TcpClient> {
        let remote = self.validate_address()?;
        self.options.validate()?;

        Ok(TcpClient::with_options(remote, self.options))
    }
}

// ============================================================================
// Validation
// ============================================================================

impl ClientBuilder {
    /// Validates the server address.
    fn validate_address(&self) -> Result<SocketAddr> {
        let ip: IpAddr = self
            .ip
            .trim()
            .parse()
            .map_err(|_| Error::invalid_address(&self.ip))?;

        if self.port == 0 {
            return Err(Error::config("server port must not be 0"));
        }

        Ok(SocketAddr::new(ip, self.port))
    }
}

// ============================================================================
// Tests
// ============================================================================
