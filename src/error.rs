//! Error types for the TCP helpers.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use tcp_helper::{Result, TcpClient};
//!
//! async fn example() -> Result<()> {
//!     let client = TcpClient::new("127.0.0.1", 6200)?;
//!     client.connect(None).await?;
//!     client.send_text("Hello world!", None).await?;
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Configuration | [`Error::Config`], [`Error::InvalidAddress`], [`Error::InvalidState`] |
//! | Connection | [`Error::ConnectFailed`], [`Error::NotConnected`], [`Error::ConnectionClosed`], [`Error::ConnectionNotFound`] |
//! | Transfer | [`Error::SendFailed`], [`Error::ReceiveFailed`] |
//! | Listener | [`Error::ListenerFailed`] |
//!
//! I/O sources are held behind an [`Arc`] so an error can be cloned and
//! handed to every `Error` subscriber.

// ============================================================================
// Imports
// ============================================================================

use std::io::{Error as IoError, ErrorKind};
use std::net::SocketAddr;
use std::result::Result as StdResult;
use std::sync::Arc;

use thiserror::Error;

use crate::identifiers::ConnectionKey;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
///
/// Each variant includes relevant context for debugging.
#[derive(Error, Debug, Clone)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when client or server options are invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    /// The address could not be parsed as an IP address.
    #[error("Invalid address: {address}")]
    InvalidAddress {
        /// The rejected address text.
        address: String,
    },

    /// The operation is not valid in the current state.
    ///
    /// Returned for example when starting a server twice.
    #[error("Invalid state: {message}")]
    InvalidState {
        /// Description of the state conflict.
        message: String,
    },

    // ========================================================================
    // Connection Errors
    // ========================================================================
    /// Connecting to the remote endpoint failed.
    ///
    /// `retries` counts the attempts made after the first one.
    #[error("Connect to {addr} failed after {retries} retries: {source}")]
    ConnectFailed {
        /// Remote endpoint.
        addr: SocketAddr,
        /// Retries performed before giving up.
        retries: u32,
        /// Last I/O failure.
        #[source]
        source: Arc<IoError>,
    },

    /// No established connection is available.
    #[error("Not connected")]
    NotConnected,

    /// The connection was closed before the operation completed.
    #[error("Connection closed")]
    ConnectionClosed,

    /// No registered connection matches the key.
    #[error("Connection not found: {key}")]
    ConnectionNotFound {
        /// The missing connection key.
        key: ConnectionKey,
    },

    // ========================================================================
    // Transfer Errors
    // ========================================================================
    /// Writing to the socket failed.
    #[error("Send to {addr} failed: {source}")]
    SendFailed {
        /// Remote endpoint.
        addr: SocketAddr,
        /// Underlying I/O failure.
        #[source]
        source: Arc<IoError>,
    },

    /// Reading from the socket failed.
    #[error("Receive from {addr} failed: {source}")]
    ReceiveFailed {
        /// Remote endpoint.
        addr: SocketAddr,
        /// Underlying I/O failure.
        #[source]
        source: Arc<IoError>,
    },

    // ========================================================================
    // Listener Errors
    // ========================================================================
    /// Binding or accepting on the listening socket failed.
    #[error("Listener failed: {source}")]
    ListenerFailed {
        /// Underlying I/O failure.
        #[source]
        source: Arc<IoError>,
    },
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates an invalid address error.
    #[inline]
    pub fn invalid_address(address: impl Into<String>) -> Self {
        Self::InvalidAddress {
            address: address.into(),
        }
    }

    /// Creates an invalid state error.
    #[inline]
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }

    /// Creates a connect failure.
    #[inline]
    pub fn connect_failed(addr: SocketAddr, retries: u32, err: IoError) -> Self {
        Self::ConnectFailed {
            addr,
            retries,
            source: Arc::new(err),
        }
    }

    /// Creates a connection not found error.
    #[inline]
    pub fn connection_not_found(key: ConnectionKey) -> Self {
        Self::ConnectionNotFound { key }
    }

    /// Creates a send failure.
    #[inline]
    pub fn send_failed(addr: SocketAddr, err: IoError) -> Self {
        Self::SendFailed {
            addr,
            source: Arc::new(err),
        }
    }

    /// Creates a receive failure.
    #[inline]
    pub fn receive_failed(addr: SocketAddr, err: IoError) -> Self {
        Self::ReceiveFailed {
            addr,
            source: Arc::new(err),
        }
    }

    /// Creates a listener failure.
    #[inline]
    pub fn listener_failed(err: IoError) -> Self {
        Self::ListenerFailed {
            source: Arc::new(err),
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns the I/O error kind behind this error, if any.
    #[must_use]
    pub fn io_kind(&self) -> Option<ErrorKind> {
        match self {
            Self::ConnectFailed { source, .. }
            | Self::SendFailed { source, .. }
            | Self::ReceiveFailed { source, .. }
            | Self::ListenerFailed { source } => Some(source.kind()),
            _ => None,
        }
    }

    /// Returns `true` if this is a timeout error.
    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        self.io_kind() == Some(ErrorKind::TimedOut)
    }

    /// Returns `true` if this is a connection error.
    #[inline]
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::ConnectFailed { .. }
                | Self::NotConnected
                | Self::ConnectionClosed
                | Self::ConnectionNotFound { .. }
        )
    }

    /// Returns `true` if this error is recoverable.
    ///
    /// Only connect failures are retried by the client.
    #[inline]
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::ConnectFailed { .. })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::net::{IpAddr, Ipv4Addr};

    fn addr() -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 6200)
    }

    #[test]
    fn test_error_display() {
        let err = Error::connect_failed(addr(), 3, IoError::from(ErrorKind::ConnectionRefused));
        assert!(
            err.to_string()
                .starts_with("Connect to 127.0.0.1:6200 failed after 3 retries")
        );
    }

    #[test]
    fn test_config_error() {
        let err = Error::config("receive buffer must not be empty");
        assert_eq!(
            err.to_string(),
            "Configuration error: receive buffer must not be empty"
        );
    }

    #[test]
    fn test_connection_not_found_display() {
        let err = Error::connection_not_found(ConnectionKey::from(addr()));
        assert_eq!(err.to_string(), "Connection not found: 127.0.0.1:6200");
    }

    #[test]
    fn test_is_timeout() {
        let timeout_err = Error::connect_failed(addr(), 0, IoError::from(ErrorKind::TimedOut));
        let other_err = Error::NotConnected;

        assert!(timeout_err.is_timeout());
        assert!(!other_err.is_timeout());
    }

    #[test]
    fn test_is_connection_error() {
        let refused = Error::connect_failed(addr(), 0, IoError::from(ErrorKind::ConnectionRefused));
        let closed_err = Error::ConnectionClosed;
        let send_err = Error::send_failed(addr(), IoError::from(ErrorKind::BrokenPipe));

        assert!(refused.is_connection_error());
        assert!(closed_err.is_connection_error());
        assert!(Error::NotConnected.is_connection_error());
        assert!(!send_err.is_connection_error());
    }

    #[test]
    fn test_is_recoverable() {
        let connect_err = Error::connect_failed(addr(), 1, IoError::from(ErrorKind::ConnectionRefused));
        let send_err = Error::send_failed(addr(), IoError::from(ErrorKind::BrokenPipe));

        assert!(connect_err.is_recoverable());
        assert!(!send_err.is_recoverable());
    }

    #[test]
    fn test_clone_shares_source() {
        let err = Error::receive_failed(addr(), IoError::from(ErrorKind::ConnectionReset));
        let cloned = err.clone();

        assert_eq!(err.io_kind(), Some(ErrorKind::ConnectionReset));
        assert_eq!(cloned.io_kind(), Some(ErrorKind::ConnectionReset));
        assert_eq!(err.to_string(), cloned.to_string());
    }
}
