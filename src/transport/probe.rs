//! Reachability probe.
//!
//! [`try_connect_test`] opens a throwaway socket, connects with a timeout
//! and closes it again. It never fails; the outcome carries the error
//! description instead.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use tcp_helper::transport::try_connect_test;
//!
//! let outcome = try_connect_test("127.0.0.1", 6200, Duration::from_secs(1));
//! if !outcome.is_success() {
//!     println!("server unreachable: {:?}", outcome.error());
//! }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::net::{IpAddr, Shutdown, SocketAddr, TcpStream as StdTcpStream};
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;

// ============================================================================
// ProbeOutcome
// ============================================================================

/// Result of a reachability probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeOutcome {
    /// Whether the connect succeeded.
    success: bool,
    /// Failure description.
    error: Option<String>,
}

impl ProbeOutcome {
    fn success() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
        }
    }

    /// Returns `true` if the endpoint accepted the connection.
    #[inline]
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.success
    }

    /// Returns the failure description.
    #[inline]
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }
}

// ============================================================================
// Probes
// ============================================================================

/// Blocking connect test against `ip:port`.
///
/// Waits at most `connect_timeout` and always closes the probe socket
/// before returning.
#[must_use]
pub fn try_connect_test(ip: &str, port: u16, connect_timeout: Duration) -> ProbeOutcome {
    let addr = match parse_addr(ip, port) {
        Ok(addr) => addr,
        Err(outcome) => return outcome,
    };

    let outcome = match StdTcpStream::connect_timeout(&addr, connect_timeout) {
        Ok(stream) => {
            let _ = stream.shutdown(Shutdown::Both);
            ProbeOutcome::success()
        }
        Err(e) => ProbeOutcome::failure(e.to_string()),
    };

    debug!(%addr, success = outcome.success, "Connect probe finished");
    outcome
}

/// Async connect test against `ip:port`.
pub async fn probe(ip: &str, port: u16, connect_timeout: Duration) -> ProbeOutcome {
    let addr = match parse_addr(ip, port) {
        Ok(addr) => addr,
        Err(outcome) => return outcome,
    };

    let outcome = match timeout(connect_timeout, TcpStream::connect(addr)).await {
        Ok(Ok(stream)) => {
            drop(stream);
            ProbeOutcome::success()
        }
        Ok(Err(e)) => ProbeOutcome::failure(e.to_string()),
        Err(_) => ProbeOutcome::failure(format!(
            "connect timed out after {}ms",
            connect_timeout.as_millis()
        )),
    };

    debug!(%addr, success = outcome.success, "Connect probe finished");
    outcome
}

fn parse_addr(ip: &str, port: u16) -> Result<SocketAddr, ProbeOutcome> {
    ip.parse::<IpAddr>()
        .map(|ip| SocketAddr::new(ip, port))
        .map_err(|_| ProbeOutcome::failure(format!("invalid address: {ip}")))
}

// ============================================================================
// Tests
// ============================================================================
