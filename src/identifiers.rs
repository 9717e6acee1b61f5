//! Type-safe identifiers for connections, sends and subscriptions.
//!
//! Newtype wrappers keep connection keys, correlation ids and
//! subscription ids from being mixed up at compile time.
//!
//! | Type | Wraps | Source |
//! |------|-------|--------|
//! | [`ConnectionKey`] | `ip:port` string | remote endpoint of a server-side connection |
//! | [`CorrelationId`] | caller string | optional tag passed to `connect` / `send` |
//! | [`SubscriptionId`] | `u64` | returned by `subscribe` |

// ============================================================================
// Imports
// ============================================================================

use std::borrow::Borrow;
use std::fmt;
use std::net::SocketAddr;
use std::num::NonZeroU64;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

// ============================================================================
// ConnectionKey
// ============================================================================

/// Key identifying a server-side connection.
///
/// Derived from the remote endpoint as `ip:port`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionKey(Arc<str>);

impl ConnectionKey {
    /// Creates a key for the given remote endpoint.
    #[inline]
    #[must_use]
    pub fn from_addr(addr: SocketAddr) -> Self {
        Self(Arc::from(format!("{}:{}", addr.ip(), addr.port())))
    }

    /// Returns the key as a string slice.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parses the key back into a socket address.
    ///
    /// Returns `None` for keys that were not built from an endpoint.
    #[must_use]
    pub fn socket_addr(&self) -> Option<SocketAddr> {
        let (ip, port) = self.0.rsplit_once(':')?;
        let ip = ip.trim_start_matches('[').trim_end_matches(']');
        Some(SocketAddr::new(ip.parse().ok()?, port.parse().ok()?))
    }
}

impl From<SocketAddr> for ConnectionKey {
    #[inline]
    fn from(addr: SocketAddr) -> Self {
        Self::from_addr(addr)
    }
}

impl From<&str> for ConnectionKey {
    #[inline]
    fn from(key: &str) -> Self {
        Self(Arc::from(key))
    }
}

impl From<String> for ConnectionKey {
    #[inline]
    fn from(key: String) -> Self {
        Self(Arc::from(key))
    }
}

impl AsRef<str> for ConnectionKey {
    #[inline]
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for ConnectionKey {
    #[inline]
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConnectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// CorrelationId
// ============================================================================

/// Caller-supplied tag carried through connect and send events.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CorrelationId(Arc<str>);

impl CorrelationId {
    /// Creates a correlation id.
    #[inline]
    #[must_use]
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(Arc::from(id.as_ref()))
    }

    /// Returns the id as a string slice.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for CorrelationId {
    #[inline]
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for CorrelationId {
    #[inline]
    fn from(id: String) -> Self {
        Self(Arc::from(id))
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// SubscriptionId
// ============================================================================

/// Global counter for subscription ids.
static NEXT_SUBSCRIPTION_ID: AtomicU64 = AtomicU64::new(1);

/// Handle returned by `subscribe`, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(NonZeroU64);

impl SubscriptionId {
    /// Allocates the next process-wide unique id.
    #[must_use]
    pub fn next() -> Self {
        let id = NEXT_SUBSCRIPTION_ID.fetch_add(1, Ordering::Relaxed);
        Self(NonZeroU64::new(id).unwrap_or(NonZeroU64::MIN))
    }

    /// Returns the raw value.
    #[inline]
    #[must_use]
    pub const fn as_u64(&self) -> u64 {
        self.0.get()
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Tests
// ============================================================================
