//! Receive context of one connection.
//!
//! A [`Session`] owns the receive buffer for exactly one receive loop.
//! Reads land in the buffer and [`Session::take`] copies the filled part
//! out, so the buffer can be re-armed for the next read immediately.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::net::SocketAddr;

use bytes::Bytes;

use crate::identifiers::CorrelationId;

// ============================================================================
// Constants
// ============================================================================

/// Default receive buffer size (10 MiB).
///
/// Each live receive loop allocates one buffer of this size.
pub const DEFAULT_RECEIVE_BUFFER_SIZE: usize = 10 * 1024 * 1024;

// ============================================================================
// Session
// ============================================================================

/// Receive context: peer endpoint, correlation id and buffer.
pub struct Session {
    /// Remote endpoint the buffer is read from.
    peer: SocketAddr,
    /// Correlation id supplied when the connection was opened.
    correlation_id: Option<CorrelationId>,
    /// Receive buffer, never shared between reads.
    buffer: Box<[u8]>,
}

impl Session {
    /// Creates a session with a zeroed buffer of `buffer_size` bytes.
    #[must_use]
    pub fn new(
        peer: SocketAddr,
        correlation_id: Option<CorrelationId>,
        buffer_size: usize,
    ) -> Self {
        Self {
            peer,
            correlation_id,
            buffer: vec![0; buffer_size].into_boxed_slice(),
        }
    }

    /// Returns the remote endpoint.
    #[inline]
    #[must_use]
    pub const fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Returns the correlation id.
    #[inline]
    #[must_use]
    pub fn correlation_id(&self) -> Option<&CorrelationId> {
        self.correlation_id.as_ref()
    }

    /// Returns the buffer capacity.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// Returns the buffer for the next read.
    #[inline]
    pub fn buffer_mut(&mut self) -> &mut [u8] {
        &mut self.buffer
    }

    /// Copies the first `count` bytes of the last read out of the buffer.
    #[must_use]
    pub fn take(&self, count: usize) -> Bytes {
        Bytes::copy_from_slice(&self.buffer[..count.min(self.buffer.len())])
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("peer", &self.peer)
            .field("correlation_id", &self.correlation_id)
            .field("capacity", &self.buffer.len())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
