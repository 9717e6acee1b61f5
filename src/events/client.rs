//! Events emitted by the client connector.

// ============================================================================
// Imports
// ============================================================================

use std::net::{IpAddr, SocketAddr};

use bytes::Bytes;

use crate::error::Error;
use crate::identifiers::CorrelationId;

use super::{Event, EventKind, Phase};

// ============================================================================
// ClientEvent
// ============================================================================

/// A signal raised by [`crate::TcpClient`].
#[derive(Debug, Clone)]
pub enum ClientEvent {
    /// The connection to the server was established.
    Connected {
        /// Server endpoint.
        peer: SocketAddr,
        /// Local endpoint of the socket.
        local: SocketAddr,
    },

    /// The connection ended, either by the peer or by [`crate::TcpClient::close`].
    Disconnected {
        /// Server address.
        ip: IpAddr,
        /// Server port.
        port: u16,
        /// Correlation id passed to `connect`.
        correlation_id: Option<CorrelationId>,
        /// [`Phase::Receive`] when the peer ended it, [`Phase::Close`] when closed locally.
        phase: Phase,
    },

    /// Bytes read from the server.
    DataReceived {
        /// Server endpoint.
        peer: SocketAddr,
        /// The bytes of one completed read.
        data: Bytes,
    },

    /// A write to the server completed.
    DataSent {
        /// Server endpoint.
        peer: SocketAddr,
        /// Correlation id passed to `send`.
        correlation_id: Option<CorrelationId>,
        /// Number of bytes written.
        len: usize,
    },

    /// An operation failed.
    Error {
        /// Correlation id of the failed operation.
        correlation_id: Option<CorrelationId>,
        /// Operation that failed.
        phase: Phase,
        /// The failure.
        error: Error,
    },
}

impl Event for ClientEvent {
    fn kind(&self) -> EventKind {
        match self {
            Self::Connected { .. } => EventKind::Connected,
            Self::Disconnected { .. } => EventKind::Disconnected,
            Self::DataReceived { .. } => EventKind::DataReceived,
            Self::DataSent { .. } => EventKind::DataSent,
            Self::Error { .. } => EventKind::Error,
        }
    }
}
