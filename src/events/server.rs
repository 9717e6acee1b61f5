//! Events emitted by the server listener.

// ============================================================================
// Imports
// ============================================================================

use std::net::{IpAddr, SocketAddr};

use bytes::Bytes;

use crate::error::Error;
use crate::identifiers::{ConnectionKey, CorrelationId};

use super::{Event, EventKind, Phase};

// ============================================================================
// ServerEvent
// ============================================================================

/// A signal raised by [`crate::TcpServer`].
#[derive(Debug, Clone)]
pub enum ServerEvent {
    /// A client connection was accepted and registered.
    ClientConnected {
        /// Registry key of the connection.
        key: ConnectionKey,
        /// Client endpoint.
        peer: SocketAddr,
    },

    /// A client connection ended and was removed from the registry.
    ClientDisconnected {
        /// Registry key of the connection.
        key: ConnectionKey,
        /// Client address.
        ip: IpAddr,
        /// Client port.
        port: u16,
    },

    /// Bytes read from a client.
    DataReceived {
        /// Registry key of the connection.
        key: ConnectionKey,
        /// The bytes of one completed read.
        data: Bytes,
    },

    /// A write to a client completed.
    DataSent {
        /// Registry key of the connection.
        key: ConnectionKey,
        /// Correlation id passed to `send`.
        correlation_id: Option<CorrelationId>,
        /// Number of bytes written.
        len: usize,
    },

    /// An operation failed.
    Error {
        /// Address of the listening socket.
        listener: Option<SocketAddr>,
        /// Connection involved, if any.
        key: Option<ConnectionKey>,
        /// Operation that failed.
        phase: Phase,
        /// The failure.
        error: Error,
    },
}

impl Event for ServerEvent {
    fn kind(&self) -> EventKind {
        match self {
            Self::ClientConnected { .. } => EventKind::Connected,
            Self::ClientDisconnected { .. } => EventKind::Disconnected,
            Self::DataReceived { .. } => EventKind::DataReceived,
            Self::DataSent { .. } => EventKind::DataSent,
            Self::Error { .. } => EventKind::Error,
        }
    }
}
