//! Event dispatch surface.
//!
//! Client and server expose the same five signal kinds. Callers register
//! handlers per kind on an [`EventHub`]; handlers run synchronously on the
//! task that completed the I/O, in subscription order.
//!
//! # Signal Kinds
//!
//! | Kind | Client event | Server event |
//! |------|--------------|--------------|
//! | [`EventKind::Connected`] | [`ClientEvent::Connected`] | [`ServerEvent::ClientConnected`] |
//! | [`EventKind::Disconnected`] | [`ClientEvent::Disconnected`] | [`ServerEvent::ClientDisconnected`] |
//! | [`EventKind::DataReceived`] | [`ClientEvent::DataReceived`] | [`ServerEvent::DataReceived`] |
//! | [`EventKind::DataSent`] | [`ClientEvent::DataSent`] | [`ServerEvent::DataSent`] |
//! | [`EventKind::Error`] | [`ClientEvent::Error`] | [`ServerEvent::Error`] |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

// ============================================================================
// Submodules
// ============================================================================

/// Events emitted by [`crate::TcpClient`].
pub mod client;

/// Listener list with per-kind subscriptions.
pub mod hub;

/// Events emitted by [`crate::TcpServer`].
pub mod server;

// ============================================================================
// Re-exports
// ============================================================================

pub use client::ClientEvent;
pub use hub::{EventHub, Handler};
pub use server::ServerEvent;

// ============================================================================
// EventKind
// ============================================================================

/// The five observable signal kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// A connection was established.
    Connected,
    /// A connection ended.
    Disconnected,
    /// Bytes were read from a connection.
    DataReceived,
    /// A write completed.
    DataSent,
    /// An operation failed.
    Error,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
            Self::DataReceived => "data_received",
            Self::DataSent => "data_sent",
            Self::Error => "error",
        };
        f.write_str(name)
    }
}

// ============================================================================
// Phase
// ============================================================================

/// The socket operation an event or error belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Establishing an outbound connection.
    Connect,
    /// Writing to a connection.
    Send,
    /// Reading from a connection.
    Receive,
    /// Explicit close by the local side.
    Close,
    /// Accepting on the listening socket.
    Accept,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Connect => "connect",
            Self::Send => "send",
            Self::Receive => "receive",
            Self::Close => "close",
            Self::Accept => "accept",
        };
        f.write_str(name)
    }
}

// ============================================================================
// Event
// ============================================================================

/// An event that can be routed by kind.
pub trait Event: Send + Sync + 'static {
    /// Returns the signal kind of this event.
    fn kind(&self) -> EventKind;
}
