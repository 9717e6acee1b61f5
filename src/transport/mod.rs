//! TCP transport layer.
//!
//! This module holds the pieces shared by [`crate::TcpClient`] and
//! [`crate::TcpServer`].
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐                              ┌─────────────────┐
//! │  TcpClient      │                              │  TcpServer      │
//! │                 │          TCP stream          │                 │
//! │  Connection ────┼─────────────────────────────►│  Registry       │
//! │  (I/O task)     │◄─────────────────────────────┼─ Connection     │
//! │                 │        ip:port               │  (I/O task)     │
//! └─────────────────┘                              └─────────────────┘
//! ```
//!
//! # Connection Lifecycle
//!
//! 1. Stream established (`connect` on the client, `accept` on the server)
//! 2. `Connection::open` - wrap the stream, allocate the [`Session`] buffer
//! 3. Server only: register the connection under its [`crate::ConnectionKey`]
//! 4. Spawn the I/O tasks: a receive loop (read, report, re-arm) and a
//!    write loop executing queued writes
//! 5. `Connection::close` or peer EOF - socket shut down, both tasks end
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `connection` | Connection handle and I/O tasks |
//! | `probe` | Reachability probe |
//! | `registry` | Server connection registry |
//! | `session` | Receive buffer context |

// ============================================================================
// Submodules
// ============================================================================

/// Connection handle and I/O tasks.
pub mod connection;

/// Reachability probe.
pub mod probe;

/// Server connection registry.
pub mod registry;

/// Receive buffer context.
pub mod session;

// ============================================================================
// Re-exports
// ============================================================================

pub use connection::{Connection, Link};
pub use probe::{ProbeOutcome, probe, try_connect_test};
pub use registry::{ConnectionRegistry, Registry};
pub use session::{DEFAULT_RECEIVE_BUFFER_SIZE, Session};
