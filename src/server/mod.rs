//! Server listener.
//!
//! # Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`TcpServer`] | Accepts and tracks client connections |
//! | [`ServerOptions`] | Listener options |

// ============================================================================
// Submodules
// ============================================================================

/// Core server implementation.
pub mod core;

/// Server options.
pub mod options;

// ============================================================================
// Re-exports
// ============================================================================

pub use core::TcpServer;
pub use options::ServerOptions;
