//! Client connector.
//!
//! # Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`TcpClient`] | Outbound connection with retrying connect |
//! | [`ClientBuilder`] | Fluent configuration builder |
//! | [`ClientOptions`] | Connector options |
//! | [`RetryPolicy`] | Connect-failure recovery rule |

// ============================================================================
// Submodules
// ============================================================================

/// Fluent builder pattern for client configuration.
pub mod builder;

/// Core client implementation.
pub mod core;

/// Client options.
pub mod options;

/// Connect retry policy.
pub mod retry;

// ============================================================================
// Re-exports
// ============================================================================

pub use builder::ClientBuilder;
pub use core::{ClientState, TcpClient};
pub use options::ClientOptions;
pub use retry::{RetryDecision, RetryPolicy};
