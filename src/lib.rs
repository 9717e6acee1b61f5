//! tcp-helper - Event-driven asynchronous TCP client and server.
//!
//! This library wraps tokio sockets in a small callback-style API: a
//! [`TcpClient`] that connects with retry, a [`TcpServer`] that tracks its
//! clients by `ip:port`, and a reachability probe.
//!
//! # Architecture
//!
//! - Every established socket is driven by one tokio task that owns the
//!   socket halves and the receive buffer
//! - Outcomes are reported through per-kind event subscriptions
//!   ([`EventKind`]), never by polling
//! - Each [`TcpServer`] owns its own [`ConnectionRegistry`]
//!
//! # Quick Start
//!
//! ```no_run
//! use tcp_helper::{EventKind, Result, ServerEvent, TcpClient, TcpServer};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let server = TcpServer::new();
//!     server.subscribe(EventKind::DataReceived, |event| {
//!         if let ServerEvent::DataReceived { key, data } = event {
//!             println!("{key}: {}", String::from_utf8_lossy(data));
//!         }
//!     });
//!     let local = server.start_local(0).await?;
//!
//!     let client = TcpClient::new("127.0.0.1", local.port())?;
//!     client.connect(None).await?;
//!     client.send_text("Hello world!", None).await?;
//!
//!     client.close();
//!     server.close();
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`client`] | Client connector and retry policy |
//! | [`server`] | Server listener |
//! | [`events`] | Signal kinds, event payloads, [`EventHub`] |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Connection keys and correlation ids |
//! | [`transport`] | Connection I/O loop, registry, probe |
//!
//! # Error Delivery
//!
//! Caller-triggered failures go to `Error` subscribers when there are any
//! and the call returns `Ok(())`; otherwise the call returns `Err`.

// ============================================================================
// Modules
// ============================================================================

/// Client connector.
///
/// Use [`TcpClient::builder()`] to configure retry and timeouts.
pub mod client;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Event dispatch surface.
pub mod events;

/// Connection keys and correlation ids.
pub mod identifiers;

/// Server listener.
pub mod server;

/// TCP transport layer.
///
/// Connection I/O loop shared by client and server, the server's
/// connection registry and the reachability probe.
pub mod transport;

mod duration_ms;

// ============================================================================
// Re-exports
// ============================================================================

// Client types
pub use client::{ClientBuilder, ClientOptions, ClientState, RetryDecision, RetryPolicy, TcpClient};

// Server types
pub use server::{ServerOptions, TcpServer};

// Event types
pub use events::{ClientEvent, Event, EventHub, EventKind, Phase, ServerEvent};

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::{ConnectionKey, CorrelationId, SubscriptionId};

// Transport types
pub use transport::{ConnectionRegistry, ProbeOutcome, probe, try_connect_test};
