//! Listener list with per-kind subscriptions.
//!
//! Handlers are kept in subscription order. [`EventHub::emit`] takes a
//! snapshot of the matching handlers, releases the lock, and calls each
//! one, so handlers may subscribe, unsubscribe or close connections
//! without deadlocking. A panicking handler is logged and skipped.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{trace, warn};

use crate::identifiers::SubscriptionId;

use super::{Event, EventKind};

// ============================================================================
// Types
// ============================================================================

/// Event handler callback type.
pub type Handler<E> = Arc<dyn Fn(&E) + Send + Sync>;

/// One registered handler.
struct Subscription<E> {
    id: SubscriptionId,
    kind: EventKind,
    handler: Handler<E>,
}

// ============================================================================
// EventHub
// ============================================================================

/// Ordered listener list for one event type.
///
/// # Example
///
/// ```ignore
/// let hub = EventHub::<ClientEvent>::new();
/// let id = hub.subscribe(EventKind::DataReceived, |event| println!("{event:?}"));
/// hub.unsubscribe(id);
/// ```
pub struct EventHub<E> {
    subscriptions: RwLock<Vec<Subscription<E>>>,
}

impl<E: Event> EventHub<E> {
    /// Creates an empty hub.
    #[must_use]
    pub fn new() -> Self {
        Self {
            subscriptions: RwLock::new(Vec::new()),
        }
    }

    /// Registers a handler for one signal kind.
    pub fn subscribe<F>(&self, kind: EventKind, handler: F) -> SubscriptionId
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        let id = SubscriptionId::next();
        self.subscriptions.write().push(Subscription {
            id,
            kind,
            handler: Arc::new(handler),
        });
        trace!(%id, %kind, "Subscribed");
        id
    }

    /// Removes a handler.
    ///
    /// Returns `false` if the id was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscriptions = self.subscriptions.write();
        let before = subscriptions.len();
        subscriptions.retain(|s| s.id != id);
        before != subscriptions.len()
    }

    /// Returns `true` if at least one handler listens for `kind`.
    #[must_use]
    pub fn has_subscribers(&self, kind: EventKind) -> bool {
        self.subscriptions.read().iter().any(|s| s.kind == kind)
    }

    /// Returns the number of handlers listening for `kind`.
    #[must_use]
    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        self.subscriptions
            .read()
            .iter()
            .filter(|s| s.kind == kind)
            .count()
    }

    /// Delivers an event to every handler of its kind.
    ///
    /// Returns the number of handlers that completed without panicking.
    /// Handler panics are only caught when built with `panic = "unwind"`.
    pub fn emit(&self, event: &E) -> usize {
        let kind = event.kind();
        let handlers: Vec<Handler<E>> = self
            .subscriptions
            .read()
            .iter()
            .filter(|s| s.kind == kind)
            .map(|s| Arc::clone(&s.handler))
            .collect();

        let mut delivered = 0;
        for handler in handlers {
            match catch_unwind(AssertUnwindSafe(|| handler(event))) {
                Ok(()) => delivered += 1,
                Err(_) => warn!(%kind, "Event handler panicked"),
            }
        }
        delivered
    }
}

impl<E: Event> Default for EventHub<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for EventHub<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventHub")
            .field("subscriptions", &self.subscriptions.read().len())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
