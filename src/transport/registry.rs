//! Connection registry keyed by remote endpoint.
//!
//! The server records every accepted connection here under its
//! [`ConnectionKey`]. Each server owns its own registry.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │           ConnectionRegistry            │
//! │  ┌─────────────────────────────────┐    │
//! │  │ 127.0.0.1:50412 → Connection 1  │    │
//! │  │ 127.0.0.1:50418 → Connection 2  │    │
//! │  │ 10.0.0.7:61001  → Connection 3  │    │
//! │  └─────────────────────────────────┘    │
//! └─────────────────────────────────────────┘
//! ```
//!
//! Inserts never replace an entry: [`Registry::try_insert`] refuses a key
//! that is already present, so a key never maps to two connections.

// ============================================================================
// Imports
// ============================================================================

use std::borrow::Borrow;
use std::collections::hash_map::Entry;
use std::fmt;
use std::hash::Hash;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::identifiers::ConnectionKey;

use super::Connection;

// ============================================================================
// Types
// ============================================================================

/// Registry of live server-side connections.
pub type ConnectionRegistry = Registry<Connection>;

// ============================================================================
// Registry
// ============================================================================

/// Thread-safe map from connection key to connection handle.
///
/// All operations take the internal lock for the duration of the call
/// only; callers never lock.
pub struct Registry<C> {
    /// Live entries.
    entries: RwLock<FxHashMap<ConnectionKey, C>>,
}

impl<C: Clone> Registry<C> {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(FxHashMap::default()),
        }
    }

    /// Inserts an entry unless the key is already present.
    ///
    /// Returns `false` and leaves the registry unchanged on a duplicate key.
    pub fn try_insert(&self, key: ConnectionKey, value: C) -> bool {
        match self.entries.write().entry(key) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(value);
                true
            }
        }
    }

    /// Returns a clone of the entry for `key`.
    #[must_use]
    pub fn get<Q>(&self, key: &Q) -> Option<C>
    where
        ConnectionKey: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entries.read().get(key).cloned()
    }

    /// Returns `true` if `key` is registered.
    #[must_use]
    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        ConnectionKey: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entries.read().contains_key(key)
    }

    /// Removes and returns the entry for `key`.
    pub fn remove<Q>(&self, key: &Q) -> Option<C>
    where
        ConnectionKey: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entries.write().remove(key)
    }

    /// Removes the entry for `key` only if `predicate` accepts it.
    ///
    /// Used to drop an entry only while it still refers to a given
    /// connection.
    pub fn remove_if<Q, F>(&self, key: &Q, predicate: F) -> Option<C>
    where
        ConnectionKey: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
        F: FnOnce(&C) -> bool,
    {
        let mut entries = self.entries.write();
        if entries.get(key).is_some_and(predicate) {
            entries.remove(key)
        } else {
            None
        }
    }

    /// Returns a snapshot of the registered keys.
    #[must_use]
    pub fn keys(&self) -> Vec<ConnectionKey> {
        self.entries.read().keys().cloned().collect()
    }

    /// Returns the number of entries.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns `true` if the registry is empty.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Removes and returns every entry.
    pub fn drain(&self) -> Vec<(ConnectionKey, C)> {
        self.entries.write().drain().collect()
    }
}

impl<C: Clone> Default for Registry<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> fmt::Debug for Registry<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("len", &self.entries.read().len())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
