//! Registry of live connections.
//!
//! Every link is inserted once on activation and removed once on
//! teardown. Broadcast and draining walk a [`snapshot`](ConnectionRegistry::snapshot)
//! rather than holding the lock.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │          ConnectionRegistry             │
//! │  ┌─────────────────────────────────┐    │
//! │  │ ConnectionId=1 → Connection 1   │    │
//! │  │ ConnectionId=2 → Connection 2   │    │
//! │  │ ConnectionId=3 → Connection 3   │    │
//! │  └─────────────────────────────────┘    │
//! └─────────────────────────────────────────┘
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::collections::hash_map::Entry;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use tracing::debug;

use crate::identifiers::ConnectionId;

use super::Connection;

// ============================================================================
// ConnectionRegistry
// ============================================================================

/// Concurrent set of live connections, keyed by [`ConnectionId`].
#[derive(Default)]
pub struct ConnectionRegistry {
    connections: RwLock<FxHashMap<ConnectionId, Connection>>,
}

impl ConnectionRegistry {
    /// Creates an empty registry.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a connection.
    ///
    /// Returns `false` if it was already registered.
    pub fn insert(&self, connection: &Connection) -> bool {
        let inserted = {
            let mut connections = self.connections.write();
            match connections.entry(connection.id()) {
                Entry::Occupied(_) => false,
                Entry::Vacant(slot) => {
                    slot.insert(connection.clone());
                    true
                }
            }
        };

        if inserted {
            debug!(connection_id = %connection.id(), "Connection registered");
        }
        inserted
    }

    /// Removes a connection.
    pub fn remove(&self, id: ConnectionId) -> Option<Connection> {
        let removed = self.connections.write().remove(&id);

        if removed.is_some() {
            debug!(connection_id = %id, "Connection unregistered");
        }
        removed
    }

    /// Returns `true` if the connection is registered.
    #[inline]
    #[must_use]
    pub fn contains(&self, id: ConnectionId) -> bool {
        self.connections.read().contains_key(&id)
    }

    /// Looks up a connection.
    #[must_use]
    pub fn get(&self, id: ConnectionId) -> Option<Connection> {
        self.connections.read().get(&id).cloned()
    }

    /// Returns the number of live connections.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.connections.read().len()
    }

    /// Returns `true` if no connection is registered.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.connections.read().is_empty()
    }

    /// Copies out every live connection.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Connection> {
        self.connections.read().values().cloned().collect()
    }
}

// ============================================================================
// Tests
// ============================================================================
