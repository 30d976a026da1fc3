//! Client ID to connection bindings.
//!
//! The connect handler binds a client ID when CONNECT succeeds; a newer
//! link for the same ID replaces the older binding. Teardown removes the
//! binding only if it still points at the link being torn down, so a slow
//! teardown of a superseded link cannot evict its replacement.

// ============================================================================
// Imports
// ============================================================================

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use tracing::debug;

use crate::identifiers::{ClientId, ConnectionId};

use super::Connection;

// ============================================================================
// ClientBindings
// ============================================================================

/// Concurrent map from [`ClientId`] to the link currently representing it.
#[derive(Default)]
pub struct ClientBindings {
    bindings: RwLock<FxHashMap<ClientId, Connection>>,
}

impl ClientBindings {
    /// Creates an empty table.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds a client ID to a connection, newest wins.
    ///
    /// Returns the connection previously bound to this ID when it was a
    /// different link; the caller decides whether to close it.
    pub fn bind(&self, client_id: ClientId, connection: &Connection) -> Option<Connection> {
        let previous = self
            .bindings
            .write()
            .insert(client_id.clone(), connection.clone());

        debug!(
            client_id = %client_id,
            connection_id = %connection.id(),
            replaced = ?previous.as_ref().map(Connection::id),
            "Client bound"
        );

        previous.filter(|old| old.id() != connection.id())
    }

    /// Removes the binding for `client_id` if it points at `connection_id`.
    ///
    /// Returns `true` if a binding was removed.
    pub fn unbind_if(&self, client_id: &ClientId, connection_id: ConnectionId) -> bool {
        let mut bindings = self.bindings.write();

        let matches = bindings
            .get(client_id)
            .is_some_and(|bound| bound.id() == connection_id);

        if matches {
            bindings.remove(client_id);
        }
        drop(bindings);

        if matches {
            debug!(client_id = %client_id, connection_id = %connection_id, "Client unbound");
        } else {
            debug!(
                client_id = %client_id,
                connection_id = %connection_id,
                "Binding owned by another connection, kept"
            );
        }
        matches
    }

    /// Returns the connection bound to a client ID.
    #[must_use]
    pub fn get(&self, client_id: &ClientId) -> Option<Connection> {
        self.bindings.read().get(client_id).cloned()
    }

    /// Returns `true` if the client ID is bound.
    #[inline]
    #[must_use]
    pub fn contains(&self, client_id: &ClientId) -> bool {
        self.bindings.read().contains_key(client_id)
    }

    /// Returns the number of bindings.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.bindings.read().len()
    }

    /// Returns `true` if nothing is bound.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bindings.read().is_empty()
    }
}

// ============================================================================
// Tests
// ============================================================================
