//! Connection registry: live transport connections and their user identities.
//!
//! The registry is the authoritative map from connections to users. A
//! connection belongs to at most one user; a user may own many connections at
//! once (multi-tab/multi-device), so the reverse index is set-valued. Room
//! membership lives in [`crate::rooms`], not here - the registry only answers
//! "who owns this connection" and "which connections does this user have".
//!
//! All mutating operations are defensive: late or duplicate close signals are
//! no-ops, never errors.

use std::collections::{HashMap, HashSet};

use parley_proto::{ConnectionId, UserId};

/// Information about a registered connection.
#[derive(Debug, Clone, Default)]
pub struct ConnectionInfo {
    /// User identity bound to this connection. `None` until the client sends
    /// `join_user_room`; unauthenticated connections may exist transiently
    /// but cannot join conversation rooms or signal typing.
    pub user_id: Option<UserId>,
}

impl ConnectionInfo {
    /// Create info for a new, unauthenticated connection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

/// Registry tracking live connections and the users that own them.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    /// Connection ID → connection info.
    connections: HashMap<ConnectionId, ConnectionInfo>,
    /// User ID → set of live connection IDs (reverse index).
    user_connections: HashMap<UserId, HashSet<ConnectionId>>,
}

impl ConnectionRegistry {
    /// Create a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new, unauthenticated connection.
    ///
    /// Returns `false` if the connection is already registered.
    pub fn register(&mut self, connection_id: ConnectionId) -> bool {
        if self.connections.contains_key(&connection_id) {
            return false;
        }
        self.connections.insert(connection_id, ConnectionInfo::new());
        true
    }

    /// Bind a connection to a user identity.
    ///
    /// Idempotent per connection: rebinding to the same user is a no-op that
    /// returns `true`. Returns `false` if the connection is unknown or is
    /// already bound to a different user (a connection belongs to at most one
    /// identity for its lifetime).
    pub fn bind_user(&mut self, connection_id: ConnectionId, user_id: &UserId) -> bool {
        let Some(info) = self.connections.get_mut(&connection_id) else {
            return false;
        };

        match &info.user_id {
            Some(existing) if existing == user_id => true,
            Some(_) => false,
            None => {
                info.user_id = Some(user_id.clone());
                self.user_connections.entry(user_id.clone()).or_default().insert(connection_id);
                true
            },
        }
    }

    /// Remove a connection from the registry.
    ///
    /// Returns the connection's info, or `None` if it was already gone
    /// (defensive against duplicate close signals).
    pub fn deregister(&mut self, connection_id: ConnectionId) -> Option<ConnectionInfo> {
        let info = self.connections.remove(&connection_id)?;

        if let Some(user_id) = &info.user_id
            && let Some(set) = self.user_connections.get_mut(user_id)
        {
            set.remove(&connection_id);
            if set.is_empty() {
                self.user_connections.remove(user_id);
            }
        }

        Some(info)
    }

    /// User identity bound to a connection. `None` if unknown or unbound.
    #[must_use]
    pub fn user_of(&self, connection_id: ConnectionId) -> Option<&UserId> {
        self.connections.get(&connection_id).and_then(|info| info.user_id.as_ref())
    }

    /// Whether a connection is registered.
    #[must_use]
    pub fn has_connection(&self, connection_id: ConnectionId) -> bool {
        self.connections.contains_key(&connection_id)
    }

    /// All live connections for a user (every open tab/device).
    pub fn connections_for(&self, user_id: &UserId) -> impl Iterator<Item = ConnectionId> + '_ {
        self.user_connections.get(user_id).into_iter().flat_map(|set| set.iter().copied())
    }

    /// Whether the user has any live connections.
    #[must_use]
    pub fn user_is_connected(&self, user_id: &UserId) -> bool {
        self.user_connections.get(user_id).is_some_and(|set| !set.is_empty())
    }

    /// Total number of registered connections.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conn(id: u64) -> ConnectionId {
        ConnectionId::new(id)
    }

    #[test]
    fn register_and_lookup() {
        let mut registry = ConnectionRegistry::new();

        assert!(registry.register(conn(1)));
        assert!(registry.has_connection(conn(1)));
        assert!(!registry.has_connection(conn(2)));
        assert!(registry.user_of(conn(1)).is_none());
    }

    #[test]
    fn register_duplicate_fails() {
        let mut registry = ConnectionRegistry::new();

        assert!(registry.register(conn(1)));
        assert!(!registry.register(conn(1)));
    }

    #[test]
    fn bind_user_is_idempotent() {
        let mut registry = ConnectionRegistry::new();
        let alice = UserId::from("alice");

        registry.register(conn(1));
        assert!(registry.bind_user(conn(1), &alice));
        assert!(registry.bind_user(conn(1), &alice));

        assert_eq!(registry.user_of(conn(1)), Some(&alice));
        assert_eq!(registry.connections_for(&alice).count(), 1);
    }

    #[test]
    fn bind_to_second_identity_is_refused() {
        let mut registry = ConnectionRegistry::new();

        registry.register(conn(1));
        assert!(registry.bind_user(conn(1), &UserId::from("alice")));
        assert!(!registry.bind_user(conn(1), &UserId::from("bob")));

        assert_eq!(registry.user_of(conn(1)), Some(&UserId::from("alice")));
    }

    #[test]
    fn bind_unknown_connection_fails() {
        let mut registry = ConnectionRegistry::new();
        assert!(!registry.bind_user(conn(99), &UserId::from("alice")));
    }

    #[test]
    fn user_may_own_many_connections() {
        let mut registry = ConnectionRegistry::new();
        let alice = UserId::from("alice");

        registry.register(conn(1));
        registry.register(conn(2));
        registry.register(conn(3));
        registry.bind_user(conn(1), &alice);
        registry.bind_user(conn(2), &alice);
        registry.bind_user(conn(3), &UserId::from("bob"));

        let connections: HashSet<_> = registry.connections_for(&alice).collect();
        assert_eq!(connections, HashSet::from([conn(1), conn(2)]));
    }

    #[test]
    fn deregister_cleans_reverse_index() {
        let mut registry = ConnectionRegistry::new();
        let alice = UserId::from("alice");

        registry.register(conn(1));
        registry.register(conn(2));
        registry.bind_user(conn(1), &alice);
        registry.bind_user(conn(2), &alice);

        let info = registry.deregister(conn(1)).unwrap();
        assert_eq!(info.user_id, Some(alice.clone()));
        assert_eq!(registry.connections_for(&alice).count(), 1);
        assert!(registry.user_is_connected(&alice));

        registry.deregister(conn(2));
        assert!(!registry.user_is_connected(&alice));
    }

    #[test]
    fn deregister_is_defensive_against_duplicates() {
        let mut registry = ConnectionRegistry::new();

        registry.register(conn(1));
        assert!(registry.deregister(conn(1)).is_some());
        assert!(registry.deregister(conn(1)).is_none());
        assert!(registry.deregister(conn(42)).is_none());
    }

    #[test]
    fn connection_count() {
        let mut registry = ConnectionRegistry::new();

        assert_eq!(registry.connection_count(), 0);
        registry.register(conn(1));
        registry.register(conn(2));
        assert_eq!(registry.connection_count(), 2);
        registry.deregister(conn(1));
        assert_eq!(registry.connection_count(), 1);
    }
}
