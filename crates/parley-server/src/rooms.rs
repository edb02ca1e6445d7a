//! Room membership: which connections are listening to which rooms.
//!
//! Maintains bidirectional mappings - room → connections (for broadcast) and
//! connection → rooms (for teardown on disconnect) - so both lookups are
//! O(1). Rooms are created lazily on first join and garbage-collected when
//! their last member leaves; a room carries no state beyond its membership.
//!
//! Decoupling rooms from users is what lets one user's tabs each receive a
//! conversation's events independently: every tab is its own connection that
//! joins the room on its own.

use std::collections::{HashMap, HashSet};

use parley_proto::{ConnectionId, RoomKey};

/// Tracks room membership for all live connections.
#[derive(Debug, Default)]
pub struct RoomMembership {
    /// Room → set of member connection IDs.
    rooms: HashMap<RoomKey, HashSet<ConnectionId>>,
    /// Connection → set of joined rooms.
    connection_rooms: HashMap<ConnectionId, HashSet<RoomKey>>,
}

impl RoomMembership {
    /// Create a new empty membership table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection to a room, creating the room entry lazily.
    ///
    /// Idempotent: joining a room twice leaves membership unchanged and
    /// returns `false` (set semantics, so a double join can never cause
    /// duplicate delivery of one broadcast).
    pub fn join(&mut self, connection_id: ConnectionId, room: RoomKey) -> bool {
        let newly_in_room = self.rooms.entry(room.clone()).or_default().insert(connection_id);
        self.connection_rooms.entry(connection_id).or_default().insert(room);
        newly_in_room
    }

    /// Remove a connection from a room.
    ///
    /// Returns `true` if the connection was a member. Empty rooms are
    /// garbage-collected.
    pub fn leave(&mut self, connection_id: ConnectionId, room: &RoomKey) -> bool {
        let removed = self.rooms.get_mut(room).is_some_and(|set| set.remove(&connection_id));

        if self.rooms.get(room).is_some_and(HashSet::is_empty) {
            self.rooms.remove(room);
        }
        if let Some(set) = self.connection_rooms.get_mut(&connection_id) {
            set.remove(room);
            if set.is_empty() {
                self.connection_rooms.remove(&connection_id);
            }
        }

        removed
    }

    /// Remove a connection from every room it joined.
    ///
    /// Called synchronously with connection teardown so no room ever retains
    /// a reference to a dead connection. Returns the rooms it was in.
    pub fn remove_connection(&mut self, connection_id: ConnectionId) -> HashSet<RoomKey> {
        let rooms = self.connection_rooms.remove(&connection_id).unwrap_or_default();

        for room in &rooms {
            if let Some(members) = self.rooms.get_mut(room) {
                members.remove(&connection_id);
                if members.is_empty() {
                    self.rooms.remove(room);
                }
            }
        }

        rooms
    }

    /// Whether a connection is a member of a room.
    #[must_use]
    pub fn is_member(&self, connection_id: ConnectionId, room: &RoomKey) -> bool {
        self.rooms.get(room).is_some_and(|set| set.contains(&connection_id))
    }

    /// All connections currently in a room.
    pub fn members(&self, room: &RoomKey) -> impl Iterator<Item = ConnectionId> + '_ {
        self.rooms.get(room).into_iter().flat_map(|set| set.iter().copied())
    }

    /// All rooms a connection has joined.
    pub fn rooms_of(&self, connection_id: ConnectionId) -> impl Iterator<Item = &RoomKey> + '_ {
        self.connection_rooms.get(&connection_id).into_iter().flatten()
    }

    /// Number of members in a room.
    #[must_use]
    pub fn member_count(&self, room: &RoomKey) -> usize {
        self.rooms.get(room).map_or(0, HashSet::len)
    }

    /// Number of rooms with at least one member.
    #[must_use]
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}
