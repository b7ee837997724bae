//! Runtime index of room membership.
//!
//! Rooms are addressing groups for broadcast fan-out, keyed by conversation
//! id (or a per-user name for notification rooms). Purely in-memory; a
//! membership never outlives its connection.

use std::collections::{HashMap, HashSet};

use crate::connection::ConnectionId;

/// Deterministic name of a user's private notification room.
pub fn user_room(user_id: &str) -> String {
    format!("user:{user_id}")
}

#[derive(Debug, Default)]
pub struct RoomRegistry {
    rooms: HashMap<String, HashSet<ConnectionId>>,
    joined: HashMap<ConnectionId, HashSet<String>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection to a room. Returns false if it was already a member.
    pub fn join(&mut self, connection: ConnectionId, room: &str) -> bool {
        let newly_joined = self
            .rooms
            .entry(room.to_string())
            .or_default()
            .insert(connection);

        if newly_joined {
            self.joined
                .entry(connection)
                .or_default()
                .insert(room.to_string());
        }

        newly_joined
    }

    /// Remove a connection from a room. Absence is not an error.
    pub fn leave(&mut self, connection: ConnectionId, room: &str) -> bool {
        let removed = match self.rooms.get_mut(room) {
            Some(members) => {
                let removed = members.remove(&connection);
                if members.is_empty() {
                    self.rooms.remove(room);
                }
                removed
            }
            None => false,
        };

        if removed {
            if let Some(rooms) = self.joined.get_mut(&connection) {
                rooms.remove(room);
                if rooms.is_empty() {
                    self.joined.remove(&connection);
                }
            }
        }

        removed
    }

    /// Remove a connection from every room it joined. Returns the rooms it
    /// was removed from.
    pub fn drop_connection(&mut self, connection: ConnectionId) -> Vec<String> {
        let Some(rooms) = self.joined.remove(&connection) else {
            return Vec::new();
        };

        let mut left = Vec::with_capacity(rooms.len());
        for room in rooms {
            if let Some(members) = self.rooms.get_mut(&room) {
                members.remove(&connection);
                if members.is_empty() {
                    self.rooms.remove(&room);
                }
            }
            left.push(room);
        }

        left
    }

    pub fn members(&self, room: &str) -> Vec<ConnectionId> {
        self.rooms
            .get(room)
            .map(|members| members.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn rooms_of(&self, connection: ConnectionId) -> Vec<String> {
        self.joined
            .get(&connection)
            .map(|rooms| rooms.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn is_member(&self, connection: ConnectionId, room: &str) -> bool {
        self.rooms
            .get(room)
            .is_some_and(|members| members.contains(&connection))
    }
}
