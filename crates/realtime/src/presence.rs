//! In-process presence table.
//!
//! One entry per currently-connected user, keyed by user id. Lifetime is the
//! process lifetime; nothing here is persisted. Single-device semantics: a
//! second connection by the same user overwrites the first entry.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::connection::ConnectionId;
use crate::events::{PresenceSnapshot, PresenceStatus, UserSummary};

#[derive(Debug, Clone)]
pub struct PresenceEntry {
    pub connection_id: ConnectionId,
    pub user: UserSummary,
    pub status: PresenceStatus,
    pub last_seen_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct PresenceTable {
    entries: HashMap<String, PresenceEntry>,
}

impl PresenceTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entry for a user, overwriting any prior entry (last writer
    /// wins). Returns the displaced entry, if any.
    pub fn register(&mut self, user: UserSummary, connection_id: ConnectionId) -> Option<PresenceEntry> {
        let user_id = user.id.clone();
        self.entries.insert(
            user_id,
            PresenceEntry {
                connection_id,
                user,
                status: PresenceStatus::default(),
                last_seen_at: Utc::now(),
            },
        )
    }

    /// Update a user's advertised status. Returns false if the user is not
    /// currently online.
    pub fn set_status(&mut self, user_id: &str, status: PresenceStatus) -> bool {
        match self.entries.get_mut(user_id) {
            Some(entry) => {
                entry.status = status;
                entry.last_seen_at = Utc::now();
                true
            }
            None => false,
        }
    }

    /// Remove the entry for a user, but only if the given connection still
    /// owns it. A disconnect racing a fresh login by the same user must not
    /// evict the newer session.
    pub fn remove_owned_by(
        &mut self,
        user_id: &str,
        connection_id: ConnectionId,
    ) -> Option<PresenceEntry> {
        let owned = self
            .entries
            .get(user_id)
            .is_some_and(|entry| entry.connection_id == connection_id);

        if !owned {
            return None;
        }

        self.entries.remove(user_id).map(|mut entry| {
            entry.last_seen_at = Utc::now();
            entry
        })
    }

    pub fn get(&self, user_id: &str) -> Option<&PresenceEntry> {
        self.entries.get(user_id)
    }

    pub fn is_online(&self, user_id: &str) -> bool {
        self.entries.contains_key(user_id)
    }

    pub fn snapshot(&self) -> Vec<PresenceSnapshot> {
        self.entries
            .values()
            .map(|entry| PresenceSnapshot {
                user_id: entry.user.id.clone(),
                name: entry.user.name.clone(),
                avatar: entry.user.avatar.clone(),
                status: entry.status,
                last_seen_at: entry.last_seen_at.to_rfc3339(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
