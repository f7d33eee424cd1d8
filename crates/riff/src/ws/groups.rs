//! Group directory: which connections receive which group's events.
//!
//! Kept as a plain synchronous structure; the hub owns it behind a lock so
//! membership changes and broadcast snapshots never interleave.

use std::collections::{HashMap, HashSet};

use super::types::ConnectionId;

#[derive(Debug, Default)]
pub struct GroupDirectory {
    /// Group name -> member connections
    groups: HashMap<String, HashSet<ConnectionId>>,

    /// Connection -> groups it joined (reverse index for disconnect cleanup)
    memberships: HashMap<ConnectionId, HashSet<String>>,
}

impl GroupDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `conn` to `group`. Returns `false` if it was already a member.
    pub fn join(&mut self, conn: ConnectionId, group: &str) -> bool {
        let inserted = self
            .groups
            .entry(group.to_string())
            .or_default()
            .insert(conn);
        if inserted {
            self.memberships
                .entry(conn)
                .or_default()
                .insert(group.to_string());
        }
        inserted
    }

    /// Remove `conn` from `group`. Returns `false` if it was not a member.
    pub fn leave(&mut self, conn: ConnectionId, group: &str) -> bool {
        let removed = match self.groups.get_mut(group) {
            Some(members) => {
                let removed = members.remove(&conn);
                if members.is_empty() {
                    self.groups.remove(group);
                }
                removed
            }
            None => false,
        };

        if removed {
            if let Some(groups) = self.memberships.get_mut(&conn) {
                groups.remove(group);
                if groups.is_empty() {
                    self.memberships.remove(&conn);
                }
            }
        }
        removed
    }

    /// Drop `conn` from every group. Returns the groups it was in.
    pub fn remove_connection(&mut self, conn: ConnectionId) -> Vec<String> {
        let Some(groups) = self.memberships.remove(&conn) else {
            return Vec::new();
        };

        for group in &groups {
            if let Some(members) = self.groups.get_mut(group) {
                members.remove(&conn);
                if members.is_empty() {
                    self.groups.remove(group);
                }
            }
        }

        let mut groups: Vec<String> = groups.into_iter().collect();
        groups.sort();
        groups
    }

    /// Snapshot of a group's members.
    pub fn members(&self, group: &str) -> Vec<ConnectionId> {
        self.groups
            .get(group)
            .map(|members| members.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn groups_of(&self, conn: ConnectionId) -> Vec<String> {
        let mut groups: Vec<String> = self
            .memberships
            .get(&conn)
            .map(|groups| groups.iter().cloned().collect())
            .unwrap_or_default();
        groups.sort();
        groups
    }

    pub fn is_member(&self, conn: ConnectionId, group: &str) -> bool {
        self.groups
            .get(group)
            .is_some_and(|members| members.contains(&conn))
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }
}
