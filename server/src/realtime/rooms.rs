//! Connection-scoped broadcast groups: chat rooms and personal channels.
//!
//! Membership is a set of connection ids, rebuilt per connection. Nothing here
//! is persisted and nothing is restored on reconnect; clients re-issue `join`.

use dashmap::DashMap;
use std::collections::HashSet;

#[derive(Default)]
pub struct RoomRouter {
    rooms: DashMap<String, HashSet<String>>,
    personal: DashMap<String, HashSet<String>>,
}

impl RoomRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection to a chat room. Membership validation happens in the
    /// gateway before this is called.
    pub fn join(&self, conn_id: &str, chat_id: &str) {
        self.rooms
            .entry(chat_id.to_string())
            .or_default()
            .insert(conn_id.to_string());
    }

    /// Unconditional removal, idempotent.
    pub fn leave(&self, conn_id: &str, chat_id: &str) {
        if let Some(mut members) = self.rooms.get_mut(chat_id) {
            members.remove(conn_id);
        }
    }

    pub fn members(&self, chat_id: &str) -> Vec<String> {
        self.rooms
            .get(chat_id)
            .map(|m| m.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Subscribe a connection to its user's personal channel.
    pub fn join_personal(&self, user_id: &str, conn_id: &str) {
        self.personal
            .entry(user_id.to_string())
            .or_default()
            .insert(conn_id.to_string());
    }

    pub fn leave_personal(&self, user_id: &str, conn_id: &str) {
        if let dashmap::mapref::entry::Entry::Occupied(mut entry) =
            self.personal.entry(user_id.to_string())
        {
            entry.get_mut().remove(conn_id);
            if entry.get().is_empty() {
                entry.remove();
            }
        }
    }

    pub fn personal_members(&self, user_id: &str) -> Vec<String> {
        self.personal
            .get(user_id)
            .map(|m| m.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Strip a closing connection from every room it joined.
    pub fn drop_connection(&self, conn_id: &str) {
        self.rooms.retain(|_, members| {
            members.remove(conn_id);
            !members.is_empty()
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_and_leave_are_idempotent() {
        let rooms = RoomRouter::new();
        rooms.join("conn1", "c1");
        rooms.join("conn1", "c1");
        assert_eq!(rooms.members("c1"), vec!["conn1".to_string()]);

        rooms.leave("conn1", "c1");
        rooms.leave("conn1", "c1");
        assert!(rooms.members("c1").is_empty());
        // Leaving a room that never existed is fine too.
        rooms.leave("conn1", "nope");
    }

    #[test]
    fn drop_connection_clears_all_rooms() {
        let rooms = RoomRouter::new();
        rooms.join("conn1", "c1");
        rooms.join("conn1", "c2");
        rooms.join("conn2", "c1");

        rooms.drop_connection("conn1");
        assert_eq!(rooms.members("c1"), vec!["conn2".to_string()]);
        assert!(rooms.members("c2").is_empty());
    }

    #[test]
    fn personal_channel_tracks_multiple_connections() {
        let rooms = RoomRouter::new();
        rooms.join_personal("u1", "conn1");
        rooms.join_personal("u1", "conn2");

        let mut members = rooms.personal_members("u1");
        members.sort();
        assert_eq!(members, vec!["conn1".to_string(), "conn2".to_string()]);

        rooms.leave_personal("u1", "conn1");
        rooms.leave_personal("u1", "conn2");
        assert!(rooms.personal_members("u1").is_empty());
    }
}
