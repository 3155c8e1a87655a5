//! userId -> live connection id registry, last-connect-wins.

use dashmap::DashMap;

/// Tracks the single active connection per user.
///
/// `register` overwrites any previous entry so a reconnect immediately owns
/// the user's presence. `unregister` only removes the entry when the stored
/// connection id still matches the disconnecting one; a close event from a
/// connection that has already been superseded must not evict its successor.
#[derive(Default)]
pub struct PresenceRegistry {
    entries: DashMap<String, String>,
}

impl PresenceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `conn_id` as the user's current connection. Last connect wins.
    pub fn register(&self, user_id: &str, conn_id: &str) {
        self.entries
            .insert(user_id.to_string(), conn_id.to_string());
    }

    /// Remove the entry iff `conn_id` is still the stored connection.
    /// Returns whether anything was removed.
    pub fn unregister(&self, user_id: &str, conn_id: &str) -> bool {
        if let dashmap::mapref::entry::Entry::Occupied(entry) =
            self.entries.entry(user_id.to_string())
        {
            if entry.get() == conn_id {
                entry.remove();
                return true;
            }
        }
        false
    }

    /// Current connection id for a user, if online.
    pub fn conn_of(&self, user_id: &str) -> Option<String> {
        self.entries.get(user_id).map(|c| c.clone())
    }

    /// All currently-online user ids.
    pub fn roster(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.key().clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_connect_wins() {
        let presence = PresenceRegistry::new();
        presence.register("u1", "conn-old");
        presence.register("u1", "conn-new");

        assert_eq!(presence.conn_of("u1").as_deref(), Some("conn-new"));
        assert_eq!(presence.roster(), vec!["u1".to_string()]);
    }

    #[test]
    fn stale_disconnect_does_not_evict_successor() {
        let presence = PresenceRegistry::new();
        presence.register("u1", "conn-old");
        presence.register("u1", "conn-new");

        // The old connection's close event fires after the reconnect.
        assert!(!presence.unregister("u1", "conn-old"));
        assert_eq!(presence.conn_of("u1").as_deref(), Some("conn-new"));

        assert!(presence.unregister("u1", "conn-new"));
        assert!(presence.conn_of("u1").is_none());
        assert!(presence.roster().is_empty());
    }

    #[test]
    fn roster_tracks_any_interleaving() {
        let presence = PresenceRegistry::new();

        // connect c1, reconnect c2, stale close c1, close c2
        presence.register("u1", "c1");
        presence.register("u1", "c2");
        presence.unregister("u1", "c1");
        assert!(presence.roster().contains(&"u1".to_string()));

        presence.unregister("u1", "c2");
        assert!(!presence.roster().contains(&"u1".to_string()));
    }
}
