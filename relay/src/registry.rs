//! Connection registry: live connections and their room membership.
//!
//! Every live connection holds exactly zero or one room. The registry is
//! owned by the relay task and mutated only from its event loop, so no
//! locking is needed here.

use std::collections::HashMap;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::protocol::ServerEvent;

/// Opaque identifier for one client session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnId(Uuid);

impl ConnId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// One registered connection: its outbound queue and current room.
struct Connection {
    outbound: mpsc::Sender<ServerEvent>,
    room: Option<String>,
}

/// Tracks live connections and which room each belongs to.
#[derive(Default)]
pub struct ConnectionRegistry {
    connections: HashMap<ConnId, Connection>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a newly established connection with no room membership.
    pub fn register(&mut self, id: ConnId, outbound: mpsc::Sender<ServerEvent>) {
        self.connections.insert(
            id,
            Connection {
                outbound,
                room: None,
            },
        );
    }

    /// Record that the connection now belongs to `room_id`, returning any
    /// prior membership so the caller can clear it from the old room's
    /// member set within the same event turn.
    pub fn set_room(&mut self, id: ConnId, room_id: &str) -> Option<String> {
        let conn = self.connections.get_mut(&id)?;
        conn.room.replace(room_id.to_string())
    }

    /// Remove the connection entirely, returning its prior room membership.
    pub fn unregister(&mut self, id: ConnId) -> Option<String> {
        self.connections.remove(&id).and_then(|c| c.room)
    }

    /// Outbound queue handle for a connection, if it is still live.
    pub fn sender(&self, id: ConnId) -> Option<&mpsc::Sender<ServerEvent>> {
        self.connections.get(&id).map(|c| &c.outbound)
    }

    /// Room the connection currently belongs to.
    pub fn room_of(&self, id: ConnId) -> Option<&str> {
        self.connections.get(&id).and_then(|c| c.room.as_deref())
    }

    /// Number of live connections.
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel() -> mpsc::Sender<ServerEvent> {
        let (tx, _rx) = mpsc::channel(8);
        tx
    }

    #[test]
    fn test_register_starts_roomless() {
        let mut registry = ConnectionRegistry::new();
        let id = ConnId::new();
        registry.register(id, channel());

        assert_eq!(registry.len(), 1);
        assert!(registry.room_of(id).is_none());
        assert!(registry.sender(id).is_some());
    }

    #[test]
    fn test_set_room_returns_prior_membership() {
        let mut registry = ConnectionRegistry::new();
        let id = ConnId::new();
        registry.register(id, channel());

        assert_eq!(registry.set_room(id, "alpha"), None);
        assert_eq!(registry.room_of(id), Some("alpha"));

        // Switching rooms hands back the old one.
        assert_eq!(registry.set_room(id, "beta"), Some("alpha".to_string()));
        assert_eq!(registry.room_of(id), Some("beta"));
    }

    #[test]
    fn test_set_room_unknown_connection() {
        let mut registry = ConnectionRegistry::new();
        assert_eq!(registry.set_room(ConnId::new(), "alpha"), None);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_unregister_returns_room() {
        let mut registry = ConnectionRegistry::new();
        let id = ConnId::new();
        registry.register(id, channel());
        registry.set_room(id, "alpha");

        assert_eq!(registry.unregister(id), Some("alpha".to_string()));
        assert!(registry.is_empty());
        assert!(registry.sender(id).is_none());
    }

    #[test]
    fn test_unregister_roomless_connection() {
        let mut registry = ConnectionRegistry::new();
        let id = ConnId::new();
        registry.register(id, channel());

        assert_eq!(registry.unregister(id), None);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_conn_ids_unique() {
        assert_ne!(ConnId::new(), ConnId::new());
    }
}
