//! Room store: room id → shared buffer + member set.
//!
//! Rooms are created lazily on first join and deleted the moment their
//! member set empties — a buffer never survives a fully-empty period, so
//! re-joining an emptied room starts from an empty buffer.
//!
//! Like the registry, this is plain data owned by the relay task; all
//! mutation arrives through its serialized event loop.

use std::collections::{HashMap, HashSet};

use crate::registry::ConnId;

struct Room {
    buffer: String,
    members: HashSet<ConnId>,
}

impl Room {
    fn new() -> Self {
        Self {
            buffer: String::new(),
            members: HashSet::new(),
        }
    }
}

/// Maps room identifiers to their current buffer and membership.
#[derive(Default)]
pub struct RoomStore {
    rooms: HashMap<String, Room>,
}

impl RoomStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection to the room, creating the room with an empty
    /// buffer if needed. Returns the buffer snapshot (for the joiner's
    /// initial sync) and the member count after the join (for the
    /// room-wide count broadcast). Re-joining is idempotent.
    pub fn join(&mut self, room_id: &str, id: ConnId) -> (String, usize) {
        let room = self
            .rooms
            .entry(room_id.to_string())
            .or_insert_with(Room::new);
        room.members.insert(id);
        (room.buffer.clone(), room.members.len())
    }

    /// Overwrite the room's buffer. Last write wins; an update for a room
    /// that does not exist is dropped. Returns whether the write landed.
    pub fn update_buffer(&mut self, room_id: &str, code: String) -> bool {
        match self.rooms.get_mut(room_id) {
            Some(room) => {
                room.buffer = code;
                true
            }
            None => false,
        }
    }

    /// Remove a connection from the room's member set, deleting the room
    /// (buffer included) when the set empties. Returns the remaining
    /// member count.
    pub fn leave(&mut self, room_id: &str, id: ConnId) -> usize {
        let Some(room) = self.rooms.get_mut(room_id) else {
            return 0;
        };
        room.members.remove(&id);
        let remaining = room.members.len();
        if remaining == 0 {
            self.rooms.remove(room_id);
        }
        remaining
    }

    /// Whether the connection is currently a member of the room.
    pub fn is_member(&self, room_id: &str, id: ConnId) -> bool {
        self.rooms
            .get(room_id)
            .is_some_and(|r| r.members.contains(&id))
    }

    /// Members of a room, for fan-out. Empty if the room does not exist.
    pub fn members(&self, room_id: &str) -> Vec<ConnId> {
        self.rooms
            .get(room_id)
            .map(|r| r.members.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Current buffer of a room, if it exists.
    pub fn buffer(&self, room_id: &str) -> Option<&str> {
        self.rooms.get(room_id).map(|r| r.buffer.as_str())
    }

    /// Number of live rooms.
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Member count of a room. Zero if the room does not exist.
    pub fn member_count(&self, room_id: &str) -> usize {
        self.rooms.get(room_id).map_or(0, |r| r.members.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_creates_room_with_empty_buffer() {
        let mut store = RoomStore::new();
        let a = ConnId::new();

        let (buffer, count) = store.join("r1", a);
        assert_eq!(buffer, "");
        assert_eq!(count, 1);
        assert_eq!(store.room_count(), 1);
        assert!(store.is_member("r1", a));
    }

    #[test]
    fn test_join_returns_current_buffer() {
        let mut store = RoomStore::new();
        let a = ConnId::new();
        let b = ConnId::new();

        store.join("r1", a);
        store.update_buffer("r1", "X".to_string());

        let (buffer, count) = store.join("r1", b);
        assert_eq!(buffer, "X");
        assert_eq!(count, 2);
    }

    #[test]
    fn test_rejoin_is_idempotent() {
        let mut store = RoomStore::new();
        let a = ConnId::new();

        store.join("r1", a);
        let (_, count) = store.join("r1", a);
        assert_eq!(count, 1);
        assert_eq!(store.member_count("r1"), 1);
    }

    #[test]
    fn test_last_write_wins() {
        let mut store = RoomStore::new();
        store.join("r1", ConnId::new());

        assert!(store.update_buffer("r1", "u1".to_string()));
        assert!(store.update_buffer("r1", "u2".to_string()));
        assert_eq!(store.buffer("r1"), Some("u2"));
    }

    #[test]
    fn test_update_missing_room_is_noop() {
        let mut store = RoomStore::new();
        assert!(!store.update_buffer("ghost", "anything".to_string()));
        assert_eq!(store.room_count(), 0);
    }

    #[test]
    fn test_leave_reports_remaining_members() {
        let mut store = RoomStore::new();
        let a = ConnId::new();
        let b = ConnId::new();
        store.join("r1", a);
        store.join("r1", b);

        assert_eq!(store.leave("r1", a), 1);
        assert!(!store.is_member("r1", a));
        assert!(store.is_member("r1", b));
    }

    #[test]
    fn test_empty_room_is_deleted_with_buffer() {
        let mut store = RoomStore::new();
        let a = ConnId::new();
        store.join("r1", a);
        store.update_buffer("r1", "kept while occupied".to_string());

        assert_eq!(store.leave("r1", a), 0);
        assert_eq!(store.room_count(), 0);
        assert_eq!(store.buffer("r1"), None);

        // A fresh join starts from an empty buffer, not the old content.
        let (buffer, _) = store.join("r1", ConnId::new());
        assert_eq!(buffer, "");
    }

    #[test]
    fn test_leave_missing_room() {
        let mut store = RoomStore::new();
        assert_eq!(store.leave("ghost", ConnId::new()), 0);
    }

    #[test]
    fn test_rooms_are_isolated() {
        let mut store = RoomStore::new();
        let a = ConnId::new();
        let b = ConnId::new();
        store.join("r1", a);
        store.join("r2", b);

        store.update_buffer("r1", "one".to_string());
        store.update_buffer("r2", "two".to_string());

        assert_eq!(store.buffer("r1"), Some("one"));
        assert_eq!(store.buffer("r2"), Some("two"));
        assert!(!store.is_member("r2", a));
    }

    #[test]
    fn test_member_count_never_drifts() {
        let mut store = RoomStore::new();
        let conns: Vec<ConnId> = (0..5).map(|_| ConnId::new()).collect();

        for (i, &id) in conns.iter().enumerate() {
            let (_, count) = store.join("r1", id);
            assert_eq!(count, i + 1);
        }
        for (i, &id) in conns.iter().enumerate() {
            let remaining = store.leave("r1", id);
            assert_eq!(remaining, conns.len() - i - 1);
        }
        assert_eq!(store.room_count(), 0);
    }
}
