// src/registry.rs

use std::collections::{HashMap, HashSet};

use tokio::sync::mpsc::UnboundedSender;
use uuid::Uuid;

use crate::models::ServerEvent;
use crate::room::RoomKey;

/// A unique identifier for one live realtime connection.
pub type ConnectionId = Uuid;

/// One live connection: its outbound event channel and the room it is
/// currently in, if any. The websocket writer task drains the channel, so
/// pushing an event here never blocks the registry.
#[derive(Debug)]
pub struct Session {
    sender: UnboundedSender<ServerEvent>,
    room: Option<RoomKey>,
}

impl Session {
    pub fn room(&self) -> Option<&RoomKey> {
        self.room.as_ref()
    }
}

/// Tracks live sessions and room membership.
///
/// Maintains both directions: room key -> member set (for broadcast) and
/// session -> room key (for cleanup and re-join). A connection belongs to at
/// most one room at a time; joining a second room leaves the first. This is
/// a hard invariant, not an optimization - it is what prevents duplicate
/// delivery of a broadcast to one connection.
///
/// Rooms are ephemeral and process-local: created lazily on first join,
/// dropped when the last member leaves. History lives in the message store,
/// so discarding an empty room loses nothing.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: HashMap<ConnectionId, Session>,
    rooms: HashMap<RoomKey, HashSet<ConnectionId>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new connection with no room membership. Replaces any
    /// previous registration under the same id.
    pub fn register(&mut self, connection_id: ConnectionId, sender: UnboundedSender<ServerEvent>) {
        self.sessions.insert(
            connection_id,
            Session {
                sender,
                room: None,
            },
        );
    }

    /// Move a connection into `room`, leaving its previous room first.
    /// Returns `false` (a no-op) if the connection is not registered.
    pub fn join(&mut self, connection_id: ConnectionId, room: RoomKey) -> bool {
        if !self.sessions.contains_key(&connection_id) {
            return false;
        }

        self.detach_from_room(connection_id);

        self.rooms
            .entry(room.clone())
            .or_default()
            .insert(connection_id);
        if let Some(session) = self.sessions.get_mut(&connection_id) {
            session.room = Some(room);
        }
        true
    }

    /// Remove a connection entirely: out of its room (if any) and out of the
    /// live-session table. Idempotent; unknown connections are a no-op.
    pub fn remove(&mut self, connection_id: ConnectionId) {
        self.detach_from_room(connection_id);
        self.sessions.remove(&connection_id);
    }

    /// Prune the connection from its current room's member set, dropping the
    /// room if it becomes empty.
    fn detach_from_room(&mut self, connection_id: ConnectionId) {
        let Some(session) = self.sessions.get_mut(&connection_id) else {
            return;
        };
        let Some(room) = session.room.take() else {
            return;
        };
        if let Some(members) = self.rooms.get_mut(&room) {
            members.remove(&connection_id);
            if members.is_empty() {
                self.rooms.remove(&room);
            }
        }
    }

    /// Outbound channel for one connection. `None` if not registered.
    pub fn sender(&self, connection_id: ConnectionId) -> Option<UnboundedSender<ServerEvent>> {
        self.sessions
            .get(&connection_id)
            .map(|s| s.sender.clone())
    }

    /// Snapshot of the outbound channels of every current member of `room`.
    /// Taken under the registry lock, so it cannot interleave with a join or
    /// leave for the same room.
    pub fn members(&self, room: &RoomKey) -> Vec<UnboundedSender<ServerEvent>> {
        self.rooms
            .get(room)
            .into_iter()
            .flat_map(|members| members.iter())
            .filter_map(|id| self.sessions.get(id))
            .map(|s| s.sender.clone())
            .collect()
    }

    /// The room a connection currently belongs to, if any.
    pub fn room_of(&self, connection_id: ConnectionId) -> Option<&RoomKey> {
        self.sessions.get(&connection_id).and_then(Session::room)
    }

    pub fn has_session(&self, connection_id: ConnectionId) -> bool {
        self.sessions.contains_key(&connection_id)
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn room_member_count(&self, room: &RoomKey) -> usize {
        self.rooms.get(room).map_or(0, HashSet::len)
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::mpsc;

    use super::*;
    use crate::room::RoomKey;

    fn session() -> (
        UnboundedSender<ServerEvent>,
        mpsc::UnboundedReceiver<ServerEvent>,
    ) {
        mpsc::unbounded_channel()
    }

    #[test]
    fn register_and_join() {
        let mut registry = SessionRegistry::new();
        let id = Uuid::new_v4();
        let (tx, _rx) = session();
        let room = RoomKey::scoped("C1", "V1", "E1");

        registry.register(id, tx);
        assert!(registry.has_session(id));
        assert!(registry.join(id, room.clone()));

        assert_eq!(registry.room_of(id), Some(&room));
        assert_eq!(registry.room_member_count(&room), 1);
    }

    #[test]
    fn join_unknown_connection_is_noop() {
        let mut registry = SessionRegistry::new();
        let room = RoomKey::scoped("C1", "V1", "E1");

        assert!(!registry.join(Uuid::new_v4(), room.clone()));
        assert_eq!(registry.room_count(), 0);
    }

    #[test]
    fn rejoin_replaces_previous_membership() {
        let mut registry = SessionRegistry::new();
        let id = Uuid::new_v4();
        let (tx, _rx) = session();
        let first = RoomKey::scoped("C1", "V1", "E1");
        let second = RoomKey::scoped("C1", "V1", "E2");

        registry.register(id, tx);
        registry.join(id, first.clone());
        registry.join(id, second.clone());

        // At most one room per connection.
        assert_eq!(registry.room_of(id), Some(&second));
        assert_eq!(registry.room_member_count(&first), 0);
        assert_eq!(registry.room_member_count(&second), 1);
        // The vacated room was dropped.
        assert_eq!(registry.room_count(), 1);
    }

    #[test]
    fn remove_prunes_membership_and_empty_room() {
        let mut registry = SessionRegistry::new();
        let id = Uuid::new_v4();
        let (tx, _rx) = session();
        let room = RoomKey::scoped("C1", "V1", "E1");

        registry.register(id, tx);
        registry.join(id, room.clone());
        registry.remove(id);

        assert!(!registry.has_session(id));
        assert_eq!(registry.room_count(), 0);
    }

    #[test]
    fn remove_is_idempotent_and_leaves_other_rooms_alone() {
        let mut registry = SessionRegistry::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let (tx_a, _rx_a) = session();
        let (tx_b, _rx_b) = session();
        let room_a = RoomKey::scoped("C1", "V1", "E1");
        let room_b = RoomKey::scoped("C2", "V2", "E2");

        registry.register(a, tx_a);
        registry.register(b, tx_b);
        registry.join(a, room_a);
        registry.join(b, room_b.clone());

        registry.remove(a);
        registry.remove(a);
        // Never-joined connections are fine too.
        registry.remove(Uuid::new_v4());

        assert_eq!(registry.room_member_count(&room_b), 1);
        assert_eq!(registry.session_count(), 1);
    }

    #[test]
    fn members_snapshots_only_current_room() {
        let mut registry = SessionRegistry::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let c = Uuid::new_v4();
        let (tx_a, _rx_a) = session();
        let (tx_b, _rx_b) = session();
        let (tx_c, _rx_c) = session();
        let scoped = RoomKey::scoped("C1", "V1", "E1");
        let broad = RoomKey::broad("C1", "V1");

        registry.register(a, tx_a);
        registry.register(b, tx_b);
        registry.register(c, tx_c);
        registry.join(a, scoped.clone());
        registry.join(b, scoped.clone());
        registry.join(c, broad);

        // The broad-mode member is not in the scoped room.
        assert_eq!(registry.members(&scoped).len(), 2);
    }
}
