use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, instrument};

use super::models::{RoomCode, RoomSnapshot};
use super::state::{JoinOutcome, RemoveOutcome, Room};
use crate::websockets::{ConnectionHandle, ConnectionId};

/// Process-wide table of live rooms
///
/// Rooms are created lazily on first join and removed as soon as they are
/// empty. Lock order is always registry, then room.
#[derive(Default)]
pub struct RoomRegistry {
    rooms: Mutex<HashMap<RoomCode, Arc<Room>>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn rooms(&self) -> MutexGuard<'_, HashMap<RoomCode, Arc<Room>>> {
        self.rooms.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the room for `code`, creating an empty one if needed
    #[instrument(skip(self))]
    pub fn get_or_create(&self, code: &str) -> Arc<Room> {
        let mut rooms = self.rooms();
        rooms
            .entry(code.to_string())
            .or_insert_with(|| {
                info!(room_code = %code, "Creating room");
                Arc::new(Room::new(code))
            })
            .clone()
    }

    pub fn get_if_exists(&self, code: &str) -> Option<Arc<Room>> {
        self.rooms().get(code).cloned()
    }

    /// Deletes the room only if it has no members at this instant
    ///
    /// The room is retired under both locks, so a caller still holding the
    /// old `Arc<Room>` cannot join it afterwards.
    #[instrument(skip(self))]
    pub fn delete_if_empty(&self, code: &str) -> bool {
        let mut rooms = self.rooms();
        let Some(room) = rooms.get(code) else {
            return false;
        };

        if room.retire_if_empty() {
            rooms.remove(code);
            info!(room_code = %code, "Room is empty and has been deleted");
            true
        } else {
            debug!(room_code = %code, "Room gained members before deletion, keeping it");
            false
        }
    }

    /// Joins `username` to the room for `code`, creating the room if needed
    pub fn join(
        &self,
        code: &str,
        username: &str,
        connection: Arc<dyn ConnectionHandle>,
    ) -> JoinOutcome {
        loop {
            let room = self.get_or_create(code);
            match room.join(username, Arc::clone(&connection)) {
                Ok(outcome) => return outcome,
                Err(retired) => {
                    debug!(error = %retired, "Room deleted mid-join, retrying");
                }
            }
        }
    }

    /// Removes `username` from the room and prunes the room if it emptied
    pub fn leave(&self, code: &str, username: &str) -> RemoveOutcome {
        let Some(room) = self.get_if_exists(code) else {
            debug!(room_code = %code, username = %username, "Leave for unknown room");
            return RemoveOutcome::NotPresent;
        };
        let outcome = room.leave(username);
        self.prune(code, &outcome);
        outcome
    }

    /// Removes whichever member owns `connection_id` and prunes the room if it emptied
    pub fn remove_connection(&self, code: &str, connection_id: ConnectionId) -> RemoveOutcome {
        let Some(room) = self.get_if_exists(code) else {
            return RemoveOutcome::NotPresent;
        };
        let outcome = room.remove_connection(connection_id);
        self.prune(code, &outcome);
        outcome
    }

    /// Removes `username` only if `connection_id` still holds it, pruning the room if it emptied
    pub fn remove_member(
        &self,
        code: &str,
        username: &str,
        connection_id: ConnectionId,
    ) -> RemoveOutcome {
        let Some(room) = self.get_if_exists(code) else {
            return RemoveOutcome::NotPresent;
        };
        let outcome = room.remove_member(username, connection_id);
        self.prune(code, &outcome);
        outcome
    }

    fn prune(&self, code: &str, outcome: &RemoveOutcome) {
        if let RemoveOutcome::Removed {
            became_empty: true, ..
        } = outcome
        {
            self.delete_if_empty(code);
        }
    }

    pub fn list(&self) -> Vec<RoomSnapshot> {
        let rooms: Vec<Arc<Room>> = self.rooms().values().cloned().collect();
        let mut snapshots: Vec<RoomSnapshot> = rooms.iter().map(|room| room.snapshot()).collect();
        snapshots.sort_by(|a, b| a.code.cmp(&b.code));
        snapshots
    }

    pub fn len(&self) -> usize {
        self.rooms().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::test_utils::RecordingConnection;
    use crate::websockets::ServerEvent;

    #[test]
    fn test_get_or_create_returns_same_room() {
        let registry = RoomRegistry::new();

        let first = registry.get_or_create("R1");
        let second = registry.get_or_create("R1");

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_room_codes_are_case_sensitive() {
        let registry = RoomRegistry::new();
        registry.join("room", "alice", RecordingConnection::new());
        registry.join("ROOM", "alice", RecordingConnection::new());

        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_get_if_exists_does_not_create() {
        let registry = RoomRegistry::new();
        assert!(registry.get_if_exists("R1").is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_last_leave_deletes_room() {
        let registry = RoomRegistry::new();
        registry.join("R1", "alice", RecordingConnection::new());

        let outcome = registry.leave("R1", "alice");

        assert_eq!(
            outcome,
            RemoveOutcome::Removed {
                username: "alice".into(),
                became_empty: true
            }
        );
        assert!(registry.get_if_exists("R1").is_none());
    }

    #[test]
    fn test_delete_if_empty_skips_occupied_room() {
        let registry = RoomRegistry::new();
        registry.join("R1", "alice", RecordingConnection::new());

        assert!(!registry.delete_if_empty("R1"));
        assert!(registry.get_if_exists("R1").is_some());
        assert!(!registry.delete_if_empty("missing"));
    }

    #[test]
    fn test_rejoin_after_deletion_gets_fresh_room() {
        let registry = RoomRegistry::new();
        registry.join("R1", "alice", RecordingConnection::new());
        let old_room = registry.get_if_exists("R1").unwrap();
        registry.leave("R1", "alice");

        let bob = RecordingConnection::new();
        assert_eq!(registry.join("R1", "bob", bob.clone()), JoinOutcome::Joined);

        let new_room = registry.get_if_exists("R1").unwrap();
        assert!(!Arc::ptr_eq(&old_room, &new_room));
        assert!(old_room.is_retired());
        assert_eq!(new_room.usernames(), vec!["bob"]);
        assert!(bob.events().is_empty());
    }

    #[test]
    fn test_join_retries_when_room_retired_underneath() {
        let registry = RoomRegistry::new();
        let stale = registry.get_or_create("R1");
        assert!(registry.delete_if_empty("R1"));

        assert!(stale.join("alice", RecordingConnection::new()).is_err());
        assert_eq!(
            registry.join("R1", "alice", RecordingConnection::new()),
            JoinOutcome::Joined
        );
        assert_eq!(registry.get_if_exists("R1").unwrap().usernames(), vec!["alice"]);
    }

    #[test]
    fn test_remove_connection_notifies_and_prunes() {
        let registry = RoomRegistry::new();
        let alice = RecordingConnection::new();
        let bob = RecordingConnection::new();
        registry.join("R1", "alice", alice.clone());
        registry.join("R1", "bob", bob.clone());
        alice.clear();

        registry.remove_connection("R1", bob.id());
        assert_eq!(alice.events(), vec![ServerEvent::user_left("bob")]);
        assert_eq!(registry.get_if_exists("R1").unwrap().len(), 1);

        registry.remove_connection("R1", alice.id());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_remove_member_ignores_name_reused_by_other_connection() {
        let registry = RoomRegistry::new();
        let old_alice = RecordingConnection::new();
        let new_alice = RecordingConnection::new();
        registry.join("R1", "alice", old_alice.clone());
        registry.leave("R1", "alice");
        registry.join("R1", "alice", new_alice.clone());

        assert_eq!(
            registry.remove_member("R1", "alice", old_alice.id()),
            RemoveOutcome::NotPresent
        );
        assert_eq!(registry.get_if_exists("R1").unwrap().usernames(), vec!["alice"]);

        registry.remove_member("R1", "alice", new_alice.id());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_list_returns_sorted_snapshots() {
        let registry = RoomRegistry::new();
        registry.join("beta", "bob", RecordingConnection::new());
        registry.join("alpha", "alice", RecordingConnection::new());
        registry.join("alpha", "carol", RecordingConnection::new());

        let rooms = registry.list();

        assert_eq!(rooms.len(), 2);
        assert_eq!(rooms[0].code, "alpha");
        assert_eq!(rooms[0].members, vec!["alice", "carol"]);
        assert_eq!(rooms[1].code, "beta");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_joins_are_not_lost() {
        let registry = Arc::new(RoomRegistry::new());
        let mut handles = Vec::new();

        for i in 0..64 {
            let registry = Arc::clone(&registry);
            handles.push(tokio::spawn(async move {
                registry.join("R1", &format!("user-{}", i), RecordingConnection::new())
            }));
        }
        for handle in handles {
            assert_eq!(handle.await.unwrap(), JoinOutcome::Joined);
        }

        let room = registry.get_if_exists("R1").unwrap();
        assert_eq!(room.len(), 64);
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_join_and_leave_keep_registry_consistent() {
        let registry = Arc::new(RoomRegistry::new());
        let mut handles = Vec::new();

        for i in 0..32 {
            let registry = Arc::clone(&registry);
            handles.push(tokio::spawn(async move {
                let name = format!("user-{}", i);
                for _ in 0..20 {
                    registry.join("R1", &name, RecordingConnection::new());
                    registry.leave("R1", &name);
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert!(registry.get_if_exists("R1").is_none());
        assert!(registry.is_empty());
    }
}
