use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;

use crate::websockets::{ConnectionHandle, ConnectionId};

/// Opaque, case-sensitive room identifier
pub type RoomCode = String;

/// Display name, unique within one room
pub type Username = String;

/// A username paired with the live connection that claimed it
#[derive(Clone)]
pub struct Member {
    pub username: Username,
    pub connection: Arc<dyn ConnectionHandle>,
}

impl Member {
    pub fn new(username: impl Into<Username>, connection: Arc<dyn ConnectionHandle>) -> Self {
        Self {
            username: username.into(),
            connection,
        }
    }

    pub fn connection_id(&self) -> ConnectionId {
        self.connection.id()
    }
}

impl fmt::Debug for Member {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Member")
            .field("username", &self.username)
            .field("connection_id", &self.connection.id())
            .finish()
    }
}

/// Point-in-time view of a room, safe to hand out without holding its lock
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomSnapshot {
    pub code: RoomCode,
    pub created_at: DateTime<Utc>,
    pub members: Vec<Username>,
}

impl RoomSnapshot {
    pub fn member_count(&self) -> usize {
        self.members.len()
    }
}
