use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::models::RoomSnapshot;

/// Response for room inspection endpoints
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomResponse {
    pub code: String,
    pub member_count: usize,
    pub members: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl From<RoomSnapshot> for RoomResponse {
    fn from(snapshot: RoomSnapshot) -> Self {
        Self {
            member_count: snapshot.member_count(),
            code: snapshot.code,
            members: snapshot.members,
            created_at: snapshot.created_at,
        }
    }
}

/// Response for the health endpoint
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub rooms: usize,
}
