// Public API - what other modules can use
pub use handlers::{get_room, health, list_rooms};
pub use models::{Member, RoomCode, RoomSnapshot, Username};
pub use registry::RoomRegistry;
pub use state::{JoinOutcome, RemoveOutcome, Room, RoomRetired, SenderPolicy};
pub use types::{HealthResponse, RoomResponse};

// Internal modules
mod handlers;
mod models;
mod registry;
mod state;
mod types;
