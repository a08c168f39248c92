// Library crate for the room relay server
// This file exposes the public API for integration tests

pub mod config;
pub mod room;
pub mod shared;
pub mod speech;
pub mod websockets;

// Re-export commonly used types for easier access in tests
pub use config::Config;
pub use room::{JoinOutcome, Member, RemoveOutcome, Room, RoomRegistry, SenderPolicy};
pub use shared::{build_router, AppError, AppState};
pub use speech::{AzureSpeechGateway, SpeechGateway, SynthesisError};
pub use websockets::{
    ChannelConnection, ClientEvent, ConnectionHandle, ConnectionId, ConnectionSession,
    EventRouter, ServerEvent,
};
