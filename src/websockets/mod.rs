// Public API
pub use connection::{
    ChannelConnection, ConnectionError, ConnectionHandle, ConnectionId, EncodedEvent,
    OutboundFrame,
};
pub use handler::{room_websocket_handler, websocket_handler, ConnectParams, ImplicitJoin};
pub use messages::{ClientEvent, ServerEvent};
pub use router::{
    validate_username, Association, ConnectionSession, EventRouter, RouterError,
    DEFAULT_LANGUAGE,
};
pub use socket::{Connection, SocketError, SocketWrapper};

// Internal modules
mod connection;
mod handler;
mod messages;
mod router;
mod socket;
