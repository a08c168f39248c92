use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

use super::messages::ServerEvent;

/// Identity of one live client connection
pub type ConnectionId = Uuid;

#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("connection is closed")]
    Closed,

    #[error("failed to encode event: {0}")]
    Encode(#[from] serde_json::Error),
}

/// A server event serialized once and shared by every recipient of a broadcast
#[derive(Debug, Clone)]
pub struct EncodedEvent {
    event: Arc<ServerEvent>,
    text: Arc<str>,
}

impl EncodedEvent {
    pub fn encode(event: ServerEvent) -> Result<Self, ConnectionError> {
        let text = serde_json::to_string(&event)?;
        Ok(Self {
            event: Arc::new(event),
            text: text.into(),
        })
    }

    pub fn event(&self) -> &ServerEvent {
        &self.event
    }

    pub fn text(&self) -> &Arc<str> {
        &self.text
    }
}

/// One live bidirectional channel to a client
///
/// Rooms only ever talk to clients through this trait, so the fan-out logic
/// can be exercised without a real socket.
pub trait ConnectionHandle: Send + Sync {
    fn id(&self) -> ConnectionId;

    /// Queue an already encoded event for delivery. Must not block.
    fn send_encoded(&self, event: &EncodedEvent) -> Result<(), ConnectionError>;

    /// Encode and queue a single event
    fn send(&self, event: &ServerEvent) -> Result<(), ConnectionError> {
        self.send_encoded(&EncodedEvent::encode(event.clone())?)
    }

    /// Ask the socket task to close the connection
    fn close(&self);

    fn is_alive(&self) -> bool;
}

/// Frames handed from the relay to the socket task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundFrame {
    Text(Arc<str>),
    Close,
}

/// Connection handle backed by an unbounded channel drained by the socket task
#[derive(Debug)]
pub struct ChannelConnection {
    id: ConnectionId,
    sender: mpsc::UnboundedSender<OutboundFrame>,
}

impl ChannelConnection {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<OutboundFrame>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let connection = Self {
            id: Uuid::new_v4(),
            sender,
        };
        (connection, receiver)
    }
}

impl ConnectionHandle for ChannelConnection {
    fn id(&self) -> ConnectionId {
        self.id
    }

    fn send_encoded(&self, event: &EncodedEvent) -> Result<(), ConnectionError> {
        self.sender
            .send(OutboundFrame::Text(Arc::clone(event.text())))
            .map_err(|_| ConnectionError::Closed)
    }

    fn close(&self) {
        if self.sender.send(OutboundFrame::Close).is_err() {
            debug!(connection_id = %self.id, "Close requested on finished connection");
        }
    }

    fn is_alive(&self) -> bool {
        !self.sender.is_closed()
    }
}
