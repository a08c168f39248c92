use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use futures::stream::StreamExt;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::debug;

use super::connection::OutboundFrame;
use super::router::ConnectionSession;

/// Simple WebSocket abstraction - all we care about is send/receive
#[async_trait]
pub trait SocketWrapper: Send {
    /// Send a text message to the client
    async fn send_message(&mut self, message: String) -> Result<(), SocketError>;

    /// Receive the next text message from the client (None if connection closed)
    async fn receive_message(&mut self) -> Result<Option<String>, SocketError>;

    /// Close the connection
    async fn close(&mut self) -> Result<(), SocketError>;
}

#[derive(Debug, Error)]
pub enum SocketError {
    #[error("send failed: {0}")]
    SendFailed(String),

    #[error("receive failed: {0}")]
    ReceiveFailed(String),
}

/// Direct implementation on axum's WebSocket
#[async_trait]
impl SocketWrapper for WebSocket {
    async fn send_message(&mut self, message: String) -> Result<(), SocketError> {
        self.send(Message::Text(message))
            .await
            .map_err(|e| SocketError::SendFailed(e.to_string()))
    }

    async fn receive_message(&mut self) -> Result<Option<String>, SocketError> {
        loop {
            match self.next().await {
                Some(Ok(Message::Text(text))) => return Ok(Some(text)),
                Some(Ok(Message::Close(_))) | None => return Ok(None),
                // Ping/pong are answered by axum; binary frames carry nothing we route
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(SocketError::ReceiveFailed(e.to_string())),
            }
        }
    }

    async fn close(&mut self) -> Result<(), SocketError> {
        self.send(Message::Close(None))
            .await
            .map_err(|e| SocketError::SendFailed(e.to_string()))
    }
}

/// Connection represents a managed WebSocket connection
/// It pumps frames queued by rooms out to the client and feeds inbound
/// frames to the session, one at a time.
pub struct Connection {
    socket: Box<dyn SocketWrapper>,
    outbound_receiver: mpsc::UnboundedReceiver<OutboundFrame>,
    session: ConnectionSession,
}

impl Connection {
    pub fn new(
        socket: Box<dyn SocketWrapper>,
        outbound_receiver: mpsc::UnboundedReceiver<OutboundFrame>,
        session: ConnectionSession,
    ) -> Self {
        Self {
            socket,
            outbound_receiver,
            session,
        }
    }

    /// Run the connection - handles both sending and receiving until disconnect
    ///
    /// Session cleanup runs on every exit: here on normal and error returns,
    /// and through the session's `Drop` if this future is cancelled.
    pub async fn run(mut self) -> Result<(), SocketError> {
        let result = self.pump().await;
        self.session.disconnect();

        if result.is_ok() {
            // Clean disconnect
            if let Err(e) = self.socket.close().await {
                debug!(error = %e, "Socket already gone while closing");
            }
        }
        result
    }

    async fn pump(&mut self) -> Result<(), SocketError> {
        loop {
            tokio::select! {
                // Handle outbound messages (from rooms to client)
                frame = self.outbound_receiver.recv() => {
                    match frame {
                        Some(OutboundFrame::Text(message)) => {
                            self.socket.send_message(message.to_string()).await?
                        }
                        Some(OutboundFrame::Close) | None => return Ok(()),
                    }
                }

                // Handle inbound messages (from client to rooms)
                message = self.socket.receive_message() => {
                    match message? {
                        Some(message) => self.session.handle_message(&message).await,
                        None => return Ok(()), // Client disconnected
                    }
                }
            }
        }
    }
}
