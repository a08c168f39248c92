#![allow(dead_code)] // Test utilities may not all be used in every test

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use roomrelay::{
    websockets::{ConnectionError, ConnectionHandle, ConnectionId, EncodedEvent, ServerEvent},
    SpeechGateway, SynthesisError,
};

// ============================================================================
// Mock Infrastructure
// ============================================================================

/// Connection that records everything the relay sends to it
pub struct MockConnection {
    id: ConnectionId,
    received: Mutex<Vec<ServerEvent>>,
    closed: Mutex<bool>,
}

impl MockConnection {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            id: Uuid::new_v4(),
            received: Mutex::new(Vec::new()),
            closed: Mutex::new(false),
        })
    }

    pub fn received(&self) -> Vec<ServerEvent> {
        self.received.lock().unwrap().clone()
    }

    /// Remove and return the oldest unread event
    pub fn consume(&self) -> Option<ServerEvent> {
        let mut received = self.received.lock().unwrap();
        if received.is_empty() {
            None
        } else {
            Some(received.remove(0))
        }
    }

    pub fn clear(&self) {
        self.received.lock().unwrap().clear();
    }
}

impl ConnectionHandle for MockConnection {
    fn id(&self) -> ConnectionId {
        self.id
    }

    fn send_encoded(&self, event: &EncodedEvent) -> Result<(), ConnectionError> {
        if *self.closed.lock().unwrap() {
            return Err(ConnectionError::Closed);
        }
        self.received.lock().unwrap().push(event.event().clone());
        Ok(())
    }

    fn close(&self) {
        *self.closed.lock().unwrap() = true;
    }

    fn is_alive(&self) -> bool {
        !*self.closed.lock().unwrap()
    }
}

/// Speech gateway that returns the text bytes as "audio", or fails on demand
pub struct MockSpeechGateway {
    fail: bool,
}

impl MockSpeechGateway {
    pub fn echoing() -> Self {
        Self { fail: false }
    }

    pub fn failing() -> Self {
        Self { fail: true }
    }
}

#[async_trait]
impl SpeechGateway for MockSpeechGateway {
    async fn synthesize(&self, text: &str, _language: &str) -> Result<Vec<u8>, SynthesisError> {
        if self.fail {
            Err(SynthesisError::Request("service unreachable".to_string()))
        } else {
            Ok(text.as_bytes().to_vec())
        }
    }

    fn gateway_name(&self) -> &'static str {
        "MockSpeechGateway"
    }
}
