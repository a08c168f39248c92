#![allow(dead_code)] // Test utilities may not all be used in every test

use std::collections::HashMap;
use std::sync::Arc;

use roomrelay::{ConnectionSession, EventRouter, RoomRegistry, SenderPolicy, SpeechGateway};

use super::mocks::MockConnection;

// ============================================================================
// Test Setup Infrastructure
// ============================================================================

/// One simulated client: its session and the events it has received
pub struct TestClient {
    pub session: ConnectionSession,
    pub connection: Arc<MockConnection>,
}

pub struct TestSetup {
    pub registry: Arc<RoomRegistry>,
    pub router: EventRouter,
    pub clients: HashMap<String, TestClient>,
    pub room_code: String,
}

pub struct TestSetupBuilder {
    room_code: String,
    clients: Vec<String>,
    policy: SenderPolicy,
    speech: Option<Arc<dyn SpeechGateway>>,
}

impl TestSetupBuilder {
    pub fn new() -> Self {
        Self {
            room_code: "R1".to_string(),
            clients: vec![],
            policy: SenderPolicy::IncludeSender,
            speech: None,
        }
    }

    pub fn with_clients(mut self, clients: Vec<&str>) -> Self {
        self.clients = clients.into_iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_alice_and_bob(self) -> Self {
        self.with_clients(vec!["alice", "bob"])
    }

    pub fn with_sender_policy(mut self, policy: SenderPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_speech_gateway(mut self, gateway: Arc<dyn SpeechGateway>) -> Self {
        self.speech = Some(gateway);
        self
    }

    /// Opens one connection per client; nobody has joined yet
    pub fn build(self) -> TestSetup {
        let registry = Arc::new(RoomRegistry::new());
        let mut router = EventRouter::new(Arc::clone(&registry)).with_sender_policy(self.policy);
        if let Some(gateway) = self.speech {
            router = router.with_speech_gateway(gateway);
        }

        let mut setup = TestSetup {
            registry,
            router,
            clients: HashMap::new(),
            room_code: self.room_code,
        };
        for name in &self.clients {
            setup.connect(name);
        }
        setup
    }
}

impl TestSetup {
    /// Open a new connection for `name` (replacing any previous one)
    pub fn connect(&mut self, name: &str) {
        let connection = MockConnection::new();
        let session = self.router.session(connection.clone(), None);
        self.clients
            .insert(name.to_string(), TestClient { session, connection });
    }

    pub fn client(&self, name: &str) -> &TestClient {
        self.clients
            .get(name)
            .unwrap_or_else(|| panic!("no client named {}", name))
    }

    pub fn client_mut(&mut self, name: &str) -> &mut TestClient {
        self.clients
            .get_mut(name)
            .unwrap_or_else(|| panic!("no client named {}", name))
    }

    pub fn members(&self) -> Option<Vec<String>> {
        self.registry
            .get_if_exists(&self.room_code)
            .map(|room| room.usernames())
    }
}
