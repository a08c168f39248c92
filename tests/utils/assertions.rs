//! Test assertion helpers - fluent API for verifying test expectations
#![allow(dead_code)] // Test utilities may not all be used in every test

use roomrelay::ServerEvent;

use super::setup::TestSetup;

// ============================================================================
// Assertion Helpers
// ============================================================================

pub struct EventAssertion<'a> {
    setup: &'a TestSetup,
    clients: Vec<&'a str>,
}

impl<'a> EventAssertion<'a> {
    /// Create an assertion for specific clients
    pub fn for_clients(setup: &'a TestSetup, clients: Vec<&'a str>) -> Self {
        Self { setup, clients }
    }

    pub fn for_client(setup: &'a TestSetup, client: &'a str) -> Self {
        Self::for_clients(setup, vec![client])
    }

    /// Assert that every client's next event is `expected` (consumes it)
    pub fn received(self, expected: ServerEvent) -> Self {
        for client in &self.clients {
            let event = self.setup.client(client).connection.consume();
            assert_eq!(
                event.as_ref(),
                Some(&expected),
                "{} should have received {:?}",
                client,
                expected
            );
        }
        self
    }

    /// Assert that the clients have no unread events
    pub fn received_nothing(self) -> Self {
        for client in &self.clients {
            let pending = self.setup.client(client).connection.received();
            assert!(
                pending.is_empty(),
                "{} should not have received anything, got {:?}",
                client,
                pending
            );
        }
        self
    }
}
