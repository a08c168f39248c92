use roomrelay::ClientEvent;

use super::setup::TestSetup;

// ============================================================================
// Action Helpers
// ============================================================================

impl TestSetup {
    /// Deliver a raw text frame from `client`
    pub async fn send_raw(&mut self, client: &str, message: &str) {
        self.client_mut(client).session.handle_message(message).await;
    }

    pub async fn send_event(&mut self, client: &str, event: ClientEvent) {
        let message = serde_json::to_string(&event).unwrap();
        self.send_raw(client, &message).await;
    }

    // ============================================================================
    // Convenience Action Methods
    // ============================================================================

    /// `client` joins the setup's room under its own name
    pub async fn join(&mut self, client: &str) {
        let room = self.room_code.clone();
        self.send_event(client, ClientEvent::join(Some(&room), client))
            .await;
    }

    pub async fn join_all(&mut self, clients: &[&str]) {
        for client in clients {
            self.join(client).await;
        }
    }

    pub async fn leave(&mut self, client: &str) {
        let room = self.room_code.clone();
        self.send_event(client, ClientEvent::leave(Some(&room), Some(client)))
            .await;
    }

    pub async fn say(&mut self, client: &str, text: &str) {
        let room = self.room_code.clone();
        self.send_event(
            client,
            ClientEvent::transcription(Some(&room), Some(client), text, None),
        )
        .await;
    }

    /// Transport-level close, as the socket loop would report it
    pub fn disconnect(&mut self, client: &str) {
        self.client_mut(client).session.disconnect();
    }

    pub fn clear_events(&self) {
        for client in self.clients.values() {
            client.connection.clear();
        }
    }
}
