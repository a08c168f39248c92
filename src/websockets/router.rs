use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use super::connection::{ConnectionHandle, ConnectionId};
use super::messages::{non_empty, ClientEvent, ServerEvent};
use crate::room::{JoinOutcome, RemoveOutcome, RoomCode, RoomRegistry, SenderPolicy, Username};
use crate::speech::SpeechGateway;

pub const DEFAULT_LANGUAGE: &str = "en-US";

/// Errors produced while handling one inbound event
///
/// None of these end the connection; they are logged and, where useful,
/// reported back to the caller only.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RouterError {
    #[error("room code is missing")]
    MissingRoomCode,

    #[error("username {username} is already in room {room_code}")]
    AlreadyJoined {
        room_code: RoomCode,
        username: Username,
    },

    #[error("username {username} is not in room {room_code}")]
    NotPresent {
        room_code: RoomCode,
        username: Username,
    },

    #[error("room {0} does not exist")]
    UnknownRoom(RoomCode),

    #[error("malformed payload: {0}")]
    MalformedPayload(String),
}

/// Usernames must contain something other than whitespace
pub fn validate_username(username: &str) -> Result<(), RouterError> {
    if username.trim().is_empty() {
        return Err(RouterError::MalformedPayload("username is blank".to_string()));
    }
    Ok(())
}

/// The room and username a connection currently speaks for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Association {
    pub room_code: RoomCode,
    pub username: Username,
}

/// Shared dispatch configuration; hands out one session per connection
#[derive(Clone)]
pub struct EventRouter {
    registry: Arc<RoomRegistry>,
    speech: Option<Arc<dyn SpeechGateway>>,
    sender_policy: SenderPolicy,
    default_language: String,
}

impl EventRouter {
    pub fn new(registry: Arc<RoomRegistry>) -> Self {
        Self {
            registry,
            speech: None,
            sender_policy: SenderPolicy::default(),
            default_language: DEFAULT_LANGUAGE.to_string(),
        }
    }

    /// Transcriptions are synthesized to audio instead of relayed as text
    pub fn with_speech_gateway(mut self, gateway: Arc<dyn SpeechGateway>) -> Self {
        self.speech = Some(gateway);
        self
    }

    pub fn with_sender_policy(mut self, policy: SenderPolicy) -> Self {
        self.sender_policy = policy;
        self
    }

    pub fn with_default_language(mut self, language: impl Into<String>) -> Self {
        self.default_language = language.into();
        self
    }

    pub fn registry(&self) -> &Arc<RoomRegistry> {
        &self.registry
    }

    pub fn sender_policy(&self) -> SenderPolicy {
        self.sender_policy
    }

    /// Start tracking a freshly opened connection
    pub fn session(
        &self,
        connection: Arc<dyn ConnectionHandle>,
        path_room: Option<RoomCode>,
    ) -> ConnectionSession {
        ConnectionSession {
            router: self.clone(),
            connection,
            path_room: non_empty(path_room),
            association: None,
            cleaned_up: false,
        }
    }
}

/// Per-connection state machine: Connected -> Joined(room, username) -> Closed
///
/// Dropping the session runs the disconnect cleanup if it has not run yet.
pub struct ConnectionSession {
    router: EventRouter,
    connection: Arc<dyn ConnectionHandle>,
    path_room: Option<RoomCode>,
    association: Option<Association>,
    cleaned_up: bool,
}

impl ConnectionSession {
    pub fn connection_id(&self) -> ConnectionId {
        self.connection.id()
    }

    pub fn association(&self) -> Option<&Association> {
        self.association.as_ref()
    }

    pub fn is_closed(&self) -> bool {
        self.cleaned_up
    }

    /// Decode one text frame and dispatch it. Never fails the connection.
    #[instrument(skip(self, message), fields(connection_id = %self.connection.id()))]
    pub async fn handle_message(&mut self, message: &str) {
        if self.cleaned_up {
            debug!("Ignoring message on closed session");
            return;
        }

        let result = match ClientEvent::parse(message) {
            Ok(ClientEvent::Join {
                room_code,
                username,
            }) => self.join(room_code, username),
            Ok(ClientEvent::Leave {
                room_code,
                username,
            }) => self.leave(room_code, username),
            Ok(ClientEvent::Transcription {
                room_code,
                username,
                transcription,
                language,
            }) => {
                self.transcription(room_code, username, &transcription, language)
                    .await
            }
            Err(e) => Err(e),
        };

        if let Err(e) = result {
            self.report(e);
        }
    }

    /// Join a room as `username`; on success this becomes the connection's identity
    pub fn join(
        &mut self,
        room_code: Option<String>,
        username: String,
    ) -> Result<(), RouterError> {
        let room_code = non_empty(room_code)
            .or_else(|| self.path_room.clone())
            .ok_or(RouterError::MissingRoomCode)?;
        validate_username(&username)?;

        match self
            .router
            .registry
            .join(&room_code, &username, Arc::clone(&self.connection))
        {
            JoinOutcome::Joined => {
                let current = Association {
                    room_code,
                    username,
                };
                // An identical previous association was evicted already; the
                // membership just added is the one it names
                let previous = self
                    .association
                    .replace(current.clone())
                    .filter(|previous| *previous != current);
                if let Some(previous) = previous {
                    info!(
                        room_code = %previous.room_code,
                        username = %previous.username,
                        "Switching rooms, releasing previous membership"
                    );
                    self.release(&previous);
                }
                Ok(())
            }
            JoinOutcome::AlreadyJoined => Err(RouterError::AlreadyJoined {
                room_code,
                username,
            }),
        }
    }

    fn leave(
        &mut self,
        room_code: Option<String>,
        username: Option<String>,
    ) -> Result<(), RouterError> {
        let room_code = self.resolve_room(room_code)?;
        let username = self.resolve_username(&room_code, username)?;

        match self.router.registry.leave(&room_code, &username) {
            RemoveOutcome::Removed { .. } => {
                let ours = self
                    .association
                    .as_ref()
                    .is_some_and(|a| a.room_code == room_code && a.username == username);
                if ours {
                    self.association = None;
                }
                Ok(())
            }
            RemoveOutcome::NotPresent => Err(RouterError::NotPresent {
                room_code,
                username,
            }),
        }
    }

    async fn transcription(
        &mut self,
        room_code: Option<String>,
        username: Option<String>,
        text: &str,
        language: Option<String>,
    ) -> Result<(), RouterError> {
        let room_code = self.resolve_room(room_code)?;
        let username = self.resolve_username(&room_code, username)?;
        let room = self
            .router
            .registry
            .get_if_exists(&room_code)
            .ok_or_else(|| RouterError::UnknownRoom(room_code.clone()))?;
        let policy = self.router.sender_policy;

        match &self.router.speech {
            Some(gateway) => {
                let language =
                    non_empty(language).unwrap_or_else(|| self.router.default_language.clone());
                room.broadcast_synthesized(gateway.as_ref(), &username, text, &language, policy)
                    .await;
            }
            None => {
                room.broadcast_transcription(&username, text, policy);
            }
        }
        Ok(())
    }

    /// Payload room code, else the joined room, else the connection path
    fn resolve_room(&self, room_code: Option<String>) -> Result<RoomCode, RouterError> {
        non_empty(room_code)
            .or_else(|| self.association.as_ref().map(|a| a.room_code.clone()))
            .or_else(|| self.path_room.clone())
            .ok_or(RouterError::MissingRoomCode)
    }

    /// Payload username, else the username this connection joined `room_code` with
    fn resolve_username(
        &self,
        room_code: &str,
        username: Option<String>,
    ) -> Result<Username, RouterError> {
        non_empty(username)
            .or_else(|| {
                self.association
                    .as_ref()
                    .filter(|a| a.room_code == room_code)
                    .map(|a| a.username.clone())
            })
            .ok_or_else(|| RouterError::MalformedPayload("username is missing".to_string()))
    }

    fn release(&self, association: &Association) {
        let outcome = self
            .router
            .registry
            .remove_member(
                &association.room_code,
                &association.username,
                self.connection.id(),
            );
        if outcome == RemoveOutcome::NotPresent {
            debug!(
                room_code = %association.room_code,
                username = %association.username,
                "Membership was already gone"
            );
        }
    }

    fn report(&self, error: RouterError) {
        match &error {
            RouterError::AlreadyJoined { .. } | RouterError::MissingRoomCode => {
                warn!(error = %error, "Rejected event");
                if let Err(e) = self.connection.send(&ServerEvent::error(error.to_string())) {
                    debug!(error = %e, "Could not report rejection to client");
                }
            }
            RouterError::MalformedPayload(_) => {
                warn!(error = %error, "Dropping malformed event");
            }
            RouterError::NotPresent { .. } | RouterError::UnknownRoom(_) => {
                info!(error = %error, "Ignoring event");
            }
        }
    }

    /// Transport-level close: drop any membership exactly once
    pub fn disconnect(&mut self) {
        if self.cleaned_up {
            return;
        }
        self.cleaned_up = true;

        match self.association.take() {
            Some(association) => {
                info!(
                    connection_id = %self.connection.id(),
                    room_code = %association.room_code,
                    username = %association.username,
                    "Client disconnected, leaving room"
                );
                self.release(&association);
            }
            None => {
                debug!(connection_id = %self.connection.id(), "Client disconnected without joining");
            }
        }
    }
}

impl Drop for ConnectionSession {
    fn drop(&mut self) {
        self.disconnect();
    }
}
