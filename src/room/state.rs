use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::models::{Member, RoomCode, RoomSnapshot, Username};
use crate::speech::SpeechGateway;
use crate::websockets::{ConnectionHandle, ConnectionId, EncodedEvent, ServerEvent};

/// Whether the sender of a transcription receives its own broadcast
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SenderPolicy {
    #[default]
    IncludeSender,
    ExcludeSender,
}

/// Result of attempting to join a room
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOutcome {
    /// Member appended, other members notified
    Joined,
    /// Username already taken in this room, nothing changed
    AlreadyJoined,
}

/// Result of removing a member by username or by connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoveOutcome {
    Removed {
        username: Username,
        became_empty: bool,
    },
    NotPresent,
}

/// The room was deleted from the registry; join through the registry again
#[derive(Debug, Error, PartialEq, Eq)]
#[error("room {0} has been retired")]
pub struct RoomRetired(pub RoomCode);

fn encode(code: &str, event: ServerEvent) -> Option<EncodedEvent> {
    match EncodedEvent::encode(event) {
        Ok(event) => Some(event),
        Err(e) => {
            warn!(room_code = %code, error = %e, "Failed to encode event, not sent");
            None
        }
    }
}

#[derive(Default)]
struct Membership {
    members: Vec<Member>,
    retired: bool,
}

impl Membership {
    fn contains(&self, username: &str) -> bool {
        self.members.iter().any(|m| m.username == username)
    }

    /// Send `event` to every member except `skip`, returning the delivery count
    fn fan_out(&self, code: &str, event: &EncodedEvent, skip: Option<&str>) -> usize {
        let mut delivered = 0;
        for member in &self.members {
            if skip == Some(member.username.as_str()) {
                continue;
            }
            match member.connection.send_encoded(event) {
                Ok(()) => delivered += 1,
                Err(e) => {
                    debug!(
                        room_code = %code,
                        username = %member.username,
                        error = %e,
                        "Skipping member with dead connection"
                    );
                }
            }
        }
        delivered
    }

    /// Encode a membership notice once and send it to every member
    fn announce(&self, code: &str, event: ServerEvent) -> usize {
        match encode(code, event) {
            Some(event) => self.fan_out(code, &event, None),
            None => 0,
        }
    }

    fn remove_at(&mut self, code: &str, index: usize) -> RemoveOutcome {
        let member = self.members.remove(index);
        self.announce(code, ServerEvent::user_left(&member.username));
        RemoveOutcome::Removed {
            username: member.username,
            became_empty: self.members.is_empty(),
        }
    }
}

/// A named group of connections that receive each other's events
///
/// All membership changes and broadcasts take the same lock, so they are
/// observed in one total order. The lock is never held across an await.
pub struct Room {
    code: RoomCode,
    created_at: DateTime<Utc>,
    membership: Mutex<Membership>,
}

impl Room {
    pub fn new(code: impl Into<RoomCode>) -> Self {
        Self {
            code: code.into(),
            created_at: Utc::now(),
            membership: Mutex::new(Membership::default()),
        }
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn lock(&self) -> MutexGuard<'_, Membership> {
        self.membership
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Add `username` unless it is already taken; existing members get `userJoined`
    pub fn join(
        &self,
        username: &str,
        connection: Arc<dyn ConnectionHandle>,
    ) -> Result<JoinOutcome, RoomRetired> {
        let mut membership = self.lock();
        if membership.retired {
            return Err(RoomRetired(self.code.clone()));
        }

        if membership.contains(username) {
            info!(room_code = %self.code, username = %username, "Rejoin rejected, username already in room");
            return Ok(JoinOutcome::AlreadyJoined);
        }

        let notified = membership.announce(&self.code, ServerEvent::user_joined(username));
        membership.members.push(Member::new(username, connection));

        info!(
            room_code = %self.code,
            username = %username,
            member_count = membership.members.len(),
            notified,
            "User joined room"
        );
        Ok(JoinOutcome::Joined)
    }

    /// Remove the member named `username`; remaining members get `userLeft`
    pub fn leave(&self, username: &str) -> RemoveOutcome {
        let mut membership = self.lock();
        match membership.members.iter().position(|m| m.username == username) {
            Some(index) => {
                let outcome = membership.remove_at(&self.code, index);
                info!(room_code = %self.code, username = %username, "User left room");
                outcome
            }
            None => {
                debug!(room_code = %self.code, username = %username, "Leave for user not in room");
                RemoveOutcome::NotPresent
            }
        }
    }

    /// Remove whichever member owns `connection_id`
    pub fn remove_connection(&self, connection_id: ConnectionId) -> RemoveOutcome {
        self.remove_first(|m| m.connection_id() == connection_id)
    }

    /// Remove `username` only while it is still held by `connection_id`
    pub fn remove_member(&self, username: &str, connection_id: ConnectionId) -> RemoveOutcome {
        self.remove_first(|m| m.username == username && m.connection_id() == connection_id)
    }

    fn remove_first(&self, matches: impl Fn(&Member) -> bool) -> RemoveOutcome {
        let mut membership = self.lock();
        match membership.members.iter().position(|m| matches(m)) {
            Some(index) => {
                let outcome = membership.remove_at(&self.code, index);
                if let RemoveOutcome::Removed { username, .. } = &outcome {
                    info!(room_code = %self.code, username = %username, "Connection removed from room");
                }
                outcome
            }
            None => {
                debug!(room_code = %self.code, "No matching member in room");
                RemoveOutcome::NotPresent
            }
        }
    }

    /// Relay a transcription to the current members
    pub fn broadcast_transcription(&self, from: &str, text: &str, policy: SenderPolicy) -> usize {
        let event = ServerEvent::transcription(from, text);
        let delivered = self.broadcast(event, from, policy);
        debug!(room_code = %self.code, username = %from, delivered, "Transcription broadcast");
        delivered
    }

    /// Synthesize `text` and relay the audio; a failed synthesis is logged and
    /// nothing is broadcast
    pub async fn broadcast_synthesized(
        &self,
        gateway: &dyn SpeechGateway,
        from: &str,
        text: &str,
        language: &str,
        policy: SenderPolicy,
    ) -> usize {
        let audio = match gateway.synthesize(text, language).await {
            Ok(audio) => audio,
            Err(e) => {
                warn!(
                    room_code = %self.code,
                    username = %from,
                    gateway = gateway.gateway_name(),
                    error = %e,
                    "Speech synthesis failed, nothing broadcast"
                );
                return 0;
            }
        };

        let event = ServerEvent::synthesized_audio(from, STANDARD.encode(&audio));
        let delivered = self.broadcast(event, from, policy);
        info!(
            room_code = %self.code,
            username = %from,
            audio_bytes = audio.len(),
            delivered,
            "Synthesized audio broadcast"
        );
        delivered
    }

    /// Encodes before taking the lock so large payloads are serialized once
    fn broadcast(&self, event: ServerEvent, from: &str, policy: SenderPolicy) -> usize {
        let skip = match policy {
            SenderPolicy::IncludeSender => None,
            SenderPolicy::ExcludeSender => Some(from),
        };
        let Some(event) = encode(&self.code, event) else {
            return 0;
        };
        self.lock().fan_out(&self.code, &event, skip)
    }

    pub fn len(&self) -> usize {
        self.lock().members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().members.is_empty()
    }

    pub fn contains(&self, username: &str) -> bool {
        self.lock().contains(username)
    }

    pub fn usernames(&self) -> Vec<Username> {
        self.lock()
            .members
            .iter()
            .map(|m| m.username.clone())
            .collect()
    }

    pub fn snapshot(&self) -> RoomSnapshot {
        RoomSnapshot {
            code: self.code.clone(),
            created_at: self.created_at,
            members: self.usernames(),
        }
    }

    /// Mark the room dead if it has no members. Called by the registry while
    /// it holds the map lock, right before removing the entry.
    pub(super) fn retire_if_empty(&self) -> bool {
        let mut membership = self.lock();
        if membership.members.is_empty() {
            membership.retired = true;
            true
        } else {
            false
        }
    }

    pub fn is_retired(&self) -> bool {
        self.lock().retired
    }
}
