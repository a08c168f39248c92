use serde::{Deserialize, Serialize};

use super::router::RouterError;

/// Events sent by clients over the WebSocket
///
/// Every frame is one flat JSON object tagged by `event`. `roomCode` may be
/// omitted when the connection path or a previous join already supplies it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "event",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum ClientEvent {
    Join {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        room_code: Option<String>,
        username: String,
    },
    Leave {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        room_code: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        username: Option<String>,
    },
    Transcription {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        room_code: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        username: Option<String>,
        transcription: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        language: Option<String>,
    },
}

impl ClientEvent {
    /// Decode a text frame, mapping any decode failure to `MalformedPayload`
    pub fn parse(message: &str) -> Result<Self, RouterError> {
        serde_json::from_str(message).map_err(|e| RouterError::MalformedPayload(e.to_string()))
    }

    pub fn join(room_code: Option<&str>, username: &str) -> Self {
        ClientEvent::Join {
            room_code: room_code.map(str::to_string),
            username: username.to_string(),
        }
    }

    pub fn leave(room_code: Option<&str>, username: Option<&str>) -> Self {
        ClientEvent::Leave {
            room_code: room_code.map(str::to_string),
            username: username.map(str::to_string),
        }
    }

    pub fn transcription(
        room_code: Option<&str>,
        username: Option<&str>,
        transcription: &str,
        language: Option<&str>,
    ) -> Self {
        ClientEvent::Transcription {
            room_code: room_code.map(str::to_string),
            username: username.map(str::to_string),
            transcription: transcription.to_string(),
            language: language.map(str::to_string),
        }
    }
}

/// Events pushed from the relay to clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum ServerEvent {
    UserJoined { username: String },
    UserLeft { username: String },
    Transcription { username: String, transcription: String },
    SynthesizedAudio { username: String, audio: String },
    Error { message: String },
}

impl ServerEvent {
    pub fn user_joined(username: &str) -> Self {
        ServerEvent::UserJoined {
            username: username.to_string(),
        }
    }

    pub fn user_left(username: &str) -> Self {
        ServerEvent::UserLeft {
            username: username.to_string(),
        }
    }

    pub fn transcription(username: &str, transcription: &str) -> Self {
        ServerEvent::Transcription {
            username: username.to_string(),
            transcription: transcription.to_string(),
        }
    }

    pub fn synthesized_audio(username: &str, audio: String) -> Self {
        ServerEvent::SynthesizedAudio {
            username: username.to_string(),
            audio,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        ServerEvent::Error {
            message: message.into(),
        }
    }
}

/// Treat empty strings the same as absent fields
pub(crate) fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}
