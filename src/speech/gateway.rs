use async_trait::async_trait;
use thiserror::Error;

/// Errors returned by a speech synthesis backend
#[derive(Debug, Error)]
pub enum SynthesisError {
    #[error("speech client setup failed: {0}")]
    Client(String),

    #[error("speech request failed: {0}")]
    Request(String),

    #[error("speech service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("speech service returned no audio")]
    EmptyAudio,
}

/// Text-to-speech backend used for transcription events
///
/// Failures are returned, never panicked; callers log them and carry on.
#[async_trait]
pub trait SpeechGateway: Send + Sync {
    async fn synthesize(&self, text: &str, language: &str) -> Result<Vec<u8>, SynthesisError>;

    /// Get a human-readable name for this gateway (for logging/debugging)
    fn gateway_name(&self) -> &'static str;
}
