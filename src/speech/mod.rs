// Public API - what other modules can use
pub use azure::{AzureSpeechConfig, AzureSpeechGateway};
pub use gateway::{SpeechGateway, SynthesisError};

// Internal modules
mod azure;
mod gateway;
