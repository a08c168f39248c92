use axum::http::HeaderValue;
use std::time::Duration;
use thiserror::Error;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::{debug, warn};

use crate::room::SenderPolicy;
use crate::speech::AzureSpeechConfig;
use crate::websockets::DEFAULT_LANGUAGE;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

impl ConfigError {
    fn invalid(key: &'static str, value: &str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            key,
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

/// Which origins the CORS layer admits
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CorsOrigins {
    #[default]
    Any,
    List(Vec<HeaderValue>),
}

/// Runtime configuration, read from the environment (and `.env` if present)
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub cors_origins: CorsOrigins,
    pub sender_policy: SenderPolicy,
    pub default_language: String,
    /// `None` relays transcriptions as text instead of synthesized audio
    pub speech: Option<AzureSpeechConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            cors_origins: CorsOrigins::Any,
            sender_policy: SenderPolicy::IncludeSender,
            default_language: DEFAULT_LANGUAGE.to_string(),
            speech: None,
        }
    }
}

impl Config {
    /// Load from process environment, after applying `.env`
    pub fn from_env() -> Result<Self, ConfigError> {
        match dotenvy::dotenv() {
            Ok(path) => debug!(path = %path.display(), "Loaded .env file"),
            Err(e) if e.not_found() => {}
            Err(e) => warn!(error = %e, "Failed to read .env file"),
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Config::default();

        let host = get("RELAY_HOST").unwrap_or(defaults.host);
        let port = match get("RELAY_PORT") {
            Some(raw) => raw
                .parse::<u16>()
                .map_err(|e| ConfigError::invalid("RELAY_PORT", &raw, e.to_string()))?,
            None => defaults.port,
        };

        let cors_origins = match get("CORS_ALLOWED_ORIGINS") {
            Some(raw) => parse_origins(&raw)?,
            None => defaults.cors_origins,
        };

        let sender_policy = match get("BROADCAST_INCLUDE_SENDER") {
            Some(raw) => {
                if parse_bool("BROADCAST_INCLUDE_SENDER", &raw)? {
                    SenderPolicy::IncludeSender
                } else {
                    SenderPolicy::ExcludeSender
                }
            }
            None => defaults.sender_policy,
        };

        let default_language = get("DEFAULT_LANGUAGE").unwrap_or(defaults.default_language);

        let speech = match get("SPEECH_KEY") {
            Some(key) => {
                let mut speech =
                    AzureSpeechConfig::new(key, get("SPEECH_REGION").unwrap_or("eastus".into()));
                speech.voice = get("SPEECH_VOICE");
                if let Some(format) = get("SPEECH_OUTPUT_FORMAT") {
                    speech.output_format = format;
                }
                if let Some(raw) = get("SPEECH_TIMEOUT_SECS") {
                    let secs = raw.parse::<u64>().map_err(|e| {
                        ConfigError::invalid("SPEECH_TIMEOUT_SECS", &raw, e.to_string())
                    })?;
                    if secs == 0 {
                        return Err(ConfigError::invalid(
                            "SPEECH_TIMEOUT_SECS",
                            &raw,
                            "must be greater than zero",
                        ));
                    }
                    speech.timeout = Duration::from_secs(secs);
                }
                Some(speech)
            }
            None => None,
        };

        Ok(Self {
            host,
            port,
            cors_origins,
            sender_policy,
            default_language,
            speech,
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Every method and header is allowed; origins follow `cors_origins`
    pub fn cors_layer(&self) -> CorsLayer {
        let origins = match &self.cors_origins {
            CorsOrigins::Any => AllowOrigin::any(),
            CorsOrigins::List(list) => AllowOrigin::list(list.clone()),
        };
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

fn parse_origins(raw: &str) -> Result<CorsOrigins, ConfigError> {
    if raw == "*" {
        return Ok(CorsOrigins::Any);
    }
    raw.split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(|origin| {
            HeaderValue::from_str(origin).map_err(|e| {
                ConfigError::invalid("CORS_ALLOWED_ORIGINS", origin, e.to_string())
            })
        })
        .collect::<Result<Vec<_>, _>>()
        .map(CorsOrigins::List)
}

fn parse_bool(key: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::invalid(key, raw, "expected a boolean")),
    }
}
