use async_trait::async_trait;
use reqwest::{
    header::{CONTENT_TYPE, USER_AGENT},
    Client,
};
use std::time::Duration;
use tracing::{debug, instrument, warn};

use super::gateway::{SpeechGateway, SynthesisError};

/// Riff 16kHz 16-bit mono PCM, playable directly by browsers as WAV
pub const DEFAULT_OUTPUT_FORMAT: &str = "riff-16khz-16bit-mono-pcm";

const FALLBACK_VOICE: &str = "en-US-JennyNeural";

/// Neural voices used when no explicit voice is configured
const VOICES: &[(&str, &str)] = &[
    ("en-US", "en-US-JennyNeural"),
    ("en-GB", "en-GB-SoniaNeural"),
    ("es-ES", "es-ES-ElviraNeural"),
    ("es-MX", "es-MX-DaliaNeural"),
    ("fr-FR", "fr-FR-DeniseNeural"),
    ("de-DE", "de-DE-KatjaNeural"),
    ("it-IT", "it-IT-ElsaNeural"),
    ("pt-BR", "pt-BR-FranciscaNeural"),
    ("ja-JP", "ja-JP-NanamiNeural"),
    ("ko-KR", "ko-KR-SunHiNeural"),
    ("zh-CN", "zh-CN-XiaoxiaoNeural"),
    ("hi-IN", "hi-IN-SwaraNeural"),
];

/// Settings for the Azure text-to-speech REST API
#[derive(Debug, Clone)]
pub struct AzureSpeechConfig {
    pub key: String,
    pub region: String,
    /// Overrides the per-language voice table when set
    pub voice: Option<String>,
    pub output_format: String,
    pub timeout: Duration,
}

impl AzureSpeechConfig {
    pub fn new(key: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            region: region.into(),
            voice: None,
            output_format: DEFAULT_OUTPUT_FORMAT.to_string(),
            timeout: Duration::from_secs(10),
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "https://{}.tts.speech.microsoft.com/cognitiveservices/v1",
            self.region
        )
    }
}

/// Speech gateway that calls Azure Cognitive Services over HTTPS
pub struct AzureSpeechGateway {
    client: Client,
    config: AzureSpeechConfig,
    endpoint: String,
}

impl AzureSpeechGateway {
    pub fn new(config: AzureSpeechConfig) -> Result<Self, SynthesisError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| SynthesisError::Client(e.to_string()))?;
        let endpoint = config.endpoint();

        Ok(Self {
            client,
            config,
            endpoint,
        })
    }

    /// Point the gateway at a different synthesis endpoint
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn voice_for(&self, language: &str) -> &str {
        if let Some(voice) = &self.config.voice {
            return voice;
        }
        VOICES
            .iter()
            .find(|(tag, _)| tag.eq_ignore_ascii_case(language))
            .map(|(_, voice)| *voice)
            .unwrap_or(FALLBACK_VOICE)
    }
}

/// Build the SSML document for one utterance
pub(crate) fn build_ssml(text: &str, language: &str, voice: &str) -> String {
    format!(
        "<speak version='1.0' xmlns='http://www.w3.org/2001/10/synthesis' xml:lang='{lang}'>\
         <voice xml:lang='{lang}' name='{voice}'>{text}</voice></speak>",
        lang = escape_xml(language),
        voice = escape_xml(voice),
        text = escape_xml(text),
    )
}

fn escape_xml(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[async_trait]
impl SpeechGateway for AzureSpeechGateway {
    #[instrument(skip(self, text), fields(text_len = text.len()))]
    async fn synthesize(&self, text: &str, language: &str) -> Result<Vec<u8>, SynthesisError> {
        let voice = self.voice_for(language);
        let ssml = build_ssml(text, language, voice);
        debug!(voice = %voice, "Requesting speech synthesis");

        let response = self
            .client
            .post(&self.endpoint)
            .header("Ocp-Apim-Subscription-Key", &self.config.key)
            .header("X-Microsoft-OutputFormat", &self.config.output_format)
            .header(CONTENT_TYPE, "application/ssml+xml")
            .header(USER_AGENT, "roomrelay")
            .body(ssml)
            .send()
            .await
            .map_err(|e| SynthesisError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "Speech service rejected request");
            return Err(SynthesisError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let audio = response
            .bytes()
            .await
            .map_err(|e| SynthesisError::Request(e.to_string()))?;
        if audio.is_empty() {
            return Err(SynthesisError::EmptyAudio);
        }

        debug!(bytes = audio.len(), "Speech synthesis completed");
        Ok(audio.to_vec())
    }

    fn gateway_name(&self) -> &'static str {
        "AzureSpeechGateway"
    }
}
