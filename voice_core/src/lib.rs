use std::path::Path;
use std::time::Duration;

use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};

pub const DASHSCOPE_HTTP_API_URL: &str = "https://dashscope.aliyuncs.com/api/v1";
pub const ENROLLMENT_MODEL: &str = "qwen-voice-enrollment";

const CUSTOMIZATION_PATH: &str = "/services/audio/tts/customization";
const GENERATION_PATH: &str = "/services/aigc/multimodal-generation/generation";

const CREATE_TIMEOUT: Duration = Duration::from_secs(60);
const MANAGE_TIMEOUT: Duration = Duration::from_secs(30);
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(60);
/// Default bound on the non-streaming generation call.
pub const DEFAULT_GENERATION_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Error)]
pub enum VoiceError {
    /// Non-success reply from DashScope, body kept as returned.
    #[error("API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected response: {0}")]
    Decode(String),

    #[error("response did not contain an audio URL")]
    MissingAudioUrl,

    #[error("audio download failed with status {0}")]
    Download(u16),
}

pub type VoiceResult<T> = Result<T, VoiceError>;

/// MIME type for an uploaded sample, by file extension. Unknown types are sent as WAV.
pub fn mime_for_extension(filename: &str) -> &'static str {
    let ext = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("mp3") => "audio/mpeg",
        Some("m4a") => "audio/mp4",
        _ => "audio/wav",
    }
}

/// Enrollment request body
#[derive(Serialize)]
struct CustomizationRequest<'a> {
    model: &'static str,
    input: CustomizationInput<'a>,
}

#[derive(Serialize)]
#[serde(tag = "action", rename_all = "lowercase")]
enum CustomizationInput<'a> {
    Create {
        target_model: &'a str,
        preferred_name: &'a str,
        audio: AudioData,
    },
    List {
        page_index: u32,
        page_size: u32,
    },
    Delete {
        voice: &'a str,
    },
}

#[derive(Serialize)]
struct AudioData {
    data: String,
}

#[derive(Deserialize)]
struct CreateResponse {
    output: CreateOutput,
}

#[derive(Deserialize)]
struct CreateOutput {
    voice: String,
    target_model: Option<String>,
}

#[derive(Deserialize, Default)]
struct ListResponse {
    #[serde(default)]
    output: ListOutput,
}

#[derive(Deserialize, Default)]
struct ListOutput {
    #[serde(default)]
    voice_list: Vec<Value>,
}

#[derive(Serialize)]
struct GenerationRequest<'a> {
    model: &'a str,
    input: GenerationInput<'a>,
}

#[derive(Serialize)]
struct GenerationInput<'a> {
    text: &'a str,
    voice: &'a str,
}

#[derive(Deserialize, Default)]
struct GenerationResponse {
    #[serde(default)]
    output: GenerationOutput,
}

#[derive(Deserialize, Default)]
struct GenerationOutput {
    audio: Option<GeneratedAudio>,
}

#[derive(Deserialize)]
struct GeneratedAudio {
    #[serde(default)]
    url: String,
}

/// A voice enrolled from a sample recording.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreatedVoice {
    pub voice: String,
    pub target_model: String,
}

/// Client for the DashScope HTTP APIs: voice enrollment and one-shot synthesis.
#[derive(Debug, Clone)]
pub struct VoiceClient {
    api_key: String,
    base_url: String,
    client: Client,
    generation_timeout: Duration,
}

impl VoiceClient {
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: Client::new(),
            generation_timeout: DEFAULT_GENERATION_TIMEOUT,
        }
    }

    pub fn with_generation_timeout(mut self, timeout: Duration) -> Self {
        self.generation_timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Enroll a voice from an audio sample.
    pub async fn create_voice(
        &self,
        audio: &[u8],
        mime: &str,
        target_model: &str,
        preferred_name: &str,
    ) -> VoiceResult<CreatedVoice> {
        let encoded = base64::engine::general_purpose::STANDARD.encode(audio);
        let input = CustomizationInput::Create {
            target_model,
            preferred_name,
            audio: AudioData {
                data: format!("data:{mime};base64,{encoded}"),
            },
        };
        info!(
            "Enrolling voice: preferred_name={}, target_model={}, {} bytes ({})",
            preferred_name,
            target_model,
            audio.len(),
            mime
        );

        let body = self.customization(input, CREATE_TIMEOUT).await?;
        let response: CreateResponse =
            serde_json::from_str(&body).map_err(|e| VoiceError::Decode(e.to_string()))?;

        Ok(CreatedVoice {
            voice: response.output.voice,
            target_model: response
                .output
                .target_model
                .unwrap_or_else(|| target_model.to_string()),
        })
    }

    /// One page of enrolled voices, as returned by the provider.
    pub async fn list_voices(&self, page_index: u32, page_size: u32) -> VoiceResult<Vec<Value>> {
        let input = CustomizationInput::List { page_index, page_size };
        let body = self.customization(input, MANAGE_TIMEOUT).await?;
        let response: ListResponse =
            serde_json::from_str(&body).map_err(|e| VoiceError::Decode(e.to_string()))?;
        debug!("Listed {} voice(s) on page {}", response.output.voice_list.len(), page_index);
        Ok(response.output.voice_list)
    }

    pub async fn delete_voice(&self, voice: &str) -> VoiceResult<()> {
        self.customization(CustomizationInput::Delete { voice }, MANAGE_TIMEOUT)
            .await?;
        info!("Deleted voice {}", voice);
        Ok(())
    }

    /// Synthesize with a non-streaming model. The provider returns a URL to the
    /// finished audio, which is downloaded and returned untouched.
    pub async fn synthesize(&self, model: &str, voice: &str, text: &str) -> VoiceResult<Vec<u8>> {
        let url = format!("{}{}", self.base_url, GENERATION_PATH);
        let request = GenerationRequest {
            model,
            input: GenerationInput { text, voice },
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .timeout(self.generation_timeout)
            .send()
            .await?;
        let body = Self::checked_body(response).await?;
        let generation: GenerationResponse =
            serde_json::from_str(&body).map_err(|e| VoiceError::Decode(e.to_string()))?;

        let audio_url = generation
            .output
            .audio
            .map(|a| a.url)
            .filter(|u| !u.is_empty())
            .ok_or(VoiceError::MissingAudioUrl)?;
        debug!("Downloading synthesized audio from {}", audio_url);

        let download = self.client.get(&audio_url).timeout(DOWNLOAD_TIMEOUT).send().await?;
        if !download.status().is_success() {
            return Err(VoiceError::Download(download.status().as_u16()));
        }
        let bytes = download.bytes().await?;
        info!("Non-streaming synthesis: model={}, {} bytes", model, bytes.len());
        Ok(bytes.to_vec())
    }

    async fn customization(&self, input: CustomizationInput<'_>, timeout: Duration) -> VoiceResult<String> {
        let url = format!("{}{}", self.base_url, CUSTOMIZATION_PATH);
        let request = CustomizationRequest {
            model: ENROLLMENT_MODEL,
            input,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .timeout(timeout)
            .json(&request)
            .send()
            .await?;
        Self::checked_body(response).await
    }

    async fn checked_body(response: reqwest::Response) -> VoiceResult<String> {
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(VoiceError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(body)
    }
}
