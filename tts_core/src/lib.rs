mod aggregator;
mod events;
mod realtime;
mod session;
mod stream;
mod wav;

use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, info, warn};

pub use aggregator::{AudioEventAggregator, WaitOutcome};
pub use events::{EventSink, SessionEvent};
pub use realtime::{DashScopeRealtime, RealtimeSession, DASHSCOPE_REALTIME_URL};
pub use session::{AudioFormat, CommitMode, SessionConnector, SessionParams, SessionState, SynthesisSession};
pub use stream::{slice_text, TextPacing, DEFAULT_PACING, DEFAULT_SLICE_CHARS};
pub use wav::{encode_pcm_wav, WavHeader, WAV_HEADER_LEN};

pub const DEFAULT_MODEL: &str = "qwen3-tts-vc-realtime-2026-01-15";
pub const DEFAULT_VOICE: &str = "Cherry";
pub const DEFAULT_LANGUAGE_TYPE: &str = "Auto";
/// Upper bound on waiting for the provider to finish a session.
pub const DEFAULT_SYNTHESIS_TIMEOUT: Duration = Duration::from_secs(120);

/// Failure of one synthesis request.
#[derive(Debug, Error)]
pub enum TtsError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("connection failed: {0}")]
    Connection(String),

    #[error("session configuration rejected: {0}")]
    Configuration(String),

    #[error("transport error: {0}")]
    Transport(String),

    /// Error reported by the provider, message passed through verbatim.
    #[error("{0}")]
    RemoteSynthesis(String),

    #[error("no audio data was generated")]
    EmptyResult,

    #[error("synthesis timed out after {0:?}")]
    Timeout(Duration),
}

pub type TtsResult<T> = Result<T, TtsError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesisRequest {
    pub text: String,
    pub voice: String,
    pub model: String,
    pub language_type: String,
}

impl SynthesisRequest {
    /// Request with the default model, voice and language.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            voice: DEFAULT_VOICE.to_string(),
            model: DEFAULT_MODEL.to_string(),
            language_type: DEFAULT_LANGUAGE_TYPE.to_string(),
        }
    }

    pub fn with_voice(mut self, voice: impl Into<String>) -> Self {
        self.voice = voice.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_language_type(mut self, language_type: impl Into<String>) -> Self {
        self.language_type = language_type.into();
        self
    }
}

/// A finished WAV container plus a few facts about it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesizedAudio {
    pub wav: Vec<u8>,
    pub pcm_bytes: usize,
    pub sample_rate: u32,
    pub duration_ms: u64,
}

/// Drives one realtime session per request and returns the WAV result.
///
/// The flow is: open, configure, append paced text slices, finish, wait for a
/// terminal event (bounded), close, then encode the collected PCM. The
/// session is closed on every path once it has been opened.
#[derive(Clone)]
pub struct RealtimeSynthesizer {
    connector: Arc<dyn SessionConnector>,
    pacing: TextPacing,
    timeout: Duration,
    format: AudioFormat,
    commit_mode: CommitMode,
}

impl RealtimeSynthesizer {
    pub fn new(connector: Arc<dyn SessionConnector>) -> Self {
        Self {
            connector,
            pacing: TextPacing::default(),
            timeout: DEFAULT_SYNTHESIS_TIMEOUT,
            format: AudioFormat::default(),
            commit_mode: CommitMode::default(),
        }
    }

    pub fn with_pacing(mut self, pacing: TextPacing) -> Self {
        self.pacing = pacing;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_commit_mode(mut self, commit_mode: CommitMode) -> Self {
        self.commit_mode = commit_mode;
        self
    }

    pub fn pacing(&self) -> TextPacing {
        self.pacing
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn synthesize(&self, request: &SynthesisRequest) -> TtsResult<SynthesizedAudio> {
        if request.text.trim().is_empty() {
            return Err(TtsError::InvalidInput("text must not be empty".to_string()));
        }

        let started = Instant::now();
        let aggregator = Arc::new(AudioEventAggregator::new());
        let sink: Arc<dyn EventSink> = aggregator.clone();

        info!(
            "Realtime synthesis: model={}, voice={}, chars={}",
            request.model,
            request.voice,
            request.text.chars().count()
        );

        let mut session = self.connector.open(&request.model, sink).await?;
        let outcome = self.drive(session.as_mut(), request, &aggregator).await;
        session.close().await;

        let result = match outcome {
            Ok(outcome) => self.collect(outcome, &aggregator),
            // A send that failed because the provider reported an error and hung up
            // surfaces as that error, not as the broken write.
            Err(e) => match aggregator.error() {
                Some(message) => {
                    debug!("Send failed after provider error: {}", e);
                    Err(TtsError::RemoteSynthesis(message))
                }
                None => Err(e),
            },
        };
        match &result {
            Ok(audio) => info!(
                "Realtime synthesis done in {:.2}s: {} bytes PCM, {} ms audio",
                started.elapsed().as_secs_f64(),
                audio.pcm_bytes,
                audio.duration_ms
            ),
            Err(e) => warn!("Realtime synthesis failed after {:.2}s: {}", started.elapsed().as_secs_f64(), e),
        }
        result
    }

    async fn drive(
        &self,
        session: &mut dyn SynthesisSession,
        request: &SynthesisRequest,
        aggregator: &AudioEventAggregator,
    ) -> TtsResult<WaitOutcome> {
        let params = SessionParams {
            voice: request.voice.clone(),
            response_format: self.format,
            mode: self.commit_mode,
            language_type: request.language_type.clone(),
        };
        session.configure(&params).await?;

        let slices = slice_text(&request.text, self.pacing.max_chars);
        debug!("Sending {} text slice(s)", slices.len());
        for (i, slice) in slices.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(self.pacing.delay).await;
            }
            if aggregator.is_complete() {
                // The provider already ended the session (usually an error); stop feeding it.
                debug!("Session completed early, {} slice(s) not sent", slices.len() - i);
                return Ok(WaitOutcome::Completed);
            }
            session.append_text(slice).await?;
        }

        session.finish().await?;
        Ok(aggregator.wait_for_completion(self.timeout).await)
    }

    fn collect(&self, outcome: WaitOutcome, aggregator: &AudioEventAggregator) -> TtsResult<SynthesizedAudio> {
        if let Some(message) = aggregator.error() {
            return Err(TtsError::RemoteSynthesis(message));
        }
        if outcome == WaitOutcome::TimedOut {
            return Err(TtsError::Timeout(self.timeout));
        }

        let pcm = aggregator.collected_audio();
        if pcm.is_empty() {
            return Err(TtsError::EmptyResult);
        }

        let format = self.format;
        let wav = encode_pcm_wav(&pcm, format.sample_rate, format.channels, format.bits_per_sample);
        let duration_ms = (pcm.len() as u64 * 1000) / format.byte_rate().max(1) as u64;

        Ok(SynthesizedAudio {
            wav,
            pcm_bytes: pcm.len(),
            sample_rate: format.sample_rate,
            duration_ms,
        })
    }
}
