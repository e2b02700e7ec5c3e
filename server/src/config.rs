// Server configuration, read from the environment

use std::path::PathBuf;
use std::time::Duration;

use tts_core::{TextPacing, DASHSCOPE_REALTIME_URL};
use voice_core::DASHSCOPE_HTTP_API_URL;

/// Value shipped in the sample `.env`; treated as "not configured".
pub const PLACEHOLDER_API_KEY: &str = "sk-your-api-key-here";

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub api_key: String,
    pub ws_url: String,
    pub http_api_url: String,
    pub output_dir: PathBuf,
    pub index_page: PathBuf,
    pub synthesis_timeout_secs: u64,
    pub text_chunk_chars: usize,
    pub text_pacing_ms: u64,
    pub non_streaming_models: Vec<String>,
    pub rate_limit_per_minute: u32,
    pub request_timeout_secs: u64,
    pub max_upload_bytes: usize,
    pub cors_allowed_origins: Option<Vec<String>>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 5000,
            api_key: String::new(),
            ws_url: DASHSCOPE_REALTIME_URL.to_string(),
            http_api_url: DASHSCOPE_HTTP_API_URL.to_string(),
            output_dir: PathBuf::from("outputs"),
            index_page: PathBuf::from("templates/index.html"),
            synthesis_timeout_secs: 120,
            text_chunk_chars: 80,
            text_pacing_ms: 50,
            non_streaming_models: vec!["qwen3-tts-vc-2026-01-22".to_string()],
            rate_limit_per_minute: 60,
            request_timeout_secs: 180,
            max_upload_bytes: 20 * 1024 * 1024,
            cors_allowed_origins: None,
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

fn env_list(key: &str) -> Option<Vec<String>> {
    std::env::var(key).ok().map(|value| {
        value
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    })
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            port: env_parse("PORT").unwrap_or(defaults.port),
            api_key: std::env::var("DASHSCOPE_API_KEY").unwrap_or(defaults.api_key),
            ws_url: std::env::var("DASHSCOPE_WS_URL").unwrap_or(defaults.ws_url),
            http_api_url: std::env::var("DASHSCOPE_HTTP_API_URL").unwrap_or(defaults.http_api_url),
            output_dir: std::env::var("OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.output_dir),
            index_page: defaults.index_page,
            synthesis_timeout_secs: env_parse("SYNTHESIS_TIMEOUT_SECS").unwrap_or(defaults.synthesis_timeout_secs),
            text_chunk_chars: env_parse("TEXT_CHUNK_CHARS").unwrap_or(defaults.text_chunk_chars),
            text_pacing_ms: env_parse("TEXT_PACING_MS").unwrap_or(defaults.text_pacing_ms),
            non_streaming_models: env_list("NON_STREAMING_MODELS").unwrap_or(defaults.non_streaming_models),
            rate_limit_per_minute: env_parse("RATE_LIMIT_PER_MINUTE").unwrap_or(defaults.rate_limit_per_minute),
            request_timeout_secs: env_parse("REQUEST_TIMEOUT_SECS").unwrap_or(defaults.request_timeout_secs),
            max_upload_bytes: env_parse("MAX_UPLOAD_BYTES").unwrap_or(defaults.max_upload_bytes),
            cors_allowed_origins: env_list("CORS_ALLOWED_ORIGINS"),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn synthesis_timeout(&self) -> Duration {
        Duration::from_secs(self.synthesis_timeout_secs)
    }

    pub fn text_pacing(&self) -> TextPacing {
        TextPacing::new(self.text_chunk_chars, Duration::from_millis(self.text_pacing_ms))
    }

    pub fn is_non_streaming(&self, model: &str) -> bool {
        self.non_streaming_models.iter().any(|m| m == model)
    }

    pub fn has_api_key(&self) -> bool {
        let key = self.api_key.trim();
        !key.is_empty() && key != PLACEHOLDER_API_KEY
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.port, 5000);
        assert_eq!(config.synthesis_timeout(), Duration::from_secs(120));
        assert!(config.request_timeout() > config.synthesis_timeout());
        assert_eq!(config.text_pacing().max_chars, 80);
        assert_eq!(config.text_pacing().delay, Duration::from_millis(50));
    }

    #[test]
    fn test_non_streaming_models() {
        let config = ServerConfig::default();
        assert!(config.is_non_streaming("qwen3-tts-vc-2026-01-22"));
        assert!(!config.is_non_streaming("qwen3-tts-vc-realtime-2026-01-15"));
    }

    #[test]
    fn test_api_key_placeholder() {
        let mut config = ServerConfig::default();
        assert!(!config.has_api_key());
        config.api_key = PLACEHOLDER_API_KEY.to_string();
        assert!(!config.has_api_key());
        config.api_key = "sk-live".to_string();
        assert!(config.has_api_key());
    }
}
