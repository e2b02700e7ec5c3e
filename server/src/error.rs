use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tts_core::TtsError;
use voice_core::VoiceError;

/// API Error types
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    InvalidInput(String),

    /// Provider answered with a non-success status; the same status is returned.
    #[error("{message}")]
    Upstream { status: u16, message: String },

    #[error(transparent)]
    Synthesis(#[from] TtsError),

    #[error("{0}")]
    Internal(String),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Not found: {0}")]
    NotFound(String),
}

impl From<VoiceError> for ApiError {
    fn from(err: VoiceError) -> Self {
        match err {
            VoiceError::Api { status, .. } => ApiError::Upstream {
                status,
                message: err.to_string(),
            },
            other => ApiError::Internal(other.to_string()),
        }
    }
}

/// Error response structure
#[derive(Serialize)]
struct ErrorResponse {
    success: bool,
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::InvalidInput(_) | ApiError::Synthesis(TtsError::InvalidInput(_)) => StatusCode::BAD_REQUEST,
            ApiError::Upstream { status, message } => {
                tracing::error!("Upstream error: {}", message);
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            ApiError::Synthesis(e) => {
                tracing::error!("Synthesis error: {}", e);
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ApiError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ApiError::RateLimitExceeded => StatusCode::TOO_MANY_REQUESTS,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
        };

        let body = Json(ErrorResponse {
            success: false,
            error: self.to_string(),
        });

        (status, body).into_response()
    }
}
