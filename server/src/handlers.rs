use std::time::Instant;

use axum::{
    extract::{Multipart, Query, State},
    http::{header, Uri},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;
use tts_core::{SynthesisRequest, DEFAULT_LANGUAGE_TYPE, DEFAULT_MODEL, DEFAULT_VOICE};
use voice_core::mime_for_extension;

use crate::error::ApiError;
use crate::metrics::{EndpointMetrics, MetricsResponse, SynthesisPath};
use crate::output;
use crate::validation::{validate_identifier, validate_language_type, validate_page_size, validate_synthesis_text};
use crate::AppState;

pub const DEFAULT_PREFERRED_NAME: &str = "custom_voice";
const DEFAULT_PAGE_SIZE: u32 = 20;

#[derive(Serialize)]
pub struct CreateVoiceResponse {
    success: bool,
    voice: String,
    target_model: String,
}

#[derive(Deserialize)]
pub struct ListVoicesParams {
    page_index: Option<u32>,
    page_size: Option<u32>,
}

#[derive(Serialize)]
pub struct ListVoicesResponse {
    success: bool,
    voices: Vec<Value>,
}

#[derive(Deserialize)]
pub struct DeleteVoiceRequest {
    #[serde(default)]
    voice: String,
}

#[derive(Serialize)]
pub struct DeleteVoiceResponse {
    success: bool,
    message: &'static str,
}

#[derive(Deserialize)]
pub struct SynthesizeRequest {
    #[serde(default)]
    text: String,
    voice: Option<String>,
    model: Option<String>,
    language_type: Option<String>,
}

fn track<T>(metrics: &EndpointMetrics, started: Instant, result: &Result<T, ApiError>) {
    metrics.record_request(started.elapsed().as_millis() as u64);
    if result.is_err() {
        metrics.record_error();
    }
}

/// Empty or missing form/JSON values fall back to the default.
fn or_default(value: Option<String>, default: &str) -> String {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

pub async fn health_check() -> &'static str {
    "ok"
}

pub async fn not_found(uri: Uri) -> ApiError {
    ApiError::NotFound(uri.path().to_string())
}

pub async fn metrics_endpoint(State(state): State<AppState>) -> Json<MetricsResponse> {
    Json(state.metrics.report())
}

pub async fn create_voice(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<CreateVoiceResponse>, ApiError> {
    state.metrics.count_request();
    let started = Instant::now();
    let result = enroll(&state, multipart).await;
    track(&state.metrics.voice, started, &result);
    result.map(Json)
}

async fn enroll(state: &AppState, mut multipart: Multipart) -> Result<CreateVoiceResponse, ApiError> {
    let bad_form = |e: axum::extract::multipart::MultipartError| ApiError::InvalidInput(format!("Invalid form data: {e}"));

    let mut audio: Option<(String, Vec<u8>)> = None;
    let mut target_model = None;
    let mut preferred_name = None;

    while let Some(field) = multipart.next_field().await.map_err(bad_form)? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("audio") => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let data = field.bytes().await.map_err(bad_form)?;
                audio = Some((filename, data.to_vec()));
            }
            Some("target_model") => target_model = Some(field.text().await.map_err(bad_form)?),
            Some("preferred_name") => preferred_name = Some(field.text().await.map_err(bad_form)?),
            _ => {}
        }
    }

    let (filename, audio) = audio
        .filter(|(_, data)| !data.is_empty())
        .ok_or_else(|| ApiError::InvalidInput("audio file is required".to_string()))?;
    let target_model = or_default(target_model, DEFAULT_MODEL);
    let preferred_name = or_default(preferred_name, DEFAULT_PREFERRED_NAME);
    validate_identifier("target_model", &target_model)?;
    validate_identifier("preferred_name", &preferred_name)?;

    let mime = mime_for_extension(&filename);
    let created = state
        .voices
        .create_voice(&audio, mime, &target_model, &preferred_name)
        .await?;
    info!("Voice created: {} (target model {})", created.voice, created.target_model);

    Ok(CreateVoiceResponse {
        success: true,
        voice: created.voice,
        target_model: created.target_model,
    })
}

pub async fn list_voices(
    State(state): State<AppState>,
    Query(params): Query<ListVoicesParams>,
) -> Result<Json<ListVoicesResponse>, ApiError> {
    state.metrics.count_request();
    let started = Instant::now();
    let result = list_page(&state, params).await;
    track(&state.metrics.voice, started, &result);

    Ok(Json(ListVoicesResponse {
        success: true,
        voices: result?,
    }))
}

async fn list_page(state: &AppState, params: ListVoicesParams) -> Result<Vec<Value>, ApiError> {
    let page_index = params.page_index.unwrap_or(0);
    let page_size = params.page_size.unwrap_or(DEFAULT_PAGE_SIZE);
    validate_page_size(page_size)?;
    Ok(state.voices.list_voices(page_index, page_size).await?)
}

pub async fn delete_voice(
    State(state): State<AppState>,
    Json(req): Json<DeleteVoiceRequest>,
) -> Result<Json<DeleteVoiceResponse>, ApiError> {
    state.metrics.count_request();
    let started = Instant::now();
    let result = remove(&state, req.voice.trim()).await;
    track(&state.metrics.voice, started, &result);
    result?;

    Ok(Json(DeleteVoiceResponse {
        success: true,
        message: "voice deleted",
    }))
}

async fn remove(state: &AppState, voice: &str) -> Result<(), ApiError> {
    if voice.is_empty() {
        return Err(ApiError::InvalidInput("voice is required".to_string()));
    }
    validate_identifier("voice", voice)?;
    state.voices.delete_voice(voice).await?;
    info!("Voice deleted: {}", voice);
    Ok(())
}

pub async fn synthesize(
    State(state): State<AppState>,
    Json(req): Json<SynthesizeRequest>,
) -> Result<Response, ApiError> {
    state.metrics.count_request();
    let started = Instant::now();
    let result = run_synthesis(&state, req).await;
    track(&state.metrics.synthesize, started, &result);

    let (path, audio) = result?;
    state
        .metrics
        .synthesis
        .record(path, started.elapsed().as_millis() as u64, audio.len());

    let filename = output::output_filename();
    output::persist(&state.config.output_dir, &filename, &audio).await;

    let headers = [
        (header::CONTENT_TYPE, "audio/wav".to_string()),
        (header::CONTENT_DISPOSITION, format!("inline; filename=\"{filename}\"")),
    ];
    Ok((headers, audio).into_response())
}

async fn run_synthesis(state: &AppState, req: SynthesizeRequest) -> Result<(SynthesisPath, Vec<u8>), ApiError> {
    let text = req.text.trim();
    validate_synthesis_text(text)?;

    let voice = or_default(req.voice, DEFAULT_VOICE);
    let model = or_default(req.model, DEFAULT_MODEL);
    let language_type = or_default(req.language_type, DEFAULT_LANGUAGE_TYPE);
    validate_identifier("voice", &voice)?;
    validate_identifier("model", &model)?;
    validate_language_type(&language_type)?;

    if state.config.is_non_streaming(&model) {
        let audio = state.voices.synthesize(&model, &voice, text).await?;
        return Ok((SynthesisPath::NonStreaming, audio));
    }

    let request = SynthesisRequest::new(text)
        .with_voice(voice)
        .with_model(model)
        .with_language_type(language_type);
    let audio = state.realtime.synthesize(&request).await?;
    Ok((SynthesisPath::Realtime, audio.wav))
}
