pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod output;
pub mod validation;

use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, Request},
    http::{HeaderValue, Method},
    middleware::Next,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::GlobalKeyExtractor, GovernorError, GovernorLayer,
};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    services::ServeFile,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{info, warn};
use tts_core::{DashScopeRealtime, RealtimeSynthesizer, SessionConnector};
use voice_core::VoiceClient;

use crate::config::ServerConfig;
use crate::error::ApiError;
use crate::metrics::AppMetrics;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub realtime: RealtimeSynthesizer,
    pub voices: VoiceClient,
    pub metrics: AppMetrics,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Self {
        let connector = Arc::new(DashScopeRealtime::new(&config.ws_url, &config.api_key));
        Self::with_connector(config, connector)
    }

    /// State whose realtime sessions come from `connector`.
    pub fn with_connector(config: ServerConfig, connector: Arc<dyn SessionConnector>) -> Self {
        let realtime = RealtimeSynthesizer::new(connector)
            .with_pacing(config.text_pacing())
            .with_timeout(config.synthesis_timeout());
        let voices = VoiceClient::new(&config.api_key, &config.http_api_url);

        Self {
            config: Arc::new(config),
            realtime,
            voices,
            metrics: AppMetrics::new(),
        }
    }
}

// Request ID middleware for tracing
async fn add_request_id(mut request: Request, next: Next) -> Response {
    let request_id = HeaderValue::from_str(&uuid::Uuid::new_v4().to_string())
        .unwrap_or_else(|_| HeaderValue::from_static("unknown"));
    request.headers_mut().insert("x-request-id", request_id.clone());
    let mut response = next.run(request).await;
    response.headers_mut().insert("x-request-id", request_id);
    response
}

pub fn cors_layer(allowed_origins: Option<&[String]>) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any)
        .allow_credentials(false);

    let Some(allowed_origins) = allowed_origins else {
        warn!("CORS_ALLOWED_ORIGINS not set, allowing all origins (development mode)");
        return base.allow_origin(Any);
    };

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| origin.parse::<HeaderValue>().ok())
        .collect();
    if origins.is_empty() {
        warn!("CORS_ALLOWED_ORIGINS is empty, falling back to permissive CORS");
        base.allow_origin(Any)
    } else {
        info!("CORS configured for {} origin(s)", origins.len());
        base.allow_origin(AllowOrigin::list(origins))
    }
}

fn rate_limited(err: GovernorError) -> Response {
    warn!("Request rejected by rate limiter: {}", err);
    let mut response = ApiError::RateLimitExceeded.into_response();
    if let GovernorError::TooManyRequests { headers: Some(headers), .. } = err {
        response.headers_mut().extend(headers);
    }
    response
}

/// Wrap `router` in a global limit of `per_minute` requests (burst of the same size).
/// Returns `None` when the limiter cannot be built from the given rate.
pub fn with_rate_limit(router: Router, per_minute: u32) -> Option<Router> {
    // Using GlobalKeyExtractor to rate limit globally (all requests share the same limit)
    let per_minute = per_minute.max(1);
    let governor_conf = GovernorConfigBuilder::default()
        .per_millisecond((60_000 / per_minute as u64).max(1))
        .burst_size(per_minute)
        .key_extractor(GlobalKeyExtractor)
        .finish()?;

    let layer = GovernorLayer::new(Arc::new(governor_conf)).error_handler(rate_limited);
    Some(router.layer(layer))
}

/// All routes and middleware except rate limiting, which the binary adds.
pub fn build_router(state: AppState) -> Router {
    let config = Arc::clone(&state.config);

    let middleware_stack = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(config.request_timeout()))
        .layer(cors_layer(config.cors_allowed_origins.as_deref()))
        .into_inner();

    let api = Router::new()
        .route("/voice/create", post(handlers::create_voice))
        .route("/voice/list", get(handlers::list_voices))
        .route("/voice/delete", post(handlers::delete_voice))
        .route("/tts/synthesize", post(handlers::synthesize));

    Router::new()
        .route_service("/", ServeFile::new(&config.index_page))
        .route("/health", get(handlers::health_check))
        .route("/healthz", get(handlers::health_check))
        .route("/metrics", get(handlers::metrics_endpoint))
        .nest("/api", api)
        .fallback(handlers::not_found)
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(config.max_upload_bytes))
        .layer(axum::middleware::from_fn(add_request_id))
        .layer(middleware_stack)
        .with_state(state)
}
