use std::net::SocketAddr;

use tokio::net::TcpListener;
use tracing::{info, warn};

use server::{build_router, config::ServerConfig, with_rate_limit, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // Crypto provider for the realtime WebSocket TLS connections
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install default crypto provider"))?;

    async_main().await
}

async fn async_main() -> anyhow::Result<()> {
    info!("Starting voice synthesis server...");

    let config = ServerConfig::from_env();
    if !config.has_api_key() {
        warn!("DASHSCOPE_API_KEY is not configured; set it in .env before calling the synthesis or voice APIs");
    }

    tokio::fs::create_dir_all(&config.output_dir).await.map_err(|e| {
        anyhow::anyhow!("Failed to create output directory {}: {e}", config.output_dir.display())
    })?;

    info!(
        "Server configuration loaded: port={}, rate_limit={}/min, synthesis_timeout={}s, realtime endpoint={}",
        config.port, config.rate_limit_per_minute, config.synthesis_timeout_secs, config.ws_url
    );

    let per_minute = config.rate_limit_per_minute.max(1);
    let port = config.port;
    let app = with_rate_limit(build_router(AppState::new(config)), per_minute)
        .ok_or_else(|| anyhow::anyhow!("Invalid rate limit configuration"))?;
    info!("Rate limiting: {} requests per minute", per_minute);

    let addr: SocketAddr = format!("0.0.0.0:{}", port).parse()?;
    let listener = TcpListener::bind(addr).await.map_err(|e| {
        anyhow::anyhow!("Failed to bind {addr}: {e}. Try a different PORT.")
    })?;

    info!("Server listening on http://{addr}");
    axum::serve(listener, app).await?;
    Ok(())
}
