//! HLS Gateway server binary

use clap::Parser;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use hls_gateway::config_file::load_config;
use hls_gateway::error::ConfigError;
use hls_gateway::http::create_router;
use hls_gateway::state::AppState;

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
const APP_NAME: &str = "hls-gateway";

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the JSON configuration file
    #[arg(short, long, default_value = "config.json")]
    config: String,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> Result<(), ConfigError> {
    let args = Args::parse();

    // Initialize logging
    init_logging(args.json_logs);

    tracing::info!("{} v{} starting", APP_NAME, VERSION);

    // Load configuration
    let config = load_config(&args.config).inspect_err(|e| {
        tracing::error!("Failed to load config {}: {}", args.config, e);
    })?;

    tracing::info!(
        "Signing {}, {} allowed host(s), playlist rewriting {}",
        if config.sign.enabled { "enabled" } else { "disabled" },
        config.allow_hosts.len(),
        if config.rewrite.enable_m3u8 { "enabled" } else { "disabled" },
    );
    if config.allow_hosts.is_empty() {
        tracing::warn!("allowHosts is empty; every proxied request will be rejected");
    }
    if config.playlist_cache_outlives_tokens() {
        tracing::warn!(
            "m3u8 cache TTL ({}s) is not below sign TTL ({}s); cached playlists may carry expired tokens",
            config.cache.m3u8.ttl.as_secs(),
            config.sign.ttl.as_secs(),
        );
    }

    let addr = config.listen;

    // Create application state
    let state = Arc::new(AppState::new(config).inspect_err(|e| {
        tracing::error!("Invalid configuration: {}", e);
    })?);

    // Build router
    let app = create_router(state);

    // Start server
    tracing::info!("Starting HTTP server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Initialize logging with tracing
fn init_logging(json: bool) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "hls_gateway=info,tower_http=info".into()),
        )
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(|| tracing_subscriber::fmt::layer()))
        .init();
}
