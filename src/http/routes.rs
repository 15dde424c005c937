//! Axum router configuration

use axum::{
    http::{header, HeaderValue, Method},
    routing::get,
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

use super::handlers::{
    cache_stats, health_check, key, play, raw, segment, sign_url, KEY_ENDPOINT,
    SEGMENT_ENDPOINT,
};

/// Build the CORS layer from the configured origins.
///
/// `"*"` allows any origin. With no origins configured no
/// `Access-Control-Allow-Origin` header is sent at all.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let mut cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::RANGE])
        .expose_headers([header::CONTENT_RANGE, header::ACCEPT_RANGES])
        .max_age(Duration::from_secs(3600));

    if origins.iter().any(|o| o.trim() == "*") {
        cors = cors.allow_origin(AllowOrigin::any());
    } else if !origins.is_empty() {
        let list: Vec<HeaderValue> = origins
            .iter()
            .filter_map(|o| HeaderValue::from_str(o.trim()).ok())
            .collect();
        cors = cors.allow_origin(AllowOrigin::list(list));
    }

    cors
}

/// Create the Axum router with all routes
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = cors_layer(&state.config.cors_origins);

    Router::new()
        .route("/health", get(health_check))
        .route("/sign", get(sign_url))
        .route("/play", get(play))
        .route(SEGMENT_ENDPOINT, get(segment))
        .route(KEY_ENDPOINT, get(key))
        .route("/raw", get(raw))
        // Debug endpoints
        .route("/debug/cache", get(cache_stats))
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        // State
        .with_state(state)
}
