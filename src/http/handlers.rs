//! HTTP request handlers
//!
//! Implements handlers for all gateway endpoints. Every proxied endpoint
//! validates in the same order: parameter, URL sanitation, length bound
//! (`/play` only), allow-list, then signature.

use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, HeaderValue},
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use serde::Deserialize;
use std::sync::Arc;

use crate::access::{is_allowed, sanitize_url};
use crate::error::{GatewayError, Result};
use crate::rewrite::{is_playlist, PlaylistRewriter};
use crate::signer::now_unix;
use crate::state::AppState;
use crate::upstream::{guess_content_type, MIME_HLS, MIME_OCTET_STREAM};

use super::range::serve_bytes;

/// Segment endpoint path, also used in rewritten playlists
pub const SEGMENT_ENDPOINT: &str = "/seg";
/// Key endpoint path, also used in rewritten playlists
pub const KEY_ENDPOINT: &str = "/key";

/// Segments at or above this size are served but not cached
const MAX_CACHED_SEGMENT_BYTES: usize = 1024 * 1024;

/// Query parameters accepted by the gateway endpoints
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ProxyQuery {
    pub url: String,
    pub u: String,
    pub raw: String,
    pub sign: String,
    pub ts: String,
}

/// Validate a target URL taken from the `param` query parameter.
///
/// `max_len` bounds the sanitized URL length when set.
fn validate_target(
    state: &AppState,
    value: &str,
    param: &str,
    max_len: Option<usize>,
) -> Result<String> {
    if value.is_empty() {
        return Err(GatewayError::invalid(format!("Missing '{}' parameter", param)));
    }

    let target = sanitize_url(value).ok_or_else(|| GatewayError::invalid("Invalid URL"))?;

    if max_len.is_some_and(|max| target.len() > max) {
        return Err(GatewayError::invalid("URL too long"));
    }

    if !is_allowed(&target, &state.config.allow_hosts) {
        tracing::debug!("Rejected target outside allow-list: {}", target);
        return Err(GatewayError::AccessDenied);
    }

    Ok(target)
}

fn playlist_response(data: Bytes) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(MIME_HLS));
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    (headers, data).into_response()
}

fn key_response(data: Bytes) -> Response {
    (
        [(header::CONTENT_TYPE, HeaderValue::from_static(MIME_OCTET_STREAM))],
        data,
    )
        .into_response()
}

/// Health check endpoint
/// GET /health
pub async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "time": now_unix(),
    }))
}

/// Issue a signed `/play` URL
/// GET /sign?raw=<url>
pub async fn sign_url(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ProxyQuery>,
) -> Result<Json<serde_json::Value>> {
    if !state.signer.is_enabled() {
        return Err(GatewayError::SigningDisabled);
    }

    let target = validate_target(&state, &query.raw, "raw", None)?;
    let token = state
        .signer
        .generate(&target)
        .ok_or(GatewayError::SigningDisabled)?;

    let proxy = format!("/play?url={}&{}", urlencoding::encode(&target), token.query());

    Ok(Json(serde_json::json!({
        "proxy": proxy,
        "sign": token.sign,
        "ts": token.ts,
    })))
}

/// Playlist endpoint
///
/// Playlists are rewritten and cached when rewriting is enabled. Everything
/// else, playlists included when rewriting is off, is passed through as-is
/// with Range support and is not cached.
/// GET /play?url=<url>[&sign=..&ts=..]
pub async fn play(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ProxyQuery>,
    headers: HeaderMap,
) -> Result<Response> {
    let max_len = state.config.limits.max_url_length;
    let target = validate_target(&state, &query.url, "url", Some(max_len))?;
    state.signer.verify(&target, &query.sign, &query.ts)?;

    if let Some(cached) = state.playlist_cache.get(&target) {
        return Ok(playlist_response(cached));
    }

    let fetched = state
        .fetcher
        .fetch(&target, &state.headers)
        .await
        .map_err(|e| GatewayError::upstream("content", e))?;

    if !state.config.rewrite.enable_m3u8 || !is_playlist(&fetched.body) {
        return serve_bytes(&headers, fetched.body, &fetched.content_type);
    }

    let rewritten = PlaylistRewriter::new("", SEGMENT_ENDPOINT, KEY_ENDPOINT)
        .with_token(&state.signer, &query.ts)
        .rewrite(&fetched.body, &target)
        .map_err(GatewayError::Rewrite)?;

    state.playlist_cache.set(&target, rewritten.clone());
    Ok(playlist_response(rewritten))
}

/// Media segment endpoint
/// GET /seg?u=<url>[&sign=..&ts=..]
pub async fn segment(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ProxyQuery>,
    headers: HeaderMap,
) -> Result<Response> {
    let target = validate_target(&state, &query.u, "u", None)?;
    state.signer.verify(&target, &query.sign, &query.ts)?;

    if let Some(cached) = state.segment_cache.get(&target) {
        return serve_bytes(&headers, cached, guess_content_type(&target));
    }

    let fetched = state
        .fetcher
        .fetch(&target, &state.headers)
        .await
        .map_err(|e| GatewayError::upstream("segment", e))?;

    if fetched.body.len() < MAX_CACHED_SEGMENT_BYTES {
        state.segment_cache.set(&target, fetched.body.clone());
    }

    serve_bytes(&headers, fetched.body, &fetched.content_type)
}

/// Encryption key endpoint; no Range support
/// GET /key?u=<url>[&sign=..&ts=..]
pub async fn key(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ProxyQuery>,
) -> Result<Response> {
    let target = validate_target(&state, &query.u, "u", None)?;
    state.signer.verify(&target, &query.sign, &query.ts)?;

    if let Some(cached) = state.key_cache.get(&target) {
        return Ok(key_response(cached));
    }

    let fetched = state
        .fetcher
        .fetch(&target, &state.headers)
        .await
        .map_err(|e| GatewayError::upstream("key", e))?;

    state.key_cache.set(&target, fetched.body.clone());
    Ok(key_response(fetched.body))
}

/// Unsigned pass-through, never cached or rewritten
/// GET /raw?url=<url>
pub async fn raw(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ProxyQuery>,
    headers: HeaderMap,
) -> Result<Response> {
    let target = validate_target(&state, &query.url, "url", None)?;

    let fetched = state
        .fetcher
        .fetch(&target, &state.headers)
        .await
        .map_err(|e| GatewayError::upstream("content", e))?;

    serve_bytes(&headers, fetched.body, &fetched.content_type)
}

/// Debug endpoint - cache statistics
/// GET /debug/cache
pub async fn cache_stats(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "m3u8": state.playlist_cache.stats(),
        "key": state.key_cache.stats(),
        "ts": state.segment_cache.stats(),
    }))
}
