//! Test fixtures for integration tests
//!
//! Provides a mock origin server and a helper that drives the gateway router
//! in-process.

use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode};
use axum::Router;
use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;
use tower::util::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::config::{CacheConfig, GatewayConfig, SignConfig};
use crate::http::create_router;
use crate::state::AppState;

pub const SECRET: &str = "integration-secret";

/// Simple media playlist with one relative segment
pub const SIMPLE_PLAYLIST: &str = "#EXTM3U\n#EXT-X-VERSION:3\nseg1.ts\n";

/// Encrypted media playlist with a relative key and two segments
pub const ENCRYPTED_PLAYLIST: &str = "#EXTM3U\n\
#EXT-X-VERSION:3\n\
#EXT-X-TARGETDURATION:4\n\
#EXT-X-KEY:METHOD=AES-128,URI=\"keys/k1.bin\",IV=0x00000000000000000000000000000001\n\
#EXTINF:4.0,\n\
seg0.ts\n\
#EXTINF:4.0,\n\
seg1.ts\n\
#EXT-X-ENDLIST\n";

/// Ten bytes of segment payload
pub const SEGMENT_BYTES: &[u8] = b"0123456789";

/// Sixteen bytes of key material
pub const KEY_BYTES: &[u8] = b"ABCDEFGHIJKLMNOP";

/// Mock origin serving playlists, segments and keys
pub struct TestOrigin {
    pub server: MockServer,
}

impl TestOrigin {
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    pub fn url(&self, p: &str) -> String {
        format!("{}{}", self.server.uri(), p)
    }

    /// Serve `body` at `p`; `expected` pins the number of upstream hits.
    pub async fn serve(&self, p: &str, body: &[u8], content_type: &str, expected: Option<u64>) {
        let mock = Mock::given(method("GET")).and(path(p)).respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(body.to_vec())
                .insert_header("Content-Type", content_type),
        );
        match expected {
            Some(n) => mock.expect(n).mount(&self.server).await,
            None => mock.mount(&self.server).await,
        }
    }

    pub async fn fail(&self, p: &str, status: u16) {
        Mock::given(method("GET"))
            .and(path(p))
            .respond_with(ResponseTemplate::new(status))
            .mount(&self.server)
            .await;
    }
}

/// Gateway configuration allowing the mock origin, rewriting on, caches off
pub fn base_config() -> GatewayConfig {
    let mut config = GatewayConfig {
        allow_hosts: vec!["127.0.0.1".to_string()],
        cors_origins: vec!["*".to_string()],
        ..Default::default()
    };
    config.rewrite.enable_m3u8 = true;
    config
}

/// `base_config` with signing enabled
pub fn signed_config(ttl_secs: u64) -> GatewayConfig {
    GatewayConfig {
        sign: SignConfig {
            enabled: true,
            secret: SECRET.to_string(),
            ttl: Duration::from_secs(ttl_secs),
        },
        ..base_config()
    }
}

pub fn enabled_cache(max_entries: usize) -> CacheConfig {
    CacheConfig {
        enabled: true,
        ttl: Duration::from_secs(60),
        max_entries,
    }
}

pub fn gateway(config: GatewayConfig) -> Router {
    create_router(Arc::new(
        AppState::new(config).expect("test configuration is valid"),
    ))
}

/// Captured gateway response
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl TestResponse {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).expect("response body is JSON")
    }
}

/// Issue a GET against the router, optionally with a Range header.
pub async fn get(router: &Router, uri: &str, range: Option<&str>) -> TestResponse {
    let mut request = Request::builder().uri(uri);
    if let Some(range) = range {
        request = request.header("Range", range);
    }

    let response = router
        .clone()
        .oneshot(request.body(Body::empty()).expect("valid request"))
        .await
        .expect("router is infallible");

    let status = response.status();
    let headers = response.headers().clone();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body is readable");

    TestResponse {
        status,
        headers,
        body,
    }
}

/// Gateway-relative URL for an endpoint taking target `param`
pub fn endpoint(prefix: &str, param: &str, target: &str) -> String {
    format!("{}?{}={}", prefix, param, urlencoding::encode(target))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixture_configs() {
        let config = signed_config(600);
        assert!(config.sign.enabled);
        assert_eq!(config.allow_hosts, vec!["127.0.0.1"]);
        assert!(config.rewrite.enable_m3u8);
        assert!(!base_config().sign.enabled);
    }

    #[test]
    fn test_fixture_endpoint() {
        assert_eq!(
            endpoint("/seg", "u", "http://a.b/c d.ts"),
            "/seg?u=http%3A%2F%2Fa.b%2Fc%20d.ts"
        );
    }

    #[test]
    fn test_fixture_playlists_detected() {
        assert!(crate::rewrite::is_playlist(SIMPLE_PLAYLIST.as_bytes()));
        assert!(crate::rewrite::is_playlist(ENCRYPTED_PLAYLIST.as_bytes()));
        assert!(!crate::rewrite::is_playlist(SEGMENT_BYTES));
    }
}
