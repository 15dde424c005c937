//! Outbound fetches to origin hosts
//!
//! One GET per call, no retries. Responses are buffered in full.

use bytes::Bytes;
use reqwest::{header, Client, Proxy, StatusCode};
use thiserror::Error;

use crate::config::{LimitsConfig, UpstreamConfig};
use crate::error::ConfigError;
use crate::headers::HeaderPolicy;

pub const MIME_HLS: &str = "application/vnd.apple.mpegurl";
pub const MIME_MPEG_TS: &str = "video/mp2t";
pub const MIME_MP4: &str = "video/mp4";
pub const MIME_OCTET_STREAM: &str = "application/octet-stream";

/// Upstream fetch failures
#[derive(Error, Debug)]
pub enum UpstreamError {
    #[error("upstream returned {0}")]
    Status(u16),

    #[error("content too large: {length} bytes (limit {limit})")]
    TooLarge { length: u64, limit: u64 },

    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
}

/// A fetched resource
#[derive(Debug, Clone)]
pub struct Fetched {
    pub body: Bytes,
    pub content_type: String,
}

/// Performs single outbound GETs with policy-derived headers
#[derive(Debug, Clone)]
pub struct UpstreamFetcher {
    client: Client,
    /// Largest declared Content-Length accepted
    max_body_bytes: u64,
}

impl UpstreamFetcher {
    /// Build the outbound client: timeout, redirect policy and optional proxies.
    pub fn new(config: &UpstreamConfig, limits: &LimitsConfig) -> Result<Self, ConfigError> {
        let redirect = if config.follow_redirects {
            reqwest::redirect::Policy::limited(config.max_redirects)
        } else {
            reqwest::redirect::Policy::none()
        };

        let mut builder = Client::builder().timeout(config.timeout).redirect(redirect);

        if let Some(proxy) = &config.http_proxy {
            builder = builder
                .proxy(Proxy::all(proxy.as_str()).map_err(|_| ConfigError::Proxy(proxy.clone()))?);
        }
        if let Some(socks) = &config.socks5 {
            let socks_url = if socks.contains("://") {
                socks.clone()
            } else {
                format!("socks5://{}", socks)
            };
            builder = builder
                .proxy(Proxy::all(socks_url.as_str()).map_err(|_| ConfigError::Proxy(socks.clone()))?);
        }

        Ok(Self {
            client: builder.build()?,
            max_body_bytes: limits.max_playlist_bytes,
        })
    }

    /// GET `url` with headers from `policy`.
    ///
    /// When the declared Content-Length exceeds the configured playlist size
    /// limit, the fetch fails before the body is read. Without a
    /// Content-Length no cap applies.
    pub async fn fetch(&self, url: &str, policy: &HeaderPolicy) -> Result<Fetched, UpstreamError> {
        let headers = policy.process(url, HeaderPolicy::base_headers());

        tracing::debug!("Fetching upstream {}", url);
        let response = self.client.get(url).headers(headers).send().await?;

        if response.status() != StatusCode::OK {
            return Err(UpstreamError::Status(response.status().as_u16()));
        }

        let declared = response
            .headers()
            .get(header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok());
        if let Some(length) = declared.filter(|&l| l > self.max_body_bytes) {
            return Err(UpstreamError::TooLarge {
                length,
                limit: self.max_body_bytes,
            });
        }

        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| guess_content_type(url).to_string());

        let body = response.bytes().await?;
        tracing::debug!("Fetched {} bytes from {}", body.len(), url);

        Ok(Fetched { body, content_type })
    }
}

/// Guess a media type from the URL.
pub fn guess_content_type(url: &str) -> &'static str {
    let url = url.to_ascii_lowercase();
    if url.contains(".m3u8") {
        MIME_HLS
    } else if url.contains(".ts") {
        MIME_MPEG_TS
    } else if url.contains(".mp4") {
        MIME_MP4
    } else {
        MIME_OCTET_STREAM
    }
}
