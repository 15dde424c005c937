//! Application state management
//!
//! This module defines the AppState structure that holds:
//! - Gateway configuration
//! - URL signer and outbound header policy
//! - Playlist, key and segment caches
//! - Upstream HTTP client

use crate::cache::{CacheClass, ResourceCache};
use crate::config::GatewayConfig;
use crate::error::ConfigError;
use crate::headers::HeaderPolicy;
use crate::signer::Signer;
use crate::upstream::UpstreamFetcher;

/// Application state shared across handlers
#[derive(Debug)]
pub struct AppState {
    /// Gateway configuration
    pub config: GatewayConfig,

    pub signer: Signer,

    /// Compiled outbound header rules
    pub headers: HeaderPolicy,

    /// Rewritten playlists, keyed by target URL
    pub playlist_cache: ResourceCache,

    /// Encryption keys
    pub key_cache: ResourceCache,

    /// Media segments under 1 MB
    pub segment_cache: ResourceCache,

    pub fetcher: UpstreamFetcher,
}

impl AppState {
    /// Create application state. Fails on invalid header rules or proxies.
    pub fn new(config: GatewayConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            signer: Signer::new(&config.sign),
            headers: HeaderPolicy::new(&config.headers)?,
            playlist_cache: ResourceCache::new(CacheClass::Playlist, &config.cache.m3u8),
            key_cache: ResourceCache::new(CacheClass::Key, &config.cache.key),
            segment_cache: ResourceCache::new(CacheClass::Segment, &config.cache.ts),
            fetcher: UpstreamFetcher::new(&config.upstream, &config.limits)?,
            config,
        })
    }
}
