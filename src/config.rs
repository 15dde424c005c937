//! Gateway configuration
//!
//! `GatewayConfig` is the resolved form of the JSON config file: defaults
//! applied, units converted, addresses parsed. It is built once at startup
//! and never mutated afterwards.

use std::collections::BTreeMap;
use std::net::{SocketAddr, ToSocketAddrs};
use std::time::Duration;

/// Default signature lifetime
pub const DEFAULT_SIGN_TTL_SECS: u64 = 600;
/// Default playlist size limit in kilobytes
pub const DEFAULT_MAX_PLAYLIST_KB: usize = 512;
/// Default maximum length of the `/play` target URL
pub const DEFAULT_MAX_URL_LENGTH: usize = 2048;
/// Default upstream timeout in milliseconds
pub const DEFAULT_UPSTREAM_TIMEOUT_MS: u64 = 15_000;
/// Default redirect hop limit
pub const DEFAULT_MAX_REDIRECTS: usize = 5;
/// Default listen address
pub const DEFAULT_LISTEN: &str = "0.0.0.0:8080";

/// URL signing configuration
#[derive(Debug, Clone)]
pub struct SignConfig {
    pub enabled: bool,
    pub secret: String,
    pub ttl: Duration,
}

impl Default for SignConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            secret: String::new(),
            ttl: Duration::from_secs(DEFAULT_SIGN_TTL_SECS),
        }
    }
}

/// Input size limits
#[derive(Debug, Clone)]
pub struct LimitsConfig {
    /// Maximum declared Content-Length of a fetched playlist
    pub max_playlist_bytes: u64,
    /// Maximum length of the `/play` target URL
    pub max_url_length: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_playlist_bytes: (DEFAULT_MAX_PLAYLIST_KB * 1024) as u64,
            max_url_length: DEFAULT_MAX_URL_LENGTH,
        }
    }
}

/// Playlist rewriting switches
#[derive(Debug, Clone, Default)]
pub struct RewriteConfig {
    pub enable_m3u8: bool,
}

/// Settings for one resource cache
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub enabled: bool,
    pub ttl: Duration,
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            ttl: Duration::ZERO,
            max_entries: 0,
        }
    }
}

/// The three independently configured caches
#[derive(Debug, Clone, Default)]
pub struct CachesConfig {
    pub m3u8: CacheConfig,
    pub key: CacheConfig,
    pub ts: CacheConfig,
}

/// How a header rule selects target hosts
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleMatch {
    /// Pattern is a substring of the hostname
    Substring(String),
    /// Pattern is a regular expression tested against the hostname
    Regex(String),
}

/// Per-host outbound header rule
#[derive(Debug, Clone)]
pub struct HeaderRule {
    pub matcher: RuleMatch,
    pub set: BTreeMap<String, String>,
    pub host_rewrite: bool,
}

/// Outbound client settings
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    pub timeout: Duration,
    pub follow_redirects: bool,
    pub max_redirects: usize,
    pub http_proxy: Option<String>,
    pub socks5: Option<String>,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(DEFAULT_UPSTREAM_TIMEOUT_MS),
            follow_redirects: true,
            max_redirects: DEFAULT_MAX_REDIRECTS,
            http_proxy: None,
            socks5: None,
        }
    }
}

/// Gateway configuration
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Address to listen on
    pub listen: SocketAddr,
    /// Origin hostnames the gateway may fetch from
    pub allow_hosts: Vec<String>,
    /// CORS origins; `"*"` allows any
    pub cors_origins: Vec<String>,
    pub sign: SignConfig,
    pub limits: LimitsConfig,
    pub rewrite: RewriteConfig,
    pub cache: CachesConfig,
    /// Header rules, applied in order
    pub headers: Vec<HeaderRule>,
    pub upstream: UpstreamConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([0, 0, 0, 0], 8080)),
            allow_hosts: Vec::new(),
            cors_origins: Vec::new(),
            sign: SignConfig::default(),
            limits: LimitsConfig::default(),
            rewrite: RewriteConfig::default(),
            cache: CachesConfig::default(),
            headers: Vec::new(),
            upstream: UpstreamConfig::default(),
        }
    }
}

impl GatewayConfig {
    /// True when a cached playlist can outlive the tokens embedded in it.
    ///
    /// Rewritten playlists carry references signed with the `ts` of the
    /// request that filled the cache, so a hit served after the signature
    /// TTL hands out references that no longer verify.
    pub fn playlist_cache_outlives_tokens(&self) -> bool {
        self.sign.enabled
            && self.rewrite.enable_m3u8
            && self.cache.m3u8.enabled
            && self.cache.m3u8.max_entries > 0
            && self.cache.m3u8.ttl >= self.sign.ttl
    }
}

/// Parse a listen address. A bare `:port` binds every interface.
///
/// Hostnames are resolved once, and the first address returned is used.
pub fn parse_listen(listen: &str) -> Option<SocketAddr> {
    let listen = listen.trim();
    if listen.is_empty() {
        return DEFAULT_LISTEN.parse().ok();
    }
    if let Some(port) = listen.strip_prefix(':') {
        return format!("0.0.0.0:{}", port).parse().ok();
    }
    match listen.parse() {
        Ok(addr) => Some(addr),
        Err(_) => listen.to_socket_addrs().ok()?.next(),
    }
}
