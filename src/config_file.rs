//! Configuration file support
//!
//! Loads gateway configuration from a JSON file. Zero or absent numeric
//! fields fall back to the documented defaults.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use crate::config::{
    parse_listen, CacheConfig, CachesConfig, GatewayConfig, HeaderRule, LimitsConfig,
    RewriteConfig, RuleMatch, SignConfig, UpstreamConfig, DEFAULT_MAX_PLAYLIST_KB,
    DEFAULT_MAX_REDIRECTS, DEFAULT_MAX_URL_LENGTH, DEFAULT_SIGN_TTL_SECS,
    DEFAULT_UPSTREAM_TIMEOUT_MS,
};
use crate::error::ConfigError;

/// Configuration file format
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ConfigFile {
    pub listen: String,
    pub allow_hosts: Vec<String>,
    pub cors: CorsSettings,
    pub sign: SignSettings,
    pub limits: LimitsSettings,
    pub rewrite: RewriteSettings,
    pub cache: CacheSettings,
    pub headers: Vec<HeaderRuleSettings>,
    pub upstream: UpstreamSettings,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CorsSettings {
    pub origins: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SignSettings {
    pub enabled: bool,
    pub secret: String,
    pub ttl_seconds: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsSettings {
    #[serde(rename = "maxPlaylistKB")]
    pub max_playlist_kb: usize,
    #[serde(rename = "maxURLLength")]
    pub max_url_length: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RewriteSettings {
    #[serde(rename = "enableM3U8")]
    pub enable_m3u8: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub m3u8: CacheClassSettings,
    pub key: CacheClassSettings,
    pub ts: CacheClassSettings,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CacheClassSettings {
    pub enabled: bool,
    pub ttl_seconds: u64,
    pub max_entries: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HeaderRuleSettings {
    #[serde(rename = "match")]
    pub pattern: String,
    pub use_regex: bool,
    pub set: BTreeMap<String, String>,
    pub host_rewrite: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UpstreamSettings {
    pub timeout_ms: u64,
    pub follow_redirects: Option<bool>,
    pub max_redirects: usize,
    pub http_proxy: String,
    pub socks5: String,
}

fn or_default<T: PartialEq + Default>(value: T, default: T) -> T {
    if value == T::default() {
        default
    } else {
        value
    }
}

fn non_empty(s: String) -> Option<String> {
    let s = s.trim().to_string();
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

impl ConfigFile {
    /// Load configuration from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|source| ConfigError::Read {
            path: path.as_ref().display().to_string(),
            source,
        })?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(content)?)
    }

    /// Apply defaults and validate
    pub fn into_gateway_config(self) -> Result<GatewayConfig, ConfigError> {
        let listen = parse_listen(&self.listen).ok_or(ConfigError::Listen(self.listen.clone()))?;

        if self.sign.enabled && self.sign.secret.is_empty() {
            return Err(ConfigError::MissingSecret);
        }

        let cache = |c: CacheClassSettings| CacheConfig {
            enabled: c.enabled,
            ttl: Duration::from_secs(c.ttl_seconds),
            max_entries: c.max_entries,
        };

        Ok(GatewayConfig {
            listen,
            allow_hosts: self
                .allow_hosts
                .into_iter()
                .filter_map(non_empty)
                .collect(),
            cors_origins: self.cors.origins,
            sign: SignConfig {
                enabled: self.sign.enabled,
                secret: self.sign.secret,
                ttl: Duration::from_secs(or_default(
                    self.sign.ttl_seconds,
                    DEFAULT_SIGN_TTL_SECS,
                )),
            },
            limits: LimitsConfig {
                max_playlist_bytes: (or_default(
                    self.limits.max_playlist_kb,
                    DEFAULT_MAX_PLAYLIST_KB,
                ) * 1024) as u64,
                max_url_length: or_default(self.limits.max_url_length, DEFAULT_MAX_URL_LENGTH),
            },
            rewrite: RewriteConfig {
                enable_m3u8: self.rewrite.enable_m3u8,
            },
            cache: CachesConfig {
                m3u8: cache(self.cache.m3u8),
                key: cache(self.cache.key),
                ts: cache(self.cache.ts),
            },
            headers: self
                .headers
                .into_iter()
                .map(|rule| HeaderRule {
                    matcher: if rule.use_regex {
                        RuleMatch::Regex(rule.pattern)
                    } else {
                        RuleMatch::Substring(rule.pattern)
                    },
                    set: rule.set,
                    host_rewrite: rule.host_rewrite,
                })
                .collect(),
            upstream: UpstreamConfig {
                timeout: Duration::from_millis(or_default(
                    self.upstream.timeout_ms,
                    DEFAULT_UPSTREAM_TIMEOUT_MS,
                )),
                follow_redirects: self.upstream.follow_redirects.unwrap_or(true),
                max_redirects: or_default(self.upstream.max_redirects, DEFAULT_MAX_REDIRECTS),
                http_proxy: non_empty(self.upstream.http_proxy),
                socks5: non_empty(self.upstream.socks5),
            },
        })
    }
}

/// Read, default and validate the configuration at `path`
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<GatewayConfig, ConfigError> {
    ConfigFile::from_file(path)?.into_gateway_config()
}
