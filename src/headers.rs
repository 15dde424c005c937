//! Outbound header policy
//!
//! Header rules are matched against the target hostname in configuration
//! order. Every matching rule overwrites the headers it names, so later
//! rules win.

use regex::Regex;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, HOST, USER_AGENT};

use crate::access::hostname;
use crate::config::{HeaderRule, RuleMatch};
use crate::error::ConfigError;

/// Agent string sent when no rule overrides it
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (compatible; HlsGateway/1.0)";

#[derive(Debug)]
enum Matcher {
    Substring(String),
    Regex(Regex),
}

impl Matcher {
    fn matches(&self, host: &str) -> bool {
        match self {
            Matcher::Substring(pattern) => host.contains(pattern.as_str()),
            Matcher::Regex(re) => re.is_match(host),
        }
    }
}

#[derive(Debug)]
struct CompiledRule {
    matcher: Matcher,
    set: Vec<(HeaderName, HeaderValue)>,
    host_rewrite: bool,
}

/// Derives outbound request headers from per-host rules
#[derive(Debug, Default)]
pub struct HeaderPolicy {
    rules: Vec<CompiledRule>,
}

impl HeaderPolicy {
    /// Compile rules. Bad regexes or header names are a startup error.
    pub fn new(rules: &[HeaderRule]) -> Result<Self, ConfigError> {
        let rules = rules
            .iter()
            .map(compile_rule)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { rules })
    }

    /// Headers every outbound request starts from
    pub fn base_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(DEFAULT_USER_AGENT));
        headers
    }

    /// Apply every rule matching the target's hostname on top of `base`.
    pub fn process(&self, target_url: &str, base: HeaderMap) -> HeaderMap {
        let mut result = base;

        let Some(host) = hostname(target_url) else {
            return result;
        };

        for rule in self.rules.iter().filter(|r| r.matcher.matches(&host)) {
            for (name, value) in &rule.set {
                result.insert(name.clone(), value.clone());
            }
            if rule.host_rewrite {
                if let Ok(value) = HeaderValue::from_str(&host) {
                    result.insert(HOST, value);
                }
            }
        }

        result
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

fn compile_rule(rule: &HeaderRule) -> Result<CompiledRule, ConfigError> {
    let (pattern, matcher) = match &rule.matcher {
        RuleMatch::Substring(p) => (p, Matcher::Substring(p.clone())),
        RuleMatch::Regex(p) => {
            let re = Regex::new(p).map_err(|e| ConfigError::HeaderRule {
                pattern: p.clone(),
                reason: e.to_string(),
            })?;
            (p, Matcher::Regex(re))
        }
    };

    let set = rule
        .set
        .iter()
        .map(|(name, value)| -> Result<(HeaderName, HeaderValue), ConfigError> {
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
                ConfigError::HeaderRule {
                    pattern: pattern.clone(),
                    reason: format!("header name {:?}: {}", name, e),
                }
            })?;
            let value = HeaderValue::from_str(value).map_err(|e| ConfigError::HeaderRule {
                pattern: pattern.clone(),
                reason: format!("header value for {}: {}", name, e),
            })?;
            Ok((name, value))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(CompiledRule {
        matcher,
        set,
        host_rewrite: rule.host_rewrite,
    })
}
