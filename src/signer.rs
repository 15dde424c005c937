//! Time-bounded HMAC signatures over target URLs
//!
//! A token is `(hex(HMAC-SHA256(url + "|" + ts)), ts)` where `ts` is the
//! issuance time in unix seconds. Nothing is stored, so tokens cannot be
//! revoked; they simply age out after the configured TTL.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

use crate::config::SignConfig;

type HmacSha256 = Hmac<Sha256>;

/// Reasons a presented token is rejected
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    #[error("missing signature parameters")]
    Missing,

    #[error("invalid timestamp")]
    InvalidTimestamp,

    #[error("signature expired")]
    Expired,

    #[error("signature mismatch")]
    Mismatch,
}

/// A freshly issued token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureToken {
    pub sign: String,
    pub ts: String,
}

impl SignatureToken {
    /// `sign=..&ts=..` query fragment
    pub fn query(&self) -> String {
        format!(
            "sign={}&ts={}",
            urlencoding::encode(&self.sign),
            urlencoding::encode(&self.ts)
        )
    }
}

/// Issues and verifies URL signatures
#[derive(Clone)]
pub struct Signer {
    secret: Vec<u8>,
    ttl_secs: u64,
    enabled: bool,
}

impl std::fmt::Debug for Signer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signer")
            .field("ttl_secs", &self.ttl_secs)
            .field("enabled", &self.enabled)
            .finish_non_exhaustive()
    }
}

impl Signer {
    pub fn new(config: &SignConfig) -> Self {
        Self {
            secret: config.secret.as_bytes().to_vec(),
            ttl_secs: config.ttl.as_secs(),
            enabled: config.enabled,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Issue a token for `url` stamped with the current time.
    ///
    /// Returns `None` when signing is disabled.
    pub fn generate(&self, url: &str) -> Option<SignatureToken> {
        if !self.enabled {
            return None;
        }
        Some(self.sign_at(url, &now_unix().to_string()))
    }

    /// Issue a token for `url` stamped with an already-verified issuance time.
    ///
    /// Used when propagating a playlist token to the resources it references:
    /// the child token expires together with its parent.
    pub fn sign_at(&self, url: &str, ts: &str) -> SignatureToken {
        let mac = self.mac(url, ts);
        SignatureToken {
            sign: hex::encode(mac.finalize().into_bytes()),
            ts: ts.to_string(),
        }
    }

    /// Verify a presented token. Always succeeds when signing is disabled.
    ///
    /// Only elapsed time is bounded: a timestamp in the future passes the
    /// expiry check.
    pub fn verify(&self, url: &str, sign: &str, ts: &str) -> Result<(), AuthError> {
        if !self.enabled {
            return Ok(());
        }

        if sign.is_empty() || ts.is_empty() {
            return Err(AuthError::Missing);
        }

        let timestamp: i64 = ts.parse().map_err(|_| AuthError::InvalidTimestamp)?;
        if now_unix().saturating_sub(timestamp) > self.ttl_secs as i64 {
            return Err(AuthError::Expired);
        }

        let presented = hex::decode(sign).map_err(|_| AuthError::Mismatch)?;
        self.mac(url, ts)
            .verify_slice(&presented)
            .map_err(|_| AuthError::Mismatch)
    }

    fn mac(&self, url: &str, ts: &str) -> HmacSha256 {
        let mut mac = <HmacSha256 as Mac>::new_from_slice(&self.secret)
            .expect("HMAC accepts keys of any length");
        mac.update(url.as_bytes());
        mac.update(b"|");
        mac.update(ts.as_bytes());
        mac
    }
}

/// Current wall-clock time in unix seconds
pub fn now_unix() -> i64 {
    chrono::Utc::now().timestamp()
}
