//! Error types for the gateway
//!
//! Every failure is surfaced at the endpoint boundary and mapped to exactly
//! one HTTP status with a plain-text body.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::http::range::RangeError;
use crate::signer::AuthError;
use crate::upstream::UpstreamError;

/// Main error type for request handling
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Missing, malformed or oversized input
    #[error("{0}")]
    InvalidInput(String),

    /// Target host is not on the allow-list
    #[error("Host not allowed")]
    AccessDenied,

    /// `/sign` called while signing is switched off
    #[error("Signing is disabled")]
    SigningDisabled,

    #[error("Signature verification failed: {0}")]
    Auth(#[from] AuthError),

    /// Upstream fetch failed; `resource` names what was being fetched
    #[error("Failed to fetch {resource}")]
    Upstream {
        resource: &'static str,
        #[source]
        source: UpstreamError,
    },

    #[error("Failed to process playlist")]
    Rewrite(#[source] std::io::Error),

    #[error("Requested range not satisfiable")]
    Range {
        #[source]
        source: RangeError,
        length: usize,
    },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        GatewayError::InvalidInput(msg.into())
    }

    pub fn upstream(resource: &'static str, source: UpstreamError) -> Self {
        GatewayError::Upstream { resource, source }
    }

    /// HTTP status this error maps to
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            GatewayError::AccessDenied | GatewayError::SigningDisabled => StatusCode::FORBIDDEN,
            GatewayError::Auth(_) => StatusCode::UNAUTHORIZED,
            GatewayError::Upstream { .. } => StatusCode::BAD_GATEWAY,
            GatewayError::Range { .. } => StatusCode::RANGE_NOT_SATISFIABLE,
            GatewayError::Rewrite(_) | GatewayError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            GatewayError::Range { length, .. } => {
                let mut response = status.into_response();
                if let Ok(value) = HeaderValue::from_str(&format!("bytes */{}", length)) {
                    response.headers_mut().insert(header::CONTENT_RANGE, value);
                }
                return response;
            }
            GatewayError::Upstream { resource, source } => {
                tracing::warn!("Upstream {} fetch failed: {}", resource, source);
            }
            GatewayError::Rewrite(e) => {
                tracing::error!("Failed to rewrite playlist: {}", e);
            }
            _ => {}
        }

        (status, self.to_string()).into_response()
    }
}

/// Errors raised while loading configuration; these abort startup.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid listen address {0:?}")]
    Listen(String),

    #[error("signing is enabled but no secret is configured")]
    MissingSecret,

    #[error("invalid header rule {pattern:?}: {reason}")]
    HeaderRule { pattern: String, reason: String },

    #[error("invalid upstream proxy {0:?}")]
    Proxy(String),

    #[error("failed to build upstream client: {0}")]
    Client(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, GatewayError>;
