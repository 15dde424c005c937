//! Single byte-range serving over buffered payloads

use axum::{
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use thiserror::Error;

use crate::error::GatewayError;

/// Why a Range header was rejected
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RangeError {
    #[error("unsupported range unit")]
    Unit,

    #[error("multiple ranges are not supported")]
    MultiRange,

    #[error("malformed range")]
    Malformed,

    #[error("range not satisfiable")]
    Unsatisfiable,
}

/// An inclusive byte range within a payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: usize,
    pub end: usize,
}

impl ByteRange {
    /// Parse `bytes=start-end` against a payload of `length` bytes.
    ///
    /// An omitted end means the last byte; an omitted start means 0.
    pub fn parse(value: &str, length: usize) -> Result<Self, RangeError> {
        let ranges = value.trim().strip_prefix("bytes=").ok_or(RangeError::Unit)?;
        if ranges.contains(',') {
            return Err(RangeError::MultiRange);
        }

        let (start, end) = ranges.split_once('-').ok_or(RangeError::Malformed)?;
        if end.contains('-') {
            return Err(RangeError::Malformed);
        }

        let start = match start.trim() {
            "" => 0,
            s => s.parse::<usize>().map_err(|_| RangeError::Malformed)?,
        };

        let end = match end.trim() {
            "" => length.checked_sub(1).ok_or(RangeError::Unsatisfiable)?,
            e => e.parse::<usize>().map_err(|_| RangeError::Malformed)?,
        };

        if end >= length || start > end {
            return Err(RangeError::Unsatisfiable);
        }

        Ok(Self { start, end })
    }

    /// Number of bytes covered; never zero
    fn len(&self) -> usize {
        self.end - self.start + 1
    }

    pub fn content_range(&self, total: usize) -> String {
        format!("bytes {}-{}/{}", self.start, self.end, total)
    }
}

/// Serve `data` in full, or the requested slice if a Range header is present.
pub fn serve_bytes(
    request_headers: &HeaderMap,
    data: Bytes,
    content_type: &str,
) -> Result<Response, GatewayError> {
    let mut headers = HeaderMap::new();
    if let Ok(value) = HeaderValue::from_str(content_type) {
        headers.insert(header::CONTENT_TYPE, value);
    }
    headers.insert(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));

    let Some(range) = request_headers.get(header::RANGE) else {
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from(data.len()));
        return Ok((headers, data).into_response());
    };

    let length = data.len();
    let range = range
        .to_str()
        .map_err(|_| RangeError::Malformed)
        .and_then(|v| ByteRange::parse(v, length))
        .map_err(|source| GatewayError::Range { source, length })?;

    let content_range = HeaderValue::from_str(&range.content_range(length))
        .map_err(|e| GatewayError::Internal(e.to_string()))?;
    headers.insert(header::CONTENT_RANGE, content_range);
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(range.len()));

    let body = data.slice(range.start..=range.end);
    Ok((StatusCode::PARTIAL_CONTENT, headers, body).into_response())
}
