//! HTTP server module
//!
//! This module handles HTTP request routing and handling:
//! - Axum router with all gateway endpoints
//! - Request handlers for playlists, segments, keys and raw pass-through
//! - Single byte-range responses
//! - CORS middleware

pub mod handlers;
pub mod range;
pub mod routes;

pub use routes::create_router;
