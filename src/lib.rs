//! HLS Gateway
//!
//! A reverse proxy for HLS streams. Playlists fetched from allow-listed
//! origins are rewritten so that every segment and key request flows back
//! through the gateway, optionally guarded by time-bounded URL signatures.

pub mod access;
pub mod cache;
pub mod config;
pub mod config_file;
pub mod error;
pub mod headers;
pub mod http;
pub mod rewrite;
pub mod signer;
pub mod state;
pub mod upstream;
