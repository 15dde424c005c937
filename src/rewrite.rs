//! HLS playlist rewriting
//!
//! Every reference inside a playlist is resolved against the playlist's own
//! URL and re-pointed at the gateway:
//!
//! - `#EXT-X-KEY` `URI="..."` attributes go to the key endpoint
//! - every other non-blank, non-directive line goes to the segment endpoint
//!
//! Nested variant playlists are not told apart from media segments, so in a
//! multi-variant playlist the child playlists are routed to the segment
//! endpoint and are not rewritten themselves.

use bytes::Bytes;
use std::io::{self, Write};
use url::Url;

use crate::signer::Signer;

/// Directive prefix of an encryption key line
const KEY_DIRECTIVE: &str = "#EXT-X-KEY:";

/// Playlist header directive
const PLAYLIST_HEADER: &str = "#EXTM3U";

/// Rewrites playlists so that all references pass back through the gateway.
pub struct PlaylistRewriter<'a> {
    base: &'a str,
    segment_prefix: &'a str,
    key_prefix: &'a str,
    token: Option<(&'a Signer, &'a str)>,
}

impl<'a> PlaylistRewriter<'a> {
    /// `base` is prepended to every endpoint, e.g. `""` for root-relative URLs.
    pub fn new(base: &'a str, segment_prefix: &'a str, key_prefix: &'a str) -> Self {
        Self {
            base,
            segment_prefix,
            key_prefix,
            token: None,
        }
    }

    /// Propagate the playlist's verified issuance time `ts` to every
    /// rewritten reference, each signed for its own target URL.
    pub fn with_token(mut self, signer: &'a Signer, ts: &'a str) -> Self {
        if signer.is_enabled() && !ts.is_empty() {
            self.token = Some((signer, ts));
        }
        self
    }

    /// Rewrite `content`, fetched from `playlist_url`.
    ///
    /// Lines are trimmed and re-joined with `\n`. Malformed playlist text is
    /// never an error; only a failing writer is.
    pub fn rewrite(&self, content: &[u8], playlist_url: &str) -> io::Result<Bytes> {
        let text = String::from_utf8_lossy(content);
        let mut out = Vec::with_capacity(content.len() * 2);

        for (i, line) in text.split('\n').enumerate() {
            if i > 0 {
                out.write_all(b"\n")?;
            }

            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            if line.starts_with('#') {
                match line.strip_prefix(KEY_DIRECTIVE) {
                    Some(attrs) => {
                        out.write_all(KEY_DIRECTIVE.as_bytes())?;
                        out.write_all(self.rewrite_key_attributes(attrs, playlist_url).as_bytes())?;
                    }
                    None => out.write_all(line.as_bytes())?,
                }
                continue;
            }

            let resolved = resolve_url(line, playlist_url);
            out.write_all(self.endpoint_url(self.segment_prefix, &resolved).as_bytes())?;
        }

        Ok(Bytes::from(out))
    }

    /// Rewrite the `URI` attribute of a key directive, keeping every other
    /// attribute and their order.
    fn rewrite_key_attributes(&self, attrs: &str, playlist_url: &str) -> String {
        attrs
            .split(',')
            .map(|part| {
                let quoted = part
                    .trim()
                    .strip_prefix("URI=")
                    .filter(|v| v.len() >= 2 && v.starts_with('"') && v.ends_with('"'));
                match quoted {
                    Some(v) => {
                        let resolved = resolve_url(&v[1..v.len() - 1], playlist_url);
                        format!("URI=\"{}\"", self.endpoint_url(self.key_prefix, &resolved))
                    }
                    None => part.to_string(),
                }
            })
            .collect::<Vec<_>>()
            .join(",")
    }

    fn endpoint_url(&self, prefix: &str, target: &str) -> String {
        let mut url = format!("{}{}?u={}", self.base, prefix, urlencoding::encode(target));
        if let Some((signer, ts)) = self.token {
            url.push('&');
            url.push_str(&signer.sign_at(target, ts).query());
        }
        url
    }
}

/// Resolve `reference` against `base`. Absolute http(s) references are kept
/// as-is; anything that fails to resolve is returned unchanged.
pub fn resolve_url(reference: &str, base: &str) -> String {
    if reference.starts_with("http://") || reference.starts_with("https://") {
        return reference.to_string();
    }

    Url::parse(base)
        .and_then(|base| base.join(reference))
        .map(|u| u.to_string())
        .unwrap_or_else(|_| reference.to_string())
}

/// True iff a `#EXTM3U` directive appears before any content line.
pub fn is_playlist(content: &[u8]) -> bool {
    let text = String::from_utf8_lossy(content);
    for line in text.lines() {
        let line = line.trim();
        if line.starts_with(PLAYLIST_HEADER) {
            return true;
        }
        if !line.is_empty() && !line.starts_with('#') {
            return false;
        }
    }
    false
}
