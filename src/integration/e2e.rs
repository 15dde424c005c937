//! End-to-end integration tests
//!
//! Each scenario drives the full router against a mock origin: sign, play,
//! then follow the rewritten segment and key references.

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;

    use crate::integration::fixtures::*;
    use crate::signer::{now_unix, Signer};
    use crate::upstream::{MIME_HLS, MIME_OCTET_STREAM};

    fn line_starting<'a>(body: &'a str, prefix: &str) -> &'a str {
        body.lines()
            .find(|l| l.starts_with(prefix))
            .unwrap_or_else(|| panic!("no line starting with {} in:\n{}", prefix, body))
    }

    #[tokio::test]
    async fn test_sign_play_segment_flow() {
        let origin = TestOrigin::start().await;
        origin
            .serve("/a.m3u8", SIMPLE_PLAYLIST.as_bytes(), "text/plain", None)
            .await;
        origin
            .serve("/seg1.ts", SEGMENT_BYTES, "video/mp2t", None)
            .await;

        let app = gateway(signed_config(600));

        let signed = get(&app, &endpoint("/sign", "raw", &origin.url("/a.m3u8")), None).await;
        assert_eq!(signed.status, StatusCode::OK);
        let json = signed.json();
        let proxy = json["proxy"].as_str().unwrap();
        assert!(proxy.starts_with(&endpoint("/play", "url", &origin.url("/a.m3u8"))));
        assert!(proxy.contains(&format!("&sign={}", json["sign"].as_str().unwrap())));
        assert!(proxy.ends_with(&format!("&ts={}", json["ts"].as_str().unwrap())));

        let playlist = get(&app, proxy, None).await;
        assert_eq!(playlist.status, StatusCode::OK);
        assert_eq!(playlist.header("content-type"), Some(MIME_HLS));
        assert_eq!(playlist.header("cache-control"), Some("no-cache"));

        let text = playlist.text();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "#EXTM3U");
        assert_eq!(lines[1], "#EXT-X-VERSION:3");

        let seg_url = line_starting(&text, "/seg");
        assert!(seg_url.starts_with(&format!(
            "{}&sign=",
            endpoint("/seg", "u", &origin.url("/seg1.ts"))
        )));
        assert!(seg_url.contains("&ts="));

        let segment = get(&app, seg_url, None).await;
        assert_eq!(segment.status, StatusCode::OK);
        assert_eq!(segment.header("content-type"), Some("video/mp2t"));
        assert_eq!(segment.header("accept-ranges"), Some("bytes"));
        assert_eq!(segment.body.as_ref(), SEGMENT_BYTES);
    }

    #[tokio::test]
    async fn test_encrypted_playlist_key_flow() {
        let origin = TestOrigin::start().await;
        origin
            .serve("/live/index.m3u8", ENCRYPTED_PLAYLIST.as_bytes(), MIME_HLS, None)
            .await;
        origin
            .serve("/live/keys/k1.bin", KEY_BYTES, "text/plain", None)
            .await;

        let app = gateway(signed_config(600));
        let json = get(&app, &endpoint("/sign", "raw", &origin.url("/live/index.m3u8")), None)
            .await
            .json();
        let text = get(&app, json["proxy"].as_str().unwrap(), None).await.text();

        let key_line = line_starting(&text, "#EXT-X-KEY:");
        assert!(key_line.starts_with(&format!(
            "#EXT-X-KEY:METHOD=AES-128,URI=\"{}&sign=",
            endpoint("/key", "u", &origin.url("/live/keys/k1.bin"))
        )));
        assert!(key_line.ends_with("\",IV=0x00000000000000000000000000000001"));
        assert_eq!(text.lines().filter(|l| l.starts_with("/seg?u=")).count(), 2);
        assert!(text.contains("#EXT-X-ENDLIST"));

        let uri_start = key_line.find("URI=\"").unwrap() + 5;
        let uri_end = key_line[uri_start..].find('"').unwrap() + uri_start;
        let key = get(&app, &key_line[uri_start..uri_end], Some("bytes=0-3")).await;

        // Keys ignore Range and always come back whole.
        assert_eq!(key.status, StatusCode::OK);
        assert_eq!(key.header("content-type"), Some(MIME_OCTET_STREAM));
        assert_eq!(key.body.as_ref(), KEY_BYTES);
    }

    #[tokio::test]
    async fn test_signature_failures() {
        let origin = TestOrigin::start().await;
        let target = origin.url("/a.m3u8");
        let app = gateway(signed_config(600));
        let signer = Signer::new(&signed_config(600).sign);

        let unsigned = get(&app, &endpoint("/play", "url", &target), None).await;
        assert_eq!(unsigned.status, StatusCode::UNAUTHORIZED);
        assert_eq!(
            unsigned.text(),
            "Signature verification failed: missing signature parameters"
        );

        let token = signer.generate(&target).unwrap();
        let tampered = format!(
            "{}&sign={}&ts={}",
            endpoint("/play", "url", &target),
            token.sign.replace(&token.sign[..2], "zz"),
            token.ts
        );
        assert_eq!(get(&app, &tampered, None).await.status, StatusCode::UNAUTHORIZED);

        let stale = signer.sign_at(&target, &(now_unix() - 700).to_string());
        let expired = get(
            &app,
            &format!("{}&{}", endpoint("/play", "url", &target), stale.query()),
            None,
        )
        .await;
        assert_eq!(expired.status, StatusCode::UNAUTHORIZED);
        assert_eq!(expired.text(), "Signature verification failed: signature expired");

        // A playlist token does not unlock a different resource.
        let reused = format!(
            "{}&{}",
            endpoint("/seg", "u", &origin.url("/seg1.ts")),
            token.query()
        );
        assert_eq!(get(&app, &reused, None).await.status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_sign_endpoint_rejections() {
        let unsigned_app = gateway(base_config());
        let disabled = get(
            &unsigned_app,
            &endpoint("/sign", "raw", "http://127.0.0.1/a.m3u8"),
            None,
        )
        .await;
        assert_eq!(disabled.status, StatusCode::FORBIDDEN);
        assert_eq!(disabled.text(), "Signing is disabled");

        let app = gateway(signed_config(600));
        let missing = get(&app, "/sign", None).await;
        assert_eq!(missing.status, StatusCode::BAD_REQUEST);
        assert_eq!(missing.text(), "Missing 'raw' parameter");

        let denied = get(&app, &endpoint("/sign", "raw", "https://evil.example.net/a.m3u8"), None).await;
        assert_eq!(denied.status, StatusCode::FORBIDDEN);
        assert_eq!(denied.text(), "Host not allowed");
    }

    #[tokio::test]
    async fn test_input_validation() {
        let mut config = base_config();
        config.limits.max_url_length = 40;
        let app = gateway(config);

        let invalid = get(&app, &endpoint("/play", "url", "ftp://127.0.0.1/a.m3u8"), None).await;
        assert_eq!(invalid.status, StatusCode::BAD_REQUEST);
        assert_eq!(invalid.text(), "Invalid URL");

        let long = format!("http://127.0.0.1/{}.m3u8", "x".repeat(40));
        let too_long = get(&app, &endpoint("/play", "url", &long), None).await;
        assert_eq!(too_long.status, StatusCode::BAD_REQUEST);
        assert_eq!(too_long.text(), "URL too long");

        let missing = get(&app, "/seg", None).await;
        assert_eq!(missing.status, StatusCode::BAD_REQUEST);
        assert_eq!(missing.text(), "Missing 'u' parameter");

        let denied = get(&app, &endpoint("/key", "u", "https://evil.example.net/k"), None).await;
        assert_eq!(denied.status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_segment_ranges() {
        let origin = TestOrigin::start().await;
        origin
            .serve("/seg1.ts", SEGMENT_BYTES, "video/mp2t", None)
            .await;
        let app = gateway(base_config());
        let uri = endpoint("/seg", "u", &origin.url("/seg1.ts"));

        let head = get(&app, &uri, Some("bytes=0-4")).await;
        assert_eq!(head.status, StatusCode::PARTIAL_CONTENT);
        assert_eq!(head.header("content-range"), Some("bytes 0-4/10"));
        assert_eq!(head.header("content-length"), Some("5"));
        assert_eq!(head.body.as_ref(), b"01234");

        let tail = get(&app, &uri, Some("bytes=5-")).await;
        assert_eq!(tail.status, StatusCode::PARTIAL_CONTENT);
        assert_eq!(tail.header("content-range"), Some("bytes 5-9/10"));
        assert_eq!(tail.body.as_ref(), b"56789");

        let beyond = get(&app, &uri, Some("bytes=8-20")).await;
        assert_eq!(beyond.status, StatusCode::RANGE_NOT_SATISFIABLE);
        assert_eq!(beyond.header("content-range"), Some("bytes */10"));
        assert!(beyond.body.is_empty());

        let multi = get(&app, &uri, Some("bytes=0-1,3-4")).await;
        assert_eq!(multi.status, StatusCode::RANGE_NOT_SATISFIABLE);
    }

    #[tokio::test]
    async fn test_upstream_failures() {
        let origin = TestOrigin::start().await;
        origin.fail("/gone.ts", 404).await;
        origin.fail("/k", 500).await;
        let app = gateway(base_config());

        let segment = get(&app, &endpoint("/seg", "u", &origin.url("/gone.ts")), None).await;
        assert_eq!(segment.status, StatusCode::BAD_GATEWAY);
        assert_eq!(segment.text(), "Failed to fetch segment");

        let key = get(&app, &endpoint("/key", "u", &origin.url("/k")), None).await;
        assert_eq!(key.status, StatusCode::BAD_GATEWAY);
        assert_eq!(key.text(), "Failed to fetch key");
    }

    #[tokio::test]
    async fn test_size_limit_applies_to_every_fetch() {
        let origin = TestOrigin::start().await;
        let big = format!("#EXTM3U\n{}", "#EXTINF:4.0,\nseg.ts\n".repeat(100));
        origin
            .serve("/big.m3u8", big.as_bytes(), MIME_HLS, None)
            .await;
        origin
            .serve("/big.ts", &[0x47; 4096], "video/mp2t", None)
            .await;
        origin
            .serve("/seg1.ts", SEGMENT_BYTES, "video/mp2t", None)
            .await;

        let mut config = base_config();
        config.limits.max_playlist_bytes = 1024;
        let app = gateway(config);

        for uri in [
            endpoint("/play", "url", &origin.url("/big.m3u8")),
            endpoint("/raw", "url", &origin.url("/big.m3u8")),
            endpoint("/seg", "u", &origin.url("/big.ts")),
            endpoint("/raw", "url", &origin.url("/big.ts")),
        ] {
            let response = get(&app, &uri, None).await;
            assert_eq!(response.status, StatusCode::BAD_GATEWAY, "{}", uri);
        }

        let small = get(&app, &endpoint("/seg", "u", &origin.url("/seg1.ts")), None).await;
        assert_eq!(small.status, StatusCode::OK);
        assert_eq!(small.body.as_ref(), SEGMENT_BYTES);
    }

    #[tokio::test]
    async fn test_caches_absorb_repeat_requests() {
        let origin = TestOrigin::start().await;
        origin
            .serve("/a.m3u8", SIMPLE_PLAYLIST.as_bytes(), MIME_HLS, Some(1))
            .await;
        origin
            .serve("/seg1.ts", SEGMENT_BYTES, "video/mp2t", Some(1))
            .await;
        origin
            .serve("/k.bin", KEY_BYTES, MIME_OCTET_STREAM, Some(1))
            .await;

        let mut config = base_config();
        config.cache.m3u8 = enabled_cache(10);
        config.cache.key = enabled_cache(10);
        config.cache.ts = enabled_cache(10);
        let app = gateway(config);

        let play = endpoint("/play", "url", &origin.url("/a.m3u8"));
        let first = get(&app, &play, None).await;
        let second = get(&app, &play, None).await;
        assert_eq!(second.status, StatusCode::OK);
        assert_eq!(first.body, second.body);
        assert_eq!(second.header("content-type"), Some(MIME_HLS));

        let seg = endpoint("/seg", "u", &origin.url("/seg1.ts"));
        assert_eq!(get(&app, &seg, None).await.body.as_ref(), SEGMENT_BYTES);
        let ranged = get(&app, &seg, Some("bytes=2-3")).await;
        assert_eq!(ranged.status, StatusCode::PARTIAL_CONTENT);
        assert_eq!(ranged.body.as_ref(), b"23");

        let key = endpoint("/key", "u", &origin.url("/k.bin"));
        assert_eq!(get(&app, &key, None).await.body.as_ref(), KEY_BYTES);
        assert_eq!(get(&app, &key, None).await.body.as_ref(), KEY_BYTES);

        let stats = get(&app, "/debug/cache", None).await.json();
        assert_eq!(stats["m3u8"]["entries"], 1);
        assert_eq!(stats["key"]["entries"], 1);
        assert_eq!(stats["ts"]["entries"], 1);
    }

    #[tokio::test]
    async fn test_raw_is_never_cached_or_rewritten() {
        let origin = TestOrigin::start().await;
        origin
            .serve("/a.m3u8", SIMPLE_PLAYLIST.as_bytes(), MIME_HLS, Some(2))
            .await;

        let mut config = signed_config(600);
        config.cache.m3u8 = enabled_cache(10);
        let app = gateway(config);

        let uri = endpoint("/raw", "url", &origin.url("/a.m3u8"));
        for _ in 0..2 {
            let raw = get(&app, &uri, None).await;
            assert_eq!(raw.status, StatusCode::OK);
            assert_eq!(raw.text(), SIMPLE_PLAYLIST);
            assert_eq!(raw.header("accept-ranges"), Some("bytes"));
        }
    }

    #[tokio::test]
    async fn test_play_passes_through_non_playlists() {
        let origin = TestOrigin::start().await;
        origin
            .serve("/clip.mp4", SEGMENT_BYTES, "video/mp4", None)
            .await;
        let app = gateway(base_config());

        let clip = get(
            &app,
            &endpoint("/play", "url", &origin.url("/clip.mp4")),
            Some("bytes=-2"),
        )
        .await;
        assert_eq!(clip.status, StatusCode::PARTIAL_CONTENT);
        assert_eq!(clip.header("content-type"), Some("video/mp4"));
        assert_eq!(clip.header("content-range"), Some("bytes 0-2/10"));
        assert_eq!(clip.body.as_ref(), b"012");
    }

    #[tokio::test]
    async fn test_rewrite_disabled_serves_playlist_verbatim() {
        let origin = TestOrigin::start().await;
        origin
            .serve("/a.m3u8", SIMPLE_PLAYLIST.as_bytes(), "text/plain", None)
            .await;

        let mut config = base_config();
        config.rewrite.enable_m3u8 = false;
        config.cache.m3u8 = enabled_cache(4);
        let app = gateway(config);
        let play_url = endpoint("/play", "url", &origin.url("/a.m3u8"));

        let play = get(&app, &play_url, None).await;
        assert_eq!(play.status, StatusCode::OK);
        assert_eq!(play.header("content-type"), Some("text/plain"));
        assert_eq!(play.header("accept-ranges"), Some("bytes"));
        assert_eq!(play.text(), SIMPLE_PLAYLIST);

        let ranged = get(&app, &play_url, Some("bytes=0-6")).await;
        assert_eq!(ranged.status, StatusCode::PARTIAL_CONTENT);
        assert_eq!(ranged.text(), "#EXTM3U");

        let stats = get(&app, "/debug/cache", None).await.json();
        assert_eq!(stats["m3u8"]["entries"], 0);
    }

    #[tokio::test]
    async fn test_health() {
        let app = gateway(base_config());
        let health = get(&app, "/health", None).await;
        assert_eq!(health.status, StatusCode::OK);
        assert_eq!(health.json()["status"], "ok");
    }
}
