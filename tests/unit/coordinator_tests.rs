// Request coordinator scenarios against the real transform engine

use image::ImageFormat;
use rstest::rstest;

use kagami::cache::CacheConfig;
use kagami::coordinator::{CacheStatus, CoordinatorOptions};
use kagami::error::ProxyError;

use super::fixtures::{bytes, dimensions, encode, harness, harness_with, query};

#[tokio::test]
async fn test_plain_request_returns_original_without_caching() {
    let h = harness(CacheConfig::default());
    let original = encode(300, 200, ImageFormat::Jpeg);
    h.store.put("photo.jpg", original.clone(), "image/jpeg", None);

    let response = h.coordinator.handle("photo.jpg", &query(&[])).await.unwrap();

    assert_eq!(response.content_type, "image/jpeg");
    assert_eq!(response.cache_status, CacheStatus::Bypass);
    assert_eq!(response.content_length, original.len() as u64);
    let body = response.body.collect().await.unwrap();
    assert_eq!(body.as_ref(), original.as_slice());
    assert_eq!(h.coordinator.cache().stats().current_item_count, 0);
    assert_eq!(h.engine.calls(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_identical_resizes_share_one_transform() {
    let h = harness(CacheConfig::default());
    h.store
        .put("photo.jpg", encode(400, 400, ImageFormat::Jpeg), "image/jpeg", None);

    let a = {
        let coordinator = h.coordinator.clone();
        tokio::spawn(async move {
            coordinator
                .handle("photo.jpg", &query(&[("w", "100"), ("h", "100")]))
                .await
        })
    };
    let b = {
        let coordinator = h.coordinator.clone();
        tokio::spawn(async move {
            coordinator
                .handle("photo.jpg", &query(&[("h", "100"), ("w", "100")]))
                .await
        })
    };

    let a = a.await.unwrap().unwrap();
    let b = b.await.unwrap().unwrap();

    assert_eq!(bytes(&a), bytes(&b));
    assert_eq!(a.etag, b.etag);
    assert_eq!(dimensions(bytes(&a)), (100, 100));
    assert_eq!(h.engine.calls(), 1);
}

#[tokio::test]
async fn test_missing_object_is_404_without_retry() {
    let h = harness(CacheConfig::default());

    let err = h
        .coordinator
        .handle("missing.jpg", &query(&[("w", "100")]))
        .await
        .unwrap_err();

    assert_eq!(err.to_http_status(), 404);
    assert_eq!(h.store.total_calls(), 1);
    assert_eq!(h.coordinator.cache().stats().current_item_count, 0);
}

#[tokio::test]
async fn test_missing_object_passthrough_is_404() {
    let h = harness(CacheConfig::default());
    let err = h
        .coordinator
        .handle("missing.jpg", &query(&[]))
        .await
        .unwrap_err();
    assert_eq!(err, ProxyError::ObjectNotFound("missing.jpg".to_string()));
    assert_eq!(h.store.get_calls(), 1);
}

#[rstest]
#[case(&[("w", "-5")])]
#[case(&[("w", "0")])]
#[case(&[("h", "abc")])]
#[case(&[("w", "99999")])]
#[case(&[("w", "10"), ("fit", "squash")])]
#[case(&[("w", "10"), ("fmt", "bmp")])]
#[case(&[("w", "10"), ("q", "101")])]
#[tokio::test]
async fn test_invalid_params_rejected_before_any_io(#[case] pairs: &[(&str, &str)]) {
    let h = harness(CacheConfig::default());
    h.store
        .put("photo.jpg", encode(10, 10, ImageFormat::Jpeg), "image/jpeg", None);

    let err = h
        .coordinator
        .handle("photo.jpg", &query(pairs))
        .await
        .unwrap_err();

    assert_eq!(err.to_http_status(), 400);
    assert_eq!(h.store.total_calls(), 0);
    assert_eq!(h.engine.calls(), 0);
}

#[tokio::test]
async fn test_format_conversion_to_webp() {
    let h = harness(CacheConfig::default());
    h.store
        .put("photo.png", encode(120, 80, ImageFormat::Png), "image/png", None);

    let response = h
        .coordinator
        .handle("photo.png", &query(&[("fmt", "webp")]))
        .await
        .unwrap();

    assert_eq!(response.content_type, "image/webp");
    assert_eq!(response.cache_status, CacheStatus::Miss);
    assert_eq!(
        image::guess_format(bytes(&response)).unwrap(),
        ImageFormat::WebP
    );
    assert_eq!(dimensions(bytes(&response)), (120, 80));
}

#[rstest]
#[case("contain", (100, 50))]
#[case("cover", (100, 100))]
#[case("stretch", (100, 100))]
#[tokio::test]
async fn test_fit_modes(#[case] fit: &str, #[case] expected: (u32, u32)) {
    let h = harness(CacheConfig::default());
    h.store
        .put("wide.png", encode(400, 200, ImageFormat::Png), "image/png", None);

    let response = h
        .coordinator
        .handle("wide.png", &query(&[("w", "100"), ("h", "100"), ("fit", fit)]))
        .await
        .unwrap();

    assert_eq!(dimensions(bytes(&response)), expected);
}

#[tokio::test]
async fn test_width_only_preserves_aspect_ratio() {
    let h = harness(CacheConfig::default());
    h.store
        .put("wide.png", encode(400, 200, ImageFormat::Png), "image/png", None);

    let response = h
        .coordinator
        .handle("wide.png", &query(&[("w", "100")]))
        .await
        .unwrap();

    assert_eq!(dimensions(bytes(&response)), (100, 50));
}

#[tokio::test]
async fn test_undecodable_original_is_not_cached() {
    let h = harness(CacheConfig::default());
    // PNG signature followed by garbage
    let mut corrupt = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
    corrupt.extend_from_slice(&[0u8; 64]);
    h.store.put("broken.png", corrupt, "image/png", None);

    let err = h
        .coordinator
        .handle("broken.png", &query(&[("w", "10")]))
        .await
        .unwrap_err();

    assert!(matches!(err.to_http_status(), 422 | 400));
    assert_eq!(h.coordinator.cache().stats().current_item_count, 0);
}

#[tokio::test]
async fn test_non_image_original_is_415() {
    let h = harness(CacheConfig::default());
    h.store
        .put("notes.txt", b"just some text".to_vec(), "text/plain", None);

    let err = h
        .coordinator
        .handle("notes.txt", &query(&[("w", "10")]))
        .await
        .unwrap_err();

    assert_eq!(err.to_http_status(), 415);
}

#[tokio::test]
async fn test_oversized_source_is_413() {
    let mut options = CoordinatorOptions::default();
    options.transform.max_source_bytes = 64;
    let h = harness_with(CacheConfig::default(), options);
    h.store
        .put("big.png", encode(64, 64, ImageFormat::Png), "image/png", None);

    let err = h
        .coordinator
        .handle("big.png", &query(&[("w", "10")]))
        .await
        .unwrap_err();

    assert_eq!(err.to_http_status(), 413);
    // The HEAD size is enough to refuse; the body is never downloaded
    assert_eq!(h.store.get_calls(), 0);
    assert_eq!(h.engine.calls(), 0);
}

#[tokio::test]
async fn test_zero_size_gif_is_422() {
    let h = harness(CacheConfig::default());
    let gif: &[u8] = &[
        0x47, 0x49, 0x46, 0x38, 0x39, 0x61, 0x00, 0x00, 0x00, 0x00, 0x80, 0x00, 0x00, 0x00,
        0x00, 0x00, 0xFF, 0xFF, 0xFF, 0x2C, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x01, 0x00,
        0x00, 0x02, 0x02, 0x44, 0x01, 0x00, 0x3B,
    ];
    h.store.put("empty.gif", gif.to_vec(), "image/gif", None);

    for fit in ["contain", "cover", "stretch"] {
        let err = h
            .coordinator
            .handle("empty.gif", &query(&[("w", "10"), ("h", "10"), ("fit", fit)]))
            .await
            .unwrap_err();
        assert_eq!(err.to_http_status(), 422, "fit={}", fit);
    }
}

#[tokio::test]
async fn test_cache_stays_within_budget_across_many_derivatives() {
    let budget = 8 * 1024;
    let h = harness(CacheConfig {
        max_bytes: budget,
        max_entry_bytes: budget,
    });
    h.store
        .put("photo.png", encode(256, 256, ImageFormat::Png), "image/png", None);

    for w in (16..=256).step_by(16) {
        let width = w.to_string();
        h.coordinator
            .handle("photo.png", &query(&[("w", width.as_str())]))
            .await
            .unwrap();
        let stats = h.coordinator.cache().stats();
        assert!(stats.current_size_bytes <= budget);
    }

    assert!(h.coordinator.cache().stats().evictions > 0);
}

#[tokio::test]
async fn test_hit_after_miss_returns_same_bytes() {
    let h = harness(CacheConfig::default());
    h.store.put(
        "photo.jpg",
        encode(200, 200, ImageFormat::Jpeg),
        "image/jpeg",
        Some("public, max-age=31536000"),
    );
    let q = query(&[("w", "50"), ("fmt", "png")]);

    let miss = h.coordinator.handle("photo.jpg", &q).await.unwrap();
    let hit = h.coordinator.handle("photo.jpg", &q).await.unwrap();

    assert_eq!(miss.cache_status, CacheStatus::Miss);
    assert_eq!(hit.cache_status, CacheStatus::Hit);
    assert_eq!(bytes(&miss), bytes(&hit));
    assert_eq!(hit.content_type, "image/png");
    assert_eq!(hit.cache_control, "public, max-age=31536000");
    assert_eq!(h.engine.calls(), 1);
}
