// Derivative cache behaviour through its public API

use bytes::Bytes;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use kagami::cache::{CacheConfig, CacheEntry, CacheKey, DerivativeCache};
use kagami::error::ProxyError;
use kagami::store::ObjectRef;
use kagami::transform::TransformSpec;

fn key(name: &str, width: u32) -> CacheKey {
    CacheKey::derive(
        &ObjectRef {
            key: name.to_string(),
            version: "etag-1".to_string(),
        },
        &TransformSpec {
            width: Some(width),
            ..Default::default()
        },
    )
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_budget_holds_under_concurrent_inserts() {
    let budget = 10_000;
    let cache = DerivativeCache::new(&CacheConfig {
        max_bytes: budget,
        max_entry_bytes: 2_000,
    });

    let mut handles = Vec::new();
    for i in 0..200u32 {
        let cache = cache.clone();
        handles.push(tokio::spawn(async move {
            let k = key("photo.jpg", i + 1);
            let size = 100 + (i as usize * 37) % 1_900;
            cache
                .put_if_absent(k, move || async move {
                    Ok(CacheEntry::new(k, Bytes::from(vec![1u8; size]), "image/jpeg"))
                })
                .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let stats = cache.stats();
    assert!(stats.current_size_bytes <= budget);
    assert_eq!(stats.insertions, 200);
    assert!(stats.evictions > 0);
    assert_eq!(stats.in_flight, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_distinct_keys_compute_independently() {
    let cache = DerivativeCache::new(&CacheConfig::default());
    let calls = Arc::new(AtomicUsize::new(0));

    let mut handles = Vec::new();
    for width in [10, 20, 30, 10, 20, 30] {
        let cache = cache.clone();
        let calls = calls.clone();
        handles.push(tokio::spawn(async move {
            let k = key("a.png", width);
            cache
                .put_if_absent(k, move || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    Ok(CacheEntry::new(k, Bytes::from_static(b"png"), "image/png"))
                })
                .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_waiters_released_when_producer_times_out() {
    let cache = DerivativeCache::new(&CacheConfig::default());
    let k = key("slow.png", 10);

    let mut handles = Vec::new();
    for _ in 0..5 {
        let cache = cache.clone();
        handles.push(tokio::spawn(async move {
            cache
                .put_if_absent(k, move || async move {
                    tokio::time::sleep(Duration::from_millis(30)).await;
                    Err::<CacheEntry, _>(ProxyError::Timeout {
                        operation: "transform",
                        timeout_ms: 30,
                    })
                })
                .await
        }));
    }

    for handle in handles {
        let result = tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("waiter hung")
            .unwrap();
        assert!(matches!(result, Err(ProxyError::Timeout { .. })));
    }
    assert!(!cache.contains(&k));
    assert_eq!(cache.in_flight_count(), 0);
}

#[test]
fn test_entry_etag_uses_key_hex() {
    let k = key("a.png", 10);
    let entry = CacheEntry::new(k, Bytes::from_static(b"x"), "image/png");
    assert_eq!(entry.etag(), format!("\"{}\"", k));
    assert_eq!(entry.size_bytes, 1);
}
