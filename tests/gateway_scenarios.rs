//! End-to-end lookups against a mock origin.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use card_image_gateway::cache::{CacheStore, MemoryStore};
use card_image_gateway::gateway::{Gateway, LookupError};
use card_image_gateway::origin::{CardImage, FetchError, ImageSource};

mod common;

use common::{
    build_gateway, card_json, start_origin, test_config, CountingStore, MockResponse, JPEG_BYTES,
    PNG_BYTES,
};

#[tokio::test]
async fn test_png_lookup_is_cached() {
    let (origin, stats) = start_origin(|path, addr| async move {
        match path.as_str() {
            "/cards/abc123" => MockResponse::json(200, card_json(addr, "abc123")),
            "/img/abc123" => MockResponse::bytes("image/png", PNG_BYTES),
            _ => MockResponse::status(404),
        }
    })
    .await;
    let config = test_config(origin);
    let store = CountingStore::new();
    let gateway = build_gateway(&config, store.clone());

    let first = gateway.lookup("abc123").await.unwrap();
    assert_eq!(first.bytes.as_ref(), PNG_BYTES);
    assert_eq!(first.content_type, "image/png");
    assert_eq!(stats.requests(), 2, "resolve + download");

    let second = gateway.lookup("abc123").await.unwrap();
    assert_eq!(second, first);
    assert_eq!(stats.requests(), 2, "served from cache");
    assert_eq!(store.inner.get("cardimg:abc123").await.unwrap().unwrap(), PNG_BYTES);
}

#[tokio::test]
async fn test_missing_card_is_negatively_cached() {
    let (origin, stats) = start_origin(|_, _| async { MockResponse::json(404, serde_json::json!({"object": "error"})) }).await;
    let config = test_config(origin);
    let store = CountingStore::new();
    let gateway = build_gateway(&config, store.clone());

    assert_eq!(gateway.lookup("zzz999").await, Err(LookupError::NotFound));
    assert_eq!(stats.requests(), 1);

    assert_eq!(gateway.lookup("zzz999").await, Err(LookupError::NotFound));
    assert_eq!(stats.requests(), 1, "negative hit skips the origin");
    assert!(store.inner.exists("cardimgneg:zzz999").await.unwrap());
    assert!(!store.inner.exists("cardimg:zzz999").await.unwrap());
}

#[tokio::test]
async fn test_card_without_image_is_not_found() {
    let (origin, stats) = start_origin(|_, _| async {
        MockResponse::json(200, serde_json::json!({"id": "noimg", "image_uris": null}))
    })
    .await;
    let config = test_config(origin);
    let store = CountingStore::new();
    let gateway = build_gateway(&config, store.clone());

    assert_eq!(gateway.lookup("noimg").await, Err(LookupError::NotFound));
    assert_eq!(stats.requests(), 1);
    assert!(store.inner.exists("cardimgneg:noimg").await.unwrap());
}

#[tokio::test]
async fn test_double_faced_card_uses_first_face() {
    let (origin, _) = start_origin(|path, addr| async move {
        match path.as_str() {
            "/cards/dfc" => MockResponse::json(
                200,
                serde_json::json!({
                    "card_faces": [
                        {"image_uris": {"normal": format!("http://{addr}/img/front")}},
                        {"image_uris": {"normal": format!("http://{addr}/img/back")}}
                    ]
                }),
            ),
            "/img/front" => MockResponse::bytes("image/jpeg", JPEG_BYTES),
            _ => MockResponse::status(404),
        }
    })
    .await;
    let config = test_config(origin);
    let gateway = build_gateway(&config, CountingStore::new());

    let image = gateway.lookup("dfc").await.unwrap();
    assert_eq!(image.bytes.as_ref(), JPEG_BYTES);
    assert_eq!(image.content_type, "image/jpeg");
}

#[tokio::test]
async fn test_server_errors_exhaust_retries() {
    let (origin, stats) = start_origin(|_, _| async { MockResponse::status(500) }).await;
    let config = test_config(origin);
    let store = CountingStore::new();
    let gateway = build_gateway(&config, store.clone());

    let started = Instant::now();
    assert_eq!(gateway.lookup("flaky").await, Err(LookupError::Upstream));
    let elapsed = started.elapsed();

    assert_eq!(stats.requests(), 3);
    // 0.2s + 0.4s of backoff, none after the last attempt.
    assert!(elapsed >= Duration::from_millis(600), "elapsed {elapsed:?}");
    assert!(elapsed < Duration::from_millis(1_400), "elapsed {elapsed:?}");
    assert_eq!(gateway.breaker().failure_count(tokio::time::Instant::now()), 1);
    assert!(!gateway.breaker().is_open(tokio::time::Instant::now()));
    assert_eq!(store.sets.load(Ordering::SeqCst), 0, "failures are not cached");
}

#[tokio::test]
async fn test_open_circuit_touches_nothing() {
    let (origin, stats) = start_origin(|_, _| async { MockResponse::status(503) }).await;
    let mut config = test_config(origin);
    config.retries.max_attempts = 1;
    config.circuit_breaker.failure_threshold = 2;
    let store = CountingStore::new();
    let gateway = build_gateway(&config, store.clone());

    assert_eq!(gateway.lookup("a").await, Err(LookupError::Upstream));
    assert_eq!(gateway.lookup("b").await, Err(LookupError::Upstream));
    assert!(gateway.breaker().is_open(tokio::time::Instant::now()));

    let store_calls = store.calls();
    let origin_calls = stats.requests();
    for key in ["a", "b", "c", "abc123"] {
        assert_eq!(gateway.lookup(key).await, Err(LookupError::ServiceUnavailable));
    }
    assert_eq!(store.calls(), store_calls);
    assert_eq!(stats.requests(), origin_calls);
}

#[tokio::test]
async fn test_terminal_status_does_not_open_circuit() {
    let (origin, stats) = start_origin(|_, _| async { MockResponse::status(403) }).await;
    let mut config = test_config(origin);
    config.circuit_breaker.failure_threshold = 1;
    let gateway = build_gateway(&config, CountingStore::new());

    for _ in 0..3 {
        assert_eq!(gateway.lookup("forbidden").await, Err(LookupError::Upstream));
    }
    assert_eq!(stats.requests(), 3, "one call per lookup, no retries");
    assert!(!gateway.breaker().is_open(tokio::time::Instant::now()));
}

#[tokio::test]
async fn test_transient_failure_recovers() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let (origin, _) = start_origin(move |path, addr| {
        let counter = counter.clone();
        async move {
            if path.starts_with("/cards/") && counter.fetch_add(1, Ordering::SeqCst) == 0 {
                return MockResponse::status(502);
            }
            match path.as_str() {
                "/cards/retry1" => MockResponse::json(200, card_json(addr, "retry1")),
                "/img/retry1" => MockResponse::bytes("image/jpeg", JPEG_BYTES),
                _ => MockResponse::status(404),
            }
        }
    })
    .await;
    let config = test_config(origin);
    let gateway = build_gateway(&config, CountingStore::new());

    let image = gateway.lookup("retry1").await.unwrap();
    assert_eq!(image.bytes.as_ref(), JPEG_BYTES);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(gateway.breaker().failure_count(tokio::time::Instant::now()), 0);
}

#[tokio::test]
async fn test_origin_concurrency_is_bounded() {
    let (origin, stats) = start_origin(|path, addr| async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        match path.strip_prefix("/cards/") {
            Some(key) => MockResponse::json(200, card_json(addr, key)),
            None => MockResponse::bytes("image/jpeg", JPEG_BYTES),
        }
    })
    .await;
    let mut config = test_config(origin);
    config.concurrency.limit = 2;
    let gateway = build_gateway(&config, CountingStore::new());

    let lookups: Vec<_> = (0..8)
        .map(|i| {
            let gateway = gateway.clone();
            tokio::spawn(async move { gateway.lookup(&format!("card{i}")).await })
        })
        .collect();
    for lookup in lookups {
        assert!(lookup.await.unwrap().is_ok());
    }

    assert_eq!(gateway.limiter().peak(), 2);
    assert!(stats.peak() <= 2, "origin saw {} concurrent requests", stats.peak());
    assert_eq!(gateway.limiter().in_flight(), 0);
}

#[tokio::test]
async fn test_store_outage_degrades_to_origin() {
    let (origin, stats) = start_origin(|path, addr| async move {
        match path.as_str() {
            "/cards/abc123" => MockResponse::json(200, card_json(addr, "abc123")),
            _ => MockResponse::bytes("image/png", PNG_BYTES),
        }
    })
    .await;
    let config = test_config(origin);
    let store = CountingStore::new();
    store.set_failing(true);
    let gateway = build_gateway(&config, store.clone());

    for _ in 0..2 {
        let image = gateway.lookup("abc123").await.unwrap();
        assert_eq!(image.bytes.as_ref(), PNG_BYTES);
    }
    assert_eq!(stats.requests(), 4, "every lookup goes to the origin");

    // Once the store is back, the next fetch is cached again.
    store.set_failing(false);
    gateway.lookup("abc123").await.unwrap();
    gateway.lookup("abc123").await.unwrap();
    assert_eq!(stats.requests(), 6);
}

#[tokio::test]
async fn test_unreachable_origin_is_upstream_error() {
    // Bind then drop to get a port nothing listens on.
    let addr = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    };
    let mut config = test_config(addr);
    config.retries.backoff_base_ms = 10;
    let gateway = build_gateway(&config, CountingStore::new());

    assert_eq!(gateway.lookup("abc123").await, Err(LookupError::Upstream));
    assert_eq!(gateway.breaker().failure_count(tokio::time::Instant::now()), 1);
}

#[tokio::test]
async fn test_non_document_metadata_counts_as_origin_failure() {
    let (origin, stats) = start_origin(|_, _| async {
        MockResponse::bytes("text/html", b"<html><body>Down for maintenance</body></html>")
    })
    .await;
    let mut config = test_config(origin);
    config.retries.max_attempts = 1;
    config.circuit_breaker.failure_threshold = 1;
    let store = CountingStore::new();
    let gateway = build_gateway(&config, store.clone());

    assert_eq!(gateway.lookup("abc123").await, Err(LookupError::Upstream));
    assert!(gateway.breaker().is_open(tokio::time::Instant::now()));
    for _ in 0..4 {
        assert_eq!(gateway.lookup("abc123").await, Err(LookupError::ServiceUnavailable));
    }
    assert_eq!(stats.requests(), 1);
    assert_eq!(store.sets.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_non_document_metadata_is_retried() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let (origin, stats) = start_origin(move |path, addr| {
        let counter = counter.clone();
        async move {
            match path.as_str() {
                "/cards/maint" if counter.fetch_add(1, Ordering::SeqCst) == 0 => {
                    MockResponse::bytes("text/html", b"<html>maintenance</html>")
                }
                "/cards/maint" => MockResponse::json(200, card_json(addr, "maint")),
                "/img/maint" => MockResponse::bytes("image/jpeg", JPEG_BYTES),
                _ => MockResponse::status(404),
            }
        }
    })
    .await;
    let mut config = test_config(origin);
    config.retries.backoff_base_ms = 10;
    let gateway = build_gateway(&config, CountingStore::new());

    let image = gateway.lookup("maint").await.unwrap();
    assert_eq!(image.bytes.as_ref(), JPEG_BYTES);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(stats.requests(), 3);
}

#[tokio::test]
async fn test_slow_resolve_times_out_and_is_retried() {
    let resolves = Arc::new(AtomicUsize::new(0));
    let counter = resolves.clone();
    let (origin, stats) = start_origin(move |path, addr| {
        let counter = counter.clone();
        async move {
            match path.as_str() {
                "/cards/slow1" => {
                    if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                    MockResponse::json(200, card_json(addr, "slow1"))
                }
                "/img/slow1" => MockResponse::bytes("image/png", PNG_BYTES),
                _ => MockResponse::status(404),
            }
        }
    })
    .await;
    let mut config = test_config(origin);
    config.origin.resolve_timeout_ms = 300;
    config.retries.backoff_base_ms = 10;
    let gateway = build_gateway(&config, CountingStore::new());

    let started = Instant::now();
    let image = gateway.lookup("slow1").await.unwrap();
    assert_eq!(image.bytes.as_ref(), PNG_BYTES);
    assert!(started.elapsed() < Duration::from_millis(900), "elapsed {:?}", started.elapsed());
    assert_eq!(resolves.load(Ordering::SeqCst), 2);
    assert_eq!(stats.requests(), 3, "timed-out resolve, resolve, download");
    assert_eq!(gateway.breaker().failure_count(tokio::time::Instant::now()), 0);
}

#[tokio::test]
async fn test_slow_download_times_out_and_is_retried() {
    let downloads = Arc::new(AtomicUsize::new(0));
    let counter = downloads.clone();
    let (origin, stats) = start_origin(move |path, addr| {
        let counter = counter.clone();
        async move {
            match path.as_str() {
                "/cards/slow2" => MockResponse::json(200, card_json(addr, "slow2")),
                "/img/slow2" => {
                    if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                    MockResponse::bytes("image/jpeg", JPEG_BYTES)
                }
                _ => MockResponse::status(404),
            }
        }
    })
    .await;
    let mut config = test_config(origin);
    config.origin.download_timeout_ms = 300;
    config.retries.backoff_base_ms = 10;
    let gateway = build_gateway(&config, CountingStore::new());

    let image = gateway.lookup("slow2").await.unwrap();
    assert_eq!(image.bytes.as_ref(), JPEG_BYTES);
    assert_eq!(downloads.load(Ordering::SeqCst), 2);
    // Each attempt resolves again before downloading.
    assert_eq!(stats.requests(), 4);
}

#[tokio::test]
async fn test_missing_image_is_negatively_cached() {
    let (origin, stats) = start_origin(|path, addr| async move {
        match path.as_str() {
            "/cards/gone" => MockResponse::json(200, card_json(addr, "gone")),
            _ => MockResponse::status(404),
        }
    })
    .await;
    let config = test_config(origin);
    let store = CountingStore::new();
    let gateway = build_gateway(&config, store.clone());

    assert_eq!(gateway.lookup("gone").await, Err(LookupError::NotFound));
    assert_eq!(stats.requests(), 2, "resolve + download, no retry");
    assert!(store.inner.exists("cardimgneg:gone").await.unwrap());
    assert!(!store.inner.exists("cardimg:gone").await.unwrap());

    assert_eq!(gateway.lookup("gone").await, Err(LookupError::NotFound));
    assert_eq!(stats.requests(), 2);
    assert_eq!(gateway.breaker().failure_count(tokio::time::Instant::now()), 0);
}

#[tokio::test]
async fn test_download_server_error_is_retried() {
    let downloads = Arc::new(AtomicUsize::new(0));
    let counter = downloads.clone();
    let (origin, _) = start_origin(move |path, addr| {
        let counter = counter.clone();
        async move {
            match path.as_str() {
                "/cards/img500" => MockResponse::json(200, card_json(addr, "img500")),
                "/img/img500" if counter.fetch_add(1, Ordering::SeqCst) == 0 => MockResponse::status(500),
                "/img/img500" => MockResponse::bytes("image/png", PNG_BYTES),
                _ => MockResponse::status(404),
            }
        }
    })
    .await;
    let mut config = test_config(origin);
    config.retries.backoff_base_ms = 10;
    let store = CountingStore::new();
    let gateway = build_gateway(&config, store.clone());

    let image = gateway.lookup("img500").await.unwrap();
    assert_eq!(image.content_type, "image/png");
    assert_eq!(downloads.load(Ordering::SeqCst), 2);
    assert_eq!(gateway.breaker().failure_count(tokio::time::Instant::now()), 0);
    assert!(store.inner.exists("cardimg:img500").await.unwrap());
}

/// Origin that answers from a fixed table and counts fetches.
struct TableSource {
    calls: AtomicUsize,
}

#[async_trait]
impl ImageSource for TableSource {
    async fn fetch(&self, key: &str) -> Result<CardImage, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match key {
            "known" => Ok(CardImage::new(Bytes::from_static(JPEG_BYTES), "image/jpeg")),
            _ => Err(FetchError::NotFound),
        }
    }
}

#[tokio::test(start_paused = true)]
async fn test_cache_entries_expire_after_ttl() {
    let mut config = card_image_gateway::config::GatewayConfig::default();
    config.cache.positive_ttl_secs = 3_600;
    config.cache.negative_ttl_secs = 60;
    let origin = Arc::new(TableSource {
        calls: AtomicUsize::new(0),
    });
    let gateway = Gateway::new(Arc::new(MemoryStore::new()), origin.clone(), &config);

    assert!(gateway.lookup("known").await.is_ok());
    assert_eq!(gateway.lookup("unknown").await, Err(LookupError::NotFound));
    assert_eq!(origin.calls.load(Ordering::SeqCst), 2);

    // Negative entry lapses first.
    tokio::time::advance(Duration::from_secs(61)).await;
    assert!(gateway.lookup("known").await.is_ok());
    assert_eq!(gateway.lookup("unknown").await, Err(LookupError::NotFound));
    assert_eq!(origin.calls.load(Ordering::SeqCst), 3);

    tokio::time::advance(Duration::from_secs(3_600)).await;
    assert!(gateway.lookup("known").await.is_ok());
    assert_eq!(origin.calls.load(Ordering::SeqCst), 4);
    assert!(gateway.lookup("known").await.is_ok());
    assert_eq!(origin.calls.load(Ordering::SeqCst), 4);
}
