//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::http::StatusCode;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use card_image_gateway::cache::{CacheStore, MemoryStore, StoreError, StoreResult};
use card_image_gateway::config::GatewayConfig;
use card_image_gateway::gateway::Gateway;
use card_image_gateway::http::HttpServer;
use card_image_gateway::lifecycle::Shutdown;
use card_image_gateway::origin::RetryingOriginFetcher;

pub const PNG_BYTES: &[u8] = b"\x89PNG\r\n\x1a\n\x00\x00\x00\rIHDRfake-png-body";
pub const JPEG_BYTES: &[u8] = b"\xff\xd8\xff\xe0\x00\x10JFIFfake-jpeg-body";

/// What the mock origin answers for one request.
#[derive(Debug, Clone)]
pub struct MockResponse {
    pub status: u16,
    pub content_type: Option<&'static str>,
    pub body: Vec<u8>,
}

impl MockResponse {
    pub fn json(status: u16, body: serde_json::Value) -> Self {
        Self {
            status,
            content_type: Some("application/json"),
            body: body.to_string().into_bytes(),
        }
    }

    pub fn bytes(content_type: &'static str, body: &[u8]) -> Self {
        Self {
            status: 200,
            content_type: Some(content_type),
            body: body.to_vec(),
        }
    }

    pub fn status(status: u16) -> Self {
        Self {
            status,
            content_type: None,
            body: Vec::new(),
        }
    }
}

/// Per-origin request accounting.
#[derive(Debug, Default)]
pub struct OriginStats {
    pub requests: AtomicUsize,
    pub active: AtomicUsize,
    pub peak: AtomicUsize,
}

impl OriginStats {
    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

/// Start a programmable mock origin on an ephemeral port.
///
/// The handler receives the request path and its origin address (to build image locators).
pub async fn start_origin<F, Fut>(handler: F) -> (SocketAddr, Arc<OriginStats>)
where
    F: Fn(String, SocketAddr) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = MockResponse> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handler = Arc::new(handler);
    let stats = Arc::new(OriginStats::default());
    let task_stats = stats.clone();

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let handler = handler.clone();
                    let stats = task_stats.clone();
                    tokio::spawn(async move {
                        let Some(path) = read_request_path(&mut socket).await else {
                            return;
                        };
                        stats.requests.fetch_add(1, Ordering::SeqCst);
                        let now = stats.active.fetch_add(1, Ordering::SeqCst) + 1;
                        stats.peak.fetch_max(now, Ordering::SeqCst);

                        let response = handler(path, addr).await;
                        stats.active.fetch_sub(1, Ordering::SeqCst);

                        let reason = StatusCode::from_u16(response.status)
                            .ok()
                            .and_then(|s| s.canonical_reason())
                            .unwrap_or("Unknown");
                        let mut head = format!(
                            "HTTP/1.1 {} {}\r\nContent-Length: {}\r\nConnection: close\r\n",
                            response.status,
                            reason,
                            response.body.len()
                        );
                        if let Some(content_type) = response.content_type {
                            head.push_str(&format!("Content-Type: {content_type}\r\n"));
                        }
                        head.push_str("\r\n");

                        let _ = socket.write_all(head.as_bytes()).await;
                        let _ = socket.write_all(&response.body).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    (addr, stats)
}

async fn read_request_path(socket: &mut tokio::net::TcpStream) -> Option<String> {
    let mut buf = Vec::with_capacity(1024);
    let mut chunk = [0u8; 1024];
    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    let head = String::from_utf8_lossy(&buf);
    let request_line = head.lines().next()?;
    request_line.split_whitespace().nth(1).map(str::to_string)
}

/// Metadata document pointing at `/img/{key}` on the mock origin.
pub fn card_json(origin: SocketAddr, key: &str) -> serde_json::Value {
    serde_json::json!({
        "id": key,
        "image_uris": {
            "small": format!("http://{origin}/img/{key}-small"),
            "normal": format!("http://{origin}/img/{key}"),
        }
    })
}

/// Config pointing at a mock origin, with small limits suitable for tests.
pub fn test_config(origin: SocketAddr) -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.cache.redis_url = String::new();
    config.origin.base_url = format!("http://{origin}/cards/");
    config.origin.resolve_timeout_ms = 2_000;
    config.origin.download_timeout_ms = 2_000;
    config.retries.max_attempts = 3;
    config.retries.backoff_base_ms = 200;
    config.concurrency.limit = 4;
    config.circuit_breaker.failure_threshold = 3;
    config.circuit_breaker.window_secs = 60;
    config.circuit_breaker.open_secs = 30;
    config.observability.metrics_enabled = false;
    config
}

pub fn build_gateway(config: &GatewayConfig, store: Arc<dyn CacheStore>) -> Arc<Gateway> {
    let origin = RetryingOriginFetcher::new(&config.origin, &config.retries).unwrap();
    Arc::new(Gateway::new(store, Arc::new(origin), config))
}

/// Serve `gateway` on an ephemeral port; returns its address and the shutdown handle.
pub async fn spawn_server(gateway: Arc<Gateway>) -> (SocketAddr, Shutdown) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let server = HttpServer::new(gateway);
    let server_shutdown = shutdown.clone();
    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });
    (addr, shutdown)
}

pub fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .no_proxy()
        .timeout(Duration::from_secs(10))
        .build()
        .unwrap()
}

/// Memory store that counts calls and can be switched into an outage.
#[derive(Debug, Default)]
pub struct CountingStore {
    pub inner: MemoryStore,
    pub gets: AtomicUsize,
    pub sets: AtomicUsize,
    pub exists: AtomicUsize,
    pub failing: AtomicBool,
}

impl CountingStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> usize {
        self.gets.load(Ordering::SeqCst) + self.sets.load(Ordering::SeqCst) + self.exists.load(Ordering::SeqCst)
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check(&self) -> StoreResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("injected outage".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl CacheStore for CountingStore {
    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> StoreResult<()> {
        self.sets.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        self.inner.set(key, value, ttl).await
    }

    async fn exists(&self, key: &str) -> StoreResult<bool> {
        self.exists.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        self.inner.exists(key).await
    }

    fn name(&self) -> &'static str {
        "counting"
    }
}
