//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use node_director::config::{DirectorConfig, HealthMode};
use node_director::observability::ActivityLog;
use node_director::registry::NodeFields;
use node_director::{HttpServer, InMemoryRegistry, NodeRegistry, Shutdown};

pub const TEST_SECRET: &str = "test-secret";

/// Health payload a node reports.
pub fn health_body(enabled: bool, disk_usage_percent: f64, overdue: u64) -> String {
    json!({
        "enabled": enabled,
        "disk_usage_percent": disk_usage_percent,
        "pins": { "overdue": overdue, "pending": 0 },
        "version": "1.0.0",
    })
    .to_string()
}

fn status_line(status: u16) -> &'static str {
    match status {
        200 => "200 OK",
        404 => "404 Not Found",
        500 => "500 Internal Server Error",
        503 => "503 Service Unavailable",
        _ => "200 OK",
    }
}

/// Start a programmable mock node on an ephemeral port.
///
/// `f` produces the status and body for every request, after an optional delay.
pub async fn start_programmable_node<F, Fut>(f: F) -> SocketAddr
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let f = f.clone();
                    tokio::spawn(async move {
                        let mut buf = [0u8; 4096];
                        let _ = socket.read(&mut buf).await;

                        let (status, body) = f().await;
                        let response = format!(
                            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            status_line(status),
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}

/// Start a mock node that always answers `status` with `body`.
pub async fn start_mock_node(status: u16, body: String) -> SocketAddr {
    start_programmable_node(move || {
        let body = body.clone();
        async move { (status, body) }
    })
    .await
}

/// Start a mock node reporting a healthy state.
pub async fn start_healthy_node() -> SocketAddr {
    start_mock_node(200, health_body(true, 10.0, 0)).await
}

/// An address nothing listens on.
pub async fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

pub fn node(owner: &str, addr: SocketAddr, enabled: bool) -> NodeFields {
    NodeFields {
        owner: Some(owner.to_string()),
        name: Some(format!("{} node", owner)),
        ip: Some(addr.ip().to_string()),
        url: Some(format!("http://{}", addr)),
        comments: None,
        enabled: Some(enabled),
    }
}

/// Director configuration suited to tests: short probe timeout, known secret.
pub fn test_config() -> DirectorConfig {
    let mut config = DirectorConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.health_check.timeout_ms = 1000;
    config.auth.api_secret = TEST_SECRET.into();
    config.observability.metrics_enabled = false;
    config
}

pub fn simulated_config() -> DirectorConfig {
    let mut config = test_config();
    config.health_check.mode = HealthMode::Simulate;
    config
}

/// A running director and handles to drive it.
pub struct TestDirector {
    pub addr: SocketAddr,
    pub registry: Arc<InMemoryRegistry>,
    pub activity: Arc<ActivityLog>,
    pub config_tx: mpsc::UnboundedSender<DirectorConfig>,
    pub shutdown: Shutdown,
}

impl TestDirector {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

/// Start a director on an ephemeral port over `registry`.
pub async fn start_director(config: DirectorConfig, registry: Arc<InMemoryRegistry>) -> TestDirector {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shared: Arc<dyn NodeRegistry> = registry.clone();
    let server = HttpServer::new(config, shared);
    let activity = server.activity();

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    let (config_tx, config_updates) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        let _ = server.run(listener, config_updates, server_shutdown).await;
    });

    TestDirector {
        addr,
        registry,
        activity,
        config_tx,
        shutdown,
    }
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .no_proxy()
        .timeout(Duration::from_secs(10))
        .build()
        .unwrap()
}
