//! Health probing and aggregation against live mock nodes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use node_director::config::HealthCheckConfig;
use node_director::health::{HealthAggregator, HealthProber, ProbeErrorKind};
use node_director::observability::{ActivityLog, EventKind};
use node_director::registry::Node;
use node_director::{InMemoryRegistry, NodeRegistry};

mod common;

fn probe_config(timeout_ms: u64) -> HealthCheckConfig {
    HealthCheckConfig {
        timeout_ms,
        ..Default::default()
    }
}

#[tokio::test]
async fn test_probe_outcomes() {
    let prober = HealthProber::new();
    let config = probe_config(1000);

    let healthy = common::start_healthy_node().await;
    let result = prober.probe(&format!("http://{}", healthy), &config).await;
    assert!(result.healthy);
    assert!(result.error.is_none());
    let details = result.details.unwrap();
    assert_eq!(details.disk_usage, Some(10.0));
    assert_eq!(details.overdue, 0.0);

    let saturated = common::start_mock_node(200, common::health_body(true, 95.0, 0)).await;
    let result = prober.probe(&format!("http://{}", saturated), &config).await;
    assert!(!result.healthy);
    assert!(result.details.is_some());

    let paused = common::start_mock_node(200, common::health_body(false, 10.0, 0)).await;
    assert!(!prober.probe(&format!("http://{}", paused), &config).await.healthy);

    let failing = common::start_mock_node(500, "{}".into()).await;
    let result = prober.probe(&format!("http://{}", failing), &config).await;
    assert!(!result.healthy);
    assert_eq!(result.error_kind, Some(ProbeErrorKind::Unknown));

    let garbled = common::start_mock_node(200, "<html>ok</html>".into()).await;
    assert!(!prober.probe(&format!("http://{}", garbled), &config).await.healthy);

    let refused = common::closed_port().await;
    let result = prober.probe(&format!("http://{}", refused), &config).await;
    assert!(!result.healthy);
    assert_eq!(result.error_kind, Some(ProbeErrorKind::ConnectionRefused));
}

#[tokio::test]
async fn test_probe_timeout_is_classified() {
    let slow = common::start_programmable_node(|| async {
        tokio::time::sleep(Duration::from_secs(2)).await;
        (200, common::health_body(true, 10.0, 0))
    })
    .await;

    let result = HealthProber::new()
        .probe(&format!("http://{}", slow), &probe_config(200))
        .await;
    assert!(!result.healthy);
    assert_eq!(result.error_kind, Some(ProbeErrorKind::Timeout));
    assert!(result.response_time_ms < 2000);
}

#[tokio::test]
async fn test_aggregation_keeps_only_healthy_in_order() {
    let registry = InMemoryRegistry::new();
    let a = common::start_healthy_node().await;
    let full = common::start_mock_node(200, common::health_body(true, 95.0, 0)).await;
    let down = common::closed_port().await;
    let b = common::start_healthy_node().await;

    registry.upsert(common::node("a", a, true)).unwrap();
    registry.upsert(common::node("full", full, true)).unwrap();
    registry.upsert(common::node("down", down, true)).unwrap();
    registry.upsert(common::node("b", b, true)).unwrap();

    let log = Arc::new(ActivityLog::new(10));
    let aggregator = HealthAggregator::new(probe_config(1000), log.clone());

    let eligible: Vec<String> = aggregator
        .filter_eligible(registry.list_enabled().unwrap())
        .await
        .into_iter()
        .map(|n: Node| n.owner)
        .collect();
    assert_eq!(eligible, vec!["a", "b"]);

    let summaries: Vec<_> = log
        .recent()
        .into_iter()
        .filter(|e| e.kind == EventKind::HealthSummary)
        .collect();
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].fields["total"], 4);
    assert_eq!(summaries[0].fields["healthy"], 2);
}

#[tokio::test]
async fn test_node_recovers_between_requests() {
    let up = Arc::new(AtomicBool::new(false));
    let flag = up.clone();
    let addr = common::start_programmable_node(move || {
        let healthy = flag.load(Ordering::SeqCst);
        async move {
            if healthy {
                (200, common::health_body(true, 10.0, 0))
            } else {
                (503, "{}".to_string())
            }
        }
    })
    .await;

    let registry = InMemoryRegistry::new();
    registry.upsert(common::node("flappy", addr, true)).unwrap();
    let aggregator = HealthAggregator::new(probe_config(1000), Arc::new(ActivityLog::default()));

    let nodes = registry.list_enabled().unwrap();
    assert!(aggregator.filter_eligible(nodes.clone()).await.is_empty());

    up.store(true, Ordering::SeqCst);
    assert_eq!(aggregator.filter_eligible(nodes).await.len(), 1);
}
