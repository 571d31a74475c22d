//! Concurrent health aggregation over a candidate set.

use std::sync::Arc;

use arc_swap::ArcSwap;
use futures_util::future::join_all;

use crate::config::{HealthCheckConfig, HealthMode};
use crate::health::probe::{HealthProber, HealthResult};
use crate::observability::{ActivityEvent, EventSink};
use crate::registry::Node;

/// Partitions candidates into healthy and unhealthy by probing them in parallel.
pub struct HealthAggregator {
    prober: HealthProber,
    config: ArcSwap<HealthCheckConfig>,
    events: Arc<dyn EventSink>,
}

impl HealthAggregator {
    pub fn new(config: HealthCheckConfig, events: Arc<dyn EventSink>) -> Self {
        if config.mode == HealthMode::Simulate {
            tracing::warn!("Health checks in simulate mode: every enabled node is treated as healthy");
        }
        Self {
            prober: HealthProber::new(),
            config: ArcSwap::from_pointee(config),
            events,
        }
    }

    /// Swap in new probe settings; in-flight aggregations keep the old ones.
    pub fn reconfigure(&self, config: HealthCheckConfig) {
        if config.mode == HealthMode::Simulate {
            tracing::warn!("Health checks switched to simulate mode");
        }
        self.config.store(Arc::new(config));
    }

    pub fn config(&self) -> Arc<HealthCheckConfig> {
        self.config.load_full()
    }

    /// Probe a single URL with the current settings.
    pub async fn check_url(&self, url: &str) -> HealthResult {
        let config = self.config.load_full();
        self.prober.probe(url, &config).await
    }

    /// Return the subset of `nodes` whose probe succeeded, in input order.
    ///
    /// Every probe runs concurrently with its own timeout and all of them are
    /// awaited before returning. Emits one `health_summary` event for
    /// non-empty input.
    pub async fn filter_eligible(&self, nodes: Vec<Node>) -> Vec<Node> {
        if nodes.is_empty() {
            return nodes;
        }

        let config = self.config.load_full();
        let total = nodes.len();

        if config.mode == HealthMode::Simulate {
            tracing::debug!(total, "Simulated health check, skipping probes");
            self.events
                .emit(ActivityEvent::health_summary(total, total, true));
            return nodes;
        }

        tracing::debug!(total, "Health checking nodes");

        let results = join_all(nodes.iter().map(|node| self.prober.probe(&node.url, &config))).await;

        let mut healthy = Vec::with_capacity(total);
        for (node, result) in nodes.into_iter().zip(results) {
            if result.healthy {
                healthy.push(node);
            } else {
                tracing::warn!(
                    owner = %node.owner,
                    url = %node.url,
                    kind = result.error_kind.map(|k| k.as_str()).unwrap_or("failed"),
                    error = result.error.as_deref().unwrap_or(""),
                    "Node unhealthy"
                );
            }
        }

        self.events
            .emit(ActivityEvent::health_summary(total, healthy.len(), false));

        healthy
    }
}
