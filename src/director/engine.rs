//! Request-level composition of registry, health aggregation and selection.

use std::sync::Arc;

use serde_json::json;
use thiserror::Error;
use tokio::task;

use crate::config::HealthCheckConfig;
use crate::health::{HealthAggregator, HealthResult};
use crate::observability::{metrics, ActivityEvent, EventSink};
use crate::registry::{
    Node, NodeFields, NodeFilter, NodePatch, NodeRegistry, PublicNode, RegistryError, Upserted,
};
use crate::selection::{SelectionError, SelectionPolicy};

/// Path of the public selection endpoint, used in activity events.
pub const HOT_NODE_PATH: &str = "/api/hotnode";

/// Errors returned by director operations.
#[derive(Debug, Clone, Error)]
pub enum DirectorError {
    /// No enabled nodes registered.
    #[error("No hot nodes available at this time")]
    NoCandidates,

    /// Enabled nodes exist but none passed health checks.
    #[error("All hot nodes are currently unavailable. Please try again later.")]
    NoEligible,

    #[error("Node not found for owner '{0}'")]
    NotFound(String),

    #[error("Missing required fields: {}", .missing.join(", "))]
    Validation { missing: Vec<&'static str> },

    #[error("Node store unavailable: {0}")]
    StoreUnavailable(String),
}

impl From<RegistryError> for DirectorError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::Validation { missing } => DirectorError::Validation { missing },
            RegistryError::NotFound(owner) => DirectorError::NotFound(owner),
            RegistryError::StoreUnavailable(reason) => DirectorError::StoreUnavailable(reason),
        }
    }
}

pub type DirectorResult<T> = Result<T, DirectorError>;

/// The node selection and health arbitration engine.
pub struct Director {
    registry: Arc<dyn NodeRegistry>,
    health: HealthAggregator,
    policy: Arc<SelectionPolicy>,
    events: Arc<dyn EventSink>,
}

impl Director {
    pub fn new(
        registry: Arc<dyn NodeRegistry>,
        health_config: HealthCheckConfig,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            registry,
            health: HealthAggregator::new(health_config, events.clone()),
            policy: Arc::new(SelectionPolicy::new()),
            events,
        }
    }

    pub fn health(&self) -> &HealthAggregator {
        &self.health
    }

    pub fn registry(&self) -> &Arc<dyn NodeRegistry> {
        &self.registry
    }

    /// Choose the next node for `origin`.
    ///
    /// list enabled → probe → pick → touch. Emits exactly one terminal
    /// activity event whatever the outcome.
    pub async fn select_node(&self, origin: &str) -> DirectorResult<PublicNode> {
        tracing::debug!(origin = %origin, "Hot node request");

        let candidates = match self.registry.list_enabled() {
            Ok(candidates) => candidates,
            Err(e) => return Err(self.store_failure("Failed to list enabled nodes", e)),
        };

        if candidates.is_empty() {
            self.events.emit(ActivityEvent::no_candidates(origin));
            return Err(DirectorError::NoCandidates);
        }

        let total = candidates.len();
        let eligible = self.health.filter_eligible(candidates).await;
        metrics::record_selection_cycle(total, eligible.len());

        if eligible.is_empty() {
            self.events.emit(ActivityEvent::no_eligible(origin, total));
            return Err(DirectorError::NoEligible);
        }

        match self.pick_and_touch(eligible).await {
            Ok(node) => {
                tracing::info!(
                    origin = %origin,
                    owner = %node.owner,
                    url = %node.url,
                    candidates = total,
                    "Selected hot node"
                );
                self.events
                    .emit(ActivityEvent::selection_success(origin, HOT_NODE_PATH, &node));
                Ok(node.public())
            }
            Err(SelectionError::NoEligibleNodes) => {
                self.events.emit(ActivityEvent::no_eligible(origin, total));
                Err(DirectorError::NoEligible)
            }
            Err(SelectionError::Registry(e)) => {
                Err(self.store_failure("Failed to record node selection", e))
            }
        }
    }

    /// Look up an enabled node by owner and touch its `last_used`.
    pub fn lookup_owner(&self, owner: &str) -> DirectorResult<PublicNode> {
        match self.registry.find_by_owner(owner)? {
            Some(node) if node.enabled => {
                let touched = self.registry.touch_last_used(&node.owner, chrono::Utc::now())?;
                Ok(touched.public())
            }
            _ => Err(DirectorError::NotFound(owner.to_string())),
        }
    }

    /// All nodes matching `filter`, most recently used first.
    pub fn list_nodes(&self, filter: NodeFilter) -> DirectorResult<Vec<Node>> {
        let mut nodes = self.registry.list(filter)?;
        nodes.sort_by(|a, b| b.last_used.cmp(&a.last_used));
        Ok(nodes)
    }

    pub fn upsert_node(&self, fields: NodeFields) -> DirectorResult<Upserted> {
        let upserted = self.registry.upsert(fields)?;
        let action = if upserted.created { "create" } else { "update" };
        self.events.emit(ActivityEvent::admin(
            action,
            &upserted.node.owner,
            json!({ "name": upserted.node.name, "url": upserted.node.url }),
        ));
        Ok(upserted)
    }

    pub fn update_node(&self, owner: &str, patch: NodePatch) -> DirectorResult<Node> {
        let fields = patch.field_names();
        let action = match (fields.as_slice(), patch.enabled) {
            (["enabled"], Some(true)) => "enable",
            (["enabled"], Some(false)) => "disable",
            _ => "update",
        };

        let node = self.registry.update(owner, patch)?;
        self.events
            .emit(ActivityEvent::admin(action, owner, json!({ "fields": fields })));
        Ok(node)
    }

    pub fn delete_node(&self, owner: &str) -> DirectorResult<Node> {
        let node = self.registry.delete(owner)?;
        self.events
            .emit(ActivityEvent::admin("delete", owner, json!({ "name": node.name })));
        Ok(node)
    }

    /// Probe an arbitrary URL with the current health settings.
    pub async fn check_health(&self, url: &str) -> HealthResult {
        let result = self.health.check_url(url).await;
        self.events.emit(ActivityEvent::admin(
            "health-check",
            url,
            json!({
                "healthy": result.healthy,
                "details": result.details,
                "error": result.error,
            }),
        ));
        result
    }

    /// Run pick-and-touch on the blocking pool; the touch may write a snapshot to disk.
    async fn pick_and_touch(&self, eligible: Vec<Node>) -> Result<Node, SelectionError> {
        let policy = self.policy.clone();
        let registry = self.registry.clone();

        task::spawn_blocking(move || policy.pick_and_touch(eligible, registry.as_ref()))
            .await
            .unwrap_or_else(|e| {
                Err(SelectionError::Registry(RegistryError::StoreUnavailable(format!(
                    "selection task failed: {}",
                    e
                ))))
            })
    }

    fn store_failure(&self, context: &str, err: RegistryError) -> DirectorError {
        self.events.emit(ActivityEvent::error(context, &err));
        err.into()
    }
}
