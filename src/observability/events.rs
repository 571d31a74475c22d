//! Activity events and the sink they are emitted to.
//!
//! # Responsibilities
//! - Define the structured events the engine produces
//! - Fan events out to tracing, metrics, a recent-history buffer and live subscribers
//!
//! # Design Decisions
//! - Emission is fire-and-forget; a lagging or absent subscriber never fails a request
//! - One terminal event per selection request (success, no candidates, no eligible,
//!   throttled, or error)

use std::collections::VecDeque;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::broadcast;

use crate::observability::metrics;
use crate::registry::Node;

/// Category of an activity event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    SelectionSuccess,
    NoCandidates,
    NoEligible,
    ThrottleRejected,
    HealthSummary,
    Admin,
    Error,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::SelectionSuccess => "selection_success",
            EventKind::NoCandidates => "no_candidates",
            EventKind::NoEligible => "no_eligible",
            EventKind::ThrottleRejected => "throttle_rejected",
            EventKind::HealthSummary => "health_summary",
            EventKind::Admin => "admin",
            EventKind::Error => "error",
        }
    }

    /// Whether this kind ends a selection request.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, EventKind::HealthSummary | EventKind::Admin)
    }
}

/// A structured activity event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityEvent {
    pub kind: EventKind,
    pub message: String,
    pub fields: Value,
    pub timestamp: DateTime<Utc>,
}

impl ActivityEvent {
    pub fn new(kind: EventKind, message: impl Into<String>, fields: Value) -> Self {
        Self {
            kind,
            message: message.into(),
            fields,
            timestamp: Utc::now(),
        }
    }

    pub fn selection_success(origin: &str, path: &str, node: &Node) -> Self {
        Self::new(
            EventKind::SelectionSuccess,
            format!("GET {} from {} → returned \"{}\"", path, origin, node.owner),
            json!({
                "ip": origin,
                "endpoint": path,
                "nodeOwner": node.owner,
                "nodeName": node.name,
            }),
        )
    }

    pub fn no_candidates(origin: &str) -> Self {
        Self::new(
            EventKind::NoCandidates,
            format!("No enabled nodes for request from {}", origin),
            json!({ "ip": origin }),
        )
    }

    pub fn no_eligible(origin: &str, candidates: usize) -> Self {
        Self::new(
            EventKind::NoEligible,
            format!("None of {} enabled nodes passed health checks for {}", candidates, origin),
            json!({ "ip": origin, "candidates": candidates }),
        )
    }

    pub fn throttle_rejected(origin: &str, path: &str) -> Self {
        Self::new(
            EventKind::ThrottleRejected,
            format!("Rate limit hit for {} on {}", origin, path),
            json!({ "ip": origin, "endpoint": path }),
        )
    }

    pub fn health_summary(total: usize, healthy: usize, simulated: bool) -> Self {
        Self::new(
            EventKind::HealthSummary,
            format!("Health check: {}/{} nodes healthy", healthy, total),
            json!({
                "total": total,
                "healthy": healthy,
                "unhealthy": total - healthy,
                "simulated": simulated,
            }),
        )
    }

    pub fn admin(action: &str, owner: &str, details: Value) -> Self {
        let message = match action {
            "create" => format!("Created new node \"{}\"", owner),
            "update" => format!("Updated node \"{}\"", owner),
            "delete" => format!("Deleted node \"{}\"", owner),
            "enable" => format!("Enabled node \"{}\"", owner),
            "disable" => format!("Disabled node \"{}\"", owner),
            other => format!("Admin action: {} on \"{}\"", other, owner),
        };
        Self::new(
            EventKind::Admin,
            message,
            json!({ "action": action, "nodeOwner": owner, "details": details }),
        )
    }

    pub fn error(message: impl Into<String>, error: &dyn std::error::Error) -> Self {
        Self::new(
            EventKind::Error,
            message,
            json!({ "error": error.to_string() }),
        )
    }
}

/// Destination for activity events.
pub trait EventSink: Send + Sync {
    /// Record an event. Must not block or fail the caller.
    fn emit(&self, event: ActivityEvent);
}

/// Default sink: tracing output, metrics, bounded history and a live broadcast.
pub struct ActivityLog {
    tx: broadcast::Sender<ActivityEvent>,
    recent: Mutex<VecDeque<ActivityEvent>>,
    history: usize,
}

impl ActivityLog {
    pub fn new(history: usize) -> Self {
        let (tx, _) = broadcast::channel(history.max(16));
        Self {
            tx,
            recent: Mutex::new(VecDeque::with_capacity(history)),
            history,
        }
    }

    /// Receive events emitted from now on.
    ///
    /// This is the attachment point for an external live-log transport
    /// (websocket or SSE fan-out). The director itself ships no such
    /// transport, so in a bare deployment the channel has no receivers and
    /// `emit` drops the send result.
    pub fn subscribe(&self) -> broadcast::Receiver<ActivityEvent> {
        self.tx.subscribe()
    }

    /// Most recent events, oldest first.
    pub fn recent(&self) -> Vec<ActivityEvent> {
        match self.recent.lock() {
            Ok(recent) => recent.iter().cloned().collect(),
            Err(_) => Vec::new(),
        }
    }
}

impl Default for ActivityLog {
    fn default() -> Self {
        Self::new(200)
    }
}

impl EventSink for ActivityLog {
    fn emit(&self, event: ActivityEvent) {
        match event.kind {
            EventKind::Error => {
                tracing::error!(kind = event.kind.as_str(), fields = %event.fields, "{}", event.message)
            }
            EventKind::ThrottleRejected | EventKind::NoCandidates | EventKind::NoEligible => {
                tracing::warn!(kind = event.kind.as_str(), fields = %event.fields, "{}", event.message)
            }
            _ => {
                tracing::info!(kind = event.kind.as_str(), fields = %event.fields, "{}", event.message)
            }
        }

        metrics::record_event(event.kind.as_str());

        if self.history > 0 {
            if let Ok(mut recent) = self.recent.lock() {
                if recent.len() == self.history {
                    recent.pop_front();
                }
                recent.push_back(event.clone());
            }
        }

        // No subscribers is not an error.
        let _ = self.tx.send(event);
    }
}
