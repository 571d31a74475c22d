//! Node registry subsystem.
//!
//! # Data Flow
//! ```text
//! Selection path:
//!     director → list_enabled() → [probe + pick] → touch_last_used()
//!
//! Write path (authenticated API):
//!     handler → NodeFields::validate() → upsert()/update()/delete()
//!
//! Storage (memory.rs):
//!     DashMap keyed by owner
//!     → optional JSON snapshot rewritten after every mutation
//! ```
//!
//! # Design Decisions
//! - Calls are synchronous; the engine never holds a registry call across an await
//! - Enumeration order is insertion order, which is the stable tie-break for selection
//! - `touch_last_used` always moves the timestamp strictly forward

pub mod memory;
pub mod node;

use chrono::{DateTime, Utc};
use thiserror::Error;

pub use memory::InMemoryRegistry;
pub use node::{Node, NodeFields, NodePatch, PublicNode};

/// Errors surfaced by a registry.
#[derive(Debug, Clone, Error)]
pub enum RegistryError {
    /// Required fields absent on a write.
    #[error("Missing required fields: {}", .missing.join(", "))]
    Validation { missing: Vec<&'static str> },

    /// No node with this owner.
    #[error("Node not found for owner '{0}'")]
    NotFound(String),

    /// The backing store could not complete the call.
    #[error("Node store unavailable: {0}")]
    StoreUnavailable(String),
}

pub type RegistryResult<T> = Result<T, RegistryError>;

/// Restricts `list` by the `enabled` flag.
#[derive(Debug, Clone, Copy, Default)]
pub struct NodeFilter {
    pub enabled: Option<bool>,
}

impl NodeFilter {
    pub fn enabled_only() -> Self {
        Self {
            enabled: Some(true),
        }
    }
}

/// Result of an upsert.
#[derive(Debug, Clone)]
pub struct Upserted {
    pub node: Node,
    pub created: bool,
}

/// Storage of node records as seen by the engine.
pub trait NodeRegistry: Send + Sync {
    /// Nodes matching `filter`, in registration order.
    fn list(&self, filter: NodeFilter) -> RegistryResult<Vec<Node>>;

    /// Candidates for selection, in registration order.
    fn list_enabled(&self) -> RegistryResult<Vec<Node>> {
        self.list(NodeFilter::enabled_only())
    }

    fn find_by_owner(&self, owner: &str) -> RegistryResult<Option<Node>>;

    /// Advance `lastUsed` to `at`, or just past its current value if `at` is not later.
    fn touch_last_used(&self, owner: &str, at: DateTime<Utc>) -> RegistryResult<Node>;

    /// Create the node or overwrite the one with the same owner.
    fn upsert(&self, fields: NodeFields) -> RegistryResult<Upserted>;

    fn update(&self, owner: &str, patch: NodePatch) -> RegistryResult<Node>;

    /// Remove the node and return its final state.
    fn delete(&self, owner: &str) -> RegistryResult<Node>;
}
