//! Least-recently-used selection with a round-robin tie-break.

use std::sync::Mutex;

use chrono::Utc;
use thiserror::Error;

use crate::registry::{Node, NodeRegistry, RegistryError};

#[derive(Debug, Error)]
pub enum SelectionError {
    #[error("No eligible nodes to select from")]
    NoEligibleNodes,

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Choose one node from `eligible` given the rotation cursor.
///
/// Nodes are ordered by `last_used` ascending; equal timestamps keep their
/// input order. The cursor rotates among the nodes sharing the oldest
/// timestamp. Returns the index into `eligible` and the advanced cursor,
/// `(cursor + 1) mod len`.
pub fn select(eligible: &[Node], cursor: usize) -> Result<(usize, usize), SelectionError> {
    let len = eligible.len();
    if len == 0 {
        return Err(SelectionError::NoEligibleNodes);
    }

    let mut order: Vec<usize> = (0..len).collect();
    order.sort_by_key(|&i| eligible[i].last_used);

    let oldest = eligible[order[0]].last_used;
    let front = order
        .iter()
        .take_while(|&&i| eligible[i].last_used == oldest)
        .count();

    let chosen = order[cursor % len % front];
    Ok((chosen, (cursor % len + 1) % len))
}

/// Owns the rotation cursor and serializes pick-and-touch.
#[derive(Debug, Default)]
pub struct SelectionPolicy {
    cursor: Mutex<usize>,
}

impl SelectionPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pick one of `eligible` and advance its `last_used`.
    ///
    /// The whole sequence runs under the cursor lock, and `last_used` is
    /// re-read from the registry inside it, so concurrent callers always see
    /// each other's touches. Nodes deleted or disabled since they were probed
    /// are dropped. The cursor only advances once the touch succeeded.
    pub fn pick_and_touch(
        &self,
        eligible: Vec<Node>,
        registry: &dyn NodeRegistry,
    ) -> Result<Node, SelectionError> {
        let mut cursor = self.cursor.lock().unwrap_or_else(|e| e.into_inner());

        let mut fresh = Vec::with_capacity(eligible.len());
        for node in eligible {
            match registry.find_by_owner(&node.owner)? {
                Some(current) if current.enabled => fresh.push(current),
                _ => tracing::debug!(owner = %node.owner, "Node left the candidate set during selection"),
            }
        }

        let (index, next) = select(&fresh, *cursor)?;
        let chosen = &fresh[index];

        tracing::debug!(
            owner = %chosen.owner,
            index,
            of = fresh.len(),
            next_cursor = next,
            "Rotation selection"
        );

        let touched = registry.touch_last_used(&chosen.owner, Utc::now())?;
        *cursor = next;

        Ok(touched)
    }
}
