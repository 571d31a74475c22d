//! In-memory node registry with optional JSON persistence.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::registry::node::{advance_past, Node, NodeFields, NodePatch};
use crate::registry::{NodeFilter, NodeRegistry, RegistryError, RegistryResult, Upserted};

#[derive(Debug, Clone)]
struct Slot {
    /// Registration order, used as the stable enumeration order.
    seq: u64,
    node: Node,
}

/// A thread-safe registry keyed by owner.
#[derive(Debug, Default)]
pub struct InMemoryRegistry {
    nodes: DashMap<String, Slot>,
    next_seq: AtomicU64,
    persistence_path: Option<PathBuf>,
    /// Serializes mutations together with their snapshot writes.
    persist_lock: Mutex<()>,
}

impl InMemoryRegistry {
    /// Create an empty, memory-only registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a registry backed by a JSON snapshot, loading it if the file exists.
    pub fn open(path: impl AsRef<Path>) -> RegistryResult<Self> {
        let path = path.as_ref().to_path_buf();
        let registry = Self {
            persistence_path: Some(path.clone()),
            ..Self::default()
        };

        if path.exists() {
            let file = File::open(&path).map_err(store_err)?;
            let nodes: Vec<Node> =
                serde_json::from_reader(BufReader::new(file)).map_err(store_err)?;
            for node in nodes {
                let seq = registry.next_seq.fetch_add(1, Ordering::Relaxed);
                registry.nodes.insert(node.owner.clone(), Slot { seq, node });
            }
            tracing::info!(path = ?path, count = registry.nodes.len(), "Loaded node registry snapshot");
        }

        Ok(registry)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn snapshot(&self) -> Vec<Node> {
        let mut slots: Vec<Slot> = self.nodes.iter().map(|r| r.value().clone()).collect();
        slots.sort_by_key(|s| s.seq);
        slots.into_iter().map(|s| s.node).collect()
    }

    /// Rewrite the snapshot file. No-op for a memory-only registry.
    ///
    /// Must not be called while holding a map guard.
    fn write_snapshot(&self) -> RegistryResult<()> {
        let Some(path) = &self.persistence_path else {
            return Ok(());
        };

        let nodes = self.snapshot();
        let tmp = path.with_extension("tmp");
        let file = File::create(&tmp).map_err(store_err)?;
        serde_json::to_writer_pretty(BufWriter::new(file), &nodes).map_err(store_err)?;
        fs::rename(&tmp, path).map_err(store_err)?;

        tracing::debug!(path = ?path, count = nodes.len(), "Persisted node registry snapshot");
        Ok(())
    }

    /// Apply one mutation and persist it, reverting the map if the write fails.
    ///
    /// Mutations are serialized on `persist_lock`, so the revert never
    /// clobbers a concurrent change and an older snapshot never overwrites a
    /// newer one.
    fn commit<T>(&self, mutate: impl FnOnce() -> RegistryResult<(T, Undo)>) -> RegistryResult<T> {
        let _guard = self
            .persist_lock
            .lock()
            .map_err(|_| RegistryError::StoreUnavailable("persistence lock poisoned".into()))?;

        let (value, undo) = mutate()?;
        if let Err(e) = self.write_snapshot() {
            tracing::warn!(error = %e, "Snapshot write failed, reverting in-memory change");
            match undo {
                Undo::Restore(owner, slot) => {
                    self.nodes.insert(owner, slot);
                }
                Undo::Remove(owner) => {
                    self.nodes.remove(&owner);
                }
            }
            return Err(e);
        }
        Ok(value)
    }
}

/// How to revert a single mutation.
enum Undo {
    Restore(String, Slot),
    Remove(String),
}

fn store_err(e: impl std::fmt::Display) -> RegistryError {
    RegistryError::StoreUnavailable(e.to_string())
}

impl NodeRegistry for InMemoryRegistry {
    fn list(&self, filter: NodeFilter) -> RegistryResult<Vec<Node>> {
        Ok(self
            .snapshot()
            .into_iter()
            .filter(|n| filter.enabled.map_or(true, |enabled| n.enabled == enabled))
            .collect())
    }

    fn find_by_owner(&self, owner: &str) -> RegistryResult<Option<Node>> {
        Ok(self.nodes.get(owner).map(|r| r.node.clone()))
    }

    fn touch_last_used(&self, owner: &str, at: DateTime<Utc>) -> RegistryResult<Node> {
        self.commit(|| {
            let mut slot = self
                .nodes
                .get_mut(owner)
                .ok_or_else(|| RegistryError::NotFound(owner.to_string()))?;
            let previous = slot.clone();
            slot.node.last_used = advance_past(slot.node.last_used, at);
            Ok((slot.node.clone(), Undo::Restore(owner.to_string(), previous)))
        })
    }

    fn upsert(&self, fields: NodeFields) -> RegistryResult<Upserted> {
        let fields = fields.validate()?;
        let now = Utc::now();

        self.commit(|| {
            let owner = fields.owner.clone();
            let result = match self.nodes.entry(owner.clone()) {
                Entry::Occupied(mut entry) => {
                    let previous = entry.get().clone();
                    let node = &mut entry.get_mut().node;
                    node.name = fields.name;
                    node.ip = fields.ip;
                    node.url = fields.url;
                    node.comments = fields.comments;
                    node.enabled = fields.enabled;
                    node.updated_at = advance_past(node.updated_at, now);
                    let upserted = Upserted {
                        node: node.clone(),
                        created: false,
                    };
                    (upserted, Undo::Restore(owner, previous))
                }
                Entry::Vacant(entry) => {
                    let node = Node {
                        owner: fields.owner,
                        name: fields.name,
                        ip: fields.ip,
                        url: fields.url,
                        comments: fields.comments,
                        enabled: fields.enabled,
                        last_used: now,
                        created_at: now,
                        updated_at: now,
                    };
                    let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
                    entry.insert(Slot {
                        seq,
                        node: node.clone(),
                    });
                    let upserted = Upserted {
                        node,
                        created: true,
                    };
                    (upserted, Undo::Remove(owner))
                }
            };
            Ok(result)
        })
    }

    fn update(&self, owner: &str, patch: NodePatch) -> RegistryResult<Node> {
        self.commit(|| {
            let mut slot = self
                .nodes
                .get_mut(owner)
                .ok_or_else(|| RegistryError::NotFound(owner.to_string()))?;
            let previous = slot.clone();
            patch.apply(&mut slot.node);
            slot.node.updated_at = advance_past(slot.node.updated_at, Utc::now());
            Ok((slot.node.clone(), Undo::Restore(owner.to_string(), previous)))
        })
    }

    fn delete(&self, owner: &str) -> RegistryResult<Node> {
        self.commit(|| {
            let (_, slot) = self
                .nodes
                .remove(owner)
                .ok_or_else(|| RegistryError::NotFound(owner.to_string()))?;
            let node = slot.node.clone();
            Ok((node, Undo::Restore(owner.to_string(), slot)))
        })
    }
}
