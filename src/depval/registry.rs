//! Global dependency-validation registry
//!
//! A `DashMap`-backed arena of nodes for a concurrent tag index, plus a
//! composite dedup index and a monotonic global change counter.

use std::sync::Arc;

use dashmap::DashMap;
use thiserror::Error;

use crate::ids::MonotonicCounter;

use super::handle::DependencyValidation;
use super::node::{
    DepValNode, DepValNodeId, DepValNodeKind, DependencyUpdateReport, FileSnapshot,
    FileSnapshotState, INVALID_NODE,
};

/// Errors raised by the dependency-validation registry.
#[derive(Debug, Error)]
pub enum DepValError {
    /// A handle referenced a node id the registry no longer has.
    #[error("dependency validation node {0} no longer exists")]
    NodeGone(DepValNodeId),
}

/// Result alias for [`DepValRegistry`] operations.
pub type DepValResult<T> = Result<T, DepValError>;

/// Configuration for the dependency-validation registry.
#[derive(Debug, Clone)]
pub struct DepValConfig {
    /// Initial capacity hint for the node arena.
    pub initial_capacity: usize,
}

impl Default for DepValConfig {
    fn default() -> Self {
        Self {
            initial_capacity: 1024,
        }
    }
}

/// Global dependency-validation graph.
///
/// Reference-counted nodes (file-backed leaves or composites referencing
/// other nodes), addressed by [`DepValNodeId`]. Invalidation propagates along
/// reverse edges: increasing a node's validation index also increases every
/// node that transitively depends on it.
pub struct DepValRegistry {
    nodes: DashMap<DepValNodeId, DepValNode>,
    /// Composite dedup index: hash of sorted child-id set -> existing node.
    composite_index: DashMap<u64, DepValNodeId>,
    /// File path -> node id, so repeated `make(path)` calls reuse a leaf.
    file_index: DashMap<String, DepValNodeId>,
    /// Separate table of shadow overrides, keyed by normalized path.
    shadows: DashMap<String, FileSnapshot>,
    next_id: MonotonicCounter,
    global_change_index: MonotonicCounter,
}

impl DepValRegistry {
    /// Build a registry with the given configuration.
    pub fn with_config(_config: DepValConfig) -> Arc<Self> {
        Arc::new(Self {
            nodes: DashMap::new(),
            composite_index: DashMap::new(),
            file_index: DashMap::new(),
            shadows: DashMap::new(),
            next_id: MonotonicCounter::new(),
            global_change_index: MonotonicCounter::new(),
        })
    }

    /// Build a registry with default configuration.
    pub fn new() -> Arc<Self> {
        Self::with_config(DepValConfig::default())
    }

    /// Create (or reuse, if already registered) a leaf tracking `path`.
    pub fn make_file(self: &Arc<Self>, path: &str, marker: u64) -> DependencyValidation {
        if let Some(existing) = self.file_index.get(path) {
            return self.handle_for(*existing);
        }
        let snapshot = FileSnapshot::normal(path, marker);
        let id = self.alloc(DepValNode::new_leaf(snapshot));
        self.file_index.insert(path.to_string(), id);
        self.handle_for(id)
    }

    /// Create (or reuse) a leaf from an explicit snapshot.
    pub fn make_file_state(self: &Arc<Self>, snapshot: FileSnapshot) -> DependencyValidation {
        if let Some(existing) = self.file_index.get(&snapshot.path) {
            return self.handle_for(*existing);
        }
        let path = snapshot.path.clone();
        let id = self.alloc(DepValNode::new_leaf(snapshot));
        self.file_index.insert(path, id);
        self.handle_for(id)
    }

    /// Create a node with no attached file (used as a placeholder that
    /// later receives `register_dependency` calls).
    pub fn make_empty(self: &Arc<Self>) -> DependencyValidation {
        let id = self.alloc(DepValNode::new_empty());
        self.handle_for(id)
    }

    /// Create a composite node over `children`, reusing an existing
    /// composite if one already has the same child set (order- and
    /// duplicate-insensitive).
    pub fn make_or_reuse(self: &Arc<Self>, children: &[DependencyValidation]) -> DependencyValidation {
        let mut ids: Vec<DepValNodeId> = children.iter().map(|h| h.node_id()).collect();
        ids.sort_unstable();
        ids.dedup();

        let key = hash_child_set(&ids);
        if let Some(existing) = self.composite_index.get(&key) {
            return self.handle_for(*existing);
        }

        let id = self.alloc(DepValNode::new_composite(ids.clone()));
        for child in &ids {
            if let Some(mut node) = self.nodes.get_mut(child) {
                node.dependents.push(id);
            }
        }
        self.composite_index.insert(key, id);
        self.handle_for(id)
    }

    /// Current validation index for a node (0 means still valid).
    pub fn validation_index(&self, id: DepValNodeId) -> u32 {
        self.nodes.get(&id).map(|n| n.validation_index).unwrap_or(0)
    }

    /// Register `dependency` as an input of `dependent`: if `dependency` is
    /// already stale, `dependent`'s index is bumped immediately, and future
    /// increases to `dependency` propagate to `dependent` as well.
    pub fn register_asset_dependency(&self, dependent: DepValNodeId, dependency: DepValNodeId) {
        if let Some(mut node) = self.nodes.get_mut(&dependency) {
            node.dependents.push(dependent);
        }
        let dependency_index = self.validation_index(dependency);
        if dependency_index > 0 {
            self.bump(dependent);
        }
    }

    /// Attach (or replace) a file dependency on a leaf/placeholder node.
    pub fn register_file_dependency(&self, node_id: DepValNodeId, snapshot: FileSnapshot) {
        if let Some(mut node) = self.nodes.get_mut(&node_id) {
            node.kind = DepValNodeKind::File(snapshot.clone());
        }
        self.file_index.insert(snapshot.path, node_id);
    }

    /// Increase a node's validation index, propagating transitively to every
    /// node that (directly or indirectly) depends on it. Also bumps the
    /// registry's global change index.
    pub fn increase_validation_index(&self, id: DepValNodeId) {
        self.bump(id);
    }

    fn bump(&self, id: DepValNodeId) {
        let mut stack = vec![id];
        let mut visited = std::collections::HashSet::new();
        while let Some(current) = stack.pop() {
            if !visited.insert(current) {
                continue;
            }
            let dependents = if let Some(mut node) = self.nodes.get_mut(&current) {
                node.validation_index += 1;
                node.dependents.clone()
            } else {
                continue;
            };
            stack.extend(dependents);
        }
        self.global_change_index.advance();
    }

    /// Replace-or-insert a shadow entry for `path`; if a real (non-shadow)
    /// leaf already exists for that path, bump its validation index so that
    /// dependents rebuild against the shadowed content. Resolves the open
    /// question around `ShadowFile` semantics (see DESIGN.md).
    pub fn shadow_file(&self, path: &str, snapshot: FileSnapshot) {
        self.shadows.insert(path.to_string(), snapshot);
        if let Some(node_id) = self.file_index.get(path) {
            self.bump(*node_id);
        }
    }

    /// The current state the registry considers live for `path`: a shadow
    /// override if one is set, otherwise the registered leaf's snapshot.
    pub fn dependent_file_state(&self, path: &str) -> Option<FileSnapshot> {
        if let Some(shadow) = self.shadows.get(path) {
            return Some(shadow.clone());
        }
        let node_id = self.file_index.get(path)?;
        match &self.nodes.get(&*node_id)?.kind {
            DepValNodeKind::File(snapshot) => Some(snapshot.clone()),
            _ => None,
        }
    }

    /// The registry-wide monotonic counter, bumped on every validation-index
    /// change. Cheap to poll for "did anything change since last time".
    pub fn global_change_index(&self) -> u64 {
        self.global_change_index.current()
    }

    /// Enumerate every file transitively reachable from `id`, following
    /// composite children. Useful for a hot-reload file watcher built atop
    /// this crate that wants to know every path a resolved asset depends on.
    pub fn collate_file_states(&self, id: DepValNodeId) -> Vec<FileSnapshot> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        let mut visited = std::collections::HashSet::new();
        while let Some(current) = stack.pop() {
            if !visited.insert(current) {
                continue;
            }
            let Some(node) = self.nodes.get(&current) else {
                continue;
            };
            match &node.kind {
                DepValNodeKind::File(snapshot) => out.push(snapshot.clone()),
                DepValNodeKind::Composite => stack.extend(node.children.clone()),
                DepValNodeKind::Empty => {}
            }
        }
        out
    }

    /// As [`Self::collate_file_states`], but reports the registered snapshot
    /// alongside whatever the registry currently considers live for that
    /// path (accounting for shadows).
    pub fn collate_file_updates(&self, id: DepValNodeId) -> Vec<DependencyUpdateReport> {
        self.collate_file_states(id)
            .into_iter()
            .map(|registered| {
                let current = self
                    .dependent_file_state(&registered.path)
                    .unwrap_or_else(|| FileSnapshot {
                        path: registered.path.clone(),
                        state: FileSnapshotState::Missing,
                        marker: 0,
                    });
                DependencyUpdateReport {
                    path: registered.path.clone(),
                    registered,
                    current,
                }
            })
            .collect()
    }

    pub(crate) fn add_ref(&self, id: DepValNodeId) {
        if let Some(mut node) = self.nodes.get_mut(&id) {
            node.refcount += 1;
        }
    }

    pub(crate) fn release(&self, id: DepValNodeId) {
        let should_remove = self
            .nodes
            .get_mut(&id)
            .map(|mut node| {
                node.refcount = node.refcount.saturating_sub(1);
                node.refcount == 0
            })
            .unwrap_or(false);
        if should_remove {
            self.nodes.remove(&id);
        }
    }

    fn alloc(&self, node: DepValNode) -> DepValNodeId {
        let id = self.next_id.advance();
        self.nodes.insert(id, node);
        id
    }

    fn handle_for(self: &Arc<Self>, id: DepValNodeId) -> DependencyValidation {
        DependencyValidation::new(Arc::clone(self), id)
    }

    /// A handle that carries no dependency validation at all.
    pub fn invalid_handle(self: &Arc<Self>) -> DependencyValidation {
        DependencyValidation::new(Arc::clone(self), INVALID_NODE)
    }
}

fn hash_child_set(sorted_ids: &[DepValNodeId]) -> u64 {
    let mut hasher = blake3::Hasher::new();
    for id in sorted_ids {
        hasher.update(&id.to_le_bytes());
    }
    let hash = hasher.finalize();
    let b = hash.as_bytes();
    u64::from_le_bytes(b[0..8].try_into().unwrap())
}
