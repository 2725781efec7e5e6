//! The client-facing dependency-validation handle

use std::sync::Arc;

use super::node::{DepValNodeId, INVALID_NODE};
use super::registry::DepValRegistry;

/// A lightweight, reference-counted token onto a node in the dependency
/// validation graph.
///
/// Cloning bumps the node's refcount; dropping releases it. An
/// "invalid" handle (the default, and what `make_*` never returns) carries
/// [`INVALID_NODE`] and is always considered valid-with-index-zero.
pub struct DependencyValidation {
    registry: Arc<DepValRegistry>,
    node_id: DepValNodeId,
}

impl DependencyValidation {
    pub(crate) fn new(registry: Arc<DepValRegistry>, node_id: DepValNodeId) -> Self {
        if node_id != INVALID_NODE {
            registry.add_ref(node_id);
        }
        Self { registry, node_id }
    }

    /// Whether this handle refers to a real node.
    pub fn is_valid(&self) -> bool {
        self.node_id != INVALID_NODE
    }

    pub(crate) fn node_id(&self) -> DepValNodeId {
        self.node_id
    }

    /// Current validation index; 0 means the node (and everything it
    /// transitively depends on) is still considered fresh.
    pub fn validation_index(&self) -> u32 {
        if !self.is_valid() {
            return 0;
        }
        self.registry.validation_index(self.node_id)
    }

    /// Register `dependency` as an input of `self`.
    pub fn register_dependency(&self, dependency: &DependencyValidation) {
        if self.is_valid() && dependency.is_valid() {
            self.registry
                .register_asset_dependency(self.node_id, dependency.node_id);
        }
    }

    /// Increase this node's validation index, propagating to dependents.
    pub fn increase_validation_index(&self) {
        if self.is_valid() {
            self.registry.increase_validation_index(self.node_id);
        }
    }

    /// A defensive copy that re-checks the handle still points at a live
    /// registry. Since the registry is kept alive via `Arc` for as long as
    /// any handle exists, this is always safe; kept as the recommended call
    /// site when copying a handle across a task boundary.
    pub fn safe_copy(&self) -> Self {
        self.clone()
    }
}

impl Clone for DependencyValidation {
    fn clone(&self) -> Self {
        if self.is_valid() {
            self.registry.add_ref(self.node_id);
        }
        Self {
            registry: Arc::clone(&self.registry),
            node_id: self.node_id,
        }
    }
}

impl Drop for DependencyValidation {
    fn drop(&mut self) {
        if self.is_valid() {
            self.registry.release(self.node_id);
        }
    }
}

impl std::fmt::Debug for DependencyValidation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DependencyValidation")
            .field("node_id", &self.node_id)
            .field("validation_index", &self.validation_index())
            .finish()
    }
}

impl PartialEq for DependencyValidation {
    fn eq(&self, other: &Self) -> bool {
        self.node_id == other.node_id
    }
}

impl Eq for DependencyValidation {}
