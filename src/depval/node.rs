//! Dependency-validation node representation

use chrono::{DateTime, Utc};

/// Opaque id into the dependency-validation registry's node arena.
pub type DepValNodeId = u64;

/// Sentinel meaning "no dependency validation attached".
pub const INVALID_NODE: DepValNodeId = u64::MAX;

/// Whether a tracked file is in its normal on-disk state, has been shadowed
/// by hot-reload tooling, or is missing entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileSnapshotState {
    /// The file's on-disk content matches what was registered.
    Normal,
    /// A hot-reload tool is overriding this path's apparent content without
    /// touching disk; treated as changed for invalidation purposes.
    Shadowed,
    /// The file could not be found at registration or re-check time.
    Missing,
}

use serde::{Deserialize, Serialize};

/// A point-in-time snapshot of a tracked file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSnapshot {
    /// Normalized path.
    pub path: String,
    /// Observed state.
    pub state: FileSnapshotState,
    /// Opaque monotonic marker (e.g. mtime-derived) used for equality checks
    /// without re-reading file content.
    pub marker: u64,
}

impl FileSnapshot {
    /// Build a snapshot in the normal state.
    pub fn normal(path: impl Into<String>, marker: u64) -> Self {
        Self {
            path: path.into(),
            state: FileSnapshotState::Normal,
            marker,
        }
    }
}

/// A report of how a tracked file's state diverged from what was registered.
#[derive(Debug, Clone)]
pub struct DependencyUpdateReport {
    /// The file in question.
    pub path: String,
    /// What was registered when the dependency was created.
    pub registered: FileSnapshot,
    /// What the file's state is now.
    pub current: FileSnapshot,
}

/// One node in the dependency-validation graph.
#[derive(Debug)]
pub(crate) struct DepValNode {
    pub(crate) refcount: u32,
    pub(crate) validation_index: u32,
    pub(crate) kind: DepValNodeKind,
    /// Nodes that depend on this one; invalidation walks these edges.
    pub(crate) dependents: Vec<DepValNodeId>,
    /// Nodes this one depends on (children of a composite, or none for a leaf).
    pub(crate) children: Vec<DepValNodeId>,
    pub(crate) created_at: DateTime<Utc>,
}

#[derive(Debug)]
pub(crate) enum DepValNodeKind {
    /// A leaf tracking exactly one file.
    File(FileSnapshot),
    /// A node created with no file attached yet (`Make()` with no args),
    /// used as a placeholder dep-val that can later receive file
    /// dependencies via `register_file_dependency`.
    Empty,
    /// A composite whose validity is purely a function of its children.
    Composite,
}

impl DepValNode {
    // refcount starts at 0: `DepValRegistry::handle_for` always calls
    // `DependencyValidation::new`, which adds the first ref. A node is never
    // observed at refcount 0 by a live handle.
    pub(crate) fn new_leaf(snapshot: FileSnapshot) -> Self {
        Self {
            refcount: 0,
            validation_index: 0,
            kind: DepValNodeKind::File(snapshot),
            dependents: Vec::new(),
            children: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub(crate) fn new_empty() -> Self {
        Self {
            refcount: 0,
            validation_index: 0,
            kind: DepValNodeKind::Empty,
            dependents: Vec::new(),
            children: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub(crate) fn new_composite(children: Vec<DepValNodeId>) -> Self {
        Self {
            refcount: 0,
            validation_index: 0,
            kind: DepValNodeKind::Composite,
            dependents: Vec::new(),
            children,
            created_at: Utc::now(),
        }
    }
}
