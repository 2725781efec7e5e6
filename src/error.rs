//! Crate-wide error taxonomy
//!
//! Every subsystem defines its own `XyzError`/`XyzResult` pair (see
//! `heap::HeapError`, `depval::DepValError`, `compound::CompoundError`); this
//! module unifies them into a single [`AssetError`] so that callers crossing
//! subsystem boundaries (e.g. the compound resolver calling into the heap and
//! the dispatch layer) can propagate a single error type with `?`.

use thiserror::Error;

use crate::depval::DependencyValidation;

/// The reason a construction attempt failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConstructionReason {
    /// The deserializer does not recognize the document's shape at all.
    FormatNotUnderstood,
    /// The document claims a version newer/older than this build supports.
    UnsupportedVersion,
    /// A referenced input file could not be found.
    MissingFile(String),
    /// Any other structured construction failure.
    Other(String),
}

impl std::fmt::Display for ConstructionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConstructionReason::FormatNotUnderstood => write!(f, "format not understood"),
            ConstructionReason::UnsupportedVersion => write!(f, "unsupported version"),
            ConstructionReason::MissingFile(path) => write!(f, "missing file: {path}"),
            ConstructionReason::Other(msg) => write!(f, "{msg}"),
        }
    }
}

/// Unified error type for cross-module propagation.
///
/// Construction failures are always *captured* into a marker rather than
/// unwound across an await point; this type exists for the boundary APIs
/// (dispatch, compound resolution, heap lookups) that need a single `Result`
/// alias to bubble failures from one subsystem into another.
#[derive(Debug, Error)]
pub enum AssetError {
    /// A deserializer failed to build the requested asset.
    #[error("construction failed ({reason}): {initializer}")]
    Construction {
        /// Human-readable key of the asset under construction.
        initializer: String,
        /// Structured failure reason.
        reason: ConstructionReason,
        /// Dependency validation to attach to the failed marker, if any.
        dep_val: Option<DependencyValidation>,
    },

    /// A marker has already settled into a terminal invalid state.
    #[error("asset is invalid: {0}")]
    InvalidAsset(String),

    /// Caller asserted readiness on a marker that is still pending.
    #[error("asset still pending: {0}")]
    StillPending(String),

    /// A lookup failed at the heap level (unknown type or id).
    #[error("retrieval failed: {0}")]
    Retrieval(String),

    /// The text formatter could not parse its input.
    #[error("format error at {location}: {message}")]
    Format {
        /// `line:column` within the source document.
        location: String,
        /// Parser diagnostic.
        message: String,
    },

    /// A generic failure carrying a dependency validation for retry-on-fix.
    #[error("{message}")]
    WithDepVal {
        /// Diagnostic message.
        message: String,
        /// Dependency validation attached so fixing the file retriggers a build.
        dep_val: DependencyValidation,
    },

    /// The owning `Table`/executor was torn down while a caller was waiting.
    #[error("shut down while waiting")]
    ShutDown,
}

/// Result alias for crate-wide boundary APIs.
pub type AssetResult<T> = Result<T, AssetError>;

impl AssetError {
    /// The dependency validation attached to this error, if any.
    pub fn dep_val(&self) -> Option<&DependencyValidation> {
        match self {
            AssetError::Construction { dep_val, .. } => dep_val.as_ref(),
            AssetError::WithDepVal { dep_val, .. } => Some(dep_val),
            _ => None,
        }
    }
}
