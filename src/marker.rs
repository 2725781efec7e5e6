//! The deferred asset handle: `Marker<T>`
//!
//! A marker is the unit the heap stores one of per (type, id). It owns a
//! tri-state cache (`Pending` / `Ready` / `Invalid`), the asset's human
//! readable initializer string, its dependency validation, and — while
//! pending — the shared future a constructor task will eventually resolve.

use std::fmt;
use std::sync::Arc;

use tokio::sync::watch;

use crate::depval::DependencyValidation;
use crate::error::{AssetError, ConstructionReason};

/// The three states a marker can occupy.
pub enum MarkerState<T> {
    /// Still under construction.
    Pending,
    /// Successfully constructed.
    Ready(Arc<T>),
    /// Construction failed terminally.
    Invalid(Arc<MarkerFailure>),
}

// Manual `Clone` (rather than `#[derive(Clone)]`) so that cloning a state
// never requires `T: Clone` — every variant only ever clones an `Arc`.
impl<T> Clone for MarkerState<T> {
    fn clone(&self) -> Self {
        match self {
            MarkerState::Pending => MarkerState::Pending,
            MarkerState::Ready(value) => MarkerState::Ready(value.clone()),
            MarkerState::Invalid(failure) => MarkerState::Invalid(failure.clone()),
        }
    }
}

impl<T> fmt::Debug for MarkerState<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarkerState::Pending => write!(f, "Pending"),
            MarkerState::Ready(_) => write!(f, "Ready"),
            MarkerState::Invalid(failure) => write!(f, "Invalid({})", failure.reason),
        }
    }
}

/// The captured context of a failed construction.
#[derive(Debug)]
pub struct MarkerFailure {
    /// Why construction failed.
    pub reason: ConstructionReason,
    /// Diagnostic text produced during the failed attempt.
    pub actualization_log: String,
    /// Dependency validation attached so fixing the underlying file
    /// re-triggers a build.
    pub dep_val: DependencyValidation,
}

impl MarkerFailure {
    /// Convert this failure into a crate-wide error for propagation.
    pub fn into_error(self: Arc<Self>, initializer: &str) -> AssetError {
        AssetError::Construction {
            initializer: initializer.to_string(),
            reason: self.reason.clone(),
            dep_val: Some(self.dep_val.clone()),
        }
    }
}

/// A deferred, typed asset handle.
///
/// `Marker<T>` is cheap to clone (an `Arc` internally) and safe to hold
/// across await points. Background observers see completion the moment the
/// constructor task finishes; foreground observers only see it once the
/// owning heap advances its visibility barrier (`crate::heap::AssetHeap::visibility_barrier`).
pub struct Marker<T> {
    initializer: String,
    dep_val: DependencyValidation,
    validation_index: u32,
    background: watch::Receiver<MarkerState<T>>,
    foreground: parking_lot::RwLock<MarkerState<T>>,
    barrier_id: std::sync::atomic::AtomicU64,
}

impl<T> Marker<T> {
    pub(crate) fn new(
        initializer: String,
        dep_val: DependencyValidation,
        validation_index: u32,
        background: watch::Receiver<MarkerState<T>>,
    ) -> Self {
        Self {
            initializer,
            dep_val,
            validation_index,
            background,
            foreground: parking_lot::RwLock::new(MarkerState::Pending),
            barrier_id: std::sync::atomic::AtomicU64::new(u64::MAX),
        }
    }

    /// The human-readable key this marker was constructed from.
    pub fn initializer(&self) -> &str {
        &self.initializer
    }

    /// This marker's dependency validation.
    pub fn dep_val(&self) -> &DependencyValidation {
        &self.dep_val
    }

    /// The validation-index generation this marker was inserted under.
    /// Completions tagged with an older generation are dropped by the heap.
    pub fn validation_index(&self) -> u32 {
        self.validation_index
    }

    /// An independent cursor onto the background watch channel, used by
    /// `Table::stall_while_pending` to await the next state transition.
    pub(crate) fn background_receiver(&self) -> watch::Receiver<MarkerState<T>> {
        self.background.clone()
    }

    /// Non-blocking read of the freshest known state, independent of any
    /// visibility barrier.
    pub fn check_background(&self) -> MarkerState<T> {
        self.background.borrow().clone()
    }

    /// The state as of the last visibility barrier this marker was promoted
    /// at.
    pub fn check_foreground(&self) -> MarkerState<T> {
        self.foreground.read().clone()
    }

    /// Promote the current background state into the foreground slot,
    /// stamping it with `barrier_id`. Called by the heap during
    /// `visibility_barrier()`; a no-op if the background state hasn't
    /// changed since the last promotion.
    pub(crate) fn promote_to_foreground(&self, barrier_id: u64) {
        let state = self.background.borrow().clone();
        *self.foreground.write() = state;
        self.barrier_id
            .store(barrier_id, std::sync::atomic::Ordering::SeqCst);
    }

    /// The barrier id at which this marker last became foreground-visible,
    /// or `u64::MAX` if it never has.
    pub fn barrier_id(&self) -> u64 {
        self.barrier_id.load(std::sync::atomic::Ordering::SeqCst)
    }

    /// Read the foreground Ready value, or an error describing why it isn't
    /// available. Frame-stable: reflects the state captured at the last
    /// visibility barrier (or at insertion time, for an entry inserted
    /// already-Ready), not whatever has completed in the background since.
    /// Use [`Self::check_background`] directly to observe completions ahead
    /// of the next barrier.
    pub fn actualize(&self) -> Result<Arc<T>, AssetError> {
        match self.check_foreground() {
            MarkerState::Ready(value) => Ok(value),
            MarkerState::Pending => Err(AssetError::StillPending(self.initializer.clone())),
            MarkerState::Invalid(failure) => Err(failure.into_error(&self.initializer)),
        }
    }
}
