//! Aggregate progress tracking across in-flight asset operations
//!
//! Editor-style UIs built on top of this crate want a single "N assets
//! loading" number rather than polling every individual marker. An
//! [`OperationContext`] is a lightweight counter a heap can optionally
//! report into: each begun operation bumps an in-flight count and records a
//! label, each finished one decrements it, and a snapshot exposes both the
//! count and the (possibly truncated) set of in-flight labels for display.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

/// One outstanding operation's metadata.
#[derive(Debug, Clone)]
pub struct OperationHandleInfo {
    /// Human-readable label (typically the asset's initializer string).
    pub label: String,
    /// Monotonically increasing id, stable across the operation's lifetime.
    pub id: u64,
}

/// A point-in-time view of everything tracked by an [`OperationContext`].
#[derive(Debug, Clone)]
pub struct OperationSnapshot {
    /// Number of operations currently in flight.
    pub in_flight: usize,
    /// Labels of in-flight operations, in no particular order.
    pub labels: Vec<String>,
}

/// Tracks in-flight asset operations for UI-facing progress reporting.
///
/// Cheap to clone-share: wrap in an `Arc` and hand out to every subsystem
/// that wants to report progress (typically the heap's `insert` path).
#[derive(Default)]
pub struct OperationContext {
    next_id: AtomicU64,
    in_flight: Mutex<HashMap<u64, OperationHandleInfo>>,
}

/// RAII handle for one in-flight operation: dropping it ends the operation.
pub struct OperationHandle<'a> {
    context: &'a OperationContext,
    id: u64,
}

impl<'a> Drop for OperationHandle<'a> {
    fn drop(&mut self) {
        self.context.in_flight.lock().remove(&self.id);
    }
}

/// Like [`OperationHandle`], but holds its own `Arc` rather than borrowing —
/// needed wherever the operation outlives the call that began it, e.g. a
/// spawned construction task.
pub struct OperationHandleOwned {
    context: Arc<OperationContext>,
    id: u64,
}

impl Drop for OperationHandleOwned {
    fn drop(&mut self) {
        self.context.in_flight.lock().remove(&self.id);
    }
}

impl OperationContext {
    /// Build an empty context with no operations in flight.
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin tracking one operation labeled `label`. The returned handle
    /// ends the operation when dropped.
    pub fn begin(&self, label: impl Into<String>) -> OperationHandle<'_> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        self.in_flight.lock().insert(
            id,
            OperationHandleInfo {
                label: label.into(),
                id,
            },
        );
        OperationHandle { context: self, id }
    }

    /// Same as [`Self::begin`], but for a context already shared behind an
    /// `Arc` and a handle that needs to move into a spawned task.
    pub fn begin_owned(self: &Arc<Self>, label: impl Into<String>) -> OperationHandleOwned {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        self.in_flight.lock().insert(
            id,
            OperationHandleInfo {
                label: label.into(),
                id,
            },
        );
        OperationHandleOwned {
            context: Arc::clone(self),
            id,
        }
    }

    /// How many operations are currently in flight.
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.lock().len()
    }

    /// A snapshot of the current in-flight set, suitable for a UI progress
    /// readout.
    pub fn snapshot(&self) -> OperationSnapshot {
        let guard = self.in_flight.lock();
        OperationSnapshot {
            in_flight: guard.len(),
            labels: guard.values().map(|info| info.label.clone()).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn begin_and_drop_tracks_in_flight_count() {
        let context = OperationContext::new();
        assert_eq!(context.in_flight_count(), 0);

        let handle = context.begin("loading mesh.obj");
        assert_eq!(context.in_flight_count(), 1);
        assert_eq!(context.snapshot().labels, vec!["loading mesh.obj".to_string()]);

        drop(handle);
        assert_eq!(context.in_flight_count(), 0);
    }

    #[test]
    fn owned_handle_tracks_in_flight_count_across_a_move() {
        let context = Arc::new(OperationContext::new());
        let handle = context.begin_owned("loading deferred.asset");
        assert_eq!(context.in_flight_count(), 1);

        let moved = std::thread::spawn(move || {
            let _handle = handle;
        });
        moved.join().unwrap();
        assert_eq!(context.in_flight_count(), 0);
    }

    #[test]
    fn multiple_operations_track_independently() {
        let context = OperationContext::new();
        let a = context.begin("a");
        let b = context.begin("b");
        assert_eq!(context.in_flight_count(), 2);
        drop(a);
        assert_eq!(context.in_flight_count(), 1);
        drop(b);
        assert_eq!(context.in_flight_count(), 0);
    }
}
