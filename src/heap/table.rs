//! Per-type storage: `Table<T>`
//!
//! Each asset type gets one `Table`, keyed by [`IdentifierCode`] in sorted
//! order. A row holds a generation of [`Marker`]; overwriting a row during a
//! pending build swaps in a brand new marker generation rather than mutating
//! the old one in place, so a slow completion destined for a superseded
//! generation simply updates a marker nobody reads from anymore and a stale
//! build can never clobber a fresher one, with no separate reconciliation
//! pass needed. See DESIGN.md for how this departs from a shared
//! completed-list/validation-index comparison scheme while preserving the
//! same externally observable behavior.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::watch;

use crate::depval::DependencyValidation;
use crate::error::{AssetError, AssetResult};
use crate::ids::IdentifierCode;
use crate::marker::{Marker, MarkerState};

/// A single stored row: the marker generation currently visible at this id.
struct Row<T> {
    marker: Arc<Marker<T>>,
}

/// Per-type asset table.
///
/// Cloning is cheap (`Arc` internally); a read-heavy `parking_lot::RwLock`
/// guards the row map since lookups vastly outnumber inserts/erasures.
pub struct Table<T> {
    rows: RwLock<BTreeMap<IdentifierCode, Row<T>>>,
    stalling: AtomicUsize,
    shutting_down: AtomicBool,
    shutdown_signal: tokio::sync::Notify,
}

impl<T> Default for Table<T> {
    fn default() -> Self {
        Self {
            rows: RwLock::new(BTreeMap::new()),
            stalling: AtomicUsize::new(0),
            shutting_down: AtomicBool::new(false),
            shutdown_signal: tokio::sync::Notify::new(),
        }
    }
}

impl<T: Send + Sync + 'static> Table<T> {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a pending row, returning the marker and the sender the
    /// constructor task must use to resolve it. If a row already exists at
    /// `id`, it is replaced by a new generation (its validation index is one
    /// higher); the previous generation's sender, if ever fired, now writes
    /// into an orphaned marker no lookup can reach.
    pub fn insert_pending(
        &self,
        id: IdentifierCode,
        initializer: String,
        dep_val: DependencyValidation,
    ) -> (Arc<Marker<T>>, watch::Sender<MarkerState<T>>) {
        let mut rows = self.rows.write();
        let next_generation = rows
            .get(&id)
            .map(|row| row.marker.validation_index() + 1)
            .unwrap_or(1);

        let (tx, rx) = watch::channel(MarkerState::Pending);
        let marker = Arc::new(Marker::new(initializer, dep_val, next_generation, rx));
        rows.insert(id, Row { marker: marker.clone() });
        (marker, tx)
    }

    /// Insert a row that is Ready immediately; no constructor task involved.
    /// Does not itself promote the row to foreground-visible — `Table` has no
    /// barrier id of its own to stamp it with; `AssetHeap::insert_ready`
    /// does that immediately after calling this, using the heap's current
    /// barrier.
    pub fn insert_ready(
        &self,
        id: IdentifierCode,
        initializer: String,
        dep_val: DependencyValidation,
        value: T,
    ) -> Arc<Marker<T>> {
        let mut rows = self.rows.write();
        let next_generation = rows
            .get(&id)
            .map(|row| row.marker.validation_index() + 1)
            .unwrap_or(1);

        let (tx, rx) = watch::channel(MarkerState::Ready(Arc::new(value)));
        let marker = Arc::new(Marker::new(initializer, dep_val, next_generation, rx));
        // Nothing will ever send on `tx` again; keep it alive exactly as
        // long as the marker that captured this generation so the
        // watch channel doesn't report "sender dropped" to a reader that
        // merely wants the already-Ready value. `check_background`/
        // `check_foreground` never depend on the sender living longer,
        // since the channel's current value already holds the ready state.
        std::mem::forget(tx);
        rows.insert(id, Row { marker: marker.clone() });
        marker
    }

    /// Look up the current generation at `id`, if any.
    pub fn lookup(&self, id: IdentifierCode) -> Option<Arc<Marker<T>>> {
        self.rows.read().get(&id).map(|row| row.marker.clone())
    }

    /// Remove the row at `id`, if present. An in-flight pending future tied
    /// to that generation is not cancelled; its eventual completion simply
    /// has nothing left to write into.
    pub fn erase(&self, id: IdentifierCode) -> bool {
        self.rows.write().remove(&id).is_some()
    }

    /// Snapshot every (id, marker) pair currently stored, in sorted order.
    /// Takes a read lock for the duration of the copy, not the iteration.
    pub fn snapshot(&self) -> Vec<(IdentifierCode, Arc<Marker<T>>)> {
        self.rows
            .read()
            .iter()
            .map(|(id, row)| (*id, row.marker.clone()))
            .collect()
    }

    /// Promote every row's background state into its foreground slot,
    /// stamping each with `barrier_id`. Called by the heap at each
    /// `visibility_barrier()`.
    pub fn promote_all_to_foreground(&self, barrier_id: u64) {
        for (_, row) in self.rows.read().iter() {
            row.marker.promote_to_foreground(barrier_id);
        }
    }

    /// Block the calling task until the row at `id` leaves Pending, without
    /// waiting for the next visibility barrier. Releases no locks held by
    /// the caller (callers must not hold the table's lock across this
    /// call). Returns a shutdown error if the table is torn down while
    /// waiting.
    pub async fn stall_while_pending(&self, id: IdentifierCode) -> AssetResult<MarkerState<T>> {
        let marker = self
            .lookup(id)
            .ok_or_else(|| AssetError::Retrieval(format!("no such id: {id}")))?;

        self.stalling.fetch_add(1, Ordering::SeqCst);
        let result = self.stall_inner(&marker).await;
        if self.stalling.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.shutdown_signal.notify_waiters();
        }
        result
    }

    async fn stall_inner(&self, marker: &Arc<Marker<T>>) -> AssetResult<MarkerState<T>> {
        let mut background = marker.background_receiver();
        loop {
            if self.shutting_down.load(Ordering::SeqCst) {
                return Err(AssetError::ShutDown);
            }
            match &*background.borrow() {
                MarkerState::Pending => {}
                other => return Ok(other.clone()),
            }
            if background.changed().await.is_err() {
                // Sender dropped without ever resolving; treat as shutdown.
                return Err(AssetError::ShutDown);
            }
        }
    }

    /// Mark the table as shutting down and wait for every in-flight
    /// `stall_while_pending` caller to observe it and return. A destructor
    /// would give the same teardown ordering synchronously, but Rust's
    /// `Drop` cannot await, so callers that need it must call this
    /// explicitly before dropping the table (see DESIGN.md).
    pub async fn shutdown(&self) {
        self.shutting_down.store(true, Ordering::SeqCst);
        while self.stalling.load(Ordering::SeqCst) > 0 {
            self.shutdown_signal.notified().await;
        }
    }
}
