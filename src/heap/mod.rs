//! The asset heap: typed, sharded, concurrent asset storage
//!
//! [`AssetHeap`] owns one [`Table`] per registered asset type, addressed by
//! a [`TypeCode`](crate::ids::TypeCode) rather than by hashing a language
//! runtime type at lookup time (see `ids.rs`). Each table is independently
//! lockable; the heap itself only coordinates which table a type maps to
//! and the global visibility-barrier counter that separates "background"
//! (just-completed) state from "foreground" (frame-stable) state.

mod table;
mod watcher;

use std::any::Any;
use std::sync::Arc;

use dashmap::DashMap;
use futures::future::BoxFuture;
use thiserror::Error;

use crate::depval::DependencyValidation;
use crate::error::AssetResult;
use crate::ids::{AssetTypeId, IdentifierCode, MonotonicCounter, TypeCode};
use crate::marker::{Marker, MarkerFailure, MarkerState};
use crate::operation_context::OperationContext;

pub use table::Table;

/// Errors specific to heap-level operations (type registration, lookups).
#[derive(Debug, Error)]
pub enum HeapError {
    /// A lookup was made against a type with no table yet.
    #[error("no table registered for type {0:?}")]
    NoTableForType(TypeCode),
}

/// Result alias for heap-level operations.
pub type HeapResult<T> = Result<T, HeapError>;

/// Tuning knobs for an [`AssetHeap`].
#[derive(Debug, Clone)]
pub struct HeapConfig {
    /// Hint for how many distinct asset types this heap will end up storing;
    /// used only to pre-size the type registry.
    pub expected_type_count: usize,
}

impl Default for HeapConfig {
    fn default() -> Self {
        Self {
            expected_type_count: 64,
        }
    }
}

/// Typed, concurrent, sharded asset store with deferred construction and a
/// visibility-barrier split between background and foreground state.
///
/// One heap is typically shared process-wide behind an `Arc`; every
/// subsystem (the compound resolver, the auto-construct dispatcher) holds a
/// reference to it rather than owning its own.
pub struct AssetHeap {
    tables: DashMap<TypeCode, TableEntry>,
    barrier: MonotonicCounter,
    config: HeapConfig,
    operation_context: Option<Arc<OperationContext>>,
}

/// A type-erased handle onto one `Table<T>`.
///
/// `Any` access lets [`AssetHeap::table_for`] downcast back to the concrete
/// `Table<T>`; the two closures let barrier promotion and shutdown run over
/// every table without knowing `T` (an object-safe trait would otherwise
/// need unstable trait-upcasting to get back from `dyn Any` to a table
/// supertrait, so this crate stores the erased operations directly instead).
#[derive(Clone)]
struct TableEntry {
    any: Arc<dyn Any + Send + Sync>,
    promote: Arc<dyn Fn(u64) + Send + Sync>,
    shutdown: Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>,
}

impl AssetHeap {
    /// Build a heap with the given configuration.
    pub fn with_config(config: HeapConfig) -> Arc<Self> {
        Arc::new(Self {
            tables: DashMap::with_capacity(config.expected_type_count),
            barrier: MonotonicCounter::new(),
            config,
            operation_context: None,
        })
    }

    /// Build a heap with default configuration.
    pub fn new() -> Arc<Self> {
        Self::with_config(HeapConfig::default())
    }

    /// Build a heap that reports every `insert` into `context`, so a UI can
    /// read `context.snapshot()` for an aggregate "N assets loading" readout.
    /// `insert_ready` entries are never in-flight and are not reported.
    pub fn with_operation_context(config: HeapConfig, context: Arc<OperationContext>) -> Arc<Self> {
        Arc::new(Self {
            tables: DashMap::with_capacity(config.expected_type_count),
            barrier: MonotonicCounter::new(),
            config,
            operation_context: Some(context),
        })
    }

    fn table_for<T: AssetTypeId + Send + Sync + 'static>(&self) -> Arc<Table<T>> {
        let code = T::type_code();
        let entry = self.tables.entry(code).or_insert_with(|| {
            let table = Arc::new(Table::<T>::new());
            let promote = {
                let table = table.clone();
                Arc::new(move |barrier_id: u64| table.promote_all_to_foreground(barrier_id))
                    as Arc<dyn Fn(u64) + Send + Sync>
            };
            let shutdown = {
                let table = table.clone();
                Arc::new(move || {
                    let table = table.clone();
                    Box::pin(async move { table.shutdown().await }) as BoxFuture<'static, ()>
                }) as Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>
            };
            TableEntry {
                any: table as Arc<dyn Any + Send + Sync>,
                promote,
                shutdown,
            }
        });
        entry.any.clone().downcast::<Table<T>>().unwrap_or_else(|_| {
            panic!("type code collision: two distinct types hashed to the same TypeCode")
        })
    }

    /// Insert a pending entry and spawn a watcher task that resolves it once
    /// `fut` completes. Returns the marker immediately; its state starts
    /// Pending.
    ///
    /// When this heap was built with [`Self::with_operation_context`], the
    /// operation is tracked as in-flight from this call until `fut` settles
    /// (success, failure, or panic) — not until the next visibility barrier.
    pub fn insert<T, F>(
        &self,
        id: IdentifierCode,
        initializer: impl Into<String>,
        dep_val: DependencyValidation,
        fut: F,
    ) -> Arc<Marker<T>>
    where
        T: AssetTypeId + Send + Sync + 'static,
        F: std::future::Future<Output = Result<T, MarkerFailure>> + Send + 'static,
    {
        let initializer = initializer.into();
        let table = self.table_for::<T>();
        let (marker, tx) = table.insert_pending(id, initializer.clone(), dep_val.clone());

        match &self.operation_context {
            Some(context) => {
                let handle = context.begin_owned(initializer.clone());
                let fut = async move {
                    let outcome = fut.await;
                    drop(handle);
                    outcome
                };
                watcher::spawn_completion_watcher(initializer, fut, dep_val, tx);
            }
            None => watcher::spawn_completion_watcher(initializer, fut, dep_val, tx),
        }
        marker
    }

    /// The heap's [`OperationContext`], if one was supplied via
    /// [`Self::with_operation_context`].
    pub fn operation_context(&self) -> Option<&Arc<OperationContext>> {
        self.operation_context.as_ref()
    }

    /// Insert an entry that is Ready immediately; no constructor task. Unlike
    /// `insert`, this is stamped foreground-visible right away rather than
    /// waiting for the next `visibility_barrier()` — there is no pending
    /// build whose background/foreground split would matter.
    pub fn insert_ready<T>(
        &self,
        id: IdentifierCode,
        initializer: impl Into<String>,
        dep_val: DependencyValidation,
        value: T,
    ) -> Arc<Marker<T>>
    where
        T: AssetTypeId + Send + Sync + 'static,
    {
        let table = self.table_for::<T>();
        let marker = table.insert_ready(id, initializer.into(), dep_val, value);
        marker.promote_to_foreground(self.barrier.current());
        marker
    }

    /// Look up the current marker generation for `id`, if any.
    pub fn lookup<T>(&self, id: IdentifierCode) -> Option<Arc<Marker<T>>>
    where
        T: AssetTypeId + Send + Sync + 'static,
    {
        self.table_for::<T>().lookup(id)
    }

    /// Remove the entry at `id` for type `T`, if present.
    pub fn erase<T>(&self, id: IdentifierCode) -> bool
    where
        T: AssetTypeId + Send + Sync + 'static,
    {
        self.table_for::<T>().erase(id)
    }

    /// Block until the entry at `id` leaves Pending, reacquiring foreground
    /// visibility out of band rather than waiting for the next barrier.
    pub async fn stall_while_pending<T>(&self, id: IdentifierCode) -> AssetResult<MarkerState<T>>
    where
        T: AssetTypeId + Send + Sync + 'static,
    {
        self.table_for::<T>().stall_while_pending(id).await
    }

    /// Advance the global visibility barrier, promoting every table's
    /// background completions into their foreground slots. Returns the new
    /// barrier id.
    pub fn visibility_barrier(&self) -> u64 {
        let id = self.barrier.advance();
        for entry in self.tables.iter() {
            (entry.value().promote)(id);
        }
        id
    }

    /// Current barrier id without advancing it.
    pub fn current_barrier(&self) -> u64 {
        self.barrier.current()
    }

    /// Ask every registered table to begin shutting down, waiting for any
    /// in-flight `stall_while_pending` callers to notice and return.
    pub async fn shutdown(&self) {
        let shutdowns: Vec<_> = self
            .tables
            .iter()
            .map(|entry| (entry.value().shutdown)())
            .collect();
        for fut in shutdowns {
            fut.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Widget(u32);

    impl AssetTypeId for Widget {
        const TYPE_NAME: &'static str = "test::Widget";
    }

    #[tokio::test]
    async fn basic_cache_hit() {
        let heap = AssetHeap::new();
        let registry = crate::depval::DepValRegistry::new();
        let id = IdentifierCode(42);

        heap.insert_ready::<Widget>(id, "widget-42", registry.invalid_handle(), Widget(7));
        let marker = heap.lookup::<Widget>(id).expect("inserted entry");
        assert_eq!(*marker.actualize().unwrap(), Widget(7));
        assert_eq!(marker.validation_index(), 1);
    }

    #[tokio::test]
    async fn pending_then_ready_after_barrier() {
        let heap = AssetHeap::new();
        let registry = crate::depval::DepValRegistry::new();
        let id = IdentifierCode(7);

        let marker = heap.insert::<Widget, _>(id, "widget-7", registry.invalid_handle(), async {
            Ok(Widget(99))
        });
        assert!(matches!(marker.check_background(), MarkerState::Pending | MarkerState::Ready(_)));

        // Give the spawned watcher a chance to run.
        tokio::task::yield_now().await;
        for _ in 0..50 {
            if matches!(marker.check_background(), MarkerState::Ready(_)) {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(1)).await;
        }

        heap.visibility_barrier();
        let looked_up = heap.lookup::<Widget>(id).unwrap();
        assert_eq!(*looked_up.actualize().unwrap(), Widget(99));
    }

    #[tokio::test]
    async fn operation_context_tracks_pending_insert_until_it_settles() {
        let context = Arc::new(crate::operation_context::OperationContext::new());
        let heap = AssetHeap::with_operation_context(HeapConfig::default(), context.clone());
        let registry = crate::depval::DepValRegistry::new();
        let id = IdentifierCode(1);

        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let marker = heap.insert::<Widget, _>(id, "widget-pending", registry.invalid_handle(), async move {
            rx.await.ok();
            Ok(Widget(5))
        });

        assert_eq!(context.in_flight_count(), 1);
        assert_eq!(context.snapshot().labels, vec!["widget-pending".to_string()]);

        let _ = tx.send(());
        for _ in 0..50 {
            if matches!(marker.check_background(), MarkerState::Ready(_)) {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(1)).await;
        }
        // Give the watcher task a moment to drop the operation handle after
        // sending the result.
        tokio::task::yield_now().await;
        assert_eq!(context.in_flight_count(), 0);
    }

    #[tokio::test]
    async fn insert_ready_never_touches_the_operation_context() {
        let context = Arc::new(crate::operation_context::OperationContext::new());
        let heap = AssetHeap::with_operation_context(HeapConfig::default(), context.clone());
        let registry = crate::depval::DepValRegistry::new();

        heap.insert_ready::<Widget>(IdentifierCode(2), "widget-ready", registry.invalid_handle(), Widget(1));
        assert_eq!(context.in_flight_count(), 0);
    }

    #[tokio::test]
    async fn overwrite_while_pending_drops_stale_completion() {
        let heap = AssetHeap::new();
        let registry = crate::depval::DepValRegistry::new();
        let id = IdentifierCode(7);

        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let marker_a = heap.insert::<Widget, _>(id, "widget-7a", registry.invalid_handle(), async move {
            rx.await.ok();
            Ok(Widget(1))
        });

        heap.insert_ready::<Widget>(id, "widget-7b", registry.invalid_handle(), Widget(2));

        // Let the stale future resolve after the overwrite.
        let _ = tx.send(());
        tokio::task::yield_now().await;

        let current = heap.lookup::<Widget>(id).unwrap();
        assert_eq!(*current.actualize().unwrap(), Widget(2));
        assert_eq!(current.validation_index(), 2);
        assert!(!Arc::ptr_eq(&marker_a, &current));
    }
}
