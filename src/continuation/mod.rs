//! Multi-future continuation engine
//!
//! Combines several in-flight [`crate::marker::Marker`]s into one awaitable
//! unit and lets callers attach a continuation that runs once every input
//! has settled. All continuation work runs through a shared
//! [`ContinuationExecutor`], which applies a long safety-net timeout to
//! every wait and can be shut down to fail every outstanding continuation at
//! once.
//!
//! `PollToPromise` (in `poll`) serves producers that advance by repeated
//! polling rather than a single await point.

mod executor;
mod poll;
mod when_all;

pub use executor::{ContinuationExecutor, SAFETY_NET_TIMEOUT};
pub use poll::{poll_to_promise, PollOutcome};
pub use when_all::{
    when_all2, when_all3, CombinedFuture, CombinedFuture3, Settled, WhenAll2, WhenAll3,
};

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crate::depval::DepValRegistry;
    use crate::error::ConstructionReason;
    use crate::ids::{AssetTypeId, IdentifierCode};
    use crate::heap::AssetHeap;
    use crate::marker::MarkerFailure;

    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Leaf(u32);

    impl AssetTypeId for Leaf {
        const TYPE_NAME: &'static str = "test::continuation::Leaf";
    }

    #[tokio::test]
    async fn when_all_with_one_failure_does_not_call_continuation() {
        let heap = AssetHeap::new();
        let registry = DepValRegistry::new();
        let executor = ContinuationExecutor::new();

        let a = heap.insert_ready::<Leaf>(IdentifierCode(1), "a", registry.invalid_handle(), Leaf(1));
        let b = heap.insert::<Leaf, _>(IdentifierCode(2), "b", registry.invalid_handle(), async {
            Err::<Leaf, _>(MarkerFailure {
                reason: ConstructionReason::Other("boom".to_string()),
                actualization_log: "boom".to_string(),
                dep_val: DepValRegistry::new().invalid_handle(),
            })
        });

        // Let the failing watcher task run.
        tokio::time::sleep(Duration::from_millis(5)).await;

        let combined = when_all2(executor, a, b).then(|_, _| 42).await;
        assert!(combined.is_err());
    }

    #[tokio::test]
    async fn when_all_both_ready_runs_continuation() {
        let heap = AssetHeap::new();
        let registry = DepValRegistry::new();
        let executor = ContinuationExecutor::new();

        let a = heap.insert_ready::<Leaf>(IdentifierCode(10), "a", registry.invalid_handle(), Leaf(3));
        let b = heap.insert_ready::<Leaf>(IdentifierCode(11), "b", registry.invalid_handle(), Leaf(4));

        let sum = when_all2(executor, a, b)
            .then(|a, b| a.0 + b.0)
            .await
            .unwrap();
        assert_eq!(sum, 7);
    }

    #[tokio::test]
    async fn shutdown_fails_outstanding_runs() {
        let executor = ContinuationExecutor::new();
        executor.shutdown();
        let result = executor.run(async { 1 }).await;
        assert!(matches!(result, Err(crate::error::AssetError::ShutDown)));
    }

    #[tokio::test]
    async fn when_all3_with_one_failure_does_not_call_continuation() {
        let heap = AssetHeap::new();
        let registry = DepValRegistry::new();
        let executor = ContinuationExecutor::new();

        let a = heap.insert_ready::<Leaf>(IdentifierCode(20), "a", registry.invalid_handle(), Leaf(1));
        let b = heap.insert::<Leaf, _>(IdentifierCode(21), "b", registry.invalid_handle(), async {
            Err::<Leaf, _>(MarkerFailure {
                reason: ConstructionReason::Other("boom".to_string()),
                actualization_log: "boom".to_string(),
                dep_val: DepValRegistry::new().invalid_handle(),
            })
        });
        let c = heap.insert_ready::<Leaf>(IdentifierCode(22), "c", registry.invalid_handle(), Leaf(3));

        tokio::time::sleep(Duration::from_millis(5)).await;

        let combined = when_all3(executor, a, b, c).then(|_, _, _| 42).await;
        assert!(combined.is_err());
    }

    #[tokio::test]
    async fn when_all3_all_ready_runs_continuation() {
        let heap = AssetHeap::new();
        let registry = DepValRegistry::new();
        let executor = ContinuationExecutor::new();

        let a = heap.insert_ready::<Leaf>(IdentifierCode(30), "a", registry.invalid_handle(), Leaf(1));
        let b = heap.insert_ready::<Leaf>(IdentifierCode(31), "b", registry.invalid_handle(), Leaf(2));
        let c = heap.insert_ready::<Leaf>(IdentifierCode(32), "c", registry.invalid_handle(), Leaf(3));

        let sum = when_all3(executor, a, b, c)
            .then(|a, b, c| a.0 + b.0 + c.0)
            .await
            .unwrap();
        assert_eq!(sum, 6);
    }
}
