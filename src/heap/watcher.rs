//! Completion watching for pending rows
//!
//! Each call to [`crate::heap::AssetHeap::insert`] spawns one watcher task
//! that awaits the constructor future and resolves the row's marker. A
//! `tokio::sync::watch` channel gives every reader live access to the
//! result the instant the task finishes, so there is no separate batched
//! reconciliation pass to run at barrier time. `visibility_barrier` still
//! performs the foreground-promotion sweep.

use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::watch;

use crate::depval::DependencyValidation;
use crate::error::ConstructionReason;
use crate::marker::{MarkerFailure, MarkerState};

/// Spawn a task that awaits `fut` and resolves `tx` with the outcome.
///
/// `fut` resolves to `Ok(value)` on success or `Err(failure)` on a captured
/// construction failure, which is always captured into the marker rather
/// than unwound across the task boundary. Panics inside `fut` are caught via
/// `futures::FutureExt::catch_unwind` and converted into an `Invalid`
/// completion so a user override that panics can never poison the promise;
/// `fallback_dep_val` is attached to that synthesized failure since a panic
/// never gets the chance to produce its own.
pub(crate) fn spawn_completion_watcher<T, F>(
    initializer: String,
    fut: F,
    fallback_dep_val: DependencyValidation,
    tx: watch::Sender<MarkerState<T>>,
) where
    T: Send + Sync + 'static,
    F: Future<Output = Result<T, MarkerFailure>> + Send + 'static,
{
    tokio::spawn(async move {
        let outcome = std::panic::AssertUnwindSafe(fut).catch_unwind().await;
        let state = match outcome {
            Ok(Ok(value)) => {
                log::debug!("asset '{initializer}' constructed successfully");
                MarkerState::Ready(Arc::new(value))
            }
            Ok(Err(failure)) => {
                log::warn!(
                    "asset '{initializer}' failed to construct: {}",
                    failure.reason
                );
                MarkerState::Invalid(Arc::new(failure))
            }
            Err(panic) => {
                let message = panic_message(&panic);
                log::error!("asset '{initializer}' constructor panicked: {message}");
                MarkerState::Invalid(Arc::new(MarkerFailure {
                    reason: ConstructionReason::Other(format!("constructor panicked: {message}")),
                    actualization_log: message,
                    dep_val: fallback_dep_val,
                }))
            }
        };
        // Ignore send errors: they mean every marker handle (and thus every
        // receiver) was dropped before construction finished, which is a
        // legitimate "nobody cares anymore" outcome.
        let _ = tx.send(state);
    });
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
