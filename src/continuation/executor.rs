//! The continuation executor
//!
//! Every combinator in this module ultimately runs its continuation body as
//! a task spawned through a [`ContinuationExecutor`], mirroring the
//! teacher's pattern of routing async coordination work through a shared
//! handle rather than calling `tokio::spawn` ad hoc (see
//! `enterprise::cache::lock::DistributedMutex`, which centralizes its own
//! timeout/retry policy behind one struct). A continuation's wait is always
//! bounded by a long safety-net timeout that is never meant to fire in
//! practice; on executor shutdown, every outstanding continuation completes
//! its output promise with [`AssetError::ShutDown`] instead of hanging
//! forever.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;

use crate::error::{AssetError, AssetResult};

/// The safety-net wait bound applied to every tracked continuation. No
/// operation is meant to rely on this firing; it exists so a wedged
/// dependency can never hang a continuation forever.
pub const SAFETY_NET_TIMEOUT: Duration = Duration::from_secs(60 * 60);

/// Shared handle coordinating continuation tasks.
///
/// Cloning is cheap (`Arc` internally). Dropping the last clone does not by
/// itself cancel outstanding tasks; call [`ContinuationExecutor::shutdown`]
/// explicitly to complete them all with a shutdown error.
#[derive(Clone)]
pub struct ContinuationExecutor {
    inner: Arc<Inner>,
}

struct Inner {
    shutting_down: AtomicBool,
    shutdown_signal: Notify,
}

impl Default for ContinuationExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl ContinuationExecutor {
    /// Build a fresh executor.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                shutting_down: AtomicBool::new(false),
                shutdown_signal: Notify::new(),
            }),
        }
    }

    /// Run `fut` to completion, bounded by the safety-net timeout and
    /// cancellable by [`Self::shutdown`]. Returns `Err(AssetError::ShutDown)`
    /// if the executor shuts down first, or if the safety-net timeout
    /// elapses (logged at `error` level, since this should never happen in
    /// practice).
    pub async fn run<F, T>(&self, fut: F) -> AssetResult<T>
    where
        F: Future<Output = T>,
    {
        if self.inner.shutting_down.load(Ordering::SeqCst) {
            return Err(AssetError::ShutDown);
        }

        tokio::select! {
            biased;
            _ = self.inner.shutdown_signal.notified() => {
                Err(AssetError::ShutDown)
            }
            outcome = tokio::time::timeout(SAFETY_NET_TIMEOUT, fut) => {
                outcome.map_err(|_| {
                    log::error!("continuation exceeded the {:?} safety-net timeout", SAFETY_NET_TIMEOUT);
                    AssetError::ShutDown
                })
            }
        }
    }

    /// Begin shutting down: every task currently inside [`Self::run`] (and
    /// every future call to it) observes a shutdown error.
    pub fn shutdown(&self) {
        self.inner.shutting_down.store(true, Ordering::SeqCst);
        self.inner.shutdown_signal.notify_waiters();
    }

    /// Whether [`Self::shutdown`] has been called.
    pub fn is_shutting_down(&self) -> bool {
        self.inner.shutting_down.load(Ordering::SeqCst)
    }
}
