//! `PollToPromise`: a state machine for step-function producers
//!
//! Some producers don't naturally expose a single awaitable (e.g. a
//! compiler process polled for progress, or the compound resolver's
//! breadth-first tree assembly in `crate::compound::resolver`). Those
//! callers supply a `check` function returning [`PollOutcome`] and a
//! `dispatch` function that finalizes the result once `check` reports
//! [`PollOutcome::Finish`].

use std::time::Duration;

use crate::error::AssetResult;

use super::executor::ContinuationExecutor;

/// The result of one `check` call in a poll loop.
pub enum PollOutcome<T> {
    /// Not done yet; call `check` again after the poll interval.
    Continue,
    /// Done; `dispatch` may now be called with `T`.
    Finish(T),
}

/// Poll `check` at `interval` (bounded by the executor's safety-net timeout)
/// until it reports [`PollOutcome::Finish`], then run `dispatch` on the
/// finished value and return its result.
///
/// `check` may itself be async (e.g. polling a future with a short timeout,
/// as the compound resolver's tree assembly does for each pending
/// sub-future) — it is awaited once per iteration.
pub async fn poll_to_promise<C, CFut, D, T, R>(
    executor: &ContinuationExecutor,
    interval: Duration,
    mut check: C,
    dispatch: D,
) -> AssetResult<R>
where
    C: FnMut() -> CFut,
    CFut: std::future::Future<Output = PollOutcome<T>>,
    D: FnOnce(T) -> R,
{
    executor
        .run(async move {
            loop {
                match check().await {
                    PollOutcome::Finish(value) => return dispatch(value),
                    PollOutcome::Continue => {
                        tokio::time::sleep(interval).await;
                    }
                }
            }
        })
        .await
}
