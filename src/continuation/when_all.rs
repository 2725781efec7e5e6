//! `WhenAll` and its `Then*` chaining variants
//!
//! Combines several asset futures into one and lets the caller attach a
//! continuation that runs once every input has settled (or, for the
//! `_with_futures` variant, as soon as every input has merely *finished* —
//! including with a failure the continuation itself wants to inspect).
//!
//! Two arities are provided, `WhenAll2`/`when_all2` and
//! `WhenAll3`/`when_all3`; both share the same `then*` surface. Add a further
//! arity the same way if a caller needs more than three inputs.

use std::sync::Arc;

use tokio::sync::oneshot;

use crate::error::{AssetError, AssetResult};
use crate::marker::{Marker, MarkerFailure, MarkerState};

use super::executor::ContinuationExecutor;

/// One input future's settled outcome, as seen by a continuation.
#[derive(Clone)]
pub enum Settled<T> {
    /// The input constructed successfully.
    Ready(Arc<T>),
    /// The input failed; carries the captured failure context.
    Invalid(Arc<MarkerFailure>),
}

impl<T> Settled<T> {
    /// Whether the input resolved successfully.
    pub fn is_ready(&self) -> bool {
        matches!(self, Settled::Ready(_))
    }

    async fn from_marker(marker: &Arc<Marker<T>>) -> Self
    where
        T: Send + Sync + 'static,
    {
        let mut receiver = marker.background_receiver_pub();
        loop {
            match &*receiver.borrow() {
                MarkerState::Pending => {}
                MarkerState::Ready(value) => return Settled::Ready(value.clone()),
                MarkerState::Invalid(failure) => return Settled::Invalid(failure.clone()),
            }
            if receiver.changed().await.is_err() {
                return Settled::Invalid(Arc::new(MarkerFailure {
                    reason: crate::error::ConstructionReason::Other(
                        "continuation executor expired".to_string(),
                    ),
                    actualization_log: String::new(),
                    dep_val: marker.dep_val().clone(),
                }));
            }
        }
    }

    fn first_failure(settled: &[&Self]) -> Option<Arc<MarkerFailure>> {
        settled.iter().find_map(|s| match s {
            Settled::Invalid(failure) => Some(failure.clone()),
            Settled::Ready(_) => None,
        })
    }
}

fn not_pending<T>(marker: &Arc<Marker<T>>) -> bool {
    !matches!(marker.check_background(), MarkerState::Pending)
}

impl<T> Marker<T> {
    /// Public cursor constructor used by the continuation engine. Distinct
    /// from the crate-private `background_receiver` so `continuation` can
    /// observe markers of asset types it does not itself register.
    pub fn background_receiver_pub(&self) -> tokio::sync::watch::Receiver<MarkerState<T>> {
        self.background_receiver()
    }
}

/// The combined result of waiting on every input of a two-input `WhenAll`.
pub struct CombinedFuture<A, B> {
    a: Settled<A>,
    b: Settled<B>,
}

impl<A, B> CombinedFuture<A, B> {
    /// Both settled values as a tuple of `Settled`, preserving per-input
    /// failure information — the shape `then_construct_to_promise_with_futures`
    /// hands to its continuation.
    pub fn into_parts(self) -> (Settled<A>, Settled<B>) {
        (self.a, self.b)
    }
}

/// Two heterogeneous asset futures combined into one awaitable unit.
///
/// Built with [`when_all2`]; call one of the `then*` methods to attach a
/// continuation, or [`WhenAll2::as_combined_future`] to get the raw settled
/// pair with no continuation at all.
pub struct WhenAll2<A, B> {
    marker_a: Arc<Marker<A>>,
    marker_b: Arc<Marker<B>>,
    executor: ContinuationExecutor,
}

/// Build a `WhenAll` over two heterogeneous asset markers.
pub fn when_all2<A, B>(
    executor: ContinuationExecutor,
    marker_a: Arc<Marker<A>>,
    marker_b: Arc<Marker<B>>,
) -> WhenAll2<A, B> {
    WhenAll2 {
        marker_a,
        marker_b,
        executor,
    }
}

impl<A, B> WhenAll2<A, B>
where
    A: Send + Sync + 'static,
    B: Send + Sync + 'static,
{
    /// True if both inputs have already settled; lets a caller opt into a
    /// synchronous fast path instead of going through the executor. Used
    /// internally by [`Self::as_combined_future`], which checks this first
    /// and, if true, combines the inputs inline rather than scheduling
    /// through the executor's safety-net-timeout machinery.
    pub fn check_immediately(&self) -> bool {
        not_pending(&self.marker_a) && not_pending(&self.marker_b)
    }

    /// Wait for both inputs and return their settled outcomes with no
    /// continuation attached. If both inputs are already settled at call
    /// time, combines them inline instead of dispatching through the
    /// executor.
    pub async fn as_combined_future(self) -> AssetResult<CombinedFuture<A, B>> {
        let immediate = self.check_immediately();
        let (marker_a, marker_b, executor) = (self.marker_a, self.marker_b, self.executor);
        let combine = async move {
            let a = Settled::from_marker(&marker_a).await;
            let b = Settled::from_marker(&marker_b).await;
            CombinedFuture { a, b }
        };
        if immediate {
            if executor.is_shutting_down() {
                return Err(AssetError::ShutDown);
            }
            return Ok(combine.await);
        }
        executor.run(combine).await
    }

    /// Fan-in synchronization only: resolve once both inputs have settled,
    /// discarding their values.
    pub async fn then_opaque_future(self) -> AssetResult<()> {
        self.as_combined_future().await.map(|_| ())
    }

    /// Run `then` once both inputs are Ready; if either is Invalid, the
    /// continuation is never called and the returned error carries the
    /// first failure encountered.
    pub async fn then<F, R>(self, then: F) -> AssetResult<R>
    where
        F: FnOnce(Arc<A>, Arc<B>) -> R + Send + 'static,
        R: Send + 'static,
    {
        let combined = self.as_combined_future().await?;
        let (a, b) = combined.into_parts();
        match Settled::first_failure(&[&a, &b]) {
            Some(failure) => Err(failure.into_error("when_all")),
            None => match (a, b) {
                (Settled::Ready(a), Settled::Ready(b)) => Ok(then(a, b)),
                _ => unreachable!("first_failure returned None but an input was Invalid"),
            },
        }
    }

    /// As [`Self::then`], but completes `promise` with the result instead of
    /// returning it.
    pub async fn then_construct_to_promise<F, R>(self, promise: oneshot::Sender<AssetResult<R>>, then: F)
    where
        F: FnOnce(Arc<A>, Arc<B>) -> R + Send + 'static,
        R: Send + 'static,
    {
        let result = self.then(then).await;
        let _ = promise.send(result);
    }

    /// Like [`Self::then_construct_to_promise`], but `then` receives the raw
    /// settled values of both inputs — including `Invalid` ones — so it can
    /// inspect per-input failures itself. Unlike the plain variant, `then`
    /// **is** called even when an input failed.
    pub async fn then_construct_to_promise_with_futures<F, R>(
        self,
        promise: oneshot::Sender<AssetResult<R>>,
        then: F,
    ) where
        F: FnOnce(Settled<A>, Settled<B>) -> AssetResult<R> + Send + 'static,
        R: Send + 'static,
    {
        let result = match self.as_combined_future().await {
            Ok(combined) => {
                let (a, b) = combined.into_parts();
                then(a, b)
            }
            Err(err) => Err(err),
        };
        let _ = promise.send(result);
    }
}

/// The combined result of waiting on every input of a three-input `WhenAll`.
pub struct CombinedFuture3<A, B, C> {
    a: Settled<A>,
    b: Settled<B>,
    c: Settled<C>,
}

impl<A, B, C> CombinedFuture3<A, B, C> {
    /// Every settled value as a tuple of `Settled`.
    pub fn into_parts(self) -> (Settled<A>, Settled<B>, Settled<C>) {
        (self.a, self.b, self.c)
    }
}

/// Three heterogeneous asset futures combined into one awaitable unit. See
/// [`WhenAll2`] for the two-input form; the `then*` surface is identical.
pub struct WhenAll3<A, B, C> {
    marker_a: Arc<Marker<A>>,
    marker_b: Arc<Marker<B>>,
    marker_c: Arc<Marker<C>>,
    executor: ContinuationExecutor,
}

/// Build a `WhenAll` over three heterogeneous asset markers.
pub fn when_all3<A, B, C>(
    executor: ContinuationExecutor,
    marker_a: Arc<Marker<A>>,
    marker_b: Arc<Marker<B>>,
    marker_c: Arc<Marker<C>>,
) -> WhenAll3<A, B, C> {
    WhenAll3 {
        marker_a,
        marker_b,
        marker_c,
        executor,
    }
}

impl<A, B, C> WhenAll3<A, B, C>
where
    A: Send + Sync + 'static,
    B: Send + Sync + 'static,
    C: Send + Sync + 'static,
{
    /// True if all three inputs have already settled.
    pub fn check_immediately(&self) -> bool {
        not_pending(&self.marker_a) && not_pending(&self.marker_b) && not_pending(&self.marker_c)
    }

    /// Wait for all three inputs and return their settled outcomes with no
    /// continuation attached. Combines inline, bypassing the executor, when
    /// every input is already settled at call time.
    pub async fn as_combined_future(self) -> AssetResult<CombinedFuture3<A, B, C>> {
        let immediate = self.check_immediately();
        let (marker_a, marker_b, marker_c, executor) =
            (self.marker_a, self.marker_b, self.marker_c, self.executor);
        let combine = async move {
            let a = Settled::from_marker(&marker_a).await;
            let b = Settled::from_marker(&marker_b).await;
            let c = Settled::from_marker(&marker_c).await;
            CombinedFuture3 { a, b, c }
        };
        if immediate {
            if executor.is_shutting_down() {
                return Err(AssetError::ShutDown);
            }
            return Ok(combine.await);
        }
        executor.run(combine).await
    }

    /// Fan-in synchronization only.
    pub async fn then_opaque_future(self) -> AssetResult<()> {
        self.as_combined_future().await.map(|_| ())
    }

    /// Run `then` once all three inputs are Ready; if any is Invalid, the
    /// continuation is never called and the returned error carries the
    /// first failure encountered.
    pub async fn then<F, R>(self, then: F) -> AssetResult<R>
    where
        F: FnOnce(Arc<A>, Arc<B>, Arc<C>) -> R + Send + 'static,
        R: Send + 'static,
    {
        let combined = self.as_combined_future().await?;
        let (a, b, c) = combined.into_parts();
        match Settled::first_failure(&[&a, &b, &c]) {
            Some(failure) => Err(failure.into_error("when_all")),
            None => match (a, b, c) {
                (Settled::Ready(a), Settled::Ready(b), Settled::Ready(c)) => Ok(then(a, b, c)),
                _ => unreachable!("first_failure returned None but an input was Invalid"),
            },
        }
    }

    /// As [`Self::then`], but completes `promise` with the result instead of
    /// returning it.
    pub async fn then_construct_to_promise<F, R>(self, promise: oneshot::Sender<AssetResult<R>>, then: F)
    where
        F: FnOnce(Arc<A>, Arc<B>, Arc<C>) -> R + Send + 'static,
        R: Send + 'static,
    {
        let result = self.then(then).await;
        let _ = promise.send(result);
    }

    /// Like [`Self::then_construct_to_promise`], but `then` receives the raw
    /// settled values of all three inputs, including `Invalid` ones.
    pub async fn then_construct_to_promise_with_futures<F, R>(
        self,
        promise: oneshot::Sender<AssetResult<R>>,
        then: F,
    ) where
        F: FnOnce(Settled<A>, Settled<B>, Settled<C>) -> AssetResult<R> + Send + 'static,
        R: Send + 'static,
    {
        let result = match self.as_combined_future().await {
            Ok(combined) => {
                let (a, b, c) = combined.into_parts();
                then(a, b, c)
            }
            Err(err) => Err(err),
        };
        let _ = promise.send(result);
    }
}
