//! # The four-facet live stream handle.
//!
//! [`LiveStream`] is a value bundle, not an owned object graph: four facet
//! factories sharing whatever machinery sits behind them. Controllers build
//! one over their channels; [`crate::map_results`]/[`crate::map_errors`]
//! rebundle one facet and delegate the rest; [`LiveStream::fixed`] and
//! [`LiveStream::from_fn`] build degenerate bundles for composition defaults
//! and tests, without any controller machinery.
//!
//! Cloning a `LiveStream` is cheap and shares the underlying source: clones
//! do not re-run anything.

use std::fmt;
use std::sync::Arc;

use futures::future;
use futures::stream::{self, BoxStream, StreamExt};

use crate::error::Fault;

/// A single subscription to one facet.
pub type FacetStream<I> = BoxStream<'static, I>;

pub(crate) type FacetFactory<I> = Arc<dyn Fn() -> FacetStream<I> + Send + Sync>;
pub(crate) type RetryFn = Arc<dyn Fn() + Send + Sync>;

/// The public four-facet contract: results, errors, loading, retry.
///
/// Each accessor opens a fresh subscription; dropping the returned stream
/// closes it. What a subscription observes (replay, liveness, activation)
/// is decided by whatever built the bundle — see
/// [`CallController`](crate::CallController) for the controller-backed
/// semantics.
pub struct LiveStream<T> {
    results: FacetFactory<T>,
    errors: FacetFactory<Fault>,
    loading: FacetFactory<bool>,
    retry: RetryFn,
}

impl<T> LiveStream<T> {
    /// Builds a fully custom bundle from four facet factories.
    pub fn new<R, E, L, Y>(results: R, errors: E, loading: L, retry: Y) -> Self
    where
        R: Fn() -> FacetStream<T> + Send + Sync + 'static,
        E: Fn() -> FacetStream<Fault> + Send + Sync + 'static,
        L: Fn() -> FacetStream<bool> + Send + Sync + 'static,
        Y: Fn() + Send + Sync + 'static,
    {
        Self {
            results: Arc::new(results),
            errors: Arc::new(errors),
            loading: Arc::new(loading),
            retry: Arc::new(retry),
        }
    }

    pub(crate) fn from_parts(
        results: FacetFactory<T>,
        errors: FacetFactory<Fault>,
        loading: FacetFactory<bool>,
        retry: RetryFn,
    ) -> Self {
        Self {
            results,
            errors,
            loading,
            retry,
        }
    }

    /// Subscribes to the result sequence.
    pub fn results(&self) -> FacetStream<T> {
        (self.results)()
    }

    /// Subscribes to the error sequence.
    pub fn errors(&self) -> FacetStream<Fault> {
        (self.errors)()
    }

    /// Subscribes to the in-flight indicator.
    pub fn loading(&self) -> FacetStream<bool> {
        (self.loading)()
    }

    /// Fires the manual re-execution trigger.
    pub fn retry(&self) {
        (self.retry)()
    }

    pub(crate) fn results_factory(&self) -> FacetFactory<T> {
        Arc::clone(&self.results)
    }

    pub(crate) fn errors_factory(&self) -> FacetFactory<Fault> {
        Arc::clone(&self.errors)
    }

    pub(crate) fn loading_factory(&self) -> FacetFactory<bool> {
        Arc::clone(&self.loading)
    }

    pub(crate) fn retry_fn(&self) -> RetryFn {
        Arc::clone(&self.retry)
    }
}

impl<T> LiveStream<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Builds a bundle that yields the given values on every results
    /// subscription, with constant `loading = false`, no errors and a no-op
    /// retry.
    ///
    /// The default-value/test factory: useful for composing fallback streams
    /// and for unit tests that don't need controller machinery.
    ///
    /// # Example
    /// ```
    /// use callstream::LiveStream;
    /// use futures::StreamExt;
    ///
    /// #[tokio::main(flavor = "current_thread")]
    /// async fn main() {
    ///     let live = LiveStream::fixed(vec![1, 2, 3]);
    ///     assert_eq!(live.results().collect::<Vec<_>>().await, vec![1, 2, 3]);
    ///     live.retry(); // no-op
    /// }
    /// ```
    pub fn fixed(values: Vec<T>) -> Self {
        Self::from_fn(move || stream::iter(values.clone()).boxed())
    }

    /// Like [`LiveStream::fixed`], from an arbitrary results factory.
    pub fn from_fn<F>(results: F) -> Self
    where
        F: Fn() -> FacetStream<T> + Send + Sync + 'static,
    {
        Self::new(
            results,
            || stream::empty().boxed(),
            || stream::once(future::ready(false)).boxed(),
            || {},
        )
    }
}

impl<T> Clone for LiveStream<T> {
    fn clone(&self) -> Self {
        Self {
            results: Arc::clone(&self.results),
            errors: Arc::clone(&self.errors),
            loading: Arc::clone(&self.loading),
            retry: Arc::clone(&self.retry),
        }
    }
}

impl<T> fmt::Debug for LiveStream<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LiveStream").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fixed_replays_per_subscription() {
        let live = LiveStream::fixed(vec!["x", "y"]);
        assert_eq!(live.results().collect::<Vec<_>>().await, vec!["x", "y"]);
        assert_eq!(
            live.results().collect::<Vec<_>>().await,
            vec!["x", "y"],
            "every subscription sees the values"
        );
    }

    #[tokio::test]
    async fn test_fixed_has_inert_other_facets() {
        let live = LiveStream::fixed(vec![1u8]);
        assert_eq!(live.loading().collect::<Vec<_>>().await, vec![false]);
        assert!(live.errors().collect::<Vec<_>>().await.is_empty());
        live.retry();
        assert_eq!(live.results().collect::<Vec<_>>().await, vec![1]);
    }

    #[tokio::test]
    async fn test_fixed_bundle_moves_across_tasks() {
        // The factories must be shareable: a bundle built from owned values
        // still has to satisfy the Send + Sync factory contract.
        let live = LiveStream::fixed(vec![String::from("x")]);
        let handle = tokio::spawn(async move { live.results().collect::<Vec<_>>().await });
        assert_eq!(handle.await.expect("collector"), vec!["x"]);
    }

    #[tokio::test]
    async fn test_from_fn_uses_the_factory() {
        let live = LiveStream::from_fn(|| stream::iter(0..3).boxed());
        assert_eq!(live.results().collect::<Vec<_>>().await, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn test_clone_shares_the_source() {
        let live = LiveStream::fixed(vec![9]);
        let clone = live.clone();
        assert_eq!(clone.results().collect::<Vec<_>>().await, vec![9]);
    }
}
