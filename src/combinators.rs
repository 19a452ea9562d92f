//! # Facet combinators.
//!
//! [`map_results`] and [`map_errors`] derive a new [`LiveStream`] from an
//! existing one by rebuilding exactly one facet; the other three are
//! delegated to the original by reference. In particular, `retry()` on a
//! derived stream fires the original controller's trigger, and loading
//! timing is untouched.
//!
//! Both are pure compositions: no new counters, no new subscriptions to the
//! underlying calls. A stage runs lazily, once per subscription to the
//! derived facet.
//!
//! ## Stage failures are not absorbed
//! Call failures are caught by the controller and land on the errors facet.
//! Stage failures are not: a stage that panics, or whose output stream ends
//! early, terminates the facet it transforms for that subscriber. This
//! asymmetry is intentional — a broken transformation is a programming
//! error, not a data-path failure.

use std::sync::Arc;

use crate::error::Fault;
use crate::stream::{FacetStream, LiveStream};

/// Derives a stream whose results facet is `stage` applied to the original's.
///
/// Multi-stage pipelines compose inside the stage with ordinary stream
/// combinators, or by nesting `map_results` calls.
///
/// # Example
/// ```
/// use callstream::{map_results, LiveStream};
/// use futures::StreamExt;
///
/// #[tokio::main(flavor = "current_thread")]
/// async fn main() {
///     let numbers = LiveStream::fixed(vec![1, 2, 3]);
///     let doubled = map_results(&numbers, |results| {
///         results.map(|n| n * 2).boxed()
///     });
///     assert_eq!(doubled.results().collect::<Vec<_>>().await, vec![2, 4, 6]);
/// }
/// ```
pub fn map_results<T, U, S>(stream: &LiveStream<T>, stage: S) -> LiveStream<U>
where
    T: 'static,
    U: 'static,
    S: Fn(FacetStream<T>) -> FacetStream<U> + Send + Sync + 'static,
{
    let results = stream.results_factory();
    LiveStream::from_parts(
        Arc::new(move || stage(results())),
        stream.errors_factory(),
        stream.loading_factory(),
        stream.retry_fn(),
    )
}

/// Dual of [`map_results`], over the errors facet.
///
/// The stage transforms [`Fault`]s; results, loading and retry pass through
/// unmodified.
pub fn map_errors<T, S>(stream: &LiveStream<T>, stage: S) -> LiveStream<T>
where
    T: 'static,
    S: Fn(FacetStream<Fault>) -> FacetStream<Fault> + Send + Sync + 'static,
{
    let errors = stream.errors_factory();
    LiveStream::from_parts(
        stream.results_factory(),
        Arc::new(move || stage(errors())),
        stream.loading_factory(),
        stream.retry_fn(),
    )
}
