//! # Live-call controller construction and facet wiring.
//!
//! [`CallController`] turns an initializer into a [`LiveStream`]: it owns the
//! outstanding-call gauge, the errors channel, the retry trigger and the
//! internal event bus, spawns the generation driver, and hands out the four
//! facets as read-only derived views. Nothing outside the controller can
//! mutate its state — consumers only subscribe to facets and fire `retry()`.
//!
//! ## Facet semantics
//! - **results**: multicast with latest-value replay. The generation runs
//!   once regardless of subscriber count; a late subscriber first receives
//!   the most recent settled value, then live values.
//! - **errors**: live only; a subscriber sees faults emitted after it
//!   subscribed. The channel never completes while the controller lives.
//! - **loading**: current value first, then changes only (no consecutive
//!   duplicates).
//! - **retry**: replaces the current generation for every subscriber, no
//!   resubscription needed.
//!
//! ## Activation rule
//! The controller activates its current generation on the first subscription
//! to any facet and keeps it active while at least one facet stream is alive.
//! When the last one is dropped, the generation (and its in-flight calls) is
//! dropped and the gauge reset; the next subscription runs the initializer
//! again. Constructing a controller runs nothing.
//!
//! ## Lifetime
//! The driver task lives exactly as long as some handle to the controller
//! does: the `LiveStream` (or a clone), or any facet stream obtained from it.
//! When the last one is dropped, a [`DropGuard`] cancels the driver.
//!
//! `spawn` must be called from within a Tokio runtime.

use std::sync::{Arc, Mutex, PoisonError};

use futures::stream::{self, BoxStream};
use tokio::sync::{broadcast, watch};
use tokio_util::sync::{CancellationToken, DropGuard};

use crate::config::ControllerConfig;
use crate::core::activation::{Activation, ObserverGuard};
use crate::core::driver::{self, DriverParams};
use crate::core::gauge::CallGauge;
use crate::core::hooks::CallHooks;
use crate::error::Fault;
use crate::events::{Bus, Event, EventKind};
use crate::stream::{FacetStream, LiveStream};
use crate::subscribers::{self, Subscribe};

/// Entry point for building live-call controllers.
///
/// # Example
/// ```
/// use callstream::{CallController, Fault};
/// use futures::StreamExt;
///
/// #[tokio::main(flavor = "current_thread")]
/// async fn main() {
///     let live = CallController::spawn(|hooks| {
///         hooks.call(async { Ok::<_, Fault>(1u32) })
///     });
///     assert_eq!(live.results().next().await, Some(1));
/// }
/// ```
pub struct CallController;

impl CallController {
    /// Spawns a controller with default configuration and no subscribers.
    ///
    /// The initializer receives [`CallHooks`] and returns the generation's
    /// raw result stream; it is re-invoked on every `retry()` and every
    /// re-activation.
    pub fn spawn<T, F>(init: F) -> LiveStream<T>
    where
        T: Clone + Send + 'static,
        F: Fn(CallHooks) -> BoxStream<'static, T> + Send + Sync + 'static,
    {
        Self::builder().spawn(init)
    }

    /// Starts a builder for a controller with custom configuration or
    /// attached event subscribers.
    pub fn builder() -> Builder {
        Builder::default()
    }
}

/// Builder carrying configuration and event subscribers.
#[derive(Default)]
pub struct Builder {
    config: ControllerConfig,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl Builder {
    /// Overrides the channel capacities.
    pub fn config(mut self, config: ControllerConfig) -> Self {
        self.config = config;
        self
    }

    /// Attaches one event subscriber.
    pub fn subscriber(mut self, subscriber: Arc<dyn Subscribe>) -> Self {
        self.subscribers.push(subscriber);
        self
    }

    /// Attaches several event subscribers.
    pub fn subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers.extend(subscribers);
        self
    }

    /// Wires the channels, spawns the generation driver (and the subscriber
    /// fan-out, if any) and returns the four-facet handle.
    pub fn spawn<T, F>(self, init: F) -> LiveStream<T>
    where
        T: Clone + Send + 'static,
        F: Fn(CallHooks) -> BoxStream<'static, T> + Send + Sync + 'static,
    {
        let gauge = Arc::new(CallGauge::new());
        let activation = Arc::new(Activation::new());
        let (results_tx, _) = broadcast::channel(self.config.results_capacity.max(1));
        let (errors_tx, _) = broadcast::channel(self.config.errors_capacity.max(1));
        let events = Bus::new(self.config.events_capacity);
        let (retry_tx, retry_rx) = watch::channel(0u64);
        let latest = Arc::new(Mutex::new(None));
        let token = CancellationToken::new();

        if !self.subscribers.is_empty() {
            subscribers::spawn_fanout(self.subscribers, events.clone(), token.child_token());
        }

        tokio::spawn(driver::run(DriverParams {
            token: token.clone(),
            gauge: Arc::clone(&gauge),
            activation_rx: activation.watch_active(),
            retry_rx,
            results_tx: results_tx.clone(),
            latest: Arc::clone(&latest),
            errors_tx: errors_tx.clone(),
            events: events.clone(),
            init: Arc::new(init),
        }));

        let core = Arc::new(Core {
            gauge,
            activation,
            results_tx,
            latest,
            errors_tx,
            events,
            retry_tx,
            _guard: token.drop_guard(),
        });
        live_stream(core)
    }
}

/// Shared controller state behind every facet handle.
///
/// Facet streams hold an `Arc` to this, so the controller (and its driver,
/// via the drop guard) survives as long as anything observes it.
pub(crate) struct Core<T> {
    gauge: Arc<CallGauge>,
    activation: Arc<Activation>,
    results_tx: broadcast::Sender<T>,
    latest: Arc<Mutex<Option<T>>>,
    errors_tx: broadcast::Sender<Fault>,
    events: Bus,
    retry_tx: watch::Sender<u64>,
    _guard: DropGuard,
}

impl<T> Core<T>
where
    T: Clone + Send + 'static,
{
    /// Results facet: latest-value replay, then live broadcast delivery.
    fn results_stream(self: &Arc<Self>) -> FacetStream<T> {
        let core = Arc::clone(self);
        let observer = core.activation.observe();
        // The snapshot and the subscription happen under the publisher's
        // lock, so the replayed value and the live feed never overlap.
        let (rx, replay) = {
            let slot = core.latest.lock().unwrap_or_else(PoisonError::into_inner);
            (core.results_tx.subscribe(), slot.clone())
        };
        broadcast_facet(core, observer, rx, replay)
    }

    /// Errors facet: live only, no replay.
    fn errors_stream(self: &Arc<Self>) -> FacetStream<Fault> {
        let core = Arc::clone(self);
        let observer = core.activation.observe();
        let rx = core.errors_tx.subscribe();
        broadcast_facet(core, observer, rx, None)
    }

    /// Loading facet: current value first, then changes only.
    ///
    /// Backed by the gauge's transition channel, which retains every edge: a
    /// call that begins and settles between two polls still delivers its full
    /// pulse. The subscription is opened before the snapshot is taken, so no
    /// transition can fall into the gap; an edge landing between the two is
    /// seen twice and filtered by the duplicate guard.
    fn loading_stream(self: &Arc<Self>) -> FacetStream<bool> {
        let core = Arc::clone(self);
        let observer = core.activation.observe();
        let rx = core.gauge.subscribe_loading();
        let state = LoadingState {
            pending: Some(core.gauge.is_loading()),
            rx,
            last: None,
            _observer: observer,
            _core: core,
        };
        Box::pin(stream::unfold(state, |mut state| async move {
            loop {
                let value = match state.pending.take() {
                    Some(current) => current,
                    None => match state.rx.recv().await {
                        Ok(value) => value,
                        Err(broadcast::error::RecvError::Lagged(_)) => continue,
                        Err(broadcast::error::RecvError::Closed) => return None,
                    },
                };
                if state.last != Some(value) {
                    state.last = Some(value);
                    return Some((value, state));
                }
            }
        }))
    }

    /// Fires the retry trigger: the driver replaces the current generation.
    fn request_retry(&self) {
        self.events.publish(Event::new(EventKind::RetryRequested));
        self.retry_tx.send_modify(|epoch| *epoch = epoch.wrapping_add(1));
    }
}

struct BroadcastState<T, I> {
    rx: broadcast::Receiver<I>,
    replay: Option<I>,
    _observer: ObserverGuard,
    _core: Arc<Core<T>>,
}

struct LoadingState<T> {
    rx: broadcast::Receiver<bool>,
    pending: Option<bool>,
    last: Option<bool>,
    _observer: ObserverGuard,
    _core: Arc<Core<T>>,
}

/// Turns a broadcast receiver (plus an optional replayed value) into a facet
/// stream. Lagged receivers skip the missed items and continue.
fn broadcast_facet<T, I>(
    core: Arc<Core<T>>,
    observer: ObserverGuard,
    rx: broadcast::Receiver<I>,
    replay: Option<I>,
) -> FacetStream<I>
where
    T: Send + 'static,
    I: Clone + Send + 'static,
{
    let state = BroadcastState {
        rx,
        replay,
        _observer: observer,
        _core: core,
    };
    Box::pin(stream::unfold(state, |mut state| async move {
        if let Some(value) = state.replay.take() {
            return Some((value, state));
        }
        loop {
            match state.rx.recv().await {
                Ok(value) => return Some((value, state)),
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }))
}

/// Bundles a core into the public four-facet handle.
fn live_stream<T>(core: Arc<Core<T>>) -> LiveStream<T>
where
    T: Clone + Send + 'static,
{
    let results = Arc::clone(&core);
    let errors = Arc::clone(&core);
    let loading = Arc::clone(&core);
    let retry = core;
    LiveStream::new(
        move || results.results_stream(),
        move || errors.errors_stream(),
        move || loading.loading_stream(),
        move || retry.request_retry(),
    )
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use futures::future;
    use futures::stream::StreamExt;
    use tokio::time::sleep;

    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    /// Collects everything a facet stream yields within a virtual-time
    /// window.
    async fn collect_for<I>(mut stream: FacetStream<I>, window: Duration) -> Vec<I> {
        let mut out = Vec::new();
        let deadline = sleep(window);
        tokio::pin!(deadline);
        loop {
            tokio::select! {
                _ = &mut deadline => break,
                item = stream.next() => match item {
                    Some(value) => out.push(value),
                    None => break,
                },
            }
        }
        out
    }

    fn assert_no_consecutive_duplicates(loading: &[bool]) {
        for pair in loading.windows(2) {
            assert_ne!(pair[0], pair[1], "duplicate loading emission: {loading:?}");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_call_emits_value_and_loading_pulse() {
        let live = CallController::spawn(|hooks| {
            hooks.call(async {
                sleep(ms(1)).await;
                Ok::<_, Fault>("a")
            })
        });

        let loading_task = tokio::spawn(collect_for(live.loading(), ms(20)));
        let results = collect_for(live.results(), ms(20)).await;
        let loading = loading_task.await.expect("loading collector");

        assert_eq!(results, vec!["a"]);
        assert_no_consecutive_duplicates(&loading);
        assert_eq!(loading.last(), Some(&false), "must settle to not-loading");
        assert_eq!(
            loading.iter().filter(|&&on| on).count(),
            1,
            "exactly one loading pulse: {loading:?}"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_calls_hold_loading_until_both_settle() {
        let live = CallController::spawn(|hooks| {
            let fast = hooks.call(async {
                sleep(ms(1)).await;
                Ok::<_, Fault>("a")
            });
            let slow = hooks.call(async {
                sleep(ms(3)).await;
                Ok::<_, Fault>("b")
            });
            stream::select(fast, slow).boxed()
        });

        let loading_task = tokio::spawn(collect_for(live.loading(), ms(20)));
        let results = collect_for(live.results(), ms(20)).await;
        let loading = loading_task.await.expect("loading collector");

        // Completion order, not initiation order.
        assert_eq!(results, vec!["a", "b"]);
        assert_no_consecutive_duplicates(&loading);
        assert_eq!(loading.last(), Some(&false));
        // A single pulse: loading never dipped between the two settles.
        assert_eq!(
            loading.iter().filter(|&&on| on).count(),
            1,
            "loading must stay up across overlapping calls: {loading:?}"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_is_isolated_and_retry_recovers() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let live = CallController::spawn({
            let attempts = Arc::clone(&attempts);
            move |hooks| {
                if attempts.fetch_add(1, Ordering::SeqCst) == 0 {
                    hooks.call(async {
                        sleep(ms(1)).await;
                        Err::<&str, _>(Fault::msg("boom"))
                    })
                } else {
                    hooks.call(async {
                        sleep(ms(1)).await;
                        Ok("recovered")
                    })
                }
            }
        });

        let errors_task = tokio::spawn(collect_for(live.errors(), ms(50)));
        let results_task = tokio::spawn(collect_for(live.results(), ms(50)));

        sleep(ms(10)).await;
        live.retry();

        let results = results_task.await.expect("results collector");
        let errors = errors_task.await.expect("errors collector");

        assert_eq!(
            results,
            vec!["recovered"],
            "a failing call must emit nothing on results"
        );
        assert_eq!(errors.len(), 1, "exactly one fault: {errors:?}");
        assert_eq!(errors[0].to_string(), "boom");
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_reaches_subscribers_without_resubscription() {
        let live = CallController::spawn(|hooks| {
            hooks.call(async {
                sleep(ms(1)).await;
                Ok::<_, Fault>("hit")
            })
        });

        let results_task = tokio::spawn(collect_for(live.results(), ms(50)));
        sleep(ms(10)).await;
        live.retry();

        let results = results_task.await.expect("results collector");
        assert_eq!(results, vec!["hit", "hit"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_subscriber_replays_latest_value_only() {
        let runs = Arc::new(AtomicUsize::new(0));
        let live = CallController::spawn({
            let runs = Arc::clone(&runs);
            move |hooks| {
                runs.fetch_add(1, Ordering::SeqCst);
                hooks.call(async { Ok::<_, Fault>(42) })
            }
        });

        // Keeps the controller active across collector windows.
        let keep_alive = live.loading();

        let first = collect_for(live.results(), ms(10)).await;
        assert_eq!(first, vec![42]);

        let second = collect_for(live.results(), ms(10)).await;
        assert_eq!(second, vec![42], "late subscriber gets the latest value");
        assert_eq!(
            runs.load(Ordering::SeqCst),
            1,
            "replay must not re-run the initializer"
        );
        drop(keep_alive);
    }

    #[tokio::test(start_paused = true)]
    async fn test_errors_are_not_replayed() {
        let live = CallController::spawn(|hooks| {
            hooks.call(async { Err::<u8, _>(Fault::msg("once")) })
        });

        let keep_alive = live.loading();

        let first = collect_for(live.errors(), ms(10)).await;
        assert_eq!(first.len(), 1);

        let second = collect_for(live.errors(), ms(10)).await;
        assert!(
            second.is_empty(),
            "a late errors subscriber must not see past faults: {second:?}"
        );
        drop(keep_alive);
    }

    #[tokio::test(start_paused = true)]
    async fn test_construction_is_lazy_and_loading_activates_results() {
        let runs = Arc::new(AtomicUsize::new(0));
        let live = CallController::spawn({
            let runs = Arc::clone(&runs);
            move |hooks| {
                runs.fetch_add(1, Ordering::SeqCst);
                hooks.call(async { Ok::<_, Fault>(1) })
            }
        });

        sleep(ms(5)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 0, "nothing observed, nothing run");

        let loading = collect_for(live.loading(), ms(10)).await;
        assert_eq!(
            runs.load(Ordering::SeqCst),
            1,
            "a loading-only subscriber must activate the generation"
        );
        assert_eq!(loading.iter().filter(|&&on| on).count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reactivation_reruns_the_initializer() {
        let runs = Arc::new(AtomicUsize::new(0));
        let live = CallController::spawn({
            let runs = Arc::clone(&runs);
            move |hooks| {
                runs.fetch_add(1, Ordering::SeqCst);
                hooks.call(async { Ok::<_, Fault>("v") })
            }
        });

        let first = collect_for(live.results(), ms(10)).await;
        assert_eq!(first, vec!["v"]);
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        // The collector dropped the only facet stream: deactivated. Give the
        // driver a beat to observe it, then resubscribe.
        sleep(ms(1)).await;
        let again = collect_for(live.results(), ms(10)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 2, "reactivation runs a fresh generation");
        // Replay of the previous value plus the fresh generation's value.
        assert_eq!(again, vec!["v", "v"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_resets_loading_for_abandoned_calls() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let live = CallController::spawn({
            let attempts = Arc::clone(&attempts);
            move |hooks| {
                if attempts.fetch_add(1, Ordering::SeqCst) == 0 {
                    // Never settles; only the generation switch can clear it.
                    hooks.call(future::pending::<Result<(), Fault>>())
                } else {
                    stream::empty().boxed()
                }
            }
        });

        let loading_task = tokio::spawn(collect_for(live.loading(), ms(50)));
        sleep(ms(10)).await;
        live.retry();

        let loading = loading_task.await.expect("loading collector");
        assert_eq!(
            loading.last(),
            Some(&false),
            "abandoned in-flight calls must not pin loading: {loading:?}"
        );
        assert_eq!(loading.iter().filter(|&&on| on).count(), 1);
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_report_hook_skips_loading() {
        let live = CallController::spawn(|hooks| {
            hooks.report("invalid query");
            stream::empty::<u8>().boxed()
        });

        let errors_task = tokio::spawn(collect_for(live.errors(), ms(10)));
        let loading = collect_for(live.loading(), ms(10)).await;
        let errors = errors_task.await.expect("errors collector");

        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].to_string(), "invalid query");
        assert!(
            loading.iter().all(|&on| !on),
            "reported faults must not touch loading: {loading:?}"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_fanout_does_not_duplicate_work() {
        let runs = Arc::new(AtomicUsize::new(0));
        let live = CallController::spawn({
            let runs = Arc::clone(&runs);
            move |hooks| {
                runs.fetch_add(1, Ordering::SeqCst);
                hooks.call(async {
                    sleep(ms(1)).await;
                    Ok::<_, Fault>(7)
                })
            }
        });

        let one = tokio::spawn(collect_for(live.results(), ms(10)));
        let two = tokio::spawn(collect_for(live.results(), ms(10)));

        assert_eq!(one.await.expect("first subscriber"), vec![7]);
        assert_eq!(two.await.expect("second subscriber"), vec![7]);
        assert_eq!(runs.load(Ordering::SeqCst), 1, "one generation, many subscribers");
    }
}
