//! # Generation driver.
//!
//! One background task per controller. It owns the generation lifecycle and
//! nothing else observes the initializer directly:
//!
//! ```text
//! wait for activation ──► pin retry baseline ──► gauge.advance()
//!         ▲                                          │
//!         │                                          ▼
//!         │                            run initializer(CallHooks)
//!         │                                          │
//!         │      ┌───────────── select! ◄────────────┘
//!         │      │
//!         │      ├─ token cancelled      → exit (last facet handle dropped)
//!         │      ├─ retry fired          → drop stream, next generation
//!         │      ├─ deactivated          → drop stream, reset gauge, wait
//!         │      └─ stream item          → latest = value; broadcast value
//!         │                 └─ stream end → keep waiting for retry/detach
//!         └──────────────────────────────────────────┘
//! ```
//!
//! Switch semantics fall out of ownership: the driver owns the generation's
//! stream, and dropping it on retry or deactivation cancels every in-flight
//! wrapped call inside it. The gauge is reset on every switch so abandoned
//! calls can never pin `loading` at `true`.

use std::sync::{Arc, Mutex, PoisonError};

use futures::future;
use futures::stream::{BoxStream, StreamExt};
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;

use crate::core::gauge::CallGauge;
use crate::core::hooks::CallHooks;
use crate::error::Fault;
use crate::events::{Bus, Event, EventKind};

/// Initializer shared across generations.
pub(crate) type SharedInit<T> =
    Arc<dyn Fn(CallHooks) -> BoxStream<'static, T> + Send + Sync + 'static>;

/// Everything the driver task needs; all channel ends are clones, so holding
/// them does not keep facet subscribers alive.
pub(crate) struct DriverParams<T> {
    pub(crate) token: CancellationToken,
    pub(crate) gauge: Arc<CallGauge>,
    pub(crate) activation_rx: watch::Receiver<bool>,
    pub(crate) retry_rx: watch::Receiver<u64>,
    pub(crate) results_tx: broadcast::Sender<T>,
    pub(crate) latest: Arc<Mutex<Option<T>>>,
    pub(crate) errors_tx: broadcast::Sender<Fault>,
    pub(crate) events: Bus,
    pub(crate) init: SharedInit<T>,
}

pub(crate) async fn run<T>(params: DriverParams<T>)
where
    T: Clone + Send + 'static,
{
    let DriverParams {
        token,
        gauge,
        mut activation_rx,
        mut retry_rx,
        results_tx,
        latest,
        errors_tx,
        events,
        init,
    } = params;

    // Tracks the parked→running transition: a facet may subscribe before the
    // driver's first poll, so the park branch alone cannot see every edge.
    let mut announced_active = false;

    'generations: loop {
        // Park until some facet is observed.
        if !*activation_rx.borrow_and_update() {
            announced_active = false;
            loop {
                tokio::select! {
                    _ = token.cancelled() => return,
                    changed = activation_rx.changed() => {
                        if changed.is_err() {
                            return;
                        }
                        if *activation_rx.borrow_and_update() {
                            break;
                        }
                    }
                }
            }
        }
        if !announced_active {
            announced_active = true;
            events.publish(Event::new(EventKind::Activated));
        }

        // Retries observed before this point are satisfied by the fresh run.
        retry_rx.borrow_and_update();
        let generation = gauge.advance();
        events.publish(Event::new(EventKind::GenerationStarted).with_generation(generation));

        let hooks = CallHooks::new(
            Arc::clone(&gauge),
            errors_tx.clone(),
            events.clone(),
            generation,
        );
        let mut results: Option<BoxStream<'static, T>> = Some((init)(hooks));

        loop {
            tokio::select! {
                biased;

                _ = token.cancelled() => return,

                changed = retry_rx.changed() => {
                    if changed.is_err() {
                        return;
                    }
                    // Switch: the old stream (and its in-flight calls) is
                    // dropped with this iteration's locals.
                    continue 'generations;
                }

                changed = activation_rx.changed() => {
                    if changed.is_err() {
                        return;
                    }
                    if !*activation_rx.borrow_and_update() {
                        drop(results.take());
                        gauge.advance();
                        announced_active = false;
                        events.publish(Event::new(EventKind::Deactivated));
                        continue 'generations;
                    }
                }

                item = next_item(&mut results), if results.is_some() => {
                    match item {
                        Some(value) => publish(&results_tx, &latest, value),
                        None => {
                            results = None;
                            events.publish(
                                Event::new(EventKind::GenerationDrained)
                                    .with_generation(generation),
                            );
                        }
                    }
                }
            }
        }
    }
}

async fn next_item<T>(results: &mut Option<BoxStream<'static, T>>) -> Option<T> {
    match results.as_mut() {
        Some(stream) => stream.next().await,
        // Unreachable behind the `if results.is_some()` precondition.
        None => future::pending().await,
    }
}

/// Stores the latest settled value and fans it out. The lock spans both so a
/// concurrent subscriber snapshot cannot observe the value twice (replay plus
/// live delivery) or miss it entirely.
fn publish<T: Clone>(
    results_tx: &broadcast::Sender<T>,
    latest: &Arc<Mutex<Option<T>>>,
    value: T,
) {
    let mut slot = latest.lock().unwrap_or_else(PoisonError::into_inner);
    *slot = Some(value.clone());
    let _ = results_tx.send(value);
}
