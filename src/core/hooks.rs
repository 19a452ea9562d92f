//! # Hooks handed to stream initializers.
//!
//! An initializer describes how to obtain data; [`CallHooks`] is the pair of
//! instruments the controller injects into it:
//!
//! - [`CallHooks::call`] wraps one asynchronous operation: the gauge goes up
//!   when the wrap happens, the success value flows downstream, a failure is
//!   absorbed into the errors facet, and the gauge comes back down either
//!   way. One failing call never terminates the overall results stream.
//! - [`CallHooks::report`] pushes a fault straight onto the errors facet, with
//!   no gauge effect — for failures that have no associated call.
//!
//! Hooks are stamped with the generation they were created for. Gauge effects
//! from a stale generation (a hook that outlived its run) are ignored; faults
//! are still forwarded.

use std::future::Future;
use std::sync::Arc;

use futures::future;
use futures::stream::{self, BoxStream, StreamExt};
use tokio::sync::broadcast;

use crate::core::gauge::CallGauge;
use crate::error::Fault;
use crate::events::{Bus, Event, EventKind};

/// Call-wrapper and error-reporter pair injected into an initializer.
///
/// Cheap to clone; clones share the same gauge and channels and carry the
/// same generation stamp.
#[derive(Clone, Debug)]
pub struct CallHooks {
    gauge: Arc<CallGauge>,
    errors_tx: broadcast::Sender<Fault>,
    events: Bus,
    generation: u64,
}

impl CallHooks {
    pub(crate) fn new(
        gauge: Arc<CallGauge>,
        errors_tx: broadcast::Sender<Fault>,
        events: Bus,
        generation: u64,
    ) -> Self {
        Self {
            gauge,
            errors_tx,
            events,
            generation,
        }
    }

    /// Generation this hook pair belongs to.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Wraps one asynchronous operation.
    ///
    /// The outstanding-call gauge is incremented here, at wrap time. The
    /// returned stream yields the success value once and ends, or — on
    /// failure — forwards the fault to the errors facet and ends without
    /// yielding. The gauge is decremented when the operation settles; if the
    /// returned stream is dropped before settling, the generation switch that
    /// dropped it resets the gauge.
    ///
    /// Counter and error effects fire exactly once per `call` invocation;
    /// downstream fan-out happens at the controller's broadcast layer and
    /// cannot duplicate the underlying work.
    pub fn call<R, F>(&self, call: F) -> BoxStream<'static, R>
    where
        F: Future<Output = Result<R, Fault>> + Send + 'static,
        R: Send + 'static,
    {
        if let Some(outstanding) = self.gauge.begin(self.generation) {
            self.events.publish(
                Event::new(EventKind::CallStarted)
                    .with_generation(self.generation)
                    .with_outstanding(outstanding),
            );
        }
        let hooks = self.clone();
        stream::once(call)
            .filter_map(move |outcome| {
                let settled = match outcome {
                    Ok(value) => {
                        let mut ev = Event::new(EventKind::CallSucceeded)
                            .with_generation(hooks.generation);
                        if let Some(outstanding) = hooks.gauge.settle(hooks.generation) {
                            ev = ev.with_outstanding(outstanding);
                        }
                        hooks.events.publish(ev);
                        Some(value)
                    }
                    Err(fault) => {
                        let mut ev = Event::new(EventKind::CallFailed)
                            .with_generation(hooks.generation)
                            .with_detail(fault.to_string());
                        let _ = hooks.errors_tx.send(fault);
                        if let Some(outstanding) = hooks.gauge.settle(hooks.generation) {
                            ev = ev.with_outstanding(outstanding);
                        }
                        hooks.events.publish(ev);
                        None
                    }
                };
                future::ready(settled)
            })
            .boxed()
    }

    /// Reports a fault with no associated call.
    ///
    /// Goes straight to the errors facet; the outstanding-call gauge is not
    /// touched.
    pub fn report(&self, fault: impl Into<Fault>) {
        let fault = fault.into();
        self.events.publish(
            Event::new(EventKind::FaultReported)
                .with_generation(self.generation)
                .with_detail(fault.to_string()),
        );
        let _ = self.errors_tx.send(fault);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> (Arc<CallGauge>, broadcast::Sender<Fault>, Bus, CallHooks) {
        let gauge = Arc::new(CallGauge::new());
        let generation = gauge.advance();
        let (errors_tx, _) = broadcast::channel(8);
        let events = Bus::new(16);
        let hooks = CallHooks::new(
            Arc::clone(&gauge),
            errors_tx.clone(),
            events.clone(),
            generation,
        );
        (gauge, errors_tx, events, hooks)
    }

    #[tokio::test]
    async fn test_successful_call_yields_value_and_settles() {
        let (gauge, _errors_tx, _events, hooks) = fixture();

        let mut wrapped = hooks.call(async { Ok::<_, Fault>("a") });
        assert!(gauge.is_loading(), "gauge must go up at wrap time");

        assert_eq!(wrapped.next().await, Some("a"));
        assert_eq!(wrapped.next().await, None, "wrapped call yields once");
        assert!(!gauge.is_loading(), "gauge must settle after success");
    }

    #[tokio::test]
    async fn test_failed_call_is_absorbed_into_errors() {
        let (gauge, errors_tx, _events, hooks) = fixture();
        let mut errors_rx = errors_tx.subscribe();

        let mut wrapped = hooks.call(async { Err::<&str, _>(Fault::msg("boom")) });
        assert_eq!(wrapped.next().await, None, "failure yields nothing");

        let fault = errors_rx.recv().await.expect("exactly one fault");
        assert_eq!(fault.to_string(), "boom");
        assert!(errors_rx.try_recv().is_err());
        assert_eq!(gauge.outstanding(), 0);
        assert!(!gauge.is_loading());
    }

    #[tokio::test]
    async fn test_report_skips_the_gauge() {
        let (gauge, errors_tx, _events, hooks) = fixture();
        let mut errors_rx = errors_tx.subscribe();

        hooks.report("invalid query");
        let fault = errors_rx.recv().await.expect("reported fault");
        assert_eq!(fault.to_string(), "invalid query");
        assert_eq!(gauge.outstanding(), 0);
        assert!(!gauge.is_loading());
    }

    #[tokio::test]
    async fn test_call_publishes_lifecycle_events() {
        let (_gauge, _errors_tx, events, hooks) = fixture();
        let mut rx = events.subscribe();

        let mut wrapped = hooks.call(async { Ok::<_, Fault>(1u32) });
        let started = rx.recv().await.expect("CallStarted");
        assert_eq!(started.kind, EventKind::CallStarted);
        assert_eq!(started.outstanding, Some(1));

        wrapped.next().await;
        let settled = rx.recv().await.expect("CallSucceeded");
        assert_eq!(settled.kind, EventKind::CallSucceeded);
        assert_eq!(settled.outstanding, Some(0));
    }

    #[tokio::test]
    async fn test_stale_hooks_do_not_move_the_gauge() {
        let (gauge, _errors_tx, _events, hooks) = fixture();
        gauge.advance(); // the hooks' generation is now stale

        let mut wrapped = hooks.call(async { Ok::<_, Fault>("late") });
        assert_eq!(gauge.outstanding(), 0, "stale begin must be ignored");
        assert!(!gauge.is_loading());

        // The value still flows if somebody polls the stale stream.
        assert_eq!(wrapped.next().await, Some("late"));
        assert_eq!(gauge.outstanding(), 0);
    }
}
