//! # Non-blocking event fan-out to multiple subscribers.
//!
//! [`SubscriberSet`] distributes events to subscribers concurrently without
//! blocking the publisher.
//!
//! ## Architecture
//! ```text
//! emit(event)
//!     │
//!     ├──► [queue 1] ──► worker 1 ──► subscriber1.on_event()
//!     │    (bounded)         └──────► panic → SubscriberPanicked
//!     ├──► [queue 2] ──► worker 2 ──► subscriber2.on_event()
//!     └──► [queue N] ──► worker N ──► subscriberN.on_event()
//! ```
//!
//! ## Rules
//! - **No cross-subscriber ordering**: subscriber A may process event N
//!   while B processes N+5; per-subscriber delivery is FIFO.
//! - **Overflow**: the event is dropped for that subscriber only and a
//!   `SubscriberOverflow` event is published (never re-published for
//!   overflow events themselves).
//! - **Isolation**: a slow or panicking subscriber doesn't affect others;
//!   panics are caught with `catch_unwind` and surface as
//!   `SubscriberPanicked` events.

use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::events::{Bus, Event, EventKind};
use crate::subscribers::Subscribe;

/// Per-subscriber channel metadata.
struct SubscriberChannel {
    name: &'static str,
    sender: mpsc::Sender<Arc<Event>>,
}

/// Fan-out coordinator for multiple event subscribers.
pub struct SubscriberSet {
    channels: Vec<SubscriberChannel>,
    workers: Vec<JoinHandle<()>>,
    bus: Bus,
}

impl SubscriberSet {
    /// Creates a new set and spawns one worker task per subscriber.
    ///
    /// Queue capacity comes from [`Subscribe::queue_capacity`] (clamped to
    /// >= 1); workers run until their queue is closed.
    #[must_use]
    pub fn new(subscribers: Vec<Arc<dyn Subscribe>>, bus: Bus) -> Self {
        let mut channels = Vec::with_capacity(subscribers.len());
        let mut workers = Vec::with_capacity(subscribers.len());

        for subscriber in subscribers {
            let capacity = subscriber.queue_capacity().max(1);
            let name = subscriber.name();
            let (tx, mut rx) = mpsc::channel::<Arc<Event>>(capacity);
            let bus_for_worker = bus.clone();

            let handle = tokio::spawn(async move {
                while let Some(event) = rx.recv().await {
                    // Panics while handling delivery meta-events are not
                    // re-published; otherwise an always-panicking subscriber
                    // feeds itself forever.
                    let is_meta = matches!(
                        event.kind,
                        EventKind::SubscriberPanicked | EventKind::SubscriberOverflow
                    );
                    let fut = subscriber.on_event(event.as_ref());
                    if let Err(panic) = std::panic::AssertUnwindSafe(fut).catch_unwind().await {
                        if is_meta {
                            continue;
                        }
                        let info = if let Some(msg) = panic.downcast_ref::<&'static str>() {
                            (*msg).to_string()
                        } else if let Some(msg) = panic.downcast_ref::<String>() {
                            msg.clone()
                        } else {
                            "unknown panic".to_string()
                        };
                        bus_for_worker.publish(Event::subscriber_panicked(subscriber.name(), info));
                    }
                }
            });
            channels.push(SubscriberChannel { name, sender: tx });
            workers.push(handle);
        }
        Self {
            channels,
            workers,
            bus,
        }
    }

    /// Emits an event to all subscribers (clones it into an `Arc`).
    pub fn emit(&self, event: &Event) {
        self.emit_arc(Arc::new(event.clone()));
    }

    /// Emits a pre-allocated `Arc<Event>` to all subscribers.
    ///
    /// Uses `try_send`; on a full or closed queue the event is dropped for
    /// that subscriber and a `SubscriberOverflow` event is published, except
    /// when the event itself is an overflow notification.
    pub fn emit_arc(&self, event: Arc<Event>) {
        let is_overflow = event.is_subscriber_overflow();

        for channel in &self.channels {
            match channel.sender.try_send(Arc::clone(&event)) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    if !is_overflow {
                        self.bus
                            .publish(Event::subscriber_overflow(channel.name, "full"));
                    }
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    if !is_overflow {
                        self.bus
                            .publish(Event::subscriber_overflow(channel.name, "closed"));
                    }
                }
            }
        }
    }

    /// Gracefully shuts down all workers: closes the queues, then awaits the
    /// worker tasks.
    pub async fn shutdown(self) {
        drop(self.channels);
        for worker in self.workers {
            let _ = worker.await;
        }
    }
}

/// Bridges a controller's event bus into a [`SubscriberSet`] until the token
/// is cancelled.
pub(crate) fn spawn_fanout(
    subscribers: Vec<Arc<dyn Subscribe>>,
    bus: Bus,
    token: CancellationToken,
) {
    let set = SubscriberSet::new(subscribers, bus.clone());
    let mut rx = bus.subscribe();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                received = rx.recv() => match received {
                    Ok(event) => set.emit_arc(Arc::new(event)),
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
        set.shutdown().await;
    });
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio::time::sleep;

    use super::*;
    use crate::core::CallController;
    use crate::error::Fault;
    use crate::events::EventKind;

    struct Recorder {
        seen: Arc<Mutex<Vec<EventKind>>>,
    }

    #[async_trait]
    impl Subscribe for Recorder {
        async fn on_event(&self, event: &Event) {
            self.seen.lock().unwrap().push(event.kind);
        }

        fn name(&self) -> &'static str {
            "recorder"
        }
    }

    struct Panicker;

    #[async_trait]
    impl Subscribe for Panicker {
        async fn on_event(&self, _event: &Event) {
            panic!("recorder down");
        }

        fn name(&self) -> &'static str {
            "panicker"
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_subscribers_observe_the_call_lifecycle() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let live = CallController::builder()
            .subscriber(Arc::new(Recorder {
                seen: Arc::clone(&seen),
            }))
            .spawn(|hooks| {
                hooks.call(async {
                    sleep(Duration::from_millis(1)).await;
                    Ok::<_, Fault>("hit")
                })
            });

        let mut results = live.results();
        assert_eq!(futures::StreamExt::next(&mut results).await, Some("hit"));
        // Let the fan-out workers drain.
        sleep(Duration::from_millis(5)).await;

        let seen = seen.lock().unwrap().clone();
        for expected in [
            EventKind::Activated,
            EventKind::GenerationStarted,
            EventKind::CallStarted,
            EventKind::CallSucceeded,
        ] {
            assert!(seen.contains(&expected), "missing {expected:?} in {seen:?}");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_every_activation_edge_is_announced() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let live = CallController::builder()
            .subscriber(Arc::new(Recorder {
                seen: Arc::clone(&seen),
            }))
            .spawn(|hooks| hooks.call(async { Ok::<_, Fault>(1u8) }));

        // Subscribing right after spawn races the driver's first poll; the
        // announcement must not depend on the driver parking first.
        let mut results = live.results();
        assert_eq!(futures::StreamExt::next(&mut results).await, Some(1));
        drop(results);
        sleep(Duration::from_millis(5)).await;

        let mut results = live.results();
        assert_eq!(futures::StreamExt::next(&mut results).await, Some(1));
        sleep(Duration::from_millis(5)).await;

        let seen = seen.lock().unwrap().clone();
        let activated = seen.iter().filter(|k| **k == EventKind::Activated).count();
        let deactivated = seen.iter().filter(|k| **k == EventKind::Deactivated).count();
        assert_eq!(activated, 2, "each 0→1 edge must be announced: {seen:?}");
        assert_eq!(deactivated, 1, "the detach in between must be announced: {seen:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_subscriber_is_isolated() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let live = CallController::builder()
            .subscriber(Arc::new(Panicker))
            .subscriber(Arc::new(Recorder {
                seen: Arc::clone(&seen),
            }))
            .spawn(|hooks| hooks.call(async { Ok::<_, Fault>(1u8) }));

        let mut results = live.results();
        assert_eq!(futures::StreamExt::next(&mut results).await, Some(1));
        sleep(Duration::from_millis(5)).await;

        let seen = seen.lock().unwrap().clone();
        assert!(
            seen.contains(&EventKind::CallSucceeded),
            "the healthy subscriber must keep receiving: {seen:?}"
        );
        assert!(
            seen.contains(&EventKind::SubscriberPanicked),
            "the panic must surface as an event: {seen:?}"
        );
    }
}
