//! # Event bus for broadcasting controller events.
//!
//! [`Bus`] is a thin wrapper around [`tokio::sync::broadcast`] providing
//! non-blocking publishing from the driver, the hooks and the facet handles.
//!
//! ## Rules
//! - **Non-blocking publish**: `publish()` never blocks or awaits.
//! - **Bounded capacity**: one ring buffer shared by all receivers.
//! - **Lag handling**: slow receivers get `RecvError::Lagged(n)` and skip the
//!   `n` oldest items.
//! - **No persistence**: events sent while no receiver exists are dropped.

use tokio::sync::broadcast;

use super::event::Event;

/// Broadcast channel for controller events.
///
/// Cheap to clone (the sender is `Arc`-backed); multiple publishers may
/// publish concurrently, and each receiver observes clones of each event.
#[derive(Clone, Debug)]
pub struct Bus {
    tx: broadcast::Sender<Event>,
}

impl Bus {
    /// Creates a new bus with the given channel capacity (clamped to >= 1).
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel::<Event>(capacity.max(1));
        Self { tx }
    }

    /// Publishes an event to all active receivers.
    ///
    /// If there are no receivers the event is dropped; this still returns
    /// immediately.
    pub fn publish(&self, ev: Event) {
        let _ = self.tx.send(ev);
    }

    /// Creates a receiver that observes subsequent events.
    ///
    /// A receiver only gets events sent after it subscribed; slow receivers
    /// observe `RecvError::Lagged(n)` and skip missed items.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;

    #[tokio::test]
    async fn test_receiver_only_sees_later_events() {
        let bus = Bus::new(8);
        bus.publish(Event::new(EventKind::Activated));

        let mut rx = bus.subscribe();
        bus.publish(Event::new(EventKind::RetryRequested));

        let ev = rx.recv().await.expect("one event after subscribe");
        assert_eq!(ev.kind, EventKind::RetryRequested);
        assert!(rx.try_recv().is_err(), "no further events expected");
    }

    #[tokio::test]
    async fn test_publish_without_receivers_is_dropped() {
        let bus = Bus::new(1);
        bus.publish(Event::new(EventKind::Activated));
        let mut rx = bus.subscribe();
        assert!(rx.try_recv().is_err());
    }
}
