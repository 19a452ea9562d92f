//! # Facet-observer tracking for lazy activation.
//!
//! The controller runs its initializer only while somebody is watching. The
//! rule: the current generation is activated on the first subscription to
//! *any* facet and stays active as long as at least one facet stream is
//! alive; when the last one is dropped the generation is dropped too.
//!
//! [`Activation`] is the refcount behind that rule. Every facet stream holds
//! an [`ObserverGuard`]; the 0→1 and 1→0 edges flip a watch channel that the
//! driver selects on.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::watch;

/// Observer refcount with an edge-triggered `watch<bool>` active flag.
#[derive(Debug)]
pub(crate) struct Activation {
    observers: AtomicUsize,
    active: watch::Sender<bool>,
}

impl Activation {
    pub(crate) fn new() -> Self {
        let (active, _rx) = watch::channel(false);
        Self {
            observers: AtomicUsize::new(0),
            active,
        }
    }

    /// Registers one facet observer; the guard unregisters on drop.
    pub(crate) fn observe(self: &Arc<Self>) -> ObserverGuard {
        if self.observers.fetch_add(1, Ordering::SeqCst) == 0 {
            self.set_active(true);
        }
        ObserverGuard {
            activation: Arc::clone(self),
        }
    }

    /// Subscribes to the active flag.
    pub(crate) fn watch_active(&self) -> watch::Receiver<bool> {
        self.active.subscribe()
    }

    #[cfg(test)]
    pub(crate) fn observers(&self) -> usize {
        self.observers.load(Ordering::SeqCst)
    }

    fn set_active(&self, on: bool) {
        self.active.send_if_modified(|current| {
            if *current != on {
                *current = on;
                true
            } else {
                false
            }
        });
    }
}

/// Keeps the controller's current generation active while held.
#[derive(Debug)]
pub(crate) struct ObserverGuard {
    activation: Arc<Activation>,
}

impl Drop for ObserverGuard {
    fn drop(&mut self) {
        if self.activation.observers.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.activation.set_active(false);
        }
    }
}
