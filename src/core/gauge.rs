//! # Outstanding-call gauge.
//!
//! [`CallGauge`] owns the one piece of mutable state behind the loading
//! facet: how many wrapped calls of the current generation have started but
//! not yet settled. `loading` is exactly `count > 0`, published as a sequence
//! of transitions on a broadcast channel, one send per value change.
//!
//! The transition channel preserves every edge: a call that begins and
//! settles before the subscriber is next scheduled still delivers its
//! `true` then `false` pair. A lossy latest-value channel would coalesce the
//! pair away and the loading pulse of an immediately-resolving call would
//! never reach anyone.
//!
//! ## Rules
//! - One increment per call begin, one decrement per settle (success or
//!   failure). A settle at zero is ignored — the count never underflows.
//! - Operations are generation-stamped: a begin/settle from a generation that
//!   is no longer current is a no-op, so abandoned calls cannot move the
//!   gauge.
//! - [`CallGauge::advance`] starts the next generation: bumps the epoch,
//!   zeroes the count and drops `loading` back to `false`. This is the
//!   retry/abandonment rule — in-flight calls of the abandoned generation are
//!   dropped before they settle, so their pending increments are discarded
//!   rather than leaked.
//!
//! Bookkeeping is synchronous with the events it reacts to (single-timeline
//! model); the atomics are not meant to arbitrate genuinely parallel begins.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

use tokio::sync::broadcast;

/// Ring capacity of the transition channel. Transitions alternate, so this
/// only needs to absorb bursts between subscriber polls.
const TRANSITIONS_CAPACITY: usize = 64;

/// Counter for started-but-not-settled calls, with the current loading flag,
/// a loss-free transition channel and the generation epoch.
#[derive(Debug)]
pub(crate) struct CallGauge {
    generation: AtomicU64,
    outstanding: AtomicUsize,
    loading: AtomicBool,
    transitions: broadcast::Sender<bool>,
}

impl CallGauge {
    pub(crate) fn new() -> Self {
        let (transitions, _rx) = broadcast::channel(TRANSITIONS_CAPACITY);
        Self {
            generation: AtomicU64::new(0),
            outstanding: AtomicUsize::new(0),
            loading: AtomicBool::new(false),
            transitions,
        }
    }

    /// Starts the next generation: bumps the epoch, zeroes the count and
    /// clears the loading flag. Returns the new epoch.
    pub(crate) fn advance(&self) -> u64 {
        let next = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.outstanding.store(0, Ordering::SeqCst);
        self.set_loading(false);
        next
    }

    /// Records a call begin for `generation`.
    ///
    /// Returns the new outstanding count, or `None` when the generation is
    /// stale (the call belongs to an abandoned run).
    pub(crate) fn begin(&self, generation: u64) -> Option<usize> {
        if self.generation.load(Ordering::SeqCst) != generation {
            return None;
        }
        let count = self.outstanding.fetch_add(1, Ordering::SeqCst) + 1;
        self.set_loading(true);
        Some(count)
    }

    /// Records a call settle for `generation`.
    ///
    /// Returns the new outstanding count, or `None` when the generation is
    /// stale or the count was already zero.
    pub(crate) fn settle(&self, generation: u64) -> Option<usize> {
        if self.generation.load(Ordering::SeqCst) != generation {
            return None;
        }
        let prev = self
            .outstanding
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .ok()?;
        let count = prev - 1;
        self.set_loading(count > 0);
        Some(count)
    }

    /// Current loading value.
    pub(crate) fn is_loading(&self) -> bool {
        self.loading.load(Ordering::SeqCst)
    }

    /// Subscribes to loading transitions published after this call.
    pub(crate) fn subscribe_loading(&self) -> broadcast::Receiver<bool> {
        self.transitions.subscribe()
    }

    #[cfg(test)]
    pub(crate) fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::SeqCst)
    }

    /// Publishes the flag only when it actually changes.
    fn set_loading(&self, on: bool) {
        if self.loading.swap(on, Ordering::SeqCst) != on {
            let _ = self.transitions.send(on);
        }
    }
}
