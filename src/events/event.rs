//! # Events emitted by the live-call controller.
//!
//! [`EventKind`] classifies what happened; [`Event`] carries the metadata
//! (generation, outstanding-call count, free-form detail).
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases
//! monotonically across all controllers in the process. Use `seq` to restore
//! exact order when events are observed out of band.
//!
//! ## Example
//! ```rust
//! use callstream::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::CallFailed)
//!     .with_generation(2)
//!     .with_outstanding(0)
//!     .with_detail("boom");
//!
//! assert_eq!(ev.kind, EventKind::CallFailed);
//! assert_eq!(ev.generation, Some(2));
//! assert_eq!(ev.detail.as_deref(), Some("boom"));
//! ```

use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::SystemTime;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of controller events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Activation ===
    /// First facet subscriber attached; the controller will run a generation.
    ///
    /// Sets: `at`, `seq`.
    Activated,

    /// Last facet subscriber detached; the current generation was dropped.
    ///
    /// Sets: `at`, `seq`.
    Deactivated,

    // === Generations ===
    /// The initializer was (re)invoked and a generation started.
    ///
    /// Sets: `generation`, `at`, `seq`.
    GenerationStarted,

    /// The generation's result stream ended on its own.
    ///
    /// The controller stays live: a later `retry()` starts a fresh
    /// generation.
    ///
    /// Sets: `generation`, `at`, `seq`.
    GenerationDrained,

    // === Wrapped calls ===
    /// A wrapped call began; the outstanding-call counter went up.
    ///
    /// Sets: `generation`, `outstanding`, `at`, `seq`.
    CallStarted,

    /// A wrapped call settled successfully.
    ///
    /// Sets: `generation`, `outstanding`, `at`, `seq`.
    CallSucceeded,

    /// A wrapped call settled with a failure; the fault went to the errors
    /// facet and the call was absorbed.
    ///
    /// Sets: `generation`, `outstanding`, `detail` (fault message), `at`,
    /// `seq`.
    CallFailed,

    /// A collaborator pushed a fault through the report hook (no counter
    /// effect).
    ///
    /// Sets: `generation`, `detail` (fault message), `at`, `seq`.
    FaultReported,

    // === Retry ===
    /// `retry()` fired; the current generation will be replaced.
    ///
    /// Sets: `at`, `seq`.
    RetryRequested,

    // === Subscriber delivery ===
    /// An event subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets: `detail` (subscriber and reason), `at`, `seq`.
    SubscriberOverflow,

    /// An event subscriber panicked while handling an event.
    ///
    /// Sets: `detail` (subscriber and panic info), `at`, `seq`.
    SubscriberPanicked,
}

/// Controller event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,
    /// Generation the event belongs to, if applicable.
    pub generation: Option<u64>,
    /// Outstanding-call count right after the event, if applicable.
    pub outstanding: Option<usize>,
    /// Human-readable detail (fault messages, overflow reasons, panic info).
    pub detail: Option<Arc<str>>,
}

impl Event {
    /// Creates a new event of the given kind with the current timestamp and
    /// the next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            generation: None,
            outstanding: None,
            detail: None,
        }
    }

    /// Attaches the generation number.
    #[inline]
    pub fn with_generation(mut self, generation: u64) -> Self {
        self.generation = Some(generation);
        self
    }

    /// Attaches the outstanding-call count.
    #[inline]
    pub fn with_outstanding(mut self, outstanding: usize) -> Self {
        self.outstanding = Some(outstanding);
        self
    }

    /// Attaches a human-readable detail.
    #[inline]
    pub fn with_detail(mut self, detail: impl Into<Arc<str>>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_detail(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_detail(format!("subscriber={subscriber} panic={info}"))
    }

    #[inline]
    pub fn is_subscriber_overflow(&self) -> bool {
        matches!(self.kind, EventKind::SubscriberOverflow)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seq_is_monotonic() {
        let a = Event::new(EventKind::Activated);
        let b = Event::new(EventKind::Activated);
        let c = Event::new(EventKind::Deactivated);
        assert!(a.seq < b.seq, "seq must increase: {} vs {}", a.seq, b.seq);
        assert!(b.seq < c.seq, "seq must increase: {} vs {}", b.seq, c.seq);
    }

    #[test]
    fn test_builders_attach_fields() {
        let ev = Event::new(EventKind::CallStarted)
            .with_generation(7)
            .with_outstanding(3)
            .with_detail("d");
        assert_eq!(ev.generation, Some(7));
        assert_eq!(ev.outstanding, Some(3));
        assert_eq!(ev.detail.as_deref(), Some("d"));
    }

    #[test]
    fn test_overflow_helper_marks_kind() {
        let ev = Event::subscriber_overflow("metrics", "full");
        assert!(ev.is_subscriber_overflow());
        assert!(ev.detail.as_deref().unwrap_or("").contains("metrics"));
    }
}
