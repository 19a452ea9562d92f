//! # callstream
//!
//! **callstream** is a lightweight live-call stream orchestration library
//! for Rust.
//!
//! It wraps a caller-supplied, possibly-infinite producer of asynchronous
//! operations and exposes four coordinated facets: a result sequence, an
//! error sequence, a deduplicated in-flight indicator, and a manual
//! re-execution trigger. The crate performs no I/O itself — it instruments
//! and multiplexes the asynchronous calls its initializers make.
//!
//! ## Architecture
//! ```text
//!   initializer(CallHooks) ──► raw result stream          (your code)
//!        │        ▲
//!        │        │ re-invoked per generation (first subscription,
//!        │        │ every retry(), every re-activation)
//!        ▼        │
//! ┌──────────────────────────────────────────────────────────────┐
//! │  CallController                                              │
//! │  - CallGauge (outstanding-call counter → loading watch)      │
//! │  - generation driver (select over retry/activation/stream)   │
//! │  - broadcast channels (results + latest value, errors)       │
//! │  - Bus (observability events) ──► SubscriberSet ──► workers  │
//! └──────┬───────────┬───────────┬───────────┬───────────────────┘
//!        ▼           ▼           ▼           ▼
//!    results()    errors()    loading()   retry()
//!        └───────────┴─── LiveStream<T> ──┴───────┘
//!                          │
//!        map_results / map_errors derive new bundles,
//!        delegating the untouched facets to the origin
//! ```
//!
//! ## Semantics
//! | Concern      | Behavior                                                          |
//! |--------------|-------------------------------------------------------------------|
//! | results      | multicast, latest-value replay to late subscribers                |
//! | errors       | live only, never replayed, never completes on its own             |
//! | loading      | `outstanding calls > 0`, emitted only on change                   |
//! | retry        | replaces the whole generation; in-flight calls are dropped and    |
//! |              | the counter reset, for every subscriber, without resubscribing    |
//! | activation   | lazy: the initializer runs while >= 1 facet stream is alive       |
//! | call failure | absorbed: fault goes to `errors`, `results` keeps going           |
//! | stage failure| not absorbed: a combinator stage that fails kills that facet      |
//!
//! ## Optional features
//! - `logging`: exports a simple built-in [`LogWriter`] subscriber
//!   _(demo/reference only)_.
//!
//! ## Example
//! ```rust
//! use callstream::{map_results, CallController, Fault};
//! use futures::StreamExt;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     // The initializer wraps its async calls through the injected hooks;
//!     // wrapped failures land on the errors facet instead of killing the
//!     // result stream.
//!     let repos = CallController::spawn(|hooks| {
//!         hooks.call(async {
//!             // ... issue the search request here ...
//!             Ok::<_, Fault>(vec!["tokio", "futures"])
//!         })
//!     });
//!
//!     // Derive a facet without touching loading/retry.
//!     let counts = map_results(&repos, |results| {
//!         results.map(|names| names.len()).boxed()
//!     });
//!
//!     let mut sizes = counts.results();
//!     assert_eq!(sizes.next().await, Some(2));
//!
//!     // Re-runs the initializer; already-attached subscribers keep
//!     // receiving from the fresh generation.
//!     counts.retry();
//!     assert_eq!(sizes.next().await, Some(2));
//! }
//! ```

mod combinators;
mod config;
mod core;
mod error;
mod events;
mod stream;
mod subscribers;

// ---- Public re-exports ----

pub use combinators::{map_errors, map_results};
pub use config::ControllerConfig;
pub use crate::core::{Builder, CallController, CallHooks};
pub use error::Fault;
pub use events::{Bus, Event, EventKind};
pub use stream::{FacetStream, LiveStream};
pub use subscribers::{Subscribe, SubscriberSet};

// Optional: a simple built-in logger subscriber (demo/reference).
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
