//! # LogWriter — simple event printer.
//!
//! A minimal subscriber that prints incoming [`Event`]s to stdout. Use it
//! for tests or demos.
//!
//! ## Example output
//! ```text
//! [activated]
//! [generation-started] generation=1
//! [call-started] generation=1 outstanding=1
//! [call-failed] generation=1 outstanding=0 err="rate limited"
//! [retry-requested]
//! [deactivated]
//! ```

use async_trait::async_trait;

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Event printer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Constructs a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        match e.kind {
            EventKind::Activated => {
                println!("[activated]");
            }
            EventKind::Deactivated => {
                println!("[deactivated]");
            }
            EventKind::GenerationStarted => {
                println!("[generation-started] generation={:?}", e.generation);
            }
            EventKind::GenerationDrained => {
                println!("[generation-drained] generation={:?}", e.generation);
            }
            EventKind::CallStarted => {
                println!(
                    "[call-started] generation={:?} outstanding={:?}",
                    e.generation, e.outstanding
                );
            }
            EventKind::CallSucceeded => {
                println!(
                    "[call-succeeded] generation={:?} outstanding={:?}",
                    e.generation, e.outstanding
                );
            }
            EventKind::CallFailed => {
                println!(
                    "[call-failed] generation={:?} outstanding={:?} err={:?}",
                    e.generation, e.outstanding, e.detail
                );
            }
            EventKind::FaultReported => {
                println!(
                    "[fault-reported] generation={:?} err={:?}",
                    e.generation, e.detail
                );
            }
            EventKind::RetryRequested => {
                println!("[retry-requested]");
            }
            EventKind::SubscriberOverflow => {
                println!(
                    "[subscriber-overflow] {}",
                    e.detail.as_deref().unwrap_or("unknown")
                );
            }
            EventKind::SubscriberPanicked => {
                println!(
                    "[subscriber-panicked] {}",
                    e.detail.as_deref().unwrap_or("unknown")
                );
            }
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
