//! Event fan-out to user subscribers.
//!
//! Attach subscribers through [`CallController::builder`](crate::CallController::builder)
//! to observe controller lifecycle events (activation, generations, call
//! starts and settles, faults, retries) without touching the data path.

mod set;
mod subscribe;

#[cfg(feature = "logging")]
mod log;

pub use set::SubscriberSet;
pub use subscribe::Subscribe;

#[cfg(feature = "logging")]
pub use log::LogWriter;

pub(crate) use set::spawn_fanout;
