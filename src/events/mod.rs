//! Internal observability events.
//!
//! The controller publishes its lifecycle — activation, generations, call
//! starts and settles, faults, retries — on a [`Bus`]. Nothing in the core
//! depends on anyone listening: publishing is fire-and-forget, and the bus
//! only matters when subscribers (see [`crate::subscribers`]) are attached.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
