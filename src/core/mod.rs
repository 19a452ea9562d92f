//! The live-call controller: gauge, activation, hooks, driver and wiring.

mod activation;
mod controller;
mod driver;
mod gauge;
mod hooks;

pub use controller::{Builder, CallController};
pub use hooks::CallHooks;
