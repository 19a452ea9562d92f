//! Controller configuration.
//!
//! Capacities for the three broadcast channels a controller owns. All are
//! ring buffers: a subscriber that falls more than `capacity` items behind
//! skips the oldest items (see `tokio::sync::broadcast` lag semantics).

/// Channel capacities for one live-call controller.
///
/// Values are clamped to a minimum of 1 where they are used.
#[derive(Clone, Copy, Debug)]
pub struct ControllerConfig {
    /// Ring capacity of the results channel.
    ///
    /// Late subscribers replay only the latest settled value, so this only
    /// needs to absorb bursts between polls of live subscribers.
    pub results_capacity: usize,
    /// Ring capacity of the errors channel.
    pub errors_capacity: usize,
    /// Ring capacity of the internal event bus.
    pub events_capacity: usize,
}

impl Default for ControllerConfig {
    /// Returns `results_capacity = 64`, `errors_capacity = 64`,
    /// `events_capacity = 128`.
    fn default() -> Self {
        Self {
            results_capacity: 64,
            errors_capacity: 64,
            events_capacity: 128,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = ControllerConfig::default();
        assert_eq!(cfg.results_capacity, 64);
        assert_eq!(cfg.errors_capacity, 64);
        assert_eq!(cfg.events_capacity, 128);
    }
}
