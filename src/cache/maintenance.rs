//! Operation-count driven expiry sweeps.
//!
//! Instead of a background timer, the store asks the scheduler after each
//! counted operation whether a sweep is due. The counter never resets, so
//! sweeps happen exactly on every `interval`-th operation.

/// Decides when the store should sweep expired entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaintenanceScheduler {
    operation_count: u64,
    /// `0` disables automatic sweeping.
    interval: u64,
}

impl MaintenanceScheduler {
    /// Sweep every `interval` operations. `0` disables automatic sweeps.
    pub fn new(interval: u64) -> Self {
        Self {
            operation_count: 0,
            interval,
        }
    }

    /// A scheduler that never fires.
    pub fn disabled() -> Self {
        Self::new(0)
    }

    /// Count one operation; returns `true` when a sweep is due now.
    pub fn record_operation(&mut self) -> bool {
        self.operation_count = self.operation_count.wrapping_add(1);
        self.interval != 0 && self.operation_count % self.interval == 0
    }

    pub fn operation_count(&self) -> u64 {
        self.operation_count
    }

    pub fn interval(&self) -> u64 {
        self.interval
    }

    pub fn is_enabled(&self) -> bool {
        self.interval != 0
    }
}

impl Default for MaintenanceScheduler {
    fn default() -> Self {
        Self::new(super::store::DEFAULT_SWEEP_INTERVAL)
    }
}
