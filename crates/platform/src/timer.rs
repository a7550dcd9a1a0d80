//! LL domain timer and cycle counter contracts.

use crate::cpu::CoreId;

/// Per-core enable of the fixed-period timer that drives the LL tick.
///
/// The LL scheduler enables the timer on a core when its first task is
/// registered and disables it when the last one is removed.
pub trait DomainTimer: Send + Sync {
    /// Start delivering ticks on `core`.
    fn enable(&self, core: CoreId);

    /// Stop delivering ticks on `core`.
    fn disable(&self, core: CoreId);

    /// `true` while `core` receives ticks.
    fn is_enabled(&self, core: CoreId) -> bool;
}

/// Free-running cycle counter, used for run-time accounting.
pub trait CycleClock: Send + Sync {
    /// Current cycle count.
    fn now(&self) -> u64;
}
