//! Runtime system configuration.
//!
//! Compile-time capacities live in [`platform::config`]; this struct holds
//! the policy a board picks at start-up. Build it with the `const fn`
//! builders and check it with [`SystemConfig::validate`] (done by
//! [`System::new`](crate::System::new)).

use platform::config::{IPC_QUEUE_DEPTH, LL_MAX_RUN_CYCLES, LL_TICK_PERIOD_US, MAX_CORES};
use platform::CoreId;

use crate::error::SystemError;

/// Board-level policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SystemConfig {
    /// Cores present on this part (`1..=MAX_CORES`).
    pub cores: usize,
    /// Core that talks to the host and owns bring-up.
    pub primary: CoreId,
    /// LL domain tick period in microseconds.
    pub ll_tick_period_us: u32,
    /// Cycle budget of one LL task run; longer runs are counted as overruns.
    pub ll_max_run_cycles: u64,
    /// Continue a trigger into pipelines past a boundary stop after the
    /// local portion completed. Off: the host triggers them itself.
    pub propagate_across_cores: bool,
    /// Outbound host queue depth (`1..=IPC_QUEUE_DEPTH`).
    pub ipc_queue_depth: usize,
    /// Replace a queued message with the same header instead of queueing
    /// a second copy.
    pub ipc_coalesce: bool,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self::new(1)
    }
}

impl SystemConfig {
    /// Defaults for a part with `cores` cores.
    #[must_use]
    pub const fn new(cores: usize) -> Self {
        Self {
            cores,
            primary: CoreId::PRIMARY,
            ll_tick_period_us: LL_TICK_PERIOD_US,
            ll_max_run_cycles: LL_MAX_RUN_CYCLES,
            propagate_across_cores: false,
            ipc_queue_depth: IPC_QUEUE_DEPTH,
            ipc_coalesce: true,
        }
    }

    /// Same config with a different LL tick period.
    #[must_use]
    pub const fn with_tick_period_us(mut self, us: u32) -> Self {
        self.ll_tick_period_us = us;
        self
    }

    /// Same config with a different LL overrun budget.
    #[must_use]
    pub const fn with_max_run_cycles(mut self, cycles: u64) -> Self {
        self.ll_max_run_cycles = cycles;
        self
    }

    /// Same config with boundary propagation switched on or off.
    #[must_use]
    pub const fn with_propagation(mut self, on: bool) -> Self {
        self.propagate_across_cores = on;
        self
    }

    /// Same config with a different outbound queue depth.
    #[must_use]
    pub const fn with_ipc_queue_depth(mut self, depth: usize) -> Self {
        self.ipc_queue_depth = depth;
        self
    }

    /// Same config with message coalescing switched on or off.
    #[must_use]
    pub const fn with_ipc_coalesce(mut self, on: bool) -> Self {
        self.ipc_coalesce = on;
        self
    }

    /// Ticks between two runs of a pipeline with `period_us`, at least 1.
    #[must_use]
    pub fn ticks_for(&self, period_us: u32) -> u64 {
        u64::from(period_us.checked_div(self.ll_tick_period_us).unwrap_or(1).max(1))
    }

    /// Reject inconsistent settings.
    ///
    /// # Errors
    ///
    /// [`SystemError::InvalidConfig`] naming the offending field.
    pub fn validate(&self) -> Result<(), SystemError> {
        if self.cores == 0 || self.cores > MAX_CORES {
            return Err(SystemError::InvalidConfig("cores"));
        }
        if self.primary.index() >= self.cores {
            return Err(SystemError::InvalidConfig("primary"));
        }
        if self.ll_tick_period_us == 0 {
            return Err(SystemError::InvalidConfig("ll_tick_period_us"));
        }
        if self.ipc_queue_depth == 0 || self.ipc_queue_depth > IPC_QUEUE_DEPTH {
            return Err(SystemError::InvalidConfig("ipc_queue_depth"));
        }
        Ok(())
    }
}
