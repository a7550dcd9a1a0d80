//! Per-core state: schedulers, pipeline tasks and counters.
//!
//! One `CoreContext` exists per powered core. It is created by
//! `System::power_up` and dropped by `System::power_down`; nothing else on
//! the core is global.

use alloc::boxed::Box;
use alloc::sync::Arc;
use core::cell::RefCell;
use core::sync::atomic::{AtomicU32, Ordering};

use audio::PipelineId;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use platform::config::MAX_PIPELINES;
use platform::{CoreId, CycleClock, DomainTimer};
use schedule::{EdfScheduler, LlScheduler, ScheduleError, Schedulers, TaskConfig, TaskOps};

use crate::config::SystemConfig;
use crate::pipeline_task::task_id;

/// Counters of one core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CoreStats {
    /// LL ticks delivered.
    pub ticks: u64,
    /// IDC records handled.
    pub idc_handled: u32,
    /// Pipeline tasks registered.
    pub pipeline_tasks: usize,
    /// Tasks waiting in either scheduler.
    pub queued_tasks: usize,
}

/// Everything one core owns.
pub struct CoreContext {
    core: CoreId,
    schedulers: Schedulers,
    /// Pipelines with a registered LL task on this core.
    tasks: Mutex<CriticalSectionRawMutex, RefCell<heapless::Vec<PipelineId, MAX_PIPELINES>>>,
    idc_handled: AtomicU32,
}

impl CoreContext {
    /// Fresh context with empty schedulers.
    #[must_use]
    pub fn new(
        core: CoreId,
        config: &SystemConfig,
        timer: Arc<dyn DomainTimer>,
        clock: Arc<dyn CycleClock>,
    ) -> Self {
        Self {
            core,
            schedulers: Schedulers {
                edf: Arc::new(EdfScheduler::new(core, clock.clone())),
                ll: Arc::new(LlScheduler::new(core, timer, clock, config.ll_max_run_cycles)),
            },
            tasks: Mutex::new(RefCell::new(heapless::Vec::new())),
            idc_handled: AtomicU32::new(0),
        }
    }

    /// Core id.
    pub fn core(&self) -> CoreId {
        self.core
    }

    /// Both schedulers.
    pub fn schedulers(&self) -> &Schedulers {
        &self.schedulers
    }

    /// EDF scheduler.
    pub fn edf(&self) -> &EdfScheduler {
        &self.schedulers.edf
    }

    /// LL scheduler.
    pub fn ll(&self) -> &LlScheduler {
        &self.schedulers.ll
    }

    /// `true` if `pid` has a task on this core.
    pub fn has_pipeline_task(&self, pid: PipelineId) -> bool {
        self.tasks.lock(|t| t.borrow().contains(&pid))
    }

    /// Register the LL task of `pid`, once.
    ///
    /// # Errors
    ///
    /// Scheduler table full.
    pub fn ensure_pipeline_task(
        &self,
        pid: PipelineId,
        priority: u32,
        period_ticks: u64,
        make: impl FnOnce() -> Box<dyn TaskOps>,
    ) -> Result<(), ScheduleError> {
        if self.has_pipeline_task(pid) {
            return Ok(());
        }
        let cfg = TaskConfig::new(task_id(pid), self.core)
            .with_priority(priority)
            .with_period(period_ticks);
        self.ll().init(cfg, make())?;
        self.tasks.lock(|t| {
            t.borrow_mut()
                .push(pid)
                .map_err(|_| ScheduleError::CapacityExceeded)
        })
    }

    /// Release the LL task of `pid`, if any.
    ///
    /// # Errors
    ///
    /// The task is still queued or running.
    pub fn free_pipeline_task(&self, pid: PipelineId) -> Result<(), ScheduleError> {
        if !self.has_pipeline_task(pid) {
            return Ok(());
        }
        self.ll().free(task_id(pid))?;
        self.tasks.lock(|t| t.borrow_mut().retain(|p| *p != pid));
        Ok(())
    }

    /// `true` while either scheduler has queued or running work.
    pub fn is_busy(&self) -> bool {
        self.ll().num_tasks() > 0 || self.edf().queued() > 0
    }

    pub(crate) fn count_idc(&self, handled: usize) {
        let handled = u32::try_from(handled).unwrap_or(u32::MAX);
        self.idc_handled.fetch_add(handled, Ordering::Relaxed);
    }

    /// Counters snapshot.
    pub fn stats(&self) -> CoreStats {
        CoreStats {
            ticks: self.ll().ticks(),
            idc_handled: self.idc_handled.load(Ordering::Relaxed),
            pipeline_tasks: self.tasks.lock(|t| t.borrow().len()),
            queued_tasks: self.ll().num_tasks().saturating_add(self.edf().queued()),
        }
    }
}
