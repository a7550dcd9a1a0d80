//! Common interface over the two schedulers.

use alloc::sync::Arc;

use crate::edf::EdfScheduler;
use crate::error::ScheduleError;
use crate::ll::LlScheduler;
use crate::task::{TaskId, TaskState};

/// Which scheduler a task belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SchedulerKind {
    /// Deadline-ordered, runs inline.
    Edf,
    /// Timer-tick driven.
    LowLatency,
}

impl core::fmt::Display for SchedulerKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            Self::Edf => "edf",
            Self::LowLatency => "ll",
        })
    }
}

/// Operations both schedulers support.
///
/// `start` and `period` are scheduler units: cycles for EDF, ticks for LL.
pub trait Scheduler: Send + Sync {
    /// Which scheduler this is.
    fn kind(&self) -> SchedulerKind;

    /// Queue a task.
    fn schedule(&self, id: TaskId, start: u64, period: u64) -> Result<(), ScheduleError>;

    /// Move the next run of a queued task.
    fn reschedule(&self, id: TaskId, start: u64) -> Result<(), ScheduleError>;

    /// Remove a queued task.
    fn cancel(&self, id: TaskId) -> Result<(), ScheduleError>;

    /// Release a task that is neither queued nor running.
    fn free(&self, id: TaskId) -> Result<(), ScheduleError>;

    /// Current state of a task.
    fn state(&self, id: TaskId) -> Option<TaskState>;
}

/// The schedulers of one core.
#[derive(Clone)]
pub struct Schedulers {
    /// Deadline scheduler.
    pub edf: Arc<EdfScheduler>,
    /// Low-latency scheduler.
    pub ll: Arc<LlScheduler>,
}

impl Schedulers {
    /// Scheduler of the given kind.
    pub fn get(&self, kind: SchedulerKind) -> &dyn Scheduler {
        match kind {
            SchedulerKind::Edf => &*self.edf,
            SchedulerKind::LowLatency => &*self.ll,
        }
    }
}
