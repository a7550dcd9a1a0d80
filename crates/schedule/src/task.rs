//! Task model shared by both schedulers.

use platform::CoreId;

/// Scheduler-local task handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TaskId(pub u32);

impl core::fmt::Display for TaskId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "task{}", self.0)
    }
}

/// Lifecycle of a task.
///
/// ```text
/// Init ──schedule──▶ Queued ──▶ Running ──▶ Completed
///                      │           │
///                   cancel      Reschedule ──▶ Queued
///                      ▼
///                  Cancelled            (free) ──▶ Free
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TaskState {
    /// Registered, never scheduled.
    Init,
    /// Waiting in the scheduler's queue.
    Queued,
    /// Its `run` callback is executing, or it asked to keep running.
    Running,
    /// Finished; may be scheduled again.
    Completed,
    /// Removed from the queue before it ran.
    Cancelled,
    /// Bookkeeping released; only a new `init` brings it back.
    Free,
}

impl TaskState {
    /// `true` while the scheduler still owns the task.
    #[must_use]
    pub const fn is_pending(self) -> bool {
        matches!(self, Self::Queued | Self::Running)
    }
}

impl core::fmt::Display for TaskState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            Self::Init => "init",
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Free => "free",
        })
    }
}

/// What a `run` callback asks for next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TaskReturn {
    /// Done; `complete` is called and the task leaves the queue.
    Completed,
    /// Run again one period later.
    Reschedule,
    /// Still busy. LL keeps the task on its period; EDF leaves it
    /// `Running` until [`EdfScheduler::complete`](crate::EdfScheduler::complete).
    Running,
}

/// Task attribute flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TaskFlags(u32);

impl TaskFlags {
    /// No flags.
    pub const NONE: Self = Self(0);
    /// EDF: background task, runs only when no deadline task is queued.
    pub const IDLE: Self = Self(1 << 0);
    /// LL: run from the deferred (software interrupt) pass, not the tick.
    pub const DEFERRED: Self = Self(1 << 1);

    /// `true` if every flag in `other` is set.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl core::ops::BitOr for TaskFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Registration parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TaskConfig {
    /// Handle, unique per scheduler.
    pub id: TaskId,
    /// Core the task is bound to for its whole life.
    pub core: CoreId,
    /// Lower value runs first.
    pub priority: u32,
    /// Re-run interval: cycles for EDF, ticks for LL.
    pub period: u64,
    /// Attribute flags.
    pub flags: TaskFlags,
}

impl TaskConfig {
    /// Task with priority 0, no period and no flags.
    #[must_use]
    pub const fn new(id: TaskId, core: CoreId) -> Self {
        Self {
            id,
            core,
            priority: 0,
            period: 0,
            flags: TaskFlags::NONE,
        }
    }

    /// Same config with `priority`.
    #[must_use]
    pub const fn with_priority(mut self, priority: u32) -> Self {
        self.priority = priority;
        self
    }

    /// Same config with `period`.
    #[must_use]
    pub const fn with_period(mut self, period: u64) -> Self {
        self.period = period;
        self
    }

    /// Same config with `flags`.
    #[must_use]
    pub const fn with_flags(mut self, flags: TaskFlags) -> Self {
        self.flags = flags;
        self
    }
}

/// What a `run` callback sees.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskContext {
    /// Task being run.
    pub id: TaskId,
    /// Core running it.
    pub core: CoreId,
    /// Cycle count (EDF) or tick number (LL) at dispatch.
    pub now: u64,
}

/// Work executed by a scheduler.
///
/// The scheduler lock is not held while these run, so a task may schedule
/// or cancel other tasks (or itself) on the same scheduler.
pub trait TaskOps: Send {
    /// Do one unit of work.
    fn run(&mut self, cx: &TaskContext) -> TaskReturn;

    /// Called once after `run` returned [`TaskReturn::Completed`].
    fn complete(&mut self, _cx: &TaskContext) {}
}
