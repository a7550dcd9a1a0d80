use platform::errno::{reply, EACCES, EBUSY, EINVAL, ENODEV, ENOMEM};
use platform::CoreId;

use crate::task::TaskId;

/// Scheduler errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ScheduleError {
    /// No task with this id.
    UnknownTask(TaskId),
    /// The id is already registered.
    DuplicateTask(TaskId),
    /// The task table is full.
    CapacityExceeded,
    /// The task's `run` callback is executing.
    Running(TaskId),
    /// The task is still queued; cancel it first.
    Queued(TaskId),
    /// The task is bound to another core.
    WrongCore {
        /// Task.
        task: TaskId,
        /// Core the task is bound to.
        core: CoreId,
    },
    /// The task was freed and must be registered again.
    Freed(TaskId),
}

impl ScheduleError {
    /// Negative errno for the host reply.
    #[must_use]
    pub const fn errno(self) -> i32 {
        match self {
            Self::UnknownTask(_) => reply(ENODEV),
            Self::DuplicateTask(_) | Self::Freed(_) => reply(EINVAL),
            Self::CapacityExceeded => reply(ENOMEM),
            Self::Running(_) | Self::Queued(_) => reply(EBUSY),
            Self::WrongCore { .. } => reply(EACCES),
        }
    }
}

impl core::fmt::Display for ScheduleError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::UnknownTask(id) => write!(f, "unknown {id}"),
            Self::DuplicateTask(id) => write!(f, "{id} already registered"),
            Self::CapacityExceeded => f.write_str("task table full"),
            Self::Running(id) => write!(f, "{id} is running"),
            Self::Queued(id) => write!(f, "{id} is still queued"),
            Self::WrongCore { task, core } => write!(f, "{task} is bound to {core}"),
            Self::Freed(id) => write!(f, "{id} was freed"),
        }
    }
}
