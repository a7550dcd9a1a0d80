//! Earliest-deadline-first scheduler.
//!
//! Cooperative and inline: `schedule_task` runs every runnable task before
//! it returns, earliest deadline first, FIFO among equal deadlines. A task
//! that schedules another task from its own `run` only queues it; the
//! outer dispatch loop picks it up, so dispatch never recurses.
//!
//! Tasks with a future start stay queued until a later `schedule_task` or
//! [`EdfScheduler::run`] finds the clock past their start.

use alloc::boxed::Box;
use alloc::sync::Arc;
use core::cell::RefCell;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use platform::config::MAX_TASKS;
use platform::{CoreId, CycleClock};

use crate::error::ScheduleError;
use crate::kind::{Scheduler, SchedulerKind};
use crate::task::{TaskConfig, TaskContext, TaskFlags, TaskId, TaskOps, TaskReturn, TaskState};

struct Entry {
    cfg: TaskConfig,
    state: TaskState,
    start: u64,
    deadline: u64,
    runs: u32,
    /// `None` while `run` executes outside the lock.
    ops: Option<Box<dyn TaskOps>>,
}

#[derive(Default)]
struct Queue {
    tasks: heapless::Vec<Entry, MAX_TASKS>,
    /// Deadline tasks, earliest deadline first.
    ready: heapless::Vec<TaskId, MAX_TASKS>,
    /// Idle tasks, FIFO.
    idle: heapless::Vec<TaskId, MAX_TASKS>,
    dispatching: bool,
    deadline_misses: u32,
}

impl Queue {
    fn entry(&self, id: TaskId) -> Option<&Entry> {
        self.tasks.iter().find(|e| e.cfg.id == id)
    }

    fn entry_mut(&mut self, id: TaskId) -> Result<&mut Entry, ScheduleError> {
        self.tasks
            .iter_mut()
            .find(|e| e.cfg.id == id)
            .ok_or(ScheduleError::UnknownTask(id))
    }

    fn enqueue(&mut self, id: TaskId, deadline: u64, idle: bool) -> Result<(), ScheduleError> {
        if idle {
            return self
                .idle
                .push(id)
                .map_err(|_| ScheduleError::CapacityExceeded);
        }
        let tasks = &self.tasks;
        let pos = self
            .ready
            .iter()
            .position(|other| {
                tasks
                    .iter()
                    .find(|e| e.cfg.id == *other)
                    .is_some_and(|e| e.deadline > deadline)
            })
            .unwrap_or(self.ready.len());
        self.ready
            .insert(pos, id)
            .map_err(|_| ScheduleError::CapacityExceeded)
    }

    fn dequeue(&mut self, id: TaskId) {
        self.ready.retain(|t| *t != id);
        self.idle.retain(|t| *t != id);
    }

    /// First runnable task: deadline list first, idle list only when no
    /// deadline task is queued at all.
    fn next_runnable(&self, now: u64) -> Option<TaskId> {
        let runnable = |id: &TaskId| self.entry(*id).is_some_and(|e| e.start <= now);
        if self.ready.is_empty() {
            self.idle.iter().copied().find(runnable)
        } else {
            self.ready.iter().copied().find(runnable)
        }
    }
}

struct Dispatch {
    id: TaskId,
    ops: Box<dyn TaskOps>,
    period: u64,
}

/// Per-core EDF scheduler.
pub struct EdfScheduler {
    core: CoreId,
    clock: Arc<dyn CycleClock>,
    queue: Mutex<CriticalSectionRawMutex, RefCell<Queue>>,
}

impl EdfScheduler {
    /// Empty scheduler for `core`, timed by `clock`.
    #[must_use]
    pub fn new(core: CoreId, clock: Arc<dyn CycleClock>) -> Self {
        Self {
            core,
            clock,
            queue: Mutex::new(RefCell::new(Queue::default())),
        }
    }

    fn with_queue<R>(&self, f: impl FnOnce(&mut Queue) -> R) -> R {
        self.queue.lock(|q| f(&mut q.borrow_mut()))
    }

    /// Register a task. A freed task with the same id is replaced.
    ///
    /// # Errors
    ///
    /// Wrong core, duplicate id, or a full table.
    pub fn init(&self, cfg: TaskConfig, ops: Box<dyn TaskOps>) -> Result<(), ScheduleError> {
        if cfg.core != self.core {
            return Err(ScheduleError::WrongCore {
                task: cfg.id,
                core: cfg.core,
            });
        }
        let entry = Entry {
            cfg,
            state: TaskState::Init,
            start: 0,
            deadline: 0,
            runs: 0,
            ops: Some(ops),
        };
        self.with_queue(|q| {
            match q.tasks.iter().position(|e| e.cfg.id == cfg.id) {
                Some(pos) if q.tasks.get(pos).is_some_and(|e| e.state == TaskState::Free) => {
                    q.tasks.swap_remove(pos);
                }
                Some(_) => return Err(ScheduleError::DuplicateTask(cfg.id)),
                None => {}
            }
            if q.tasks.is_full() {
                if let Some(pos) = q.tasks.iter().position(|e| e.state == TaskState::Free) {
                    q.tasks.swap_remove(pos);
                }
            }
            q.tasks
                .push(entry)
                .map_err(|_| ScheduleError::CapacityExceeded)
        })
    }

    /// Queue `id` to run now with an absolute `deadline`, then dispatch.
    ///
    /// Scheduling a task that is already queued or running is a no-op.
    ///
    /// # Errors
    ///
    /// Unknown or freed task.
    pub fn schedule_task(&self, id: TaskId, deadline: u64) -> Result<(), ScheduleError> {
        let now = self.clock.now();
        self.schedule_at(id, now, deadline)
    }

    /// Queue `id` to become runnable at cycle `start`, then dispatch.
    ///
    /// # Errors
    ///
    /// Unknown or freed task.
    pub fn schedule_at(&self, id: TaskId, start: u64, deadline: u64) -> Result<(), ScheduleError> {
        let queued = self.with_queue(|q| {
            let entry = q.entry_mut(id)?;
            match entry.state {
                TaskState::Free => return Err(ScheduleError::Freed(id)),
                TaskState::Queued | TaskState::Running => {
                    platform::trace!("{} already {}", id, entry.state);
                    return Ok(false);
                }
                _ => {}
            }
            entry.start = start;
            entry.deadline = deadline;
            entry.state = TaskState::Queued;
            let idle = entry.cfg.flags.contains(TaskFlags::IDLE);
            q.enqueue(id, deadline, idle)?;
            Ok(true)
        })?;
        if queued {
            self.run();
        }
        Ok(())
    }

    /// Run every runnable task, earliest deadline first.
    ///
    /// Returns at once when called from inside a task's `run`.
    pub fn run(&self) {
        let entered = self.with_queue(|q| !core::mem::replace(&mut q.dispatching, true));
        if !entered {
            return;
        }
        while let Some(Dispatch { id, mut ops, period }) = self.pick() {
            let cx = TaskContext {
                id,
                core: self.core,
                now: self.clock.now(),
            };
            let mut ret = ops.run(&cx);
            if ret == TaskReturn::Reschedule && period == 0 {
                ret = TaskReturn::Completed;
            }
            if ret == TaskReturn::Completed {
                ops.complete(&cx);
            }
            self.finish(id, ops, ret, period);
        }
        self.with_queue(|q| q.dispatching = false);
    }

    fn pick(&self) -> Option<Dispatch> {
        let now = self.clock.now();
        self.with_queue(|q| {
            let id = q.next_runnable(now)?;
            q.dequeue(id);
            let entry = q.entry_mut(id).ok()?;
            let ops = entry.ops.take()?;
            entry.state = TaskState::Running;
            entry.runs = entry.runs.saturating_add(1);
            let period = entry.cfg.period;
            let missed = now > entry.deadline && !entry.cfg.flags.contains(TaskFlags::IDLE);
            if missed {
                platform::warn!("{} missed its deadline by {} cycles", id, now.saturating_sub(entry.deadline));
                q.deadline_misses = q.deadline_misses.saturating_add(1);
            }
            Some(Dispatch { id, ops, period })
        })
    }

    fn finish(&self, id: TaskId, ops: Box<dyn TaskOps>, ret: TaskReturn, period: u64) {
        let now = self.clock.now();
        self.with_queue(|q| {
            let Ok(entry) = q.entry_mut(id) else {
                return;
            };
            entry.ops = Some(ops);
            match ret {
                TaskReturn::Completed => entry.state = TaskState::Completed,
                TaskReturn::Running => {}
                TaskReturn::Reschedule => {
                    let window = entry.deadline.saturating_sub(entry.start);
                    let mut start = entry.start.saturating_add(period);
                    if start <= now {
                        start = now.saturating_add(period);
                    }
                    entry.start = start;
                    entry.deadline = start.saturating_add(window);
                    entry.state = TaskState::Queued;
                    let (deadline, idle) = (entry.deadline, entry.cfg.flags.contains(TaskFlags::IDLE));
                    if q.enqueue(id, deadline, idle).is_err() {
                        if let Ok(entry) = q.entry_mut(id) {
                            entry.state = TaskState::Completed;
                        }
                    }
                }
            }
        });
    }

    /// Finish a task that returned [`TaskReturn::Running`].
    ///
    /// # Errors
    ///
    /// Unknown task.
    pub fn complete(&self, id: TaskId) -> Result<(), ScheduleError> {
        let ops = self.with_queue(|q| {
            let entry = q.entry_mut(id)?;
            if entry.state != TaskState::Running {
                return Ok(None);
            }
            Ok(entry.ops.take())
        })?;
        let Some(mut ops) = ops else {
            return Ok(());
        };
        ops.complete(&TaskContext {
            id,
            core: self.core,
            now: self.clock.now(),
        });
        self.with_queue(|q| {
            let entry = q.entry_mut(id)?;
            entry.ops = Some(ops);
            entry.state = TaskState::Completed;
            Ok(())
        })
    }

    /// Remove a queued task without running it.
    ///
    /// # Errors
    ///
    /// [`ScheduleError::Running`] while its callback executes.
    pub fn cancel(&self, id: TaskId) -> Result<(), ScheduleError> {
        self.with_queue(|q| {
            let entry = q.entry_mut(id)?;
            match entry.state {
                TaskState::Queued => {
                    entry.state = TaskState::Cancelled;
                    q.dequeue(id);
                    Ok(())
                }
                TaskState::Running => Err(ScheduleError::Running(id)),
                _ => Ok(()),
            }
        })
    }

    /// Release a task's bookkeeping and drop its work.
    ///
    /// # Errors
    ///
    /// The task must not be queued or running.
    pub fn free(&self, id: TaskId) -> Result<(), ScheduleError> {
        let ops = self.with_queue(|q| {
            let entry = q.entry_mut(id)?;
            match entry.state {
                TaskState::Queued => Err(ScheduleError::Queued(id)),
                TaskState::Running => Err(ScheduleError::Running(id)),
                _ => {
                    entry.state = TaskState::Free;
                    Ok(entry.ops.take())
                }
            }
        })?;
        drop(ops);
        Ok(())
    }

    /// Current state of a task.
    pub fn state(&self, id: TaskId) -> Option<TaskState> {
        self.with_queue(|q| q.entry(id).map(|e| e.state))
    }

    /// Absolute deadline of a task.
    pub fn deadline(&self, id: TaskId) -> Option<u64> {
        self.with_queue(|q| q.entry(id).map(|e| e.deadline))
    }

    /// Times a task has been dispatched.
    pub fn runs(&self, id: TaskId) -> Option<u32> {
        self.with_queue(|q| q.entry(id).map(|e| e.runs))
    }

    /// Tasks waiting in either list.
    pub fn queued(&self) -> usize {
        self.with_queue(|q| q.ready.len().saturating_add(q.idle.len()))
    }

    /// Tasks dispatched after their deadline.
    pub fn deadline_misses(&self) -> u32 {
        self.with_queue(|q| q.deadline_misses)
    }

    /// Core this scheduler runs on.
    pub fn core(&self) -> CoreId {
        self.core
    }
}

impl Scheduler for EdfScheduler {
    fn kind(&self) -> SchedulerKind {
        SchedulerKind::Edf
    }

    /// `start == 0` means now; the deadline is `start + period`.
    fn schedule(&self, id: TaskId, start: u64, period: u64) -> Result<(), ScheduleError> {
        let start = if start == 0 { self.clock.now() } else { start };
        self.schedule_at(id, start, start.saturating_add(period))
    }

    fn reschedule(&self, id: TaskId, start: u64) -> Result<(), ScheduleError> {
        self.with_queue(|q| {
            let entry = q.entry_mut(id)?;
            if entry.state == TaskState::Queued {
                let window = entry.deadline.saturating_sub(entry.start);
                entry.start = start;
                entry.deadline = start.saturating_add(window);
            }
            Ok(())
        })
    }

    fn cancel(&self, id: TaskId) -> Result<(), ScheduleError> {
        EdfScheduler::cancel(self, id)
    }

    fn free(&self, id: TaskId) -> Result<(), ScheduleError> {
        EdfScheduler::free(self, id)
    }

    fn state(&self, id: TaskId) -> Option<TaskState> {
        EdfScheduler::state(self, id)
    }
}
