//! Low-latency scheduler.
//!
//! One fixed-period timer drives [`LlScheduler::tick`] on each core. Every
//! tick runs the due tasks in priority order, FIFO among equal priorities,
//! each at most once. Tasks flagged [`TaskFlags::DEFERRED`] are only
//! collected by the tick and run later from [`LlScheduler::run_deferred`].
//!
//! The domain timer is enabled when the first task is queued and disabled
//! when the last one leaves the queue.

use alloc::boxed::Box;
use alloc::sync::Arc;
use core::cell::RefCell;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use platform::config::MAX_TASKS;
use platform::{CoreId, CycleClock, DomainTimer};

use crate::error::ScheduleError;
use crate::kind::{Scheduler, SchedulerKind};
use crate::task::{TaskConfig, TaskContext, TaskFlags, TaskId, TaskOps, TaskReturn, TaskState};

/// Run-time accounting for one LL task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LlTaskStats {
    /// Completed `run` calls.
    pub runs: u32,
    /// Cycles spent in the last `run`.
    pub last_run_cycles: u64,
    /// Worst `run` so far.
    pub max_run_cycles: u64,
    /// Runs that exceeded the per-task cycle budget.
    pub overruns: u32,
}

/// What one tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TickReport {
    /// Tick number after the increment.
    pub tick: u64,
    /// Tasks run inline.
    pub ran: u32,
    /// Tasks handed to the deferred pass.
    pub deferred: u32,
}

struct Entry {
    cfg: TaskConfig,
    state: TaskState,
    next_run: u64,
    stats: LlTaskStats,
    ops: Option<Box<dyn TaskOps>>,
}

#[derive(Default)]
struct Domain {
    /// Run order: priority, then the order tasks were registered in.
    tasks: heapless::Vec<Entry, MAX_TASKS>,
    deferred: heapless::Vec<TaskId, MAX_TASKS>,
    ticks: u64,
    queued: usize,
}

impl Domain {
    fn entry(&self, id: TaskId) -> Option<&Entry> {
        self.tasks.iter().find(|e| e.cfg.id == id)
    }

    fn entry_mut(&mut self, id: TaskId) -> Result<&mut Entry, ScheduleError> {
        self.tasks
            .iter_mut()
            .find(|e| e.cfg.id == id)
            .ok_or(ScheduleError::UnknownTask(id))
    }

    /// Slot for a new task: behind every task of equal or higher priority.
    fn slot_for(&self, priority: u32) -> usize {
        self.tasks
            .iter()
            .rposition(|e| e.cfg.priority <= priority)
            .map_or(0, |p| p.saturating_add(1))
    }

    /// Drop a task from the queue count; `true` when it was the last one.
    fn leave(&mut self) -> bool {
        self.queued = self.queued.saturating_sub(1);
        self.queued == 0
    }
}

enum Timer {
    Keep,
    Enable,
    Disable,
}

/// Per-core LL scheduler.
pub struct LlScheduler {
    core: CoreId,
    timer: Arc<dyn DomainTimer>,
    clock: Arc<dyn CycleClock>,
    max_run_cycles: u64,
    domain: Mutex<CriticalSectionRawMutex, RefCell<Domain>>,
}

impl LlScheduler {
    /// Empty scheduler for `core`. Runs longer than `max_run_cycles`
    /// count as overruns.
    #[must_use]
    pub fn new(
        core: CoreId,
        timer: Arc<dyn DomainTimer>,
        clock: Arc<dyn CycleClock>,
        max_run_cycles: u64,
    ) -> Self {
        Self {
            core,
            timer,
            clock,
            max_run_cycles,
            domain: Mutex::new(RefCell::new(Domain::default())),
        }
    }

    fn with_domain<R>(&self, f: impl FnOnce(&mut Domain) -> R) -> R {
        self.domain.lock(|d| f(&mut d.borrow_mut()))
    }

    fn apply(&self, timer: Timer) {
        match timer {
            Timer::Keep => {}
            Timer::Enable => {
                platform::debug!("ll timer on {}", self.core);
                self.timer.enable(self.core);
            }
            Timer::Disable => {
                platform::debug!("ll timer off {}", self.core);
                self.timer.disable(self.core);
            }
        }
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
        self.with_domain(|d| {
            match d.tasks.iter().position(|e| e.cfg.id == cfg.id) {
                Some(pos) if d.tasks.get(pos).is_some_and(|e| e.state == TaskState::Free) => {
                    d.tasks.remove(pos);
                }
                Some(_) => return Err(ScheduleError::DuplicateTask(cfg.id)),
                None => {}
            }
            if d.tasks.is_full() {
                if let Some(pos) = d.tasks.iter().position(|e| e.state == TaskState::Free) {
                    d.tasks.remove(pos);
                }
            }
            let at = d.slot_for(cfg.priority);
            d.tasks
                .insert(
                    at,
                    Entry {
                        cfg,
                        state: TaskState::Init,
                        next_run: 0,
                        stats: LlTaskStats::default(),
                        ops: Some(ops),
                    },
                )
                .map_err(|_| ScheduleError::CapacityExceeded)
        })
    }

    /// Queue `id` to first run `delay` ticks from now and every `period`
    /// ticks after that. `period == 0` keeps the registered period.
    ///
    /// Scheduling a task that is already queued keeps its original start.
    /// The run order among equal priorities stays the registration order.
    ///
    /// # Errors
    ///
    /// Unknown or freed task.
    pub fn schedule_task(&self, id: TaskId, delay: u64, period: u64) -> Result<(), ScheduleError> {
        let timer = self.with_domain(|d| {
            let ticks = d.ticks;
            let entry = d.entry_mut(id)?;
            match entry.state {
                TaskState::Free => return Err(ScheduleError::Freed(id)),
                TaskState::Queued | TaskState::Running => return Ok(Timer::Keep),
                _ => {}
            }
            if period > 0 {
                entry.cfg.period = period;
            }
            entry.next_run = ticks.saturating_add(delay);
            entry.state = TaskState::Queued;
            d.queued = d.queued.saturating_add(1);
            Ok(if d.queued == 1 { Timer::Enable } else { Timer::Keep })
        })?;
        self.apply(timer);
        Ok(())
    }

    /// Move the next run of a queued task to `delay` ticks from now,
    /// keeping its place in the run order.
    ///
    /// # Errors
    ///
    /// Unknown task.
    pub fn reschedule_task(&self, id: TaskId, delay: u64) -> Result<(), ScheduleError> {
        self.with_domain(|d| {
            let ticks = d.ticks;
            let entry = d.entry_mut(id)?;
            if entry.state.is_pending() {
                entry.next_run = ticks.saturating_add(delay);
            }
            Ok(())
        })
    }

    /// Advance the domain by one tick and run every due task once.
    pub fn tick(&self) -> TickReport {
        let (tick, due, deferred) = self.with_domain(|d| {
            d.ticks = d.ticks.saturating_add(1);
            let ticks = d.ticks;
            let mut due: heapless::Vec<TaskId, MAX_TASKS> = heapless::Vec::new();
            let mut handed: heapless::Vec<TaskId, MAX_TASKS> = heapless::Vec::new();
            for entry in d.tasks.iter_mut() {
                if entry.state != TaskState::Queued || entry.next_run > ticks {
                    continue;
                }
                if entry.cfg.flags.contains(TaskFlags::DEFERRED) {
                    entry.next_run = ticks.saturating_add(entry.cfg.period.max(1));
                    let _ = handed.push(entry.cfg.id);
                } else {
                    let _ = due.push(entry.cfg.id);
                }
            }
            let mut deferred = 0u32;
            for id in &handed {
                if !d.deferred.contains(id) && d.deferred.push(*id).is_ok() {
                    deferred = deferred.saturating_add(1);
                }
            }
            (ticks, due, deferred)
        });
        let mut ran = 0u32;
        for id in due {
            if self.run_one(id, tick) {
                ran = ran.saturating_add(1);
            }
        }
        TickReport { tick, ran, deferred }
    }

    /// Run the tasks the last ticks handed to the deferred pass.
    pub fn run_deferred(&self) -> u32 {
        let (tick, pending) = self.with_domain(|d| (d.ticks, core::mem::take(&mut d.deferred)));
        let mut ran = 0u32;
        for id in pending {
            if self.run_one(id, tick) {
                ran = ran.saturating_add(1);
            }
        }
        ran
    }

    fn run_one(&self, id: TaskId, tick: u64) -> bool {
        let ops = self.with_domain(|d| {
            let entry = d.entry_mut(id).ok()?;
            if entry.state != TaskState::Queued {
                return None;
            }
            let ops = entry.ops.take()?;
            entry.state = TaskState::Running;
            Some(ops)
        });
        let Some(mut ops) = ops else {
            return false;
        };

        let cx = TaskContext {
            id,
            core: self.core,
            now: tick,
        };
        let t0 = self.clock.now();
        let ret = ops.run(&cx);
        let cycles = self.clock.now().saturating_sub(t0);
        if ret == TaskReturn::Completed {
            ops.complete(&cx);
        }

        let timer = self.with_domain(|d| {
            let ticks = d.ticks;
            let Ok(entry) = d.entry_mut(id) else {
                return Timer::Keep;
            };
            entry.ops = Some(ops);
            entry.stats.runs = entry.stats.runs.saturating_add(1);
            entry.stats.last_run_cycles = cycles;
            entry.stats.max_run_cycles = entry.stats.max_run_cycles.max(cycles);
            if cycles > self.max_run_cycles {
                entry.stats.overruns = entry.stats.overruns.saturating_add(1);
                platform::warn!("{} overran: {} cycles, budget {}", id, cycles, self.max_run_cycles);
            }
            if ret == TaskReturn::Completed {
                entry.state = TaskState::Completed;
                return if d.leave() { Timer::Disable } else { Timer::Keep };
            }
            entry.state = TaskState::Queued;
            if entry.next_run <= ticks {
                entry.next_run = ticks.saturating_add(entry.cfg.period.max(1));
            }
            Timer::Keep
        });
        self.apply(timer);
        true
    }

    /// Remove a queued task.
    ///
    /// # Errors
    ///
    /// [`ScheduleError::Running`] while its callback executes.
    pub fn cancel(&self, id: TaskId) -> Result<(), ScheduleError> {
        let timer = self.with_domain(|d| {
            let entry = d.entry_mut(id)?;
            match entry.state {
                TaskState::Queued => {
                    entry.state = TaskState::Cancelled;
                    d.deferred.retain(|t| *t != id);
                    Ok(if d.leave() { Timer::Disable } else { Timer::Keep })
                }
                TaskState::Running => Err(ScheduleError::Running(id)),
                _ => Ok(Timer::Keep),
            }
        })?;
        self.apply(timer);
        Ok(())
    }

    /// Release a task's bookkeeping and drop its work.
    ///
    /// # Errors
    ///
    /// The task must not be queued or running.
    pub fn free(&self, id: TaskId) -> Result<(), ScheduleError> {
        let ops = self.with_domain(|d| {
            let entry = d.entry_mut(id)?;
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
        self.with_domain(|d| d.entry(id).map(|e| e.state))
    }

    /// Run-time accounting of a task.
    pub fn stats(&self, id: TaskId) -> Option<LlTaskStats> {
        self.with_domain(|d| d.entry(id).map(|e| e.stats))
    }

    /// Tasks currently queued (the timer runs while this is non-zero).
    pub fn num_tasks(&self) -> usize {
        self.with_domain(|d| d.queued)
    }

    /// Ticks delivered so far.
    pub fn ticks(&self) -> u64 {
        self.with_domain(|d| d.ticks)
    }

    /// Core this scheduler runs on.
    pub fn core(&self) -> CoreId {
        self.core
    }
}

impl Scheduler for LlScheduler {
    fn kind(&self) -> SchedulerKind {
        SchedulerKind::LowLatency
    }

    /// `start` is a delay in ticks.
    fn schedule(&self, id: TaskId, start: u64, period: u64) -> Result<(), ScheduleError> {
        self.schedule_task(id, start, period)
    }

    fn reschedule(&self, id: TaskId, start: u64) -> Result<(), ScheduleError> {
        self.reschedule_task(id, start)
    }

    fn cancel(&self, id: TaskId) -> Result<(), ScheduleError> {
        LlScheduler::cancel(self, id)
    }

    fn free(&self, id: TaskId) -> Result<(), ScheduleError> {
        LlScheduler::free(self, id)
    }

    fn state(&self, id: TaskId) -> Option<TaskState> {
        LlScheduler::state(self, id)
    }
}
