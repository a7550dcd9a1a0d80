//! Per-core task schedulers
//!
//! - [`EdfScheduler`]: earliest-deadline-first, cooperative, dispatches
//!   inline from `schedule_task`.
//! - [`LlScheduler`]: fixed-period timer tick, priority ordered, with a
//!   deferred pass for work that must leave the tick context.
//!
//! Both keep their task lists behind a critical-section mutex and release
//! it while a task's callback runs.

// ── Lint policy ─────────────────────────────────────────────────────────────
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(unused_must_use)]
// ────────────────────────────────────────────────────────────────────────────
#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

extern crate alloc;

pub mod edf;
pub mod error;
pub mod kind;
pub mod ll;
pub mod task;

pub use edf::EdfScheduler;
pub use error::ScheduleError;
pub use kind::{Scheduler, SchedulerKind, Schedulers};
pub use ll::{LlScheduler, LlTaskStats, TickReport};
pub use task::{TaskConfig, TaskContext, TaskFlags, TaskId, TaskOps, TaskReturn, TaskState};
