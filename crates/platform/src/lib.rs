//! Platform contracts for the DSP pipeline core
//!
//! This crate provides the trait-based abstractions the audio core consumes
//! from the platform layer, so the graph, schedulers and inter-core messaging
//! can be developed and tested without a physical DSP.
//!
//! # Architecture Layers
//!
//! ```text
//! System layer (firmware crate: System, CoreContext, IPC queue)
//!         ↓
//! Core layers (audio graph, schedule, idc)
//!         ↓
//! Platform contracts (this crate - trait abstractions)
//!         ↓
//! Chip support (timers, IDC registers, cache controller, heap)
//! ```
//!
//! # Contracts
//!
//! - [`Allocator`] - zone/capability tagged allocation service
//! - [`CacheOps`] - explicit write-back / invalidate of shared memory
//! - [`InterCoreIrq`] - inter-core interrupt doorbell
//! - [`DomainTimer`] / [`CycleClock`] - LL tick source and cycle counter
//! - [`HostMailbox`] - outbound host message window
//!
//! # Features
//!
//! - `std`: Enable standard library support and the [`mocks`] module
//! - `tracing`: Route the logging macros through `tracing`
//! - `defmt`: Route the logging macros through defmt

// ── Lint policy ─────────────────────────────────────────────────────────────
#![deny(clippy::unwrap_used)] // no .unwrap() in production code
#![deny(clippy::expect_used)] // no .expect() in production code
#![deny(clippy::panic)] // no panic!() in production code
#![deny(clippy::unreachable)] // no unreachable!() that isn't documented
#![deny(unused_must_use)]
// all Results must be handled
// ────────────────────────────────────────────────────────────────────────────
#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(clippy::print_stdout)] // prefer tracing/defmt over println! in lib code
#![allow(clippy::doc_markdown)]
#![allow(clippy::must_use_candidate)] // accessors; callers decide
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

extern crate alloc;

pub mod cache;
pub mod config;
pub mod cpu;
pub mod errno;
pub mod heap;
pub mod host;
pub mod interrupt;
#[doc(hidden)]
pub mod log;
pub mod mocks;
pub mod timer;

pub use cache::{CacheOps, CoherentCache};
pub use cpu::{CoreError, CoreId, CoreMask};
pub use heap::{AllocError, Allocator, Block, BudgetHeap, MemCaps, MemZone};
pub use host::{HostBusy, HostMailbox, HostMessage};
pub use interrupt::InterCoreIrq;
pub use timer::{CycleClock, DomainTimer};
