//! DSP system layer
//!
//! Ties the audio graph, the per-core schedulers and the inter-core bus
//! into one [`System`]:
//!
//! - host triggers run the Trigger Walk on the owning core, forwarding
//!   over IDC when the caller is another core,
//! - every streaming pipeline is driven by an LL task
//!   ([`PipelineTask`]) that reports xruns to the host,
//! - outbound host messages wait in an [`OutboundQueue`] drained by the
//!   primary core's idle loop.

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

pub mod config;
pub mod core_context;
pub mod error;
pub mod ipc;
pub mod pipeline_task;
pub mod system;

pub use config::SystemConfig;
pub use core_context::{CoreContext, CoreStats};
pub use error::SystemError;
pub use ipc::{IpcError, IpcPriority, OutboundQueue};
pub use pipeline_task::{task_id, xrun_notification, PipelineTask, NOTIFY_XRUN};
pub use system::{PanicSink, Platform, System};
