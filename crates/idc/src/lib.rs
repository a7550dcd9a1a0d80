//! Inter-core messaging
//!
//! Cores share no cache coherency; they talk through single-slot mailboxes
//! in shared memory, one per ordered core pair, plus a doorbell interrupt.
//!
//! ```text
//!  core0 ──send──▶ [slot 0→1] ──irq──▶ core1 handle_irq ──▶ handler
//!        ◀───────── status word + reply ◀─────────────────┘
//! ```

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

pub mod bus;
pub mod error;
pub mod message;

pub use bus::{IdcBus, MailboxStats, SendMode};
pub use error::IdcError;
pub use message::{IdcMessage, IdcMsgType, IdcReply};
