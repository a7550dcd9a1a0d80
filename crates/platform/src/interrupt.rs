//! Inter-core interrupt contract.
//!
//! The IDC layer rings a doorbell on the destination core after writing a
//! mailbox slot. The destination's interrupt handler then scans its
//! incoming mailboxes.

use crate::cpu::CoreId;

/// Inter-core doorbell.
pub trait InterCoreIrq: Send + Sync {
    /// Raise the IDC interrupt on `target` on behalf of `source`.
    fn raise(&self, target: CoreId, source: CoreId);

    /// Consume a pending IDC interrupt for `core`.
    ///
    /// Returns `true` if one was pending. Used by polling loops and by
    /// handlers that acknowledge the interrupt line.
    fn take_pending(&self, core: CoreId) -> bool;
}
