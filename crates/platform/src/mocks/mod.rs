//! Mock implementations for testing
//!
//! This module provides mock implementations of all platform traits
//! for use in unit and integration tests across the workspace.

#![cfg(any(test, feature = "std"))]

use core::cell::RefCell;
use core::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicUsize, Ordering};

use alloc::vec;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;

use crate::*;

// ── Cache ────────────────────────────────────────────────────────────────────

/// Kind of a recorded cache operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheOpKind {
    /// `writeback_region`
    Writeback,
    /// `invalidate_region`
    Invalidate,
}

/// One recorded cache operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheOp {
    /// Operation kind.
    pub kind: CacheOpKind,
    /// Region start address.
    pub addr: usize,
    /// Region length in bytes.
    pub len: usize,
}

/// Cache mock that records every maintenance call.
pub struct MockCache {
    ops: Mutex<CriticalSectionRawMutex, RefCell<heapless::Vec<CacheOp, 256>>>,
    dropped: AtomicUsize,
}

impl MockCache {
    /// Create an empty recorder.
    pub const fn new() -> Self {
        Self {
            ops: Mutex::new(RefCell::new(heapless::Vec::new())),
            dropped: AtomicUsize::new(0),
        }
    }

    /// Snapshot of the recorded operations, oldest first.
    pub fn ops(&self) -> heapless::Vec<CacheOp, 256> {
        self.ops.lock(|ops| ops.borrow().clone())
    }

    /// Number of recorded operations of `kind`.
    pub fn count(&self, kind: CacheOpKind) -> usize {
        self.ops
            .lock(|ops| ops.borrow().iter().filter(|op| op.kind == kind).count())
    }

    /// Forget everything recorded so far.
    pub fn clear(&self) {
        self.ops.lock(|ops| ops.borrow_mut().clear());
        self.dropped.store(0, Ordering::Relaxed);
    }

    fn record(&self, kind: CacheOpKind, addr: usize, len: usize) {
        let pushed = self
            .ops
            .lock(|ops| ops.borrow_mut().push(CacheOp { kind, addr, len }).is_ok());
        if !pushed {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }
}

impl Default for MockCache {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheOps for MockCache {
    fn writeback_region(&self, addr: usize, len: usize) {
        self.record(CacheOpKind::Writeback, addr, len);
    }

    fn invalidate_region(&self, addr: usize, len: usize) {
        self.record(CacheOpKind::Invalidate, addr, len);
    }
}

// ── Heap ─────────────────────────────────────────────────────────────────────

/// Allocator mock that can be told to fail after a number of successes.
pub struct MockHeap {
    fail_after: AtomicUsize,
    live: AtomicUsize,
    total: AtomicUsize,
}

impl MockHeap {
    /// Allocator that never fails.
    pub const fn new() -> Self {
        Self::failing_after(usize::MAX)
    }

    /// Allocator whose `n + 1`-th allocation (and every later one) fails.
    pub const fn failing_after(n: usize) -> Self {
        Self {
            fail_after: AtomicUsize::new(n),
            live: AtomicUsize::new(0),
            total: AtomicUsize::new(0),
        }
    }

    /// Blocks handed out and not yet freed.
    pub fn live(&self) -> usize {
        self.live.load(Ordering::Acquire)
    }

    /// Successful allocations so far.
    pub fn total(&self) -> usize {
        self.total.load(Ordering::Acquire)
    }
}

impl Default for MockHeap {
    fn default() -> Self {
        Self::new()
    }
}

impl Allocator for MockHeap {
    fn alloc(&self, zone: MemZone, caps: MemCaps, size: usize) -> Result<Block, AllocError> {
        if size == 0 {
            return Err(AllocError::ZeroSize);
        }
        self.fail_after
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |left| {
                left.checked_sub(1)
            })
            .map_err(|_| AllocError::OutOfMemory {
                zone,
                requested: size,
            })?;
        self.live.fetch_add(1, Ordering::AcqRel);
        self.total.fetch_add(1, Ordering::AcqRel);
        Ok(Block::new(vec![0u8; size].into_boxed_slice(), zone, caps))
    }

    fn free(&self, block: Block) {
        drop(block);
        self.live.fetch_sub(1, Ordering::AcqRel);
    }
}

// ── Inter-core interrupt ─────────────────────────────────────────────────────

/// Doorbell latch: one pending bit per core, plus a raise counter.
pub struct MockIrq {
    pending: AtomicU32,
    raised: AtomicUsize,
}

impl MockIrq {
    /// No interrupt pending.
    pub const fn new() -> Self {
        Self {
            pending: AtomicU32::new(0),
            raised: AtomicUsize::new(0),
        }
    }

    /// Number of `raise` calls so far.
    pub fn raised(&self) -> usize {
        self.raised.load(Ordering::Acquire)
    }

    /// `true` if `core` has an unconsumed interrupt.
    pub fn is_pending(&self, core: CoreId) -> bool {
        CoreMask::single(core).bits() & self.pending.load(Ordering::Acquire) != 0
    }
}

impl Default for MockIrq {
    fn default() -> Self {
        Self::new()
    }
}

impl InterCoreIrq for MockIrq {
    fn raise(&self, target: CoreId, _source: CoreId) {
        self.pending
            .fetch_or(CoreMask::single(target).bits(), Ordering::AcqRel);
        self.raised.fetch_add(1, Ordering::AcqRel);
    }

    fn take_pending(&self, core: CoreId) -> bool {
        let bit = CoreMask::single(core).bits();
        self.pending.fetch_and(!bit, Ordering::AcqRel) & bit != 0
    }
}

// ── Timer and clock ──────────────────────────────────────────────────────────

/// Domain timer mock recording which cores have the tick enabled.
pub struct MockTimer {
    enabled: AtomicU32,
    transitions: AtomicUsize,
}

impl MockTimer {
    /// All cores disabled.
    pub const fn new() -> Self {
        Self {
            enabled: AtomicU32::new(0),
            transitions: AtomicUsize::new(0),
        }
    }

    /// Number of enable/disable calls so far.
    pub fn transitions(&self) -> usize {
        self.transitions.load(Ordering::Acquire)
    }
}

impl Default for MockTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl DomainTimer for MockTimer {
    fn enable(&self, core: CoreId) {
        self.enabled
            .fetch_or(CoreMask::single(core).bits(), Ordering::AcqRel);
        self.transitions.fetch_add(1, Ordering::AcqRel);
    }

    fn disable(&self, core: CoreId) {
        self.enabled
            .fetch_and(!CoreMask::single(core).bits(), Ordering::AcqRel);
        self.transitions.fetch_add(1, Ordering::AcqRel);
    }

    fn is_enabled(&self, core: CoreId) -> bool {
        self.enabled.load(Ordering::Acquire) & CoreMask::single(core).bits() != 0
    }
}

/// Cycle clock that only moves when told to.
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    /// Clock starting at cycle 0.
    pub const fn new() -> Self {
        Self {
            now: AtomicU64::new(0),
        }
    }

    /// Move the clock forward by `cycles`.
    pub fn advance(&self, cycles: u64) {
        self.now.fetch_add(cycles, Ordering::AcqRel);
    }

    /// Jump the clock to `cycle`.
    pub fn set(&self, cycle: u64) {
        self.now.store(cycle, Ordering::Release);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl CycleClock for ManualClock {
    fn now(&self) -> u64 {
        self.now.load(Ordering::Acquire)
    }
}

// ── Host mailbox ─────────────────────────────────────────────────────────────

/// Host mailbox mock: records delivered messages, can be held busy.
pub struct MockHost {
    busy: AtomicBool,
    sent: Mutex<CriticalSectionRawMutex, RefCell<heapless::Vec<HostMessage, 32>>>,
}

impl MockHost {
    /// Idle mailbox with nothing delivered.
    pub const fn new() -> Self {
        Self {
            busy: AtomicBool::new(false),
            sent: Mutex::new(RefCell::new(heapless::Vec::new())),
        }
    }

    /// Hold the window busy (`true`) or release it.
    pub fn set_busy(&self, busy: bool) {
        self.busy.store(busy, Ordering::Release);
    }

    /// Messages delivered so far, oldest first.
    pub fn sent(&self) -> heapless::Vec<HostMessage, 32> {
        self.sent.lock(|sent| sent.borrow().clone())
    }
}

impl Default for MockHost {
    fn default() -> Self {
        Self::new()
    }
}

impl HostMailbox for MockHost {
    fn send(&self, msg: &HostMessage) -> Result<(), HostBusy> {
        if self.busy.load(Ordering::Acquire) {
            return Err(HostBusy);
        }
        self.sent
            .lock(|sent| sent.borrow_mut().push(msg.clone()).map_err(|_| HostBusy))
    }
}
