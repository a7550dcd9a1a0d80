//! Cache maintenance contract.
//!
//! DSP cores are not cache-coherent with each other or with DMA. Any shared
//! record (ring buffer bytes, ring buffer counters, IDC mailbox slots) is
//! written back after the writer updates it and invalidated before the reader
//! looks at it. The operations are synchronous and act on the calling core's
//! cache only.

/// Core-local cache maintenance primitives.
pub trait CacheOps: Send + Sync {
    /// Write dirty lines covering `[addr, addr + len)` back to memory.
    fn writeback_region(&self, addr: usize, len: usize);

    /// Drop cached lines covering `[addr, addr + len)` so the next read
    /// fetches memory.
    fn invalidate_region(&self, addr: usize, len: usize);

    /// Write back then invalidate `[addr, addr + len)`.
    fn writeback_invalidate_region(&self, addr: usize, len: usize) {
        self.writeback_region(addr, len);
        self.invalidate_region(addr, len);
    }
}

/// Cache operations for coherent memory: every call is a no-op.
#[derive(Debug, Clone, Copy, Default)]
pub struct CoherentCache;

impl CacheOps for CoherentCache {
    fn writeback_region(&self, _addr: usize, _len: usize) {}

    fn invalidate_region(&self, _addr: usize, _len: usize) {}
}
