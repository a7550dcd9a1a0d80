//! Allocation service contract.
//!
//! The core never decides where memory comes from. It asks the platform for
//! a block tagged with a zone and capability flags and receives either the
//! block or a failure. The core never retries: a failed allocation during a
//! pipeline build aborts that build.

use alloc::boxed::Box;
use alloc::vec;
use core::sync::atomic::{AtomicUsize, Ordering};

// ── Zones and capabilities ───────────────────────────────────────────────────

/// Heap zone an allocation is charged to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MemZone {
    /// Objects living for the whole firmware lifetime.
    System,
    /// Topology objects: components, pipelines, tasks.
    Runtime,
    /// Audio ring buffer storage.
    Buffer,
}

impl MemZone {
    const COUNT: usize = 3;

    const fn slot(self) -> usize {
        match self {
            Self::System => 0,
            Self::Runtime => 1,
            Self::Buffer => 2,
        }
    }
}

impl core::fmt::Display for MemZone {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            Self::System => "system",
            Self::Runtime => "runtime",
            Self::Buffer => "buffer",
        })
    }
}

/// Capability flags requested for an allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(transparent)]
pub struct MemCaps(u32);

impl MemCaps {
    /// Plain RAM.
    pub const RAM: Self = Self(1 << 0);
    /// Reachable by DMA engines.
    pub const DMA: Self = Self(1 << 1);
    /// Cached; users must maintain it explicitly.
    pub const CACHE: Self = Self(1 << 2);
    /// Visible to every core.
    pub const SHARED: Self = Self(1 << 3);

    /// `true` when every flag of `other` is set.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Raw flag bits.
    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }
}

impl core::ops::BitOr for MemCaps {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

// ── Error type ───────────────────────────────────────────────────────────────

/// Allocation failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AllocError {
    /// The zone cannot satisfy the request.
    OutOfMemory {
        /// Zone that was exhausted.
        zone: MemZone,
        /// Requested size in bytes.
        requested: usize,
    },
    /// Zero-sized requests are rejected.
    ZeroSize,
}

impl AllocError {
    /// Negative errno for the host reply.
    #[must_use]
    pub const fn errno(self) -> i32 {
        match self {
            Self::OutOfMemory { .. } => crate::errno::reply(crate::errno::ENOMEM),
            Self::ZeroSize => crate::errno::reply(crate::errno::EINVAL),
        }
    }
}

impl core::fmt::Display for AllocError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::OutOfMemory { zone, requested } => {
                write!(f, "{zone} zone exhausted ({requested} bytes requested)")
            }
            Self::ZeroSize => f.write_str("zero-sized allocation"),
        }
    }
}

// ── Block ────────────────────────────────────────────────────────────────────

/// Memory handed out by an [`Allocator`].
///
/// The block owns its bytes; dropping it without handing it back through
/// [`Allocator::free`] leaks the zone budget but not the memory.
pub struct Block {
    bytes: Box<[u8]>,
    zone: MemZone,
    caps: MemCaps,
}

impl Block {
    /// Wrap freshly allocated storage.
    #[must_use]
    pub fn new(bytes: Box<[u8]>, zone: MemZone, caps: MemCaps) -> Self {
        Self { bytes, zone, caps }
    }

    /// Size in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// `true` for an empty block.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Zone the block is charged to.
    #[must_use]
    pub fn zone(&self) -> MemZone {
        self.zone
    }

    /// Capabilities the block was allocated with.
    #[must_use]
    pub fn caps(&self) -> MemCaps {
        self.caps
    }

    /// Start address, for cache maintenance.
    #[must_use]
    pub fn addr(&self) -> usize {
        self.bytes.as_ptr() as usize
    }

    /// Read access to the bytes.
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    /// Write access to the bytes.
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.bytes
    }
}

impl core::fmt::Debug for Block {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Block")
            .field("len", &self.bytes.len())
            .field("zone", &self.zone)
            .field("caps", &self.caps)
            .finish()
    }
}

// ── Allocator trait ──────────────────────────────────────────────────────────

/// Zone/capability tagged allocation service.
///
/// Shared by every core, hence `Send + Sync`.
pub trait Allocator: Send + Sync {
    /// Allocate `size` zeroed bytes from `zone` with `caps`.
    fn alloc(&self, zone: MemZone, caps: MemCaps, size: usize) -> Result<Block, AllocError>;

    /// Return a block to its zone.
    fn free(&self, block: Block);
}

// ── BudgetHeap ───────────────────────────────────────────────────────────────

/// Allocator backed by the global heap with a byte budget per zone.
///
/// Stands in for the chip heap on host builds and in bring-up firmware
/// where zones are only accounting boundaries.
pub struct BudgetHeap {
    remaining: [AtomicUsize; MemZone::COUNT],
}

impl BudgetHeap {
    /// Create a heap with the given per-zone budgets in bytes.
    #[must_use]
    pub const fn new(system: usize, runtime: usize, buffer: usize) -> Self {
        Self {
            remaining: [
                AtomicUsize::new(system),
                AtomicUsize::new(runtime),
                AtomicUsize::new(buffer),
            ],
        }
    }

    /// Bytes still available in `zone`.
    #[must_use]
    pub fn remaining(&self, zone: MemZone) -> usize {
        self.counter(zone).map_or(0, |c| c.load(Ordering::Acquire))
    }

    fn counter(&self, zone: MemZone) -> Option<&AtomicUsize> {
        self.remaining.get(zone.slot())
    }
}

impl Allocator for BudgetHeap {
    fn alloc(&self, zone: MemZone, caps: MemCaps, size: usize) -> Result<Block, AllocError> {
        if size == 0 {
            return Err(AllocError::ZeroSize);
        }
        let oom = AllocError::OutOfMemory {
            zone,
            requested: size,
        };
        let counter = self.counter(zone).ok_or(oom)?;
        counter
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |left| {
                left.checked_sub(size)
            })
            .map_err(|_| oom)?;
        Ok(Block::new(vec![0u8; size].into_boxed_slice(), zone, caps))
    }

    fn free(&self, block: Block) {
        if let Some(counter) = self.counter(block.zone()) {
            // Budget only ever grows back to what was taken from it.
            let _ = counter.fetch_update(Ordering::AcqRel, Ordering::Acquire, |left| {
                left.checked_add(block.len())
            });
        }
    }
}
