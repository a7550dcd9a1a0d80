//! Byte ring buffer connecting one producer component to one consumer.
//!
//! `CompBuffer` owns a block from the allocator service and tracks
//! `write`/`read` offsets plus the number of valid bytes. It is a
//! single-producer / single-consumer structure: only the producer calls
//! [`produce`](CompBuffer::produce) and only the consumer calls
//! [`consume`](CompBuffer::consume).
//!
//! # Constraints
//!
//! - `available + free == capacity` after every operation.
//! - Cores are not cache-coherent. `produce` writes the produced bytes and
//!   the counters back; `consume` invalidates the consumed bytes and writes
//!   the counters back. Readers invalidate before copying out.
//! - No backpressure is built in: the copy task must not produce beyond
//!   `free` or consume beyond `available`. Doing so is an error and leaves
//!   the buffer unchanged.

use alloc::sync::Arc;
use core::cell::RefCell;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use platform::{Block, CacheOps};

use crate::BufferId;

/// Errors returned by ring buffer operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BufferError {
    /// More bytes were produced than the buffer had free.
    Overrun {
        /// Bytes the caller tried to produce.
        requested: usize,
        /// Free bytes at the time.
        free: usize,
    },
    /// More bytes were consumed than the buffer held.
    Underrun {
        /// Bytes the caller tried to consume.
        requested: usize,
        /// Available bytes at the time.
        available: usize,
    },
}

impl core::fmt::Display for BufferError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Overrun { requested, free } => {
                write!(f, "produce {requested} bytes with only {free} free")
            }
            Self::Underrun {
                requested,
                available,
            } => write!(f, "consume {requested} bytes with only {available} available"),
        }
    }
}

/// Counter record shared between producer and consumer cores.
struct Ring {
    storage: Block,
    /// Offset of the next byte to read.
    read: usize,
    /// Offset of the next byte to write.
    write: usize,
    /// Number of valid bytes.
    avail: usize,
}

impl Ring {
    fn capacity(&self) -> usize {
        self.storage.len()
    }

    #[allow(clippy::arithmetic_side_effects)] // Safety: avail <= capacity invariant
    fn free(&self) -> usize {
        self.capacity() - self.avail
    }

    /// Address of the counter record, for cache maintenance.
    fn header_addr(&self) -> usize {
        core::ptr::addr_of!(self.avail) as usize
    }

    /// Split `[offset, offset + len)` at the wrap point into at most two
    /// `(start, len)` regions of the storage.
    #[allow(clippy::arithmetic_side_effects)] // Safety: offset < capacity, len <= capacity
    fn regions(&self, offset: usize, len: usize) -> [(usize, usize); 2] {
        let cap = self.capacity();
        let first = len.min(cap - offset);
        [(offset, first), (0, len - first)]
    }

    #[allow(clippy::arithmetic_side_effects)] // Safety: ring wrap via % capacity; capacity > 0
    fn advance(&self, offset: usize, n: usize) -> usize {
        (offset + n) % self.capacity()
    }
}

/// Ring buffer between two components.
///
/// Shared by the producer and consumer through an `Arc`; the topology keeps
/// the owning reference and tears the buffer down with either endpoint.
pub struct CompBuffer {
    id: BufferId,
    ring: Mutex<CriticalSectionRawMutex, RefCell<Ring>>,
    cache: Arc<dyn CacheOps>,
}

impl CompBuffer {
    /// Wrap `storage` as an empty ring.
    ///
    /// The capacity is the block length; the block must not be empty.
    #[must_use]
    pub fn new(id: BufferId, storage: Block, cache: Arc<dyn CacheOps>) -> Self {
        Self {
            id,
            ring: Mutex::new(RefCell::new(Ring {
                storage,
                read: 0,
                write: 0,
                avail: 0,
            })),
            cache,
        }
    }

    /// Buffer id.
    pub fn id(&self) -> BufferId {
        self.id
    }

    /// Total size in bytes.
    pub fn capacity(&self) -> usize {
        self.ring.lock(|r| r.borrow().capacity())
    }

    /// Bytes ready for the consumer.
    pub fn available(&self) -> usize {
        self.ring.lock(|r| r.borrow().avail)
    }

    /// Bytes the producer may still write.
    pub fn free(&self) -> usize {
        self.ring.lock(|r| r.borrow().free())
    }

    /// `(available, free)` read atomically.
    pub fn counts(&self) -> (usize, usize) {
        self.ring.lock(|r| {
            let r = r.borrow();
            (r.avail, r.free())
        })
    }

    /// Advance the write offset by `n` bytes already placed in the ring.
    ///
    /// # Errors
    ///
    /// Returns [`BufferError::Overrun`] if `n > free`; nothing changes.
    #[allow(clippy::arithmetic_side_effects)] // Safety: n <= free checked, so avail + n <= capacity
    pub fn produce(&self, n: usize) -> Result<(), BufferError> {
        if n == 0 {
            return Ok(());
        }
        self.ring.lock(|r| {
            let mut r = r.borrow_mut();
            let free = r.free();
            if n > free {
                return Err(BufferError::Overrun { requested: n, free });
            }
            let base = r.storage.addr();
            for (start, len) in r.regions(r.write, n) {
                if len > 0 {
                    self.cache.writeback_region(base + start, len);
                }
            }
            r.write = r.advance(r.write, n);
            r.avail += n;
            self.cache
                .writeback_region(r.header_addr(), core::mem::size_of::<usize>());
            Ok(())
        })
    }

    /// Advance the read offset by `n` bytes already taken from the ring.
    ///
    /// # Errors
    ///
    /// Returns [`BufferError::Underrun`] if `n > available`; nothing changes.
    #[allow(clippy::arithmetic_side_effects)] // Safety: n <= avail checked
    pub fn consume(&self, n: usize) -> Result<(), BufferError> {
        if n == 0 {
            return Ok(());
        }
        self.ring.lock(|r| {
            let mut r = r.borrow_mut();
            if n > r.avail {
                return Err(BufferError::Underrun {
                    requested: n,
                    available: r.avail,
                });
            }
            let base = r.storage.addr();
            for (start, len) in r.regions(r.read, n) {
                if len > 0 {
                    self.cache.invalidate_region(base + start, len);
                }
            }
            r.read = r.advance(r.read, n);
            r.avail -= n;
            self.cache
                .writeback_region(r.header_addr(), core::mem::size_of::<usize>());
            Ok(())
        })
    }

    /// Copy `data` into the ring and produce it.
    ///
    /// # Errors
    ///
    /// Returns [`BufferError::Overrun`] if `data` does not fit; the write is
    /// all-or-nothing.
    #[allow(clippy::indexing_slicing)] // Safety: regions() stays inside the storage; split lengths sum to data.len()
    pub fn write(&self, data: &[u8]) -> Result<(), BufferError> {
        self.ring.lock(|r| {
            let mut r = r.borrow_mut();
            let free = r.free();
            if data.len() > free {
                return Err(BufferError::Overrun {
                    requested: data.len(),
                    free,
                });
            }
            let [(a_start, a_len), (b_start, b_len)] = r.regions(r.write, data.len());
            let (head, tail) = data.split_at(a_len);
            let bytes = r.storage.as_mut_slice();
            bytes[a_start..a_start + a_len].copy_from_slice(head);
            bytes[b_start..b_start + b_len].copy_from_slice(tail);
            Ok(())
        })?;
        self.produce(data.len())
    }

    /// Copy up to `out.len()` bytes out of the ring and consume them.
    ///
    /// Returns the number of bytes read.
    #[allow(clippy::indexing_slicing)] // Safety: regions() stays inside the storage; n <= avail
    pub fn read(&self, out: &mut [u8]) -> usize {
        let n = self.ring.lock(|r| {
            let r = r.borrow();
            let n = out.len().min(r.avail);
            let [(a_start, a_len), (b_start, b_len)] = r.regions(r.read, n);
            let base = r.storage.addr();
            if a_len > 0 {
                self.cache.invalidate_region(base + a_start, a_len);
            }
            if b_len > 0 {
                self.cache.invalidate_region(base + b_start, b_len);
            }
            let bytes = r.storage.as_slice();
            out[..a_len].copy_from_slice(&bytes[a_start..a_start + a_len]);
            out[a_len..n].copy_from_slice(&bytes[b_start..b_start + b_len]);
            n
        });
        // consume cannot fail: n <= available and only the consumer consumes.
        if self.consume(n).is_err() {
            return 0;
        }
        n
    }

    /// Drop all content and rewind both offsets.
    pub fn reset(&self) {
        self.ring.lock(|r| {
            let mut r = r.borrow_mut();
            r.storage.as_mut_slice().fill(0);
            r.read = 0;
            r.write = 0;
            r.avail = 0;
            self.cache
                .writeback_region(r.storage.addr(), r.storage.len());
        });
    }

    /// Give the storage back, for returning it to the allocator.
    pub fn into_storage(self) -> Block {
        self.ring.into_inner().into_inner().storage
    }
}

impl core::fmt::Debug for CompBuffer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let (avail, free) = self.counts();
        f.debug_struct("CompBuffer")
            .field("id", &self.id)
            .field("available", &avail)
            .field("free", &free)
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use alloc::vec;
    use platform::mocks::{CacheOpKind, MockCache};
    use platform::{MemCaps, MemZone};

    fn ring(cap: usize) -> (CompBuffer, Arc<MockCache>) {
        let cache = Arc::new(MockCache::new());
        let block = Block::new(vec![0u8; cap].into_boxed_slice(), MemZone::Buffer, MemCaps::RAM);
        (CompBuffer::new(BufferId(1), block, cache.clone()), cache)
    }

    #[test]
    fn write_then_read() {
        let (buf, _) = ring(64);
        let data: [u8; 16] = core::array::from_fn(|i| i as u8);
        buf.write(&data).unwrap();
        assert_eq!(buf.available(), 16);
        let mut out = [0u8; 16];
        assert_eq!(buf.read(&mut out), 16);
        assert_eq!(out, data);
        assert_eq!(buf.free(), 64);
    }

    #[test]
    fn produce_past_free_fails_unchanged() {
        let (buf, _) = ring(8);
        buf.produce(8).unwrap();
        assert_eq!(
            buf.produce(1),
            Err(BufferError::Overrun {
                requested: 1,
                free: 0
            })
        );
        assert_eq!(buf.counts(), (8, 0));
    }

    #[test]
    fn consume_past_available_fails_unchanged() {
        let (buf, _) = ring(8);
        buf.produce(3).unwrap();
        assert!(buf.consume(4).is_err());
        assert_eq!(buf.counts(), (3, 5));
    }

    #[test]
    fn wraps_around() {
        let (buf, _) = ring(8);
        buf.write(&[1u8; 8]).unwrap();
        let mut half = [0u8; 4];
        assert_eq!(buf.read(&mut half), 4);
        buf.write(&[2u8; 4]).unwrap();
        let mut rest = [0u8; 8];
        assert_eq!(buf.read(&mut rest), 8);
        assert_eq!(&rest[..4], &[1u8; 4]);
        assert_eq!(&rest[4..], &[2u8; 4]);
    }

    #[test]
    fn wrapping_produce_writes_back_two_regions() {
        let (buf, cache) = ring(8);
        buf.produce(6).unwrap();
        buf.consume(6).unwrap();
        cache.clear();
        buf.produce(4).unwrap();
        let data_writebacks: usize = cache
            .ops()
            .iter()
            .filter(|op| op.kind == CacheOpKind::Writeback && op.len != core::mem::size_of::<usize>())
            .count();
        assert_eq!(data_writebacks, 2);
    }

    #[test]
    fn consume_invalidates_consumed_bytes() {
        let (buf, cache) = ring(16);
        buf.produce(4).unwrap();
        cache.clear();
        buf.consume(4).unwrap();
        assert_eq!(cache.count(CacheOpKind::Invalidate), 1);
        assert_eq!(cache.count(CacheOpKind::Writeback), 1);
    }

    #[test]
    fn reset_empties() {
        let (buf, _) = ring(16);
        buf.write(&[7u8; 10]).unwrap();
        buf.reset();
        assert_eq!(buf.counts(), (0, 16));
    }
}
