//! Property-based tests for the component ring buffer.
//! `available + free == capacity` must hold after every operation.
#![allow(
    clippy::unwrap_used,
    clippy::arithmetic_side_effects,
    clippy::indexing_slicing
)]

use std::sync::Arc;

use audio::{BufferError, BufferId, CompBuffer};
use platform::mocks::{CacheOpKind, MockCache, MockHeap};
use platform::{Allocator, MemCaps, MemZone};

#[derive(Debug, Clone)]
enum Op {
    Write(Vec<u8>),
    Read(usize),
    Produce(usize),
    Consume(usize),
    Reset,
}

fn op() -> impl proptest::strategy::Strategy<Value = Op> {
    use proptest::prelude::*;
    prop_oneof![
        4 => proptest::collection::vec(any::<u8>(), 0..48).prop_map(Op::Write),
        4 => (0usize..48).prop_map(Op::Read),
        2 => (0usize..48).prop_map(Op::Produce),
        2 => (0usize..48).prop_map(Op::Consume),
        1 => Just(Op::Reset),
    ]
}

fn ring(capacity: usize) -> (CompBuffer, Arc<MockCache>) {
    let heap = MockHeap::new();
    let cache = Arc::new(MockCache::new());
    let block = heap
        .alloc(MemZone::Buffer, MemCaps::RAM | MemCaps::CACHE, capacity)
        .unwrap();
    (CompBuffer::new(BufferId(1), block, cache.clone()), cache)
}

proptest::proptest! {
    /// Counts always add up to the capacity, whatever the call sequence.
    #[test]
    fn available_plus_free_is_capacity(
        capacity in 1usize..64,
        ops in proptest::collection::vec(op(), 0..64),
    ) {
        let (buf, _cache) = ring(capacity);
        for op in ops {
            match op {
                Op::Write(data) => { let _ = buf.write(&data); }
                Op::Read(n) => { let _ = buf.read(&mut vec![0u8; n]); }
                Op::Produce(n) => { let _ = buf.produce(n); }
                Op::Consume(n) => { let _ = buf.consume(n); }
                Op::Reset => buf.reset(),
            }
            let (available, free) = buf.counts();
            proptest::prop_assert_eq!(available + free, capacity);
        }
    }

    /// Bytes come out in the order they went in, across wrap-around.
    #[test]
    fn reads_return_written_bytes_in_order(
        chunks in proptest::collection::vec(proptest::collection::vec(proptest::prelude::any::<u8>(), 1..12), 1..24),
    ) {
        let (buf, _cache) = ring(16);
        let mut expected = std::collections::VecDeque::new();
        for chunk in chunks {
            if buf.write(&chunk).is_ok() {
                expected.extend(chunk.iter().copied());
            }
            let mut out = [0u8; 5];
            let n = buf.read(&mut out);
            for byte in &out[..n] {
                proptest::prop_assert_eq!(Some(*byte), expected.pop_front());
            }
        }
        proptest::prop_assert_eq!(buf.available(), expected.len());
    }

    /// A refused produce changes nothing and issues no cache maintenance.
    #[test]
    fn overrun_is_side_effect_free(capacity in 1usize..32, extra in 1usize..32) {
        let (buf, cache) = ring(capacity);
        cache.clear();
        let err = buf.produce(capacity + extra).unwrap_err();
        proptest::prop_assert_eq!(err, BufferError::Overrun { requested: capacity + extra, free: capacity });
        proptest::prop_assert_eq!(buf.counts(), (0, capacity));
        proptest::prop_assert_eq!(cache.count(CacheOpKind::Writeback), 0);
    }
}
