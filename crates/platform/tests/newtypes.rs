//! Type system enforcement tests for platform newtypes.
//! Core ids index per-core tables, so an out-of-range id must never exist.

// Test files legitimately use arithmetic for verification; allow at file level.
#![allow(clippy::arithmetic_side_effects)]
#![allow(clippy::unwrap_used)]

use platform::config::MAX_CORES;
use platform::{CoreId, CoreMask, MemCaps};

// ── CoreId ───────────────────────────────────────────────────────────────────

#[test]
fn core_id_is_one_byte() {
    assert_eq!(core::mem::size_of::<CoreId>(), 1);
}

#[test]
fn every_core_from_all_is_valid() {
    let cores: Vec<CoreId> = CoreId::all().collect();
    assert_eq!(cores.len(), MAX_CORES);
    for (i, core) in cores.iter().enumerate() {
        assert_eq!(core.index(), i);
    }
}

#[test]
fn primary_core_is_first() {
    assert!(CoreId::PRIMARY.is_primary());
    assert_eq!(CoreId::all().next(), Some(CoreId::PRIMARY));
}

#[test]
fn core_id_display_is_stable() {
    assert_eq!(CoreId::new(2).unwrap().to_string(), "core2");
}

// ── CoreMask ─────────────────────────────────────────────────────────────────

#[test]
fn mask_of_single_core_has_one_bit() {
    for core in CoreId::all() {
        assert_eq!(CoreMask::single(core).bits().count_ones(), 1);
    }
}

// ── MemCaps ──────────────────────────────────────────────────────────────────

#[test]
fn caps_flags_are_distinct_bits() {
    let all = [MemCaps::RAM, MemCaps::DMA, MemCaps::CACHE, MemCaps::SHARED];
    let combined = all.iter().fold(0u32, |acc, c| {
        assert_eq!(acc & c.bits(), 0, "flags overlap");
        acc | c.bits()
    });
    assert_eq!(combined.count_ones(), 4);
}

proptest::proptest! {
    /// CoreId::new accepts exactly the indices below MAX_CORES.
    #[test]
    fn core_id_new_matches_range(raw in 0u8..=255u8) {
        let ok = CoreId::new(raw).is_ok();
        assert_eq!(ok, usize::from(raw) < MAX_CORES);
    }
}
