//! Core identity newtypes.
//!
//! - `CoreId`: validated index below [`MAX_CORES`]
//! - `CoreMask`: set of cores, used for power state and interrupt latches

use crate::config::{MAX_CORES, PRIMARY_CORE};

// ── Error type ───────────────────────────────────────────────────────────────

/// Error returned when a core index is outside the platform's core count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CoreError {
    /// The raw index is not below [`MAX_CORES`].
    Invalid(u8),
}

impl core::fmt::Display for CoreError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Invalid(raw) => write!(f, "invalid core id {raw}"),
        }
    }
}

// ── CoreId ───────────────────────────────────────────────────────────────────

/// Identifier of one DSP core.
///
/// Wraps a `u8` with the invariant `value < MAX_CORES`, so it can index
/// per-core tables without a bounds check failing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(transparent)]
pub struct CoreId(u8);

impl CoreId {
    /// The primary core.
    pub const PRIMARY: Self = Self(PRIMARY_CORE);

    /// Create a `CoreId`, rejecting indices at or above [`MAX_CORES`].
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Invalid`] for an out-of-range index.
    pub fn new(raw: u8) -> Result<Self, CoreError> {
        if usize::from(raw) < MAX_CORES {
            Ok(Self(raw))
        } else {
            Err(CoreError::Invalid(raw))
        }
    }

    /// Raw core number.
    #[must_use]
    pub const fn get(self) -> u8 {
        self.0
    }

    /// Core number as a table index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// `true` for the primary core.
    #[must_use]
    pub const fn is_primary(self) -> bool {
        self.0 == PRIMARY_CORE
    }

    /// Iterate over every addressable core.
    #[allow(clippy::cast_possible_truncation)] // Safety: MAX_CORES <= u8::MAX
    pub fn all() -> impl Iterator<Item = CoreId> {
        (0..MAX_CORES).map(|i| CoreId(i as u8))
    }
}

impl core::fmt::Display for CoreId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "core{}", self.0)
    }
}

impl TryFrom<u32> for CoreId {
    type Error = CoreError;

    fn try_from(raw: u32) -> Result<Self, Self::Error> {
        let narrow = u8::try_from(raw).map_err(|_| CoreError::Invalid(u8::MAX))?;
        Self::new(narrow)
    }
}

// ── CoreMask ─────────────────────────────────────────────────────────────────

/// Bit set of cores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(transparent)]
pub struct CoreMask(u32);

#[allow(clippy::arithmetic_side_effects)] // Safety: shifts by a CoreId, always < MAX_CORES <= 32
impl CoreMask {
    /// No cores.
    pub const EMPTY: Self = Self(0);

    /// Mask containing a single core.
    #[must_use]
    pub const fn single(core: CoreId) -> Self {
        Self(1u32 << core.0)
    }

    /// `true` if `core` is in the mask.
    #[must_use]
    pub const fn contains(self, core: CoreId) -> bool {
        self.0 & (1u32 << core.0) != 0
    }

    /// Mask with `core` added.
    #[must_use]
    pub const fn with(self, core: CoreId) -> Self {
        Self(self.0 | (1u32 << core.0))
    }

    /// Mask with `core` removed.
    #[must_use]
    pub const fn without(self, core: CoreId) -> Self {
        Self(self.0 & !(1u32 << core.0))
    }

    /// `true` if no core is set.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Raw bits.
    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }
}
