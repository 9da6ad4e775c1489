//! Fixed-width bitmask for alpha test results.

use std::fmt;

/// Bitmask of alpha test results for one fact.
///
/// Bit `i` is set iff alpha evaluator `i` of the fact's type returned true.
/// A rule's requirement is itself an `AlphaMask`; a fact qualifies when every
/// required bit is set.
#[derive(Copy, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AlphaMask(u64);

impl AlphaMask {
    /// Maximum number of alpha evaluators per fact type.
    pub const CAPACITY: usize = 64;

    /// The empty mask (no bits set).
    pub const EMPTY: Self = Self(0);

    /// Creates a mask from raw bits.
    #[must_use]
    pub const fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    /// Returns the raw bits.
    #[must_use]
    pub const fn bits(self) -> u64 {
        self.0
    }

    /// Returns a mask with bit `index` set.
    ///
    /// Indexes at or beyond [`Self::CAPACITY`] are ignored; the compiler
    /// rejects types with more evaluators before any mask is built.
    #[must_use]
    pub const fn with(self, index: usize) -> Self {
        if index >= Self::CAPACITY {
            return self;
        }
        Self(self.0 | (1 << index))
    }

    /// Returns true if bit `index` is set.
    #[must_use]
    pub const fn get(self, index: usize) -> bool {
        index < Self::CAPACITY && self.0 & (1 << index) != 0
    }

    /// Returns true if every bit of `required` is also set in `self`.
    #[must_use]
    pub const fn satisfies(self, required: Self) -> bool {
        self.0 & required.0 == required.0
    }

    /// Returns true if no bits are set.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Returns the number of set bits.
    #[must_use]
    pub const fn count(self) -> u32 {
        self.0.count_ones()
    }
}

impl fmt::Debug for AlphaMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AlphaMask({:#b})", self.0)
    }
}
