//! XOR-of-bits partition functions and the pair algebra built on them.
//!
//! A [`Solution`] is one hypothesis about the hardware hash: a set of
//! physical address bits whose XOR yields one bit of the partition index.
//! The module also provides:
//! - [`ConfirmedPair`]: an oracle-confirmed same-partition address pair,
//! - [`HypothesisIter`]: lexicographic enumeration of candidate functions,
//! - [`reduce`]: canonicalization of a solution set into an independent basis.

mod enumerate;
mod reduce;

pub use self::enumerate::HypothesisIter;
pub use self::reduce::{is_unique_basis, reduce};

use crate::PhysAddr;
use serde::ser::{Serialize, SerializeSeq, Serializer};
use std::fmt::{self, Display, Formatter};
use std::ops::{BitXor, BitXorAssign};
use thiserror::Error;

/// Maximum supported physical address width in bits.
pub const MAX_ADDR_BITS: u32 = u64::BITS;

/// Errors from building up a [`Solution`] bit by bit.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SolutionError {
    /// The bit index does not fit in the supported address width.
    #[error("bit {0} is outside the supported physical address width of {MAX_ADDR_BITS} bits")]
    OutOfRange(u32),
    /// The bit index does not extend the function in ascending order.
    #[error("bit {bit} does not exceed the highest bit {highest} already in the function")]
    OutOfOrder {
        /// The rejected bit index.
        bit: u32,
        /// The highest bit index already present.
        highest: u32,
    },
}

/// A single XOR-of-bits hash function over physical address bits.
///
/// Stored as a bitmask: bit `i` of the mask is set iff address bit `i`
/// participates in the XOR. This makes combination (`^`), equality and
/// evaluation single word operations; the ascending index list is derived
/// on demand for display and serialization.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Solution(u64);

impl Solution {
    /// The constant-zero function selecting no bits.
    pub const fn empty() -> Self {
        Solution(0)
    }

    /// Builds a solution from a raw participation mask.
    pub const fn from_mask(mask: u64) -> Self {
        Solution(mask)
    }

    /// Builds a solution from a list of participating bit indices.
    ///
    /// # Errors
    ///
    /// Rejects indices at or above [`MAX_ADDR_BITS`].
    pub fn from_bits(bits: &[u32]) -> Result<Self, SolutionError> {
        let mut mask = 0u64;
        for &bit in bits {
            if bit >= MAX_ADDR_BITS {
                return Err(SolutionError::OutOfRange(bit));
            }
            mask |= 1 << bit;
        }
        Ok(Solution(mask))
    }

    /// The raw participation mask.
    pub const fn mask(&self) -> u64 {
        self.0
    }

    /// Number of participating bits.
    pub const fn depth(&self) -> u32 {
        self.0.count_ones()
    }

    /// Whether this is the constant-zero function.
    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Highest participating bit index, if any.
    pub const fn highest_bit(&self) -> Option<u32> {
        if self.0 == 0 {
            None
        } else {
            Some(63 - self.0.leading_zeros())
        }
    }

    /// Appends a new bit to the function.
    ///
    /// Participating bits form a strictly ascending sequence, so `bit` must
    /// exceed the highest bit already present.
    ///
    /// # Errors
    ///
    /// [`SolutionError::OutOfRange`] if `bit` does not fit in the address
    /// width, [`SolutionError::OutOfOrder`] if it does not extend the
    /// sequence.
    pub fn insert_bit(&mut self, bit: u32) -> Result<(), SolutionError> {
        if bit >= MAX_ADDR_BITS {
            return Err(SolutionError::OutOfRange(bit));
        }
        if let Some(highest) = self.highest_bit() {
            if bit <= highest {
                return Err(SolutionError::OutOfOrder { bit, highest });
            }
        }
        self.0 |= 1 << bit;
        Ok(())
    }

    /// The partition bit this function assigns to `addr`: the XOR of the
    /// selected address bits, i.e. the parity of `addr & mask`.
    ///
    /// Not meaningful for the constant-zero function; callers must not ask.
    pub fn evaluate(&self, addr: PhysAddr) -> u8 {
        debug_assert!(!self.is_empty(), "evaluating the constant-zero function");
        ((addr & self.0).count_ones() & 1) as u8
    }

    /// Iterates the participating bit indices in ascending order.
    pub fn bits(&self) -> impl Iterator<Item = u32> + '_ {
        (0..MAX_ADDR_BITS).filter(move |&i| self.0 >> i & 1 == 1)
    }

    /// Whether this function assigns equal partition bits to both addresses
    /// of every confirmed pair.
    ///
    /// Equivalent to `evaluate(a) == evaluate(b)` for each pair, checked as
    /// the parity of the mask against the pair's XOR delta. The
    /// constant-zero function is trivially consistent.
    pub fn is_consistent_with(&self, pairs: &[ConfirmedPair]) -> bool {
        pairs
            .iter()
            .all(|pair| (self.0 & pair.delta()).count_ones() & 1 == 0)
    }
}

impl BitXor for Solution {
    type Output = Solution;

    /// The symmetric difference of the two bit sets. For every address, the
    /// result evaluates to the XOR of the operands' partition bits.
    fn bitxor(self, rhs: Solution) -> Solution {
        Solution(self.0 ^ rhs.0)
    }
}

impl BitXorAssign for Solution {
    fn bitxor_assign(&mut self, rhs: Solution) {
        self.0 ^= rhs.0;
    }
}

impl Display for Solution {
    /// Renders as `Bit(6) ^ Bit(9)`; the constant-zero function renders as
    /// an empty string.
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        let mut sep = "";
        for bit in self.bits() {
            write!(f, "{}Bit({})", sep, bit)?;
            sep = " ^ ";
        }
        Ok(())
    }
}

impl fmt::Debug for Solution {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "Solution[{}]", self)
    }
}

impl Serialize for Solution {
    /// Serializes as the ascending list of participating bit indices.
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut seq = serializer.serialize_seq(Some(self.depth() as usize))?;
        for bit in self.bits() {
            seq.serialize_element(&bit)?;
        }
        seq.end()
    }
}

/// An unordered address pair the oracle confirmed to lie on the same
/// partition.
///
/// The XOR delta of the two addresses is what every consistency check
/// consults, so it is precomputed at construction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConfirmedPair {
    a: PhysAddr,
    b: PhysAddr,
    delta: u64,
}

impl ConfirmedPair {
    /// Records a confirmed pair. The two addresses must differ; an equal
    /// pair carries no information.
    pub fn new(a: PhysAddr, b: PhysAddr) -> Self {
        debug_assert_ne!(a, b, "a self-pair constrains nothing");
        ConfirmedPair { a, b, delta: a ^ b }
    }

    /// The two addresses.
    pub fn addrs(&self) -> (PhysAddr, PhysAddr) {
        (self.a, self.b)
    }

    /// The XOR of the two addresses: a mask of the bits in which they
    /// differ.
    pub fn delta(&self) -> u64 {
        self.delta
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfirmedPair, Solution, SolutionError};

    #[test]
    fn xor_is_commutative_and_self_inverse() {
        let a = Solution::from_bits(&[6, 10]).unwrap();
        let b = Solution::from_bits(&[7, 10, 13]).unwrap();
        assert_eq!(a ^ b, b ^ a);
        assert_eq!(a ^ b, Solution::from_bits(&[6, 7, 13]).unwrap());
        assert_eq!(a ^ a, Solution::empty());
        assert_eq!((a ^ b) ^ b, a);
    }

    #[test]
    fn evaluate_matches_bit_xor() {
        let s = Solution::from_bits(&[0, 3, 5]).unwrap();
        for addr in 0u64..64 {
            let expected = ((addr & 1) ^ (addr >> 3 & 1) ^ (addr >> 5 & 1)) as u8;
            assert_eq!(s.evaluate(addr), expected, "addr {:#x}", addr);
        }
    }

    #[test]
    fn xor_contract_on_evaluation() {
        let a = Solution::from_bits(&[2, 4]).unwrap();
        let b = Solution::from_bits(&[4, 7]).unwrap();
        let c = a ^ b;
        for addr in [0u64, 0x14, 0x94, 0xff, 0xdead_beef] {
            assert_eq!(c.evaluate(addr), a.evaluate(addr) ^ b.evaluate(addr));
        }
    }

    #[test]
    fn insert_bit_enforces_ascending_order() {
        let mut s = Solution::from_bits(&[6, 9]).unwrap();
        assert_eq!(
            s.insert_bit(9),
            Err(SolutionError::OutOfOrder { bit: 9, highest: 9 })
        );
        assert_eq!(
            s.insert_bit(4),
            Err(SolutionError::OutOfOrder { bit: 4, highest: 9 })
        );
        assert_eq!(s.insert_bit(64), Err(SolutionError::OutOfRange(64)));
        s.insert_bit(12).unwrap();
        assert_eq!(s, Solution::from_bits(&[6, 9, 12]).unwrap());
    }

    #[test]
    fn from_bits_rejects_wide_indices() {
        assert_eq!(
            Solution::from_bits(&[3, 65]),
            Err(SolutionError::OutOfRange(65))
        );
    }

    #[test]
    fn display_format() {
        let s = Solution::from_bits(&[6, 9, 13]).unwrap();
        assert_eq!(s.to_string(), "Bit(6) ^ Bit(9) ^ Bit(13)");
        assert_eq!(Solution::from_bits(&[4]).unwrap().to_string(), "Bit(4)");
        assert_eq!(Solution::empty().to_string(), "");
    }

    #[test]
    fn serializes_as_index_list() {
        let s = Solution::from_bits(&[6, 9]).unwrap();
        assert_eq!(serde_json::to_string(&s).unwrap(), "[6,9]");
    }

    #[test]
    fn consistency_uses_the_pair_delta() {
        let s = Solution::from_bits(&[6, 9]).unwrap();
        // Differ in bits 6 and 9 together: parity preserved.
        let same = ConfirmedPair::new(0x000, 0x240);
        // Differ in bit 6 only: parity flipped.
        let flip = ConfirmedPair::new(0x000, 0x040);
        assert!(s.is_consistent_with(&[same]));
        assert!(!s.is_consistent_with(&[same, flip]));
        assert!(Solution::empty().is_consistent_with(&[same, flip]));
    }
}
