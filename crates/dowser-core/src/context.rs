//! Solver state: bit range, address range, confirmed pairs and the working
//! solution set.

use crate::solution::{ConfirmedPair, Solution, MAX_ADDR_BITS};
use crate::util::Rng;
use crate::PhysAddr;
use log::warn;
use rand::Rng as _;
use thiserror::Error;

/// Errors rejecting an invalid [`HashContext`] configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// The bit range holds no bits.
    #[error("max_bit ({max_bit}) must be strictly greater than min_bit ({min_bit})")]
    BitRangeEmpty {
        /// Configured lower bit.
        min_bit: u32,
        /// Configured upper bit.
        max_bit: u32,
    },
    /// The upper bit does not fit in the supported address width.
    #[error("max_bit ({0}) must be below the supported address width of {MAX_ADDR_BITS} bits")]
    BitOutOfRange(u32),
    /// The address range holds no addresses.
    #[error("end_addr ({end_addr:#x}) must be strictly greater than start_addr ({start_addr:#x})")]
    AddressRangeEmpty {
        /// Configured range start.
        start_addr: PhysAddr,
        /// Configured range end.
        end_addr: PhysAddr,
    },
    /// The address range cannot exercise the highest configured bit.
    #[error("address span {span:#x} cannot exercise bit {max_bit}; need at least {required:#x}")]
    SpanTooSmall {
        /// Available span, `end_addr - start_addr`.
        span: u64,
        /// Required span, `2^max_bit`.
        required: u64,
        /// Configured upper bit.
        max_bit: u32,
    },
}

/// Live state of one hash recovery.
///
/// Owns the confirmed same-partition pairs, the working set of candidate
/// functions, and the bookkeeping masks tracking which address bits have
/// contributed information so far. Mutated only by the solver and by the
/// probing primitives below, in deterministic sequence.
#[derive(Debug)]
pub struct HashContext {
    pub(crate) min_bit: u32,
    pub(crate) max_bit: u32,

    pub(crate) start_addr: PhysAddr,
    pub(crate) end_addr: PhysAddr,

    /// Anchor address probes are paired against.
    pub(crate) base_addr: PhysAddr,
    /// Partner address currently being probed.
    pub(crate) test_addr: PhysAddr,

    pub(crate) keys: Vec<ConfirmedPair>,
    pub(crate) solutions: Vec<Solution>,

    /// Bits no confirmed pair has differed in since the last base rotation.
    pub(crate) unexplored_bits: u64,
    /// Bits no confirmed pair has ever differed in.
    pub(crate) global_unexplored_bits: u64,

    /// Highest bit currently used to generate probe partners.
    pub(crate) cur_bit_to_explore: u32,
}

impl HashContext {
    /// Validates the configuration and creates a fresh context.
    ///
    /// `min_bit..=max_bit` is the inclusive bit range the hash may consult;
    /// `start_addr..end_addr` the addresses that may be probed. The span
    /// must reach `2^max_bit`, otherwise the highest bit could never differ
    /// between two probe-able addresses.
    ///
    /// # Errors
    ///
    /// One [`ConfigError`] variant per violated precondition.
    pub fn new(
        min_bit: u32,
        max_bit: u32,
        start_addr: PhysAddr,
        end_addr: PhysAddr,
    ) -> Result<Self, ConfigError> {
        if max_bit <= min_bit {
            return Err(ConfigError::BitRangeEmpty { min_bit, max_bit });
        }
        if max_bit >= MAX_ADDR_BITS {
            return Err(ConfigError::BitOutOfRange(max_bit));
        }
        if end_addr <= start_addr {
            return Err(ConfigError::AddressRangeEmpty {
                start_addr,
                end_addr,
            });
        }
        let span = end_addr - start_addr;
        let required = 1u64 << max_bit;
        if span < required {
            return Err(ConfigError::SpanTooSmall {
                span,
                required,
                max_bit,
            });
        }

        Ok(HashContext {
            min_bit,
            max_bit,
            start_addr,
            end_addr,
            base_addr: start_addr,
            test_addr: start_addr,
            keys: Vec::new(),
            solutions: Vec::new(),
            unexplored_bits: u64::MAX,
            global_unexplored_bits: u64::MAX,
            cur_bit_to_explore: max_bit,
        })
    }

    /// Lower end of the bit range under investigation.
    pub fn min_bit(&self) -> u32 {
        self.min_bit
    }

    /// Upper end of the bit range under investigation.
    pub fn max_bit(&self) -> u32 {
        self.max_bit
    }

    /// First probe-able address.
    pub fn start_addr(&self) -> PhysAddr {
        self.start_addr
    }

    /// One past the last probe-able address.
    pub fn end_addr(&self) -> PhysAddr {
        self.end_addr
    }

    /// The anchor address probes are currently paired against.
    pub fn base_addr(&self) -> PhysAddr {
        self.base_addr
    }

    /// The confirmed same-partition pairs collected so far.
    pub fn keys(&self) -> &[ConfirmedPair] {
        &self.keys
    }

    /// The current working set of candidate functions. After a successful
    /// solve this is the recovered basis.
    pub fn solutions(&self) -> &[Solution] {
        &self.solutions
    }

    /// Bits no pair has differed in since the last base rotation.
    pub fn unexplored_bits(&self) -> u64 {
        self.unexplored_bits
    }

    /// Bits no pair has ever differed in.
    pub fn global_unexplored_bits(&self) -> u64 {
        self.global_unexplored_bits
    }

    /// Highest bit currently used to generate probe partners.
    pub fn cur_bit_to_explore(&self) -> u32 {
        self.cur_bit_to_explore
    }

    /// Records an oracle-confirmed same-partition pair and marks every bit
    /// in which the two addresses differ as explored.
    ///
    /// A self-pair constrains nothing and is ignored.
    pub fn confirm_pair(&mut self, a: PhysAddr, b: PhysAddr) {
        if a == b {
            return;
        }
        let pair = ConfirmedPair::new(a, b);
        self.unexplored_bits &= !pair.delta();
        self.global_unexplored_bits &= !pair.delta();
        self.keys.push(pair);
    }

    /// Abandons the current anchor and starts over from a random one.
    ///
    /// Used by single-step exploration drivers when a base address is
    /// exhausted without yielding a basis: the collected pairs are
    /// discarded, per-base exploration state is reset, and a new anchor is
    /// drawn uniformly from the address range, aligned down to the probe
    /// stride. Warns about any bit that no pair has ever exercised before
    /// the rotation discards that evidence.
    pub fn rotate_base(&mut self, rng: &mut Rng) {
        self.warn_unexplored_bits();

        self.keys.clear();
        self.unexplored_bits = u64::MAX;
        self.cur_bit_to_explore = self.max_bit;

        let addr = rng.random_range(self.start_addr..=self.end_addr);
        self.base_addr = addr & !((1u64 << self.min_bit) - 1);
    }

    /// Warns about every bit of the investigated range that no confirmed
    /// pair has ever differed in. Such a bit contributed no information,
    /// so its role in the recovered functions is a guess.
    pub fn warn_unexplored_bits(&self) {
        for bit in self.min_bit..=self.max_bit {
            if self.global_unexplored_bits >> bit & 1 == 1 {
                warn!("Bit({}) possibly not covered by any confirmed pair", bit);
            }
        }
    }
}

/// Highest bit set in `mask` at or below `ceiling`, if any.
pub fn find_highest_bit(mask: u64, ceiling: u32) -> Option<u32> {
    let start = ceiling.min(MAX_ADDR_BITS - 1);
    (0..=start).rev().find(|&bit| mask >> bit & 1 == 1)
}
