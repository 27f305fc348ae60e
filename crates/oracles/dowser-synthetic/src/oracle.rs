use crate::ground_truth::{Error, GroundTruth};
use dowser_core::{PartitionOracle, PhysAddr, Solution};
use std::convert::Infallible;

/// Partition oracle over a known XOR hash.
///
/// Each configured mask contributes one bit to the partition index, in the
/// same way a memory controller folds address bits into a bank number. The
/// oracle never fails and counts how often it is asked, which stands in for
/// the probe budget a hardware oracle would burn.
pub struct SyntheticOracle {
    masks: Vec<u64>,
    probes: u64,
}

impl SyntheticOracle {
    /// Creates an oracle from raw participation masks.
    pub fn new(masks: Vec<u64>) -> Self {
        SyntheticOracle { masks, probes: 0 }
    }

    /// Creates an oracle from a ground-truth model.
    ///
    /// # Errors
    ///
    /// Rejects models with bit indices beyond the address width.
    pub fn from_ground_truth(truth: &GroundTruth) -> Result<Self, Error> {
        Ok(Self::new(truth.masks()?))
    }

    /// Creates an oracle from solver-style solutions, e.g. to cross-check a
    /// recovered basis against the pairs that produced it.
    pub fn from_solutions(solutions: &[Solution]) -> Self {
        Self::new(solutions.iter().map(Solution::mask).collect())
    }

    /// The partition index the simulated controller assigns to `addr`:
    /// every mask folds to its parity and the bits concatenate, most
    /// significant function first.
    pub fn partition_of(&self, addr: PhysAddr) -> u64 {
        let mut index = 0u64;
        for &mask in &self.masks {
            index <<= 1;
            index |= ((addr & mask).count_ones() & 1) as u64;
        }
        index
    }

    /// Number of pair questions asked so far.
    pub fn probes(&self) -> u64 {
        self.probes
    }
}

impl PartitionOracle for SyntheticOracle {
    type Error = Infallible;

    fn same_partition(&mut self, a: PhysAddr, b: PhysAddr) -> Result<bool, Infallible> {
        self.probes += 1;
        Ok(self.partition_of(a) == self.partition_of(b))
    }
}
