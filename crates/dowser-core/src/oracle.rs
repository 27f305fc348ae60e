//! The partition oracle abstraction.
//!
//! The solver never touches hardware itself; it asks an oracle whether two
//! physical addresses lie on the same partition. On real machines the
//! oracle is typically backed by a timing side channel (row-buffer conflict
//! latency, cache-slice probing) and a single probe can take milliseconds,
//! so [`CachedOracle`] is provided to amortize repeated questions.

use crate::PhysAddr;
use std::collections::HashMap;
use std::convert::Infallible;

/// Answers whether two physical addresses lie on the same partition.
///
/// Implementations must be deterministic on identical inputs within a
/// single solve and are free to block arbitrarily long. Any `FnMut(a, b)
/// -> bool` closure is an (infallible) oracle.
pub trait PartitionOracle {
    /// The error type returned by a failed probe.
    type Error: std::error::Error;

    /// Whether `a` and `b` map to the same partition.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying probe fails; the solver aborts on
    /// the first oracle error.
    fn same_partition(&mut self, a: PhysAddr, b: PhysAddr) -> Result<bool, Self::Error>;
}

impl<F> PartitionOracle for F
where
    F: FnMut(PhysAddr, PhysAddr) -> bool,
{
    type Error = Infallible;

    fn same_partition(&mut self, a: PhysAddr, b: PhysAddr) -> Result<bool, Infallible> {
        Ok(self(a, b))
    }
}

/// Memoizing wrapper around an expensive oracle.
///
/// Answers are keyed on the canonically ordered pair, so `(a, b)` and
/// `(b, a)` share one cache entry. Only distinct questions reach the
/// underlying probe; [`probes`](CachedOracle::probes) counts them.
pub struct CachedOracle<O> {
    inner: O,
    answers: HashMap<(PhysAddr, PhysAddr), bool>,
    probes: u64,
}

impl<O: PartitionOracle> CachedOracle<O> {
    /// Wraps an oracle with an empty cache.
    pub fn new(inner: O) -> Self {
        CachedOracle {
            inner,
            answers: HashMap::new(),
            probes: 0,
        }
    }

    /// Number of questions that reached the underlying oracle.
    pub fn probes(&self) -> u64 {
        self.probes
    }

    /// Discards the cache and returns the underlying oracle.
    pub fn into_inner(self) -> O {
        self.inner
    }
}

impl<O: PartitionOracle> PartitionOracle for CachedOracle<O> {
    type Error = O::Error;

    fn same_partition(&mut self, a: PhysAddr, b: PhysAddr) -> Result<bool, O::Error> {
        let key = if a <= b { (a, b) } else { (b, a) };
        if let Some(&answer) = self.answers.get(&key) {
            return Ok(answer);
        }
        let answer = self.inner.same_partition(key.0, key.1)?;
        self.probes += 1;
        self.answers.insert(key, answer);
        Ok(answer)
    }
}

#[cfg(test)]
mod tests {
    use super::{CachedOracle, PartitionOracle};

    #[test]
    fn closures_are_oracles() {
        let mut oracle = |a: u64, b: u64| (a ^ b) & 0x40 == 0;
        assert!(oracle.same_partition(0x00, 0x80).unwrap());
        assert!(!oracle.same_partition(0x00, 0x40).unwrap());
    }

    #[test]
    fn cache_folds_symmetric_questions() {
        let mut hits = 0u32;
        let mut cached = CachedOracle::new(|a: u64, b: u64| {
            hits += 1;
            a % 128 == b % 128
        });

        assert!(cached.same_partition(0x80, 0x100).unwrap());
        assert!(cached.same_partition(0x100, 0x80).unwrap());
        assert!(cached.same_partition(0x80, 0x100).unwrap());
        assert_eq!(cached.probes(), 1);
        drop(cached);
        assert_eq!(hits, 1);
    }
}
