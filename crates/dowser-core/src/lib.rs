//! # Dowser Core
//!
//! `dowser-core` recovers the bit-level hash function a hardware memory
//! controller uses to map physical addresses onto partitions (DRAM banks,
//! cache slices, NUMA nodes). The hash is assumed to be a set of XOR-based
//! linear functions over physical address bits: each function XORs a fixed
//! selection of address bits into one bit of the partition index. The only
//! input is an oracle answering "do these two addresses lie on the same
//! partition?", typically backed by a timing side channel or a performance
//! counter on real hardware.
//!
//! ## Architecture Overview
//!
//! - [`oracle::PartitionOracle`] - The interface a hardware probe (or a
//!   simulation of one) must satisfy. Closures implement it directly;
//!   [`oracle::CachedOracle`] memoizes expensive probes.
//!
//! - [`context::HashContext`] - Owns the solver state: the bit range under
//!   investigation, the probe-able address range, the confirmed
//!   same-partition pairs, and the working set of candidate functions.
//!
//! - [`Solver`] - The two-phase driver. Phase 1 brute-forces a basis of XOR
//!   functions over the lower half of the bit range; phase 2 folds in each
//!   remaining high bit with a constant number of probes per bit, which is
//!   exponentially cheaper than widening the brute force.
//!
//! - [`solution`] module - The combinatorial primitives the driver
//!   orchestrates: the [`solution::Solution`] bitmask representation of one
//!   XOR function, the lexicographic hypothesis enumerator, and the GF(2)
//!   reducer that canonicalizes a solution set into an independent basis.
//!
//! ## Scope
//!
//! The solver is single-threaded and synchronous; oracle calls may block
//! arbitrarily long on hardware. Only XOR-based hashes of physical address
//! bits are in scope; translating virtual addresses and talking to the
//! hardware are the caller's problem.

#![warn(missing_docs)]

pub mod context;
pub mod oracle;
pub mod solution;
mod solver;
pub mod util;

pub use crate::context::{ConfigError, HashContext};
pub use crate::oracle::{CachedOracle, PartitionOracle};
pub use crate::solution::Solution;
pub use crate::solver::{SolveError, SolveReport, Solver, SolverConfig};

/// A physical address, treated as an opaque machine word.
///
/// The solver only ever XORs, masks, compares and subtracts addresses; the
/// caller is responsible for the range being physically meaningful.
pub type PhysAddr = u64;
