//! Synthetic partition oracle for `dowser-core`.
//!
//! Simulates a memory controller whose partition hash is known: the ground
//! truth is a list of XOR bit functions, loadable from a JSON file in the
//! same shape real DRAM addressing configs are published in. Used to
//! validate the solver end-to-end and to dry-run probe budgets before
//! touching hardware.

mod ground_truth;
mod oracle;

pub use crate::ground_truth::{BitDef, Error, GroundTruth};
pub use crate::oracle::SyntheticOracle;
