//! Full-stack run: JSON ground truth -> synthetic oracle -> solver.

use dowser_core::{CachedOracle, HashContext, Solution, Solver};
use dowser_synthetic::{GroundTruth, SyntheticOracle};

#[test]
fn recovers_the_sample_bank_functions() -> anyhow::Result<()> {
    let _ = env_logger::builder().is_test(true).try_init();

    let truth = GroundTruth::from_jsonfile("config/ddr4-banks.json")?;
    let mut oracle = CachedOracle::new(SyntheticOracle::from_ground_truth(&truth)?);

    let ctx = HashContext::new(12, 21, 0, 1 << 22)?;
    let mut solver = Solver::new(ctx);
    solver.solve(&mut oracle)?;

    let expected: Vec<Solution> = [[14, 18], [15, 19], [16, 20], [17, 21]]
        .iter()
        .map(|bits| Solution::from_bits(bits).unwrap())
        .collect();
    assert_eq!(solver.solutions(), expected.as_slice());

    // The cache keeps the probe budget bounded by the two sweep phases.
    assert!(oracle.probes() > 0);
    Ok(())
}

#[test]
fn recovered_basis_reproduces_the_partitioning() -> anyhow::Result<()> {
    let truth = GroundTruth::from_jsonfile("config/ddr4-banks.json")?;
    let mut oracle = SyntheticOracle::from_ground_truth(&truth)?;

    let ctx = HashContext::new(12, 21, 0, 1 << 22)?;
    let mut solver = Solver::new(ctx);
    solver.solve(&mut oracle)?;

    // An oracle built from the recovered basis partitions exactly like the
    // ground truth across the probe-able range.
    let recovered = SyntheticOracle::from_solutions(solver.solutions());
    let reference = SyntheticOracle::from_ground_truth(&truth)?;
    for addr in (0u64..1 << 22).step_by(1 << 12) {
        assert_eq!(
            recovered.partition_of(addr) == recovered.partition_of(0),
            reference.partition_of(addr) == reference.partition_of(0),
            "partition mismatch at {:#x}",
            addr
        );
    }
    Ok(())
}
