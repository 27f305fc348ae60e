use clap::Parser;
use dowser_core::{CachedOracle, HashContext, SolveReport, Solver, SolverConfig};
use dowser_synthetic::{GroundTruth, SyntheticOracle};
use indicatif::MultiProgress;
use log::info;
use std::time::Duration;

/// Recover the XOR partition hash of a simulated memory controller.
///
/// The ground truth comes from a JSON config; the solver only ever sees the
/// same-partition oracle, so a successful run demonstrates the probe budget
/// a hardware target of the same shape would need.
#[derive(Parser, Debug)]
struct CliArgs {
    /// Ground-truth hash model (JSON)
    #[clap(
        long = "config",
        default_value = "crates/oracles/dowser-synthetic/config/ddr4-banks.json"
    )]
    config: String,
    /// Lowest physical address bit the hash may consult
    #[clap(long, default_value_t = 12)]
    min_bit: u32,
    /// Highest physical address bit the hash may consult
    #[clap(long, default_value_t = 21)]
    max_bit: u32,
    /// First probe-able physical address
    #[clap(long, default_value_t = 0)]
    start_addr: u64,
    /// One past the last probe-able physical address [default: 2^(max_bit+1)]
    #[clap(long)]
    end_addr: Option<u64>,
    /// Abort the solve after this many seconds
    #[clap(long)]
    timeout: Option<u64>,
    /// Write a JSON solve report to this path
    #[clap(long)]
    report: Option<String>,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = CliArgs::parse();

    let truth = GroundTruth::from_jsonfile(&args.config)?;
    let mut oracle = CachedOracle::new(SyntheticOracle::from_ground_truth(&truth)?);

    let end_addr = args
        .end_addr
        .unwrap_or_else(|| 1u64.checked_shl(args.max_bit + 1).unwrap_or(u64::MAX));
    let ctx = HashContext::new(args.min_bit, args.max_bit, args.start_addr, end_addr)?;

    let mut solver = Solver::new(ctx)
        .with_config(SolverConfig {
            timeout: args.timeout.map(Duration::from_secs),
        })
        .with_progress(MultiProgress::new());
    solver.solve(&mut oracle)?;

    info!(
        "Recovered {} function(s) with {} distinct oracle probes",
        solver.solutions().len(),
        oracle.probes()
    );
    solver.print_solutions();

    if let Some(path) = &args.report {
        let report = SolveReport::new(solver.context());
        std::fs::write(path, serde_json::to_string_pretty(&report)?)?;
        info!("Report written to {}", path);
    }
    Ok(())
}
