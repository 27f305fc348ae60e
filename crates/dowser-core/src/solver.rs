use crate::context::{find_highest_bit, HashContext};
use crate::oracle::PartitionOracle;
use crate::solution::{is_unique_basis, reduce, HypothesisIter, Solution};
use crate::util::NamedProgress;
use crate::PhysAddr;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use log::{debug, info, warn};
use serde::Serialize;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Configuration parameters for a solve run.
#[derive(Debug, Default, Clone)]
pub struct SolverConfig {
    /// Abort once this much wall-clock time has passed (None = unlimited).
    /// The deadline is checked between oracle probes and between hypothesis
    /// depths, never inside a blocking probe.
    pub timeout: Option<Duration>,
}

/// Errors that can end a solve.
#[derive(Debug, Error)]
pub enum SolveError<OE: std::error::Error> {
    /// The base sweep confirmed no same-partition pair, so there is nothing
    /// to fit hypotheses against.
    #[error("no same-partition pair found while sweeping for the base solution")]
    NoBasePairs,
    /// No XOR function over the base bit range fits the confirmed pairs.
    #[error("no XOR function is consistent with the {num_keys} confirmed pairs")]
    NoBaseSolutions {
        /// Pairs the hypotheses were checked against.
        num_keys: usize,
    },
    /// More independent functions survived than the bit range can tell
    /// apart, so the pairs underdetermine the hash.
    #[error(
        "{found} independent functions over bits {min_bit}..={max_bit} exceed the {limit} the range can express"
    )]
    AmbiguousBasis {
        /// Functions remaining after reduction.
        found: usize,
        /// Largest plausible basis for the range.
        limit: usize,
        /// Lower end of the fitted bit range.
        min_bit: u32,
        /// Upper end of the fitted bit range.
        max_bit: u32,
    },
    /// The configured deadline passed.
    #[error("solve exceeded the configured timeout of {0:?}")]
    Timeout(Duration),
    /// The oracle failed; the probe error is passed through.
    #[error(transparent)]
    Oracle(OE),
}

struct Deadline {
    timeout: Option<Duration>,
    start: Instant,
}

impl Deadline {
    fn new(timeout: Option<Duration>) -> Self {
        Deadline {
            timeout,
            start: Instant::now(),
        }
    }

    /// The configured timeout, once it has passed.
    fn expired(&self) -> Option<Duration> {
        self.timeout.filter(|&t| self.start.elapsed() >= t)
    }
}

/// Two-phase driver recovering the partition hash through an oracle.
///
/// Phase 1 brute-forces a basis over the lower half of the bit range: a
/// linear sweep collects same-partition pairs around the range start, every
/// XOR hypothesis over the low bits is checked against them, and the
/// consistent set is reduced to an independent basis. Phase 2 then folds in
/// each remaining high bit separately: a bit either joins a basis function
/// or it does not, so `2^n` candidate extensions cover every possibility
/// and a handful of probes eliminate all but one. Splitting the range this
/// way is exponentially cheaper than brute-forcing it whole, since each
/// extra brute-forced bit doubles both the sweep and the hypothesis space.
///
/// # Examples
///
/// ```
/// use dowser_core::{HashContext, Solver};
///
/// // Simulated controller hashing bit 6 XOR bit 9 into one partition bit.
/// let mut oracle = |a: u64, b: u64| ((a ^ b) & 0x240).count_ones() % 2 == 0;
///
/// let ctx = HashContext::new(6, 12, 0, 1 << 13)?;
/// let mut solver = Solver::new(ctx);
/// solver.solve(&mut oracle)?;
///
/// let rendered: Vec<String> = solver.solutions().iter().map(|s| s.to_string()).collect();
/// assert_eq!(rendered, ["Bit(6) ^ Bit(9)"]);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct Solver {
    ctx: HashContext,
    config: SolverConfig,
    progress: Option<MultiProgress>,
}

impl Solver {
    /// Creates a solver for a fresh context.
    pub fn new(ctx: HashContext) -> Self {
        Solver {
            ctx,
            config: SolverConfig::default(),
            progress: None,
        }
    }

    /// Replaces the configuration.
    pub fn with_config(mut self, config: SolverConfig) -> Self {
        self.config = config;
        self
    }

    /// Renders progress bars for the sweep and extension phases onto the
    /// given handle. Without one the solver is silent apart from logging.
    pub fn with_progress(mut self, progress: MultiProgress) -> Self {
        self.progress = Some(progress);
        self
    }

    /// The solver state.
    pub fn context(&self) -> &HashContext {
        &self.ctx
    }

    /// Releases the context, e.g. to reuse its keys.
    pub fn into_context(self) -> HashContext {
        self.ctx
    }

    /// The recovered basis (empty before a successful solve).
    pub fn solutions(&self) -> &[Solution] {
        self.ctx.solutions()
    }

    /// Prints the recovered basis to stdout, one function per line, e.g.
    /// `Bit(6) ^ Bit(9)`.
    pub fn print_solutions(&self) {
        for s in self.ctx.solutions() {
            println!("{}", s);
        }
    }

    /// Runs the full two-phase recovery.
    ///
    /// Expects a fresh context; on success the recovered basis is available
    /// through [`solutions`](Solver::solutions) and every confirmed pair
    /// through the context. Warns about any bit of the range that no
    /// confirmed pair exercised, since the basis cannot be trusted on such
    /// bits.
    ///
    /// # Errors
    ///
    /// See [`SolveError`]. An exhausted extension step only logs a warning
    /// and keeps the basis of the bits handled so far.
    pub fn solve<O: PartitionOracle>(
        &mut self,
        oracle: &mut O,
    ) -> Result<(), SolveError<O::Error>> {
        debug_assert!(
            self.ctx.solutions.is_empty(),
            "solve expects a fresh context"
        );
        let deadline = Deadline::new(self.config.timeout);

        let end_bit = self.find_base_solutions(oracle, &deadline)?;

        info!(
            "Extending the basis over bits {}..={}",
            end_bit + 1,
            self.ctx.max_bit
        );
        let remaining_bits = self.ctx.max_bit.saturating_sub(end_bit) as u64;
        let bar = self.progress.as_ref().map(|p| {
            let bar = p.add(ProgressBar::new(remaining_bits));
            bar.set_style(ProgressStyle::named_bar("Bit extension"));
            bar
        });
        for bit in end_bit + 1..=self.ctx.max_bit {
            accommodate_new_bit(&mut self.ctx, bit, oracle, &deadline)?;
            if let Some(bar) = &bar {
                bar.inc(1);
            }
        }
        if let Some(bar) = &bar {
            bar.finish();
        }

        self.ctx.warn_unexplored_bits();
        info!(
            "Recovered a basis of {} function(s) from {} confirmed pairs",
            self.ctx.solutions.len(),
            self.ctx.keys.len()
        );
        Ok(())
    }

    /// Phase 1: sweep for pairs around the range start and brute-force a
    /// basis over the lower bits. Returns the highest bit the basis covers.
    fn find_base_solutions<O: PartitionOracle>(
        &mut self,
        oracle: &mut O,
        deadline: &Deadline,
    ) -> Result<u32, SolveError<O::Error>> {
        let ctx = &mut self.ctx;

        // Half the range, but never below the bits already fixed by the
        // prefix of start_addr: those can only be exercised by the sweep.
        let mut end_bit = (ctx.max_bit + ctx.min_bit + 1) / 2;
        if let Some(prefix_bit) = find_highest_bit(ctx.start_addr, ctx.max_bit) {
            end_bit = end_bit.max(prefix_bit + 1);
        }

        let stride = 1u64 << ctx.min_bit;
        let sweep_end = match 1u64.checked_shl(end_bit + 1) {
            Some(limit) => ctx.end_addr.min(limit - 1),
            None => ctx.end_addr,
        };

        info!(
            "Finding base solutions over bits {}..={} (sweeping up to {:#x})",
            ctx.min_bit, end_bit, sweep_end
        );
        let sweep_len = sweep_end.saturating_sub(ctx.start_addr) / stride + 1;
        let bar = self.progress.as_ref().map(|p| {
            let bar = p.add(ProgressBar::new(sweep_len));
            bar.set_style(ProgressStyle::named_bar("Base pair sweep"));
            bar
        });

        ctx.base_addr = ctx.start_addr;
        ctx.test_addr = ctx.start_addr;
        while ctx.test_addr <= sweep_end {
            if let Some(t) = deadline.expired() {
                return Err(SolveError::Timeout(t));
            }
            if ctx.test_addr != ctx.base_addr
                && oracle
                    .same_partition(ctx.base_addr, ctx.test_addr)
                    .map_err(SolveError::Oracle)?
            {
                ctx.confirm_pair(ctx.base_addr, ctx.test_addr);
            }
            if let Some(bar) = &bar {
                bar.inc(1);
            }
            match ctx.test_addr.checked_add(stride) {
                Some(next) => ctx.test_addr = next,
                None => break,
            }
        }
        if let Some(bar) = &bar {
            bar.finish();
        }

        if ctx.keys.is_empty() {
            return Err(SolveError::NoBasePairs);
        }
        info!("{} confirmed pairs in the base sweep", ctx.keys.len());

        let mut found: Vec<Solution> = Vec::new();
        for depth in 1..=end_bit - ctx.min_bit + 1 {
            if let Some(t) = deadline.expired() {
                return Err(SolveError::Timeout(t));
            }
            let before = found.len();
            found.extend(
                HypothesisIter::new(depth, ctx.min_bit, end_bit)
                    .filter(|s| s.is_consistent_with(&ctx.keys)),
            );
            debug!("depth {}: {} consistent hypotheses", depth, found.len() - before);
        }
        if found.is_empty() {
            return Err(SolveError::NoBaseSolutions {
                num_keys: ctx.keys.len(),
            });
        }

        reduce(&mut found);
        if !is_unique_basis(found.len(), ctx.min_bit, end_bit) {
            return Err(SolveError::AmbiguousBasis {
                found: found.len(),
                limit: end_bit.abs_diff(ctx.min_bit) as usize + 1,
                min_bit: ctx.min_bit,
                max_bit: end_bit,
            });
        }
        info!(
            "Base basis: {} independent function(s) over bits {}..={}",
            found.len(),
            ctx.min_bit,
            end_bit
        );
        ctx.solutions = found;

        Ok(end_bit)
    }
}

/// Phase 2 step: fold `new_bit` into the basis.
///
/// Flipping `new_bit` toggles some subset of the basis functions, so the
/// `2^n` candidate bases (one per subset, inserting the bit into exactly
/// that subset's members) cover every possible role of the bit. Probing
/// addresses that differ from the anchor in `new_bit` and low bits
/// eliminates candidates until at most one remains.
fn accommodate_new_bit<O: PartitionOracle>(
    ctx: &mut HashContext,
    new_bit: u32,
    oracle: &mut O,
    deadline: &Deadline,
) -> Result<(), SolveError<O::Error>> {
    let num_solutions = ctx.solutions.len();
    debug_assert!(
        num_solutions < u64::BITS as usize,
        "basis size bounded by the uniqueness predicate"
    );

    let mut candidates: Vec<Vec<Solution>> = Vec::with_capacity(1 << num_solutions);
    for subset in 0u64..1u64 << num_solutions {
        let mut extended = ctx.solutions.clone();
        for (pos, s) in extended.iter_mut().enumerate() {
            if subset >> pos & 1 == 1 {
                s.insert_bit(new_bit)
                    .expect("extension bit exceeds every basis bit");
            }
        }
        candidates.push(extended);
    }

    let stride = 1u64 << ctx.min_bit;
    let sweep_end = match 1u64.checked_shl(new_bit + 1) {
        Some(two_spans) => ctx.end_addr.min(ctx.start_addr.saturating_add(two_spans)),
        None => ctx.end_addr,
    };

    ctx.base_addr = ctx.start_addr;
    ctx.test_addr = ctx.start_addr + (1u64 << new_bit);
    while ctx.test_addr <= sweep_end && candidates.len() > 1 {
        if let Some(t) = deadline.expired() {
            return Err(SolveError::Timeout(t));
        }
        if oracle
            .same_partition(ctx.base_addr, ctx.test_addr)
            .map_err(SolveError::Oracle)?
        {
            ctx.confirm_pair(ctx.base_addr, ctx.test_addr);
            candidates.retain(|basis| basis.iter().all(|s| s.is_consistent_with(&ctx.keys)));
        }
        match ctx.test_addr.checked_add(stride) {
            Some(next) => ctx.test_addr = next,
            None => break,
        }
    }

    if candidates.is_empty() {
        warn!(
            "every candidate extension for Bit({}) was eliminated; keeping the current basis",
            new_bit
        );
        return Ok(());
    }
    if candidates.len() > 1 {
        debug!(
            "{} extensions for Bit({}) still viable after the sweep; adopting the minimal one",
            candidates.len(),
            new_bit
        );
    }
    ctx.solutions = candidates.swap_remove(0);
    Ok(())
}

/// Summary of a completed solve, ready for JSON emission.
#[derive(Debug, Serialize)]
pub struct SolveReport {
    /// ISO 8601 timestamp of when the report was taken.
    date: String,
    /// Lower end of the investigated bit range.
    min_bit: u32,
    /// Upper end of the investigated bit range.
    max_bit: u32,
    /// First probe-able address.
    start_addr: PhysAddr,
    /// One past the last probe-able address.
    end_addr: PhysAddr,
    /// Same-partition pairs confirmed over the whole solve.
    confirmed_pairs: usize,
    /// The recovered basis, each function as its ascending bit indices.
    solutions: Vec<Solution>,
}

impl SolveReport {
    /// Captures the state of a (typically solved) context.
    pub fn new(ctx: &HashContext) -> Self {
        SolveReport {
            date: chrono::Local::now().to_rfc3339(),
            min_bit: ctx.min_bit(),
            max_bit: ctx.max_bit(),
            start_addr: ctx.start_addr(),
            end_addr: ctx.end_addr(),
            confirmed_pairs: ctx.keys().len(),
            solutions: ctx.solutions().to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{SolveError, Solver, SolverConfig};
    use crate::context::HashContext;
    use crate::solution::Solution;
    use std::time::Duration;

    #[test]
    fn expired_deadline_aborts_the_sweep() {
        let ctx = HashContext::new(6, 12, 0, 1 << 13).unwrap();
        let mut solver = Solver::new(ctx).with_config(SolverConfig {
            timeout: Some(Duration::ZERO),
        });
        let mut oracle = |_a: u64, _b: u64| true;
        match solver.solve(&mut oracle) {
            Err(SolveError::Timeout(t)) => assert_eq!(t, Duration::ZERO),
            other => panic!("expected timeout, got {:?}", other),
        }
    }

    #[test]
    fn report_captures_the_recovered_basis() {
        let ctx = HashContext::new(6, 12, 0, 1 << 13).unwrap();
        let mut solver = Solver::new(ctx);
        let mask = Solution::from_bits(&[6, 9]).unwrap().mask();
        let mut oracle = move |a: u64, b: u64| ((a ^ b) & mask).count_ones() % 2 == 0;
        solver.solve(&mut oracle).unwrap();

        let report = super::SolveReport::new(solver.context());
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["min_bit"], 6);
        assert_eq!(json["max_bit"], 12);
        assert_eq!(json["solutions"], serde_json::json!([[6, 9]]));
        assert!(json["confirmed_pairs"].as_u64().unwrap() > 0);
    }
}
