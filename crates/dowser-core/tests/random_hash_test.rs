//! Property suite: random ground-truth hashes are recovered exactly.

use dowser_core::util::Rng;
use dowser_core::{HashContext, PhysAddr, Solver};
use rand::Rng as _;
use std::collections::HashSet;

/// All XOR combinations of the given masks, the zero mask included.
fn span(masks: &[u64]) -> HashSet<u64> {
    let mut out = HashSet::from([0u64]);
    for &m in masks {
        let prior: Vec<u64> = out.iter().copied().collect();
        for p in prior {
            out.insert(p ^ m);
        }
    }
    out
}

#[test]
fn random_ground_truths_are_recovered() {
    let mut rng = Rng::from_seed(0x5eed_cafe);

    for round in 0..40 {
        let min_bit: u32 = rng.random_range(4..=8);
        let max_bit = min_bit + rng.random_range(6..=9);
        let end_addr = 1u64 << (max_bit + 1);

        // The bit up to which the solver brute-forces with start_addr 0.
        let base_end_bit = (max_bit + min_bit + 1) / 2;

        // Ground truth: 1-4 functions with distinct anchor bits in the
        // brute-forced range (a function invisible there is unrecoverable
        // by construction) and random high-bit extensions.
        let num_functions = rng.random_range(1..=4usize);
        let mut anchors: Vec<u32> = Vec::new();
        while anchors.len() < num_functions {
            let bit = rng.random_range(min_bit..=base_end_bit);
            if !anchors.contains(&bit) {
                anchors.push(bit);
            }
        }
        let mut truth: Vec<u64> = Vec::new();
        for &anchor in &anchors {
            let mut mask = 1u64 << anchor;
            for high in base_end_bit + 1..=max_bit {
                if rng.random_bool(0.4) {
                    mask |= 1 << high;
                }
            }
            truth.push(mask);
        }

        let masks = truth.clone();
        let mut oracle =
            move |a: PhysAddr, b: PhysAddr| masks.iter().all(|&m| ((a ^ b) & m).count_ones() % 2 == 0);

        let ctx = HashContext::new(min_bit, max_bit, 0, end_addr).unwrap();
        let mut solver = Solver::new(ctx);
        solver
            .solve(&mut oracle)
            .unwrap_or_else(|e| panic!("round {}: bits {}..={}: {}", round, min_bit, max_bit, e));

        let recovered: Vec<u64> = solver.solutions().iter().map(|s| s.mask()).collect();

        // Indices ascending, non-empty, within range; basis not larger than
        // the range can express.
        for s in solver.solutions() {
            let bits: Vec<u32> = s.bits().collect();
            assert!(!bits.is_empty(), "round {}: empty solution", round);
            assert!(bits.windows(2).all(|w| w[0] < w[1]));
            assert!(
                bits.iter().all(|&b| (min_bit..=max_bit).contains(&b)),
                "round {}: {} outside {}..={}",
                round,
                s,
                min_bit,
                max_bit
            );
        }
        assert!(recovered.len() <= (max_bit - min_bit + 1) as usize);

        // Linear independence: 2^n distinct combinations.
        assert_eq!(
            span(&recovered).len(),
            1 << recovered.len(),
            "round {}: dependent basis {:?}",
            round,
            solver.solutions()
        );

        // The recovered span is exactly the ground-truth span.
        assert_eq!(
            span(&recovered),
            span(&truth),
            "round {}: basis {:?} does not span the ground truth {:?}",
            round,
            solver.solutions(),
            truth
        );

        // Every basis solution agrees with every confirmed pair.
        for pair in solver.context().keys() {
            for s in solver.solutions() {
                let (a, b) = pair.addrs();
                assert_eq!(s.evaluate(a), s.evaluate(b));
            }
        }
    }
}
