//! Permutation chromosome and its FFD-style decoder (spec §4.5, §9).
//!
//! Per the redesign cue in spec §9, the chromosome is a compact index
//! array (`u32`), not a vector of piece structs: it is a permutation of
//! `0..pieces.len()` and is decoded by running first-fit packing over the
//! expanded pieces in that order.

use rand::Rng;

use crate::placement::first_fit_pack;
use crate::placement::PlacementOutcome;
use crate::scorer::{self, PlanMetrics, ScoreCeilings};
use crate::types::{Constraints, ExpandedPiece, Objectives, ProfileId, StockOption};

/// A permutation over the indices of the expanded demand for one profile.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Chromosome {
    /// `order[i]` is the index into the original piece slice placed i-th.
    pub order: Vec<u32>,
}

impl Chromosome {
    /// An identity-order chromosome (same order as the input slice).
    pub fn identity(len: usize) -> Self {
        Chromosome {
            order: (0..len as u32).collect(),
        }
    }

    /// A uniformly-shuffled chromosome.
    pub fn random<R: Rng + ?Sized>(len: usize, rng: &mut R) -> Self {
        let mut order: Vec<u32> = (0..len as u32).collect();
        use rand::seq::SliceRandom;
        order.shuffle(rng);
        Chromosome { order }
    }

    /// Decode this chromosome against `pieces` by running first-fit
    /// packing over the pieces in the permuted order.
    pub fn decode(
        &self,
        pieces: &[ExpandedPiece],
        profile_type: &ProfileId,
        menu: &[StockOption],
        constraints: &Constraints,
    ) -> PlacementOutcome {
        let permuted: Vec<ExpandedPiece> = self.order.iter().map(|&i| pieces[i as usize].clone()).collect();
        first_fit_pack(&permuted, profile_type, menu, constraints)
    }

    /// Ordered crossover (OX): copies a contiguous slice from `self` into
    /// the child at the same positions, then fills the remaining positions
    /// with `other`'s genes in `other`'s relative order, skipping genes
    /// already copied. Preserves the permutation invariant.
    pub fn order_crossover<R: Rng + ?Sized>(&self, other: &Chromosome, rng: &mut R) -> Chromosome {
        let n = self.order.len();
        if n < 2 {
            return self.clone();
        }

        let mut a = rng.gen_range(0..n);
        let mut b = rng.gen_range(0..n);
        if a > b {
            std::mem::swap(&mut a, &mut b);
        }

        let mut child: Vec<Option<u32>> = vec![None; n];
        let mut used = vec![false; n];
        for i in a..=b {
            child[i] = Some(self.order[i]);
            used[self.order[i] as usize] = true;
        }

        let mut fill_pos = (b + 1) % n;
        let mut src_pos = (b + 1) % n;
        while child[fill_pos].is_none() || fill_pos == a {
            // Walk forward through `other` collecting genes not yet used.
            let gene = other.order[src_pos];
            if !used[gene as usize] {
                child[fill_pos] = Some(gene);
                used[gene as usize] = true;
                fill_pos = (fill_pos + 1) % n;
            }
            src_pos = (src_pos + 1) % n;
            if fill_pos == a && child[a].is_some() {
                break;
            }
        }

        // Any remaining holes (can occur when n == b - a + 1) are filled
        // directly with self's order to guarantee a full permutation.
        for i in 0..n {
            if child[i].is_none() {
                child[i] = Some(self.order[i]);
            }
        }

        Chromosome {
            order: child.into_iter().map(|g| g.unwrap()).collect(),
        }
    }

    /// Swap mutation: each gene is swapped with a uniformly-chosen other
    /// gene with probability `1/n` (spec §4.5).
    pub fn swap_mutate<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        let n = self.order.len();
        if n < 2 {
            return;
        }
        let rate = 1.0 / n as f64;
        for i in 0..n {
            if rng.gen_bool(rate) {
                let j = rng.gen_range(0..n);
                self.order.swap(i, j);
            }
        }
    }
}

/// Fitness of a decoded chromosome: the C2 score of its resulting plan,
/// with a penalty subtracted when it leaves pieces unplaced (mirrors the
/// teacher's `fitness - 1.0` penalty for invalid solutions, generalized
/// from "unused cut pieces" to "infeasible placement").
pub fn fitness_of(
    outcome: &PlacementOutcome,
    objectives: &Objectives,
    ceilings: ScoreCeilings,
    max_waste_pct: f64,
) -> f64 {
    if outcome.bars.is_empty() {
        return 0.0;
    }

    let total_stock: u64 = outcome.bars.iter().map(|b| b.stock_length).sum();
    let total_used: u64 = outcome.bars.iter().map(|b| b.used_length).sum();
    let total_waste: u64 = outcome.bars.iter().map(|b| b.remaining_length).sum();
    let efficiency = if total_stock == 0 {
        0.0
    } else {
        100.0 * total_used as f64 / total_stock as f64
    };
    let waste_pct = 100.0 - efficiency;

    let breakdown = scorer::score(
        PlanMetrics {
            waste_pct,
            efficiency,
            cost: 0.0,
            time_ms: 0.0,
        },
        objectives,
        ceilings,
        max_waste_pct,
    );

    if outcome.infeasible {
        breakdown.fitness - 1.0
    } else {
        breakdown.fitness
    }
}
