//! Exact Solver (C6, spec §4.6).
//!
//! Branch-and-bound on a cutting-pattern formulation. A pattern is a
//! non-empty multiset of piece *lengths* that fits one stock option (per
//! [`crate::constraints::check_admissible`]). Patterns are enumerated
//! lazily, deepest-first, ordered by decreasing efficiency; the lower bound
//! on bars still needed is `ceil(remaining length / best usable window)`.
//! Branching is "use this pattern at least once" vs. "forbid it entirely".
//! Only sensible for small workloads (`workload_size <= max_workload_size`,
//! enforced by the caller, see [`crate::selector`]); on timeout the caller
//! falls back to the primary heuristic (spec §4.12).

use std::collections::HashMap;

use crate::constraints::check_admissible;
use crate::placement::PlacementOutcome;
use crate::search::SolveContext;
use crate::types::{Bar, BnBParams, Constraints, DemandId, ExpandedPiece, Placement, ProfileId, StockOption};

/// A cutting pattern: how many of each distinct length fit on one bar of
/// `stock_length`, plus the leftover.
#[derive(Clone, Debug)]
struct Pattern {
    stock_length: u64,
    /// Index into the menu this pattern's stock option came from; used to
    /// enforce `StockOption::available` during search, since two menu
    /// entries can share a `stock_length` but carry different inventory.
    menu_index: usize,
    /// Parallel to the solver's distinct-length list: `counts[i]` pieces of
    /// `lengths[i]`.
    counts: Vec<u32>,
    gap: u64,
}

impl Pattern {
    fn piece_count(&self) -> u32 {
        self.counts.iter().sum()
    }

    fn efficiency(&self, stock_length: u64) -> f64 {
        if stock_length == 0 {
            0.0
        } else {
            1.0 - (self.gap as f64 / stock_length as f64)
        }
    }
}

/// Enumerate every admissible pattern for `stock_length` against the
/// distinct lengths/remaining counts in `lengths`, depth-first, most pieces
/// first so the richest patterns are tried first by the caller's sort.
fn enumerate_patterns(lengths: &[u64], available: &[u32], stock_length: u64, menu_index: usize, constraints: &Constraints) -> Vec<Pattern> {
    let mut patterns = Vec::new();
    let mut counts = vec![0u32; lengths.len()];
    enumerate_from(0, lengths, available, stock_length, menu_index, constraints, &mut counts, &mut patterns);
    patterns.sort_by(|a, b| {
        b.efficiency(stock_length)
            .partial_cmp(&a.efficiency(stock_length))
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    patterns
}

fn enumerate_from(
    index: usize,
    lengths: &[u64],
    available: &[u32],
    stock_length: u64,
    menu_index: usize,
    constraints: &Constraints,
    counts: &mut Vec<u32>,
    out: &mut Vec<Pattern>,
) {
    if index == lengths.len() {
        if counts.iter().any(|&c| c > 0) {
            if let Some(pattern) = build_pattern(lengths, counts, stock_length, menu_index, constraints) {
                out.push(pattern);
            }
        }
        return;
    }

    let max_possible = available[index];
    for count in (0..=max_possible).rev() {
        counts[index] = count;
        // Only recurse deeper if what we've placed so far is still admissible,
        // to keep enumeration bounded on the small workloads this solver is
        // restricted to.
        if counts_are_admissible(lengths, counts, stock_length, constraints) {
            enumerate_from(index + 1, lengths, available, stock_length, menu_index, constraints, counts, out);
        }
    }
    counts[index] = 0;
}

fn counts_are_admissible(lengths: &[u64], counts: &[u32], stock_length: u64, constraints: &Constraints) -> bool {
    let expanded = expand_counts(lengths, counts);
    expanded.is_empty() || check_admissible(&expanded, stock_length, constraints).is_ok()
}

fn build_pattern(lengths: &[u64], counts: &[u32], stock_length: u64, menu_index: usize, constraints: &Constraints) -> Option<Pattern> {
    let expanded = expand_counts(lengths, counts);
    let admissibility = check_admissible(&expanded, stock_length, constraints).ok()?;
    Some(Pattern {
        stock_length,
        menu_index,
        counts: counts.to_vec(),
        gap: admissibility.gap,
    })
}

fn expand_counts(lengths: &[u64], counts: &[u32]) -> Vec<u64> {
    let mut out = Vec::new();
    for (len, count) in lengths.iter().zip(counts.iter()) {
        for _ in 0..*count {
            out.push(*len);
        }
    }
    out
}

/// `ceil(sum(remaining lengths) / best usable window)`, the bound on bars
/// still required regardless of which patterns are chosen.
fn lower_bound(remaining: &[u32], lengths: &[u64], best_usable_window: u64) -> u32 {
    if best_usable_window == 0 {
        return remaining.iter().map(|&c| c).sum();
    }
    let total: u64 = remaining.iter().zip(lengths.iter()).map(|(&c, &l)| c as u64 * l).sum();
    ((total + best_usable_window - 1) / best_usable_window) as u32
}

struct SearchState<'a> {
    lengths: &'a [u64],
    patterns: &'a [Pattern],
    best_usable_window: u64,
    deadline_hit: bool,
}

fn search(
    state: &mut SearchState,
    remaining: &mut Vec<u32>,
    stock_remaining: &mut Vec<u32>,
    chosen: &mut Vec<usize>,
    best: &mut Option<Vec<usize>>,
    ctx: &SolveContext,
) {
    if state.deadline_hit || ctx.should_stop() {
        state.deadline_hit = true;
        return;
    }

    if remaining.iter().all(|&c| c == 0) {
        if best.as_ref().map_or(true, |b| chosen.len() < b.len()) {
            *best = Some(chosen.clone());
        }
        return;
    }

    let bound = chosen.len() as u32 + lower_bound(remaining, state.lengths, state.best_usable_window);
    if let Some(b) = best {
        if bound >= b.len() as u32 {
            return;
        }
    }

    for (pattern_idx, pattern) in state.patterns.iter().enumerate() {
        if state.deadline_hit || ctx.should_stop() {
            state.deadline_hit = true;
            return;
        }
        if !pattern.counts.iter().zip(remaining.iter()).all(|(&need, &have)| need <= have) {
            continue;
        }
        if pattern.piece_count() == 0 {
            continue;
        }
        // The pattern's menu entry has no bars left to spend; using it here
        // would overrun `StockOption::available`.
        if stock_remaining[pattern.menu_index] == 0 {
            continue;
        }

        for (slot, &used) in pattern.counts.iter().enumerate() {
            remaining[slot] -= used;
        }
        stock_remaining[pattern.menu_index] -= 1;
        chosen.push(pattern_idx);

        search(state, remaining, stock_remaining, chosen, best, ctx);

        chosen.pop();
        stock_remaining[pattern.menu_index] += 1;
        for (slot, &used) in pattern.counts.iter().enumerate() {
            remaining[slot] += used;
        }
    }
}

/// Result of a branch-and-bound attempt.
pub struct BnBResult {
    /// `Some` with the optimal (or best-found, if cut off) placement, or
    /// `None` if the workload exceeds `params.max_workload_size` or no
    /// feasible pattern covers every piece (the caller should fall back to
    /// a constructive heuristic in both cases).
    pub outcome: Option<PlacementOutcome>,
    /// Set when the search timed out before exhausting the tree.
    pub partial: bool,
}

/// Attempt an exact solve for `pieces` (one profile's expanded demand)
/// against `menu`. Returns `outcome: None` when `pieces.len() >
/// params.max_workload_size`; the caller is expected to fall back (spec
/// §4.12 "Exact solver timeout ... Fallback to primary heuristic").
pub fn solve(
    pieces: &[ExpandedPiece],
    profile_type: &ProfileId,
    menu: &[StockOption],
    constraints: &Constraints,
    params: &BnBParams,
    ctx: &SolveContext,
) -> BnBResult {
    if pieces.is_empty() {
        return BnBResult {
            outcome: Some(PlacementOutcome {
                bars: Vec::new(),
                infeasible: false,
            }),
            partial: false,
        };
    }

    if pieces.len() > params.max_workload_size {
        return BnBResult {
            outcome: None,
            partial: false,
        };
    }

    let mut demand_pool: HashMap<u64, Vec<DemandId>> = HashMap::new();
    for piece in pieces {
        demand_pool.entry(piece.length).or_default().push(piece.id);
    }
    let mut lengths: Vec<u64> = demand_pool.keys().copied().collect();
    lengths.sort_unstable_by(|a, b| b.cmp(a));
    let counts: Vec<u32> = lengths.iter().map(|l| demand_pool[l].len() as u32).collect();

    let bnb_deadline = SolveContext {
        seed: ctx.seed,
        deadline: Some(
            ctx.deadline
                .unwrap_or_else(|| std::time::Instant::now() + std::time::Duration::from_millis(params.time_budget_ms))
                .min(std::time::Instant::now() + std::time::Duration::from_millis(params.time_budget_ms)),
        ),
        cancellation: ctx.cancellation.clone(),
        workers: ctx.workers,
    };

    let mut best_usable_window = 0u64;
    let mut all_patterns: Vec<Pattern> = Vec::new();
    for (menu_index, option) in menu.iter().enumerate() {
        if let Ok(usable) = crate::constraints::usable_window(option.stock_length, constraints) {
            best_usable_window = best_usable_window.max(usable);
            all_patterns.extend(enumerate_patterns(&lengths, &counts, option.stock_length, menu_index, constraints));
        }
    }
    all_patterns.sort_by(|a, b| {
        b.efficiency(b.stock_length)
            .partial_cmp(&a.efficiency(a.stock_length))
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    if all_patterns.is_empty() {
        return BnBResult {
            outcome: None,
            partial: false,
        };
    }

    let mut state = SearchState {
        lengths: &lengths,
        patterns: &all_patterns,
        best_usable_window,
        deadline_hit: false,
    };

    let mut remaining = counts.clone();
    let mut stock_remaining: Vec<u32> = menu.iter().map(|option| option.available.unwrap_or(u32::MAX)).collect();
    let mut chosen = Vec::new();
    let mut best: Option<Vec<usize>> = None;
    search(&mut state, &mut remaining, &mut stock_remaining, &mut chosen, &mut best, &bnb_deadline);

    let chosen_patterns = match best {
        Some(p) => p,
        None => {
            return BnBResult {
                outcome: None,
                partial: state.deadline_hit,
            }
        }
    };

    let outcome = build_outcome(&chosen_patterns, &all_patterns, &lengths, &mut demand_pool, profile_type, constraints);

    BnBResult {
        outcome: Some(outcome),
        partial: state.deadline_hit,
    }
}

fn build_outcome(
    chosen_patterns: &[usize],
    patterns: &[Pattern],
    lengths: &[u64],
    demand_pool: &mut HashMap<u64, Vec<DemandId>>,
    profile_type: &ProfileId,
    constraints: &Constraints,
) -> PlacementOutcome {
    let mut bars = Vec::with_capacity(chosen_patterns.len());
    for &pattern_idx in chosen_patterns {
        let pattern = &patterns[pattern_idx];
        let mut placements = Vec::new();
        let mut offset = constraints.start_safety;
        for (slot, &count) in pattern.counts.iter().enumerate() {
            let length = lengths[slot];
            for _ in 0..count {
                let demand_id = demand_pool.get_mut(&length).and_then(Vec::pop).expect("pattern demand exceeds pool");
                placements.push(Placement {
                    length,
                    offset,
                    demand_id,
                });
                offset += length + constraints.kerf_width;
            }
        }
        let consumed = crate::constraints::consumed_span(
            &pattern
                .counts
                .iter()
                .enumerate()
                .flat_map(|(slot, &count)| std::iter::repeat(lengths[slot]).take(count as usize))
                .collect::<Vec<_>>(),
            constraints.kerf_width,
        );
        let used = crate::constraints::used_length(consumed, constraints);
        bars.push(Bar {
            stock_length: pattern.stock_length,
            profile_type: profile_type.clone(),
            placements,
            used_length: used,
            remaining_length: pattern.stock_length - used,
            cut_count: pattern.piece_count(),
        });
    }

    PlacementOutcome { bars, infeasible: false }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn piece(id: usize, length: u64) -> ExpandedPiece {
        ExpandedPiece {
            id,
            profile_type: "A".into(),
            length,
        }
    }

    #[test]
    fn finds_the_two_bar_optimum_bfd_also_finds() {
        let pieces = vec![piece(0, 3500), piece(1, 2500), piece(2, 2900), piece(3, 3100)];
        let menu = vec![StockOption {
            stock_length: 6000,
            available: None,
        }];
        let constraints = Constraints::default();
        let params = BnBParams::default();
        let ctx = SolveContext::with_budget_ms(1, 5_000, 1);

        let result = solve(&pieces, &"A".to_string(), &menu, &constraints, &params, &ctx);
        let outcome = result.outcome.expect("exact solver should find a plan");
        assert_eq!(outcome.bars.len(), 2);
        for bar in &outcome.bars {
            assert_eq!(bar.remaining_length, 0);
        }
    }

    #[test]
    fn exhausted_stock_availability_forces_a_decline_rather_than_overrunning_inventory() {
        // Two pieces of 5000 can only ever share a bar if a 10000+ stock
        // option existed; on a 6000 menu each needs its own bar. Only one
        // bar of that length is available, so no combination of patterns
        // can cover both pieces without spending more than one bar of the
        // single menu entry.
        let pieces = vec![piece(0, 5000), piece(1, 5000)];
        let menu = vec![StockOption {
            stock_length: 6000,
            available: Some(1),
        }];
        let constraints = Constraints::default();
        let params = BnBParams::default();
        let ctx = SolveContext::with_budget_ms(1, 5_000, 1);

        let result = solve(&pieces, &"A".to_string(), &menu, &constraints, &params, &ctx);
        assert!(result.outcome.is_none(), "solver must not emit a plan that overruns stock availability");
    }

    #[test]
    fn too_large_a_workload_declines() {
        let pieces: Vec<ExpandedPiece> = (0..50).map(|i| piece(i, 100)).collect();
        let menu = vec![StockOption {
            stock_length: 6000,
            available: None,
        }];
        let constraints = Constraints::default();
        let params = BnBParams {
            max_workload_size: 40,
            ..BnBParams::default()
        };
        let ctx = SolveContext::with_budget_ms(1, 5_000, 1);
        let result = solve(&pieces, &"A".to_string(), &menu, &constraints, &params, &ctx);
        assert!(result.outcome.is_none());
    }
}
