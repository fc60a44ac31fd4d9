//! Result Validator (C9, spec §4.9, §8).
//!
//! Proves conservation of length, non-negativity, and efficiency/waste
//! consistency on a [`crate::types::Plan`] before the engine facade is
//! allowed to emit it. A failing validation is always fatal for that
//! specific response (spec §7): the caller discards the plan and returns
//! [`crate::error::ErrorKind::InternalInconsistency`], it never patches the
//! plan up and emits it anyway.

use std::collections::HashMap;

use crate::types::{Plan, ProfileId};

/// Numerical tolerance used throughout, per spec §8 ("within 1e-6 of base
/// unit" for bars, "within 0.1" for plan-level percentages/totals).
const BAR_EPSILON: f64 = 1e-6;
const PLAN_EPSILON: f64 = 0.1;

/// One invariant violation found in a plan.
#[derive(Clone, Debug, PartialEq)]
pub struct Inconsistency {
    /// Human-readable description of what failed.
    pub message: String,
}

/// Validate every universal invariant in spec §8 against `plan`, given the
/// demand it was supposed to satisfy (`(profile_type, length) -> quantity`,
/// already coalesced). Returns every violation found; an empty vector means
/// the plan is consistent and safe to emit.
pub fn validate(plan: &Plan, expected_demand: &HashMap<(ProfileId, u64), u32>) -> Vec<Inconsistency> {
    let mut problems = Vec::new();

    for (index, bar) in plan.bars.iter().enumerate() {
        if bar.stock_length == 0 {
            problems.push(Inconsistency {
                message: format!("bar {index}: stock_length must be > 0"),
            });
        }

        let span = bar.used_length as f64 + bar.remaining_length as f64 - bar.stock_length as f64;
        if span.abs() > BAR_EPSILON {
            problems.push(Inconsistency {
                message: format!(
                    "bar {index}: used_length ({}) + remaining_length ({}) != stock_length ({})",
                    bar.used_length, bar.remaining_length, bar.stock_length
                ),
            });
        }

        // The validator only sees the plan, not the constraints that
        // produced it, so it checks the loosest form of the invariant: a
        // bar can never claim less used length than the pieces placed on it.
        let piece_sum: u64 = bar.placements.iter().map(|p| p.length).sum();
        if (bar.used_length as f64) < piece_sum as f64 {
            problems.push(Inconsistency {
                message: format!("bar {index}: used_length ({}) is less than the sum of its placements ({piece_sum})", bar.used_length),
            });
        }

        if bar.cut_count as usize != bar.placements.len() {
            problems.push(Inconsistency {
                message: format!("bar {index}: cut_count ({}) does not match placement count ({})", bar.cut_count, bar.placements.len()),
            });
        }
    }

    let total_stock: u64 = plan.bars.iter().map(|b| b.stock_length).sum();
    let total_used: u64 = plan.bars.iter().map(|b| b.used_length).sum();
    let total_remaining: u64 = plan.bars.iter().map(|b| b.remaining_length).sum();

    let expected_efficiency = if total_stock == 0 { 0.0 } else { 100.0 * total_used as f64 / total_stock as f64 };
    if (plan.efficiency - expected_efficiency).abs() > PLAN_EPSILON {
        problems.push(Inconsistency {
            message: format!("reported efficiency {} differs from computed {expected_efficiency} by more than {PLAN_EPSILON}", plan.efficiency),
        });
    }

    if (plan.total_waste as f64 - total_remaining as f64).abs() > PLAN_EPSILON {
        problems.push(Inconsistency {
            message: format!("reported total_waste {} differs from computed {total_remaining} by more than {PLAN_EPSILON}", plan.total_waste),
        });
    }

    let mut actual_counts: HashMap<(ProfileId, u64), u32> = HashMap::new();
    for bar in &plan.bars {
        for placement in &bar.placements {
            *actual_counts.entry((bar.profile_type.clone(), placement.length)).or_insert(0) += 1;
        }
    }

    if !plan.infeasible {
        for (key, expected_qty) in expected_demand {
            let actual_qty = actual_counts.get(key).copied().unwrap_or(0);
            if actual_qty != *expected_qty {
                problems.push(Inconsistency {
                    message: format!("demand {:?} expected {expected_qty} placements, plan has {actual_qty}", key),
                });
            }
        }
        for key in actual_counts.keys() {
            if !expected_demand.contains_key(key) {
                problems.push(Inconsistency {
                    message: format!("plan places demand {:?} that was never requested", key),
                });
            }
        }
    }

    problems
}
