//! Objective Scorer (C2, spec §4.2).
//!
//! Blends waste/cost/time/efficiency into a single fitness value plus a
//! breakdown, so the selector and the metaheuristics can both rank
//! candidate plans and reason about the trade-offs behind a ranking.

use crate::types::{ObjectiveKind, Objectives};

/// The handful of plan metrics the scorer needs; callers build this from a
/// [`crate::types::Plan`] plus a cost figure rather than passing the whole
/// plan, so the scorer stays usable mid-search before a full `Plan` exists.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PlanMetrics {
    /// Waste percentage, `[0,100]`.
    pub waste_pct: f64,
    /// Efficiency, `[0,100]`.
    pub efficiency: f64,
    /// Total cost in whatever currency the cost model uses.
    pub cost: f64,
    /// Execution time so far, in milliseconds.
    pub time_ms: f64,
}

/// Per-objective normalised scores plus the blended fitness.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ScoreBreakdown {
    /// `1 - min(1, waste_pct / max_waste_pct)`.
    pub waste_score: f64,
    /// `efficiency / 100`.
    pub efficiency_score: f64,
    /// `1 - cost / cost_ceiling`, clamped to `[0,1]`.
    pub cost_score: f64,
    /// `1 - time / time_ceiling`, clamped to `[0,1]`.
    pub time_score: f64,
    /// Weighted sum of the above, `[0,1]`.
    pub fitness: f64,
}

/// Ceiling values used to normalise the cost and time scores. Cost ceiling
/// is conventionally the cost of a worst-case "one piece per bar" plan;
/// time ceiling is the configured budget.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ScoreCeilings {
    /// Cost of the worst-case one-piece-per-bar plan.
    pub cost_ceiling: f64,
    /// Time budget in milliseconds.
    pub time_ceiling: f64,
}

/// Score a candidate plan's metrics against a set of objectives.
pub fn score(metrics: PlanMetrics, objectives: &Objectives, ceilings: ScoreCeilings, max_waste_pct: f64) -> ScoreBreakdown {
    let max_waste_pct = if max_waste_pct <= 0.0 { 100.0 } else { max_waste_pct };

    let waste_score = 1.0 - (metrics.waste_pct / max_waste_pct).min(1.0).max(0.0);
    let efficiency_score = (metrics.efficiency / 100.0).clamp(0.0, 1.0);
    let cost_score = if ceilings.cost_ceiling <= 0.0 {
        1.0
    } else {
        (1.0 - metrics.cost / ceilings.cost_ceiling).clamp(0.0, 1.0)
    };
    let time_score = if ceilings.time_ceiling <= 0.0 {
        1.0
    } else {
        (1.0 - metrics.time_ms / ceilings.time_ceiling).clamp(0.0, 1.0)
    };

    let weights = objectives.effective_weights();
    let mut fitness = 0.0;
    for (kind, weight) in &weights {
        fitness += weight
            * match kind {
                ObjectiveKind::MinimizeWaste => waste_score,
                ObjectiveKind::MaximizeEfficiency => efficiency_score,
                ObjectiveKind::MinimizeCost => cost_score,
                ObjectiveKind::MinimizeTime => time_score,
            };
    }

    ScoreBreakdown {
        waste_score,
        efficiency_score,
        cost_score,
        time_score,
        fitness: fitness.clamp(0.0, 1.0),
    }
}

/// Cost of a worst-case plan that places exactly one piece per bar, used as
/// the default cost ceiling for [`ScoreCeilings`].
pub fn worst_case_cost_ceiling(piece_lengths: &[u64], cost_model: &crate::types::CostModel, smallest_fitting_stock: impl Fn(u64) -> u64) -> f64 {
    let mut material = 0.0;
    let mut cutting = 0.0;
    let setup = cost_model.setup_cost * piece_lengths.len() as f64;
    let energy = cost_model.energy_cost * cost_model.energy_per_stock * piece_lengths.len() as f64;
    for &len in piece_lengths {
        material += cost_model.material_cost * smallest_fitting_stock(len) as f64;
        cutting += cost_model.cutting_cost;
    }
    material + cutting + setup + energy
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Objective, Priority};

    #[test]
    fn equal_weights_when_no_objectives_given() {
        let objectives = Objectives::default();
        let s = score(
            PlanMetrics {
                waste_pct: 0.0,
                efficiency: 100.0,
                cost: 0.0,
                time_ms: 0.0,
            },
            &objectives,
            ScoreCeilings {
                cost_ceiling: 100.0,
                time_ceiling: 100.0,
            },
            100.0,
        );
        assert!((s.fitness - 1.0).abs() < 1e-9);
    }

    #[test]
    fn priority_scales_weight_before_renormalisation() {
        let objectives = Objectives(vec![
            Objective {
                kind: ObjectiveKind::MinimizeWaste,
                weight: 0.5,
                priority: Priority::High,
            },
            Objective {
                kind: ObjectiveKind::MinimizeCost,
                weight: 0.5,
                priority: Priority::Low,
            },
        ]);
        let weights = objectives.effective_weights();
        let waste_w = weights
            .iter()
            .find(|(k, _)| *k == ObjectiveKind::MinimizeWaste)
            .unwrap()
            .1;
        let cost_w = weights
            .iter()
            .find(|(k, _)| *k == ObjectiveKind::MinimizeCost)
            .unwrap()
            .1;
        assert!(waste_w > cost_w);
        assert!((waste_w + cost_w - 1.0).abs() < 1e-9);
    }

    #[test]
    fn waste_score_caps_at_max_waste_pct() {
        let objectives = Objectives(vec![Objective {
            kind: ObjectiveKind::MinimizeWaste,
            weight: 1.0,
            priority: Priority::High,
        }]);
        let s = score(
            PlanMetrics {
                waste_pct: 200.0,
                efficiency: 0.0,
                cost: 0.0,
                time_ms: 0.0,
            },
            &objectives,
            ScoreCeilings {
                cost_ceiling: 0.0,
                time_ceiling: 0.0,
            },
            50.0,
        );
        assert_eq!(s.waste_score, 0.0);
    }
}
