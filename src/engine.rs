//! Engine Facade (C11, spec §4.11, §6).
//!
//! The single entry point a host embeds: `Engine::optimize` walks a request
//! through `Received -> Validated -> Classified -> Solving -> Scored ->
//! Verified -> Emitted`/`Failed`, logging each transition, and owns the
//! selection log / canary store / quarantine store as plain collections
//! (spec §5 — no background task is spawned; [`Engine::evict_expired`] is
//! the host's hook to drive retention).

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::time::Instant;

use chrono::{DateTime, Utc};
use tracing::{info, instrument, warn};

use crate::annealing;
use crate::branch_and_bound;
use crate::canary::{CanaryMetrics, CanaryRecord, CanaryStore};
use crate::cost;
use crate::error::{EngineError, ErrorKind, Result};
use crate::genetic;
use crate::placement::{Bfd, Ffd, Nfd, Placer, PlacementOutcome, Wfd};
use crate::pooling::{self, Partition};
use crate::quarantine::QuarantineStore;
use crate::scorer::{self, PlanMetrics, ScoreCeilings};
use crate::search::SolveContext;
use crate::selection::{Actuals, Candidate, SelectionLogEntry, SelectionLogStore, WorkloadClass};
use crate::selector::{self, SelectionDecision};
use crate::types::{
    Algorithm, AlgorithmTag, Bar, Comparison, CompareResponse, Constraints, CostModel, ExpandedPiece, Objectives, OptimizeRequest,
    OptimizeResponse, Plan, ProfileId, Recommendation, Severity, StockMenu, Unit, WasteDistribution,
};
use crate::units;
use crate::validator;

/// The engine. Holds no request state between calls beyond the stores
/// listed in spec §5; safe to keep a single long-lived instance per host
/// process.
#[derive(Default)]
pub struct Engine {
    selection_log: SelectionLogStore,
    canary_store: CanaryStore,
    quarantine_store: QuarantineStore,
    next_correlation: u64,
}

impl Engine {
    /// Build an empty engine.
    pub fn new() -> Self {
        Engine {
            selection_log: SelectionLogStore::new(),
            canary_store: CanaryStore::new(),
            quarantine_store: QuarantineStore::new(),
            next_correlation: 0,
        }
    }

    /// Run one optimization request end to end.
    #[instrument(skip(self, request), fields(correlation_id))]
    pub fn optimize(&mut self, request: OptimizeRequest) -> Result<OptimizeResponse> {
        let request = normalize_to_mm(request);
        let correlation_id = request.correlation_id.clone().unwrap_or_else(|| self.mint_correlation_id());
        tracing::Span::current().record("correlation_id", &correlation_id.as_str());
        info!(state = "Received", items = request.items.len());

        if let Err(violation) = self.check_hard_constraints(&request, &correlation_id) {
            warn!(state = "Failed", reason = %violation.message);
            return Err(violation);
        }
        info!(state = "Validated");

        let demand = coalesce(&request.items);
        let pieces = expand(&demand);

        let decision = selector::select(&pieces, request.algorithm.as_ref(), request.prefer_quality, request.prefer_speed);
        info!(
            state = "Classified",
            workload_class = ?decision.workload_class,
            workload_size = decision.workload_size,
            chosen = decision.chosen.tag(),
        );

        let now = Utc::now();
        let started = Instant::now();

        let seed = request.performance.seed.unwrap_or_else(|| seed_from(&correlation_id));
        let ctx = SolveContext::with_budget_ms(seed, request.performance.budget_ms, effective_workers(&request));

        let partitions = pooling::partition(&pieces);
        let cost_ceiling = scorer::worst_case_cost_ceiling(
            &pieces.iter().map(|p| p.length).collect::<Vec<_>>(),
            &request.cost_model,
            |len| global_smallest_fitting(&request.material_stock_lengths, len),
        );
        let ceilings = ScoreCeilings {
            cost_ceiling,
            time_ceiling: request.performance.budget_ms as f64,
        };

        let mut used_algorithm: AlgorithmTag = decision.chosen.tag();
        let mut any_partial = false;
        let (outcome, mut recommendations) = pooling::solve_partitioned(&partitions, |partition| {
            let (partition_outcome, partial, tag) = run_partition(partition, &decision, &request, &ctx);
            any_partial |= partial;
            used_algorithm = tag;
            partition_outcome
        });
        info!(state = "Solving", bars = outcome.bars.len(), infeasible = outcome.infeasible, partial = any_partial);

        let execution_time_ms = started.elapsed().as_millis() as u64;
        let plan = build_plan(outcome, &request, &demand, &ceilings, used_algorithm, execution_time_ms, any_partial, &mut recommendations);
        info!(state = "Scored", efficiency = plan.efficiency, quality_score = plan.quality_score);

        let mut expected_demand: HashMap<(ProfileId, u64), u32> = HashMap::new();
        for ((profile_type, length), quantity) in &demand {
            expected_demand.insert((profile_type.clone(), *length), *quantity);
        }
        let problems = validator::validate(&plan, &expected_demand);
        if !problems.is_empty() {
            let mut error = EngineError::new(
                ErrorKind::InternalInconsistency,
                correlation_id.clone(),
                format!("result validator rejected the plan ({} violation(s))", problems.len()),
            );
            for (index, problem) in problems.iter().enumerate() {
                error = error.with_detail(format!("violation_{index}"), problem.message.clone());
            }
            warn!(state = "Failed", violations = problems.len());
            return Err(error);
        }
        info!(state = "Verified");

        let cost_breakdown = cost::compute(&plan.bars, &request.cost_model, execution_time_ms as f64);

        let entry = SelectionLogEntry {
            id: 0,
            correlation_id: correlation_id.clone(),
            workload_class: decision.workload_class,
            workload_size: decision.workload_size,
            workload_complexity: decision.workload_complexity,
            candidates: decision.candidates.clone(),
            chosen: decision.chosen.tag(),
            reason: decision.reason.clone(),
            confidence: decision.confidence,
            actual_duration: None,
            actual_quality: None,
            actual_memory: None,
            fallback: if used_algorithm != decision.chosen.tag() { Some(used_algorithm) } else { None },
            recorded_at: now,
        };
        let log_id = self.selection_log.create(entry, now);
        self.selection_log.update(
            log_id,
            Actuals {
                duration_ms: Some(execution_time_ms as f64),
                quality: Some(plan.optimization_score),
                memory: None,
            },
        );

        info!(state = "Emitted", algorithm = used_algorithm);
        Ok(OptimizeResponse { plan, cost_breakdown })
    }

    /// Run `request` once per entry in `algorithms`, overriding the
    /// requested algorithm each time, and return the comparisons sorted by
    /// efficiency descending.
    pub fn compare(&mut self, request: OptimizeRequest, algorithms: Vec<Algorithm>) -> Result<CompareResponse> {
        let mut comparisons = Vec::with_capacity(algorithms.len());
        for algorithm in algorithms {
            let mut variant = request.clone();
            variant.algorithm = Some(algorithm.clone());
            let started = Instant::now();
            let response = self.optimize(variant)?;
            let exec_ms = started.elapsed().as_millis() as u64;

            comparisons.push(Comparison {
                algorithm: algorithm.tag(),
                efficiency: response.plan.efficiency,
                waste: response.plan.total_waste,
                cost: response.cost_breakdown.total,
                confidence: response.plan.optimization_score,
                exec_ms,
                plan: response.plan,
            });
        }

        comparisons.sort_by(|a, b| b.efficiency.partial_cmp(&a.efficiency).unwrap_or(std::cmp::Ordering::Equal));
        let best = comparisons.first().map(|c| c.algorithm).unwrap_or("ffd");
        Ok(CompareResponse { comparisons, best })
    }

    /// Record a canary comparison between a baseline and a candidate run.
    pub fn record_canary(
        &mut self,
        algorithm: AlgorithmTag,
        workload_class: WorkloadClass,
        baseline: CanaryMetrics,
        candidate: CanaryMetrics,
        correlation_id: impl Into<String>,
        now: DateTime<Utc>,
    ) -> CanaryRecord {
        self.canary_store.record(algorithm, workload_class, baseline, candidate, correlation_id, now)
    }

    /// Drive retention on the selection log and quarantine store. Has no
    /// background task of its own; a host schedules calls to this (spec §5).
    pub fn evict_expired(&mut self, now: DateTime<Utc>) {
        self.selection_log.evict_expired(now);
        self.quarantine_store.evict_expired(now);
    }

    /// Read access to the selection log, for host-side auditing/trend queries.
    pub fn selection_log(&self) -> &SelectionLogStore {
        &self.selection_log
    }

    /// Read access to the quarantine store.
    pub fn quarantine_store(&self) -> &QuarantineStore {
        &self.quarantine_store
    }

    /// Read access to the canary store.
    pub fn canary_store(&self) -> &CanaryStore {
        &self.canary_store
    }

    fn mint_correlation_id(&mut self) -> String {
        let id = self.next_correlation;
        self.next_correlation += 1;
        format!("auto-{id:x}")
    }

    /// The only hard, unconditional rejections the engine performs before
    /// handing a request to the placement layer: a `max_waste_pct` outside
    /// `[0,100]` is a validation failure (not a C1 concern), and
    /// `max_cuts_per_stock == 0` with nonempty demand is the one
    /// `ConstraintViolation` that can never be absorbed into an
    /// infeasible-plan fallback, since no bar could ever hold even a single
    /// piece (spec §9: hard rejection belongs exclusively to C1).
    fn check_hard_constraints(&self, request: &OptimizeRequest, correlation_id: &str) -> Result<()> {
        if request.constraints.max_waste_pct < 0.0 || request.constraints.max_waste_pct > 100.0 {
            return Err(EngineError::new(
                ErrorKind::ValidationRejected,
                correlation_id,
                format!("max_waste_pct {} is outside [0,100]", request.constraints.max_waste_pct),
            ));
        }
        if request.items.iter().any(|item| item.quantity == 0) {
            return Err(EngineError::new(ErrorKind::ValidationRejected, correlation_id, "an item has zero quantity"));
        }
        if request.constraints.max_cuts_per_stock == 0 && !request.items.is_empty() {
            return Err(EngineError::new(
                ErrorKind::ConstraintViolation,
                correlation_id,
                "max_cuts_per_stock is 0; no stock option could ever hold a placement",
            ));
        }
        Ok(())
    }
}

/// Follow `ProfilePooling` wrappers down to the algorithm that actually
/// produces a placement.
fn resolve_algorithm(algorithm: &Algorithm) -> &Algorithm {
    match algorithm {
        Algorithm::ProfilePooling(inner) => resolve_algorithm(inner),
        other => other,
    }
}

fn dispatch(
    algorithm: &Algorithm,
    pieces: &[ExpandedPiece],
    profile_type: &ProfileId,
    menu: &[crate::types::StockOption],
    constraints: &Constraints,
    objectives: &Objectives,
    ceilings: ScoreCeilings,
    ctx: &SolveContext,
) -> Option<(PlacementOutcome, bool)> {
    match resolve_algorithm(algorithm) {
        Algorithm::Ffd => Some((Ffd.place(pieces, profile_type, menu, constraints), false)),
        Algorithm::Bfd => Some((Bfd.place(pieces, profile_type, menu, constraints), false)),
        Algorithm::Nfd => Some((Nfd.place(pieces, profile_type, menu, constraints), false)),
        Algorithm::Wfd => Some((Wfd.place(pieces, profile_type, menu, constraints), false)),
        Algorithm::Genetic(params) => {
            let result = genetic::run(pieces, profile_type, menu, constraints, objectives, ceilings, params, ctx);
            Some((result.outcome, result.partial))
        }
        Algorithm::SimulatedAnnealing(params) => {
            let result = annealing::run(pieces, profile_type, menu, constraints, objectives, ceilings, params, ctx);
            Some((result.outcome, result.partial))
        }
        Algorithm::BranchAndBound(params) => {
            let result = branch_and_bound::solve(pieces, profile_type, menu, constraints, params, ctx);
            result.outcome.map(|outcome| (outcome, result.partial))
        }
        Algorithm::ProfilePooling(_) => unreachable!("resolve_algorithm strips ProfilePooling wrappers"),
    }
}

/// Run one partition through the selector's chosen algorithm, falling back
/// down its chain if the chosen algorithm declines (only the exact solver
/// ever does). Returns the outcome, whether it was partial, and the tag of
/// whichever algorithm actually produced it.
fn run_partition(
    partition: &Partition,
    decision: &SelectionDecision,
    request: &OptimizeRequest,
    ctx: &SolveContext,
) -> (PlacementOutcome, bool, AlgorithmTag) {
    let menu = request.material_stock_lengths.get(&partition.profile_type).map(|m| m.as_slice()).unwrap_or(&[]);

    let mut candidates = vec![&decision.chosen];
    candidates.extend(decision.fallback_chain.iter());

    for algorithm in candidates {
        if let Some((outcome, partial)) = dispatch(
            algorithm,
            &partition.pieces,
            &partition.profile_type,
            menu,
            &request.constraints,
            &request.objectives,
            ScoreCeilings {
                cost_ceiling: 0.0,
                time_ceiling: request.performance.budget_ms as f64,
            },
            ctx,
        ) {
            return (outcome, partial, resolve_algorithm(algorithm).tag());
        }
    }

    // Every declared algorithm declined (can only happen if every entry in
    // the chain is branch-and-bound and every call exceeds its workload
    // cap); FFD always succeeds and is the policy's ultimate floor.
    let outcome = Ffd.place(&partition.pieces, &partition.profile_type, menu, &request.constraints);
    (outcome, false, "ffd")
}

/// Convert every length carried by a request from its declared `unit` into
/// millimetres, the base unit the rest of the engine assumes (spec §4.1).
/// `Unit::Mm` is a no-op; this is exact integer scaling, never a lossy cast.
fn normalize_to_mm(mut request: OptimizeRequest) -> OptimizeRequest {
    if request.unit == Unit::Mm {
        return request;
    }

    for item in &mut request.items {
        item.length = units::to_mm(item.length, request.unit);
    }
    request.constraints.kerf_width = units::to_mm(request.constraints.kerf_width, request.unit);
    request.constraints.start_safety = units::to_mm(request.constraints.start_safety, request.unit);
    request.constraints.end_safety = units::to_mm(request.constraints.end_safety, request.unit);
    request.constraints.min_scrap_length = units::to_mm(request.constraints.min_scrap_length, request.unit);
    for options in request.material_stock_lengths.values_mut() {
        for option in options.iter_mut() {
            option.stock_length = units::to_mm(option.stock_length, request.unit);
        }
    }
    request.unit = Unit::Mm;
    request
}

/// Sum duplicate `(profile_type, length)` demand entries.
fn coalesce(items: &[crate::types::PieceDemand]) -> HashMap<(ProfileId, u64), u32> {
    let mut demand = HashMap::new();
    for item in items {
        *demand.entry((item.profile_type.clone(), item.length)).or_insert(0) += item.quantity;
    }
    demand
}

/// Expand coalesced demand into one [`ExpandedPiece`] per physical piece,
/// assigning ids sequentially so placements can be traced back to their
/// originating demand entry.
fn expand(demand: &HashMap<(ProfileId, u64), u32>) -> Vec<ExpandedPiece> {
    let mut pieces = Vec::new();
    let mut id = 0usize;
    for ((profile_type, length), quantity) in demand {
        for _ in 0..*quantity {
            pieces.push(ExpandedPiece {
                id,
                profile_type: profile_type.clone(),
                length: *length,
            });
            id += 1;
        }
    }
    pieces
}

fn effective_workers(request: &OptimizeRequest) -> usize {
    if request.performance.parallel {
        request.performance.workers.max(1).min(num_cpus::get())
    } else {
        1
    }
}

fn seed_from(correlation_id: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    correlation_id.hash(&mut hasher);
    hasher.finish()
}

/// Smallest stock length, across every profile's menu, that can hold a
/// piece of `len` plus a best-effort safety allowance; falls back to `len`
/// itself (the synthetic-bar case) if nothing in any menu is long enough.
/// Used only to derive the scorer's worst-case cost ceiling, so precision
/// to a specific profile's own menu is not required.
fn global_smallest_fitting(menu: &StockMenu, len: u64) -> u64 {
    menu.values()
        .flatten()
        .map(|option| option.stock_length)
        .filter(|&stock_length| stock_length >= len)
        .min()
        .unwrap_or(len)
}

fn waste_distribution(bars: &[Bar], min_scrap_length: u64) -> WasteDistribution {
    let mut dist = WasteDistribution::default();
    for bar in bars {
        let waste_pct = if bar.stock_length == 0 {
            0.0
        } else {
            100.0 * bar.remaining_length as f64 / bar.stock_length as f64
        };
        if waste_pct < 1.0 {
            dist.minimal += 1;
        } else if waste_pct < 5.0 {
            dist.small += 1;
        } else if waste_pct < 15.0 {
            dist.medium += 1;
        } else if waste_pct < 30.0 {
            dist.large += 1;
        } else {
            dist.excessive += 1;
        }
        if bar.remaining_length >= min_scrap_length && bar.remaining_length > 0 {
            dist.reclaimable += 1;
        }
        dist.total_pieces += bar.placements.len() as u32;
    }
    dist
}

/// Normalised Shannon entropy of the per-bar cut-count distribution.
fn cuts_complexity(bars: &[Bar]) -> f64 {
    if bars.len() < 2 {
        return 0.0;
    }
    let mut counts: HashMap<u32, usize> = HashMap::new();
    for bar in bars {
        *counts.entry(bar.cut_count).or_insert(0) += 1;
    }
    if counts.len() < 2 {
        return 0.0;
    }
    let n = bars.len() as f64;
    let entropy: f64 = counts.values().map(|&c| {
        let p = c as f64 / n;
        -p * p.log2()
    }).sum();
    let max_entropy = (counts.len() as f64).log2();
    if max_entropy <= 0.0 {
        0.0
    } else {
        (entropy / max_entropy).clamp(0.0, 1.0)
    }
}

#[allow(clippy::too_many_arguments)]
fn build_plan(
    outcome: PlacementOutcome,
    request: &OptimizeRequest,
    demand: &HashMap<(ProfileId, u64), u32>,
    ceilings: &ScoreCeilings,
    algorithm: AlgorithmTag,
    execution_time_ms: u64,
    partial: bool,
    recommendations: &mut Vec<Recommendation>,
) -> Plan {
    let _ = demand;
    let bars = outcome.bars;
    let total_stock: u64 = bars.iter().map(|b| b.stock_length).sum();
    let total_used: u64 = bars.iter().map(|b| b.used_length).sum();
    let total_waste: u64 = bars.iter().map(|b| b.remaining_length).sum();
    let total_length: u64 = bars.iter().flat_map(|b| b.placements.iter()).map(|p| p.length).sum();
    let stock_count = bars.len() as u32;
    let total_cuts: u32 = bars.iter().map(|b| b.cut_count).sum();

    let efficiency = if total_stock == 0 { 0.0 } else { 100.0 * total_used as f64 / total_stock as f64 };
    let waste_pct = 100.0 - efficiency;
    let avg_cuts_per_stock = if stock_count == 0 { 0.0 } else { total_cuts as f64 / stock_count as f64 };

    if waste_pct > request.constraints.max_waste_pct {
        recommendations.push(Recommendation {
            severity: Severity::Medium,
            message: format!("waste_pct {waste_pct:.1} exceeds the {:.1} score cap", request.constraints.max_waste_pct),
            expected_improvement: waste_pct - request.constraints.max_waste_pct,
        });
    }

    let cost_breakdown_for_score = cost::compute(&bars, &request.cost_model, execution_time_ms as f64);
    let metrics = PlanMetrics {
        waste_pct,
        efficiency,
        cost: cost_breakdown_for_score.total,
        time_ms: execution_time_ms as f64,
    };
    let score = scorer::score(metrics, &request.objectives, *ceilings, request.constraints.max_waste_pct);

    Plan {
        total_waste,
        efficiency,
        waste_pct,
        stock_count,
        avg_cuts_per_stock,
        total_length,
        material_utilization: efficiency,
        cuts_complexity: cuts_complexity(&bars),
        waste_distribution: waste_distribution(&bars, request.constraints.min_scrap_length),
        quality_score: score.fitness * 100.0,
        optimization_score: score.fitness,
        algorithm,
        execution_time_ms,
        recommendations: recommendations.clone(),
        partial,
        infeasible: outcome.infeasible,
        bars,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CostModel, Objectives, PerformanceConfig, PieceDemand, StockOption, Unit};

    fn basic_request() -> OptimizeRequest {
        let mut menu = HashMap::new();
        menu.insert(
            "A".to_string(),
            vec![StockOption {
                stock_length: 6000,
                available: None,
            }],
        );

        OptimizeRequest {
            items: vec![PieceDemand {
                profile_type: "A".into(),
                length: 2000,
                quantity: 3,
            }],
            algorithm: Some(Algorithm::Ffd),
            objectives: Objectives::default(),
            constraints: Constraints::default(),
            performance: PerformanceConfig {
                seed: Some(7),
                budget_ms: 5_000,
                ..PerformanceConfig::default()
            },
            cost_model: CostModel::default(),
            material_stock_lengths: menu,
            unit: Unit::Mm,
            correlation_id: Some("test-1".to_string()),
            prefer_quality: false,
            prefer_speed: false,
        }
    }

    #[test]
    fn s1_trivial_three_pieces_one_bar_end_to_end() {
        let mut engine = Engine::new();
        let response = engine.optimize(basic_request()).unwrap();
        assert_eq!(response.plan.bars.len(), 1);
        assert!(!response.plan.infeasible);
        assert_eq!(engine.selection_log().len(), 1);
    }

    #[test]
    fn zero_cuts_per_stock_is_a_constraint_violation() {
        let mut request = basic_request();
        request.constraints.max_cuts_per_stock = 0;
        let err = engine_optimize_err(request);
        assert_eq!(err.kind, ErrorKind::ConstraintViolation);
    }

    #[test]
    fn waste_pct_out_of_range_is_validation_rejected() {
        let mut request = basic_request();
        request.constraints.max_waste_pct = 150.0;
        let err = engine_optimize_err(request);
        assert_eq!(err.kind, ErrorKind::ValidationRejected);
    }

    #[test]
    fn empty_demand_yields_an_empty_plan() {
        let mut request = basic_request();
        request.items.clear();
        let mut engine = Engine::new();
        let response = engine.optimize(request).unwrap();
        assert!(response.plan.bars.is_empty());
        assert_eq!(response.plan.stock_count, 0);
    }

    #[test]
    fn single_oversize_piece_is_infeasible_but_not_an_error() {
        let mut request = basic_request();
        request.items = vec![PieceDemand {
            profile_type: "A".into(),
            length: 9000,
            quantity: 1,
        }];
        let mut engine = Engine::new();
        let response = engine.optimize(request).unwrap();
        assert!(response.plan.infeasible);
        assert_eq!(response.plan.bars.len(), 1);
    }

    #[test]
    fn centimeter_request_matches_equivalent_millimeter_request() {
        let mm_request = basic_request();
        let mut cm_request = basic_request();
        cm_request.unit = Unit::Cm;
        for item in &mut cm_request.items {
            item.length /= 10;
        }
        for options in cm_request.material_stock_lengths.values_mut() {
            for option in options.iter_mut() {
                option.stock_length /= 10;
            }
        }

        let mut engine_mm = Engine::new();
        let mut engine_cm = Engine::new();
        let mm_response = engine_mm.optimize(mm_request).unwrap();
        let cm_response = engine_cm.optimize(cm_request).unwrap();

        assert_eq!(mm_response.plan.bars.len(), cm_response.plan.bars.len());
        assert_eq!(mm_response.plan.total_waste, cm_response.plan.total_waste);
        assert!((mm_response.plan.efficiency - cm_response.plan.efficiency).abs() < 1e-9);
    }

    #[test]
    fn compare_sorts_by_efficiency_descending() {
        let mut engine = Engine::new();
        let request = basic_request();
        let response = engine
            .compare(request, vec![Algorithm::Ffd, Algorithm::Bfd])
            .unwrap();
        assert_eq!(response.comparisons.len(), 2);
        assert!(response.comparisons[0].efficiency >= response.comparisons[1].efficiency);
    }

    fn engine_optimize_err(request: OptimizeRequest) -> EngineError {
        let mut engine = Engine::new();
        engine.optimize(request).unwrap_err()
    }
}
