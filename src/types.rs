//! Core value types shared by every component of the engine.
//!
//! Lengths are always stored in millimetres once they cross into this
//! module; callers declare a [`Unit`] on the request and conversion happens
//! once at the boundary (see [`crate::units`]).

use std::collections::HashMap;

#[cfg(feature = "serialize")]
use serde::{Deserialize, Serialize};

/// Opaque profile identifier. The engine never interprets this string; it
/// only uses it to group demand, stock menus and bars.
pub type ProfileId = String;

/// Identifier assigned to one expanded unit of demand (one physical piece),
/// used to match output placements back to input `(profile_type, length)`
/// pairs.
pub type DemandId = usize;

/// Unit in which the caller expressed every length in a request.
#[cfg_attr(feature = "serialize", derive(Deserialize, Serialize))]
#[cfg_attr(feature = "serialize", serde(rename_all = "lowercase"))]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Unit {
    /// Millimetres, the engine's internal base unit.
    Mm,
    /// Centimetres (factor of 10).
    Cm,
    /// Metres (factor of 1000).
    M,
}

impl Default for Unit {
    fn default() -> Self {
        Unit::Mm
    }
}

/// A demanded piece: a profile type, a length, and how many are needed.
///
/// Identity is `(profile_type, length)`; callers may submit duplicates and
/// the engine coalesces them on entry (see [`crate::engine::Engine::optimize`]).
#[cfg_attr(feature = "serialize", derive(Deserialize, Serialize))]
#[cfg_attr(feature = "serialize", serde(rename_all = "camelCase"))]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PieceDemand {
    /// Which profile extrusion this piece must be cut from.
    pub profile_type: ProfileId,
    /// Desired length in the request's declared unit (converted to mm on ingestion).
    pub length: u64,
    /// How many pieces of this length are needed.
    pub quantity: u32,
}

/// One piece of demand after quantity expansion, ready for placement.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExpandedPiece {
    /// Identity used to trace this piece back to its placement in the result.
    pub id: DemandId,
    /// Profile this piece belongs to.
    pub profile_type: ProfileId,
    /// Length in millimetres.
    pub length: u64,
}

/// One entry in a profile's stock menu.
#[cfg_attr(feature = "serialize", derive(Deserialize, Serialize))]
#[cfg_attr(feature = "serialize", serde(rename_all = "camelCase"))]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct StockOption {
    /// Length of this stock length option, in millimetres.
    pub stock_length: u64,
    /// How many bars of this length are available. `None` means unconstrained.
    pub available: Option<u32>,
}

impl StockOption {
    /// Whether at least one more bar of this stock length can still be opened.
    pub fn has_availability(&self) -> bool {
        self.available.map_or(true, |a| a > 0)
    }

    /// Decrement the available count, if finite.
    pub fn decrement(&mut self) {
        if let Some(ref mut a) = self.available {
            *a = a.saturating_sub(1);
        }
    }
}

/// Ordered stock menu per profile type.
pub type StockMenu = HashMap<ProfileId, Vec<StockOption>>;

/// Physical/cutting constraints applied to every bar.
#[cfg_attr(feature = "serialize", derive(Deserialize, Serialize))]
#[cfg_attr(feature = "serialize", serde(rename_all = "camelCase"))]
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Constraints {
    /// Width of material removed per cut, in millimetres.
    pub kerf_width: u64,
    /// Unusable trim at the start of a bar.
    pub start_safety: u64,
    /// Unusable trim at the end of a bar.
    pub end_safety: u64,
    /// Minimum trailing remainder length that counts as reclaimable scrap
    /// rather than waste.
    pub min_scrap_length: u64,
    /// Score cap (not a hard constraint, see [`crate::scorer`]) on waste percentage.
    pub max_waste_pct: f64,
    /// Hard cap on the number of pieces cut from a single bar.
    pub max_cuts_per_stock: u32,
    /// Whether bars that aren't fully consumed are allowed in the plan.
    pub allow_partial_stocks: bool,
    /// Prefer the stock length that minimizes leftover when opening a new bar.
    pub prioritize_small_waste: bool,
    /// Only open a new bar if every open bar has less than `min_scrap_length` remaining.
    pub reclaim_waste_only: bool,
    /// Reserved for future cross-grade substitution rules; currently advisory only.
    pub respect_material_grades: bool,
}

impl Default for Constraints {
    fn default() -> Self {
        Constraints {
            kerf_width: 0,
            start_safety: 0,
            end_safety: 0,
            min_scrap_length: 0,
            max_waste_pct: 100.0,
            max_cuts_per_stock: u32::MAX,
            allow_partial_stocks: true,
            prioritize_small_waste: false,
            reclaim_waste_only: false,
            respect_material_grades: false,
        }
    }
}

/// One objective kind the scorer can blend.
#[cfg_attr(feature = "serialize", derive(Deserialize, Serialize))]
#[cfg_attr(feature = "serialize", serde(rename_all = "kebab-case"))]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ObjectiveKind {
    /// Minimize total waste.
    MinimizeWaste,
    /// Minimize total cost.
    MinimizeCost,
    /// Minimize optimization execution time.
    MinimizeTime,
    /// Maximize material utilization.
    MaximizeEfficiency,
}

/// Priority band that scales an objective's weight before renormalisation.
#[cfg_attr(feature = "serialize", derive(Deserialize, Serialize))]
#[cfg_attr(feature = "serialize", serde(rename_all = "lowercase"))]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Priority {
    /// Multiplier 1.0.
    High,
    /// Multiplier 0.7.
    Medium,
    /// Multiplier 0.4.
    Low,
}

impl Priority {
    /// Weight multiplier associated with this priority band.
    pub fn multiplier(self) -> f64 {
        match self {
            Priority::High => 1.0,
            Priority::Medium => 0.7,
            Priority::Low => 0.4,
        }
    }
}

/// A single weighted objective.
#[cfg_attr(feature = "serialize", derive(Deserialize, Serialize))]
#[cfg_attr(feature = "serialize", serde(rename_all = "camelCase"))]
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Objective {
    /// Which metric this objective scores.
    pub kind: ObjectiveKind,
    /// Raw weight in `[0,1]`, renormalised with the other objectives.
    pub weight: f64,
    /// Priority band, applied as a multiplier on `weight` before renormalisation.
    pub priority: Priority,
}

/// The full set of objectives for a request.
#[cfg_attr(feature = "serialize", derive(Deserialize, Serialize))]
#[cfg_attr(feature = "serialize", serde(rename_all = "camelCase"))]
#[derive(Clone, Debug, PartialEq, Default)]
pub struct Objectives(pub Vec<Objective>);

impl Objectives {
    /// Returns the effective (priority-scaled, renormalised to sum to 1)
    /// weight for each objective kind present. If every raw weight is zero
    /// or no objectives were given, falls back to an equal split across the
    /// four kinds.
    pub fn effective_weights(&self) -> Vec<(ObjectiveKind, f64)> {
        if self.0.is_empty() {
            let kinds = [
                ObjectiveKind::MinimizeWaste,
                ObjectiveKind::MinimizeCost,
                ObjectiveKind::MinimizeTime,
                ObjectiveKind::MaximizeEfficiency,
            ];
            return kinds.iter().map(|k| (*k, 0.25)).collect();
        }

        let scaled: Vec<(ObjectiveKind, f64)> = self
            .0
            .iter()
            .map(|o| (o.kind, o.weight * o.priority.multiplier()))
            .collect();
        let total: f64 = scaled.iter().map(|(_, w)| w).sum();
        if total <= 0.0 {
            let n = scaled.len() as f64;
            return scaled.iter().map(|(k, _)| (*k, 1.0 / n)).collect();
        }
        scaled.into_iter().map(|(k, w)| (k, w / total)).collect()
    }
}

/// Per-unit prices used to derive a plan's cost breakdown.
#[cfg_attr(feature = "serialize", derive(Deserialize, Serialize))]
#[cfg_attr(feature = "serialize", serde(rename_all = "camelCase"))]
#[derive(Copy, Clone, Debug, PartialEq, Default)]
pub struct CostModel {
    /// Price per millimetre of stock consumed.
    pub material_cost: f64,
    /// Price per cut performed.
    pub cutting_cost: f64,
    /// Price per bar opened (setup/changeover cost).
    pub setup_cost: f64,
    /// Price per millimetre of waste produced.
    pub waste_cost: f64,
    /// Price per millisecond of optimization time spent.
    pub time_cost: f64,
    /// Price per bar for energy (multiplied by `energy_per_stock`).
    pub energy_cost: f64,
    /// Energy units consumed per bar, multiplied by `energy_cost`.
    pub energy_per_stock: f64,
}

/// A single placed piece within a bar.
#[cfg_attr(feature = "serialize", derive(Deserialize, Serialize))]
#[cfg_attr(feature = "serialize", serde(rename_all = "camelCase"))]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Placement {
    /// Length of the placed piece, in millimetres.
    pub length: u64,
    /// Offset from the start of the bar, in millimetres.
    pub offset: u64,
    /// Identifier of the originating demand piece.
    pub demand_id: DemandId,
}

/// A physical stock bar with its placements and derived totals.
#[cfg_attr(feature = "serialize", derive(Deserialize, Serialize))]
#[cfg_attr(feature = "serialize", serde(rename_all = "camelCase"))]
#[derive(Clone, Debug, PartialEq)]
pub struct Bar {
    /// Length of the stock bar this plan used, in millimetres.
    pub stock_length: u64,
    /// Profile type this bar was cut from.
    pub profile_type: ProfileId,
    /// Pieces placed on this bar, in offset order.
    pub placements: Vec<Placement>,
    /// `Σ placement.length + cut_count * kerf + start_safety + end_safety`.
    pub used_length: u64,
    /// `stock_length - used_length`.
    pub remaining_length: u64,
    /// Number of cuts made on this bar (equal to `placements.len()`).
    pub cut_count: u32,
}

impl Bar {
    /// Fraction of this bar's length that ended up as placed material, in `[0,1]`.
    pub fn utilization(&self) -> f64 {
        if self.stock_length == 0 {
            0.0
        } else {
            self.used_length as f64 / self.stock_length as f64
        }
    }
}

/// Histogram of waste across severity categories, plus the raw piece count,
/// as reported in a plan's `waste_distribution`.
#[cfg_attr(feature = "serialize", derive(Deserialize, Serialize))]
#[cfg_attr(feature = "serialize", serde(rename_all = "camelCase"))]
#[derive(Copy, Clone, Debug, PartialEq, Default)]
pub struct WasteDistribution {
    /// Bars wasting under 1% of their length.
    pub minimal: u32,
    /// Bars wasting 1-5%.
    pub small: u32,
    /// Bars wasting 5-15%.
    pub medium: u32,
    /// Bars wasting 15-30%.
    pub large: u32,
    /// Bars wasting over 30%.
    pub excessive: u32,
    /// Bars whose remainder is reclaimable scrap (`>= min_scrap_length`).
    pub reclaimable: u32,
    /// Total pieces placed across the plan.
    pub total_pieces: u32,
}

/// Severity of a recommendation surfaced alongside a plan.
#[cfg_attr(feature = "serialize", derive(Deserialize, Serialize))]
#[cfg_attr(feature = "serialize", serde(rename_all = "lowercase"))]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Severity {
    /// Informational.
    Low,
    /// Worth reviewing.
    Medium,
    /// Should be addressed.
    High,
    /// Must be addressed before the plan is used.
    Critical,
}

/// An actionable note attached to a plan or validation report.
#[cfg_attr(feature = "serialize", derive(Deserialize, Serialize))]
#[cfg_attr(feature = "serialize", serde(rename_all = "camelCase"))]
#[derive(Clone, Debug, PartialEq)]
pub struct Recommendation {
    /// How urgent this recommendation is.
    pub severity: Severity,
    /// Human-readable explanation.
    pub message: String,
    /// Estimated improvement (e.g. percentage points of efficiency) if acted on.
    pub expected_improvement: f64,
}

/// Tag identifying which algorithm produced a plan.
pub type AlgorithmTag = &'static str;

/// A complete cutting plan plus derived totals and quality signals.
#[cfg_attr(feature = "serialize", derive(Deserialize, Serialize))]
#[cfg_attr(feature = "serialize", serde(rename_all = "camelCase"))]
#[derive(Clone, Debug, PartialEq)]
pub struct Plan {
    /// Ordered list of bars making up this plan.
    pub bars: Vec<Bar>,
    /// `Σ bar.remaining_length`.
    pub total_waste: u64,
    /// `100 * Σ used_length / Σ stock_length`, in `[0,100]`.
    pub efficiency: f64,
    /// `100 - efficiency`, i.e. waste as a percentage of stock consumed.
    pub waste_pct: f64,
    /// Number of bars used.
    pub stock_count: u32,
    /// Average `cut_count` across bars.
    pub avg_cuts_per_stock: f64,
    /// `Σ placement.length` across the whole plan.
    pub total_length: u64,
    /// Alias of `efficiency`, kept distinct because callers may weight it
    /// differently than the scorer's efficiency score.
    pub material_utilization: f64,
    /// Normalised entropy of the per-bar cut-count distribution, `[0,1]`.
    pub cuts_complexity: f64,
    /// Waste histogram.
    pub waste_distribution: WasteDistribution,
    /// `0..=100` blended quality indicator derived from the objective scorer.
    pub quality_score: f64,
    /// Raw fitness value returned by the objective scorer, `[0,1]`.
    pub optimization_score: f64,
    /// Which algorithm produced this plan.
    pub algorithm: AlgorithmTag,
    /// Wall-clock time spent optimizing, in milliseconds.
    pub execution_time_ms: u64,
    /// Advisory recommendations for the caller.
    pub recommendations: Vec<Recommendation>,
    /// Set when a metaheuristic or the exact solver was cut off by its
    /// budget and returned its best-so-far result.
    pub partial: bool,
    /// Set when at least one piece could not be placed on any real stock
    /// option and a synthetic over-long bar was substituted.
    pub infeasible: bool,
}

/// Tagged variant over every placement strategy the engine supports,
/// mirroring the `Placer` trait's implementors.
#[cfg_attr(feature = "serialize", derive(Deserialize, Serialize))]
#[cfg_attr(feature = "serialize", serde(tag = "type", rename_all = "kebab-case"))]
#[derive(Clone, Debug, PartialEq)]
pub enum Algorithm {
    /// First-Fit-Decreasing.
    Ffd,
    /// Best-Fit-Decreasing.
    Bfd,
    /// Next-Fit-Decreasing.
    Nfd,
    /// Worst-Fit-Decreasing.
    Wfd,
    /// Genetic algorithm over permutations of the expanded demand.
    Genetic(GeneticParams),
    /// Simulated annealing over permutations of the expanded demand.
    SimulatedAnnealing(SaParams),
    /// Exact branch-and-bound solver.
    BranchAndBound(BnBParams),
    /// Partition demand by profile type and dispatch each partition.
    ProfilePooling(Box<Algorithm>),
}

impl Algorithm {
    /// Short tag used in `Plan::algorithm` and logs.
    pub fn tag(&self) -> AlgorithmTag {
        match self {
            Algorithm::Ffd => "ffd",
            Algorithm::Bfd => "bfd",
            Algorithm::Nfd => "nfd",
            Algorithm::Wfd => "wfd",
            Algorithm::Genetic(_) => "genetic",
            Algorithm::SimulatedAnnealing(_) => "simulated-annealing",
            Algorithm::BranchAndBound(_) => "branch-and-bound",
            Algorithm::ProfilePooling(_) => "profile-pooling",
        }
    }
}

/// Genetic algorithm tuning parameters.
#[cfg_attr(feature = "serialize", derive(Deserialize, Serialize))]
#[cfg_attr(feature = "serialize", serde(rename_all = "camelCase"))]
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct GeneticParams {
    /// Number of chromosomes per generation.
    pub population_size: usize,
    /// Maximum number of generations to run.
    pub generations: u32,
    /// Tournament selection group size.
    pub tournament_size: usize,
    /// Number of top chromosomes carried unchanged into the next generation.
    pub elitism: usize,
    /// Stop early if relative fitness improvement falls below this for 10
    /// consecutive generations.
    pub convergence_threshold: f64,
}

impl Default for GeneticParams {
    fn default() -> Self {
        GeneticParams {
            population_size: 50,
            generations: 100,
            tournament_size: 3,
            elitism: 2,
            convergence_threshold: 0.001,
        }
    }
}

/// Simulated annealing tuning parameters.
#[cfg_attr(feature = "serialize", derive(Deserialize, Serialize))]
#[cfg_attr(feature = "serialize", serde(rename_all = "camelCase"))]
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SaParams {
    /// Geometric cooling factor applied each iteration.
    pub alpha: f64,
    /// Stop once temperature falls below this.
    pub min_temperature: f64,
    /// Hard iteration cap, independent of temperature.
    pub max_iterations: u32,
}

impl Default for SaParams {
    fn default() -> Self {
        SaParams {
            alpha: 0.995,
            min_temperature: 1e-4,
            max_iterations: 10_000,
        }
    }
}

/// Branch-and-bound tuning parameters.
#[cfg_attr(feature = "serialize", derive(Deserialize, Serialize))]
#[cfg_attr(feature = "serialize", serde(rename_all = "camelCase"))]
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct BnBParams {
    /// Per-call wall-clock budget in milliseconds.
    pub time_budget_ms: u64,
    /// Only used when `workload_size <= max_workload_size`.
    pub max_workload_size: usize,
}

impl Default for BnBParams {
    fn default() -> Self {
        BnBParams {
            time_budget_ms: 5_000,
            max_workload_size: 40,
        }
    }
}

/// Resource/parallelism knobs for a single optimization call.
#[cfg_attr(feature = "serialize", derive(Deserialize, Serialize))]
#[cfg_attr(feature = "serialize", serde(rename_all = "camelCase"))]
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PerformanceConfig {
    /// Upper bound on metaheuristic iterations/generations.
    pub max_iterations: u32,
    /// Convergence threshold passed through to the genetic algorithm.
    pub convergence_threshold: f64,
    /// Whether chromosome/branch evaluation may use a worker pool.
    pub parallel: bool,
    /// Desired worker count; capped by available hardware parallelism.
    pub workers: usize,
    /// Wall-clock budget for the whole optimization call.
    pub budget_ms: u64,
    /// Explicit random seed; if absent one is derived from the request id.
    pub seed: Option<u64>,
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        PerformanceConfig {
            max_iterations: 100,
            convergence_threshold: 0.001,
            parallel: true,
            workers: num_cpus::get(),
            budget_ms: 30_000,
            seed: None,
        }
    }
}

/// Input to [`crate::engine::Engine::optimize`].
#[cfg_attr(feature = "serialize", derive(Deserialize, Serialize))]
#[cfg_attr(feature = "serialize", serde(rename_all = "camelCase"))]
#[derive(Clone, Debug, PartialEq)]
pub struct OptimizeRequest {
    /// Demanded pieces.
    pub items: Vec<PieceDemand>,
    /// Explicit algorithm choice; overrides the selector's policy.
    pub algorithm: Option<Algorithm>,
    /// Weighted objectives blended by the scorer.
    pub objectives: Objectives,
    /// Kerf/safety/scrap constraints.
    pub constraints: Constraints,
    /// Parallelism and budget knobs.
    pub performance: PerformanceConfig,
    /// Pricing model for the cost breakdown.
    pub cost_model: CostModel,
    /// Stock menu per profile type.
    pub material_stock_lengths: StockMenu,
    /// Unit every length in this request is expressed in.
    pub unit: Unit,
    /// Correlation id for logging/selection-log/canary bookkeeping. A random
    /// one is generated if absent.
    pub correlation_id: Option<String>,
    /// Nudge the selector toward a candidate with materially higher
    /// estimated quality, even if slower (spec §4.8).
    #[cfg_attr(feature = "serialize", serde(default))]
    pub prefer_quality: bool,
    /// Nudge the selector toward a candidate with materially lower
    /// estimated duration, even if lower quality (spec §4.8).
    #[cfg_attr(feature = "serialize", serde(default))]
    pub prefer_speed: bool,
}

/// Per-category cost breakdown returned alongside a plan.
#[cfg_attr(feature = "serialize", derive(Deserialize, Serialize))]
#[cfg_attr(feature = "serialize", serde(rename_all = "camelCase"))]
#[derive(Copy, Clone, Debug, PartialEq, Default)]
pub struct CostBreakdown {
    /// Material cost component.
    pub material: f64,
    /// Cutting cost component.
    pub cutting: f64,
    /// Setup cost component.
    pub setup: f64,
    /// Waste cost component.
    pub waste: f64,
    /// Time cost component.
    pub time: f64,
    /// Energy cost component.
    pub energy: f64,
    /// Sum of all components.
    pub total: f64,
    /// `total / (Σ piece.length / 1000)`, i.e. cost per metre of demand satisfied.
    pub cost_per_meter: f64,
}

/// Output of [`crate::engine::Engine::optimize`].
#[cfg_attr(feature = "serialize", derive(Deserialize, Serialize))]
#[cfg_attr(feature = "serialize", serde(rename_all = "camelCase"))]
#[derive(Clone, Debug, PartialEq)]
pub struct OptimizeResponse {
    /// The resulting plan.
    pub plan: Plan,
    /// Cost breakdown for the plan.
    pub cost_breakdown: CostBreakdown,
}

/// One entry in a [`crate::engine::Engine::compare`] result.
#[cfg_attr(feature = "serialize", derive(Deserialize, Serialize))]
#[cfg_attr(feature = "serialize", serde(rename_all = "camelCase"))]
#[derive(Clone, Debug, PartialEq)]
pub struct Comparison {
    /// Algorithm tag for this candidate.
    pub algorithm: AlgorithmTag,
    /// Plan produced by this candidate.
    pub plan: Plan,
    /// Wall-clock time spent, in milliseconds.
    pub exec_ms: u64,
    /// Plan efficiency, duplicated here for easy sorting/display.
    pub efficiency: f64,
    /// Total waste, duplicated here for easy sorting/display.
    pub waste: u64,
    /// Total cost, duplicated here for easy sorting/display.
    pub cost: f64,
    /// Confidence the selector had in this candidate, `[0,1]`.
    pub confidence: f64,
}

/// Output of [`crate::engine::Engine::compare`], sorted by efficiency descending.
#[cfg_attr(feature = "serialize", derive(Deserialize, Serialize))]
#[cfg_attr(feature = "serialize", serde(rename_all = "camelCase"))]
#[derive(Clone, Debug, PartialEq)]
pub struct CompareResponse {
    /// One entry per requested algorithm.
    pub comparisons: Vec<Comparison>,
    /// Tag of the best-performing algorithm.
    pub best: AlgorithmTag,
}
