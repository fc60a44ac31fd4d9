//! Workload Classifier & Algorithm Selector (C8, spec §4.8).
//!
//! Classifies a workload by expanded piece count, estimates how every
//! candidate algorithm would fare, and picks a primary algorithm plus a
//! fallback chain. An explicit user request always overrides the policy;
//! `prefer_quality`/`prefer_speed` can still nudge the choice among
//! comparable candidates. The decision is handed back to the caller
//! (`crate::engine`) to persist as a [`crate::selection::SelectionLogEntry`]
//! — this module stays storage-agnostic so it can be unit-tested without a
//! log store.

use crate::selection::{Candidate, WorkloadClass};
use crate::types::{Algorithm, BnBParams, ExpandedPiece, GeneticParams, SaParams};

/// Normalised Shannon entropy of the piece-length distribution, in `[0,1]`.
/// `0` means every piece is the same length (trivial to pack well); `1`
/// means lengths are maximally spread out relative to how many distinct
/// lengths appear.
pub fn workload_complexity(pieces: &[ExpandedPiece]) -> f64 {
    if pieces.len() < 2 {
        return 0.0;
    }

    let mut counts = std::collections::HashMap::new();
    for piece in pieces {
        *counts.entry(piece.length).or_insert(0usize) += 1;
    }

    let n = pieces.len() as f64;
    let entropy: f64 = counts
        .values()
        .map(|&c| {
            let p = c as f64 / n;
            -p * p.log2()
        })
        .sum();

    let distinct = counts.len();
    if distinct < 2 {
        return 0.0;
    }
    let max_entropy = (distinct as f64).log2();
    if max_entropy <= 0.0 {
        0.0
    } else {
        (entropy / max_entropy).clamp(0.0, 1.0)
    }
}

/// The default policy's primary algorithm and fallback chain per workload
/// class (spec §4.8's table).
fn default_chain(class: WorkloadClass) -> Vec<Algorithm> {
    match class {
        WorkloadClass::Tiny => vec![
            Algorithm::BranchAndBound(BnBParams::default()),
            Algorithm::Bfd,
            Algorithm::Ffd,
        ],
        WorkloadClass::Small => vec![Algorithm::Bfd, Algorithm::Ffd],
        WorkloadClass::Medium => vec![Algorithm::Genetic(GeneticParams::default()), Algorithm::Bfd, Algorithm::Ffd],
        WorkloadClass::Large => vec![Algorithm::SimulatedAnnealing(SaParams::default()), Algorithm::Bfd, Algorithm::Ffd],
        WorkloadClass::XLarge => vec![Algorithm::Ffd, Algorithm::Nfd],
    }
}

/// Rough estimate of an algorithm's duration (ms), quality (`[0,1]`) and
/// memory proxy for a workload of `size` pieces with `complexity` in
/// `[0,1]`. These are closed-form heuristics, not measurements; their only
/// job is to let the selector reason about trade-offs and rank candidates
/// the same way on every call for a given input (spec §5 reproducibility).
fn estimate(algorithm: &Algorithm, size: usize, complexity: f64) -> Candidate {
    let size_f = size.max(1) as f64;
    let (duration, quality, memory, confidence) = match algorithm {
        Algorithm::Ffd => (size_f * 0.01, 0.80 - 0.05 * complexity, size_f, 0.9),
        Algorithm::Bfd => (size_f * 0.02, 0.88 - 0.03 * complexity, size_f, 0.9),
        Algorithm::Nfd => (size_f * 0.008, 0.70 - 0.05 * complexity, size_f, 0.85),
        Algorithm::Wfd => (size_f * 0.012, 0.65 - 0.05 * complexity, size_f, 0.7),
        Algorithm::Genetic(params) => (
            size_f * params.generations as f64 * 0.05,
            0.93 - 0.02 * complexity,
            size_f * params.population_size as f64 * 0.1,
            0.75,
        ),
        Algorithm::SimulatedAnnealing(params) => (
            params.max_iterations as f64 * 0.01,
            0.90 - 0.02 * complexity,
            size_f,
            0.75,
        ),
        Algorithm::BranchAndBound(params) => (
            (2f64.powf(size_f.min(24.0))).min(params.time_budget_ms as f64),
            0.99,
            size_f * size_f,
            0.95,
        ),
        Algorithm::ProfilePooling(inner) => {
            let inner_candidate = estimate(inner, size, complexity);
            (inner_candidate.est_duration, inner_candidate.est_quality, inner_candidate.est_memory, inner_candidate.confidence)
        }
    };

    Candidate {
        algorithm: algorithm.tag(),
        est_duration: duration,
        est_quality: quality,
        est_memory: memory,
        confidence,
    }
}

/// Result of running the selector.
pub struct SelectionDecision {
    /// Workload class bucket.
    pub workload_class: WorkloadClass,
    /// Number of expanded pieces considered.
    pub workload_size: usize,
    /// Normalised entropy of the piece-length distribution.
    pub workload_complexity: f64,
    /// Every candidate considered, in the fallback chain's order.
    pub candidates: Vec<Candidate>,
    /// The chosen primary algorithm.
    pub chosen: Algorithm,
    /// The remaining chain to try, in order, if `chosen` fails or times out.
    pub fallback_chain: Vec<Algorithm>,
    /// Why `chosen` was picked.
    pub reason: String,
    /// Confidence in the choice, `[0,1]`.
    pub confidence: f64,
}

/// Select an algorithm for `pieces`. `explicit` overrides the policy
/// entirely; `prefer_quality`/`prefer_speed` can still switch among the
/// default chain's candidates (spec §4.8: "if prefer_quality is set and a
/// candidate with >=5% higher estimated quality exists, switch; if
/// prefer_speed and one >=20% faster exists, switch").
pub fn select(pieces: &[ExpandedPiece], explicit: Option<&Algorithm>, prefer_quality: bool, prefer_speed: bool) -> SelectionDecision {
    let size = pieces.len();
    let class = WorkloadClass::classify(size);
    let complexity = workload_complexity(pieces);

    if let Some(algorithm) = explicit {
        let candidate = estimate(algorithm, size, complexity);
        return SelectionDecision {
            workload_class: class,
            workload_size: size,
            workload_complexity: complexity,
            candidates: vec![candidate],
            chosen: algorithm.clone(),
            fallback_chain: Vec::new(),
            reason: "explicit algorithm requested".to_string(),
            confidence: 1.0,
        };
    }

    let chain = default_chain(class);
    let candidates: Vec<Candidate> = chain.iter().map(|a| estimate(a, size, complexity)).collect();

    let mut chosen_index = 0usize;
    let mut reason = format!("default policy for workload class {class:?}");

    if prefer_quality {
        if let Some((index, candidate)) = candidates
            .iter()
            .enumerate()
            .skip(1)
            .filter(|(_, c)| c.est_quality >= candidates[chosen_index].est_quality * 1.05)
            .max_by(|(_, a), (_, b)| a.est_quality.partial_cmp(&b.est_quality).unwrap_or(std::cmp::Ordering::Equal))
        {
            chosen_index = index;
            reason = format!("prefer_quality switched to {} (+{:.1}% estimated quality)", candidate.algorithm, (candidate.est_quality / candidates[0].est_quality - 1.0) * 100.0);
        }
    } else if prefer_speed {
        if let Some((index, candidate)) = candidates
            .iter()
            .enumerate()
            .skip(1)
            .filter(|(_, c)| c.est_duration <= candidates[chosen_index].est_duration * 0.80)
            .min_by(|(_, a), (_, b)| a.est_duration.partial_cmp(&b.est_duration).unwrap_or(std::cmp::Ordering::Equal))
        {
            chosen_index = index;
            reason = format!("prefer_speed switched to {} ({:.1}% faster)", candidate.algorithm, (1.0 - candidate.est_duration / candidates[0].est_duration) * 100.0);
        }
    }

    let mut fallback_chain = chain.clone();
    let chosen = fallback_chain.remove(chosen_index);
    let confidence = candidates[chosen_index].confidence;

    SelectionDecision {
        workload_class: class,
        workload_size: size,
        workload_complexity: complexity,
        candidates,
        chosen,
        fallback_chain,
        reason,
        confidence,
    }
}
