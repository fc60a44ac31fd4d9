//! Canary comparisons (part of C8, spec §3, §4.8).
//!
//! A canary run compares a candidate algorithm's metrics against a
//! baseline's and classifies the outcome. Records are keyed by
//! `correlation_id` with an explicit `recorded_at` instant set by the
//! caller/engine at record time — *not* derived from the correlation
//! string, which the DESIGN.md open-question resolution flags as a defect
//! in the source this spec was distilled from (spec §9).

use std::collections::VecDeque;

use chrono::{DateTime, Utc};

use crate::types::AlgorithmTag;

/// Canary outcome classification.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CanaryStatus {
    /// Candidate matched or improved on the baseline within tolerance.
    Success,
    /// Candidate deviated beyond the warning threshold but not the failure one.
    Warning,
    /// Candidate deviated beyond the failure threshold.
    Failure,
}

/// The handful of metrics a canary comparison tracks.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct CanaryMetrics {
    /// Plan efficiency, `[0,100]`.
    pub efficiency: f64,
    /// Total cost.
    pub cost: f64,
    /// Execution time in milliseconds.
    pub duration_ms: f64,
}

impl CanaryMetrics {
    fn relative_deviation(&self, baseline: &CanaryMetrics) -> f64 {
        let term = |candidate: f64, base: f64| {
            if base.abs() <= f64::EPSILON {
                0.0
            } else {
                (candidate - base).abs() / base.abs()
            }
        };
        // Largest relative deviation across the three tracked metrics,
        // since any one of them regressing matters.
        term(self.efficiency, baseline.efficiency)
            .max(term(self.cost, baseline.cost))
            .max(term(self.duration_ms, baseline.duration_ms))
    }
}

/// Classify a deviation into a [`CanaryStatus`]: under 5% is success, under
/// 20% is a warning, anything higher is a failure.
fn classify(deviation: f64) -> CanaryStatus {
    if deviation < 0.05 {
        CanaryStatus::Success
    } else if deviation < 0.20 {
        CanaryStatus::Warning
    } else {
        CanaryStatus::Failure
    }
}

/// A recorded canary comparison.
#[derive(Clone, Debug, PartialEq)]
pub struct CanaryRecord {
    /// Algorithm under test.
    pub algorithm: AlgorithmTag,
    /// Workload class the comparison ran against.
    pub workload_class: crate::selection::WorkloadClass,
    /// Candidate metrics.
    pub metrics: CanaryMetrics,
    /// Baseline metrics the candidate was compared to.
    pub baseline: CanaryMetrics,
    /// Largest relative deviation across the tracked metrics.
    pub deviation: f64,
    /// Classification of `deviation`.
    pub status: CanaryStatus,
    /// Correlation id this record is keyed by.
    pub correlation_id: String,
    /// When this record was recorded.
    pub recorded_at: DateTime<Utc>,
}

/// Retention: 1,000 entries (spec §3).
const MAX_ENTRIES: usize = 1_000;

/// Ring-buffer store for [`CanaryRecord`] values.
#[derive(Default)]
pub struct CanaryStore {
    records: VecDeque<CanaryRecord>,
}

impl CanaryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        CanaryStore { records: VecDeque::new() }
    }

    /// Compare `candidate` against `baseline`, classify the result, and
    /// retain the record keyed by `correlation_id`.
    pub fn record(
        &mut self,
        algorithm: AlgorithmTag,
        workload_class: crate::selection::WorkloadClass,
        baseline: CanaryMetrics,
        candidate: CanaryMetrics,
        correlation_id: impl Into<String>,
        now: DateTime<Utc>,
    ) -> CanaryRecord {
        let deviation = candidate.relative_deviation(&baseline);
        let record = CanaryRecord {
            algorithm,
            workload_class,
            metrics: candidate,
            baseline,
            deviation,
            status: classify(deviation),
            correlation_id: correlation_id.into(),
            recorded_at: now,
        };

        if self.records.len() >= MAX_ENTRIES {
            self.records.pop_front();
        }
        self.records.push_back(record.clone());
        record
    }

    /// All records for a given correlation id.
    pub fn for_correlation(&self, correlation_id: &str) -> Vec<&CanaryRecord> {
        self.records.iter().filter(|r| r.correlation_id == correlation_id).collect()
    }

    /// Number of records currently retained.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selection::WorkloadClass;

    #[test]
    fn small_deviation_is_success() {
        let mut store = CanaryStore::new();
        let baseline = CanaryMetrics {
            efficiency: 90.0,
            cost: 100.0,
            duration_ms: 50.0,
        };
        let candidate = CanaryMetrics {
            efficiency: 91.0,
            cost: 101.0,
            duration_ms: 49.0,
        };
        let record = store.record("bfd", WorkloadClass::Small, baseline, candidate, "corr-1", Utc::now());
        assert_eq!(record.status, CanaryStatus::Success);
    }

    #[test]
    fn large_deviation_is_failure() {
        let mut store = CanaryStore::new();
        let baseline = CanaryMetrics {
            efficiency: 90.0,
            cost: 100.0,
            duration_ms: 50.0,
        };
        let candidate = CanaryMetrics {
            efficiency: 60.0,
            cost: 100.0,
            duration_ms: 50.0,
        };
        let record = store.record("genetic", WorkloadClass::Medium, baseline, candidate, "corr-2", Utc::now());
        assert_eq!(record.status, CanaryStatus::Failure);
    }

    #[test]
    fn ring_buffer_caps_at_1000() {
        let mut store = CanaryStore::new();
        let m = CanaryMetrics::default();
        for i in 0..MAX_ENTRIES + 10 {
            store.record("bfd", WorkloadClass::Small, m, m, format!("corr-{i}"), Utc::now());
        }
        assert_eq!(store.len(), MAX_ENTRIES);
    }
}
