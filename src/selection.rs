//! Algorithm Selection Log (part of C8, spec §3, §4.8).
//!
//! Every algorithm selection is recorded so a host can audit why a
//! candidate was chosen and later compare estimate against actuals. Per
//! the redesign cue in spec §9, the log is an append-only ring buffer
//! indexed by id rather than an unbounded map; eviction is O(1) pop-front.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};

#[cfg(feature = "serialize")]
use serde::{Deserialize, Serialize};

use crate::types::AlgorithmTag;

/// Coarse workload size bucket (spec §4.8).
#[cfg_attr(feature = "serialize", derive(Deserialize, Serialize))]
#[cfg_attr(feature = "serialize", serde(rename_all = "lowercase"))]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum WorkloadClass {
    /// `|expanded pieces| <= 25`.
    Tiny,
    /// `<= 100`.
    Small,
    /// `<= 500`.
    Medium,
    /// `<= 2000`.
    Large,
    /// `> 2000`.
    XLarge,
}

impl WorkloadClass {
    /// Classify a workload by its expanded piece count.
    pub fn classify(expanded_piece_count: usize) -> Self {
        match expanded_piece_count {
            0..=25 => WorkloadClass::Tiny,
            26..=100 => WorkloadClass::Small,
            101..=500 => WorkloadClass::Medium,
            501..=2000 => WorkloadClass::Large,
            _ => WorkloadClass::XLarge,
        }
    }
}

/// One algorithm the selector considered, with its estimates.
#[cfg_attr(feature = "serialize", derive(Deserialize, Serialize))]
#[cfg_attr(feature = "serialize", serde(rename_all = "camelCase"))]
#[derive(Clone, Debug, PartialEq)]
pub struct Candidate {
    /// Algorithm tag.
    pub algorithm: AlgorithmTag,
    /// Estimated duration in milliseconds.
    pub est_duration: f64,
    /// Estimated quality (plan fitness in `[0,1]`).
    pub est_quality: f64,
    /// Estimated peak memory, in arbitrary relative units (piece count is
    /// used as the proxy; no real allocator telemetry is in scope).
    pub est_memory: f64,
    /// Confidence in the estimate, `[0,1]`.
    pub confidence: f64,
}

/// Actuals recorded after a selection's chosen algorithm has run.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Actuals {
    /// Observed duration in milliseconds.
    pub duration_ms: Option<f64>,
    /// Observed quality (plan fitness).
    pub quality: Option<f64>,
    /// Observed memory proxy.
    pub memory: Option<f64>,
}

/// One recorded selection decision.
#[cfg_attr(feature = "serialize", derive(Deserialize, Serialize))]
#[cfg_attr(feature = "serialize", serde(rename_all = "camelCase"))]
#[derive(Clone, Debug, PartialEq)]
pub struct SelectionLogEntry {
    /// Monotonically increasing log id.
    pub id: u64,
    /// Correlation id of the request this selection served.
    pub correlation_id: String,
    /// Workload class bucket.
    pub workload_class: WorkloadClass,
    /// Number of expanded pieces in the workload.
    pub workload_size: usize,
    /// Normalised entropy of the piece-length distribution, `[0,1]`.
    pub workload_complexity: f64,
    /// Every candidate the selector scored.
    pub candidates: Vec<Candidate>,
    /// Tag of the algorithm actually chosen.
    pub chosen: AlgorithmTag,
    /// Human-readable justification for the choice.
    pub reason: String,
    /// Selector's confidence in the choice, `[0,1]`.
    pub confidence: f64,
    /// Actuals recorded once the chosen algorithm finishes, via `update`.
    #[cfg_attr(feature = "serialize", serde(skip))]
    pub actual_duration: Option<f64>,
    #[cfg_attr(feature = "serialize", serde(skip))]
    pub actual_quality: Option<f64>,
    #[cfg_attr(feature = "serialize", serde(skip))]
    pub actual_memory: Option<f64>,
    /// Set when a fallback in the chain above was used instead of `chosen`
    /// (spec §4.8's fallback chain; `chosen` remains the originally-picked
    /// primary for audit purposes, this records what actually ran).
    pub fallback: Option<AlgorithmTag>,
    /// When this entry was recorded.
    #[cfg_attr(feature = "serialize", serde(skip))]
    pub recorded_at: DateTime<Utc>,
}

/// Retention policy: 7 days or 10,000 entries, whichever hits first (spec §3).
const MAX_ENTRIES: usize = 10_000;
const RETENTION_DAYS: i64 = 7;

/// Append-only ring-buffer store for [`SelectionLogEntry`] values.
#[derive(Default)]
pub struct SelectionLogStore {
    entries: VecDeque<SelectionLogEntry>,
    next_id: u64,
}

impl SelectionLogStore {
    /// Create an empty store.
    pub fn new() -> Self {
        SelectionLogStore {
            entries: VecDeque::new(),
            next_id: 0,
        }
    }

    /// Record a new selection, assigning it the next id and `now` as its
    /// `recorded_at`. Evicts the oldest entry if the store is at capacity.
    pub fn create(&mut self, mut entry: SelectionLogEntry, now: DateTime<Utc>) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        entry.id = id;
        entry.recorded_at = now;

        if self.entries.len() >= MAX_ENTRIES {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
        id
    }

    /// Attach actuals to a previously recorded entry, by id.
    pub fn update(&mut self, id: u64, actuals: Actuals) -> bool {
        if let Some(entry) = self.entries.iter_mut().find(|e| e.id == id) {
            if actuals.duration_ms.is_some() {
                entry.actual_duration = actuals.duration_ms;
            }
            if actuals.quality.is_some() {
                entry.actual_quality = actuals.quality;
            }
            if actuals.memory.is_some() {
                entry.actual_memory = actuals.memory;
            }
            true
        } else {
            false
        }
    }

    /// Look up an entry by id.
    pub fn get(&self, id: u64) -> Option<&SelectionLogEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    /// Count of entries per chosen algorithm tag, most-recent-first input order preserved.
    pub fn distribution(&self) -> Vec<(AlgorithmTag, usize)> {
        let mut counts: Vec<(AlgorithmTag, usize)> = Vec::new();
        for entry in &self.entries {
            match counts.iter_mut().find(|(tag, _)| *tag == entry.chosen) {
                Some((_, count)) => *count += 1,
                None => counts.push((entry.chosen, 1)),
            }
        }
        counts
    }

    /// Entries recorded within the trailing `window` of `now`. `window`
    /// matches `/\d+[hmd]/`: a number of hours, minutes, or days.
    pub fn trend(&self, window: &str, now: DateTime<Utc>) -> Vec<&SelectionLogEntry> {
        let cutoff = match parse_window(window) {
            Some(duration) => now - duration,
            None => return Vec::new(),
        };
        self.entries.iter().filter(|e| e.recorded_at >= cutoff).collect()
    }

    /// Evict entries older than the 7-day retention window. O(entries
    /// evicted) thanks to the ring buffer's sorted-by-insertion ordering.
    pub fn evict_expired(&mut self, now: DateTime<Utc>) {
        let cutoff = now - chrono::Duration::days(RETENTION_DAYS);
        while matches!(self.entries.front(), Some(e) if e.recorded_at < cutoff) {
            self.entries.pop_front();
        }
    }

    /// Number of entries currently retained.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn parse_window(window: &str) -> Option<chrono::Duration> {
    let (digits, unit) = window.split_at(window.len().checked_sub(1)?);
    let value: i64 = digits.parse().ok()?;
    match unit {
        "h" => Some(chrono::Duration::hours(value)),
        "m" => Some(chrono::Duration::minutes(value)),
        "d" => Some(chrono::Duration::days(value)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(correlation_id: &str) -> SelectionLogEntry {
        SelectionLogEntry {
            id: 0,
            correlation_id: correlation_id.to_string(),
            workload_class: WorkloadClass::Small,
            workload_size: 10,
            workload_complexity: 0.5,
            candidates: Vec::new(),
            chosen: "bfd",
            reason: "default policy".to_string(),
            confidence: 0.8,
            actual_duration: None,
            actual_quality: None,
            actual_memory: None,
            fallback: None,
            recorded_at: Utc::now(),
        }
    }

    #[test]
    fn classify_matches_spec_boundaries() {
        assert_eq!(WorkloadClass::classify(25), WorkloadClass::Tiny);
        assert_eq!(WorkloadClass::classify(26), WorkloadClass::Small);
        assert_eq!(WorkloadClass::classify(100), WorkloadClass::Small);
        assert_eq!(WorkloadClass::classify(101), WorkloadClass::Medium);
        assert_eq!(WorkloadClass::classify(500), WorkloadClass::Medium);
        assert_eq!(WorkloadClass::classify(501), WorkloadClass::Large);
        assert_eq!(WorkloadClass::classify(2000), WorkloadClass::Large);
        assert_eq!(WorkloadClass::classify(2001), WorkloadClass::XLarge);
    }

    #[test]
    fn ring_buffer_evicts_oldest_at_capacity() {
        let mut store = SelectionLogStore::new();
        for i in 0..MAX_ENTRIES + 5 {
            store.create(entry(&format!("corr-{i}")), Utc::now());
        }
        assert_eq!(store.len(), MAX_ENTRIES);
        assert_eq!(store.get(0), None);
        assert!(store.get(5).is_some());
    }

    #[test]
    fn update_attaches_actuals() {
        let mut store = SelectionLogStore::new();
        let id = store.create(entry("corr-1"), Utc::now());
        assert!(store.update(
            id,
            Actuals {
                duration_ms: Some(120.0),
                quality: Some(0.9),
                memory: None,
            }
        ));
        let got = store.get(id).unwrap();
        assert_eq!(got.actual_duration, Some(120.0));
        assert_eq!(got.actual_quality, Some(0.9));
        assert_eq!(got.actual_memory, None);
    }

    #[test]
    fn trend_filters_by_window() {
        let mut store = SelectionLogStore::new();
        let now = Utc::now();
        let mut old = entry("corr-old");
        old.id = 0;
        store.entries.push_back(SelectionLogEntry {
            recorded_at: now - chrono::Duration::days(2),
            ..old
        });
        store.create(entry("corr-new"), now);

        let recent = store.trend("1d", now);
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].correlation_id, "corr-new");
    }

    #[test]
    fn evict_expired_drops_entries_past_retention() {
        let mut store = SelectionLogStore::new();
        let now = Utc::now();
        store.entries.push_back(SelectionLogEntry {
            recorded_at: now - chrono::Duration::days(8),
            ..entry("corr-stale")
        });
        store.create(entry("corr-fresh"), now);
        store.evict_expired(now);
        assert_eq!(store.len(), 1);
        assert_eq!(store.entries[0].correlation_id, "corr-fresh");
    }
}
