//! Quarantine store (C10, spec §3, §4.10).
//!
//! Holds records the [`crate::validation_policy`] flagged `Quarantined`
//! instead of silently dropping them, so a human can review and resolve
//! them. Retention: 24 hours or 10,000 records, FIFO eviction — the
//! oldest record is evicted first regardless of its lifecycle status.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};

use crate::validation_policy::{RawRecord, RuleViolation};

/// Lifecycle of a quarantined record.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum QuarantineStatus {
    /// Awaiting human review.
    Pending,
    /// A human has looked at it but not yet decided its fate.
    Reviewed,
    /// Disposition recorded; no further action needed.
    Resolved,
}

/// One quarantined record.
#[derive(Clone, Debug, PartialEq)]
pub struct QuarantineRecord {
    /// Id assigned at quarantine time.
    pub id: u64,
    /// The original record that failed validation.
    pub original: RawRecord,
    /// The violations that caused quarantine.
    pub violations: Vec<RuleViolation>,
    /// Short human-readable reason (the most severe violation's message).
    pub reason: String,
    /// Current lifecycle status.
    pub status: QuarantineStatus,
    /// When this record was quarantined.
    pub quarantined_at: DateTime<Utc>,
}

const MAX_RECORDS: usize = 10_000;
const RETENTION_HOURS: i64 = 24;

/// FIFO-eviction store for [`QuarantineRecord`] values.
#[derive(Default)]
pub struct QuarantineStore {
    records: VecDeque<QuarantineRecord>,
    next_id: u64,
}

impl QuarantineStore {
    /// Create an empty store.
    pub fn new() -> Self {
        QuarantineStore {
            records: VecDeque::new(),
            next_id: 0,
        }
    }

    /// Quarantine `original` with its `violations`, returning the assigned id.
    pub fn quarantine(&mut self, original: RawRecord, violations: Vec<RuleViolation>, now: DateTime<Utc>) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        let reason = violations
            .iter()
            .max_by(|a, b| a.severity.cmp(&b.severity))
            .map(|v| v.message.clone())
            .unwrap_or_default();

        if self.records.len() >= MAX_RECORDS {
            self.records.pop_front();
        }
        self.records.push_back(QuarantineRecord {
            id,
            original,
            violations,
            reason,
            status: QuarantineStatus::Pending,
            quarantined_at: now,
        });
        id
    }

    /// Advance a record's lifecycle status.
    pub fn set_status(&mut self, id: u64, status: QuarantineStatus) -> bool {
        if let Some(record) = self.records.iter_mut().find(|r| r.id == id) {
            record.status = status;
            true
        } else {
            false
        }
    }

    /// Look up a record by id.
    pub fn get(&self, id: u64) -> Option<&QuarantineRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    /// Evict records past the 24-hour retention window.
    pub fn evict_expired(&mut self, now: DateTime<Utc>) {
        let cutoff = now - chrono::Duration::hours(RETENTION_HOURS);
        while matches!(self.records.front(), Some(r) if r.quarantined_at < cutoff) {
            self.records.pop_front();
        }
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
