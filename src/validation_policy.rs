//! Validation Policy (C10, spec §4.10).
//!
//! A rule-based pre-check run on input records *before* they become the
//! strongly-typed [`crate::types::OptimizeRequest`] the rest of the engine
//! trusts. Records arrive as loosely-typed [`RawRecord`]s (signed lengths,
//! optional fields) because the failure modes this component exists to
//! catch — negative kerf, missing fields, stale data — are exactly the
//! shapes a strongly-typed `Constraints`/`PieceDemand` can no longer
//! represent once parsed. A record that passes (or is auto-fixed) is
//! converted into the typed `items`/`constraints` the engine facade uses.

use chrono::{DateTime, Utc};

use crate::types::{Constraints, PieceDemand, Unit};

/// Severity band for a rule violation.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Informational; never blocks the record on its own.
    Low,
    /// Worth auto-fixing or quarantining.
    Medium,
    /// Quarantine unless auto-fixed.
    High,
    /// Always rejects the record.
    Critical,
}

/// What the policy does in response to a violation.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Action {
    /// The value was corrected in place; processing continues.
    AutoFix,
    /// The record is held for human review rather than processed or dropped.
    Quarantine,
    /// The record is rejected outright.
    Reject,
}

/// One rule firing against a record.
#[derive(Clone, Debug, PartialEq)]
pub struct RuleViolation {
    /// Stable identifier for the rule that fired, for audit/reporting.
    pub rule_id: &'static str,
    /// Severity of this violation.
    pub severity: Severity,
    /// Action the policy takes because of it.
    pub action: Action,
    /// Human-readable explanation.
    pub message: String,
    /// Confidence that this classification (and any auto-fix) is correct.
    pub confidence: f64,
}

/// Outcome of validating one record.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// No violations; record used as-is.
    Passed,
    /// One or more violations were corrected automatically.
    AutoFixed,
    /// Held for review rather than processed or dropped.
    Quarantined,
    /// Rejected outright.
    Rejected,
}

/// Report produced by [`validate`].
#[derive(Clone, Debug, PartialEq)]
pub struct Report {
    /// Overall outcome, the most severe action implied by `violations`.
    pub overall: Outcome,
    /// Every rule that fired, in evaluation order.
    pub violations: Vec<RuleViolation>,
    /// The sanitized items, present unless `overall` is `Rejected` or `Quarantined`.
    pub items: Option<Vec<PieceDemand>>,
    /// The sanitized constraints, present under the same condition as `items`.
    pub constraints: Option<Constraints>,
    /// The record's data age as the rest of the engine should trust it:
    /// `record.data_age_s` unchanged, unless the stale-data rule fired, in
    /// which case it is clamped down to the freshness window (the actual
    /// "auto-trim" — the age this record is allowed to claim, not the raw
    /// age it arrived with).
    pub data_age_s: Option<u64>,
}

/// One item as it might arrive over the wire, before type-level guarantees apply.
#[derive(Clone, Debug, PartialEq)]
pub struct RawItem {
    /// Profile type, `None` if the field was omitted.
    pub profile_type: Option<String>,
    /// Length in the declared unit; signed because malformed input can send negatives.
    pub length: i64,
    /// Quantity; signed for the same reason.
    pub quantity: i64,
}

/// Constraints as they might arrive over the wire.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct RawConstraints {
    /// Kerf width; signed so `kerf < 0` can be detected rather than wrapping.
    pub kerf_width: i64,
    pub start_safety: i64,
    pub end_safety: i64,
    pub min_scrap_length: i64,
    /// Waste percentage cap; should be in `[0,100]`.
    pub max_waste_pct: f64,
    pub max_cuts_per_stock: i64,
    pub allow_partial_stocks: bool,
    pub prioritize_small_waste: bool,
    pub reclaim_waste_only: bool,
    pub respect_material_grades: bool,
}

/// A full pre-validation record.
#[derive(Clone, Debug, PartialEq)]
pub struct RawRecord {
    pub items: Vec<RawItem>,
    pub constraints: RawConstraints,
    /// Declared unit, `None` if the field was omitted (a "required field missing" violation).
    pub unit: Option<Unit>,
    /// Age of the data backing this record, if known.
    pub data_age_s: Option<u64>,
}

/// Maximum tolerated data age before staleness auto-trims the record.
const DEFAULT_DATA_FRESHNESS_S: u64 = 3600;

/// Validate and, where possible, sanitize a raw record.
pub fn validate(record: &RawRecord, data_freshness_s: u64, now: DateTime<Utc>) -> Report {
    let _ = now; // retained for parity with a host that timestamps reports.
    let mut violations = Vec::new();
    let mut items: Vec<PieceDemand> = Vec::new();
    let fixed_constraints = record.constraints;
    let mut hard_block = false;

    if record.constraints.max_waste_pct < 0.0 || record.constraints.max_waste_pct > 100.0 {
        violations.push(RuleViolation {
            rule_id: "waste-pct-out-of-range",
            severity: Severity::Critical,
            action: Action::Reject,
            message: format!("max_waste_pct {} is outside [0,100]", record.constraints.max_waste_pct),
            confidence: 1.0,
        });
        hard_block = true;
    }

    if record.constraints.kerf_width < 0 {
        violations.push(RuleViolation {
            rule_id: "negative-kerf",
            severity: Severity::Critical,
            action: Action::Reject,
            message: format!("kerf_width {} is negative", record.constraints.kerf_width),
            confidence: 1.0,
        });
        hard_block = true;
    }

    if record.unit.is_none() {
        violations.push(RuleViolation {
            rule_id: "missing-unit",
            severity: Severity::High,
            action: Action::Quarantine,
            message: "unit field is required".to_string(),
            confidence: 0.9,
        });
    }

    let unit = record.unit.unwrap_or_default();

    for (index, item) in record.items.iter().enumerate() {
        if item.profile_type.is_none() {
            violations.push(RuleViolation {
                rule_id: "missing-profile-type",
                severity: Severity::High,
                action: Action::Quarantine,
                message: format!("item {index} is missing profile_type"),
                confidence: 0.95,
            });
            continue;
        }
        if item.quantity <= 0 {
            violations.push(RuleViolation {
                rule_id: "non-positive-quantity",
                severity: Severity::Critical,
                action: Action::Reject,
                message: format!("item {index} has non-positive quantity {}", item.quantity),
                confidence: 1.0,
            });
            hard_block = true;
            continue;
        }
        if item.length <= 0 {
            violations.push(RuleViolation {
                rule_id: "impossible-dimension-triple",
                severity: Severity::Medium,
                action: Action::Quarantine,
                message: format!("item {index} has non-positive length {}", item.length),
                confidence: 0.85,
            });
            continue;
        }

        items.push(PieceDemand {
            profile_type: item.profile_type.clone().unwrap(),
            length: crate::units::to_mm(item.length as u64, unit),
            quantity: item.quantity as u32,
        });
    }

    let mut data_age_s = record.data_age_s;
    if let Some(age) = record.data_age_s {
        let freshness = if data_freshness_s == 0 { DEFAULT_DATA_FRESHNESS_S } else { data_freshness_s };
        if age > freshness {
            violations.push(RuleViolation {
                rule_id: "stale-data",
                severity: Severity::Medium,
                action: Action::AutoFix,
                message: format!("record is {age}s old, trimmed to the {freshness}s freshness window"),
                confidence: 0.7,
            });
            data_age_s = Some(freshness);
        }
    }

    let overall = if hard_block {
        Outcome::Rejected
    } else if violations.iter().any(|v| v.action == Action::Reject) {
        Outcome::Rejected
    } else if violations.iter().any(|v| v.action == Action::Quarantine) {
        Outcome::Quarantined
    } else if violations.iter().any(|v| v.action == Action::AutoFix) {
        Outcome::AutoFixed
    } else {
        Outcome::Passed
    };

    let (items, constraints) = if matches!(overall, Outcome::Rejected | Outcome::Quarantined) {
        (None, None)
    } else {
        (
            Some(items),
            Some(Constraints {
                kerf_width: fixed_constraints.kerf_width.max(0) as u64,
                start_safety: fixed_constraints.start_safety.max(0) as u64,
                end_safety: fixed_constraints.end_safety.max(0) as u64,
                min_scrap_length: fixed_constraints.min_scrap_length.max(0) as u64,
                max_waste_pct: fixed_constraints.max_waste_pct,
                max_cuts_per_stock: fixed_constraints.max_cuts_per_stock.clamp(0, i64::from(u32::MAX)) as u32,
                allow_partial_stocks: fixed_constraints.allow_partial_stocks,
                prioritize_small_waste: fixed_constraints.prioritize_small_waste,
                reclaim_waste_only: fixed_constraints.reclaim_waste_only,
                respect_material_grades: fixed_constraints.respect_material_grades,
            }),
        )
    };

    Report {
        overall,
        violations,
        items,
        constraints,
        data_age_s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clean_constraints() -> RawConstraints {
        RawConstraints {
            kerf_width: 3,
            start_safety: 0,
            end_safety: 0,
            min_scrap_length: 0,
            max_waste_pct: 20.0,
            max_cuts_per_stock: 10,
            allow_partial_stocks: true,
            prioritize_small_waste: false,
            reclaim_waste_only: false,
            respect_material_grades: false,
        }
    }

    #[test]
    fn clean_record_passes() {
        let record = RawRecord {
            items: vec![RawItem {
                profile_type: Some("A".into()),
                length: 2000,
                quantity: 3,
            }],
            constraints: clean_constraints(),
            unit: Some(Unit::Mm),
            data_age_s: Some(10),
        };
        let report = validate(&record, 3600, Utc::now());
        assert_eq!(report.overall, Outcome::Passed);
        assert_eq!(report.items.unwrap().len(), 1);
    }

    #[test]
    fn negative_kerf_is_rejected() {
        let mut constraints = clean_constraints();
        constraints.kerf_width = -1;
        let record = RawRecord {
            items: vec![],
            constraints,
            unit: Some(Unit::Mm),
            data_age_s: None,
        };
        let report = validate(&record, 3600, Utc::now());
        assert_eq!(report.overall, Outcome::Rejected);
        assert!(report.items.is_none());
    }

    #[test]
    fn waste_pct_out_of_range_is_rejected() {
        let mut constraints = clean_constraints();
        constraints.max_waste_pct = 150.0;
        let record = RawRecord {
            items: vec![],
            constraints,
            unit: Some(Unit::Mm),
            data_age_s: None,
        };
        let report = validate(&record, 3600, Utc::now());
        assert_eq!(report.overall, Outcome::Rejected);
    }

    #[test]
    fn missing_unit_is_quarantined() {
        let record = RawRecord {
            items: vec![],
            constraints: clean_constraints(),
            unit: None,
            data_age_s: None,
        };
        let report = validate(&record, 3600, Utc::now());
        assert_eq!(report.overall, Outcome::Quarantined);
    }

    #[test]
    fn stale_data_is_auto_fixed_not_blocked() {
        let record = RawRecord {
            items: vec![RawItem {
                profile_type: Some("A".into()),
                length: 2000,
                quantity: 1,
            }],
            constraints: clean_constraints(),
            unit: Some(Unit::Mm),
            data_age_s: Some(10_000),
        };
        let report = validate(&record, 3600, Utc::now());
        assert_eq!(report.overall, Outcome::AutoFixed);
        assert!(report.items.is_some());
        // the actual trim: the record's age is clamped down to the
        // freshness window, not left at its stale raw value.
        assert_eq!(report.data_age_s, Some(3600));
    }

    #[test]
    fn fresh_data_age_passes_through_unchanged() {
        let record = RawRecord {
            items: vec![RawItem {
                profile_type: Some("A".into()),
                length: 2000,
                quantity: 1,
            }],
            constraints: clean_constraints(),
            unit: Some(Unit::Mm),
            data_age_s: Some(10),
        };
        let report = validate(&record, 3600, Utc::now());
        assert_eq!(report.overall, Outcome::Passed);
        assert_eq!(report.data_age_s, Some(10));
    }

    #[test]
    fn non_positive_quantity_is_rejected() {
        let record = RawRecord {
            items: vec![RawItem {
                profile_type: Some("A".into()),
                length: 2000,
                quantity: 0,
            }],
            constraints: clean_constraints(),
            unit: Some(Unit::Mm),
            data_age_s: None,
        };
        let report = validate(&record, 3600, Utc::now());
        assert_eq!(report.overall, Outcome::Rejected);
    }
}
