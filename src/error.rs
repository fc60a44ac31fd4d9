//! Error taxonomy used across the engine (spec §7).
//!
//! Every fallible operation returns `Result<T, EngineError>`. Search
//! failures inside the placement/metaheuristic/exact-solver components are
//! *not* represented as errors — those return a best-effort [`crate::types::Plan`]
//! with `partial`/`infeasible` flags set instead, per the propagation policy.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hasher;

use chrono::{DateTime, Utc};
use fnv::FnvHasher;

/// Coarse error classification, independent of the human-readable message.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Input failed a hard validation rule (see [`crate::validation_policy`]).
    ValidationRejected,
    /// A requested placement cannot satisfy kerf/safety/cut-count constraints.
    ConstraintViolation,
    /// No stock option can hold the demand even ignoring safeties.
    Infeasible,
    /// A wall-clock or iteration budget was exhausted.
    BudgetExceeded,
    /// The caller cancelled the operation before it produced a usable result.
    Cancelled,
    /// The result validator rejected an internally-produced plan.
    InternalInconsistency,
    /// A configuration value was out of range or self-contradictory.
    ConfigError,
    /// The engine is at its concurrency limit and rejected a new request.
    TooBusy,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::ValidationRejected => "ValidationRejected",
            ErrorKind::ConstraintViolation => "ConstraintViolation",
            ErrorKind::Infeasible => "Infeasible",
            ErrorKind::BudgetExceeded => "BudgetExceeded",
            ErrorKind::Cancelled => "Cancelled",
            ErrorKind::InternalInconsistency => "InternalInconsistency",
            ErrorKind::ConfigError => "ConfigError",
            ErrorKind::TooBusy => "TooBusy",
        };
        f.write_str(s)
    }
}

/// A structured engine error, carrying enough context for a host's error
/// payload (transport boundary is out of scope, see spec §1).
#[derive(Debug, Clone, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct EngineError {
    /// Unique id for this error occurrence.
    pub id: String,
    /// Correlation id linking this error to a request/selection log entry.
    pub correlation_id: String,
    /// Coarse classification.
    pub kind: ErrorKind,
    /// Human-readable explanation.
    pub message: String,
    /// Whether the caller can retry or adjust input to recover.
    pub recoverable: bool,
    /// Free-form structured details (e.g. offending rule ids, bar dumps).
    pub details: HashMap<String, String>,
    /// When this error was created.
    pub timestamp: DateTime<Utc>,
}

impl EngineError {
    /// Build a new error of the given kind.
    pub fn new(kind: ErrorKind, correlation_id: impl Into<String>, message: impl Into<String>) -> Self {
        EngineError {
            id: format!("err-{:x}", fnv_hash(message_seed())),
            correlation_id: correlation_id.into(),
            kind,
            message: message.into(),
            recoverable: !matches!(kind, ErrorKind::InternalInconsistency),
            details: HashMap::new(),
            timestamp: Utc::now(),
        }
    }

    /// Attach a detail entry, builder-style.
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }

    /// Exit code a thin CLI wrapper should use for this error, per spec §6:
    /// 0 success (not an error), 2 validation rejected, 3 infeasible plan,
    /// 4 cancellation, 5 internal inconsistency. Any other kind maps to 1
    /// (generic failure), which the CLI table does not otherwise enumerate.
    pub fn exit_code(&self) -> i32 {
        match self.kind {
            ErrorKind::ValidationRejected => 2,
            ErrorKind::Infeasible => 3,
            ErrorKind::Cancelled => 4,
            ErrorKind::InternalInconsistency => 5,
            _ => 1,
        }
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, EngineError>;

fn message_seed() -> u64 {
    use std::sync::atomic::{AtomicU64, Ordering};
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    COUNTER.fetch_add(1, Ordering::Relaxed)
}

fn fnv_hash(seed: u64) -> u64 {
    let mut hasher = FnvHasher::default();
    hasher.write_u64(seed);
    hasher.finish()
}
