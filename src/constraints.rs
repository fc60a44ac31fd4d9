//! Constraint & Kerf Arithmetic (C1, spec §4.1).
//!
//! This module computes the usable window of a stock bar and decides
//! whether a candidate sequence of pieces can be placed inside it. It is
//! the single source of truth for "does this fit" questions asked by every
//! placement heuristic, the metaheuristics, and the exact solver.

use crate::types::Constraints;

/// Reason a candidate placement was rejected.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ViolationReason {
    /// Safeties alone consume the whole (or more than the whole) bar.
    SafetiesExceedStock,
    /// The pieces plus kerf don't fit in the usable window.
    ExceedsUsableWindow,
    /// Placing these pieces would exceed `max_cuts_per_stock`.
    TooManyCuts,
}

/// A rejected placement, with the reason.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ConstraintViolation {
    /// Why the placement was rejected.
    pub reason: ViolationReason,
}

/// Outcome of successfully placing a sequence of pieces on a bar.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Admissibility {
    /// Millimetres consumed by pieces plus inter-piece kerf (excludes safeties).
    pub consumed: u64,
    /// Millimetres left over inside the usable window after `consumed`.
    pub gap: u64,
    /// Whether `gap` is large enough to count as reclaimable scrap, or is
    /// exactly zero (a perfect fit); a nonzero gap smaller than
    /// `min_scrap_length` is ordinary waste.
    pub reclaimable: bool,
}

/// `stock_length - start_safety - end_safety`, the length actually
/// available for pieces and inter-piece kerf.
pub fn usable_window(stock_length: u64, constraints: &Constraints) -> Result<u64, ConstraintViolation> {
    let safeties = constraints.start_safety + constraints.end_safety;
    if safeties > stock_length {
        return Err(ConstraintViolation {
            reason: ViolationReason::SafetiesExceedStock,
        });
    }
    Ok(stock_length - safeties)
}

/// Millimetres consumed by `n` pieces of lengths `lengths` and
/// `n-1` inter-piece kerfs.
pub fn consumed_span(lengths: &[u64], kerf_width: u64) -> u64 {
    if lengths.is_empty() {
        return 0;
    }
    let sum: u64 = lengths.iter().sum();
    sum + kerf_width * (lengths.len() as u64 - 1)
}

/// Check whether `lengths` can be placed together on a bar of `stock_length`
/// under `constraints`. This is the admissibility predicate of spec §4.1:
/// the consumed span must fit the usable window, the cut count must not
/// exceed `max_cuts_per_stock`, and any trailing gap is either zero,
/// reclaimable, or ordinary waste (all three are admissible; the caller
/// decides what to do with a non-reclaimable gap).
pub fn check_admissible(
    lengths: &[u64],
    stock_length: u64,
    constraints: &Constraints,
) -> Result<Admissibility, ConstraintViolation> {
    let usable = usable_window(stock_length, constraints)?;

    if lengths.len() as u32 > constraints.max_cuts_per_stock {
        return Err(ConstraintViolation {
            reason: ViolationReason::TooManyCuts,
        });
    }

    let consumed = consumed_span(lengths, constraints.kerf_width);
    if consumed > usable {
        return Err(ConstraintViolation {
            reason: ViolationReason::ExceedsUsableWindow,
        });
    }

    let gap = usable - consumed;
    let reclaimable = gap == 0 || gap >= constraints.min_scrap_length;

    Ok(Admissibility {
        consumed,
        gap,
        reclaimable,
    })
}

/// Whether appending one more piece of `next_length` to a bar that already
/// holds `existing` pieces stays admissible. Convenience wrapper used by
/// incremental placement heuristics so they don't have to re-slice a vector
/// on every probe.
pub fn fits_additional(
    existing_consumed: u64,
    existing_count: usize,
    next_length: u64,
    usable: u64,
    constraints: &Constraints,
) -> bool {
    if existing_count as u32 + 1 > constraints.max_cuts_per_stock {
        return false;
    }
    let additional = if existing_count == 0 {
        next_length
    } else {
        next_length + constraints.kerf_width
    };
    existing_consumed + additional <= usable
}

/// `used_length` as defined in the data model: consumed span plus both
/// safeties.
pub fn used_length(consumed: u64, constraints: &Constraints) -> u64 {
    consumed + constraints.start_safety + constraints.end_safety
}
