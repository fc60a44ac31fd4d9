//! Placement Primitives (C4, spec §4.4).
//!
//! All four constructive heuristics (FFD/BFD/NFD/WFD) share the same
//! kerf-aware bar-building primitives from this module; they differ only in
//! which open bar they consider for an incoming piece. Every heuristic
//! operates on the pieces of a *single* profile type — partitioning demand
//! by profile is [`crate::pooling`]'s job.

mod bfd;
mod ffd;
mod nfd;
mod wfd;

pub use bfd::Bfd;
pub use ffd::Ffd;
pub use nfd::Nfd;
pub use wfd::Wfd;

use crate::constraints::{check_admissible, consumed_span, fits_additional, used_length};
use crate::types::{Bar, Constraints, DemandId, ExpandedPiece, Placement, ProfileId, StockOption};

/// Common interface every constructive heuristic implements.
pub trait Placer {
    /// Place every piece in `pieces` (all belonging to `profile_type`) onto
    /// bars chosen from `menu`, respecting `constraints`. Returns the bars
    /// used and whether any piece could not be placed on a real stock
    /// option (in which case a synthetic over-long bar stands in for it and
    /// `infeasible` is set).
    fn place(
        &self,
        pieces: &[ExpandedPiece],
        profile_type: &ProfileId,
        menu: &[StockOption],
        constraints: &Constraints,
    ) -> PlacementOutcome;
}

/// Result of running one constructive heuristic over one profile's demand.
#[derive(Clone, Debug, PartialEq)]
pub struct PlacementOutcome {
    /// Bars produced, in the order they were opened.
    pub bars: Vec<Bar>,
    /// Set when at least one piece needed a synthetic over-long bar.
    pub infeasible: bool,
}

/// A bar under construction: tracks the pieces placed so far without yet
/// computing offsets (those are assigned once when the bar is finalized).
#[derive(Clone, Debug)]
pub(crate) struct WorkingBar {
    pub stock_length: u64,
    pub usable: u64,
    pub lengths: Vec<u64>,
    pub demand_ids: Vec<DemandId>,
}

impl WorkingBar {
    fn new(stock_length: u64, usable: u64) -> Self {
        WorkingBar {
            stock_length,
            usable,
            lengths: Vec::new(),
            demand_ids: Vec::new(),
        }
    }

    fn consumed(&self, kerf: u64) -> u64 {
        consumed_span(&self.lengths, kerf)
    }

    fn remaining(&self, kerf: u64) -> u64 {
        self.usable - self.consumed(kerf)
    }

    fn can_fit(&self, next_length: u64, constraints: &Constraints) -> bool {
        fits_additional(
            self.consumed(constraints.kerf_width),
            self.lengths.len(),
            next_length,
            self.usable,
            constraints,
        )
    }

    fn push(&mut self, length: u64, demand_id: DemandId) {
        self.lengths.push(length);
        self.demand_ids.push(demand_id);
    }
}

/// Sort pieces by length descending, stable so ties keep their original
/// (lexicographic) input order, per the tie-break rule in spec §4.4.
pub(crate) fn sorted_decreasing(pieces: &[ExpandedPiece]) -> Vec<ExpandedPiece> {
    let mut sorted = pieces.to_vec();
    sorted.sort_by(|a, b| b.length.cmp(&a.length));
    sorted
}

/// First-fit packing over `pieces` in the order given, with no sorting
/// applied. [`ffd::Ffd`] is this function applied to a length-descending
/// sort; the genetic algorithm's chromosome decoder ([`crate::genetic`])
/// applies it directly to a permutation it is searching over.
pub(crate) fn first_fit_pack(
    pieces: &[ExpandedPiece],
    profile_type: &ProfileId,
    menu: &[StockOption],
    constraints: &Constraints,
) -> PlacementOutcome {
    let mut menu: Vec<StockOption> = menu.to_vec();
    let mut open: Vec<WorkingBar> = Vec::new();
    let mut finished: Vec<Bar> = Vec::new();
    let mut infeasible = false;

    for piece in pieces {
        let mut placed = false;
        for bar in open.iter_mut() {
            if bar.can_fit(piece.length, constraints) {
                bar.push(piece.length, piece.id);
                placed = true;
                break;
            }
        }
        if placed {
            continue;
        }

        enforce_reclaim_gate(&mut open, &mut finished, profile_type, constraints);
        match open_new_bar(piece, profile_type, &mut menu, constraints) {
            NewBar::Fitted(working) => open.push(working),
            NewBar::Fallback(bar) => {
                infeasible = true;
                finished.push(bar);
            }
        }
    }

    for working in open {
        finished.push(finalize_bar(working, profile_type, constraints));
    }

    PlacementOutcome {
        bars: finished,
        infeasible,
    }
}

/// Candidate stock option for opening a new bar: its index in the menu and
/// the admissible consumption of the first piece placed on it.
struct NewBarCandidate {
    menu_index: usize,
    stock_length: u64,
}

/// Choose which stock option to open a new bar from for `piece_length`,
/// honouring `prioritize_small_waste` (smallest `stock_length - piece_length`,
/// tie-broken by smallest stock length then menu order) or the canonical
/// (first-listed, menu order) admissible option otherwise.
fn choose_new_bar_stock(
    menu: &[StockOption],
    piece_length: u64,
    constraints: &Constraints,
) -> Option<NewBarCandidate> {
    let mut candidates: Vec<NewBarCandidate> = menu
        .iter()
        .enumerate()
        .filter(|(_, opt)| opt.has_availability())
        .filter(|(_, opt)| check_admissible(&[piece_length], opt.stock_length, constraints).is_ok())
        .map(|(i, opt)| NewBarCandidate {
            menu_index: i,
            stock_length: opt.stock_length,
        })
        .collect();

    if candidates.is_empty() {
        return None;
    }

    if constraints.prioritize_small_waste {
        candidates.sort_by(|a, b| {
            let waste_a = a.stock_length - piece_length;
            let waste_b = b.stock_length - piece_length;
            waste_a
                .cmp(&waste_b)
                .then(a.stock_length.cmp(&b.stock_length))
                .then(a.menu_index.cmp(&b.menu_index))
        });
    } else {
        candidates.sort_by_key(|c| c.menu_index);
    }

    Some(candidates.into_iter().next().unwrap())
}

/// Enforces `reclaim_waste_only` (spec §4.4): "a bar is opened only if
/// every existing open bar is less than `min_scrap_length` remaining."
/// Rather than stall when that's not the case, this closes out (finalizes)
/// every open bar whose remainder is still `>= min_scrap_length` — treating
/// it as settled reclaimable scrap — so that once this returns, every bar
/// still in `open` satisfies the gate and a new one may be opened. A no-op
/// when the flag isn't set.
pub(crate) fn enforce_reclaim_gate(open: &mut Vec<WorkingBar>, finished: &mut Vec<Bar>, profile_type: &ProfileId, constraints: &Constraints) {
    if !constraints.reclaim_waste_only {
        return;
    }
    if open.iter().all(|bar| bar.remaining(constraints.kerf_width) < constraints.min_scrap_length) {
        return;
    }
    let mut kept = Vec::with_capacity(open.len());
    for bar in open.drain(..) {
        if bar.remaining(constraints.kerf_width) >= constraints.min_scrap_length {
            finished.push(finalize_bar(bar, profile_type, constraints));
        } else {
            kept.push(bar);
        }
    }
    *open = kept;
}

/// Fallback when no stock option can hold `piece_length` plus safeties/kerf:
/// the smallest available stock length that is at least `piece_length`,
/// ignoring safeties entirely. Still respects remaining availability.
fn choose_ignoring_safeties(menu: &[StockOption], piece_length: u64) -> Option<usize> {
    menu.iter()
        .enumerate()
        .filter(|(_, opt)| opt.has_availability() && opt.stock_length >= piece_length)
        .min_by_key(|(i, opt)| (opt.stock_length, *i))
        .map(|(i, _)| i)
}

/// Turn a [`WorkingBar`] into a finished [`Bar`], assigning offsets left to
/// right: the first piece starts right after `start_safety`; each
/// subsequent piece starts after the previous piece's length plus one kerf
/// (the first cut's kerf is charged to the first piece's face, not added
/// before it, per spec §4.1).
pub(crate) fn finalize_bar(working: WorkingBar, profile_type: &ProfileId, constraints: &Constraints) -> Bar {
    let mut placements = Vec::with_capacity(working.lengths.len());
    let mut offset = constraints.start_safety;
    for (length, demand_id) in working.lengths.iter().zip(working.demand_ids.iter()) {
        placements.push(Placement {
            length: *length,
            offset,
            demand_id: *demand_id,
        });
        offset += length + constraints.kerf_width;
    }

    let consumed = working.consumed(constraints.kerf_width);
    let used = used_length(consumed, constraints);

    Bar {
        stock_length: working.stock_length,
        profile_type: profile_type.clone(),
        placements,
        used_length: used,
        remaining_length: working.stock_length - used,
        cut_count: working.lengths.len() as u32,
    }
}

/// Build the synthetic "over-long" bar used when no stock option, even
/// ignoring safeties, can hold a piece (spec §4.12, §8 boundary case): the
/// bar's stock length is set to exactly the piece's length, safeties are
/// not applied, and the plan is marked `infeasible`.
pub(crate) fn synthetic_over_long_bar(piece: &ExpandedPiece, profile_type: &ProfileId) -> Bar {
    Bar {
        stock_length: piece.length,
        profile_type: profile_type.clone(),
        placements: vec![Placement {
            length: piece.length,
            offset: 0,
            demand_id: piece.id,
        }],
        used_length: piece.length,
        remaining_length: 0,
        cut_count: 1,
    }
}

/// Outcome of attempting to open a new bar for one piece.
pub(crate) enum NewBar {
    /// A real stock option admitted the piece under full constraints; the
    /// bar is ready for more pieces to be placed on it.
    Fitted(WorkingBar),
    /// No stock option admitted the piece under full constraints, but one
    /// fits it ignoring safeties, or none did and a synthetic bar stood in.
    /// Either way the bar is already complete (holds exactly this one
    /// piece) and the outcome must be marked `infeasible`.
    Fallback(Bar),
}

/// Attempt to open a new bar for `piece` from `menu` (decrementing
/// availability on success).
pub(crate) fn open_new_bar(
    piece: &ExpandedPiece,
    profile_type: &ProfileId,
    menu: &mut [StockOption],
    constraints: &Constraints,
) -> NewBar {
    if let Some(candidate) = choose_new_bar_stock(menu, piece.length, constraints) {
        menu[candidate.menu_index].decrement();
        let usable = candidate.stock_length - constraints.start_safety - constraints.end_safety;
        let mut working = WorkingBar::new(candidate.stock_length, usable);
        working.push(piece.length, piece.id);
        return NewBar::Fitted(working);
    }

    if let Some(index) = choose_ignoring_safeties(menu, piece.length) {
        menu[index].decrement();
        let stock_length = menu[index].stock_length;
        let bar = Bar {
            stock_length,
            profile_type: profile_type.clone(),
            placements: vec![Placement {
                length: piece.length,
                offset: 0,
                demand_id: piece.id,
            }],
            used_length: piece.length,
            remaining_length: stock_length - piece.length,
            cut_count: 1,
        };
        return NewBar::Fallback(bar);
    }

    // Nothing in the menu fits even ignoring safeties: synthetic bar.
    NewBar::Fallback(synthetic_over_long_bar(piece, profile_type))
}
