//! Next-Fit-Decreasing (spec §4.4).

use super::{finalize_bar, open_new_bar, sorted_decreasing, NewBar, Placer, PlacementOutcome, WorkingBar};
use crate::types::{Bar, Constraints, ExpandedPiece, ProfileId, StockOption};

/// Only ever considers the most recently opened bar: closes it and opens a
/// new one as soon as a piece doesn't fit, rather than scanning earlier
/// bars. Tends to waste more than FFD/BFD but is the cheapest to compute.
///
/// `reclaim_waste_only` never changes this heuristic's behavior: at most
/// one bar is ever open at a time, and it is always closed before a new one
/// is opened, so "every open bar is below the reclaim threshold" already
/// holds vacuously whenever a new bar is about to be opened.
pub struct Nfd;

impl Placer for Nfd {
    fn place(
        &self,
        pieces: &[ExpandedPiece],
        profile_type: &ProfileId,
        menu: &[StockOption],
        constraints: &Constraints,
    ) -> PlacementOutcome {
        let pieces = sorted_decreasing(pieces);
        let mut menu: Vec<StockOption> = menu.to_vec();
        let mut current: Option<WorkingBar> = None;
        let mut finished: Vec<Bar> = Vec::new();
        let mut infeasible = false;

        for piece in &pieces {
            let fits_current = current
                .as_ref()
                .map_or(false, |bar| bar.can_fit(piece.length, constraints));

            if fits_current {
                current.as_mut().unwrap().push(piece.length, piece.id);
                continue;
            }

            if let Some(bar) = current.take() {
                finished.push(finalize_bar(bar, profile_type, constraints));
            }

            match open_new_bar(piece, profile_type, &mut menu, constraints) {
                NewBar::Fitted(working) => current = Some(working),
                NewBar::Fallback(bar) => {
                    infeasible = true;
                    finished.push(bar);
                }
            }
        }

        if let Some(bar) = current {
            finished.push(finalize_bar(bar, profile_type, constraints));
        }

        PlacementOutcome {
            bars: finished,
            infeasible,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Constraints;

    fn piece(id: usize, length: u64) -> ExpandedPiece {
        ExpandedPiece {
            id,
            profile_type: "A".into(),
            length,
        }
    }

    #[test]
    fn closes_bar_on_first_failure_even_if_a_later_piece_would_fit() {
        let pieces = vec![piece(0, 4000), piece(1, 3000), piece(2, 1000)];
        let menu = vec![StockOption {
            stock_length: 6000,
            available: None,
        }];
        let outcome = Nfd.place(&pieces, &"A".to_string(), &menu, &Constraints::default());
        // 4000 opens bar 1; 3000 doesn't fit (would need 7000) -> bar 2; 1000 fits bar 2.
        assert_eq!(outcome.bars.len(), 2);
        assert_eq!(outcome.bars[0].placements.len(), 1);
        assert_eq!(outcome.bars[1].placements.len(), 2);
    }
}
