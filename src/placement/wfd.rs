//! Worst-Fit-Decreasing (spec §4.4).

use super::{enforce_reclaim_gate, finalize_bar, open_new_bar, sorted_decreasing, NewBar, Placer, PlacementOutcome, WorkingBar};
use crate::types::{Bar, Constraints, ExpandedPiece, ProfileId, StockOption};

/// Places each piece in whichever open bar leaves the *largest* remainder,
/// spreading waste across bars rather than concentrating it. Mainly useful
/// as a diversification seed for the metaheuristics (spec §4.4) rather than
/// as a production heuristic on its own.
pub struct Wfd;

impl Placer for Wfd {
    fn place(
        &self,
        pieces: &[ExpandedPiece],
        profile_type: &ProfileId,
        menu: &[StockOption],
        constraints: &Constraints,
    ) -> PlacementOutcome {
        let pieces = sorted_decreasing(pieces);
        let mut menu: Vec<StockOption> = menu.to_vec();
        let mut open: Vec<WorkingBar> = Vec::new();
        let mut finished: Vec<Bar> = Vec::new();
        let mut infeasible = false;

        for piece in &pieces {
            let worst = open
                .iter()
                .enumerate()
                .filter(|(_, bar)| bar.can_fit(piece.length, constraints))
                .map(|(i, bar)| {
                    let remainder_after = bar.remaining(constraints.kerf_width)
                        - if bar.lengths.is_empty() {
                            piece.length
                        } else {
                            piece.length + constraints.kerf_width
                        };
                    (i, remainder_after)
                })
                .max_by_key(|(i, remainder)| (*remainder, std::cmp::Reverse(*i)));

            if let Some((index, _)) = worst {
                open[index].push(piece.length, piece.id);
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
}
