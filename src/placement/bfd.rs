//! Best-Fit-Decreasing (spec §4.4).

use super::{enforce_reclaim_gate, finalize_bar, open_new_bar, sorted_decreasing, NewBar, Placer, PlacementOutcome, WorkingBar};
use crate::types::{Bar, Constraints, ExpandedPiece, ProfileId, StockOption};

/// Same scan as [`super::Ffd`], but among bars that fit, places the piece
/// in whichever leaves the smallest remainder, tie-broken by earliest bar
/// index.
pub struct Bfd;

impl Placer for Bfd {
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
            let best = open
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
                .min_by_key(|(i, remainder)| (*remainder, *i));

            if let Some((index, _)) = best {
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
    fn s3_bfd_beats_ffd() {
        let pieces = vec![piece(0, 3500), piece(1, 2500), piece(2, 2900), piece(3, 3100)];
        let menu = vec![StockOption {
            stock_length: 6000,
            available: None,
        }];
        let constraints = Constraints::default();
        let outcome = Bfd.place(&pieces, &"A".to_string(), &menu, &constraints);
        assert_eq!(outcome.bars.len(), 2);
        assert!((outcome.bars.iter().map(|b| b.utilization()).sum::<f64>() / 2.0 - 1.0).abs() < 1e-9);
    }

    #[test]
    fn s4_stock_menu_selection_prefers_perfect_fit() {
        let pieces = vec![piece(0, 2500), piece(1, 2500), piece(2, 2500), piece(3, 2500)];
        let menu = vec![
            StockOption {
                stock_length: 5000,
                available: None,
            },
            StockOption {
                stock_length: 6000,
                available: None,
            },
        ];
        let constraints = Constraints {
            prioritize_small_waste: true,
            ..Constraints::default()
        };
        let outcome = Bfd.place(&pieces, &"A".to_string(), &menu, &constraints);
        assert!(outcome.bars.iter().all(|b| b.stock_length == 5000));
        assert_eq!(outcome.bars.len(), 2);
    }
}
