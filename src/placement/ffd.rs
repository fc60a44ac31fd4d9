//! First-Fit-Decreasing (spec §4.4).

use super::{first_fit_pack, sorted_decreasing, Placer, PlacementOutcome};
use crate::types::{Constraints, ExpandedPiece, ProfileId, StockOption};

/// Sort pieces by length descending, then for each piece scan open bars in
/// insertion order and place it on the first one with room; otherwise open
/// a new bar.
pub struct Ffd;

impl Placer for Ffd {
    fn place(
        &self,
        pieces: &[ExpandedPiece],
        profile_type: &ProfileId,
        menu: &[StockOption],
        constraints: &Constraints,
    ) -> PlacementOutcome {
        let pieces = sorted_decreasing(pieces);
        first_fit_pack(&pieces, profile_type, menu, constraints)
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
    fn s1_trivial_three_pieces_one_bar() {
        let pieces = vec![piece(0, 2000), piece(1, 2000), piece(2, 2000)];
        let menu = vec![StockOption {
            stock_length: 6000,
            available: None,
        }];
        let constraints = Constraints::default();
        let outcome = Ffd.place(&pieces, &"A".to_string(), &menu, &constraints);
        assert_eq!(outcome.bars.len(), 1);
        assert!(!outcome.infeasible);
        let bar = &outcome.bars[0];
        assert_eq!(bar.used_length, 6000);
        assert_eq!(bar.remaining_length, 0);
        let offsets: Vec<u64> = bar.placements.iter().map(|p| p.offset).collect();
        assert_eq!(offsets, vec![0, 2000, 4000]);
    }

    #[test]
    fn s2_kerf_consumes_the_last_piece() {
        let pieces = vec![piece(0, 2000), piece(1, 2000), piece(2, 2000)];
        let menu = vec![StockOption {
            stock_length: 6000,
            available: None,
        }];
        let constraints = Constraints {
            kerf_width: 5,
            ..Constraints::default()
        };
        let outcome = Ffd.place(&pieces, &"A".to_string(), &menu, &constraints);
        assert_eq!(outcome.bars.len(), 2);
        assert_eq!(outcome.bars[0].used_length, 4005);
        assert_eq!(outcome.bars[0].remaining_length, 1995);
        assert_eq!(outcome.bars[1].used_length, 2000);
        assert_eq!(outcome.bars[1].remaining_length, 4000);
    }

    #[test]
    fn single_oversize_piece_is_infeasible_with_synthetic_bar() {
        let pieces = vec![piece(0, 7000)];
        let menu = vec![StockOption {
            stock_length: 6000,
            available: None,
        }];
        let outcome = Ffd.place(&pieces, &"A".to_string(), &menu, &Constraints::default());
        assert!(outcome.infeasible);
        assert_eq!(outcome.bars.len(), 1);
        assert_eq!(outcome.bars[0].stock_length, 7000);
        assert_eq!(outcome.bars[0].remaining_length, 0);
    }

    #[test]
    fn empty_demand_yields_no_bars() {
        let outcome = Ffd.place(&[], &"A".to_string(), &[], &Constraints::default());
        assert!(outcome.bars.is_empty());
        assert!(!outcome.infeasible);
    }

    #[test]
    fn reclaim_waste_only_closes_out_reclaimable_bars_before_opening_new_ones() {
        // Without reclaim_waste_only, bar 1 (6000 piece, 4000 remaining)
        // would stay open and the trailing 1000 piece would land back on
        // it (first-fit order). With reclaim_waste_only, bar 1's remainder
        // (>= min_scrap_length) is reclaimable, so it's closed out before
        // the 5000 piece forces a new bar open, and the 1000 piece then has
        // nowhere to land but bar 2.
        let pieces = vec![piece(0, 6000), piece(1, 5000), piece(2, 1000)];
        let menu = vec![StockOption {
            stock_length: 10_000,
            available: None,
        }];
        let constraints = Constraints {
            min_scrap_length: 1000,
            reclaim_waste_only: true,
            ..Constraints::default()
        };
        let outcome = Ffd.place(&pieces, &"A".to_string(), &menu, &constraints);
        assert_eq!(outcome.bars.len(), 2);

        let bar_with_6000 = outcome
            .bars
            .iter()
            .find(|b| b.placements.iter().any(|p| p.length == 6000))
            .unwrap();
        assert_eq!(bar_with_6000.placements.len(), 1, "bar holding the 6000 piece should have been closed out, not reused");

        let bar_with_5000 = outcome
            .bars
            .iter()
            .find(|b| b.placements.iter().any(|p| p.length == 5000))
            .unwrap();
        assert_eq!(bar_with_5000.placements.len(), 2, "the 1000 piece should land on the bar opened for the 5000 piece");
    }

    #[test]
    fn without_reclaim_waste_only_the_trailing_piece_reuses_the_first_bar() {
        // Same input as above but with the default (false) flag: bar 1
        // stays open and the 1000 piece lands back on it since FFD scans
        // open bars in insertion order.
        let pieces = vec![piece(0, 6000), piece(1, 5000), piece(2, 1000)];
        let menu = vec![StockOption {
            stock_length: 10_000,
            available: None,
        }];
        let constraints = Constraints {
            min_scrap_length: 1000,
            ..Constraints::default()
        };
        let outcome = Ffd.place(&pieces, &"A".to_string(), &menu, &constraints);
        assert_eq!(outcome.bars.len(), 2);
        assert_eq!(outcome.bars[0].placements.len(), 2);
        assert_eq!(outcome.bars[1].placements.len(), 1);
    }
}
