//! Profile-Pooling Partitioner (C7, spec §4.7).
//!
//! Splits demand by `profile_type`, hands each partition to an inner
//! placer/solver closure, and concatenates the results with recomputed
//! totals. Partitions are visited in `profile_type` lexicographic order, so
//! the concatenated bar list stays deterministic (spec §5).

use std::collections::BTreeMap;

use crate::placement::PlacementOutcome;
use crate::types::{ExpandedPiece, ProfileId, Recommendation, Severity};

/// One profile's demand, grouped for dispatch to an inner algorithm.
pub struct Partition {
    /// Profile this partition belongs to.
    pub profile_type: ProfileId,
    /// That profile's expanded pieces.
    pub pieces: Vec<ExpandedPiece>,
}

/// Group `pieces` by `profile_type`, visiting profiles in lexicographic order.
pub fn partition(pieces: &[ExpandedPiece]) -> Vec<Partition> {
    let mut groups: BTreeMap<ProfileId, Vec<ExpandedPiece>> = BTreeMap::new();
    for piece in pieces {
        groups.entry(piece.profile_type.clone()).or_default().push(piece.clone());
    }
    groups
        .into_iter()
        .map(|(profile_type, pieces)| Partition { profile_type, pieces })
        .collect()
}

/// Dispatch every partition through `solve_one`, concatenate the resulting
/// bars (preserving partition order) and flag the combined outcome
/// infeasible if any partition was. Also returns a warning recommendation
/// for any partition whose efficiency fell below 85% or whose largest
/// remaining scrap exceeded 500mm, per spec §4.7.
pub fn solve_partitioned<F>(partitions: &[Partition], mut solve_one: F) -> (PlacementOutcome, Vec<Recommendation>)
where
    F: FnMut(&Partition) -> PlacementOutcome,
{
    let mut bars = Vec::new();
    let mut infeasible = false;
    let mut warnings = Vec::new();

    for partition in partitions {
        let outcome = solve_one(partition);
        infeasible |= outcome.infeasible;

        let total_stock: u64 = outcome.bars.iter().map(|b| b.stock_length).sum();
        let total_used: u64 = outcome.bars.iter().map(|b| b.used_length).sum();
        let efficiency = if total_stock == 0 {
            100.0
        } else {
            100.0 * total_used as f64 / total_stock as f64
        };
        let max_scrap = outcome.bars.iter().map(|b| b.remaining_length).max().unwrap_or(0);

        if efficiency < 85.0 {
            warnings.push(Recommendation {
                severity: Severity::Medium,
                message: format!("profile {} packed at {:.1}% efficiency, below the 85% partition threshold", partition.profile_type, efficiency),
                expected_improvement: 85.0 - efficiency,
            });
        }
        if max_scrap > 500 {
            warnings.push(Recommendation {
                severity: Severity::Low,
                message: format!("profile {} left a {} mm scrap remainder above the 500 mm partition threshold", partition.profile_type, max_scrap),
                expected_improvement: 0.0,
            });
        }

        bars.extend(outcome.bars);
    }

    (PlacementOutcome { bars, infeasible }, warnings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::placement::{first_fit_pack, sorted_decreasing};
    use crate::types::{Bar, Constraints, Placement, StockOption};

    fn piece(id: usize, profile: &str, length: u64) -> ExpandedPiece {
        ExpandedPiece {
            id,
            profile_type: profile.to_string(),
            length,
        }
    }

    #[test]
    fn partitions_are_grouped_lexicographically() {
        let pieces = vec![piece(0, "B", 100), piece(1, "A", 200), piece(2, "B", 150)];
        let parts = partition(&pieces);
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].profile_type, "A");
        assert_eq!(parts[1].profile_type, "B");
        assert_eq!(parts[1].pieces.len(), 2);
    }

    #[test]
    fn warns_on_low_efficiency_partition() {
        let pieces = vec![piece(0, "A", 100)];
        let parts = partition(&pieces);
        let menu = vec![StockOption {
            stock_length: 6000,
            available: None,
        }];
        let constraints = Constraints::default();

        let (outcome, warnings) = solve_partitioned(&parts, |p| {
            let sorted = sorted_decreasing(&p.pieces);
            first_fit_pack(&sorted, &p.profile_type, &menu, &constraints)
        });

        assert_eq!(outcome.bars.len(), 1);
        assert!(warnings.iter().any(|w| w.message.contains("efficiency")));
    }

    #[test]
    fn concatenated_totals_recompute_across_partitions() {
        fn bar(profile: &str, stock: u64, used: u64) -> Bar {
            Bar {
                stock_length: stock,
                profile_type: profile.to_string(),
                placements: vec![Placement {
                    length: used,
                    offset: 0,
                    demand_id: 0,
                }],
                used_length: used,
                remaining_length: stock - used,
                cut_count: 1,
            }
        }

        let parts = vec![
            Partition {
                profile_type: "A".into(),
                pieces: vec![],
            },
            Partition {
                profile_type: "B".into(),
                pieces: vec![],
            },
        ];
        let mut call = 0;
        let (outcome, _warnings) = solve_partitioned(&parts, |p| {
            call += 1;
            PlacementOutcome {
                bars: vec![bar(&p.profile_type, 6000, 6000)],
                infeasible: false,
            }
        });
        assert_eq!(call, 2);
        assert_eq!(outcome.bars.len(), 2);
    }
}
