//! Cost Model (C3, spec §4.3).

use crate::types::{Bar, CostBreakdown, CostModel};

/// Derive a full cost breakdown for a set of bars, given a cost model and
/// an already-measured (or estimated) optimization time.
pub fn compute(bars: &[Bar], model: &CostModel, estimated_time_ms: f64) -> CostBreakdown {
    let total_stock_length: u64 = bars.iter().map(|b| b.stock_length).sum();
    let total_cuts: u32 = bars.iter().map(|b| b.cut_count).sum();
    let total_waste: u64 = bars.iter().map(|b| b.remaining_length).sum();
    let bar_count = bars.len() as f64;

    let material = model.material_cost * total_stock_length as f64;
    let cutting = model.cutting_cost * total_cuts as f64;
    let setup = model.setup_cost * bar_count;
    let waste = model.waste_cost * total_waste as f64;
    let time = model.time_cost * estimated_time_ms;
    let energy = model.energy_cost * bar_count * model.energy_per_stock;

    let total = material + cutting + setup + waste + time + energy;

    let total_piece_length: u64 = bars
        .iter()
        .flat_map(|b| b.placements.iter())
        .map(|p| p.length)
        .sum();
    let meters = total_piece_length as f64 / 1000.0;
    let cost_per_meter = if meters > 0.0 { total / meters } else { 0.0 };

    CostBreakdown {
        material,
        cutting,
        setup,
        waste,
        time,
        energy,
        total,
        cost_per_meter,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Placement;

    fn bar(stock_length: u64, used: u64, cuts: u32, piece_len: u64) -> Bar {
        Bar {
            stock_length,
            profile_type: "A".into(),
            placements: vec![Placement {
                length: piece_len,
                offset: 0,
                demand_id: 0,
            }],
            used_length: used,
            remaining_length: stock_length - used,
            cut_count: cuts,
        }
    }

    #[test]
    fn combines_all_components() {
        let model = CostModel {
            material_cost: 1.0,
            cutting_cost: 2.0,
            setup_cost: 3.0,
            waste_cost: 0.5,
            time_cost: 0.1,
            energy_cost: 1.0,
            energy_per_stock: 2.0,
        };
        let bars = vec![bar(6000, 6000, 3, 2000)];
        let breakdown = compute(&bars, &model, 10.0);
        assert_eq!(breakdown.material, 6000.0);
        assert_eq!(breakdown.cutting, 6.0);
        assert_eq!(breakdown.setup, 3.0);
        assert_eq!(breakdown.waste, 0.0);
        assert_eq!(breakdown.time, 1.0);
        assert_eq!(breakdown.energy, 2.0);
        assert!((breakdown.total - (6000.0 + 6.0 + 3.0 + 0.0 + 1.0 + 2.0)).abs() < 1e-9);
    }

    #[test]
    fn cost_per_meter_is_zero_with_no_pieces() {
        let breakdown = compute(&[], &CostModel::default(), 0.0);
        assert_eq!(breakdown.cost_per_meter, 0.0);
    }
}
