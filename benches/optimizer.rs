use std::collections::HashMap;

use criterion::*;
use cut_optimizer_1d::types::{
    Constraints, CostModel, Objectives, PerformanceConfig, PieceDemand, StockOption, Unit,
};
use cut_optimizer_1d::{Algorithm, Engine, OptimizeRequest};
use rand::prelude::*;

fn build_request(algorithm: Algorithm, num_items: usize, seed: u64) -> OptimizeRequest {
    let mut rng: StdRng = SeedableRng::seed_from_u64(seed);

    let mut menu = HashMap::new();
    menu.insert(
        "6063-T5".to_string(),
        vec![
            StockOption {
                stock_length: 6000,
                available: None,
            },
            StockOption {
                stock_length: 5000,
                available: None,
            },
        ],
    );

    let items = (0..num_items)
        .map(|_| PieceDemand {
            profile_type: "6063-T5".to_string(),
            length: rng.gen_range(300..=3000),
            quantity: rng.gen_range(1..=4),
        })
        .collect();

    OptimizeRequest {
        items,
        algorithm: Some(algorithm),
        objectives: Objectives::default(),
        constraints: Constraints::default(),
        performance: PerformanceConfig {
            seed: Some(seed),
            budget_ms: 2_000,
            ..PerformanceConfig::default()
        },
        cost_model: CostModel::default(),
        material_stock_lengths: menu,
        unit: Unit::Mm,
        correlation_id: None,
        prefer_quality: false,
        prefer_speed: false,
    }
}

fn benchmark_ffd(c: &mut Criterion) {
    c.bench_function("ffd 200 items", |b| {
        b.iter(|| {
            let mut engine = Engine::new();
            let _ = engine.optimize(black_box(build_request(Algorithm::Ffd, 200, 1)));
        })
    });
}

fn benchmark_bfd(c: &mut Criterion) {
    c.bench_function("bfd 200 items", |b| {
        b.iter(|| {
            let mut engine = Engine::new();
            let _ = engine.optimize(black_box(build_request(Algorithm::Bfd, 200, 1)));
        })
    });
}

fn benchmark_genetic(c: &mut Criterion) {
    c.bench_function("genetic 100 items", |b| {
        b.iter(|| {
            let mut engine = Engine::new();
            let _ = engine.optimize(black_box(build_request(
                Algorithm::Genetic(Default::default()),
                100,
                1,
            )));
        })
    });
}

fn benchmark_simulated_annealing(c: &mut Criterion) {
    c.bench_function("simulated annealing 100 items", |b| {
        b.iter(|| {
            let mut engine = Engine::new();
            let _ = engine.optimize(black_box(build_request(
                Algorithm::SimulatedAnnealing(Default::default()),
                100,
                1,
            )));
        })
    });
}

criterion_group!(
    benches,
    benchmark_ffd,
    benchmark_bfd,
    benchmark_genetic,
    benchmark_simulated_annealing
);
criterion_main!(benches);
