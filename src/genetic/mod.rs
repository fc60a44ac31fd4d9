//! Genetic Algorithm metaheuristic (C5, spec §4.5).
//!
//! A chromosome is a permutation of the expanded piece sequence for one
//! profile; decoding runs first-fit packing over that order (see
//! [`chromosome::Chromosome::decode`]). The population itself follows the
//! teacher's `Population`/epoch shape (owned `Vec` of units, a seeded RNG,
//! an `epochs` driver loop) but swaps the teacher's breed/survival-factor
//! culling for the tournament selection, ordered crossover, swap mutation
//! and elitism spec'd for this engine.

pub mod chromosome;

pub use chromosome::Chromosome;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use rayon::ThreadPool;

use crate::placement::PlacementOutcome;
use crate::scorer::ScoreCeilings;
use crate::search::SolveContext;
use crate::types::{Constraints, ExpandedPiece, GeneticParams, Objectives, ProfileId, StockOption};

struct Individual {
    chromosome: Chromosome,
    fitness: f64,
}

/// Result of a completed (or budget-cut) genetic run.
pub struct GeneticResult {
    /// Best placement found.
    pub outcome: PlacementOutcome,
    /// Set when the wall-clock/cancellation budget cut the run short.
    pub partial: bool,
}

/// Run the genetic algorithm over `pieces` (one profile's expanded demand).
///
/// Population is seeded with the identity order, an FFD-equivalent order
/// (identity decodes to FFD when `pieces` is already length-sorted by the
/// caller... but here the population is free-permutation, so identity is
/// just one more random-ish start) plus uniformly shuffled permutations.
/// Termination is whichever comes first: `params.generations`, 10
/// consecutive generations with relative fitness improvement below
/// `params.convergence_threshold`, or the context's deadline/cancellation.
pub fn run(
    pieces: &[ExpandedPiece],
    profile_type: &ProfileId,
    menu: &[StockOption],
    constraints: &Constraints,
    objectives: &Objectives,
    ceilings: ScoreCeilings,
    params: &GeneticParams,
    ctx: &SolveContext,
) -> GeneticResult {
    let n = pieces.len();
    if n == 0 {
        return GeneticResult {
            outcome: PlacementOutcome {
                bars: Vec::new(),
                infeasible: false,
            },
            partial: false,
        };
    }

    let mut rng = StdRng::seed_from_u64(ctx.seed);
    let pop_size = params.population_size.max(4);
    let pool = worker_pool(ctx.workers);

    let decode_and_score = |chromosome: &Chromosome| -> Individual {
        let outcome = chromosome.decode(pieces, profile_type, menu, constraints);
        let fitness = chromosome::fitness_of(&outcome, objectives, ceilings, constraints.max_waste_pct);
        Individual {
            chromosome: chromosome.clone(),
            fitness,
        }
    };
    // Chromosome generation stays sequential (it consumes `rng` in a fixed
    // order, which is what makes same-seed runs reproducible per spec §5);
    // only the pure decode+score step — one FFD sweep per chromosome — is
    // handed to the bounded worker pool from spec §5 ("MAY use a worker
    // pool... to evaluate chromosomes... in parallel").
    let score_all = |chromosomes: &[Chromosome]| -> Vec<Individual> {
        match &pool {
            Some(pool) => pool.install(|| chromosomes.par_iter().map(decode_and_score).collect()),
            None => chromosomes.iter().map(decode_and_score).collect(),
        }
    };

    let mut chromosomes: Vec<Chromosome> = Vec::with_capacity(pop_size);
    chromosomes.push(Chromosome::identity(n));
    for _ in 1..pop_size {
        chromosomes.push(Chromosome::random(n, &mut rng));
    }
    let mut population = score_all(&chromosomes);
    sort_descending(&mut population);

    let mut best = clone_best(&population);
    let mut stagnant_generations = 0u32;
    let mut partial = false;

    for _generation in 0..params.generations {
        if ctx.should_stop() {
            partial = true;
            break;
        }

        let mut next_chromosomes: Vec<Chromosome> = population
            .iter()
            .take(params.elitism.min(population.len()))
            .map(|ind| ind.chromosome.clone())
            .collect();

        while next_chromosomes.len() < pop_size {
            let parent_a = tournament_select(&population, params.tournament_size, &mut rng);
            let parent_b = tournament_select(&population, params.tournament_size, &mut rng);
            let mut child = parent_a.order_crossover(parent_b, &mut rng);
            child.swap_mutate(&mut rng);
            next_chromosomes.push(child);
        }

        let mut next_generation = score_all(&next_chromosomes);
        sort_descending(&mut next_generation);
        population = next_generation;

        let improvement = if best.fitness.abs() > f64::EPSILON {
            (population[0].fitness - best.fitness) / best.fitness.abs()
        } else {
            population[0].fitness
        };

        if population[0].fitness > best.fitness {
            best = clone_best(&population);
        }

        if improvement < params.convergence_threshold {
            stagnant_generations += 1;
        } else {
            stagnant_generations = 0;
        }

        if stagnant_generations >= 10 {
            break;
        }
    }

    let outcome = best.chromosome.decode(pieces, profile_type, menu, constraints);
    GeneticResult { outcome, partial }
}

/// Build a bounded thread pool for the decode/score step when more than one
/// worker is available; `None` keeps the caller on a plain sequential
/// iterator (a pool with 1 thread would just add overhead).
fn worker_pool(workers: usize) -> Option<ThreadPool> {
    if workers > 1 {
        rayon::ThreadPoolBuilder::new().num_threads(workers).build().ok()
    } else {
        None
    }
}

fn sort_descending(population: &mut [Individual]) {
    population.sort_by(|a, b| b.fitness.partial_cmp(&a.fitness).unwrap_or(std::cmp::Ordering::Equal));
}

fn clone_best(population: &[Individual]) -> Individual {
    Individual {
        chromosome: population[0].chromosome.clone(),
        fitness: population[0].fitness,
    }
}

fn tournament_select<'a, R: Rng + ?Sized>(population: &'a [Individual], size: usize, rng: &mut R) -> &'a Chromosome {
    let size = size.max(1).min(population.len());
    let mut best_idx = rng.gen_range(0..population.len());
    for _ in 1..size {
        let idx = rng.gen_range(0..population.len());
        if population[idx].fitness > population[best_idx].fitness {
            best_idx = idx;
        }
    }
    &population[best_idx].chromosome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::StockOption;

    fn pieces(lengths: &[u64]) -> Vec<ExpandedPiece> {
        lengths
            .iter()
            .enumerate()
            .map(|(i, &length)| ExpandedPiece {
                id: i,
                profile_type: "A".into(),
                length,
            })
            .collect()
    }

    #[test]
    fn s5_same_seed_is_reproducible() {
        let mut demand = Vec::new();
        for i in 0..25 {
            demand.push(1200);
            let _ = i;
        }
        for i in 0..40 {
            demand.push(800);
            let _ = i;
        }
        let pieces = pieces(&demand);
        let menu = vec![StockOption {
            stock_length: 6000,
            available: None,
        }];
        let constraints = Constraints::default();
        let objectives = Objectives::default();
        let ceilings = ScoreCeilings {
            cost_ceiling: 0.0,
            time_ceiling: 0.0,
        };
        let params = GeneticParams {
            population_size: 20,
            generations: 15,
            ..GeneticParams::default()
        };

        let ctx1 = SolveContext::with_budget_ms(42, 60_000, 1);
        let ctx2 = SolveContext::with_budget_ms(42, 60_000, 1);

        let r1 = run(&pieces, &"A".to_string(), &menu, &constraints, &objectives, ceilings, &params, &ctx1);
        let r2 = run(&pieces, &"A".to_string(), &menu, &constraints, &objectives, ceilings, &params, &ctx2);

        assert_eq!(r1.outcome.bars.len(), r2.outcome.bars.len());
        for (a, b) in r1.outcome.bars.iter().zip(r2.outcome.bars.iter()) {
            assert_eq!(a.placements, b.placements);
        }
    }

    #[test]
    fn empty_demand_returns_empty_plan() {
        let menu = vec![StockOption {
            stock_length: 6000,
            available: None,
        }];
        let constraints = Constraints::default();
        let objectives = Objectives::default();
        let ceilings = ScoreCeilings {
            cost_ceiling: 0.0,
            time_ceiling: 0.0,
        };
        let ctx = SolveContext::with_budget_ms(1, 1_000, 1);
        let result = run(&[], &"A".to_string(), &menu, &constraints, &objectives, ceilings, &GeneticParams::default(), &ctx);
        assert!(result.outcome.bars.is_empty());
        assert!(!result.partial);
    }
}
