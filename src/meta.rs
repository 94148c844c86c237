//! Meta-evolution: a small GA over the parameter configurations that govern the inner GA
pub mod online;
pub mod params;

use crate::errors::{EvoError, Result};
use params::MetaParams;
use rand::Rng;
use std::collections::VecDeque;

/// Recent meta-fitness values kept per individual
const FITNESS_HISTORY: usize = 10;
/// Fraction of the population preserved as elite
const ELITE_FRACTION: f64 = 0.3;
/// Fraction of slots rebred each meta-generation
const REBREED_FRACTION: f64 = 0.5;

/// One parameter configuration with its track record
#[derive(Clone, Debug)]
pub struct MetaIndividual {
    pub params: MetaParams,
    pub meta_fitness: f64,
    pub generation: usize,
    history: VecDeque<f64>,
}

impl MetaIndividual {
    pub fn new(params: MetaParams) -> Self {
        Self {
            params,
            meta_fitness: f64::NEG_INFINITY,
            generation: 0,
            history: VecDeque::with_capacity(FITNESS_HISTORY),
        }
    }

    pub fn is_evaluated(&self) -> bool {
        self.meta_fitness.is_finite()
    }

    pub fn history(&self) -> impl Iterator<Item = f64> + '_ {
        self.history.iter().copied()
    }

    /// Record an evaluation outcome into the bounded fitness ring
    pub fn record_fitness(&mut self, fitness: f64, generation: usize) {
        self.meta_fitness = fitness;
        self.generation = generation;
        if self.history.len() >= FITNESS_HISTORY {
            self.history.pop_front();
        }
        self.history.push_back(fitness);
    }

    /// Least-squares slope of the fitness ring; zero without enough data
    pub fn improvement_trend(&self) -> f64 {
        ols_slope(self.history.iter().copied())
    }

    fn reset_for_rebreed(&mut self) {
        self.meta_fitness = f64::NEG_INFINITY;
        self.generation = 0;
        self.history.clear();
    }
}

/// Fixed-capacity population of parameter configurations evolved by its
/// own elite-preserving GA.
#[derive(Clone, Debug)]
pub struct MetaPopulation {
    pub individuals: Vec<MetaIndividual>,
    best: Option<MetaIndividual>,
    pub generation: usize,
}

impl MetaPopulation {
    /// `n` individuals around the defaults; all but the first are perturbed
    pub fn new<R: Rng>(n: usize, rng: &mut R) -> Result<Self> {
        if n == 0 {
            return Err(EvoError::InvalidArgument(
                "meta population needs at least 1 individual".to_string(),
            ));
        }
        let mut individuals = Vec::with_capacity(n);
        individuals.push(MetaIndividual::new(MetaParams::default()));
        for _ in 1..n {
            let mut params = MetaParams::default();
            params.perturb(rng);
            individuals.push(MetaIndividual::new(params));
        }
        Ok(Self {
            individuals,
            best: None,
            generation: 0,
        })
    }

    pub fn size(&self) -> usize {
        self.individuals.len()
    }
    pub fn best(&self) -> Option<&MetaIndividual> {
        self.best.as_ref()
    }

    /// One meta-generation: sort by meta-fitness, refresh the cached best,
    /// keep the top 30% as elite and rebreed the bottom 50% of slots from
    /// tournaments of two random elites.
    pub fn evolve<R: Rng>(&mut self, rng: &mut R) {
        self.individuals.sort_by(|a, b| {
            b.meta_fitness
                .partial_cmp(&a.meta_fitness)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        if let Some(contender) = self.individuals.first() {
            let improved = self
                .best
                .as_ref()
                .map_or(true, |best| contender.meta_fitness > best.meta_fitness);
            if improved && contender.is_evaluated() {
                self.best = Some(contender.clone());
            }
        }

        let elite_count = ((self.individuals.len() as f64 * ELITE_FRACTION) as usize).max(1);
        let rebreed_count = (self.individuals.len() as f64 * REBREED_FRACTION) as usize;
        let start = self.individuals.len() - rebreed_count;

        for slot in start..self.individuals.len() {
            let a = rng.gen_range(0..elite_count);
            let b = rng.gen_range(0..elite_count);
            let winner = if self.individuals[a].meta_fitness >= self.individuals[b].meta_fitness {
                a
            } else {
                b
            };
            let mut child = MetaIndividual::new(self.individuals[winner].params.clone());
            child.params.mutate(rng);
            child.reset_for_rebreed();
            self.individuals[slot] = child;
        }
        self.generation += 1;
    }

    /// Once `min_generations` meta-generations have run, converged iff the
    /// best individual's fitness-ring slope is flat within `tolerance`.
    pub fn converged(&self, tolerance: f64, min_generations: usize) -> bool {
        if self.generation < min_generations {
            return false;
        }
        match self.best.as_ref() {
            Some(best) => best.improvement_trend().abs() < tolerance,
            None => false,
        }
    }
}

/// Scalar summary of how well a configuration drove the inner GA: best
/// and average fitness, a diversity band bonus, and a speed reward. A zero
/// generation count contributes no speed term rather than failing.
pub fn meta_evaluate(best_fit: f64, avg_fit: f64, diversity: f64, generations: usize) -> f64 {
    let mut diversity_term = 100.0 * diversity;
    if diversity > 0.3 && diversity < 0.5 {
        diversity_term *= 1.2;
    }
    let efficiency = if generations > 0 {
        1000.0 / generations as f64
    } else {
        0.0
    };
    0.5 * best_fit + 0.2 * avg_fit + 0.2 * diversity_term + 0.1 * efficiency
}

fn ols_slope(values: impl Iterator<Item = f64>) -> f64 {
    let values: Vec<f64> = values.collect();
    let n = values.len();
    if n < 2 {
        return 0.0;
    }
    let n_f = n as f64;
    let x_mean = (n_f - 1.0) / 2.0;
    let y_mean = values.iter().sum::<f64>() / n_f;
    let mut numerator = 0.0;
    let mut denominator = 0.0;
    for (x, y) in values.iter().enumerate() {
        let dx = x as f64 - x_mean;
        numerator += dx * (y - y_mean);
        denominator += dx * dx;
    }
    if denominator == 0.0 {
        0.0
    } else {
        numerator / denominator
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slope_of_constant_series_is_zero() {
        assert_eq!(ols_slope([5.0, 5.0, 5.0].into_iter()), 0.0);
    }

    #[test]
    fn slope_of_linear_series_is_unit() {
        let slope = ols_slope([1.0, 2.0, 3.0, 4.0].into_iter());
        assert!((slope - 1.0).abs() < 1e-12);
    }
}
