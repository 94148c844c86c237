//! The population is a container for scored [Individuals](Individual)
use crate::errors::{EvoError, Result};
use crate::fitness::Fitness;
use crate::genome::Genome;
use cardinality_estimator::CardinalityEstimator;
use rand::prelude::*;

/// One candidate solution with its score. `fitness == None` is the
/// unevaluated sentinel and is excluded from every statistic.
#[derive(Clone, Debug)]
pub struct Individual {
    pub genome: Genome,
    pub fitness: Option<f64>,
    pub age: usize,
}

impl Individual {
    pub fn new(genome: Genome) -> Self {
        Self {
            genome,
            fitness: None,
            age: 0,
        }
    }

    pub fn with_fitness(genome: Genome, fitness: f64) -> Self {
        Self {
            genome,
            fitness: Some(fitness),
            age: 0,
        }
    }

    pub fn is_offspring(&self) -> bool {
        self.age == 0
    }
    pub fn reset_age(&mut self) {
        self.age = 0;
    }
    pub fn increment_age(&mut self) {
        self.age += 1;
    }
}

/// Ordered sequence of individuals with a fixed capacity and cached
/// aggregate fitness statistics.
///
/// After [sort](Population::sort), fitness is non-increasing with
/// unevaluated individuals last and `best_index == 0`.
#[derive(Clone, Debug)]
pub struct Population {
    pub individuals: Vec<Individual>,
    capacity: usize,
    pub generation: usize,
    pub best_index: Option<usize>,
    pub best_fitness: f64,
    pub avg_fitness: f64,
    pub worst_fitness: f64,
}

impl Population {
    pub fn new(capacity: usize) -> Self {
        Self {
            individuals: Vec::with_capacity(capacity),
            capacity,
            generation: 0,
            best_index: None,
            best_fitness: f64::NEG_INFINITY,
            avg_fitness: 0.0,
            worst_fitness: f64::INFINITY,
        }
    }

    pub fn size(&self) -> usize {
        self.individuals.len()
    }
    pub fn is_empty(&self) -> bool {
        self.individuals.is_empty()
    }
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Add a clone of the genome. Fails with [EvoError::Full] at capacity.
    pub fn add(&mut self, genome: &Genome, fitness: Option<f64>) -> Result<()> {
        if self.individuals.len() >= self.capacity {
            return Err(EvoError::Full("population at capacity"));
        }
        self.individuals.push(Individual {
            genome: genome.clone(),
            fitness,
            age: 0,
        });
        Ok(())
    }

    /// Take ownership of an individual. Fails with [EvoError::Full] at capacity.
    pub fn push(&mut self, individual: Individual) -> Result<()> {
        if self.individuals.len() >= self.capacity {
            return Err(EvoError::Full("population at capacity"));
        }
        self.individuals.push(individual);
        Ok(())
    }

    /// Remove by index with an O(n) shift, preserving order for callers
    /// that rely on stable positions until the next sort.
    pub fn remove(&mut self, index: usize) -> Result<Individual> {
        if index >= self.individuals.len() {
            return Err(EvoError::InvalidArgument(format!(
                "index {} out of bounds for population of {}",
                index,
                self.individuals.len()
            )));
        }
        Ok(self.individuals.remove(index))
    }

    /// Raise the capacity ceiling (never shrinks below the current size)
    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity.max(self.individuals.len());
    }

    /// Score every unevaluated individual in place, returning how many
    /// evaluations ran.
    pub fn evaluate<F: Fitness>(&mut self, fitness: &mut F) -> usize {
        let mut evaluated = 0;
        for individual in self
            .individuals
            .iter_mut()
            .filter(|i| i.fitness.is_none())
        {
            individual.fitness = fitness.calculate_for_genome(&individual.genome);
            evaluated += 1;
        }
        evaluated
    }

    /// Refresh the cached best/avg/worst. Sentinels are excluded; with no
    /// scored individual at all, `best_fitness` is negative infinity.
    pub fn update_stats(&mut self) {
        self.best_index = None;
        self.best_fitness = f64::NEG_INFINITY;
        self.worst_fitness = f64::INFINITY;
        let mut sum = 0.0;
        let mut scored = 0usize;
        for (index, individual) in self.individuals.iter().enumerate() {
            if let Some(fitness) = individual.fitness {
                sum += fitness;
                scored += 1;
                if fitness > self.best_fitness {
                    self.best_fitness = fitness;
                    self.best_index = Some(index);
                }
                if fitness < self.worst_fitness {
                    self.worst_fitness = fitness;
                }
            }
        }
        self.avg_fitness = if scored > 0 { sum / scored as f64 } else { 0.0 };
        if scored == 0 {
            self.worst_fitness = f64::NEG_INFINITY;
        }
    }

    /// Sort descending by fitness, unevaluated individuals last
    pub fn sort(&mut self) {
        self.individuals.sort_by(|a, b| match (a.fitness, b.fitness) {
            (Some(fa), Some(fb)) => fb.partial_cmp(&fa).unwrap_or(std::cmp::Ordering::Equal),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => std::cmp::Ordering::Equal,
        });
        if !self.individuals.is_empty() && self.individuals[0].fitness.is_some() {
            self.best_index = Some(0);
        } else {
            self.best_index = None;
        }
    }

    /// Draw `k` uniform indices (duplicates allowed, `k` clamped to size)
    /// and return the one with the largest valid fitness.
    pub fn tournament_select<R: Rng>(&self, k: usize, rng: &mut R) -> Option<usize> {
        if self.individuals.is_empty() {
            return None;
        }
        let k = k.clamp(1, self.individuals.len());
        let mut winning_index = 0;
        let mut winning_fitness = f64::NEG_INFINITY;
        let mut winner_found = false;
        for _ in 0..k {
            let sample_index = rng.gen_range(0..self.individuals.len());
            let sample_fitness = self.individuals[sample_index]
                .fitness
                .unwrap_or(f64::NEG_INFINITY);
            if !winner_found || sample_fitness >= winning_fitness {
                winning_index = sample_index;
                winning_fitness = sample_fitness;
                winner_found = true;
            }
        }
        Some(winning_index)
    }

    /// Drop the worst `ratio` of the population (rounded down, always
    /// keeping at least one individual). Sorts as a side effect.
    pub fn cull_worst(&mut self, ratio: f64) {
        if self.individuals.is_empty() {
            return;
        }
        let ratio = ratio.clamp(0.0, 1.0);
        self.sort();
        let drop = (self.individuals.len() as f64 * ratio) as usize;
        let keep = (self.individuals.len() - drop).max(1);
        self.individuals.truncate(keep);
    }

    pub fn truncate(&mut self, keep_size: usize) {
        self.individuals.truncate(keep_size);
    }

    pub fn shuffle<R: Rng>(&mut self, rng: &mut R) {
        self.individuals.shuffle(rng);
    }

    pub fn increment_age(&mut self) {
        self.individuals.iter_mut().for_each(|i| i.increment_age());
    }

    pub fn fitness_score_count(&self) -> usize {
        self.individuals
            .iter()
            .filter(|i| i.fitness.is_some())
            .count()
    }
    pub fn fitness_score_mean(&self) -> f64 {
        stats::mean(self.individuals.iter().filter_map(|i| i.fitness))
    }
    pub fn fitness_score_median(&self) -> Option<f64> {
        stats::median(self.individuals.iter().filter_map(|i| i.fitness))
    }
    pub fn fitness_score_stddev(&self) -> f64 {
        stats::stddev(self.individuals.iter().filter_map(|i| i.fitness))
    }

    /// Estimated number of distinct fitness scores present
    pub fn fitness_score_cardinality(&self) -> Option<usize> {
        let mut values = self
            .individuals
            .iter()
            .filter_map(|i| i.fitness)
            .peekable();
        if values.peek().is_some() {
            let mut estimator = CardinalityEstimator::<u64>::new();
            values.for_each(|fitness| estimator.insert(&fitness.to_bits()));
            Some(estimator.estimate())
        } else {
            None
        }
    }

    /// Estimated number of distinct genomes present
    pub fn genome_cardinality(&self) -> Option<usize> {
        if self.individuals.is_empty() {
            return None;
        }
        let mut estimator = CardinalityEstimator::<u64>::new();
        self.individuals
            .iter()
            .for_each(|i| estimator.insert_hash(i.genome.hash_value()));
        Some(estimator.estimate())
    }

    /// Diversity in [0, 1]: estimated distinct genomes over population size
    pub fn diversity(&self) -> f64 {
        match self.genome_cardinality() {
            Some(cardinality) if !self.individuals.is_empty() => {
                (cardinality as f64 / self.individuals.len() as f64).min(1.0)
            }
            _ => 0.0,
        }
    }

    pub fn best_individual(&self) -> Option<&Individual> {
        self.best_index.and_then(|index| self.individuals.get(index))
    }
}
