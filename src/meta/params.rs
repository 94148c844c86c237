//! The flat parameter record governing evolution, with validated ranges
use crate::errors::{EvoError, Result};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Relative width of one continuous mutation step
const MUTATE_SPREAD: f64 = 0.1;
/// Relative width of the initialization perturbation
const PERTURB_SPREAD: f64 = 0.2;
/// Magnitude of one integer mutation step
const INT_DELTA: i64 = 50;

macro_rules! float_fields {
    ($($field:ident => ($min:expr, $max:expr)),* $(,)?) => {
        const FLOAT_RANGES: &[(&str, f64, f64)] = &[
            $((stringify!($field), $min, $max)),*
        ];

        impl MetaParams {
            fn float_fields_mut(&mut self) -> Vec<(&'static str, &mut f64)> {
                vec![$((stringify!($field), &mut self.$field)),*]
            }
            fn float_fields(&self) -> Vec<(&'static str, f64)> {
                vec![$((stringify!($field), self.$field)),*]
            }
        }
    };
}

/// One configuration of the parameters that govern evolution.
///
/// Every field has a validated closed range; mutation and perturbation
/// clamp back into range.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MetaParams {
    /// Base per-byte mutation probability
    pub mutation_rate: f64,
    /// Hard floor under every mutation schedule
    pub min_mutation_rate: f64,
    /// Gentle rate for fine-tuning offspring
    pub optimization_mutation_rate: f64,
    /// Aggressive rate for variance injection
    pub variance_mutation_rate: f64,
    /// Probability of reinitializing an offspring at random
    pub experimentation_rate: f64,
    /// Fraction of best individuals preserved untouched
    pub elite_ratio: f64,
    /// Fraction of worst individuals dropped per generation
    pub cull_ratio: f64,
    /// Probability a selected pair actually crosses over
    pub crossover_rate: f64,
    /// Blend toward uniform sampling in the learning stores
    pub exploration_factor: f64,
    /// Share of offspring bred from the top performance class
    pub breeding_ratio_top: f64,
    /// Share of offspring bred from the middle class
    pub breeding_ratio_mid: f64,
    /// Share of offspring bred from the bottom class
    pub breeding_ratio_bottom: f64,
    /// Per-field mutation probability at the meta level
    pub meta_mutation_rate: f64,
    /// EMA learning rate for online outcome tracking
    pub meta_learning_rate: f64,
    /// Similarity gate for negative-record matching
    pub negative_similarity_threshold: f64,
    /// Exponential penalty decay per generation
    pub negative_decay_rate: f64,
    /// Penalty growth factor per repeated failure
    pub negative_repeat_multiplier: f64,
    /// Tournament size for parent selection
    pub tournament_size: usize,
    /// Steady-state population size
    pub target_population: usize,
    /// Population floor
    pub min_population: usize,
    /// Population ceiling
    pub max_population: usize,
}

float_fields! {
    mutation_rate => (0.001, 0.5),
    min_mutation_rate => (0.0001, 0.1),
    optimization_mutation_rate => (0.001, 0.5),
    variance_mutation_rate => (0.001, 0.5),
    experimentation_rate => (0.0, 0.5),
    elite_ratio => (0.01, 0.5),
    cull_ratio => (0.05, 0.9),
    crossover_rate => (0.1, 1.0),
    exploration_factor => (0.0, 1.0),
    breeding_ratio_top => (0.0, 1.0),
    breeding_ratio_mid => (0.0, 1.0),
    breeding_ratio_bottom => (0.0, 1.0),
    meta_mutation_rate => (0.01, 0.5),
    meta_learning_rate => (0.001, 1.0),
    negative_similarity_threshold => (0.5, 1.0),
    negative_decay_rate => (0.0, 0.5),
    negative_repeat_multiplier => (0.1, 5.0),
}

const INT_RANGES: &[(&str, usize, usize)] = &[
    ("tournament_size", 2, 16),
    ("target_population", 10, 10_000),
    ("min_population", 4, 1_000),
    ("max_population", 10, 100_000),
];

impl Default for MetaParams {
    fn default() -> Self {
        Self {
            mutation_rate: 0.1,
            min_mutation_rate: 0.001,
            optimization_mutation_rate: 0.05,
            variance_mutation_rate: 0.2,
            experimentation_rate: 0.05,
            elite_ratio: 0.1,
            cull_ratio: 0.25,
            crossover_rate: 0.9,
            exploration_factor: 0.5,
            breeding_ratio_top: 0.5,
            breeding_ratio_mid: 0.3,
            breeding_ratio_bottom: 0.2,
            meta_mutation_rate: 0.1,
            meta_learning_rate: 0.1,
            negative_similarity_threshold: 0.8,
            negative_decay_rate: 0.01,
            negative_repeat_multiplier: 1.0,
            tournament_size: 3,
            target_population: 100,
            min_population: 20,
            max_population: 500,
        }
    }
}

impl MetaParams {
    fn int_fields_mut(&mut self) -> Vec<(&'static str, &mut usize)> {
        vec![
            ("tournament_size", &mut self.tournament_size),
            ("target_population", &mut self.target_population),
            ("min_population", &mut self.min_population),
            ("max_population", &mut self.max_population),
        ]
    }

    fn int_fields(&self) -> Vec<(&'static str, usize)> {
        vec![
            ("tournament_size", self.tournament_size),
            ("target_population", self.target_population),
            ("min_population", self.min_population),
            ("max_population", self.max_population),
        ]
    }

    /// Reject any field outside its declared range
    pub fn validate(&self) -> Result<()> {
        for (name, value) in self.float_fields() {
            let (_, min, max) = FLOAT_RANGES
                .iter()
                .find(|(n, _, _)| *n == name)
                .expect("every float field has a declared range");
            if !value.is_finite() || value < *min || value > *max {
                return Err(EvoError::InvalidArgument(format!(
                    "{} = {} outside [{}, {}]",
                    name, value, min, max
                )));
            }
        }
        for (name, value) in self.int_fields() {
            let (_, min, max) = INT_RANGES
                .iter()
                .find(|(n, _, _)| *n == name)
                .expect("every int field has a declared range");
            if value < *min || value > *max {
                return Err(EvoError::InvalidArgument(format!(
                    "{} = {} outside [{}, {}]",
                    name, value, min, max
                )));
            }
        }
        if self.min_population > self.max_population {
            return Err(EvoError::InvalidArgument(
                "min_population exceeds max_population".to_string(),
            ));
        }
        Ok(())
    }

    /// Mutate each continuous field with probability `meta_mutation_rate`
    /// by a relative step, integer fields by a bounded delta, clamping
    /// everything back into range.
    pub fn mutate<R: Rng>(&mut self, rng: &mut R) {
        let rate = self.meta_mutation_rate;
        for (name, value) in self.float_fields_mut() {
            if rng.gen::<f64>() < rate {
                let factor = 1.0 + rng.gen_range(-MUTATE_SPREAD..MUTATE_SPREAD);
                *value = clamp_float(name, *value * factor);
            }
        }
        for (name, value) in self.int_fields_mut() {
            if rng.gen::<f64>() < rate {
                let delta = rng.gen_range(-INT_DELTA..=INT_DELTA);
                *value = clamp_int(name, *value as i64 + delta);
            }
        }
        self.reconcile_population_bounds();
    }

    /// A wider random nudge of every field, used to spread the initial
    /// meta population around the defaults.
    pub fn perturb<R: Rng>(&mut self, rng: &mut R) {
        for (name, value) in self.float_fields_mut() {
            let factor = 1.0 + rng.gen_range(-PERTURB_SPREAD..PERTURB_SPREAD);
            *value = clamp_float(name, *value * factor);
        }
        for (name, value) in self.int_fields_mut() {
            let delta = rng.gen_range(-INT_DELTA..=INT_DELTA);
            *value = clamp_int(name, *value as i64 + delta);
        }
        self.reconcile_population_bounds();
    }

    fn reconcile_population_bounds(&mut self) {
        if self.min_population > self.max_population {
            std::mem::swap(&mut self.min_population, &mut self.max_population);
        }
        self.target_population = self
            .target_population
            .clamp(self.min_population, self.max_population);
    }
}

fn clamp_float(name: &str, value: f64) -> f64 {
    let (_, min, max) = FLOAT_RANGES
        .iter()
        .find(|(n, _, _)| *n == name)
        .expect("every float field has a declared range");
    value.clamp(*min, *max)
}

fn clamp_int(name: &str, value: i64) -> usize {
    let (_, min, max) = INT_RANGES
        .iter()
        .find(|(n, _, _)| *n == name)
        .expect("every int field has a declared range");
    (value.max(0) as usize).clamp(*min, *max)
}
