//! Online outcome learning: coarse EMA maps from parameter value to fitness
use serde::{Deserialize, Serialize};

/// Buckets per tracked parameter axis
const BUCKETS: usize = 20;
/// Mutation-rate axis, inclusive bounds
const MUTATION_MIN: f64 = 0.01;
const MUTATION_MAX: f64 = 0.39;
/// Exploration axis, inclusive bounds
const EXPLORATION_MIN: f64 = 0.0;
const EXPLORATION_MAX: f64 = 1.0;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
struct Bucket {
    ema_fitness: f64,
    samples: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
struct Axis {
    min: f64,
    max: f64,
    buckets: Vec<Bucket>,
}

impl Axis {
    fn new(min: f64, max: f64) -> Self {
        Self {
            min,
            max,
            buckets: vec![Bucket::default(); BUCKETS],
        }
    }

    fn index_of(&self, value: f64) -> usize {
        let clamped = value.clamp(self.min, self.max);
        let t = (clamped - self.min) / (self.max - self.min);
        ((t * BUCKETS as f64) as usize).min(BUCKETS - 1)
    }

    fn value_of(&self, index: usize) -> f64 {
        let t = (index as f64 + 0.5) / BUCKETS as f64;
        self.min + t * (self.max - self.min)
    }

    fn learn(&mut self, value: f64, fitness: f64, learning_rate: f64) {
        let index = self.index_of(value);
        let bucket = &mut self.buckets[index];
        if bucket.samples == 0 {
            bucket.ema_fitness = fitness;
        } else {
            bucket.ema_fitness =
                (1.0 - learning_rate) * bucket.ema_fitness + learning_rate * fitness;
        }
        bucket.samples += 1;
    }

    /// Center of the best-scoring bucket that reached the sample floor
    fn best(&self, min_samples: usize) -> Option<f64> {
        self.buckets
            .iter()
            .enumerate()
            .filter(|(_, b)| b.samples >= min_samples)
            .max_by(|(_, a), (_, b)| {
                a.ema_fitness
                    .partial_cmp(&b.ema_fitness)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .map(|(index, _)| self.value_of(index))
    }
}

/// Parameter values that have proven themselves, if any
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LearnedParams {
    pub mutation_rate: Option<f64>,
    pub exploration_factor: Option<f64>,
}

/// EMA maps from mutation rate and exploration factor to observed fitness.
///
/// An owned object: thread it through the driver, or wrap it in a
/// read/write lock to share across owners.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OnlineLearner {
    mutation: Axis,
    exploration: Axis,
}

impl Default for OnlineLearner {
    fn default() -> Self {
        Self::new()
    }
}

impl OnlineLearner {
    pub fn new() -> Self {
        Self {
            mutation: Axis::new(MUTATION_MIN, MUTATION_MAX),
            exploration: Axis::new(EXPLORATION_MIN, EXPLORATION_MAX),
        }
    }

    /// Credit an observed fitness to the closest bucket on each axis
    pub fn learn_outcome(
        &mut self,
        mutation_rate: f64,
        exploration_factor: f64,
        fitness: f64,
        learning_rate: f64,
    ) {
        if !fitness.is_finite() {
            return;
        }
        let learning_rate = learning_rate.clamp(0.0, 1.0);
        self.mutation.learn(mutation_rate, fitness, learning_rate);
        self.exploration
            .learn(exploration_factor, fitness, learning_rate);
    }

    /// Per axis, the argmax bucket center among buckets with at least
    /// `min_samples` observations.
    pub fn get_learned_params(&self, min_samples: usize) -> LearnedParams {
        LearnedParams {
            mutation_rate: self.mutation.best(min_samples),
            exploration_factor: self.exploration.best(min_samples),
        }
    }
}
