//! The context store maps categorical situations to learned parameter distributions
//!
//! A context is one cell of the Cartesian product of user-declared
//! dimensions, keyed by the colon-joined dimension values in declaration
//! order. Each cell accumulates quality-weighted statistics per tracked
//! parameter and can be sampled to propose parameter vectors.
pub mod persist;

use crate::errors::{EvoError, Result};
use crate::stats::WeightedArray;
use chrono::{DateTime, Utc};
use itertools::Itertools;
use rand::Rng;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// Experiences needed for full confidence in a context cell
const CONFIDENCE_SAMPLES: usize = 100;

/// One categorical axis of the context space. The name is immutable after
/// system creation; values may be appended.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextDimension {
    pub name: String,
    pub values: Vec<String>,
}

impl ContextDimension {
    pub fn new(name: impl Into<String>, values: Vec<String>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }

    pub fn add_value(&mut self, value: impl Into<String>) {
        let value = value.into();
        if !self.values.contains(&value) {
            self.values.push(value);
        }
    }

    pub fn contains(&self, value: &str) -> bool {
        self.values.iter().any(|v| v == value)
    }
}

/// Learned statistics for one context cell
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ContextStats {
    pub key: String,
    pub params: WeightedArray,
    pub confidence: f64,
    pub first_update: DateTime<Utc>,
    pub last_update: DateTime<Utc>,
    pub total_experiences: u64,
    pub avg_fitness: f64,
    pub best_fitness: f64,
}

impl ContextStats {
    fn new(key: String, param_count: usize, now: DateTime<Utc>) -> Self {
        Self {
            key,
            params: WeightedArray::new(param_count),
            confidence: 0.0,
            first_update: now,
            last_update: now,
            total_experiences: 0,
            avg_fitness: 0.0,
            best_fitness: f64::NEG_INFINITY,
        }
    }
}

/// Keyed mapping from context cells to weighted parameter distributions
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ContextSystem {
    dimensions: Vec<ContextDimension>,
    param_count: usize,
    entries: FxHashMap<String, ContextStats>,
}

impl ContextSystem {
    pub fn new(dimensions: Vec<ContextDimension>, param_count: usize) -> Result<Self> {
        if dimensions.is_empty() {
            return Err(EvoError::NullArgument("context dimensions"));
        }
        if param_count == 0 {
            return Err(EvoError::InvalidArgument(
                "param_count must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            dimensions,
            param_count,
            entries: FxHashMap::default(),
        })
    }

    pub fn dimensions(&self) -> &[ContextDimension] {
        &self.dimensions
    }
    pub fn param_count(&self) -> usize {
        self.param_count
    }
    pub fn len(&self) -> usize {
        self.entries.len()
    }
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
    pub fn get(&self, key: &str) -> Option<&ContextStats> {
        self.entries.get(key)
    }
    pub fn iter(&self) -> impl Iterator<Item = &ContextStats> {
        self.entries.values()
    }

    /// Append a value to a declared dimension
    pub fn add_dimension_value(&mut self, name: &str, value: &str) -> Result<()> {
        let dimension = self
            .dimensions
            .iter_mut()
            .find(|d| d.name == name)
            .ok_or_else(|| EvoError::NotFound(format!("dimension {}", name)))?;
        dimension.add_value(value);
        Ok(())
    }

    /// Colon-join values in dimension-declaration order; missing trailing
    /// values substitute empty strings.
    pub fn build_key(&self, values: &[&str]) -> String {
        (0..self.dimensions.len())
            .map(|index| values.get(index).copied().unwrap_or(""))
            .join(":")
    }

    /// Split a key back into its dimension values
    pub fn parse_key(key: &str) -> Vec<String> {
        key.split(':').map(str::to_string).collect()
    }

    /// Reject values not present in their dimension's enumerated list.
    /// Empty strings pass (they stand for a missing value).
    pub fn validate_values(&self, values: &[&str]) -> Result<()> {
        if values.len() > self.dimensions.len() {
            return Err(EvoError::InvalidArgument(format!(
                "{} values for {} dimensions",
                values.len(),
                self.dimensions.len()
            )));
        }
        for (dimension, value) in self.dimensions.iter().zip(values.iter()) {
            if !value.is_empty() && !dimension.contains(value) {
                return Err(EvoError::InvalidArgument(format!(
                    "value {:?} not declared for dimension {:?}",
                    value, dimension.name
                )));
            }
        }
        Ok(())
    }

    /// Fold one experience into the cell for `values`, weighting every
    /// parameter by the fitness.
    pub fn learn(
        &mut self,
        values: &[&str],
        params: &[f64],
        fitness: f64,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.validate_values(values)?;
        let key = self.build_key(values);
        self.learn_key(key, params, fitness, now)
    }

    /// As [learn](ContextSystem::learn), keyed directly
    pub fn learn_key(
        &mut self,
        key: String,
        params: &[f64],
        fitness: f64,
        now: DateTime<Utc>,
    ) -> Result<()> {
        if params.len() != self.param_count {
            return Err(EvoError::InvalidArgument(format!(
                "{} params, system tracks {}",
                params.len(),
                self.param_count
            )));
        }
        let param_count = self.param_count;
        let entry = self
            .entries
            .entry(key.clone())
            .or_insert_with(|| ContextStats::new(key, param_count, now));

        entry.params.update(params, fitness);
        entry.last_update = now;
        entry.total_experiences += 1;
        entry.avg_fitness +=
            (fitness - entry.avg_fitness) / entry.total_experiences as f64;
        entry.best_fitness = entry.best_fitness.max(fitness);
        entry.confidence = entry
            .params
            .get(0)
            .map_or(0.0, |slot| slot.confidence(CONFIDENCE_SAMPLES));
        Ok(())
    }

    /// Propose a parameter vector from the cell's learned distribution,
    /// blending toward uniform random by the exploration factor. Unknown
    /// contexts return uniform random values.
    pub fn sample<R: Rng>(&self, values: &[&str], exploration: f64, rng: &mut R) -> Vec<f64> {
        let key = self.build_key(values);
        match self.entries.get(&key) {
            Some(entry) => entry.params.sample(exploration, rng),
            None => (0..self.param_count).map(|_| rng.gen::<f64>()).collect(),
        }
    }

    /// Scan all cells, filter by substring match and experience threshold,
    /// descending by best fitness.
    pub fn query_best(
        &self,
        partial_match: Option<&str>,
        min_samples: u64,
        max_results: usize,
    ) -> Vec<&ContextStats> {
        self.entries
            .values()
            .filter(|entry| entry.total_experiences >= min_samples)
            .filter(|entry| partial_match.map_or(true, |needle| entry.key.contains(needle)))
            .sorted_by(|a, b| {
                b.best_fitness
                    .partial_cmp(&a.best_fitness)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .take(max_results)
            .collect()
    }

    /// Drop stale low-signal cells: entries below the experience floor
    /// whose last update is older than `max_age_secs`. Returns the number
    /// removed.
    pub fn prune(&mut self, min_experiences: u64, max_age_secs: i64, now: DateTime<Utc>) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| {
            entry.total_experiences >= min_experiences
                || (now - entry.last_update).num_seconds() <= max_age_secs
        });
        before - self.entries.len()
    }

    /// Merge another store's experiences into this one. Dimension layout
    /// and parameter count must match.
    pub fn merge(&mut self, other: &ContextSystem) -> Result<()> {
        if self.param_count != other.param_count {
            return Err(EvoError::InvalidArgument(
                "param_count mismatch in context merge".to_string(),
            ));
        }
        let names = |dims: &[ContextDimension]| {
            dims.iter().map(|d| d.name.clone()).collect::<Vec<_>>()
        };
        if names(&self.dimensions) != names(&other.dimensions) {
            return Err(EvoError::InvalidArgument(
                "dimension mismatch in context merge".to_string(),
            ));
        }
        for (key, theirs) in other.entries.iter() {
            match self.entries.get_mut(key) {
                Some(ours) => {
                    ours.params.merge(&theirs.params);
                    let total = ours.total_experiences + theirs.total_experiences;
                    if total > 0 {
                        ours.avg_fitness = (ours.avg_fitness
                            * ours.total_experiences as f64
                            + theirs.avg_fitness * theirs.total_experiences as f64)
                            / total as f64;
                    }
                    ours.total_experiences = total;
                    ours.best_fitness = ours.best_fitness.max(theirs.best_fitness);
                    ours.first_update = ours.first_update.min(theirs.first_update);
                    ours.last_update = ours.last_update.max(theirs.last_update);
                    ours.confidence = ours
                        .params
                        .get(0)
                        .map_or(0.0, |slot| slot.confidence(CONFIDENCE_SAMPLES));
                }
                None => {
                    self.entries.insert(key.clone(), theirs.clone());
                }
            }
        }
        Ok(())
    }
}
