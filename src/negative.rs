//! The negative registry remembers failures and penalizes candidates that resemble them
use crate::errors::{EvoError, Result};
use crate::genome::Genome;
use std::sync::Arc;

/// Records with a penalty below this are deactivated by decay
const DEACTIVATION_FLOOR: f64 = 0.05;
/// Prune arguments used when recording into a full registry
const EMERGENCY_PRUNE_MIN_PENALTY: f64 = 0.01;
const EMERGENCY_PRUNE_MAX_AGE: usize = 100;

/// Ordinal failure classification by how bad the fitness was
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Mild,
    Moderate,
    Severe,
    Fatal,
}

impl Severity {
    /// Initial penalty assigned to a fresh record of this severity
    pub fn initial_penalty(&self) -> f64 {
        match self {
            Severity::Mild => 0.2,
            Severity::Moderate => 0.4,
            Severity::Severe => 0.7,
            Severity::Fatal => 0.95,
        }
    }
}

/// Four descending fitness thresholds classifying failures
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SeverityThresholds {
    pub mild: f64,
    pub moderate: f64,
    pub severe: f64,
    pub fatal: f64,
}

impl Default for SeverityThresholds {
    fn default() -> Self {
        Self {
            mild: -0.10,
            moderate: -0.25,
            severe: -0.50,
            fatal: -0.90,
        }
    }
}

impl SeverityThresholds {
    /// `None` means the fitness does not qualify as a failure
    pub fn classify(&self, fitness: f64) -> Option<Severity> {
        if fitness <= self.fatal {
            Some(Severity::Fatal)
        } else if fitness <= self.severe {
            Some(Severity::Severe)
        } else if fitness <= self.moderate {
            Some(Severity::Moderate)
        } else if fitness <= self.mild {
            Some(Severity::Mild)
        } else {
            None
        }
    }
}

/// One remembered failure, owning a clone of the failing genome
#[derive(Clone, Debug)]
pub struct FailureRecord {
    pub genome: Genome,
    pub fitness: f64,
    pub severity: Severity,
    pub generation: usize,
    pub penalty_score: f64,
    pub repeat_count: u32,
    pub first_seen: usize,
    pub last_seen: usize,
    pub active: bool,
}

/// What [record_failure](NegativeRegistry::record_failure) did
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RecordOutcome {
    /// Fitness did not qualify as a failure
    Ignored,
    /// A fresh record was allocated
    New,
    /// An existing similar record absorbed the repeat
    Repeated,
}

/// Aggregate registry statistics
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RegistryStats {
    pub total: usize,
    pub active_count: usize,
    pub repeat_victims: usize,
    pub mild_count: usize,
    pub moderate_count: usize,
    pub severe_count: usize,
    pub fatal_count: usize,
    pub avg_penalty: f64,
    pub worst_fitness: f64,
}

/// Pluggable genome similarity in [0, 1]; 1 means identical
pub type SimilarityFn = Arc<dyn Fn(&Genome, &Genome) -> f64 + Send + Sync>;

/// Bounded list of failure records with similarity matching and decay.
///
/// Similarity defaults to the byte-level fraction of matching bytes; a
/// registered domain's diversity callback can replace it.
#[derive(Clone)]
pub struct NegativeRegistry {
    records: Vec<FailureRecord>,
    capacity: usize,
    thresholds: SeverityThresholds,
    similarity_threshold: f64,
    repeat_multiplier: f64,
    decay_rate: f64,
    current_generation: usize,
    similarity: Option<SimilarityFn>,
}

impl std::fmt::Debug for NegativeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NegativeRegistry")
            .field("records", &self.records.len())
            .field("capacity", &self.capacity)
            .field("thresholds", &self.thresholds)
            .field("similarity_threshold", &self.similarity_threshold)
            .field("decay_rate", &self.decay_rate)
            .finish()
    }
}

impl Default for NegativeRegistry {
    fn default() -> Self {
        Self::new(1000)
    }
}

impl NegativeRegistry {
    pub fn new(capacity: usize) -> Self {
        Self {
            records: Vec::new(),
            capacity,
            thresholds: SeverityThresholds::default(),
            similarity_threshold: 0.8,
            repeat_multiplier: 1.0,
            decay_rate: 0.01,
            current_generation: 0,
            similarity: None,
        }
    }

    pub fn with_thresholds(mut self, thresholds: SeverityThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }
    pub fn with_similarity_threshold(mut self, threshold: f64) -> Self {
        self.similarity_threshold = threshold.clamp(0.0, 1.0);
        self
    }
    pub fn with_repeat_multiplier(mut self, multiplier: f64) -> Self {
        self.repeat_multiplier = multiplier;
        self
    }
    pub fn with_decay_rate(mut self, rate: f64) -> Self {
        self.decay_rate = rate.max(0.0);
        self
    }

    /// Replace byte similarity with a domain metric
    pub fn set_similarity_fn(&mut self, similarity: SimilarityFn) {
        self.similarity = Some(similarity);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
    pub fn capacity(&self) -> usize {
        self.capacity
    }
    pub fn records(&self) -> &[FailureRecord] {
        &self.records
    }
    pub fn decay_rate(&self) -> f64 {
        self.decay_rate
    }
    pub fn similarity_threshold(&self) -> f64 {
        self.similarity_threshold
    }

    fn similarity_of(&self, a: &Genome, b: &Genome) -> f64 {
        match &self.similarity {
            Some(similarity) => similarity(a, b).clamp(0.0, 1.0),
            None => a.similarity(b),
        }
    }

    /// Classify and remember a failure. Repeats of a sufficiently similar
    /// active record raise its penalty instead of allocating; a full
    /// registry is emergency-pruned first and reports [EvoError::Full]
    /// only if that freed nothing.
    pub fn record_failure(
        &mut self,
        genome: &Genome,
        fitness: f64,
        generation: usize,
    ) -> Result<RecordOutcome> {
        self.current_generation = self.current_generation.max(generation);
        let severity = match self.thresholds.classify(fitness) {
            Some(severity) => severity,
            None => return Ok(RecordOutcome::Ignored),
        };

        let mut best: Option<(usize, f64)> = None;
        for (index, record) in self.records.iter().enumerate() {
            if !record.active {
                continue;
            }
            let similarity = self.similarity_of(genome, &record.genome);
            if best.map_or(true, |(_, s)| similarity > s) {
                best = Some((index, similarity));
            }
        }

        if let Some((index, similarity)) = best {
            if similarity >= self.similarity_threshold {
                let record = &mut self.records[index];
                record.repeat_count += 1;
                record.penalty_score = (record.penalty_score
                    + self.repeat_multiplier * record.repeat_count as f64 / 10.0)
                    .min(1.0);
                record.last_seen = generation;
                if fitness < record.fitness {
                    record.fitness = fitness;
                    record.severity = record.severity.max(severity);
                }
                log::debug!(
                    "negative: repeat failure (similarity {:.2}), penalty now {:.2}",
                    similarity,
                    record.penalty_score
                );
                return Ok(RecordOutcome::Repeated);
            }
        }

        if self.records.len() >= self.capacity {
            self.prune(EMERGENCY_PRUNE_MIN_PENALTY, EMERGENCY_PRUNE_MAX_AGE);
            if self.records.len() >= self.capacity {
                return Err(EvoError::Full("negative registry at capacity"));
            }
        }

        self.records.push(FailureRecord {
            genome: genome.clone(),
            fitness,
            severity,
            generation,
            penalty_score: severity.initial_penalty(),
            repeat_count: 0,
            first_seen: generation,
            last_seen: generation,
            active: true,
        });
        log::debug!(
            "negative: recorded {:?} failure at fitness {:.3}",
            severity,
            fitness
        );
        Ok(RecordOutcome::New)
    }

    /// Max over active records of `similarity × penalty` for records at or
    /// above the similarity threshold; zero otherwise.
    pub fn check_penalty(&self, genome: &Genome) -> f64 {
        self.records
            .iter()
            .filter(|record| record.active)
            .filter_map(|record| {
                let similarity = self.similarity_of(genome, &record.genome);
                (similarity >= self.similarity_threshold)
                    .then(|| similarity * record.penalty_score)
            })
            .fold(0.0, f64::max)
    }

    pub fn is_forbidden(&self, genome: &Genome, threshold: f64) -> bool {
        self.check_penalty(genome) >= threshold
    }

    /// Multiplicative penalty adjustment of a raw fitness
    pub fn adjust_fitness(&self, genome: &Genome, raw: f64) -> f64 {
        raw * (1.0 - self.check_penalty(genome))
    }

    /// Exponential penalty decay over elapsed generations; records falling
    /// below the deactivation floor go inactive.
    pub fn decay(&mut self, generations_passed: usize) {
        let factor = (-self.decay_rate * generations_passed as f64).exp();
        for record in self.records.iter_mut() {
            record.penalty_score *= factor;
            if record.penalty_score < DEACTIVATION_FLOOR {
                record.active = false;
            }
        }
    }

    /// Compact in place, dropping records below the penalty floor or older
    /// than `max_age` generations. Returns the number removed.
    pub fn prune(&mut self, min_penalty: f64, max_age: usize) -> usize {
        let before = self.records.len();
        let current = self.current_generation;
        self.records.retain(|record| {
            record.penalty_score >= min_penalty
                && current.saturating_sub(record.generation) <= max_age
        });
        before - self.records.len()
    }

    pub fn stats(&self) -> RegistryStats {
        let mut stats = RegistryStats {
            total: self.records.len(),
            worst_fitness: f64::INFINITY,
            ..RegistryStats::default()
        };
        let mut penalty_sum = 0.0;
        for record in &self.records {
            if record.active {
                stats.active_count += 1;
            }
            if record.repeat_count > 0 {
                stats.repeat_victims += 1;
            }
            match record.severity {
                Severity::Mild => stats.mild_count += 1,
                Severity::Moderate => stats.moderate_count += 1,
                Severity::Severe => stats.severe_count += 1,
                Severity::Fatal => stats.fatal_count += 1,
            }
            penalty_sum += record.penalty_score;
            stats.worst_fitness = stats.worst_fitness.min(record.fitness);
        }
        if stats.total > 0 {
            stats.avg_penalty = penalty_sum / stats.total as f64;
        } else {
            stats.worst_fitness = 0.0;
        }
        stats
    }
}
