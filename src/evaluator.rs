//! Batch fitness dispatch, parallel or serial, with an optional accelerator backend
use crate::errors::{EvoError, Result};
use crate::fitness::Fitness;
use crate::genome::Genome;
use crate::population::Population;
use rayon::prelude::*;
use std::cell::RefCell;
use std::time::{Duration, Instant};
use thread_local::ThreadLocal;

/// Batches larger than this fan out to worker threads
const PARALLEL_THRESHOLD: usize = 10;
/// Worker thread ceiling regardless of core count
const MAX_WORKERS: usize = 16;

/// An opaque batch backend (typically a GPU). Implementations write one
/// fitness per input position; any failure falls back to the CPU path.
pub trait Accelerator: Send + Sync {
    fn name(&self) -> &str;
    fn evaluate(&self, genomes: &[&Genome], out: &mut [f64]) -> Result<()>;
}

/// What actually ran for a batch
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BatchReport {
    pub evaluated: usize,
    pub used_accelerator: bool,
    pub accelerator_time: Duration,
    pub serial_time: Duration,
}

/// Dispatches a fitness function over a batch of genomes.
///
/// Prefers the accelerator when present and enabled; otherwise the CPU
/// path uses up to `min(cores, 16)` worker threads for batches above 10
/// items and runs serially below that. Output positions always match
/// input positions. Unevaluable genomes score NaN in the raw output.
pub struct BatchEvaluator<F: Fitness> {
    fitness: F,
    accelerator: Option<Box<dyn Accelerator>>,
    enabled: bool,
    pool: Option<rayon::ThreadPool>,
    thread_local: ThreadLocal<RefCell<F>>,
}

impl<F: Fitness> std::fmt::Debug for BatchEvaluator<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchEvaluator")
            .field("fitness", &self.fitness)
            .field(
                "accelerator",
                &self.accelerator.as_ref().map(|a| a.name().to_string()),
            )
            .field("enabled", &self.enabled)
            .finish()
    }
}

impl<F: Fitness> BatchEvaluator<F> {
    pub fn new(fitness: F) -> Self {
        let workers = std::thread::available_parallelism()
            .map(|cores| cores.get().min(MAX_WORKERS))
            .unwrap_or(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .build()
            .ok();
        Self {
            fitness,
            accelerator: None,
            enabled: true,
            pool,
            thread_local: ThreadLocal::new(),
        }
    }

    pub fn with_accelerator(mut self, accelerator: Box<dyn Accelerator>) -> Self {
        self.accelerator = Some(accelerator);
        self
    }

    /// Cooperative cancellation of the accelerator path. In-flight batches
    /// complete normally; the next batch observes the flag.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn fitness_mut(&mut self) -> &mut F {
        &mut self.fitness
    }

    /// Score a batch, writing into the parallel output array. Unevaluable
    /// genomes receive NaN.
    pub fn evaluate(&mut self, genomes: &[Genome], out: &mut [f64]) -> Result<BatchReport> {
        if genomes.len() != out.len() {
            return Err(EvoError::InvalidArgument(format!(
                "output length {} does not match batch length {}",
                out.len(),
                genomes.len()
            )));
        }
        let mut report = BatchReport {
            evaluated: genomes.len(),
            ..BatchReport::default()
        };
        if genomes.is_empty() {
            return Ok(report);
        }

        if self.enabled {
            if let Some(accelerator) = self.accelerator.as_ref() {
                let refs: Vec<&Genome> = genomes.iter().collect();
                let now = Instant::now();
                match accelerator.evaluate(&refs, out) {
                    Ok(()) => {
                        report.used_accelerator = true;
                        report.accelerator_time = now.elapsed();
                        return Ok(report);
                    }
                    Err(error) => {
                        report.accelerator_time = now.elapsed();
                        log::warn!(
                            "accelerator {} failed, falling back to cpu: {}",
                            accelerator.name(),
                            error
                        );
                    }
                }
            }
        }

        let now = Instant::now();
        if genomes.len() > PARALLEL_THRESHOLD {
            let fitness = &self.fitness;
            let thread_local = &self.thread_local;
            let mut work = || {
                genomes
                    .par_iter()
                    .zip(out.par_iter_mut())
                    .for_each_init(
                        || {
                            thread_local
                                .get_or(|| RefCell::new(fitness.clone()))
                                .borrow_mut()
                        },
                        |fitness, (genome, slot)| {
                            *slot = fitness
                                .calculate_for_genome(genome)
                                .unwrap_or(f64::NAN);
                        },
                    )
            };
            match self.pool.as_ref() {
                Some(pool) => pool.install(work),
                None => work(),
            }
        } else {
            for (genome, slot) in genomes.iter().zip(out.iter_mut()) {
                *slot = self
                    .fitness
                    .calculate_for_genome(genome)
                    .unwrap_or(f64::NAN);
            }
        }
        report.serial_time = now.elapsed();
        Ok(report)
    }

    /// Score every unevaluated individual of a population through the
    /// batch path, writing fitnesses back in place.
    pub fn evaluate_population(&mut self, population: &mut Population) -> Result<BatchReport> {
        let pending: Vec<Genome> = population
            .individuals
            .iter()
            .filter(|i| i.fitness.is_none())
            .map(|i| i.genome.clone())
            .collect();
        let mut out = vec![f64::NAN; pending.len()];
        let report = self.evaluate(&pending, &mut out)?;

        let mut scores = out.into_iter();
        for individual in population
            .individuals
            .iter_mut()
            .filter(|i| i.fitness.is_none())
        {
            match scores.next() {
                Some(score) if !score.is_nan() => individual.fitness = Some(score),
                _ => {}
            }
        }
        Ok(report)
    }
}
