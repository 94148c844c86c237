//! The builder for an Evolve driver
use super::{Evolve, EvolveConfig, EvolveState, TRACKED_PARAMS};
use crate::context::{ContextDimension, ContextSystem};
use crate::domain::Domain;
use crate::evaluator::{Accelerator, BatchEvaluator};
use crate::fitness::Fitness;
use crate::meta::online::OnlineLearner;
use crate::meta::params::MetaParams;
use crate::negative::NegativeRegistry;
use crate::population::Population;
use crate::scheduler::{AdaptiveScheduler, Exploration};
use crate::temporal::{BucketGrain, TemporalSystem};
use std::sync::Arc;

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct TryFromBuilderError(pub &'static str);

/// The builder for an [Evolve] driver
pub struct Builder<F: Fitness> {
    pub fitness: Option<F>,
    pub genome_size: Option<usize>,
    pub max_generations: usize,
    pub target_fitness_score: Option<f64>,
    pub max_stale_generations: Option<usize>,
    pub stagnation_threshold: Option<usize>,
    pub exploration: Exploration,
    pub params: MetaParams,
    pub context_dimensions: Option<Vec<ContextDimension>>,
    pub temporal: Option<(BucketGrain, usize)>,
    pub domain: Option<Arc<dyn Domain>>,
    pub accelerator: Option<Box<dyn Accelerator>>,
    pub negative_capacity: usize,
}

impl<F: Fitness> Builder<F> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn build(self) -> std::result::Result<Evolve<F>, TryFromBuilderError> {
        self.try_into()
    }

    pub fn call<R: rand::Rng>(
        self,
        rng: &mut R,
    ) -> std::result::Result<Evolve<F>, TryFromBuilderError> {
        let mut evolve: Evolve<F> = self.try_into()?;
        if let Err(error) = evolve.call(rng) {
            log::warn!("evolve run aborted: {}", error);
        }
        Ok(evolve)
    }

    pub fn with_fitness(mut self, fitness: F) -> Self {
        self.fitness = Some(fitness);
        self
    }
    pub fn with_genome_size(mut self, genome_size: usize) -> Self {
        self.genome_size = Some(genome_size);
        self
    }
    pub fn with_max_generations(mut self, max_generations: usize) -> Self {
        self.max_generations = max_generations;
        self
    }
    pub fn with_target_fitness_score(mut self, target_fitness_score: f64) -> Self {
        self.target_fitness_score = Some(target_fitness_score);
        self
    }
    pub fn with_max_stale_generations(mut self, max_stale_generations: usize) -> Self {
        self.max_stale_generations = Some(max_stale_generations);
        self
    }
    pub fn with_stagnation_threshold(mut self, stagnation_threshold: usize) -> Self {
        self.stagnation_threshold = Some(stagnation_threshold);
        self
    }
    pub fn with_exploration(mut self, exploration: Exploration) -> Self {
        self.exploration = exploration;
        self
    }
    pub fn with_params(mut self, params: MetaParams) -> Self {
        self.params = params;
        self
    }
    pub fn with_context_dimensions(mut self, dimensions: Vec<ContextDimension>) -> Self {
        self.context_dimensions = Some(dimensions);
        self
    }
    pub fn with_temporal(mut self, grain: BucketGrain, retention: usize) -> Self {
        self.temporal = Some((grain, retention));
        self
    }
    pub fn with_domain(mut self, domain: Arc<dyn Domain>) -> Self {
        self.domain = Some(domain);
        self
    }
    pub fn with_accelerator(mut self, accelerator: Box<dyn Accelerator>) -> Self {
        self.accelerator = Some(accelerator);
        self
    }
    pub fn with_negative_capacity(mut self, negative_capacity: usize) -> Self {
        self.negative_capacity = negative_capacity;
        self
    }
}

impl<F: Fitness> Default for Builder<F> {
    fn default() -> Self {
        Self {
            fitness: None,
            genome_size: None,
            max_generations: 100,
            target_fitness_score: None,
            max_stale_generations: None,
            stagnation_threshold: None,
            exploration: Exploration::Adaptive,
            params: MetaParams::default(),
            context_dimensions: None,
            temporal: None,
            domain: None,
            accelerator: None,
            negative_capacity: 1000,
        }
    }
}

impl<F: Fitness> TryFrom<Builder<F>> for Evolve<F> {
    type Error = TryFromBuilderError;

    fn try_from(builder: Builder<F>) -> std::result::Result<Self, Self::Error> {
        let fitness = builder
            .fitness
            .ok_or(TryFromBuilderError("Evolve requires a Fitness"))?;
        let genome_size = builder
            .genome_size
            .or(builder.domain.as_ref().map(|d| d.genome_size()))
            .ok_or(TryFromBuilderError(
                "Evolve requires a genome_size (or a Domain providing one)",
            ))?;
        if genome_size == 0 {
            return Err(TryFromBuilderError("genome_size must be at least 1"));
        }
        if builder.max_generations == 0 {
            return Err(TryFromBuilderError("max_generations must be at least 1"));
        }
        if builder.params.validate().is_err() {
            return Err(TryFromBuilderError("params outside their declared ranges"));
        }

        let params = builder.params;
        let context = match builder.context_dimensions {
            Some(dimensions) => Some(
                ContextSystem::new(dimensions, TRACKED_PARAMS)
                    .map_err(|_| TryFromBuilderError("context dimensions must be non-empty"))?,
            ),
            None => None,
        };
        let temporal = match builder.temporal {
            Some((grain, retention)) => Some(
                TemporalSystem::new(grain, TRACKED_PARAMS, retention)
                    .map_err(|_| TryFromBuilderError("temporal retention must be at least 2"))?,
            ),
            None => None,
        };

        let mut scheduler = AdaptiveScheduler::new(
            builder.max_generations,
            params.target_population,
            params.min_population,
        )
        .with_initial_mutation(params.mutation_rate);
        scheduler.min_mutation = params.min_mutation_rate;
        if let Some(threshold) = builder.stagnation_threshold {
            scheduler.stagnation_threshold = threshold;
        }

        let mut negative = NegativeRegistry::new(builder.negative_capacity)
            .with_similarity_threshold(params.negative_similarity_threshold)
            .with_decay_rate(params.negative_decay_rate)
            .with_repeat_multiplier(params.negative_repeat_multiplier);
        if let Some(domain) = builder.domain.as_ref() {
            let domain = Arc::clone(domain);
            negative.set_similarity_fn(Arc::new(move |a, b| 1.0 - domain.diversity(a, b)));
        }

        let mut evaluator = BatchEvaluator::new(fitness);
        if let Some(accelerator) = builder.accelerator {
            evaluator = evaluator.with_accelerator(accelerator);
        }

        Ok(Self {
            config: EvolveConfig {
                genome_size,
                max_generations: builder.max_generations,
                target_fitness_score: builder.target_fitness_score,
                max_stale_generations: builder.max_stale_generations,
                exploration: builder.exploration,
                params: params.clone(),
            },
            population: Population::new(params.max_population),
            evaluator,
            scheduler,
            negative,
            online: OnlineLearner::new(),
            context,
            temporal,
            domain: builder.domain,
            state: EvolveState::default(),
            context_values: Vec::new(),
        })
    }
}
