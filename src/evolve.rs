//! The evolution driver: one generation loop composing every learning subsystem
//!
//! Per generation the driver evaluates pending genomes, feeds the adaptive
//! scheduler, folds the generation's parameter values into the context and
//! temporal stores, records failures into the negative registry, culls the
//! worst and refills by tournament selection, uniform crossover and
//! scheduled mutation. Meta-evolution wraps this loop from the outside.
mod builder;
pub mod prelude;

pub use self::builder::{
    Builder as EvolveBuilder, TryFromBuilderError as TryFromEvolveBuilderError,
};

use crate::context::ContextSystem;
use crate::domain::Domain;
use crate::errors::{EvoError, Result};
use crate::evaluator::BatchEvaluator;
use crate::fitness::Fitness;
use crate::genome::Genome;
use crate::meta::online::OnlineLearner;
use crate::meta::params::MetaParams;
use crate::meta::{meta_evaluate, MetaPopulation};
use crate::negative::NegativeRegistry;
use crate::population::{Individual, Population};
use crate::scheduler::{AdaptiveScheduler, DiversityAction, Exploration};
use crate::temporal::TemporalSystem;
use chrono::Utc;
use rand::Rng;
use std::sync::Arc;

/// Parameter values the learning stores track per experience:
/// mutation rate, cull ratio, exploration factor
pub const TRACKED_PARAMS: usize = 3;

/// Key used for temporal learning when no context is configured
const GLOBAL_KEY: &str = "global";

#[derive(Clone, Debug)]
pub struct EvolveConfig {
    pub genome_size: usize,
    pub max_generations: usize,
    pub target_fitness_score: Option<f64>,
    pub max_stale_generations: Option<usize>,
    pub exploration: Exploration,
    pub params: MetaParams,
}

#[derive(Clone, Debug, Default)]
pub struct EvolveState {
    pub current_generation: usize,
    pub best_generation: usize,
    pub best_fitness: Option<f64>,
    pub best_genome: Option<Genome>,
}

/// The generation loop. See [EvolveBuilder] for initialization options.
///
/// Example:
/// ```rust
/// use evocore::evolve::Evolve;
/// use evocore::fitness::placeholders::CountBytes;
/// use rand::rngs::SmallRng;
/// use rand::SeedableRng;
///
/// let mut rng = SmallRng::seed_from_u64(0);
/// let evolve = Evolve::builder()
///     .with_fitness(CountBytes(0))
///     .with_genome_size(16)
///     .with_max_generations(25)
///     .call(&mut rng)
///     .unwrap();
/// assert!(evolve.state.best_fitness.is_some());
/// ```
pub struct Evolve<F: Fitness> {
    pub config: EvolveConfig,
    pub population: Population,
    pub evaluator: BatchEvaluator<F>,
    pub scheduler: AdaptiveScheduler,
    pub negative: NegativeRegistry,
    pub online: OnlineLearner,
    pub context: Option<ContextSystem>,
    pub temporal: Option<TemporalSystem>,
    pub domain: Option<Arc<dyn Domain>>,
    pub state: EvolveState,
    context_values: Vec<String>,
}

impl<F: Fitness> Evolve<F> {
    pub fn builder() -> EvolveBuilder<F> {
        EvolveBuilder::new()
    }

    /// Declare which context cell subsequent generations learn into.
    /// Values are validated against the declared dimensions.
    pub fn set_context(&mut self, values: &[&str]) -> Result<()> {
        match self.context.as_ref() {
            Some(context) => {
                context.validate_values(values)?;
                self.context_values = values.iter().map(|v| v.to_string()).collect();
                Ok(())
            }
            None => Err(EvoError::NotFound("no context system configured".to_string())),
        }
    }

    /// Run the full generation loop to one of the ending conditions
    pub fn call<R: Rng>(&mut self, rng: &mut R) -> Result<()> {
        self.setup(rng)?;
        while !self.is_finished() {
            self.step(rng)?;
        }
        log::debug!(
            "evolve finished at generation {}, best fitness {:?}",
            self.state.current_generation,
            self.state.best_fitness
        );
        Ok(())
    }

    /// Seed the initial population with random genomes
    pub fn setup<R: Rng>(&mut self, rng: &mut R) -> Result<()> {
        while self.population.size() < self.config.params.target_population {
            let genome = self.random_genome(rng);
            self.population.push(Individual::new(genome))?;
        }
        Ok(())
    }

    /// One generation
    pub fn step<R: Rng>(&mut self, rng: &mut R) -> Result<()> {
        self.state.current_generation += 1;
        self.population.generation = self.state.current_generation;
        let generation = self.state.current_generation;

        let newly_evaluated: Vec<usize> = self
            .population
            .individuals
            .iter()
            .enumerate()
            .filter(|(_, i)| i.fitness.is_none())
            .map(|(index, _)| index)
            .collect();
        self.evaluator.evaluate_population(&mut self.population)?;

        for index in newly_evaluated {
            let raw = match self.population.individuals[index].fitness {
                Some(raw) => raw,
                None => continue,
            };
            let genome = self.population.individuals[index].genome.clone();
            match self.negative.record_failure(&genome, raw, generation) {
                Ok(_) => {}
                Err(EvoError::Full(_)) => {
                    log::warn!("negative registry full, failure not recorded")
                }
                Err(error) => return Err(error),
            }
        }
        self.negative.decay(1);

        self.population.update_stats();
        let best = self.population.best_fitness;
        let avg = self.population.avg_fitness;
        let diversity = self.population.diversity();
        self.scheduler.update(best, avg, diversity);
        self.update_best();

        let mutation_rate = self.scheduler.current_mutation_rate();
        let cull_ratio = self.scheduler.current_cull_ratio();
        let exploration = self.config.exploration.factor(&self.scheduler);
        self.learn_outcome(mutation_rate, cull_ratio, exploration, best);

        let target = self.scheduler.current_population_size().clamp(
            self.config.params.min_population,
            self.config.params.max_population,
        );
        // elites are never culled away, whatever the pressure says
        let cull_ratio = cull_ratio.min((1.0 - self.config.params.elite_ratio).max(0.0));
        self.population.cull_worst(cull_ratio);
        self.population.increment_age();
        self.breed_to(target, mutation_rate, rng);

        if self.scheduler.is_stagnant() {
            self.scheduler.trigger_recovery();
        }
        match self.scheduler.intervention() {
            DiversityAction::AddRandom20Pct => self.inject_random(0.2, rng),
            DiversityAction::AddRandom10Pct => self.inject_random(0.1, rng),
            DiversityAction::IncreaseMutation => self.scheduler.boost_mutation(),
            DiversityAction::None => {}
        }

        log::debug!(
            "generation {}: best {:.6}, avg {:.6}, diversity {:.3}, mutation {:.4}, population {}",
            generation,
            best,
            avg,
            diversity,
            mutation_rate,
            self.population.size()
        );
        Ok(())
    }

    fn learn_outcome(&mut self, mutation_rate: f64, cull_ratio: f64, exploration: f64, best: f64) {
        if !best.is_finite() {
            return;
        }
        let tracked = [mutation_rate, cull_ratio, exploration];
        let now = Utc::now();

        let key = match (self.context.as_mut(), self.context_values.is_empty()) {
            (Some(context), false) => {
                let values: Vec<&str> =
                    self.context_values.iter().map(String::as_str).collect();
                if let Err(error) = context.learn(&values, &tracked, best, now) {
                    log::warn!("context learn failed: {}", error);
                }
                context.build_key(&values)
            }
            _ => GLOBAL_KEY.to_string(),
        };

        if let Some(temporal) = self.temporal.as_mut() {
            if let Err(error) = temporal.learn(&key, &tracked, best, now) {
                log::warn!("temporal learn failed: {}", error);
            }
        }
        self.online.learn_outcome(
            mutation_rate,
            exploration,
            best,
            self.config.params.meta_learning_rate,
        );
    }

    fn breed_to<R: Rng>(&mut self, target: usize, mutation_rate: f64, rng: &mut R) {
        let params = self.config.params.clone();
        while self.population.size() < target.min(self.population.capacity()) {
            let parent_a = match self.select_parent(&params, rng) {
                Some(index) => index,
                None => break,
            };
            let parent_b = self.select_parent(&params, rng).unwrap_or(parent_a);

            let genome_a = &self.population.individuals[parent_a].genome;
            let genome_b = &self.population.individuals[parent_b].genome;
            let (mut child_a, mut child_b) = if rng.gen::<f64>() < params.crossover_rate {
                self.crossover(genome_a, genome_b, rng)
            } else {
                (genome_a.clone(), genome_b.clone())
            };

            self.vary(&mut child_a, mutation_rate, &params, rng);
            self.vary(&mut child_b, mutation_rate, &params, rng);

            if self.population.push(Individual::new(child_a)).is_err() {
                break;
            }
            if self.population.size() < target.min(self.population.capacity())
                && self.population.push(Individual::new(child_b)).is_err()
            {
                break;
            }
        }
    }

    /// Tournament over class-weighted draws: candidates come from the
    /// top, middle and bottom performance bands with the configured
    /// breeding ratios, and the fittest candidate wins. Relies on the
    /// descending order left behind by the cull.
    fn select_parent<R: Rng>(&self, params: &MetaParams, rng: &mut R) -> Option<usize> {
        let size = self.population.size();
        if size == 0 {
            return None;
        }
        let k = params.tournament_size.clamp(1, size);
        let ratio_total =
            params.breeding_ratio_top + params.breeding_ratio_mid + params.breeding_ratio_bottom;
        let mut winner: Option<(usize, f64)> = None;

        for _ in 0..k {
            let index = if size < 3 || ratio_total <= 0.0 {
                rng.gen_range(0..size)
            } else {
                let third = size / 3;
                let band = rng.gen::<f64>() * ratio_total;
                let (start, end) = if band < params.breeding_ratio_top {
                    (0, third)
                } else if band < params.breeding_ratio_top + params.breeding_ratio_mid {
                    (third, 2 * third)
                } else {
                    (2 * third, size)
                };
                rng.gen_range(start..end)
            };
            let fitness = self.population.individuals[index]
                .fitness
                .unwrap_or(f64::NEG_INFINITY);
            if winner.map_or(true, |(_, best)| fitness >= best) {
                winner = Some((index, fitness));
            }
        }
        winner.map(|(index, _)| index)
    }

    /// Offspring variation: a small experimentation band reinitializes the
    /// child outright; otherwise a fair branch picks the gentle
    /// optimization rate or the aggressive variance rate, bounded by the
    /// scheduled rate.
    fn vary<R: Rng>(
        &self,
        child: &mut Genome,
        scheduled_rate: f64,
        params: &MetaParams,
        rng: &mut R,
    ) {
        if rng.gen::<f64>() < params.experimentation_rate {
            match self.domain.as_ref() {
                Some(domain) => domain.random_init(child, rng),
                None => child.randomize(rng),
            }
            return;
        }
        let rate = if rng.gen::<bool>() {
            scheduled_rate.min(params.optimization_mutation_rate)
        } else {
            scheduled_rate.max(params.variance_mutation_rate)
        };
        let rate = rate.max(params.min_mutation_rate);
        match self.domain.as_ref() {
            Some(domain) => domain.mutate(child, rate, rng),
            None => child.mutate(rate, rng),
        }
    }

    fn crossover<R: Rng>(&self, a: &Genome, b: &Genome, rng: &mut R) -> (Genome, Genome) {
        match self.domain.as_ref() {
            Some(domain) => domain.crossover(a, b, rng),
            None => Genome::crossover_uniform(a, b, rng),
        }
    }

    fn random_genome<R: Rng>(&self, rng: &mut R) -> Genome {
        match self.domain.as_ref() {
            Some(domain) => {
                let mut genome = Genome::new(domain.genome_size());
                domain.random_init(&mut genome, rng);
                genome
            }
            None => Genome::random(self.config.genome_size, rng),
        }
    }

    /// Replace the worst `fraction` of the population with fresh random
    /// genomes, the scheduler's diversity intervention. The elite head of
    /// the sorted population is left untouched.
    fn inject_random<R: Rng>(&mut self, fraction: f64, rng: &mut R) {
        let size = self.population.size();
        let elite = ((size as f64 * self.config.params.elite_ratio).ceil() as usize).max(1);
        let count = ((size as f64 * fraction).ceil() as usize).min(size.saturating_sub(elite));
        if count == 0 {
            return;
        }
        log::debug!("### evolve, injecting {} random individuals", count);
        self.population.sort();
        let len = self.population.size();
        for index in len - count..len {
            let genome = self.random_genome(rng);
            self.population.individuals[index] = Individual::new(genome);
        }
    }

    fn update_best(&mut self) {
        let contender = match self.population.best_individual() {
            Some(individual) => individual,
            None => return,
        };
        let contending_fitness = match contender.fitness {
            Some(fitness) => fitness,
            None => return,
        };
        let improved = self
            .state
            .best_fitness
            .map_or(true, |current| contending_fitness > current);
        if improved {
            self.state.best_fitness = Some(contending_fitness);
            self.state.best_genome = Some(contender.genome.clone());
            self.state.best_generation = self.state.current_generation;
        }
    }

    pub fn is_finished(&self) -> bool {
        self.is_finished_by_max_generations()
            || self.is_finished_by_target_fitness_score()
            || self.is_finished_by_max_stale_generations()
    }

    fn is_finished_by_max_generations(&self) -> bool {
        self.state.current_generation >= self.config.max_generations
    }

    fn is_finished_by_target_fitness_score(&self) -> bool {
        match (self.config.target_fitness_score, self.state.best_fitness) {
            (Some(target), Some(best)) => best >= target,
            _ => false,
        }
    }

    fn is_finished_by_max_stale_generations(&self) -> bool {
        match self.config.max_stale_generations {
            Some(max_stale) => {
                self.state.current_generation - self.state.best_generation >= max_stale
            }
            None => false,
        }
    }
}

/// The meta-evolution outer loop: evaluate every configuration by running
/// the inner loop with it, evolve the configuration population, repeat.
/// Returns the best configuration found.
pub fn meta_evolve<F, R, B>(
    mut make_builder: B,
    meta: &mut MetaPopulation,
    inner_generations: usize,
    rounds: usize,
    rng: &mut R,
) -> Result<MetaParams>
where
    F: Fitness,
    R: Rng,
    B: FnMut() -> EvolveBuilder<F>,
{
    if rounds == 0 || inner_generations == 0 {
        return Err(EvoError::InvalidArgument(
            "meta evolution needs at least one round and one inner generation".to_string(),
        ));
    }
    for round in 0..rounds {
        for index in 0..meta.size() {
            let params = meta.individuals[index].params.clone();
            let mut evolve = make_builder()
                .with_params(params)
                .with_max_generations(inner_generations)
                .build()
                .map_err(|error| EvoError::InvalidArgument(error.0.to_string()))?;
            evolve.call(rng)?;

            let best = evolve.state.best_fitness.unwrap_or(f64::NEG_INFINITY);
            let avg = evolve.population.avg_fitness;
            let diversity = evolve.population.diversity();
            let generations = evolve.state.best_generation.max(1);
            let score = meta_evaluate(best, avg, diversity, generations);
            meta.individuals[index].record_fitness(score, round);
        }
        meta.evolve(rng);
        if meta.converged(0.01, 3) {
            log::debug!("meta evolution converged after {} rounds", round + 1);
            break;
        }
    }
    meta.best()
        .map(|best| best.params.clone())
        .ok_or_else(|| EvoError::Empty("meta population produced no evaluated best"))
}
