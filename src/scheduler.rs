//! The adaptive scheduler turns run progress and population health into evolution parameters
use crate::meta::params::MetaParams;
use std::collections::VecDeque;

/// Run phase derived from progress through the generation budget
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Phase {
    /// progress < 0.30, exploration
    Early,
    /// 0.30 <= progress < 0.70
    Mid,
    /// progress >= 0.70, exploitation
    Late,
}

impl Phase {
    pub fn from_progress(progress: f64) -> Self {
        if progress < 0.30 {
            Phase::Early
        } else if progress < 0.70 {
            Phase::Mid
        } else {
            Phase::Late
        }
    }

    pub fn exploration_factor(&self) -> f64 {
        match self {
            Phase::Early => 0.7,
            Phase::Mid => 0.5,
            Phase::Late => 0.2,
        }
    }
}

/// How the exploration factor fed to the learning stores is derived
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Exploration {
    /// Constant factor
    Fixed(f64),
    /// Exponential decay from 1.0 over run progress
    Decay,
    /// Phase-scheduled: explore early, exploit late
    Adaptive,
}

impl Exploration {
    pub fn factor(&self, scheduler: &AdaptiveScheduler) -> f64 {
        match self {
            Exploration::Fixed(value) => value.clamp(0.0, 1.0),
            Exploration::Decay => (-2.0 * scheduler.progress()).exp(),
            Exploration::Adaptive => scheduler.phase().exploration_factor(),
        }
    }
}

/// Intervention token returned to the driver when diversity collapses
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DiversityAction {
    AddRandom20Pct,
    AddRandom10Pct,
    IncreaseMutation,
    None,
}

/// Phase detection, stagnation recovery and variance-driven selection
/// pressure for the evolution driver.
///
/// Call [update](AdaptiveScheduler::update) once per generation, then read
/// the current mutation rate, cull ratio and population size.
#[derive(Clone, Debug)]
pub struct AdaptiveScheduler {
    current_gen: usize,
    max_gen: usize,
    phase: Phase,
    recent_best: VecDeque<f64>,
    window: usize,
    best_ever: f64,
    gens_since_improvement: usize,
    pub stagnation_threshold: usize,
    diversity_ema: Option<f64>,
    diversity_alpha: f64,
    pub initial_mutation: f64,
    pub min_mutation: f64,
    pub decay_alpha: f64,
    pub stagnation_boost: f64,
    pub diversity_boost: f64,
    pub min_diversity: f64,
    pub stagnation_expansion: f64,
    initial_pop: usize,
    final_pop: usize,
    current_mutation_rate: f64,
    current_cull_ratio: f64,
    current_population_size: usize,
}

impl AdaptiveScheduler {
    pub fn new(max_gen: usize, initial_pop: usize, final_pop: usize) -> Self {
        Self {
            current_gen: 0,
            max_gen: max_gen.max(1),
            phase: Phase::Early,
            recent_best: VecDeque::with_capacity(50),
            window: 50,
            best_ever: f64::NEG_INFINITY,
            gens_since_improvement: 0,
            stagnation_threshold: 20,
            diversity_ema: None,
            diversity_alpha: 0.1,
            initial_mutation: 0.1,
            min_mutation: 0.001,
            decay_alpha: 0.01,
            stagnation_boost: 3.0,
            diversity_boost: 1.5,
            min_diversity: 0.1,
            stagnation_expansion: 1.5,
            initial_pop,
            final_pop,
            current_mutation_rate: 0.1,
            current_cull_ratio: 0.25,
            current_population_size: initial_pop,
        }
    }

    pub fn with_initial_mutation(mut self, rate: f64) -> Self {
        self.initial_mutation = rate;
        self.current_mutation_rate = rate;
        self
    }
    pub fn with_stagnation_threshold(mut self, threshold: usize) -> Self {
        self.stagnation_threshold = threshold;
        self
    }

    pub fn current_gen(&self) -> usize {
        self.current_gen
    }
    pub fn phase(&self) -> Phase {
        self.phase
    }
    pub fn progress(&self) -> f64 {
        self.current_gen as f64 / self.max_gen as f64
    }
    pub fn best_ever(&self) -> f64 {
        self.best_ever
    }
    pub fn gens_since_improvement(&self) -> usize {
        self.gens_since_improvement
    }
    pub fn diversity(&self) -> f64 {
        self.diversity_ema.unwrap_or(0.0)
    }
    pub fn current_mutation_rate(&self) -> f64 {
        self.current_mutation_rate
    }
    pub fn current_cull_ratio(&self) -> f64 {
        self.current_cull_ratio
    }
    pub fn current_population_size(&self) -> usize {
        self.current_population_size
    }

    /// Ingest one generation's observations and refresh the schedules
    pub fn update(&mut self, best: f64, _avg: f64, diversity: f64) {
        self.current_gen += 1;
        self.phase = Phase::from_progress(self.progress());

        if self.recent_best.len() >= self.window {
            self.recent_best.pop_front();
        }
        self.recent_best.push_back(best);

        if best > self.best_ever {
            self.best_ever = best;
            self.gens_since_improvement = 0;
        } else {
            self.gens_since_improvement += 1;
        }

        self.diversity_ema = Some(match self.diversity_ema {
            Some(ema) => self.diversity_alpha * diversity + (1.0 - self.diversity_alpha) * ema,
            None => diversity,
        });

        self.current_mutation_rate = self.mutation_rate();
        self.current_cull_ratio = self.selection_pressure();
        self.current_population_size = self.population_size();
    }

    pub fn is_stagnant(&self) -> bool {
        self.gens_since_improvement >= self.stagnation_threshold
    }

    /// Exponentially decayed mutation schedule with stagnation and
    /// low-diversity boosts, floored at the minimum rate.
    pub fn mutation_rate(&self) -> f64 {
        let mut rate = self.initial_mutation * (-self.decay_alpha * self.progress()).exp();
        if self.is_stagnant() {
            rate *= self.stagnation_boost;
        }
        if self.diversity() < self.min_diversity {
            rate *= self.diversity_boost;
        }
        rate.max(self.min_mutation)
    }

    /// Cull ratio from the coefficient of variation of the recent-best
    /// ring: high variance culls gently, flat fitness culls hard. A zero
    /// mean yields no signal and falls into the hard-cull band.
    pub fn selection_pressure(&self) -> f64 {
        let mean = stats::mean(self.recent_best.iter().copied());
        let std = stats::stddev(self.recent_best.iter().copied());
        let cv = if mean == 0.0 { 0.0 } else { std / mean.abs() };
        if cv > 0.15 {
            0.15
        } else if cv < 0.05 {
            0.40
        } else {
            0.25
        }
    }

    /// Phase-scheduled population size, linearly interpolated through the
    /// mid phase and expanded while stagnant.
    pub fn population_size(&self) -> usize {
        let base = match self.phase {
            Phase::Early => self.initial_pop as f64,
            Phase::Late => self.final_pop as f64,
            Phase::Mid => {
                let t = (self.progress() - 0.30) / 0.40;
                self.initial_pop as f64 + t * (self.final_pop as f64 - self.initial_pop as f64)
            }
        };
        let expanded = if self.is_stagnant() {
            base * self.stagnation_expansion
        } else {
            base
        };
        expanded.round().max(1.0) as usize
    }

    /// Escalating response to diversity collapse, returned as a token for
    /// the driver to apply.
    pub fn intervention(&self) -> DiversityAction {
        let diversity = self.diversity();
        if diversity < 0.1 {
            DiversityAction::AddRandom20Pct
        } else if diversity < 0.2 {
            DiversityAction::AddRandom10Pct
        } else if diversity < 0.3 {
            DiversityAction::IncreaseMutation
        } else {
            DiversityAction::None
        }
    }

    /// Raise the live mutation rate by the diversity boost factor,
    /// the [DiversityAction::IncreaseMutation] response.
    pub fn boost_mutation(&mut self) {
        self.current_mutation_rate *= self.diversity_boost;
    }

    /// Stagnation escape: boost the live mutation rate, expand the target
    /// population and restart the improvement counter.
    pub fn trigger_recovery(&mut self) {
        log::debug!(
            "### scheduler, stagnation recovery at generation {}",
            self.current_gen
        );
        self.current_mutation_rate *= self.stagnation_boost;
        self.current_population_size = ((self.current_population_size as f64
            * self.stagnation_expansion)
            .round())
            .max(1.0) as usize;
        self.gens_since_improvement = 0;
    }

    /// Write the live schedule into a parameter record
    pub fn apply_to_meta(&self, params: &mut MetaParams) {
        params.mutation_rate = self.current_mutation_rate;
        params.cull_ratio = self.current_cull_ratio;
        params.target_population = self.current_population_size;
        params.exploration_factor = self.phase.exploration_factor();
    }
}
