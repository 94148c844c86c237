//! The search goal to optimize towards. Higher is better; embed
//! minimization by negating.
//!
//! Each problem has its own [Fitness] function, implemented as a fitness
//! method object. Returning `None` marks the genome invalid; it sorts last
//! and is excluded from population statistics.
pub mod placeholders;

use crate::genome::Genome;
use crate::population::Population;
use rayon::prelude::*;
use std::cell::RefCell;
use thread_local::ThreadLocal;

/// The fitness function, implemented as a fitness method object.
///
/// Must be pure with respect to the genome bytes: the same bytes score the
/// same, regardless of dispatch path.
///
/// # Example:
/// ```rust
/// use evocore::fitness::Fitness;
/// use evocore::genome::Genome;
///
/// #[derive(Clone, Debug)]
/// pub struct CountZeros;
/// impl Fitness for CountZeros {
///     fn calculate_for_genome(&mut self, genome: &Genome) -> Option<f64> {
///         Some(genome.bytes().iter().filter(|&&b| b == 0).count() as f64)
///     }
/// }
/// ```
pub trait Fitness: Clone + Send + Sync + std::fmt::Debug {
    fn calculate_for_genome(&mut self, genome: &Genome) -> Option<f64>;

    /// Score every unevaluated individual. Pass `thread_local` for a
    /// rayon-parallel sweep with one fitness clone per worker thread.
    fn call_for_population(
        &mut self,
        population: &mut Population,
        thread_local: Option<&ThreadLocal<RefCell<Self>>>,
    ) {
        if let Some(thread_local) = thread_local {
            population
                .individuals
                .par_iter_mut()
                .filter(|i| i.fitness.is_none())
                .for_each_init(
                    || {
                        thread_local
                            .get_or(|| RefCell::new(self.clone()))
                            .borrow_mut()
                    },
                    |fitness, individual| {
                        individual.fitness = fitness.calculate_for_genome(&individual.genome);
                    },
                );
        } else {
            population
                .individuals
                .iter_mut()
                .filter(|i| i.fitness.is_none())
                .for_each(|i| i.fitness = self.calculate_for_genome(&i.genome));
        }
    }
}
