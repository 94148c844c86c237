//! A domain-agnostic evolutionary optimization core with a learning layer
//! on top of classical genetic search.
//!
//! Solutions are opaque fixed-length byte strings ([Genome](genome::Genome))
//! scored by a caller-supplied [Fitness](fitness::Fitness) function. On top
//! of selection, crossover and mutation the core maintains:
//! * quality-weighted statistics about which parameter values work,
//!   partitioned by [context](context) and by [time bucket](temporal)
//! * a [negative registry](negative) that remembers failures and penalizes
//!   candidates resembling them
//! * an [adaptive scheduler](scheduler) driving mutation rate, selection
//!   pressure and population size from phase, stagnation and variance
//! * a [meta-evolution layer](meta) evolving the evolution parameters
//!   themselves with its own GA
//!
//! ## Quick Usage
//!
//! ```rust
//! use evocore::evolve::prelude::*;
//!
//! // the search goal: genomes of all-zero bytes
//! #[derive(Clone, Debug)]
//! pub struct CountZeros;
//! impl Fitness for CountZeros {
//!     fn calculate_for_genome(&mut self, genome: &Genome) -> Option<f64> {
//!         Some(genome.bytes().iter().filter(|&&b| b == 0).count() as f64)
//!     }
//! }
//!
//! let mut rng = rand::rngs::SmallRng::seed_from_u64(42);
//! let evolve = Evolve::builder()
//!     .with_fitness(CountZeros)
//!     .with_genome_size(32)
//!     .with_max_generations(50)
//!     .with_target_fitness_score(32.0)
//!     .call(&mut rng)
//!     .unwrap();
//!
//! println!("best: {:?}", evolve.state.best_fitness);
//! ```

pub mod config;
pub mod context;
pub mod domain;
pub mod errors;
pub mod evaluator;
pub mod evolve;
pub mod fitness;
pub mod genome;
pub mod meta;
pub mod negative;
pub mod population;
pub mod scheduler;
pub mod stats;
pub mod temporal;

pub use errors::{EvoError, Result};
