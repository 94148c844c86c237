//! Re-export the types needed to run an evolution
pub use crate::context::{ContextDimension, ContextSystem};
pub use crate::domain::Domain;
pub use crate::errors::{EvoError, Result};
pub use crate::evaluator::{Accelerator, BatchEvaluator, BatchReport};
pub use crate::evolve::{
    meta_evolve, Evolve, EvolveBuilder, EvolveConfig, EvolveState, TryFromEvolveBuilderError,
};
pub use crate::fitness::Fitness;
pub use crate::genome::Genome;
pub use crate::meta::online::OnlineLearner;
pub use crate::meta::params::MetaParams;
pub use crate::meta::{meta_evaluate, MetaIndividual, MetaPopulation};
pub use crate::negative::{NegativeRegistry, RecordOutcome, Severity};
pub use crate::population::{Individual, Population};
pub use crate::scheduler::{AdaptiveScheduler, DiversityAction, Exploration, Phase};
pub use crate::temporal::{BucketGrain, TemporalSystem, TrendDirection};
pub use rand::rngs::SmallRng;
pub use rand::{Rng, SeedableRng};
