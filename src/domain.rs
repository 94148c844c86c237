//! Domain registration: caller-supplied operators replacing the generic byte-level ones
use crate::genome::Genome;
use rand::RngCore;

/// A problem domain. Registering one replaces the driver's generic
/// byte-level operators with the domain's own encoding-aware versions;
/// its `diversity` metric becomes the canonical similarity everywhere a
/// byte Hamming fraction would otherwise be used.
pub trait Domain: Send + Sync + std::fmt::Debug {
    fn name(&self) -> &str;
    fn version(&self) -> u32 {
        1
    }
    fn genome_size(&self) -> usize;

    /// Fill a genome with a valid random solution
    fn random_init(&self, genome: &mut Genome, rng: &mut dyn RngCore);

    /// Domain-aware mutation at the given rate
    fn mutate(&self, genome: &mut Genome, rate: f64, rng: &mut dyn RngCore) {
        genome.mutate(rate, rng);
    }

    /// Domain-aware recombination of two parents
    fn crossover(
        &self,
        parent_a: &Genome,
        parent_b: &Genome,
        rng: &mut dyn RngCore,
    ) -> (Genome, Genome) {
        Genome::crossover_uniform(parent_a, parent_b, rng)
    }

    /// Distance between two solutions in [0, 1]; 0 means identical
    fn diversity(&self, a: &Genome, b: &Genome) -> f64 {
        1.0 - a.similarity(b)
    }

    /// Score a solution; `None` marks it invalid
    fn fitness(&self, genome: &Genome) -> Option<f64>;

    /// Human-readable rendering for reports and logs
    fn serialize_genome(&self, genome: &Genome) -> String {
        genome.to_hex()
    }
}
