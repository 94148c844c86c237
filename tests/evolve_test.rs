use evocore::context::ContextDimension;
use evocore::domain::Domain;
use evocore::evolve::{meta_evolve, Evolve};
use evocore::fitness::placeholders::{CountBytes, Sphere};
use evocore::genome::Genome;
use evocore::meta::params::MetaParams;
use evocore::meta::MetaPopulation;
use evocore::temporal::BucketGrain;
use rand::rngs::SmallRng;
use rand::{Rng, RngCore, SeedableRng};
use std::sync::Arc;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A domain whose encoding is closed over 0/1 bytes: initialization and
/// mutation only ever produce bits, so any other byte value in the
/// population proves a generic byte operator leaked in.
#[derive(Debug)]
struct BitDomain;

impl Domain for BitDomain {
    fn name(&self) -> &str {
        "bits"
    }
    fn genome_size(&self) -> usize {
        4
    }
    fn random_init(&self, genome: &mut Genome, rng: &mut dyn RngCore) {
        for byte in genome.bytes_mut() {
            *byte = rng.gen::<bool>() as u8;
        }
    }
    fn mutate(&self, genome: &mut Genome, rate: f64, rng: &mut dyn RngCore) {
        for byte in genome.bytes_mut() {
            if rng.gen::<f64>() < rate {
                *byte = rng.gen::<bool>() as u8;
            }
        }
    }
    fn fitness(&self, genome: &Genome) -> Option<f64> {
        Some(genome.bytes().iter().filter(|&&b| b == 0).count() as f64)
    }
}

#[test]
fn builder_requires_fitness_and_genome_size() {
    assert!(Evolve::<CountBytes>::builder().build().is_err());
    assert!(Evolve::builder()
        .with_fitness(CountBytes(0))
        .build()
        .is_err());
    assert!(Evolve::builder()
        .with_fitness(CountBytes(0))
        .with_genome_size(8)
        .build()
        .is_ok());
}

#[test]
fn builder_rejects_invalid_params() {
    let mut params = MetaParams::default();
    params.mutation_rate = 5.0;
    assert!(Evolve::builder()
        .with_fitness(CountBytes(0))
        .with_genome_size(8)
        .with_params(params)
        .build()
        .is_err());
}

#[test]
fn count_bytes_run_reaches_the_target() {
    init_logging();
    let mut rng = SmallRng::seed_from_u64(0);
    let evolve = Evolve::builder()
        .with_fitness(CountBytes(0))
        .with_genome_size(8)
        .with_max_generations(600)
        .with_target_fitness_score(6.0)
        .call(&mut rng)
        .unwrap();

    let best = evolve.state.best_fitness.unwrap();
    assert!(best >= 6.0, "best fitness {} below target", best);
    assert!(evolve.state.current_generation < 600);
    let genome = evolve.state.best_genome.unwrap();
    assert!(genome.bytes().iter().filter(|&&b| b == 0).count() >= 6);
}

#[test]
fn sphere_converges_toward_the_origin() {
    init_logging();
    let sphere = Sphere::new(5);
    // hold the population at full strength through the whole run
    let mut params = MetaParams::default();
    params.min_population = 100;

    let mut rng = SmallRng::seed_from_u64(42);
    let mut evolve = Evolve::builder()
        .with_fitness(sphere.clone())
        .with_genome_size(sphere.genome_size())
        .with_max_generations(800)
        .with_target_fitness_score(-1e-2)
        .with_params(params)
        .build()
        .unwrap();

    evolve.setup(&mut rng).unwrap();
    let mut last_best = f64::NEG_INFINITY;
    while !evolve.is_finished() {
        evolve.step(&mut rng).unwrap();
        let best = evolve.state.best_fitness.unwrap_or(f64::NEG_INFINITY);
        assert!(best >= last_best, "best fitness regressed");
        last_best = best;
    }

    let best = evolve.state.best_fitness.unwrap();
    assert!(
        best >= -1e-2,
        "sphere did not converge, best fitness {}",
        best
    );
}

#[test]
fn stale_run_stops_early() {
    let mut rng = SmallRng::seed_from_u64(1);
    let evolve = Evolve::builder()
        .with_fitness(CountBytes(0))
        .with_genome_size(4)
        .with_max_generations(10_000)
        .with_max_stale_generations(30)
        .call(&mut rng)
        .unwrap();

    assert!(evolve.state.current_generation < 10_000);
}

#[test]
fn context_learning_accumulates_per_cell() {
    let mut rng = SmallRng::seed_from_u64(2);
    let mut evolve = Evolve::builder()
        .with_fitness(CountBytes(0))
        .with_genome_size(8)
        .with_max_generations(5)
        .with_context_dimensions(vec![ContextDimension::new(
            "market",
            vec!["bull".to_string(), "bear".to_string()],
        )])
        .build()
        .unwrap();

    assert!(evolve.set_context(&["sideways"]).is_err());
    evolve.set_context(&["bull"]).unwrap();
    evolve.call(&mut rng).unwrap();

    let context = evolve.context.as_ref().unwrap();
    let entry = context.get("bull").unwrap();
    assert_eq!(entry.total_experiences, 5);
    assert!(entry.best_fitness >= 0.0);
}

#[test]
fn temporal_learning_uses_the_global_key_without_context() {
    let mut rng = SmallRng::seed_from_u64(3);
    let evolve = Evolve::builder()
        .with_fitness(CountBytes(0))
        .with_genome_size(8)
        .with_max_generations(5)
        .with_temporal(BucketGrain::Minute, 10)
        .call(&mut rng)
        .unwrap();

    let temporal = evolve.temporal.as_ref().unwrap();
    let series = temporal.series("global").unwrap();
    let samples: u64 = series.buckets.iter().map(|b| b.sample_count).sum();
    assert_eq!(samples, 5);
}

#[test]
fn online_learner_sees_every_generation() {
    let mut rng = SmallRng::seed_from_u64(4);
    let evolve = Evolve::builder()
        .with_fitness(CountBytes(0))
        .with_genome_size(8)
        .with_max_generations(20)
        .call(&mut rng)
        .unwrap();

    let learned = evolve.online.get_learned_params(1);
    assert!(learned.mutation_rate.is_some());
    assert!(learned.exploration_factor.is_some());
}

#[test]
fn meta_evolution_returns_a_valid_configuration() {
    let mut rng = SmallRng::seed_from_u64(5);
    let mut meta = MetaPopulation::new(3, &mut rng).unwrap();

    let best_params = meta_evolve(
        || {
            Evolve::builder()
                .with_fitness(CountBytes(0))
                .with_genome_size(8)
        },
        &mut meta,
        5,
        2,
        &mut rng,
    )
    .unwrap();

    best_params.validate().unwrap();
    assert!(meta.best().unwrap().meta_fitness.is_finite());
    assert_eq!(meta.generation, 2);
}

#[test]
fn registered_domain_operators_replace_the_byte_level_ones() {
    init_logging();
    let mut rng = SmallRng::seed_from_u64(6);
    let evolve = Evolve::builder()
        .with_fitness(CountBytes(0))
        .with_domain(Arc::new(BitDomain))
        .with_max_generations(300)
        .with_target_fitness_score(4.0)
        .call(&mut rng)
        .unwrap();

    // genome size comes from the domain, no with_genome_size needed
    assert_eq!(evolve.config.genome_size, 4);
    assert_eq!(evolve.state.best_fitness, Some(4.0));
    assert_eq!(evolve.state.best_genome.unwrap().bytes(), &[0, 0, 0, 0]);

    // init, mutation, crossover and injection all went through the
    // domain, so the bit encoding stayed closed
    for individual in &evolve.population.individuals {
        assert!(individual.genome.bytes().iter().all(|&b| b <= 1));
    }
}

#[test]
fn domain_defaults_fall_back_to_byte_operators() {
    let domain: Arc<dyn Domain> = Arc::new(BitDomain);
    let mut rng = SmallRng::seed_from_u64(7);
    let parent_a = Genome::from_bytes(&[0, 0, 1, 1]);
    let parent_b = Genome::from_bytes(&[1, 1, 0, 0]);

    let (child_a, child_b) = domain.crossover(&parent_a, &parent_b, &mut rng);
    for index in 0..4 {
        assert_eq!(
            child_a.bytes()[index] ^ child_b.bytes()[index],
            parent_a.bytes()[index] ^ parent_b.bytes()[index]
        );
    }

    assert_eq!(domain.diversity(&parent_a, &parent_a), 0.0);
    assert_eq!(domain.diversity(&parent_a, &parent_b), 1.0);
    assert_eq!(domain.serialize_genome(&parent_a), "00000101");
    assert_eq!(domain.version(), 1);
}

#[test]
fn set_context_without_a_context_system_fails() {
    let mut evolve = Evolve::builder()
        .with_fitness(CountBytes(0))
        .with_genome_size(8)
        .build()
        .unwrap();
    assert!(evolve.set_context(&["bull"]).is_err());
}
