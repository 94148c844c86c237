mod support;

use evocore::errors::{EvoError, Result};
use evocore::evaluator::{Accelerator, BatchEvaluator};
use evocore::fitness::Fitness;
use evocore::genome::Genome;
use crate::support::*;

/// Deterministic fitness: sum of the genome bytes
#[derive(Clone, Debug)]
struct ByteSum;
impl Fitness for ByteSum {
    fn calculate_for_genome(&mut self, genome: &Genome) -> Option<f64> {
        Some(genome.bytes().iter().map(|&b| b as f64).sum())
    }
}

/// Fitness that rejects genomes starting with 0xff
#[derive(Clone, Debug)]
struct RejectMarked;
impl Fitness for RejectMarked {
    fn calculate_for_genome(&mut self, genome: &Genome) -> Option<f64> {
        if genome.bytes().first() == Some(&0xff) {
            None
        } else {
            Some(1.0)
        }
    }
}

#[derive(Debug)]
struct FailingAccelerator;
impl Accelerator for FailingAccelerator {
    fn name(&self) -> &str {
        "failing"
    }
    fn evaluate(&self, _genomes: &[&Genome], _out: &mut [f64]) -> Result<()> {
        Err(EvoError::Unknown("device lost".to_string()))
    }
}

#[derive(Debug)]
struct ConstantAccelerator(f64);
impl Accelerator for ConstantAccelerator {
    fn name(&self) -> &str {
        "constant"
    }
    fn evaluate(&self, genomes: &[&Genome], out: &mut [f64]) -> Result<()> {
        for (index, _) in genomes.iter().enumerate() {
            out[index] = self.0;
        }
        Ok(())
    }
}

fn batch(count: usize, seed: u64) -> Vec<Genome> {
    let mut rng = SmallRng::seed_from_u64(seed);
    (0..count).map(|_| Genome::random(16, &mut rng)).collect()
}

fn expected(genomes: &[Genome]) -> Vec<f64> {
    genomes
        .iter()
        .map(|g| g.bytes().iter().map(|&b| b as f64).sum())
        .collect()
}

#[test]
fn serial_batch_outputs_match_positions() {
    let genomes = batch(5, 0);
    let mut out = vec![0.0; 5];
    let mut evaluator = BatchEvaluator::new(ByteSum);
    let report = evaluator.evaluate(&genomes, &mut out).unwrap();

    assert_eq!(out, expected(&genomes));
    assert_eq!(report.evaluated, 5);
    assert!(!report.used_accelerator);
}

#[test]
fn parallel_batch_outputs_match_positions() {
    // above the parallel threshold of 10 items
    let genomes = batch(64, 1);
    let mut out = vec![0.0; 64];
    let mut evaluator = BatchEvaluator::new(ByteSum);
    let report = evaluator.evaluate(&genomes, &mut out).unwrap();

    assert_eq!(out, expected(&genomes));
    assert_eq!(report.evaluated, 64);
    assert!(!report.used_accelerator);
}

#[test]
fn length_mismatch_is_rejected() {
    let genomes = batch(3, 2);
    let mut out = vec![0.0; 2];
    let mut evaluator = BatchEvaluator::new(ByteSum);
    assert!(evaluator.evaluate(&genomes, &mut out).is_err());
}

#[test]
fn failing_accelerator_falls_back_to_cpu() {
    let genomes = batch(20, 3);
    let mut out = vec![0.0; 20];
    let mut evaluator =
        BatchEvaluator::new(ByteSum).with_accelerator(Box::new(FailingAccelerator));
    let report = evaluator.evaluate(&genomes, &mut out).unwrap();

    assert!(!report.used_accelerator);
    assert_eq!(out, expected(&genomes));
}

#[test]
fn working_accelerator_is_preferred() {
    let genomes = batch(4, 4);
    let mut out = vec![0.0; 4];
    let mut evaluator =
        BatchEvaluator::new(ByteSum).with_accelerator(Box::new(ConstantAccelerator(7.0)));
    let report = evaluator.evaluate(&genomes, &mut out).unwrap();

    assert!(report.used_accelerator);
    assert_eq!(out, vec![7.0; 4]);
}

#[test]
fn disabled_accelerator_is_skipped() {
    let genomes = batch(4, 5);
    let mut out = vec![0.0; 4];
    let mut evaluator =
        BatchEvaluator::new(ByteSum).with_accelerator(Box::new(ConstantAccelerator(7.0)));
    evaluator.set_enabled(false);
    let report = evaluator.evaluate(&genomes, &mut out).unwrap();

    assert!(!report.used_accelerator);
    assert_eq!(out, expected(&genomes));
}

#[test]
fn evaluate_population_scores_only_sentinels() {
    let mut population = build::population(vec![
        (vec![1, 1], None),
        (vec![2, 2], Some(123.0)),
        (vec![3, 3], None),
    ]);
    let mut evaluator = BatchEvaluator::new(ByteSum);
    let report = evaluator.evaluate_population(&mut population).unwrap();

    assert_eq!(report.evaluated, 2);
    assert_eq!(population.individuals[0].fitness, Some(2.0));
    assert_eq!(population.individuals[1].fitness, Some(123.0));
    assert_eq!(population.individuals[2].fitness, Some(6.0));
}

#[test]
fn invalid_genomes_stay_unevaluated() {
    let mut population = build::population(vec![
        (vec![0xff, 0], None),
        (vec![0x00, 0], None),
    ]);
    let mut evaluator = BatchEvaluator::new(RejectMarked);
    evaluator.evaluate_population(&mut population).unwrap();

    assert_eq!(population.individuals[0].fitness, None);
    assert_eq!(population.individuals[1].fitness, Some(1.0));
}
