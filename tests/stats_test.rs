use approx::assert_abs_diff_eq;
use evocore::stats::{WeightedArray, WeightedStats, MIN_WEIGHT};
use rand::rngs::SmallRng;
use rand::SeedableRng;

#[test]
fn mean_matches_direct_weighted_computation() {
    let values = [1.5, -2.0, 7.25, 3.0, 0.5, -11.0, 4.75];
    let weights = [1.0, 0.5, 2.0, 0.25, 3.0, 1.5, 0.75];

    let mut stats = WeightedStats::new();
    for (value, weight) in values.iter().zip(weights.iter()) {
        assert!(stats.update(*value, *weight));
    }

    let weight_sum: f64 = weights.iter().sum();
    let expected: f64 = values
        .iter()
        .zip(weights.iter())
        .map(|(v, w)| v * w)
        .sum::<f64>()
        / weight_sum;
    let tolerance = 1e-9 * values.iter().fold(0.0f64, |acc, v| acc.max(v.abs()));

    assert_abs_diff_eq!(stats.mean, expected, epsilon = tolerance);
    assert!(stats.variance() >= 0.0);
    assert_eq!(stats.count, values.len());
    assert_abs_diff_eq!(stats.sum_weights, weight_sum, epsilon = 1e-12);
    assert_eq!(stats.min, -11.0);
    assert_eq!(stats.max, 7.25);
}

#[test]
fn merge_matches_sequential_updates() {
    let first = [(1.0, 1.0), (2.0, 0.5), (3.0, 2.0)];
    let second = [(10.0, 1.5), (-4.0, 0.25), (6.5, 1.0), (0.0, 2.0)];

    let mut merged = WeightedStats::new();
    for (value, weight) in first {
        merged.update(value, weight);
    }
    let mut other = WeightedStats::new();
    for (value, weight) in second {
        other.update(value, weight);
    }
    merged.merge(&other);

    let mut sequential = WeightedStats::new();
    for (value, weight) in first.iter().chain(second.iter()) {
        sequential.update(*value, *weight);
    }

    assert_abs_diff_eq!(merged.mean, sequential.mean, epsilon = 1e-9);
    assert_abs_diff_eq!(merged.variance(), sequential.variance(), epsilon = 1e-9);
    assert_eq!(merged.count, sequential.count);
}

#[test]
fn merge_into_empty_copies_source() {
    let mut source = WeightedStats::new();
    source.update(4.0, 2.0);
    source.update(8.0, 2.0);

    let mut target = WeightedStats::new();
    target.merge(&source);
    assert_eq!(target.mean, source.mean);
    assert_eq!(target.count, source.count);
}

#[test]
fn variance_needs_two_samples() {
    let mut stats = WeightedStats::new();
    stats.update(42.0, 1.0);
    assert_eq!(stats.variance(), 0.0);
    stats.update(43.0, 1.0);
    assert!(stats.variance() > 0.0);
}

#[test]
fn weight_floor_applies() {
    let mut stats = WeightedStats::new();
    stats.update(1.0, -5.0);
    assert_eq!(stats.sum_weights, MIN_WEIGHT);
}

#[test]
fn confidence_saturates_at_one() {
    let mut stats = WeightedStats::new();
    for _ in 0..200 {
        stats.update(1.0, 1.0);
    }
    assert_eq!(stats.confidence(100), 1.0);

    let mut sparse = WeightedStats::new();
    sparse.update(1.0, 1.0);
    assert_abs_diff_eq!(sparse.confidence(100), 0.1, epsilon = 1e-12);
}

#[test]
fn has_data_thresholds() {
    let mut stats = WeightedStats::new();
    assert!(!stats.has_data(1));
    stats.update(0.0, 1.0);
    assert!(stats.has_data(1));
    assert!(!stats.has_data(2));
}

#[test]
fn array_update_rejects_length_mismatch() {
    let mut array = WeightedArray::new(3);
    assert!(!array.update(&[1.0, 2.0], 1.0));
    assert_eq!(array.total_count(), 0);
    assert!(array.update(&[1.0, 2.0, 3.0], 1.0));
    assert_eq!(array.total_count(), 3);
}

#[test]
fn array_per_parameter_weights_multiply_fitness() {
    let mut array = WeightedArray::new(2);
    array.update_weighted(&[1.0, 1.0], Some(&[1.0, 3.0]), 2.0);
    assert_abs_diff_eq!(
        array.get(0).unwrap().sum_weights,
        2.0,
        epsilon = 1e-12
    );
    assert_abs_diff_eq!(
        array.get(1).unwrap().sum_weights,
        6.0,
        epsilon = 1e-12
    );
}

#[test]
fn array_sample_falls_back_to_uniform_with_sparse_data() {
    let mut array = WeightedArray::new(1);
    array.update(&[5.0], 1.0);
    array.update(&[6.0], 1.0);

    let mut rng = SmallRng::seed_from_u64(7);
    // two samples only: uniform fallback over the observed range
    for _ in 0..50 {
        let draw = array.sample(0.0, &mut rng)[0];
        assert!((5.0..=6.0).contains(&draw));
    }
}

#[test]
fn array_sample_tracks_learned_mean_without_exploration() {
    let mut array = WeightedArray::new(1);
    for _ in 0..100 {
        array.update(&[10.0], 1.0);
    }
    let mut rng = SmallRng::seed_from_u64(0);
    let draw = array.sample(0.0, &mut rng)[0];
    assert_abs_diff_eq!(draw, 10.0, epsilon = 1e-9);
}
