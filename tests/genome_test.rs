use evocore::genome::Genome;
use rand::rngs::SmallRng;
use rand::SeedableRng;

#[test]
fn read_write_round_trip() {
    let mut genome = Genome::new(8);
    genome.write(2, &[0xaa, 0xbb, 0xcc]).unwrap();

    let mut buf = [0u8; 3];
    genome.read(2, &mut buf).unwrap();
    assert_eq!(buf, [0xaa, 0xbb, 0xcc]);
}

#[test]
fn read_past_end_is_rejected() {
    let genome = Genome::new(4);
    let mut buf = [0u8; 2];
    assert!(genome.read(3, &mut buf).is_err());
    assert!(genome.read(usize::MAX, &mut buf).is_err());
}

#[test]
fn write_past_end_leaves_genome_unchanged() {
    let mut genome = Genome::new(4);
    assert!(genome.write(3, &[1, 2]).is_err());
    assert_eq!(genome.bytes(), &[0, 0, 0, 0]);
}

#[test]
fn set_size_respects_capacity() {
    let mut genome = Genome::new(8);
    genome.set_size(4).unwrap();
    assert_eq!(genome.len(), 4);
    genome.set_size(8).unwrap();
    assert_eq!(genome.len(), 8);
    assert!(genome.set_size(genome.capacity() + 1).is_err());
}

#[test]
fn hamming_distance_counts_differing_bytes() {
    let a = Genome::from_bytes(&[1, 2, 3, 4]);
    let b = Genome::from_bytes(&[1, 9, 3, 9]);
    assert_eq!(a.hamming_distance(&b), 2);
    assert_eq!(a.similarity(&b), 0.5);
    assert_eq!(a.similarity(&a), 1.0);
}

#[test]
fn similarity_of_empty_genome_is_zero() {
    let a = Genome::from_bytes(&[]);
    let b = Genome::from_bytes(&[1, 2]);
    assert_eq!(a.similarity(&b), 0.0);
}

#[test]
fn crossover_children_xor_equals_parents_xor() {
    let mut rng = SmallRng::seed_from_u64(0);
    let parent_a = Genome::random(64, &mut rng);
    let parent_b = Genome::random(64, &mut rng);

    let (child_a, child_b) = Genome::crossover_uniform(&parent_a, &parent_b, &mut rng);

    for index in 0..64 {
        let parents_xor = parent_a.bytes()[index] ^ parent_b.bytes()[index];
        let children_xor = child_a.bytes()[index] ^ child_b.bytes()[index];
        assert_eq!(parents_xor, children_xor);
    }
}

#[test]
fn crossover_children_take_minimum_parent_size() {
    let mut rng = SmallRng::seed_from_u64(1);
    let parent_a = Genome::random(10, &mut rng);
    let parent_b = Genome::random(6, &mut rng);

    let (child_a, child_b) = Genome::crossover_uniform(&parent_a, &parent_b, &mut rng);
    assert_eq!(child_a.len(), 6);
    assert_eq!(child_b.len(), 6);
}

#[test]
fn crossover_actually_mixes() {
    let mut rng = SmallRng::seed_from_u64(2);
    let parent_a = Genome::from_bytes(&[0x00; 32]);
    let parent_b = Genome::from_bytes(&[0xff; 32]);

    let (child_a, _) = Genome::crossover_uniform(&parent_a, &parent_b, &mut rng);
    let zeros = child_a.bytes().iter().filter(|&&b| b == 0x00).count();
    assert!(zeros > 0 && zeros < 32);
}

#[test]
fn mutation_at_full_rate_changes_nearly_every_byte() {
    let mut rng = SmallRng::seed_from_u64(42);
    let original = Genome::new(10_000);
    let mut mutated = original.clone();
    mutated.mutate(1.0, &mut rng);

    let changed = original.hamming_distance(&mutated);
    // expect ~255/256 of bytes changed (a random byte can equal the old one)
    assert!(changed > 9_800);
    assert!(changed < 10_000);
}

#[test]
fn mutation_at_zero_rate_changes_nothing() {
    let mut rng = SmallRng::seed_from_u64(42);
    let original = Genome::random(1_000, &mut rng);
    let mut mutated = original.clone();
    mutated.mutate(0.0, &mut rng);
    assert_eq!(original, mutated);
}

#[test]
fn randomize_fills_buffer() {
    let mut rng = SmallRng::seed_from_u64(3);
    let mut genome = Genome::new(256);
    genome.randomize(&mut rng);
    assert!(genome.bytes().iter().any(|&b| b != 0));
}

#[test]
fn hex_rendering() {
    let genome = Genome::from_bytes(&[0x00, 0xff, 0x1a]);
    assert_eq!(genome.to_hex(), "00ff1a");
}
