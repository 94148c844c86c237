use evocore::config::{apply_params, apply_scheduler, build_negative_registry, Ini};
use evocore::meta::params::MetaParams;
use evocore::scheduler::AdaptiveScheduler;

const SAMPLE: &str = r"
# global comment
[evolve]
mutation_rate = 0.2
target_population = 150
tournament_size = 5

; another comment style
[scheduler]
stagnation_threshold = 40
stagnation_boost = 2.5

[negative]
capacity = 64
negative_decay_rate = 0.05

[meta]
meta_learning_rate = 0.3
";

#[test]
fn parses_sections_keys_and_comments() {
    let ini = Ini::parse(SAMPLE).unwrap();
    assert_eq!(ini.get("evolve", "mutation_rate"), Some("0.2"));
    assert_eq!(ini.get("evolve", "target_population"), Some("150"));
    assert_eq!(ini.get("scheduler", "stagnation_threshold"), Some("40"));
    assert_eq!(ini.get("negative", "capacity"), Some("64"));
    assert_eq!(ini.get("evolve", "missing"), None);
    assert_eq!(ini.get("missing", "mutation_rate"), None);
}

#[test]
fn rejects_malformed_lines() {
    assert!(Ini::parse("[unterminated\n").is_err());
    assert!(Ini::parse("keyword without equals\n").is_err());
}

#[test]
fn unparsable_values_are_ignored() {
    let ini = Ini::parse("[evolve]\nmutation_rate = banana\n").unwrap();
    assert_eq!(ini.get_f64("evolve", "mutation_rate"), None);
    assert_eq!(ini.get("evolve", "mutation_rate"), Some("banana"));
}

#[test]
fn apply_params_overlays_and_validates() {
    let ini = Ini::parse(SAMPLE).unwrap();
    let mut params = MetaParams::default();
    apply_params(&ini, &mut params).unwrap();

    assert_eq!(params.mutation_rate, 0.2);
    assert_eq!(params.target_population, 150);
    assert_eq!(params.tournament_size, 5);
    assert_eq!(params.meta_learning_rate, 0.3);
    assert_eq!(params.negative_decay_rate, 0.05);
    // untouched fields keep their defaults
    assert_eq!(params.cull_ratio, MetaParams::default().cull_ratio);
}

#[test]
fn apply_params_rejects_out_of_range_overrides() {
    let ini = Ini::parse("[evolve]\nmutation_rate = 7.0\n").unwrap();
    let mut params = MetaParams::default();
    assert!(apply_params(&ini, &mut params).is_err());
}

#[test]
fn apply_scheduler_overlays_fields() {
    let ini = Ini::parse(SAMPLE).unwrap();
    let mut scheduler = AdaptiveScheduler::new(100, 100, 20);
    apply_scheduler(&ini, &mut scheduler);
    assert_eq!(scheduler.stagnation_threshold, 40);
    assert_eq!(scheduler.stagnation_boost, 2.5);
}

#[test]
fn negative_registry_from_ini() {
    let ini = Ini::parse(SAMPLE).unwrap();
    let registry = build_negative_registry(&ini);
    assert_eq!(registry.capacity(), 64);
    assert_eq!(registry.decay_rate(), 0.05);

    let default_registry = build_negative_registry(&Ini::default());
    assert_eq!(default_registry.capacity(), 1000);
}

#[test]
fn load_reads_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("evocore.ini");
    std::fs::write(&path, SAMPLE).unwrap();
    let ini = Ini::load(&path).unwrap();
    assert_eq!(ini.get("evolve", "tournament_size"), Some("5"));
}
