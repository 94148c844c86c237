//! Minimal INI-style configuration: `[section]` headers, `key = value`
//! lines, `#` and `;` comments
use crate::errors::{EvoError, Result};
use crate::meta::params::MetaParams;
use crate::negative::NegativeRegistry;
use crate::scheduler::AdaptiveScheduler;
use rustc_hash::FxHashMap;
use std::fs;
use std::path::Path;

/// Parsed section/key/value maps
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Ini {
    sections: FxHashMap<String, FxHashMap<String, String>>,
}

impl Ini {
    pub fn parse(input: &str) -> Result<Self> {
        let mut sections: FxHashMap<String, FxHashMap<String, String>> = FxHashMap::default();
        let mut current = String::new();

        for (line_number, raw_line) in input.lines().enumerate() {
            let line = raw_line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }
            if let Some(section) = line.strip_prefix('[') {
                let section = section.strip_suffix(']').ok_or_else(|| {
                    EvoError::Format(format!(
                        "line {}: unterminated section header",
                        line_number + 1
                    ))
                })?;
                current = section.trim().to_string();
                sections.entry(current.clone()).or_default();
                continue;
            }
            let (key, value) = line.split_once('=').ok_or_else(|| {
                EvoError::Format(format!("line {}: expected key = value", line_number + 1))
            })?;
            sections
                .entry(current.clone())
                .or_default()
                .insert(key.trim().to_string(), value.trim().to_string());
        }
        Ok(Self { sections })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Self::parse(&fs::read_to_string(path)?)
    }

    pub fn get(&self, section: &str, key: &str) -> Option<&str> {
        self.sections
            .get(section)
            .and_then(|keys| keys.get(key))
            .map(String::as_str)
    }

    pub fn get_f64(&self, section: &str, key: &str) -> Option<f64> {
        self.parsed(section, key)
    }

    pub fn get_usize(&self, section: &str, key: &str) -> Option<usize> {
        self.parsed(section, key)
    }

    fn parsed<T: std::str::FromStr>(&self, section: &str, key: &str) -> Option<T> {
        let raw = self.get(section, key)?;
        match raw.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                log::warn!("[{}] {} = {:?} failed to parse, ignored", section, key, raw);
                None
            }
        }
    }

    pub fn section_keys(&self, section: &str) -> impl Iterator<Item = &String> {
        self.sections.get(section).into_iter().flat_map(|s| s.keys())
    }
}

macro_rules! apply_f64 {
    ($ini:expr, $section:expr, $target:expr, $($key:ident),* $(,)?) => {
        $(if let Some(value) = $ini.get_f64($section, stringify!($key)) {
            $target.$key = value;
        })*
    };
}

macro_rules! apply_usize {
    ($ini:expr, $section:expr, $target:expr, $($key:ident),* $(,)?) => {
        $(if let Some(value) = $ini.get_usize($section, stringify!($key)) {
            $target.$key = value;
        })*
    };
}

/// Overlay the `[evolve]` section onto a parameter record, then validate
pub fn apply_params(ini: &Ini, params: &mut MetaParams) -> Result<()> {
    apply_f64!(
        ini,
        "evolve",
        params,
        mutation_rate,
        min_mutation_rate,
        optimization_mutation_rate,
        variance_mutation_rate,
        experimentation_rate,
        elite_ratio,
        cull_ratio,
        crossover_rate,
        exploration_factor,
        breeding_ratio_top,
        breeding_ratio_mid,
        breeding_ratio_bottom,
    );
    apply_usize!(
        ini,
        "evolve",
        params,
        tournament_size,
        target_population,
        min_population,
        max_population,
    );
    apply_f64!(
        ini,
        "meta",
        params,
        meta_mutation_rate,
        meta_learning_rate,
    );
    apply_f64!(
        ini,
        "negative",
        params,
        negative_similarity_threshold,
        negative_decay_rate,
        negative_repeat_multiplier,
    );
    params.validate()
}

/// Overlay the `[scheduler]` section onto a scheduler
pub fn apply_scheduler(ini: &Ini, scheduler: &mut AdaptiveScheduler) {
    apply_f64!(
        ini,
        "scheduler",
        scheduler,
        initial_mutation,
        min_mutation,
        decay_alpha,
        stagnation_boost,
        diversity_boost,
        min_diversity,
        stagnation_expansion,
    );
    apply_usize!(ini, "scheduler", scheduler, stagnation_threshold);
}

/// Build a negative registry from the `[negative]` section
pub fn build_negative_registry(ini: &Ini) -> NegativeRegistry {
    let capacity = ini.get_usize("negative", "capacity").unwrap_or(1000);
    let mut registry = NegativeRegistry::new(capacity);
    if let Some(threshold) = ini.get_f64("negative", "negative_similarity_threshold") {
        registry = registry.with_similarity_threshold(threshold);
    }
    if let Some(rate) = ini.get_f64("negative", "negative_decay_rate") {
        registry = registry.with_decay_rate(rate);
    }
    if let Some(multiplier) = ini.get_f64("negative", "negative_repeat_multiplier") {
        registry = registry.with_repeat_multiplier(multiplier);
    }
    registry
}
