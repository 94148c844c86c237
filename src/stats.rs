//! Numerically stable weighted statistics, the primitive under all learning stores
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Weights below this are floored to avoid division degeneracies
pub const MIN_WEIGHT: f64 = 1e-4;

/// Standard deviations below this collapse sampling to the mean
const MIN_STD: f64 = 1e-4;

/// Online weighted mean/variance/min/max for a single scalar, using West's
/// recurrence for numerical stability.
///
/// Invariants: `sum_weights >= 0`, `m2 >= 0`, and
/// `variance == m2 / sum_weights` once two or more samples are present.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WeightedStats {
    pub mean: f64,
    pub m2: f64,
    pub sum_weights: f64,
    pub sum_weighted: f64,
    pub count: usize,
    pub min: f64,
    pub max: f64,
}

impl WeightedStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reconstruct from the fields a persisted snapshot stores
    pub fn from_parts(mean: f64, variance: f64, sum_weights: f64, count: usize) -> Self {
        Self {
            mean,
            m2: variance * sum_weights,
            sum_weights,
            sum_weighted: mean * sum_weights,
            count,
            min: if count > 0 { mean } else { 0.0 },
            max: if count > 0 { mean } else { 0.0 },
        }
    }

    /// Fold one weighted observation in. Non-finite arguments are ignored
    /// and reported as `false`; weights below [MIN_WEIGHT] are floored.
    pub fn update(&mut self, value: f64, weight: f64) -> bool {
        if !value.is_finite() || !weight.is_finite() {
            return false;
        }
        let weight = weight.max(MIN_WEIGHT);

        let new_sum_weights = self.sum_weights + weight;
        let delta = value - self.mean;
        self.mean += (weight / new_sum_weights) * delta;
        self.m2 += self.sum_weights * weight * delta * delta / new_sum_weights;
        self.sum_weights = new_sum_weights;
        self.sum_weighted += weight * value;

        if self.count == 0 {
            self.min = value;
            self.max = value;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);
        }
        self.count += 1;
        true
    }

    pub fn variance(&self) -> f64 {
        if self.count >= 2 && self.sum_weights > 0.0 {
            self.m2 / self.sum_weights
        } else {
            0.0
        }
    }

    pub fn std(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn has_data(&self, min_samples: usize) -> bool {
        self.count >= min_samples
    }

    /// Confidence grows with the square root of the sample count, saturating
    /// at 1.0 once `max_samples` observations have been folded in.
    pub fn confidence(&self, max_samples: usize) -> f64 {
        if max_samples == 0 {
            return 0.0;
        }
        (self.count as f64 / max_samples as f64).sqrt().min(1.0)
    }

    /// One Gaussian draw from the current (mean, std) via Box-Muller.
    /// Degenerate spreads return the mean.
    pub fn sample<R: Rng>(&self, rng: &mut R) -> f64 {
        let std = self.std();
        if std < MIN_STD {
            return self.mean;
        }
        self.mean + std * gaussian(rng)
    }

    /// Combine another set into this one with the standard parallel
    /// recurrence, equivalent to having seen the other's samples in order.
    pub fn merge(&mut self, other: &WeightedStats) {
        if other.count == 0 {
            return;
        }
        if self.count == 0 {
            *self = other.clone();
            return;
        }
        let w1 = self.sum_weights;
        let w2 = other.sum_weights;
        let total = w1 + w2;
        let delta = other.mean - self.mean;
        self.m2 += other.m2 + w1 * w2 / total * delta * delta;
        self.mean = (w1 * self.mean + w2 * other.mean) / total;
        self.sum_weights = total;
        self.sum_weighted += other.sum_weighted;
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
        self.count += other.count;
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// A fixed-length sequence of [WeightedStats], one slot per tracked parameter.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WeightedArray {
    slots: Vec<WeightedStats>,
}

impl WeightedArray {
    pub fn new(param_count: usize) -> Self {
        Self {
            slots: vec![WeightedStats::default(); param_count],
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
    pub fn get(&self, index: usize) -> Option<&WeightedStats> {
        self.slots.get(index)
    }
    pub fn slots(&self) -> &[WeightedStats] {
        &self.slots
    }
    pub fn slots_mut(&mut self) -> &mut [WeightedStats] {
        &mut self.slots
    }

    /// Update every slot with its value at a shared fitness weight.
    /// Length mismatches are ignored and reported as `false`.
    pub fn update(&mut self, values: &[f64], fitness_weight: f64) -> bool {
        self.update_weighted(values, None, fitness_weight)
    }

    /// Update with optional per-parameter weights, multiplied by the global
    /// fitness weight.
    pub fn update_weighted(
        &mut self,
        values: &[f64],
        weights: Option<&[f64]>,
        fitness_weight: f64,
    ) -> bool {
        if values.len() != self.slots.len() {
            return false;
        }
        if let Some(weights) = weights {
            if weights.len() != values.len() {
                return false;
            }
        }
        for (index, slot) in self.slots.iter_mut().enumerate() {
            let weight = weights.map_or(1.0, |w| w[index]) * fitness_weight;
            slot.update(values[index], weight);
        }
        true
    }

    /// Draw one value per parameter, linearly blending the learned Gaussian
    /// with a uniform draw by the exploration factor. Slots with fewer than
    /// 3 samples fall back to the uniform draw.
    pub fn sample<R: Rng>(&self, exploration: f64, rng: &mut R) -> Vec<f64> {
        let exploration = exploration.clamp(0.0, 1.0);
        self.slots
            .iter()
            .map(|slot| {
                let uniform = slot.uniform_draw(rng);
                if slot.count < 3 {
                    uniform
                } else {
                    let learned = slot.sample(rng);
                    (1.0 - exploration) * learned + exploration * uniform
                }
            })
            .collect()
    }

    /// Sum of sample counts across slots
    pub fn total_count(&self) -> usize {
        self.slots.iter().map(|s| s.count).sum()
    }

    pub fn reset(&mut self) {
        self.slots.iter_mut().for_each(WeightedStats::reset);
    }

    /// Slot-wise parallel merge, lengths must match
    pub fn merge(&mut self, other: &WeightedArray) -> bool {
        if self.slots.len() != other.slots.len() {
            return false;
        }
        self.slots
            .iter_mut()
            .zip(other.slots.iter())
            .for_each(|(a, b)| a.merge(b));
        true
    }
}

impl WeightedStats {
    /// Uniform draw over the observed value range, or the unit interval
    /// before any observation exists.
    pub fn uniform_draw<R: Rng>(&self, rng: &mut R) -> f64 {
        if self.count == 0 {
            rng.gen::<f64>()
        } else if self.max <= self.min {
            self.min
        } else {
            rng.gen_range(self.min..=self.max)
        }
    }
}

/// One standard normal draw via Box-Muller
pub(crate) fn gaussian<R: Rng>(rng: &mut R) -> f64 {
    let u1: f64 = 1.0 - rng.gen::<f64>();
    let u2: f64 = rng.gen::<f64>();
    (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos()
}
