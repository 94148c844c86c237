//! The temporal store buckets experiences by time period for bias-free regime adaptation
//!
//! Each context key owns a bounded, chronologically ordered ring of
//! buckets. The organic mean weighs every time period equally regardless
//! of how many samples it holds, which is what makes regime drift visible
//! instead of drowned out by busy periods.
use crate::errors::{EvoError, Result};
use crate::stats::{gaussian, WeightedArray, WeightedStats};
use chrono::{DateTime, Datelike, Duration, Months, Timelike, Utc};
use rand::Rng;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

/// Buckets needed for full confidence in an organic mean
const ORGANIC_CONFIDENCE_BUCKETS: usize = 10;
/// Trend slopes inside this band count as flat
const TREND_EPSILON: f64 = 0.01;

/// Time grain a bucket spans. Month and year are calendar-aware.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BucketGrain {
    Minute,
    Hour,
    Day,
    Week,
    Month,
    Year,
}

impl BucketGrain {
    /// Round a timestamp down to the start of its bucket
    pub fn floor(&self, t: DateTime<Utc>) -> DateTime<Utc> {
        let day = t
            .with_hour(0)
            .and_then(|t| t.with_minute(0))
            .and_then(|t| t.with_second(0))
            .and_then(|t| t.with_nanosecond(0))
            .unwrap_or(t);
        match self {
            BucketGrain::Minute => t
                .with_second(0)
                .and_then(|t| t.with_nanosecond(0))
                .unwrap_or(t),
            BucketGrain::Hour => t
                .with_minute(0)
                .and_then(|t| t.with_second(0))
                .and_then(|t| t.with_nanosecond(0))
                .unwrap_or(t),
            BucketGrain::Day => day,
            BucketGrain::Week => day - Duration::days(t.weekday().num_days_from_monday() as i64),
            BucketGrain::Month => day.with_day(1).unwrap_or(day),
            BucketGrain::Year => day
                .with_month(1)
                .and_then(|t| t.with_day(1))
                .unwrap_or(day),
        }
    }

    /// Exclusive end of the bucket starting at `start`
    pub fn end_of(&self, start: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            BucketGrain::Minute => start + Duration::minutes(1),
            BucketGrain::Hour => start + Duration::hours(1),
            BucketGrain::Day => start + Duration::days(1),
            BucketGrain::Week => start + Duration::weeks(1),
            BucketGrain::Month => start + Months::new(1),
            BucketGrain::Year => start + Months::new(12),
        }
    }

    /// Step a timestamp back by `count` bucket lengths
    pub fn back(&self, t: DateTime<Utc>, count: usize) -> DateTime<Utc> {
        match self {
            BucketGrain::Minute => t - Duration::minutes(count as i64),
            BucketGrain::Hour => t - Duration::hours(count as i64),
            BucketGrain::Day => t - Duration::days(count as i64),
            BucketGrain::Week => t - Duration::weeks(count as i64),
            BucketGrain::Month => t - Months::new(count as u32),
            BucketGrain::Year => t - Months::new(12 * count as u32),
        }
    }
}

/// Aggregated statistics for one time period
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TemporalBucket {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub complete: bool,
    pub params: WeightedArray,
    pub sample_count: u64,
    pub avg_fitness: f64,
    pub best_fitness: f64,
}

impl TemporalBucket {
    fn new(start: DateTime<Utc>, end: DateTime<Utc>, param_count: usize) -> Self {
        Self {
            start,
            end,
            complete: false,
            params: WeightedArray::new(param_count),
            sample_count: 0,
            avg_fitness: 0.0,
            best_fitness: f64::NEG_INFINITY,
        }
    }

    fn param_mean(&self, index: usize) -> f64 {
        self.params.get(index).map_or(0.0, |slot| slot.mean)
    }
}

/// Chronologically ordered bounded ring of buckets; the oldest is evicted
/// when the retention is reached.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TemporalSeries {
    pub buckets: Vec<TemporalBucket>,
}

impl TemporalSeries {
    pub fn len(&self) -> usize {
        self.buckets.len()
    }
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    fn bucket_for_mut(&mut self, start: DateTime<Utc>) -> Option<&mut TemporalBucket> {
        self.buckets.iter_mut().rev().find(|b| b.start == start)
    }

    fn push(&mut self, bucket: TemporalBucket, retention: usize) {
        if self.buckets.len() >= retention && !self.buckets.is_empty() {
            self.buckets.remove(0);
        }
        self.buckets.push(bucket);
    }
}

/// Trend classification, thresholded at ±0.01 slope
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TrendDirection {
    Rising,
    Falling,
    Flat,
}

impl TrendDirection {
    pub fn from_slope(slope: f64) -> Self {
        if slope > TREND_EPSILON {
            TrendDirection::Rising
        } else if slope < -TREND_EPSILON {
            TrendDirection::Falling
        } else {
            TrendDirection::Flat
        }
    }
}

/// Organic mean with its confidence
#[derive(Clone, Debug, PartialEq)]
pub struct OrganicMean {
    pub means: Vec<f64>,
    pub confidence: f64,
}

/// Keyed mapping from context keys to chronological bucket rings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TemporalSystem {
    grain: BucketGrain,
    param_count: usize,
    retention: usize,
    series: FxHashMap<String, TemporalSeries>,
}

impl TemporalSystem {
    pub fn new(grain: BucketGrain, param_count: usize, retention: usize) -> Result<Self> {
        if param_count == 0 {
            return Err(EvoError::InvalidArgument(
                "param_count must be at least 1".to_string(),
            ));
        }
        if retention < 2 {
            return Err(EvoError::InvalidArgument(
                "retention must be at least 2 buckets".to_string(),
            ));
        }
        Ok(Self {
            grain,
            param_count,
            retention,
            series: FxHashMap::default(),
        })
    }

    pub fn grain(&self) -> BucketGrain {
        self.grain
    }
    pub fn param_count(&self) -> usize {
        self.param_count
    }
    pub fn retention(&self) -> usize {
        self.retention
    }
    pub fn series(&self, key: &str) -> Option<&TemporalSeries> {
        self.series.get(key)
    }
    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.series.keys()
    }

    /// Fold one experience into the bucket containing `t`, weighting every
    /// parameter by the fitness. Buckets fully in the past of `t` are
    /// marked complete.
    pub fn learn(
        &mut self,
        key: &str,
        params: &[f64],
        fitness: f64,
        t: DateTime<Utc>,
    ) -> Result<()> {
        if params.len() != self.param_count {
            return Err(EvoError::InvalidArgument(format!(
                "{} params, system tracks {}",
                params.len(),
                self.param_count
            )));
        }
        let start = self.grain.floor(t);
        let end = self.grain.end_of(start);
        let series = self.series.entry(key.to_string()).or_default();

        if series.bucket_for_mut(start).is_none() {
            series.push(
                TemporalBucket::new(start, end, self.param_count),
                self.retention,
            );
        }
        let bucket = series
            .bucket_for_mut(start)
            .expect("bucket just ensured above");
        bucket.params.update(params, fitness);
        bucket.sample_count += 1;
        bucket.avg_fitness += (fitness - bucket.avg_fitness) / bucket.sample_count as f64;
        bucket.best_fitness = bucket.best_fitness.max(fitness);

        let duration = end - start;
        for bucket in series.buckets.iter_mut() {
            if bucket.end < t - duration {
                bucket.complete = true;
            }
        }
        Ok(())
    }

    /// Arithmetic mean across buckets of each parameter's bucket-mean,
    /// giving equal weight to every time period. Needs at least 2 buckets.
    pub fn organic_mean(&self, key: &str) -> Option<OrganicMean> {
        let series = self.series.get(key)?;
        if series.len() < 2 {
            return None;
        }
        let bucket_count = series.len() as f64;
        let means = (0..self.param_count)
            .map(|index| {
                series
                    .buckets
                    .iter()
                    .map(|b| b.param_mean(index))
                    .sum::<f64>()
                    / bucket_count
            })
            .collect();
        let confidence = (series.len() as f64 / ORGANIC_CONFIDENCE_BUCKETS as f64)
            .sqrt()
            .min(1.0);
        Some(OrganicMean { means, confidence })
    }

    /// Merge all bucket distributions, weighted by per-bucket sample mass
    pub fn weighted_mean(&self, key: &str) -> Option<Vec<f64>> {
        let merged = self.merged_stats(key)?;
        Some(merged.iter().map(|slot| slot.mean).collect())
    }

    fn merged_stats(&self, key: &str) -> Option<Vec<WeightedStats>> {
        let series = self.series.get(key)?;
        if series.is_empty() {
            return None;
        }
        let mut merged = vec![WeightedStats::default(); self.param_count];
        for bucket in &series.buckets {
            for (slot, theirs) in merged.iter_mut().zip(bucket.params.slots()) {
                slot.merge(theirs);
            }
        }
        Some(merged)
    }

    /// Per-parameter least-squares slope of bucket-means over bucket
    /// position. Needs at least 3 buckets; degenerate denominators yield a
    /// slope of zero.
    pub fn trend(&self, key: &str) -> Option<Vec<f64>> {
        let series = self.series.get(key)?;
        if series.len() < 3 {
            return None;
        }
        let n = series.len() as f64;
        let x_mean = (n - 1.0) / 2.0;
        let denominator: f64 = (0..series.len())
            .map(|x| (x as f64 - x_mean).powi(2))
            .sum();
        let slopes = (0..self.param_count)
            .map(|index| {
                if denominator == 0.0 {
                    return 0.0;
                }
                let y_mean = series
                    .buckets
                    .iter()
                    .map(|b| b.param_mean(index))
                    .sum::<f64>()
                    / n;
                let numerator: f64 = series
                    .buckets
                    .iter()
                    .enumerate()
                    .map(|(x, b)| (x as f64 - x_mean) * (b.param_mean(index) - y_mean))
                    .sum();
                numerator / denominator
            })
            .collect();
        Some(slopes)
    }

    pub fn trend_direction(&self, key: &str, param: usize) -> Option<TrendDirection> {
        let slopes = self.trend(key)?;
        slopes.get(param).copied().map(TrendDirection::from_slope)
    }

    /// Per-parameter drift of the last `recent` buckets against the rest:
    /// `mean(recent) − mean(historical)`
    pub fn compare_recent(&self, key: &str, recent: usize) -> Option<Vec<f64>> {
        let series = self.series.get(key)?;
        if recent == 0 || series.len() <= recent {
            return None;
        }
        let split = series.len() - recent;
        let drift = (0..self.param_count)
            .map(|index| {
                let historical = series.buckets[..split]
                    .iter()
                    .map(|b| b.param_mean(index))
                    .sum::<f64>()
                    / split as f64;
                let fresh = series.buckets[split..]
                    .iter()
                    .map(|b| b.param_mean(index))
                    .sum::<f64>()
                    / recent as f64;
                fresh - historical
            })
            .collect();
        Some(drift)
    }

    /// True when any drift component exceeds the threshold in magnitude
    pub fn detect_regime_change(&self, key: &str, recent: usize, threshold: f64) -> bool {
        match self.compare_recent(key, recent) {
            Some(drift) => drift.iter().any(|d| d.abs() > threshold),
            None => false,
        }
    }

    /// One draw per parameter from a Gaussian over the organic mean, with
    /// spread combining the cross-bucket std and the first bucket's sample
    /// std, blended toward uniform by the exploration factor.
    pub fn sample_organic<R: Rng>(
        &self,
        key: &str,
        exploration: f64,
        rng: &mut R,
    ) -> Option<Vec<f64>> {
        let organic = self.organic_mean(key)?;
        self.sample_around(key, &organic.means, exploration, rng)
    }

    /// As [sample_organic](TemporalSystem::sample_organic), biasing each
    /// mean by `slope × trend_strength` first.
    pub fn sample_trend<R: Rng>(
        &self,
        key: &str,
        trend_strength: f64,
        exploration: f64,
        rng: &mut R,
    ) -> Option<Vec<f64>> {
        let organic = self.organic_mean(key)?;
        let slopes = self.trend(key)?;
        let biased: Vec<f64> = organic
            .means
            .iter()
            .zip(slopes.iter())
            .map(|(mean, slope)| mean + slope * trend_strength)
            .collect();
        self.sample_around(key, &biased, exploration, rng)
    }

    fn sample_around<R: Rng>(
        &self,
        key: &str,
        centers: &[f64],
        exploration: f64,
        rng: &mut R,
    ) -> Option<Vec<f64>> {
        let series = self.series.get(key)?;
        let merged = self.merged_stats(key)?;
        let exploration = exploration.clamp(0.0, 1.0);
        let n = series.len() as f64;

        let draws = (0..self.param_count)
            .map(|index| {
                let bucket_mean_avg = series
                    .buckets
                    .iter()
                    .map(|b| b.param_mean(index))
                    .sum::<f64>()
                    / n;
                let cross_bucket_variance = series
                    .buckets
                    .iter()
                    .map(|b| (b.param_mean(index) - bucket_mean_avg).powi(2))
                    .sum::<f64>()
                    / n;
                let first_bucket_std = series.buckets[0]
                    .params
                    .get(index)
                    .map_or(0.0, |slot| slot.std());
                let std = cross_bucket_variance.sqrt() + first_bucket_std;
                let learned = centers[index] + std * gaussian(rng);
                let uniform = merged[index].uniform_draw(rng);
                (1.0 - exploration) * learned + exploration * uniform
            })
            .collect();
        Some(draws)
    }

    /// Drop buckets whose end predates `retention × duration` before `now`.
    /// Returns the number of buckets removed.
    pub fn prune(&mut self, now: DateTime<Utc>) -> usize {
        let cutoff = self.grain.back(now, self.retention);
        let mut removed = 0;
        for series in self.series.values_mut() {
            let before = series.buckets.len();
            series.buckets.retain(|b| b.end >= cutoff);
            removed += before - series.buckets.len();
        }
        self.series.retain(|_, series| !series.buckets.is_empty());
        removed
    }

    /// Human-readable JSON snapshot
    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    /// Symmetric counterpart of [save_json](TemporalSystem::save_json)
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }
}
