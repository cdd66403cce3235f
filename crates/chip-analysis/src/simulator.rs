//! Decay-accumulation chip distribution.
//!
//! Every session first erodes all resting chips by `decay_factor`, then lays
//! the day's volume over the buckets its range touched. What is left at the
//! end approximates where outstanding shares sit by cost.

use analysis_core::{AnalysisError, PriceBar};
use serde::{Deserialize, Serialize};

use crate::config::ChipConfig;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChipBucket {
    /// Lower edge of the bucket's price interval
    pub price_level: f64,
    /// Accumulated, decayed volume
    pub weight: f64,
}

/// Ordered buckets spanning `[price_low, price_high]` of the simulated window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChipDistribution {
    pub buckets: Vec<ChipBucket>,
    pub bucket_width: f64,
    pub price_low: f64,
    pub price_high: f64,
    pub bars_used: usize,
}

impl ChipDistribution {
    fn empty(price_low: f64, price_high: f64, bucket_count: usize) -> Self {
        let range = price_high - price_low;
        // Zero range collapses to a single bucket
        let (n, width) = if range > 0.0 {
            (bucket_count.max(1), range / bucket_count.max(1) as f64)
        } else {
            (1, 0.0)
        };

        let buckets = (0..n)
            .map(|i| ChipBucket {
                price_level: price_low + i as f64 * width,
                weight: 0.0,
            })
            .collect();

        Self {
            buckets,
            bucket_width: width,
            price_low,
            price_high,
            bars_used: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn weights(&self) -> Vec<f64> {
        self.buckets.iter().map(|b| b.weight).collect()
    }

    pub fn total_weight(&self) -> f64 {
        self.buckets.iter().map(|b| b.weight).sum()
    }

    /// Zero price range or nothing traded.
    pub fn is_degenerate(&self) -> bool {
        self.bucket_width <= 0.0 || self.total_weight() <= 0.0
    }

    /// Bucket holding `price`, clamped into range. The top edge belongs to
    /// the last bucket.
    pub fn bucket_index(&self, price: f64) -> usize {
        if self.bucket_width <= 0.0 {
            return 0;
        }
        let idx = ((price - self.price_low) / self.bucket_width).floor();
        if idx <= 0.0 {
            0
        } else {
            (idx as usize).min(self.buckets.len() - 1)
        }
    }

    /// `(low, high)` price bounds of bucket `idx`.
    pub fn bucket_bounds(&self, idx: usize) -> (f64, f64) {
        let low = self.price_low + idx as f64 * self.bucket_width;
        (low, low + self.bucket_width)
    }

    /// Fraction (0-1) of the total weight resting below `price`. The bucket
    /// straddling `price` contributes linearly by how much of it lies below.
    pub fn weight_below(&self, price: f64) -> f64 {
        let total = self.total_weight();
        if total <= 0.0 {
            return 0.0;
        }

        if self.bucket_width <= 0.0 {
            return if price > self.price_low { 1.0 } else { 0.0 };
        }

        let below: f64 = self
            .buckets
            .iter()
            .enumerate()
            .map(|(i, b)| {
                let (low, high) = self.bucket_bounds(i);
                let covered = ((price - low) / (high - low)).clamp(0.0, 1.0);
                b.weight * covered
            })
            .sum();
        below / total
    }
}

/// Builds a [`ChipDistribution`] from a chronological window of bars.
#[derive(Debug, Clone)]
pub struct ChipDistributionSimulator {
    pub decay_factor: f64,
    pub bucket_count: usize,
    /// Share of each day's volume pinned to the bucket containing the close
    pub close_weight: f64,
    pub min_bars: usize,
}

impl Default for ChipDistributionSimulator {
    fn default() -> Self {
        Self::from_config(&ChipConfig::default())
    }
}

impl ChipDistributionSimulator {
    pub fn new(decay_factor: f64, bucket_count: usize) -> Self {
        Self {
            decay_factor,
            bucket_count,
            ..Self::default()
        }
    }

    pub fn from_config(config: &ChipConfig) -> Self {
        Self {
            decay_factor: config.decay_factor,
            bucket_count: config.bucket_count,
            close_weight: config.close_weight,
            min_bars: config.min_bars,
        }
    }

    /// Remaining fraction of a bar's volume after `age` further sessions.
    pub fn retention(&self, age: usize) -> f64 {
        (1.0 - self.decay_factor).powi(age as i32)
    }

    /// Run the decay-accumulation model over `window` (oldest first).
    pub fn simulate(&self, window: &[PriceBar]) -> Result<ChipDistribution, AnalysisError> {
        if window.len() < self.min_bars {
            tracing::debug!(
                "Chip simulation skipped: {} bars, need {}",
                window.len(),
                self.min_bars
            );
            return Err(AnalysisError::insufficient(self.min_bars, window.len()));
        }

        let price_low = window.iter().map(|b| b.low).fold(f64::INFINITY, f64::min);
        let price_high = window.iter().map(|b| b.high).fold(f64::NEG_INFINITY, f64::max);

        let mut dist = ChipDistribution::empty(price_low, price_high, self.bucket_count);
        let keep = 1.0 - self.decay_factor;

        for bar in window {
            for bucket in dist.buckets.iter_mut() {
                bucket.weight *= keep;
            }
            self.spread_volume(&mut dist, bar);
        }
        dist.bars_used = window.len();

        if dist.bucket_width <= 0.0 {
            tracing::debug!("Zero price range in window, collapsed to one bucket at {}", price_low);
        }

        Ok(dist)
    }

    fn spread_volume(&self, dist: &mut ChipDistribution, bar: &PriceBar) {
        if bar.volume <= 0.0 {
            return;
        }

        let first = dist.bucket_index(bar.low);
        let last = dist.bucket_index(bar.high);
        let close_idx = dist.bucket_index(bar.close);

        let covered = (last - first + 1) as f64;
        let per_bucket = bar.volume * (1.0 - self.close_weight) / covered;

        for bucket in &mut dist.buckets[first..=last] {
            bucket.weight += per_bucket;
        }
        dist.buckets[close_idx].weight += bar.volume * self.close_weight;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::{Duration, NaiveDate};

    fn bars_from(points: &[(f64, f64, f64, f64)]) -> Vec<PriceBar> {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        points
            .iter()
            .enumerate()
            .map(|(i, &(high, low, close, volume))| {
                PriceBar::new(start + Duration::days(i as i64), close, high, low, close, volume)
            })
            .collect()
    }

    fn sim(decay: f64, buckets: usize) -> ChipDistributionSimulator {
        ChipDistributionSimulator {
            decay_factor: decay,
            bucket_count: buckets,
            close_weight: 0.5,
            min_bars: 1,
        }
    }

    #[test]
    fn test_insufficient_bars() {
        let simulator = ChipDistributionSimulator::default();
        let bars = bars_from(&vec![(11.0, 9.0, 10.0, 100.0); 29]);
        let err = simulator.simulate(&bars).unwrap_err();
        assert_eq!(err, AnalysisError::InsufficientData { required: 30, actual: 29 });
    }

    #[test]
    fn test_buckets_span_range_and_increase() {
        let bars = bars_from(&[(12.0, 10.0, 11.0, 100.0), (20.0, 15.0, 18.0, 100.0)]);
        let dist = sim(0.05, 10).simulate(&bars).unwrap();

        assert_eq!(dist.len(), 10);
        assert_relative_eq!(dist.price_low, 10.0);
        assert_relative_eq!(dist.price_high, 20.0);
        assert_relative_eq!(dist.bucket_width, 1.0);
        assert!(dist
            .buckets
            .windows(2)
            .all(|w| w[1].price_level > w[0].price_level));
    }

    #[test]
    fn test_zero_range_collapses() {
        let bars = bars_from(&vec![(10.0, 10.0, 10.0, 100.0); 5]);
        let dist = sim(0.05, 20).simulate(&bars).unwrap();
        assert_eq!(dist.len(), 1);
        assert_relative_eq!(dist.buckets[0].price_level, 10.0);
        assert!(dist.total_weight() > 0.0);
        assert!(dist.is_degenerate());
    }

    #[test]
    fn test_single_bar_spread() {
        // Range 10..20 in 10 buckets; bar covers 12..14 (buckets 2,3,4), closes in 3
        let bars = bars_from(&[(20.0, 10.0, 15.0, 0.0), (14.0, 12.0, 13.5, 90.0)]);
        let dist = sim(0.1, 10).simulate(&bars).unwrap();

        // 45 pinned to close bucket, 45 spread over three buckets
        assert_relative_eq!(dist.buckets[2].weight, 15.0, epsilon = 1e-9);
        assert_relative_eq!(dist.buckets[3].weight, 60.0, epsilon = 1e-9);
        assert_relative_eq!(dist.buckets[4].weight, 15.0, epsilon = 1e-9);
        assert_relative_eq!(dist.total_weight(), 90.0, epsilon = 1e-9);
    }

    #[test]
    fn test_decay_applies_before_accumulation() {
        let bars = bars_from(&[(10.0, 10.0, 10.0, 100.0), (10.0, 10.0, 10.0, 100.0)]);
        let dist = sim(0.1, 5).simulate(&bars).unwrap();
        // first day's 100 decays once, second day's 100 is fresh
        assert_relative_eq!(dist.total_weight(), 190.0, epsilon = 1e-9);
    }

    #[test]
    fn test_retention() {
        let simulator = ChipDistributionSimulator::new(0.05, 10);
        assert_eq!(simulator.close_weight, 0.5);
        assert_relative_eq!(simulator.retention(0), 1.0);
        assert_relative_eq!(simulator.retention(2), 0.9025, epsilon = 1e-12);
    }

    #[test]
    fn test_higher_decay_discounts_older_bars() {
        // 30 old sessions around 10, then 30 recent sessions around 20
        let mut points = vec![(11.0, 9.0, 10.0, 1000.0); 30];
        points.extend(vec![(21.0, 19.0, 20.0, 1000.0); 30]);
        let bars = bars_from(&points);

        let old_share = |decay: f64| sim(decay, 12).simulate(&bars).unwrap().weight_below(15.0);

        let slow = old_share(0.01);
        let medium = old_share(0.05);
        let fast = old_share(0.15);
        assert!(slow > medium);
        assert!(medium > fast);
    }

    #[test]
    fn test_weight_below_interpolates() {
        // One bar over the whole 10..20 range, evenly spread
        let simulator = ChipDistributionSimulator {
            close_weight: 0.0,
            ..sim(0.05, 10)
        };
        let bars = bars_from(&[(20.0, 10.0, 15.0, 100.0)]);
        let dist = simulator.simulate(&bars).unwrap();

        assert_relative_eq!(dist.weight_below(15.0), 0.5, epsilon = 1e-9);
        assert_relative_eq!(dist.weight_below(12.5), 0.25, epsilon = 1e-9);
        assert_relative_eq!(dist.weight_below(5.0), 0.0);
        assert_relative_eq!(dist.weight_below(25.0), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_bucket_index_clamps() {
        let bars = bars_from(&[(20.0, 10.0, 15.0, 100.0)]);
        let dist = sim(0.05, 10).simulate(&bars).unwrap();
        assert_eq!(dist.bucket_index(5.0), 0);
        assert_eq!(dist.bucket_index(20.0), 9);
        assert_eq!(dist.bucket_index(25.0), 9);
        assert_eq!(dist.bucket_index(12.5), 2);
    }
}
