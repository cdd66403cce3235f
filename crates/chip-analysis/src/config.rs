use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt::Display;
use std::str::FromStr;

use crate::scoring::MarketCondition;

/// Where cost percentiles are read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PercentileSource {
    /// Weighted order statistics over the window's `(close, volume)` pairs
    #[default]
    CloseVolume,
    /// Interpolated from the decayed simulator buckets
    Distribution,
}

impl FromStr for PercentileSource {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "close_volume" | "close" => Ok(PercentileSource::CloseVolume),
            "distribution" | "buckets" => Ok(PercentileSource::Distribution),
            other => bail!("unknown percentile source '{}'", other),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChipConfig {
    // Simulation
    pub window: usize,              // 60 trailing bars
    pub min_bars: usize,            // 30
    pub decay_factor: f64,          // 0.05 per session
    pub bucket_count: usize,        // 20
    pub close_weight: f64,          // share of daily volume pinned to the close bucket

    // Statistics
    pub percentile_source: PercentileSource,

    // Pattern classification
    pub pattern_bins: usize,        // 10
    pub peak_threshold: f64,        // peaks must exceed 0.8 x mean bin
    pub bottom_band_pct: f64,       // lowest 20% of the range
    pub lock_long_window: usize,    // 60
    pub lock_short_window: usize,   // 20
    pub lock_min_ratio: f64,        // 0.15
    pub lock_retention: f64,        // 0.7

    // Profit / loss
    pub time_weighted_profit: bool,
    pub profit_decay: f64,          // exp(-0.05 * age)

    // Scoring
    pub turnover_lookback: usize,   // mean of last 5 observations
    pub market_condition: MarketCondition,

    // Trend-mode scorer
    pub trend_window: usize,        // 120
    pub clamp_trend_scores: bool,
}

impl Default for ChipConfig {
    fn default() -> Self {
        Self {
            window: 60,
            min_bars: 30,
            decay_factor: 0.05,
            bucket_count: 20,
            close_weight: 0.5,
            percentile_source: PercentileSource::CloseVolume,
            pattern_bins: 10,
            peak_threshold: 0.8,
            bottom_band_pct: 0.2,
            lock_long_window: 60,
            lock_short_window: 20,
            lock_min_ratio: 0.15,
            lock_retention: 0.7,
            time_weighted_profit: false,
            profit_decay: 0.05,
            turnover_lookback: 5,
            market_condition: MarketCondition::Normal,
            trend_window: 120,
            clamp_trend_scores: true,
        }
    }
}

fn env_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("{}", e))
            .with_context(|| format!("invalid value for {}: '{}'", key, raw)),
        Err(_) => Ok(default),
    }
}

impl ChipConfig {
    /// Load from `CHIP_*` environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self> {
        let d = Self::default();
        let config = Self {
            window: env_or("CHIP_WINDOW", d.window)?,
            min_bars: env_or("CHIP_MIN_BARS", d.min_bars)?,
            decay_factor: env_or("CHIP_DECAY_FACTOR", d.decay_factor)?,
            bucket_count: env_or("CHIP_BUCKET_COUNT", d.bucket_count)?,
            close_weight: env_or("CHIP_CLOSE_WEIGHT", d.close_weight)?,
            percentile_source: env_or("CHIP_PERCENTILE_SOURCE", d.percentile_source)?,
            pattern_bins: env_or("CHIP_PATTERN_BINS", d.pattern_bins)?,
            peak_threshold: env_or("CHIP_PEAK_THRESHOLD", d.peak_threshold)?,
            bottom_band_pct: env_or("CHIP_BOTTOM_BAND_PCT", d.bottom_band_pct)?,
            lock_long_window: env_or("CHIP_LOCK_LONG_WINDOW", d.lock_long_window)?,
            lock_short_window: env_or("CHIP_LOCK_SHORT_WINDOW", d.lock_short_window)?,
            lock_min_ratio: env_or("CHIP_LOCK_MIN_RATIO", d.lock_min_ratio)?,
            lock_retention: env_or("CHIP_LOCK_RETENTION", d.lock_retention)?,
            time_weighted_profit: env_or("CHIP_TIME_WEIGHTED_PROFIT", d.time_weighted_profit)?,
            profit_decay: env_or("CHIP_PROFIT_DECAY", d.profit_decay)?,
            turnover_lookback: env_or("CHIP_TURNOVER_LOOKBACK", d.turnover_lookback)?,
            market_condition: env_or("CHIP_MARKET_CONDITION", d.market_condition)?,
            trend_window: env_or("CHIP_TREND_WINDOW", d.trend_window)?,
            clamp_trend_scores: env_or("CHIP_CLAMP_TREND_SCORES", d.clamp_trend_scores)?,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.min_bars == 0 {
            bail!("min_bars must be at least 1");
        }
        if self.window < self.min_bars {
            bail!("window ({}) must be >= min_bars ({})", self.window, self.min_bars);
        }
        if self.decay_factor <= 0.0 || self.decay_factor >= 1.0 {
            bail!("decay_factor must be in (0, 1)");
        }
        if self.bucket_count == 0 {
            bail!("bucket_count must be at least 1");
        }
        if !(0.0..=1.0).contains(&self.close_weight) {
            bail!("close_weight must be between 0 and 1");
        }
        if self.pattern_bins < 3 {
            bail!("pattern_bins must be at least 3 to detect local maxima");
        }
        if self.peak_threshold < 0.0 {
            bail!("peak_threshold must be >= 0");
        }
        if self.bottom_band_pct <= 0.0 || self.bottom_band_pct >= 1.0 {
            bail!("bottom_band_pct must be in (0, 1)");
        }
        if self.lock_short_window == 0 || self.lock_short_window > self.lock_long_window {
            bail!("lock_short_window must be in 1..=lock_long_window");
        }
        if self.profit_decay < 0.0 {
            bail!("profit_decay must be >= 0");
        }
        if self.turnover_lookback == 0 {
            bail!("turnover_lookback must be at least 1");
        }
        if self.trend_window < self.min_bars {
            bail!("trend_window ({}) must be >= min_bars ({})", self.trend_window, self.min_bars);
        }
        Ok(())
    }
}
