use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Daily OHLCV bar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    /// Daily turnover rate in percent, when the data source provides it
    #[serde(default)]
    pub turnover_rate: Option<f64>,
}

impl PriceBar {
    pub fn new(date: NaiveDate, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Self {
            date,
            open,
            high,
            low,
            close,
            volume,
            turnover_rate: None,
        }
    }

    pub fn with_turnover(mut self, turnover_rate: f64) -> Self {
        self.turnover_rate = Some(turnover_rate);
        self
    }

    /// Positive finite prices, `low <= {open, close} <= high`, finite non-negative volume.
    pub fn is_valid(&self) -> bool {
        let prices = [self.open, self.high, self.low, self.close];
        if prices.iter().any(|p| !p.is_finite() || *p <= 0.0) {
            return false;
        }
        if !self.volume.is_finite() || self.volume < 0.0 {
            return false;
        }
        self.low <= self.high
            && self.low <= self.open.min(self.close)
            && self.open.max(self.close) <= self.high
    }
}

/// Chronologically ascending, date-deduplicated bar sequence.
///
/// This is the ingestion boundary: malformed bars are dropped here so the
/// statistics code downstream can assume well-formed numbers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeSeries {
    bars: Vec<PriceBar>,
}

impl TimeSeries {
    /// Validate, sort and deduplicate `bars`. For duplicate dates the bar that
    /// appears last in the input wins.
    pub fn new(bars: Vec<PriceBar>) -> Self {
        let total = bars.len();
        let mut valid: Vec<PriceBar> = bars.into_iter().filter(PriceBar::is_valid).collect();
        let dropped = total - valid.len();
        if dropped > 0 {
            tracing::warn!("Dropped {} malformed bars out of {}", dropped, total);
        }

        // Stable sort keeps input order among equal dates
        valid.sort_by_key(|b| b.date);

        let mut deduped: Vec<PriceBar> = Vec::with_capacity(valid.len());
        for bar in valid {
            match deduped.last_mut() {
                Some(last) if last.date == bar.date => *last = bar,
                _ => deduped.push(bar),
            }
        }

        Self { bars: deduped }
    }

    pub fn bars(&self) -> &[PriceBar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    /// The trailing `n` bars (all of them if fewer).
    pub fn tail(&self, n: usize) -> &[PriceBar] {
        &self.bars[self.bars.len().saturating_sub(n)..]
    }

    pub fn last_close(&self) -> Option<f64> {
        self.bars.last().map(|b| b.close)
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.bars.first().map(|b| b.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.bars.last().map(|b| b.date)
    }

    /// Turnover observations carried on the bars, oldest first.
    pub fn turnover_rates(&self) -> Vec<f64> {
        self.bars.iter().filter_map(|b| b.turnover_rate).collect()
    }
}

impl From<Vec<PriceBar>> for TimeSeries {
    fn from(bars: Vec<PriceBar>) -> Self {
        TimeSeries::new(bars)
    }
}

/// Optional inputs that enrich the analysis but never block it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SupplementaryInputs {
    /// Daily turnover rates in percent, oldest first. Falls back to the bars'
    /// own `turnover_rate` when absent.
    #[serde(default)]
    pub turnover_rates: Option<Vec<f64>>,
    /// Share of float held by the ten largest holders, percent
    #[serde(default)]
    pub top10_concentration: Option<f64>,
    /// Period-over-period change in holder count, percent
    #[serde(default)]
    pub holder_count_change: Option<f64>,
}

impl SupplementaryInputs {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_turnover(mut self, rates: Vec<f64>) -> Self {
        self.turnover_rates = Some(rates);
        self
    }

    pub fn with_top10_concentration(mut self, pct: f64) -> Self {
        self.top10_concentration = Some(pct);
        self
    }

    pub fn with_holder_count_change(mut self, pct: f64) -> Self {
        self.holder_count_change = Some(pct);
        self
    }
}
