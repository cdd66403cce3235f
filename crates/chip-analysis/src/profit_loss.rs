use analysis_core::PriceBar;
use serde::{Deserialize, Serialize};

use crate::config::ChipConfig;

/// Percent of window volume priced below (profit) and above (loss) the
/// current price. Volume closing exactly at the current price is in neither.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProfitLossSplit {
    pub profit_ratio: f64,
    pub loss_ratio: f64,
}

impl ProfitLossSplit {
    pub fn zero() -> Self {
        Self {
            profit_ratio: 0.0,
            loss_ratio: 0.0,
        }
    }
}

/// Percentage deviation of `current_price` from the median cost. Zero when
/// `p50` is not positive.
pub fn chip_bias(current_price: f64, p50: f64) -> f64 {
    if p50 <= 0.0 {
        return 0.0;
    }
    (current_price - p50) / p50 * 100.0
}

#[derive(Debug, Clone)]
pub struct ProfitLossAnalyzer {
    /// Discount older sessions by `exp(-decay * age)`
    pub time_weighted: bool,
    pub decay: f64,
}

impl Default for ProfitLossAnalyzer {
    fn default() -> Self {
        Self::from_config(&ChipConfig::default())
    }
}

impl ProfitLossAnalyzer {
    pub fn from_config(config: &ChipConfig) -> Self {
        Self {
            time_weighted: config.time_weighted_profit,
            decay: config.profit_decay,
        }
    }

    pub fn split(&self, window: &[PriceBar], current_price: f64) -> ProfitLossSplit {
        let n = window.len();
        let weight = |i: usize, bar: &PriceBar| -> f64 {
            if self.time_weighted {
                let age = (n - 1 - i) as f64;
                bar.volume * (-self.decay * age).exp()
            } else {
                bar.volume
            }
        };

        let mut total = 0.0;
        let mut below = 0.0;
        let mut above = 0.0;
        for (i, bar) in window.iter().enumerate() {
            let w = weight(i, bar);
            total += w;
            if bar.close < current_price {
                below += w;
            } else if bar.close > current_price {
                above += w;
            }
        }

        if total <= 0.0 {
            return ProfitLossSplit::zero();
        }

        ProfitLossSplit {
            profit_ratio: (below / total * 100.0).clamp(0.0, 100.0),
            loss_ratio: (above / total * 100.0).clamp(0.0, 100.0),
        }
    }
}
