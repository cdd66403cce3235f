//! Lightweight two-mode rubric over win ratio, SCR and bias.

use analysis_core::math::round1;
use anyhow::bail;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScoringMode {
    /// Trend following, score on `[0, 100]`
    Trend,
    /// Bottom fishing, score on `[0, 10]`
    BottomFish,
}

impl ScoringMode {
    pub fn max_score(&self) -> f64 {
        match self {
            ScoringMode::Trend => 100.0,
            ScoringMode::BottomFish => 10.0,
        }
    }
}

impl FromStr for ScoringMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "trend" => Ok(ScoringMode::Trend),
            "bottom_fish" | "bottom" => Ok(ScoringMode::BottomFish),
            other => bail!("unknown scoring mode '{}'", other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrendInputs {
    /// Percent of chips in profit
    pub win_pct: f64,
    pub scr: f64,
    pub bias: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendScore {
    pub mode: ScoringMode,
    pub score: f64,
    pub reasons: Vec<String>,
    pub inputs: TrendInputs,
}

#[derive(Debug, Clone)]
pub struct TrendModeScorer {
    /// Hold TREND to `[0, 100]` and BOTTOM_FISH to `[0, 10]`
    pub clamp: bool,
}

impl Default for TrendModeScorer {
    fn default() -> Self {
        Self { clamp: true }
    }
}

impl TrendModeScorer {
    pub fn new(clamp: bool) -> Self {
        Self { clamp }
    }

    pub fn score(&self, inputs: TrendInputs, mode: ScoringMode) -> TrendScore {
        let (raw, reasons) = match mode {
            ScoringMode::Trend => Self::trend(&inputs),
            ScoringMode::BottomFish => Self::bottom_fish(&inputs),
        };
        let score = if self.clamp {
            raw.clamp(0.0, mode.max_score())
        } else {
            raw
        };

        TrendScore {
            mode,
            score,
            reasons,
            inputs,
        }
    }

    fn trend(inputs: &TrendInputs) -> (f64, Vec<String>) {
        let TrendInputs { win_pct, scr, bias } = *inputs;
        let mut reasons = Vec::new();
        let mut score = win_pct;

        if bias > 25.0 {
            score *= 0.6;
            reasons.push(format!("severe overbought (bias {:.1}%)", bias));
        } else if bias > 15.0 {
            score *= 0.85;
            reasons.push(format!("bias elevated ({:.1}%)", bias));
        }

        if scr < 12.0 && win_pct > 90.0 {
            score = (score + 5.0).min(100.0);
            reasons.push("lock-up rally".to_string());
        } else if scr > 40.0 {
            score *= 0.9;
            reasons.push(format!("chips loosening (SCR {:.1}%)", scr));
        }

        if reasons.is_empty() {
            if win_pct > 95.0 {
                reasons.push("strongest uptrend".to_string());
            } else if win_pct > 80.0 {
                reasons.push("strong trend".to_string());
            } else if win_pct < 50.0 {
                reasons.push("trapped".to_string());
            }
        }

        (round1(score), reasons)
    }

    fn bottom_fish(inputs: &TrendInputs) -> (f64, Vec<String>) {
        let TrendInputs { win_pct, scr, bias } = *inputs;
        let mut reasons = Vec::new();
        let mut score = 0.0;

        if scr < 10.0 {
            score += 4.0;
            reasons.push("extremely dense".to_string());
        } else if scr < 15.0 {
            score += 3.5;
            reasons.push("highly dense".to_string());
        } else if scr < 20.0 {
            score += 2.0;
        } else {
            reasons.push("dispersed".to_string());
        }

        if win_pct > 0.0 && win_pct < 20.0 {
            score += 3.0;
            reasons.push("bottom accumulation".to_string());
        } else if (20.0..60.0).contains(&win_pct) {
            score += 2.0;
            reasons.push("building momentum".to_string());
        } else if win_pct > 85.0 {
            reasons.push("high position risk".to_string());
        }

        if bias.abs() <= 8.0 {
            score += 3.0;
            reasons.push("hugging cost".to_string());
        } else if bias.abs() <= 15.0 {
            score += 1.5;
        }

        (score, reasons)
    }
}
