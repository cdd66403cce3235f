//! Five-dimension health rubric.
//!
//! Each dimension is a step function onto `[0, 2]`; the composite is their
//! weighted sum rescaled onto `[0, 10]`.

use anyhow::bail;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::patterns::PeakPattern;

/// Market backdrop used to weight the five dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MarketCondition {
    #[default]
    Normal,
    Bull,
    Bear,
}

impl MarketCondition {
    pub fn as_str(&self) -> &'static str {
        match self {
            MarketCondition::Normal => "Normal",
            MarketCondition::Bull => "Bull",
            MarketCondition::Bear => "Bear",
        }
    }

    pub fn weights(&self) -> DimensionWeights {
        match self {
            MarketCondition::Normal => DimensionWeights {
                concentration: 0.2,
                turnover: 0.2,
                profit_loss: 0.2,
                bias: 0.2,
                pattern: 0.2,
            },
            // Concentration and shape matter most in a rising market
            MarketCondition::Bull => DimensionWeights {
                concentration: 0.30,
                turnover: 0.15,
                profit_loss: 0.15,
                bias: 0.15,
                pattern: 0.25,
            },
            // Trapped supply and overextension matter most in a falling one
            MarketCondition::Bear => DimensionWeights {
                concentration: 0.20,
                turnover: 0.15,
                profit_loss: 0.25,
                bias: 0.25,
                pattern: 0.15,
            },
        }
    }
}

impl FromStr for MarketCondition {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "normal" => Ok(MarketCondition::Normal),
            "bull" => Ok(MarketCondition::Bull),
            "bear" => Ok(MarketCondition::Bear),
            other => bail!("unknown market condition '{}'", other),
        }
    }
}

/// Per-dimension weights, summing to 1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DimensionWeights {
    pub concentration: f64,
    pub turnover: f64,
    pub profit_loss: f64,
    pub bias: f64,
    pub pattern: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DimensionScores {
    pub concentration: f64,
    pub turnover: f64,
    pub profit_loss: f64,
    pub bias: f64,
    pub pattern: f64,
}

impl DimensionScores {
    pub fn sum(&self) -> f64 {
        self.concentration + self.turnover + self.profit_loss + self.bias + self.pattern
    }
}

/// Ordinal health grade, A+ best.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum HealthLevel {
    E,
    D,
    C,
    B,
    A,
    #[serde(rename = "A+")]
    APlus,
}

impl HealthLevel {
    pub fn from_score(score: f64) -> Self {
        if score >= 9.0 {
            HealthLevel::APlus
        } else if score >= 8.0 {
            HealthLevel::A
        } else if score >= 7.0 {
            HealthLevel::B
        } else if score >= 6.0 {
            HealthLevel::C
        } else if score >= 4.0 {
            HealthLevel::D
        } else {
            HealthLevel::E
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HealthLevel::APlus => "A+",
            HealthLevel::A => "A",
            HealthLevel::B => "B",
            HealthLevel::C => "C",
            HealthLevel::D => "D",
            HealthLevel::E => "E",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignalStrength {
    Weak,
    Medium,
    Strong,
}

impl SignalStrength {
    pub fn from_score(score: f64) -> Self {
        if score >= 8.5 {
            SignalStrength::Strong
        } else if score >= 7.0 {
            SignalStrength::Medium
        } else {
            SignalStrength::Weak
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SignalStrength::Weak => "WEAK",
            SignalStrength::Medium => "MEDIUM",
            SignalStrength::Strong => "STRONG",
        }
    }
}

/// What the dominant holder appears to be doing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MainForceStatus {
    Markup,
    PossibleDistribution,
    RetailChasing,
    Accumulation,
    Washout,
    HighDistribution,
    Unclear,
}

impl MainForceStatus {
    /// Missing turnover is read as zero.
    pub fn classify(
        scr: f64,
        locked: bool,
        profit_ratio: f64,
        turnover: Option<f64>,
        pattern: PeakPattern,
    ) -> Self {
        let turnover = turnover.unwrap_or(0.0);

        if scr < 20.0 && locked && profit_ratio > 70.0 {
            if (2.0..=10.0).contains(&turnover) {
                return MainForceStatus::Markup;
            }
            if turnover > 10.0 {
                return MainForceStatus::PossibleDistribution;
            }
        }
        if scr > 25.0 && profit_ratio > 85.0 && turnover > 12.0 {
            return MainForceStatus::RetailChasing;
        }
        if scr < 20.0 && profit_ratio < 30.0 && pattern == PeakPattern::BottomSingle {
            return MainForceStatus::Accumulation;
        }
        if (20.0..=30.0).contains(&scr) && (40.0..=75.0).contains(&profit_ratio) {
            return MainForceStatus::Washout;
        }
        if pattern == PeakPattern::HighSingle || (profit_ratio > 90.0 && turnover > 15.0) {
            return MainForceStatus::HighDistribution;
        }
        MainForceStatus::Unclear
    }

    pub fn description(&self) -> &'static str {
        match self {
            MainForceStatus::Markup => "Main force marking up, chips locked",
            MainForceStatus::PossibleDistribution => "Locked chips turning over heavily, possible distribution",
            MainForceStatus::RetailChasing => "Retail chasing, chips dispersed at high profit",
            MainForceStatus::Accumulation => "Main force accumulating at the bottom",
            MainForceStatus::Washout => "Washout in progress",
            MainForceStatus::HighDistribution => "Distributing at high levels",
            MainForceStatus::Unclear => "Main force intent unclear",
        }
    }
}

pub fn concentration_score(scr: f64) -> f64 {
    if scr < 10.0 {
        2.0
    } else if scr < 15.0 {
        1.5
    } else if scr < 25.0 {
        1.0
    } else if scr < 35.0 {
        0.5
    } else {
        0.0
    }
}

/// Neutral 1.0 when no turnover is available.
pub fn turnover_score(turnover: Option<f64>) -> f64 {
    let Some(t) = turnover else {
        return 1.0;
    };
    if (2.0..=5.0).contains(&t) {
        2.0
    } else if (1.0..2.0).contains(&t) || (t > 5.0 && t <= 8.0) {
        1.5
    } else if (0.5..1.0).contains(&t) || (t > 8.0 && t <= 12.0) {
        1.0
    } else if t > 15.0 {
        0.0
    } else {
        0.5
    }
}

pub fn profit_loss_score(profit_ratio: f64, bias: f64) -> f64 {
    if profit_ratio < 30.0 && bias > 0.0 && bias < 10.0 {
        2.0
    } else if profit_ratio < 40.0 && bias > -5.0 && bias < 15.0 {
        1.5
    } else if profit_ratio < 60.0 {
        1.0
    } else if profit_ratio > 80.0 {
        0.0
    } else {
        0.5
    }
}

pub fn bias_score(bias: f64) -> f64 {
    if (3.0..=12.0).contains(&bias) {
        2.0
    } else if (-5.0..3.0).contains(&bias) || (bias > 12.0 && bias <= 20.0) {
        1.5
    } else if (-15.0..-5.0).contains(&bias) || (bias > 20.0 && bias <= 30.0) {
        1.0
    } else if bias > 40.0 || bias < -25.0 {
        0.0
    } else {
        0.5
    }
}

pub fn pattern_score(pattern: PeakPattern, locked: bool) -> f64 {
    match pattern {
        PeakPattern::BottomSingle => 2.0,
        _ if locked => 1.8,
        PeakPattern::Double => 1.2,
        PeakPattern::HighSingle => 0.0,
        PeakPattern::Multi => 0.3,
        _ => 1.0,
    }
}

/// Statistics consumed by the rubric.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoringInputs {
    pub scr: f64,
    pub turnover: Option<f64>,
    pub profit_ratio: f64,
    pub bias: f64,
    pub pattern: PeakPattern,
    pub locked: bool,
}

#[derive(Debug, Clone)]
pub struct FiveDimensionScorer {
    pub market_condition: MarketCondition,
}

impl Default for FiveDimensionScorer {
    fn default() -> Self {
        Self::new(MarketCondition::Normal)
    }
}

impl FiveDimensionScorer {
    pub fn new(market_condition: MarketCondition) -> Self {
        Self { market_condition }
    }

    pub fn score(&self, inputs: &ScoringInputs) -> DimensionScores {
        DimensionScores {
            concentration: concentration_score(inputs.scr),
            turnover: turnover_score(inputs.turnover),
            profit_loss: profit_loss_score(inputs.profit_ratio, inputs.bias),
            bias: bias_score(inputs.bias),
            pattern: pattern_score(inputs.pattern, inputs.locked),
        }
    }

    /// Weighted composite on `[0, 10]`. Under `Normal` this is the plain sum.
    pub fn health_score(&self, scores: &DimensionScores) -> f64 {
        let w = self.market_condition.weights();
        let total = scores.concentration * (w.concentration * 5.0)
            + scores.turnover * (w.turnover * 5.0)
            + scores.profit_loss * (w.profit_loss * 5.0)
            + scores.bias * (w.bias * 5.0)
            + scores.pattern * (w.pattern * 5.0);
        total.clamp(0.0, 10.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const PATTERNS: [PeakPattern; 7] = [
        PeakPattern::BottomSingle,
        PeakPattern::MidSingle,
        PeakPattern::HighSingle,
        PeakPattern::Double,
        PeakPattern::Multi,
        PeakPattern::Scattered,
        PeakPattern::Unknown,
    ];

    #[test]
    fn test_weights_sum_to_one() {
        for condition in [MarketCondition::Normal, MarketCondition::Bull, MarketCondition::Bear] {
            let w = condition.weights();
            let sum = w.concentration + w.turnover + w.profit_loss + w.bias + w.pattern;
            assert_relative_eq!(sum, 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_concentration_table() {
        assert_relative_eq!(concentration_score(5.0), 2.0);
        assert_relative_eq!(concentration_score(10.0), 1.5);
        assert_relative_eq!(concentration_score(20.0), 1.0);
        assert_relative_eq!(concentration_score(30.0), 0.5);
        assert_relative_eq!(concentration_score(35.0), 0.0);
    }

    #[test]
    fn test_turnover_table() {
        assert_relative_eq!(turnover_score(Some(3.0)), 2.0);
        assert_relative_eq!(turnover_score(Some(1.5)), 1.5);
        assert_relative_eq!(turnover_score(Some(7.0)), 1.5);
        assert_relative_eq!(turnover_score(Some(0.7)), 1.0);
        assert_relative_eq!(turnover_score(Some(10.0)), 1.0);
        assert_relative_eq!(turnover_score(Some(13.0)), 0.5);
        assert_relative_eq!(turnover_score(Some(0.2)), 0.5);
        assert_relative_eq!(turnover_score(Some(20.0)), 0.0);
        assert_relative_eq!(turnover_score(None), 1.0);
    }

    #[test]
    fn test_profit_loss_table() {
        assert_relative_eq!(profit_loss_score(20.0, 5.0), 2.0);
        assert_relative_eq!(profit_loss_score(35.0, 12.0), 1.5);
        assert_relative_eq!(profit_loss_score(20.0, -10.0), 1.0);
        assert_relative_eq!(profit_loss_score(70.0, 5.0), 0.5);
        assert_relative_eq!(profit_loss_score(90.0, 5.0), 0.0);
    }

    #[test]
    fn test_bias_table() {
        assert_relative_eq!(bias_score(3.0), 2.0);
        assert_relative_eq!(bias_score(12.0), 2.0);
        assert_relative_eq!(bias_score(0.0), 1.5);
        assert_relative_eq!(bias_score(15.0), 1.5);
        assert_relative_eq!(bias_score(-10.0), 1.0);
        assert_relative_eq!(bias_score(25.0), 1.0);
        assert_relative_eq!(bias_score(35.0), 0.5);
        assert_relative_eq!(bias_score(-20.0), 0.5);
        assert_relative_eq!(bias_score(45.0), 0.0);
        assert_relative_eq!(bias_score(-30.0), 0.0);
    }

    #[test]
    fn test_pattern_table() {
        assert_relative_eq!(pattern_score(PeakPattern::BottomSingle, true), 2.0);
        assert_relative_eq!(pattern_score(PeakPattern::MidSingle, true), 1.8);
        assert_relative_eq!(pattern_score(PeakPattern::Double, false), 1.2);
        assert_relative_eq!(pattern_score(PeakPattern::HighSingle, false), 0.0);
        assert_relative_eq!(pattern_score(PeakPattern::Multi, false), 0.3);
        assert_relative_eq!(pattern_score(PeakPattern::Scattered, false), 1.0);
    }

    #[test]
    fn test_scores_bounded() {
        let scorer = FiveDimensionScorer::default();
        let bull = FiveDimensionScorer::new(MarketCondition::Bull);
        for scr in [0.0, 9.0, 14.0, 24.0, 34.0, 80.0] {
            for turnover in [None, Some(0.1), Some(3.0), Some(9.0), Some(30.0)] {
                for profit in [0.0, 25.0, 50.0, 70.0, 95.0] {
                    for bias in [-50.0, -10.0, 0.0, 5.0, 18.0, 28.0, 60.0] {
                        for pattern in PATTERNS {
                            for locked in [false, true] {
                                let inputs = ScoringInputs {
                                    scr,
                                    turnover,
                                    profit_ratio: profit,
                                    bias,
                                    pattern,
                                    locked,
                                };
                                let s = scorer.score(&inputs);
                                for v in [s.concentration, s.turnover, s.profit_loss, s.bias, s.pattern] {
                                    assert!((0.0..=2.0).contains(&v));
                                }
                                let h = scorer.health_score(&s);
                                assert!((0.0..=10.0).contains(&h));
                                assert_relative_eq!(h, s.sum(), epsilon = 1e-12);
                                assert!((0.0..=10.0).contains(&bull.health_score(&s)));
                            }
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn test_level_and_strength_monotonic() {
        let mut prev_level = HealthLevel::from_score(0.0);
        let mut prev_strength = SignalStrength::from_score(0.0);
        for i in 0..=100 {
            let score = i as f64 / 10.0;
            let level = HealthLevel::from_score(score);
            let strength = SignalStrength::from_score(score);
            assert!(level >= prev_level);
            assert!(strength >= prev_strength);
            prev_level = level;
            prev_strength = strength;
        }
        assert_eq!(HealthLevel::from_score(9.0), HealthLevel::APlus);
        assert_eq!(HealthLevel::from_score(3.9), HealthLevel::E);
        assert_eq!(SignalStrength::from_score(8.5), SignalStrength::Strong);
        assert_eq!(SignalStrength::from_score(6.9), SignalStrength::Weak);
    }

    #[test]
    fn test_bull_weights_favour_concentration() {
        let scores = DimensionScores {
            concentration: 2.0,
            turnover: 0.0,
            profit_loss: 0.0,
            bias: 0.0,
            pattern: 0.0,
        };
        let normal = FiveDimensionScorer::default().health_score(&scores);
        let bull = FiveDimensionScorer::new(MarketCondition::Bull).health_score(&scores);
        assert_relative_eq!(normal, 2.0, epsilon = 1e-12);
        assert_relative_eq!(bull, 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_main_force_status() {
        use MainForceStatus::*;
        let mid = PeakPattern::MidSingle;
        assert_eq!(MainForceStatus::classify(15.0, true, 80.0, Some(5.0), mid), Markup);
        assert_eq!(MainForceStatus::classify(15.0, true, 80.0, Some(12.0), mid), PossibleDistribution);
        assert_eq!(MainForceStatus::classify(30.0, false, 90.0, Some(14.0), mid), RetailChasing);
        assert_eq!(
            MainForceStatus::classify(10.0, false, 20.0, None, PeakPattern::BottomSingle),
            Accumulation
        );
        assert_eq!(MainForceStatus::classify(25.0, false, 50.0, None, mid), Washout);
        assert_eq!(
            MainForceStatus::classify(40.0, false, 50.0, None, PeakPattern::HighSingle),
            HighDistribution
        );
        assert_eq!(MainForceStatus::classify(40.0, false, 50.0, None, mid), Unclear);
        // locked but turnover missing falls through
        assert_eq!(MainForceStatus::classify(15.0, true, 80.0, None, mid), Unclear);
    }

    #[test]
    fn test_market_condition_parse() {
        assert_eq!("BULL".parse::<MarketCondition>().unwrap(), MarketCondition::Bull);
        assert!("sideways".parse::<MarketCondition>().is_err());
    }
}
