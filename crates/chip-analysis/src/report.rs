//! Health report assembly
//!
//! Turns the raw statistics into dimension scores, a composite grade, a
//! single suggestion category and a list of human-readable signals.

use analysis_core::SupplementaryInputs;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::patterns::{pattern_confidence, BottomLock, PeakDetection, PeakPattern};
use crate::profit_loss::{chip_bias, ProfitLossSplit};
use crate::scoring::{
    DimensionScores, FiveDimensionScorer, HealthLevel, MainForceStatus, MarketCondition,
    ScoringInputs, SignalStrength,
};
use crate::statistics::DistributionStatistics;

/// Recommendation category, chosen by the first matching rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Suggestion {
    StrongAccumulation,
    MainForceLockUp,
    HealthyWashout,
    Distribution,
    RetailBattle,
    HealthyHolding,
    Dispersed,
    Unclear,
}

impl Suggestion {
    pub fn description(&self) -> &'static str {
        match self {
            Suggestion::StrongAccumulation => "Strong: accumulation complete, bottom single peak",
            Suggestion::MainForceLockUp => "Strong: main force locked up at the bottom",
            Suggestion::HealthyWashout => "Medium: healthy washout between two peaks",
            Suggestion::Distribution => "Danger: high single peak, distribution under way",
            Suggestion::RetailBattle => "Weak: scattered retail battle across several peaks",
            Suggestion::HealthyHolding => "Medium: concentrated, price in a healthy holding zone",
            Suggestion::Dispersed => "Weak: chips dispersed, stay cautious",
            Suggestion::Unclear => "Weak: pattern unclear, keep watching",
        }
    }

    pub fn is_bearish(&self) -> bool {
        matches!(self, Suggestion::Distribution)
    }
}

/// First-match-wins suggestion rules. Order matters for inputs that satisfy
/// more than one rule.
pub fn suggest(pattern: PeakPattern, locked: bool, scr: f64, bias: f64) -> (Suggestion, SignalStrength) {
    if pattern == PeakPattern::BottomSingle && scr < 12.0 {
        (Suggestion::StrongAccumulation, SignalStrength::Strong)
    } else if locked && scr < 15.0 {
        (Suggestion::MainForceLockUp, SignalStrength::Strong)
    } else if pattern == PeakPattern::Double && scr > 10.0 && scr < 25.0 {
        (Suggestion::HealthyWashout, SignalStrength::Medium)
    } else if pattern == PeakPattern::HighSingle {
        (Suggestion::Distribution, SignalStrength::Strong)
    } else if pattern == PeakPattern::Multi {
        (Suggestion::RetailBattle, SignalStrength::Weak)
    } else if scr < 15.0 && (5.0..=15.0).contains(&bias) {
        (Suggestion::HealthyHolding, SignalStrength::Medium)
    } else if scr > 30.0 {
        (Suggestion::Dispersed, SignalStrength::Weak)
    } else {
        (Suggestion::Unclear, SignalStrength::Weak)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    pub current_price: f64,
    pub health_score: f64,
    pub health_level: HealthLevel,
    /// Derived from `health_score` alone
    pub signal_strength: SignalStrength,
    pub dimension_scores: DimensionScores,
    pub market_condition: MarketCondition,

    pub suggestion: Suggestion,
    /// Strength attached to the rule that picked `suggestion`
    pub suggestion_strength: SignalStrength,
    pub main_force_status: MainForceStatus,
    pub signals: Vec<String>,
    pub caveats: Vec<String>,

    pub statistics: DistributionStatistics,
    pub profit_loss: ProfitLossSplit,
    pub bias: f64,
    pub pattern: PeakDetection,
    pub pattern_confidence: f64,
    pub bottom_lock: BottomLock,

    pub turnover: Option<f64>,
    pub top10_concentration: Option<f64>,
    pub holder_count_change: Option<f64>,

    pub data_start: Option<NaiveDate>,
    pub data_end: Option<NaiveDate>,
    pub data_days: usize,
}

impl HealthReport {
    pub fn scr(&self) -> f64 {
        self.statistics.concentration.scr
    }

    pub fn is_degenerate(&self) -> bool {
        self.statistics.degenerate
    }
}

/// Builder for health reports
pub struct HealthReportBuilder {
    current_price: f64,
    statistics: DistributionStatistics,
    profit_loss: ProfitLossSplit,
    pattern: Option<PeakDetection>,
    bottom_lock: Option<BottomLock>,
    turnover: Option<f64>,
    supplementary: SupplementaryInputs,
    market_condition: MarketCondition,
    data_range: (Option<NaiveDate>, Option<NaiveDate>, usize),
}

impl HealthReportBuilder {
    pub fn new(current_price: f64, statistics: DistributionStatistics) -> Self {
        Self {
            current_price,
            statistics,
            profit_loss: ProfitLossSplit::zero(),
            pattern: None,
            bottom_lock: None,
            turnover: None,
            supplementary: SupplementaryInputs::none(),
            market_condition: MarketCondition::Normal,
            data_range: (None, None, 0),
        }
    }

    pub fn with_profit_loss(mut self, split: ProfitLossSplit) -> Self {
        self.profit_loss = split;
        self
    }

    pub fn with_pattern(mut self, detection: PeakDetection) -> Self {
        self.pattern = Some(detection);
        self
    }

    pub fn with_bottom_lock(mut self, lock: BottomLock) -> Self {
        self.bottom_lock = Some(lock);
        self
    }

    pub fn with_turnover(mut self, turnover: Option<f64>) -> Self {
        self.turnover = turnover;
        self
    }

    pub fn with_supplementary(mut self, inputs: &SupplementaryInputs) -> Self {
        self.supplementary = inputs.clone();
        self
    }

    pub fn with_market_condition(mut self, condition: MarketCondition) -> Self {
        self.market_condition = condition;
        self
    }

    pub fn with_data_range(mut self, start: Option<NaiveDate>, end: Option<NaiveDate>, days: usize) -> Self {
        self.data_range = (start, end, days);
        self
    }

    pub fn build(self) -> HealthReport {
        let pattern = self.pattern.clone().unwrap_or(PeakDetection {
            pattern: PeakPattern::Unknown,
            peaks: Vec::new(),
            strength: 0.0,
            weak: false,
        });
        let bottom_lock = self.bottom_lock.unwrap_or(BottomLock {
            locked: false,
            ratio_60d: 0.0,
            ratio_20d: 0.0,
        });

        let scr = self.statistics.concentration.scr;
        let bias = if self.statistics.degenerate {
            0.0
        } else {
            chip_bias(self.current_price, self.statistics.percentiles.p50)
        };
        let profit_ratio = self.profit_loss.profit_ratio;

        let scorer = FiveDimensionScorer::new(self.market_condition);
        let dimension_scores = scorer.score(&ScoringInputs {
            scr,
            turnover: self.turnover,
            profit_ratio,
            bias,
            pattern: pattern.pattern,
            locked: bottom_lock.locked,
        });
        let health_score = scorer.health_score(&dimension_scores);

        let confidence = pattern_confidence(pattern.pattern, bottom_lock.locked, scr, bias);
        let (suggestion, suggestion_strength) = suggest(pattern.pattern, bottom_lock.locked, scr, bias);
        let main_force_status =
            MainForceStatus::classify(scr, bottom_lock.locked, profit_ratio, self.turnover, pattern.pattern);

        let signals = self.generate_signals(&pattern, confidence, &bottom_lock, bias, main_force_status);
        let caveats = self.generate_caveats();

        HealthReport {
            current_price: self.current_price,
            health_score,
            health_level: HealthLevel::from_score(health_score),
            signal_strength: SignalStrength::from_score(health_score),
            dimension_scores,
            market_condition: self.market_condition,
            suggestion,
            suggestion_strength,
            main_force_status,
            signals,
            caveats,
            statistics: self.statistics,
            profit_loss: self.profit_loss,
            bias,
            pattern,
            pattern_confidence: confidence,
            bottom_lock,
            turnover: self.turnover,
            top10_concentration: self.supplementary.top10_concentration,
            holder_count_change: self.supplementary.holder_count_change,
            data_start: self.data_range.0,
            data_end: self.data_range.1,
            data_days: self.data_range.2,
        }
    }

    fn generate_signals(
        &self,
        pattern: &PeakDetection,
        confidence: f64,
        lock: &BottomLock,
        bias: f64,
        main_force: MainForceStatus,
    ) -> Vec<String> {
        let mut signals = Vec::new();
        let scr = self.statistics.concentration.scr;
        let profit = self.profit_loss.profit_ratio;

        // Concentration
        if !self.statistics.degenerate {
            if scr < 10.0 {
                signals.push(format!("Chips highly concentrated (SCR {:.1}%)", scr));
            } else if scr < 15.0 {
                signals.push(format!("Chips concentrated (SCR {:.1}%)", scr));
            } else if scr > 30.0 {
                signals.push(format!("Chips dispersed (SCR {:.1}%)", scr));
            }
        }

        // Shape
        if !matches!(pattern.pattern, PeakPattern::Unknown | PeakPattern::Scattered) {
            signals.push(format!("{} (confidence {:.0}%)", pattern.pattern.label(), confidence));
            if pattern.weak {
                signals.push(format!("Peak is weak (strength {:.1}x mean)", pattern.strength));
            }
        }
        if lock.locked {
            signals.push(format!(
                "Bottom chips locked (60d {:.1}%, 20d {:.1}%)",
                lock.ratio_60d * 100.0,
                lock.ratio_20d * 100.0
            ));
        }

        // Profit / loss
        if profit > 90.0 {
            signals.push(format!("{:.1}% of chips in profit, profit-taking pressure", profit));
        } else if profit < 10.0 && self.profit_loss.loss_ratio > 0.0 {
            signals.push(format!("Only {:.1}% of chips in profit, heavy overhead supply", profit));
        }

        // Bias
        if bias > 20.0 {
            signals.push(format!("Price {:.1}% above median cost, overextended", bias));
        } else if bias < -15.0 {
            signals.push(format!("Price {:.1}% below median cost, deeply trapped", bias.abs()));
        }

        // Turnover
        if let Some(t) = self.turnover {
            if t > 15.0 {
                signals.push(format!("Turnover overheated ({:.1}%)", t));
            } else if t < 0.5 {
                signals.push(format!("Turnover very thin ({:.2}%)", t));
            }
        }

        // Holder structure
        if let Some(change) = self.supplementary.holder_count_change {
            if change < -10.0 {
                signals.push(format!("Holder count sharply down ({:.1}%), chips gathering", change));
            } else if change < -5.0 {
                signals.push(format!("Holder count down ({:.1}%)", change));
            } else if change > 10.0 {
                signals.push(format!("Holder count sharply up ({:.1}%), chips spreading", change));
            }
        }
        if let Some(top10) = self.supplementary.top10_concentration {
            signals.push(format!("Top 10 holders own {:.1}% of float", top10));
        }

        if main_force != MainForceStatus::Unclear {
            signals.push(main_force.description().to_string());
        }

        if self.market_condition != MarketCondition::Normal {
            signals.push(format!("Dimension weights adjusted for {} market", self.market_condition.as_str()));
        }

        signals
    }

    fn generate_caveats(&self) -> Vec<String> {
        let mut caveats = Vec::new();
        if self.statistics.degenerate {
            caveats.push("Degenerate distribution: SCR and bias reported as 0".to_string());
        }
        if self.turnover.is_none() {
            caveats.push("Turnover unavailable, neutral turnover score used".to_string());
        }
        caveats
    }
}
