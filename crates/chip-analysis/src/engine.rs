use analysis_core::{math, AnalysisError, PriceBar, SupplementaryInputs, TimeSeries};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::{ChipConfig, PercentileSource};
use crate::patterns::PatternClassifier;
use crate::profit_loss::{chip_bias, ProfitLossAnalyzer};
use crate::report::{HealthReport, HealthReportBuilder};
use crate::simulator::ChipDistributionSimulator;
use crate::statistics;
use crate::trend_mode::{ScoringMode, TrendInputs, TrendModeScorer, TrendScore};

/// One symbol's input for [`ChipHealthEngine::analyze_batch`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchInput {
    pub symbol: String,
    pub series: TimeSeries,
    pub current_price: f64,
    #[serde(default)]
    pub supplementary: SupplementaryInputs,
}

#[derive(Debug, Clone)]
pub struct BatchResult {
    pub symbol: String,
    pub result: Result<HealthReport, AnalysisError>,
}

/// Chip distribution health engine. Every call is a pure function of its
/// inputs; the engine holds configuration only.
#[derive(Debug, Clone, Default)]
pub struct ChipHealthEngine {
    config: ChipConfig,
}

impl ChipHealthEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: ChipConfig) -> Result<Self, AnalysisError> {
        config
            .validate()
            .map_err(|e| AnalysisError::InvalidConfig(e.to_string()))?;
        Ok(Self { config })
    }

    /// Engine configured from `CHIP_*` environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            config: ChipConfig::from_env()?,
        })
    }

    pub fn config(&self) -> &ChipConfig {
        &self.config
    }

    fn check_inputs(&self, series: &TimeSeries, current_price: f64) -> Result<(), AnalysisError> {
        if !current_price.is_finite() || current_price <= 0.0 {
            return Err(AnalysisError::InvalidData(format!(
                "current price must be positive, got {}",
                current_price
            )));
        }
        if series.len() < self.config.min_bars {
            tracing::warn!(
                "Insufficient data for chip analysis: {} bars, need {}",
                series.len(),
                self.config.min_bars
            );
            return Err(AnalysisError::insufficient(self.config.min_bars, series.len()));
        }
        Ok(())
    }

    /// Mean of the last `turnover_lookback` observations, preferring the
    /// supplementary series over the bars' own turnover.
    fn turnover(&self, series: &TimeSeries, supplementary: &SupplementaryInputs) -> Option<f64> {
        let observed: Vec<f64> = match &supplementary.turnover_rates {
            Some(rates) if !rates.is_empty() => rates.clone(),
            _ => series.turnover_rates(),
        };
        let observed: Vec<f64> = observed.into_iter().filter(|t| t.is_finite() && *t >= 0.0).collect();
        if observed.is_empty() {
            return None;
        }
        let recent = &observed[observed.len().saturating_sub(self.config.turnover_lookback)..];
        Some(math::mean(recent))
    }

    /// Full five-dimension health analysis of the trailing window.
    pub fn analyze(
        &self,
        series: &TimeSeries,
        current_price: f64,
        supplementary: &SupplementaryInputs,
    ) -> Result<HealthReport, AnalysisError> {
        self.check_inputs(series, current_price)?;

        let window: &[PriceBar] = series.tail(self.config.window);
        let simulator = ChipDistributionSimulator::from_config(&self.config);
        let distribution = simulator.simulate(window)?;

        let stats = statistics::compute(&distribution, window, self.config.percentile_source);
        let profit_loss = ProfitLossAnalyzer::from_config(&self.config).split(window, current_price);

        let classifier = PatternClassifier::from_config(&self.config);
        let detection = classifier.classify(window, current_price);
        let lock = classifier.bottom_lock(series.tail(self.config.lock_long_window), current_price);

        let turnover = self.turnover(series, supplementary);

        let report = HealthReportBuilder::new(current_price, stats)
            .with_profit_loss(profit_loss)
            .with_pattern(detection)
            .with_bottom_lock(lock)
            .with_turnover(turnover)
            .with_supplementary(supplementary)
            .with_market_condition(self.config.market_condition)
            .with_data_range(
                window.first().map(|b| b.date),
                window.last().map(|b| b.date),
                window.len(),
            )
            .build();

        tracing::info!(
            "Chip health: score={:.2} level={} scr={:.2} profit={:.1}% pattern={:?} suggestion={:?}",
            report.health_score,
            report.health_level.as_str(),
            report.scr(),
            report.profit_loss.profit_ratio,
            report.pattern.pattern,
            report.suggestion
        );

        Ok(report)
    }

    /// Two-mode rubric over the longer trend window. Win ratio, SCR and bias
    /// all come from the simulated distribution.
    pub fn score_trend(
        &self,
        series: &TimeSeries,
        current_price: f64,
        mode: ScoringMode,
    ) -> Result<TrendScore, AnalysisError> {
        self.check_inputs(series, current_price)?;

        let window = series.tail(self.config.trend_window);
        let distribution = ChipDistributionSimulator::from_config(&self.config).simulate(window)?;
        let stats = statistics::compute(&distribution, window, PercentileSource::Distribution);

        let bias = if stats.degenerate {
            0.0
        } else {
            chip_bias(current_price, stats.percentiles.p50)
        };
        let inputs = TrendInputs {
            win_pct: distribution.weight_below(current_price) * 100.0,
            scr: stats.concentration.scr,
            bias,
        };

        let result = TrendModeScorer::new(self.config.clamp_trend_scores).score(inputs, mode);
        tracing::debug!("Trend score ({:?}): {:.1} {:?}", mode, result.score, result.reasons);
        Ok(result)
    }

    /// Analyze many symbols in parallel. Output order follows `inputs`.
    pub fn analyze_batch(&self, inputs: &[BatchInput]) -> Vec<BatchResult> {
        let results: Vec<BatchResult> = inputs
            .par_iter()
            .map(|input| BatchResult {
                symbol: input.symbol.clone(),
                result: self.analyze(&input.series, input.current_price, &input.supplementary),
            })
            .collect();

        let failed = results.iter().filter(|r| r.result.is_err()).count();
        if failed > 0 {
            tracing::warn!("Chip batch: {} of {} symbols failed", failed, results.len());
        }
        results
    }
}
