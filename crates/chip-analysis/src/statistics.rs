use analysis_core::{math, PriceBar};
use serde::{Deserialize, Serialize};

use crate::config::PercentileSource;
use crate::simulator::ChipDistribution;

/// Modeled holder cost levels, `p10 <= p50 <= p90`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CostPercentiles {
    pub p10: f64,
    pub p50: f64,
    pub p90: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConcentrationIndices {
    /// (p90 - p10) / (2 * p50) * 100
    pub scr: f64,
    pub hhi: f64,
    pub gini: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributionStatistics {
    pub percentiles: CostPercentiles,
    pub concentration: ConcentrationIndices,
    /// Zero price range or zero traded volume; ratio statistics fell back to 0
    pub degenerate: bool,
}

/// SCR from percentiles. Returns `None` when `p50` is not positive.
pub fn scr(p: &CostPercentiles) -> Option<f64> {
    if p.p50 <= 0.0 {
        return None;
    }
    Some(((p.p90 - p.p10) / (2.0 * p.p50) * 100.0).max(0.0))
}

/// Percentile from bucket weights, interpolating linearly inside the bucket
/// where the cumulative weight crosses the target.
fn distribution_percentile(dist: &ChipDistribution, pct: f64) -> Option<f64> {
    let total = dist.total_weight();
    if total <= 0.0 {
        return None;
    }
    let target = (pct / 100.0) * total;

    let mut cumulative = 0.0;
    for (i, bucket) in dist.buckets.iter().enumerate() {
        if bucket.weight <= 0.0 {
            continue;
        }
        if cumulative + bucket.weight >= target {
            let fraction = ((target - cumulative) / bucket.weight).clamp(0.0, 1.0);
            let (low, high) = dist.bucket_bounds(i);
            return Some(low + fraction * (high - low));
        }
        cumulative += bucket.weight;
    }

    dist.buckets
        .iter()
        .rposition(|b| b.weight > 0.0)
        .map(|i| dist.bucket_bounds(i).1)
}

fn percentiles_from<F>(f: F) -> Option<CostPercentiles>
where
    F: Fn(f64) -> Option<f64>,
{
    Some(CostPercentiles {
        p10: f(10.0)?,
        p50: f(50.0)?,
        p90: f(90.0)?,
    })
}

/// Cost percentiles for the window. Falls back to unweighted close
/// percentiles when no volume traded.
pub fn cost_percentiles(
    dist: &ChipDistribution,
    window: &[PriceBar],
    source: PercentileSource,
) -> (CostPercentiles, bool) {
    let weighted = match source {
        PercentileSource::CloseVolume => {
            let pairs: Vec<(f64, f64)> = window.iter().map(|b| (b.close, b.volume)).collect();
            percentiles_from(|pct| math::weighted_percentile(&pairs, pct))
        }
        PercentileSource::Distribution => percentiles_from(|pct| distribution_percentile(dist, pct)),
    };

    match weighted {
        Some(p) => (p, false),
        None => {
            tracing::warn!("No traded volume in window, using unweighted close percentiles");
            let pairs: Vec<(f64, f64)> = window.iter().map(|b| (b.close, 1.0)).collect();
            let p = percentiles_from(|pct| math::weighted_percentile(&pairs, pct)).unwrap_or(
                CostPercentiles {
                    p10: 0.0,
                    p50: 0.0,
                    p90: 0.0,
                },
            );
            (p, true)
        }
    }
}

/// Percentiles, SCR, HHI and Gini for a simulated distribution.
pub fn compute(
    dist: &ChipDistribution,
    window: &[PriceBar],
    source: PercentileSource,
) -> DistributionStatistics {
    let (percentiles, no_volume) = cost_percentiles(dist, window, source);
    let weights = dist.weights();

    let scr_value = scr(&percentiles);
    let degenerate = no_volume || dist.is_degenerate() || scr_value.is_none();
    if degenerate {
        tracing::debug!(
            "Degenerate chip distribution (width={}, weight={})",
            dist.bucket_width,
            dist.total_weight()
        );
    }

    DistributionStatistics {
        percentiles,
        concentration: ConcentrationIndices {
            scr: if degenerate { 0.0 } else { scr_value.unwrap_or(0.0) },
            hhi: math::hhi(&weights),
            gini: math::gini(&weights),
        },
        degenerate,
    }
}
