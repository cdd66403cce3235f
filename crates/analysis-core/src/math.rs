//! Numeric helpers shared by the chip analysis components.
//!
//! Everything here assumes finite inputs; NaN filtering happens when a
//! `TimeSeries` is built, not in these functions.

use std::cmp::Ordering;

/// Compute the mean of a data slice.
pub fn mean(data: &[f64]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    data.iter().sum::<f64>() / data.len() as f64
}

/// Weighted order statistic over `(value, weight)` pairs.
///
/// `pct` is on a 0-100 scale. The pairs are sorted by value and the first
/// value whose cumulative weight reaches `pct%` of the total is returned.
/// Pairs with non-positive weight never count. Returns `None` when the total
/// weight is zero.
pub fn weighted_percentile(pairs: &[(f64, f64)], pct: f64) -> Option<f64> {
    let mut sorted: Vec<(f64, f64)> = pairs.iter().copied().filter(|&(_, w)| w > 0.0).collect();
    if sorted.is_empty() {
        return None;
    }
    sorted.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal));

    let total: f64 = sorted.iter().map(|&(_, w)| w).sum();
    let target = (pct.clamp(0.0, 100.0) / 100.0) * total;

    let mut cumulative = 0.0;
    for &(value, weight) in &sorted {
        cumulative += weight;
        if cumulative >= target {
            return Some(value);
        }
    }
    // Rounding can leave the running sum a hair under `total`
    sorted.last().map(|&(value, _)| value)
}

/// Normalise weights into shares summing to 1. Empty when the total is zero.
pub fn shares(weights: &[f64]) -> Vec<f64> {
    let total: f64 = weights.iter().sum();
    if total <= 0.0 {
        return Vec::new();
    }
    weights.iter().map(|w| w / total).collect()
}

/// Herfindahl-Hirschman index: sum of squared shares.
pub fn hhi(weights: &[f64]) -> f64 {
    shares(weights).iter().map(|s| s * s).sum()
}

/// Gini coefficient over the shares of `weights`.
///
/// 0 means every bucket holds the same mass; values approach 1 as the mass
/// piles into a single bucket out of many.
pub fn gini(weights: &[f64]) -> f64 {
    let mut sorted = shares(weights);
    let n = sorted.len();
    if n == 0 {
        return 0.0;
    }
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));

    let total: f64 = sorted.iter().sum();
    let ranked: f64 = sorted
        .iter()
        .enumerate()
        .map(|(i, s)| (i + 1) as f64 * s)
        .sum();
    let n = n as f64;
    ((2.0 * ranked) / (n * total) - (n + 1.0) / n).max(0.0)
}

/// Round to one decimal place.
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
