use analysis_core::PriceBar;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

use crate::config::ChipConfig;

/// Shape of the volume-by-price histogram
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PeakPattern {
    BottomSingle,
    MidSingle,
    HighSingle,
    Double,
    Multi,
    Scattered,
    Unknown,
}

impl PeakPattern {
    pub fn label(&self) -> &'static str {
        match self {
            PeakPattern::BottomSingle => "Bottom single peak",
            PeakPattern::MidSingle => "Mid single peak",
            PeakPattern::HighSingle => "High single peak",
            PeakPattern::Double => "Double peak",
            PeakPattern::Multi => "Multiple peaks",
            PeakPattern::Scattered => "Scattered (no clear peak)",
            PeakPattern::Unknown => "Unknown",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeakDetection {
    pub pattern: PeakPattern,
    /// Bin indices of the detected peaks
    pub peaks: Vec<usize>,
    /// Strongest peak relative to the mean bin
    pub strength: f64,
    /// Single peak with strength <= 2.0, or double with mean strength <= 1.5
    pub weak: bool,
}

impl PeakDetection {
    fn without_peaks(pattern: PeakPattern) -> Self {
        Self {
            pattern,
            peaks: Vec::new(),
            strength: 0.0,
            weak: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BottomLock {
    pub locked: bool,
    /// Share of long-window volume traded in the bottom band
    pub ratio_60d: f64,
    /// Share of short-window volume traded in the bottom band
    pub ratio_20d: f64,
}

impl BottomLock {
    fn unlocked() -> Self {
        Self {
            locked: false,
            ratio_60d: 0.0,
            ratio_20d: 0.0,
        }
    }
}

/// Peak-shape classification and bottom-lock detection over raw volume.
#[derive(Debug, Clone)]
pub struct PatternClassifier {
    pub bins: usize,
    pub peak_threshold: f64,
    pub bottom_band_pct: f64,
    pub lock_long_window: usize,
    pub lock_short_window: usize,
    pub lock_min_ratio: f64,
    pub lock_retention: f64,
}

impl Default for PatternClassifier {
    fn default() -> Self {
        Self::from_config(&ChipConfig::default())
    }
}

/// Volume traded at each close-price bin. The window's max close lands in
/// the last bin. Returns `None` for an empty window.
pub fn volume_histogram(window: &[PriceBar], bins: usize) -> Option<(Vec<f64>, f64, f64)> {
    if window.is_empty() || bins == 0 {
        return None;
    }
    let low = window.iter().map(|b| b.close).fold(f64::INFINITY, f64::min);
    let high = window.iter().map(|b| b.close).fold(f64::NEG_INFINITY, f64::max);
    let width = (high - low) / bins as f64;

    let mut hist = vec![0.0; bins];
    for bar in window {
        let idx = if width > 0.0 {
            (((bar.close - low) / width).floor() as usize).min(bins - 1)
        } else {
            0
        };
        hist[idx] += bar.volume;
    }
    Some((hist, low, high))
}

impl PatternClassifier {
    pub fn from_config(config: &ChipConfig) -> Self {
        Self {
            bins: config.pattern_bins,
            peak_threshold: config.peak_threshold,
            bottom_band_pct: config.bottom_band_pct,
            lock_long_window: config.lock_long_window,
            lock_short_window: config.lock_short_window,
            lock_min_ratio: config.lock_min_ratio,
            lock_retention: config.lock_retention,
        }
    }

    /// Edge width for placement: bottom is `pos < edge`, high is
    /// `pos > bins - edge`.
    fn edge_bins(&self) -> usize {
        ((self.bins as f64 * 0.3).round() as usize).max(1)
    }

    /// Classify the histogram shape of `window`.
    ///
    /// With zero price range all volume sits at one level; it is placed by
    /// comparing that level against `current_price`.
    pub fn classify(&self, window: &[PriceBar], current_price: f64) -> PeakDetection {
        let Some((hist, low, high)) = volume_histogram(window, self.bins) else {
            return PeakDetection::without_peaks(PeakPattern::Unknown);
        };

        let avg = hist.iter().mean();
        if !(avg > 0.0) {
            return PeakDetection::without_peaks(PeakPattern::Unknown);
        }

        if high <= low {
            let pattern = if low < current_price {
                PeakPattern::BottomSingle
            } else if low > current_price {
                PeakPattern::HighSingle
            } else {
                PeakPattern::MidSingle
            };
            return PeakDetection {
                pattern,
                peaks: vec![0],
                strength: hist[0] / avg,
                weak: false,
            };
        }

        let threshold = avg * self.peak_threshold;
        let peaks: Vec<usize> = (1..hist.len() - 1)
            .filter(|&i| hist[i] > hist[i - 1] && hist[i] > hist[i + 1] && hist[i] > threshold)
            .collect();
        let strengths: Vec<f64> = peaks.iter().map(|&i| hist[i] / avg).collect();
        let strength = strengths.iter().copied().fold(0.0, f64::max);

        let edge = self.edge_bins();
        let (pattern, weak) = match peaks.len() {
            0 => (PeakPattern::Scattered, false),
            1 => {
                let pos = peaks[0];
                let pattern = if pos < edge {
                    PeakPattern::BottomSingle
                } else if pos > self.bins - edge {
                    PeakPattern::HighSingle
                } else {
                    PeakPattern::MidSingle
                };
                (pattern, strength <= 2.0)
            }
            2 => (PeakPattern::Double, strengths.iter().mean() <= 1.5),
            _ => (PeakPattern::Multi, false),
        };

        PeakDetection {
            pattern,
            peaks,
            strength,
            weak,
        }
    }

    /// Compare the bottom-band volume share over the long and short trailing
    /// windows of `bars`.
    pub fn bottom_lock(&self, bars: &[PriceBar], current_price: f64) -> BottomLock {
        let long = &bars[bars.len().saturating_sub(self.lock_long_window)..];
        let short = &bars[bars.len().saturating_sub(self.lock_short_window)..];
        if long.is_empty() || short.is_empty() {
            return BottomLock::unlocked();
        }

        let price_min = long.iter().map(|b| b.close).fold(f64::INFINITY, f64::min);
        let price_max = long.iter().map(|b| b.close).fold(f64::NEG_INFINITY, f64::max);
        // Range runs from the window low up to the current price; a price at
        // or under the low falls back to the window high.
        let top = if current_price > price_min { current_price } else { price_max };
        if top <= price_min {
            return BottomLock::unlocked();
        }
        let band_top = price_min + (top - price_min) * self.bottom_band_pct;

        let band_ratio = |slice: &[PriceBar]| -> Option<f64> {
            let total: f64 = slice.iter().map(|b| b.volume).sum();
            if total <= 0.0 {
                return None;
            }
            let bottom: f64 = slice
                .iter()
                .filter(|b| b.close <= band_top)
                .map(|b| b.volume)
                .sum();
            Some(bottom / total)
        };

        let (Some(ratio_60d), Some(ratio_20d)) = (band_ratio(long), band_ratio(short)) else {
            return BottomLock::unlocked();
        };

        BottomLock {
            locked: ratio_60d > self.lock_min_ratio && ratio_20d >= ratio_60d * self.lock_retention,
            ratio_60d,
            ratio_20d,
        }
    }
}

/// Classification confidence, 0-100.
pub fn pattern_confidence(pattern: PeakPattern, locked: bool, scr: f64, bias: f64) -> f64 {
    let confidence: f64 = match pattern {
        PeakPattern::BottomSingle => {
            let mut c = 85.0;
            if scr < 10.0 {
                c += 10.0;
            }
            if (5.0..=15.0).contains(&bias) {
                c += 5.0;
            }
            c
        }
        _ if locked => {
            if scr < 15.0 {
                85.0
            } else {
                75.0
            }
        }
        PeakPattern::Double => {
            if scr > 15.0 && scr < 25.0 {
                80.0
            } else {
                70.0
            }
        }
        PeakPattern::HighSingle => {
            if scr < 12.0 {
                95.0
            } else {
                80.0
            }
        }
        PeakPattern::Multi => 70.0,
        _ => 50.0,
    };
    confidence.min(100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::{Duration, NaiveDate};

    fn bars(closes_volumes: &[(f64, f64)]) -> Vec<PriceBar> {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        closes_volumes
            .iter()
            .enumerate()
            .map(|(i, &(c, v))| PriceBar::new(start + Duration::days(i as i64), c, c, c, c, v))
            .collect()
    }

    /// Ten price levels 10..=19 with the given volume per level.
    fn shaped(volumes: [f64; 10]) -> Vec<PriceBar> {
        let points: Vec<(f64, f64)> = volumes
            .iter()
            .enumerate()
            .map(|(i, &v)| (10.0 + i as f64, v))
            .collect();
        bars(&points)
    }

    #[test]
    fn test_histogram_includes_max_close() {
        let window = bars(&[(10.0, 1.0), (15.0, 2.0), (20.0, 3.0)]);
        let (hist, low, high) = volume_histogram(&window, 10).unwrap();
        assert_relative_eq!(low, 10.0);
        assert_relative_eq!(high, 20.0);
        assert_relative_eq!(hist[0], 1.0);
        assert_relative_eq!(hist[5], 2.0);
        assert_relative_eq!(hist[9], 3.0);
        assert_relative_eq!(hist.iter().sum::<f64>(), 6.0);
    }

    #[test]
    fn test_bottom_single() {
        let window = shaped([100.0, 900.0, 200.0, 100.0, 100.0, 100.0, 100.0, 100.0, 100.0, 100.0]);
        let detection = PatternClassifier::default().classify(&window, 19.0);
        assert_eq!(detection.pattern, PeakPattern::BottomSingle);
        assert_eq!(detection.peaks, vec![1]);
        assert!(detection.strength > 2.0);
        assert!(!detection.weak);
    }

    #[test]
    fn test_high_single() {
        let window = shaped([100.0, 100.0, 100.0, 100.0, 100.0, 100.0, 100.0, 200.0, 900.0, 100.0]);
        let detection = PatternClassifier::default().classify(&window, 19.0);
        assert_eq!(detection.pattern, PeakPattern::HighSingle);
    }

    #[test]
    fn test_peak_in_bin_seven_is_mid() {
        let window = shaped([100.0, 100.0, 100.0, 100.0, 100.0, 100.0, 200.0, 900.0, 200.0, 100.0]);
        let detection = PatternClassifier::default().classify(&window, 19.0);
        assert_eq!(detection.peaks, vec![7]);
        assert_eq!(detection.pattern, PeakPattern::MidSingle);
    }

    #[test]
    fn test_mid_single() {
        let window = shaped([100.0, 100.0, 100.0, 200.0, 900.0, 200.0, 100.0, 100.0, 100.0, 100.0]);
        let detection = PatternClassifier::default().classify(&window, 19.0);
        assert_eq!(detection.pattern, PeakPattern::MidSingle);
    }

    #[test]
    fn test_double_and_multi() {
        let double = shaped([100.0, 800.0, 100.0, 100.0, 100.0, 100.0, 100.0, 800.0, 100.0, 100.0]);
        assert_eq!(PatternClassifier::default().classify(&double, 15.0).pattern, PeakPattern::Double);

        let multi = shaped([100.0, 600.0, 100.0, 600.0, 100.0, 600.0, 100.0, 100.0, 100.0, 100.0]);
        assert_eq!(PatternClassifier::default().classify(&multi, 15.0).pattern, PeakPattern::Multi);
    }

    #[test]
    fn test_scattered_when_peaks_below_threshold() {
        // Monotonic ramp has no interior local maximum
        let window = shaped([100.0, 200.0, 300.0, 400.0, 500.0, 600.0, 700.0, 800.0, 900.0, 1000.0]);
        assert_eq!(PatternClassifier::default().classify(&window, 15.0).pattern, PeakPattern::Scattered);

        // Small bump below 0.8 x mean does not count
        let window = shaped([1000.0, 1000.0, 100.0, 150.0, 100.0, 1000.0, 1000.0, 1000.0, 1000.0, 1000.0]);
        assert_eq!(PatternClassifier::default().classify(&window, 15.0).pattern, PeakPattern::Scattered);
    }

    #[test]
    fn test_flat_window_placed_by_current_price() {
        let window = bars(&vec![(10.0, 1000.0); 60]);
        let classifier = PatternClassifier::default();
        assert_eq!(classifier.classify(&window, 10.0).pattern, PeakPattern::MidSingle);
        assert_eq!(classifier.classify(&window, 12.0).pattern, PeakPattern::BottomSingle);
        assert_eq!(classifier.classify(&window, 8.0).pattern, PeakPattern::HighSingle);
    }

    #[test]
    fn test_unknown_without_volume() {
        let window = bars(&[(10.0, 0.0), (11.0, 0.0), (12.0, 0.0)]);
        assert_eq!(PatternClassifier::default().classify(&window, 11.0).pattern, PeakPattern::Unknown);
        assert_eq!(PatternClassifier::default().classify(&[], 11.0).pattern, PeakPattern::Unknown);
    }

    #[test]
    fn test_bottom_lock_detected() {
        // Bottom keeps trading through the last 20 sessions
        let mut points = vec![(10.0, 1000.0); 20];
        points.extend(vec![(15.0, 1000.0); 20]);
        for i in 0..20 {
            let close = if i % 4 == 3 { 15.0 } else { 10.0 };
            points.push((close, 1000.0));
        }
        let lock = PatternClassifier::default().bottom_lock(&bars(&points), 16.0);
        assert!(lock.locked);
        assert_relative_eq!(lock.ratio_60d, 35.0 / 60.0, epsilon = 1e-12);
        assert_relative_eq!(lock.ratio_20d, 0.75, epsilon = 1e-12);
    }

    #[test]
    fn test_bottom_lock_eroded() {
        // Bottom volume all in the early part, none in the last 20 sessions
        let mut points = vec![(10.0, 1000.0); 40];
        points.extend(vec![(15.0, 1000.0); 20]);
        let lock = PatternClassifier::default().bottom_lock(&bars(&points), 16.0);
        assert!(!lock.locked);
        assert!(lock.ratio_60d > 0.15);
        assert_relative_eq!(lock.ratio_20d, 0.0);
    }

    #[test]
    fn test_bottom_lock_price_under_window_low() {
        // Price below every close: the band is measured up to the window high
        let mut points = vec![(10.0, 1000.0); 20];
        points.extend(vec![(15.0, 1000.0); 20]);
        for i in 0..20 {
            let close = if i % 4 == 3 { 15.0 } else { 10.0 };
            points.push((close, 1000.0));
        }
        let lock = PatternClassifier::default().bottom_lock(&bars(&points), 8.0);
        assert!(lock.locked);
        assert_relative_eq!(lock.ratio_60d, 35.0 / 60.0, epsilon = 1e-12);
        assert_relative_eq!(lock.ratio_20d, 0.75, epsilon = 1e-12);

        // Band top is 10 + (15 - 10) * 0.2 = 11, so 11.5 is outside it
        let mut points = vec![(10.0, 1000.0); 20];
        points.extend(vec![(11.5, 1000.0); 20]);
        points.extend(vec![(15.0, 1000.0); 20]);
        let lock = PatternClassifier::default().bottom_lock(&bars(&points), 8.0);
        assert!(!lock.locked);
        assert_relative_eq!(lock.ratio_60d, 20.0 / 60.0, epsilon = 1e-12);
        assert_relative_eq!(lock.ratio_20d, 0.0);
    }

    #[test]
    fn test_bottom_lock_flat_window_unlocked() {
        let lock = PatternClassifier::default().bottom_lock(&bars(&vec![(10.0, 1000.0); 60]), 10.0);
        assert!(!lock.locked);
    }

    #[test]
    fn test_pattern_confidence_table() {
        assert_relative_eq!(pattern_confidence(PeakPattern::BottomSingle, false, 8.0, 10.0), 100.0);
        assert_relative_eq!(pattern_confidence(PeakPattern::BottomSingle, true, 20.0, 0.0), 85.0);
        assert_relative_eq!(pattern_confidence(PeakPattern::MidSingle, true, 12.0, 0.0), 85.0);
        assert_relative_eq!(pattern_confidence(PeakPattern::Double, true, 20.0, 0.0), 75.0);
        assert_relative_eq!(pattern_confidence(PeakPattern::Double, false, 20.0, 0.0), 80.0);
        assert_relative_eq!(pattern_confidence(PeakPattern::Double, false, 25.0, 0.0), 70.0);
        assert_relative_eq!(pattern_confidence(PeakPattern::HighSingle, false, 10.0, 0.0), 95.0);
        assert_relative_eq!(pattern_confidence(PeakPattern::Multi, false, 10.0, 0.0), 70.0);
        assert_relative_eq!(pattern_confidence(PeakPattern::Scattered, false, 10.0, 0.0), 50.0);
        assert_relative_eq!(pattern_confidence(PeakPattern::Unknown, false, 10.0, 0.0), 50.0);
    }
}
