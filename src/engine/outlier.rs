//! Per-side statistical outlier removal.
//!
//! A price is only discarded when it fails *both* tests:
//! - it lies outside `median ± k·IQR` (k = 3.0 conservative, 1.5 aggressive)
//! - it is more than `max_deviation` (default 50%) away from the median
//!
//! All statistics are computed in decimal-odds space.

use crate::config::EngineConfig;

use super::book::PricePoint;

/// Median of an unsorted slice.
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    Some(percentile_sorted(&sorted, 0.5))
}

/// Linear-interpolated percentile of an ascending, non-empty slice.
fn percentile_sorted(sorted: &[f64], q: f64) -> f64 {
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpreadStats {
    pub median: f64,
    pub q1: f64,
    pub q3: f64,
}

impl SpreadStats {
    pub fn of(values: &[f64]) -> Option<SpreadStats> {
        if values.is_empty() {
            return None;
        }
        let mut sorted = values.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));
        Some(SpreadStats {
            median: percentile_sorted(&sorted, 0.5),
            q1: percentile_sorted(&sorted, 0.25),
            q3: percentile_sorted(&sorted, 0.75),
        })
    }

    pub fn iqr(&self) -> f64 {
        self.q3 - self.q1
    }
}

#[derive(Debug, Clone, Default)]
pub struct FilterOutcome {
    pub kept: Vec<PricePoint>,
    pub removed: Vec<PricePoint>,
}

/// Remove outliers from one side's prices.
///
/// Small sides are passed through untouched, as is any side where filtering
/// would leave fewer than `outlier_min_remaining` prices.
pub fn filter_side(points: Vec<PricePoint>, cfg: &EngineConfig) -> FilterOutcome {
    if !cfg.outlier_filter_enabled || points.len() < cfg.outlier_min_quotes {
        return FilterOutcome {
            kept: points,
            removed: Vec::new(),
        };
    }

    let decimals: Vec<f64> = points.iter().map(|p| p.decimal).collect();
    let Some(stats) = SpreadStats::of(&decimals) else {
        return FilterOutcome {
            kept: points,
            removed: Vec::new(),
        };
    };
    let band = cfg.outlier_mode.iqr_multiplier() * stats.iqr();
    let (lower, upper) = (stats.median - band, stats.median + band);

    let is_outlier = |decimal: f64| {
        let outside_iqr = decimal < lower || decimal > upper;
        let deviation = (decimal - stats.median).abs() / stats.median;
        outside_iqr && deviation > cfg.outlier_max_deviation
    };

    let (removed, kept): (Vec<PricePoint>, Vec<PricePoint>) =
        points.iter().cloned().partition(|p| is_outlier(p.decimal));

    if kept.len() < cfg.outlier_min_remaining {
        return FilterOutcome {
            kept: points,
            removed: Vec::new(),
        };
    }
    FilterOutcome { kept, removed }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OutlierMode;
    use crate::engine::odds::decimal_to_american;
    use crate::engine::testutil::now;
    use approx::assert_relative_eq;

    fn points(decimals: &[f64]) -> Vec<PricePoint> {
        decimals
            .iter()
            .enumerate()
            .map(|(i, d)| PricePoint {
                bookmaker: format!("Book{}", i),
                price: decimal_to_american(*d),
                decimal: *d,
                vendor_probability: None,
                is_live: false,
                captured_at: now(),
            })
            .collect()
    }

    #[test]
    fn test_median_even_and_odd() {
        assert_relative_eq!(median(&[3.0, 1.0, 2.0]).unwrap(), 2.0);
        assert_relative_eq!(median(&[4.0, 1.0, 2.0, 3.0]).unwrap(), 2.5);
        assert!(median(&[]).is_none());
    }

    #[test]
    fn test_quartiles_interpolate() {
        let s = SpreadStats::of(&[1.0, 2.0, 3.0, 4.0, 5.0]).unwrap();
        assert_relative_eq!(s.q1, 2.0);
        assert_relative_eq!(s.q3, 4.0);
        assert_relative_eq!(s.iqr(), 2.0);
    }

    #[test]
    fn wild_price_among_five_is_removed() {
        let cfg = EngineConfig::default();
        let out = filter_side(points(&[1.90, 1.91, 1.92, 1.95, 6.5]), &cfg);
        assert_eq!(out.kept.len(), 4);
        assert_eq!(out.removed.len(), 1);
        assert_relative_eq!(out.removed[0].decimal, 6.5);
    }

    #[test]
    fn same_deviation_with_three_quotes_is_kept() {
        let cfg = EngineConfig::default();
        let out = filter_side(points(&[1.90, 1.92, 6.5]), &cfg);
        assert_eq!(out.kept.len(), 3);
        assert!(out.removed.is_empty());
    }

    #[test]
    fn far_outside_iqr_but_close_to_median_is_kept() {
        // Tight cluster makes the IQR band tiny, but 2.3 is only ~20% off.
        let cfg = EngineConfig::default();
        let out = filter_side(points(&[1.90, 1.90, 1.91, 1.91, 2.30]), &cfg);
        assert_eq!(out.kept.len(), 5);
    }

    #[test]
    fn filtering_that_would_starve_the_side_is_skipped() {
        let cfg = EngineConfig {
            outlier_min_remaining: 4,
            ..EngineConfig::default()
        };
        let out = filter_side(points(&[1.90, 1.91, 1.92, 6.5]), &cfg);
        assert_eq!(out.kept.len(), 4);
        assert!(out.removed.is_empty());
    }

    #[test]
    fn aggressive_mode_uses_narrower_band() {
        assert!(OutlierMode::Aggressive.iqr_multiplier() < OutlierMode::Conservative.iqr_multiplier());
    }

    #[test]
    fn disabled_filter_passes_everything() {
        let cfg = EngineConfig {
            outlier_filter_enabled: false,
            ..EngineConfig::default()
        };
        let out = filter_side(points(&[1.90, 1.91, 1.92, 1.95, 6.5]), &cfg);
        assert_eq!(out.kept.len(), 5);
    }
}
