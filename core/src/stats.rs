//! Outcome statistics.
//!
//! Percentile rule (fixed): sort ascending with `total_cmp`, then
//! linearly interpolate between the closest ranks at
//! rank = p / 100 × (n − 1). The rule is monotone in p over a sorted
//! array, so P10 ≤ P50 ≤ P90 and every percentile lies in [min, max].

use serde::{Deserialize, Serialize};

pub const P10: f64 = 10.0;
pub const P50: f64 = 50.0;
pub const P90: f64 = 90.0;

/// Percentile over an ascending-sorted slice. `p` is clamped to [0, 100].
pub fn percentile_sorted(sorted: &[f64], p: f64) -> f64 {
    match sorted.len() {
        0 => return 0.0,
        1 => return sorted[0],
        _ => {}
    }

    let rank = (p.clamp(0.0, 100.0) / 100.0) * (sorted.len() as f64 - 1.0);
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;

    if lower == upper {
        sorted[lower]
    } else {
        let w = rank - lower as f64;
        // Stays within [sorted[lower], sorted[upper]] for w in [0, 1].
        (sorted[lower] + w * (sorted[upper] - sorted[lower]))
            .min(sorted[upper])
            .max(sorted[lower])
    }
}

/// Several percentiles from one unsorted array. The input is not modified.
pub fn percentiles(values: &[f64], ps: &[f64]) -> Vec<f64> {
    let sorted = sorted_copy(values);
    ps.iter().map(|&p| percentile_sorted(&sorted, p)).collect()
}

fn sorted_copy(values: &[f64]) -> Vec<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    sorted
}

/// Summary of one outcome distribution (cost or schedule).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OutcomeSummary {
    pub mean: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
    pub p10: f64,
    pub p50: f64,
    pub p90: f64,
}

impl OutcomeSummary {
    pub fn from_outcomes(values: &[f64]) -> Self {
        if values.is_empty() {
            return Self {
                mean: 0.0,
                std_dev: 0.0,
                min: 0.0,
                max: 0.0,
                p10: 0.0,
                p50: 0.0,
                p90: 0.0,
            };
        }

        let sorted = sorted_copy(values);
        let n = sorted.len() as f64;
        let mean = sorted.iter().sum::<f64>() / n;
        let variance = if sorted.len() > 1 {
            sorted.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0)
        } else {
            0.0
        };

        Self {
            mean,
            std_dev: variance.sqrt(),
            min: sorted[0],
            max: sorted[sorted.len() - 1],
            p10: percentile_sorted(&sorted, P10),
            p50: percentile_sorted(&sorted, P50),
            p90: percentile_sorted(&sorted, P90),
        }
    }

    /// Reserve needed above the median to reach P90.
    pub fn contingency(&self) -> f64 {
        self.p90 - self.p50
    }
}

/// Pearson sample correlation. Zero when either series is constant.
pub fn pearson_correlation(xs: &[f64], ys: &[f64]) -> f64 {
    let n = xs.len().min(ys.len());
    if n < 2 {
        return 0.0;
    }
    let (xs, ys) = (&xs[..n], &ys[..n]);
    let mean_x = xs.iter().sum::<f64>() / n as f64;
    let mean_y = ys.iter().sum::<f64>() / n as f64;

    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (x, y) in xs.iter().zip(ys) {
        let dx = x - mean_x;
        let dy = y - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    if var_x <= 0.0 || var_y <= 0.0 {
        return 0.0;
    }
    (cov / (var_x.sqrt() * var_y.sqrt())).clamp(-1.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_approx(a: f64, b: f64) {
        assert!((a - b).abs() < 1e-9, "{a} != {b}");
    }

    #[test]
    fn percentile_interpolates_between_points() {
        let sorted = [1.0, 2.0, 3.0, 4.0];
        assert_approx(percentile_sorted(&sorted, 25.0), 1.75);
        assert_approx(percentile_sorted(&sorted, 50.0), 2.5);
        assert_approx(percentile_sorted(&sorted, 0.0), 1.0);
        assert_approx(percentile_sorted(&sorted, 100.0), 4.0);
    }

    #[test]
    fn percentiles_do_not_depend_on_input_order() {
        let a = percentiles(&[5.0, 1.0, 4.0, 2.0, 3.0], &[P10, P50, P90]);
        let b = percentiles(&[1.0, 2.0, 3.0, 4.0, 5.0], &[P10, P50, P90]);
        assert_eq!(a, b);
        assert_approx(a[1], 3.0);
    }

    #[test]
    fn recomputation_is_idempotent() {
        let values: Vec<f64> = (0..1000).map(|i| ((i * 7919) % 1000) as f64 * 0.37).collect();
        let first = OutcomeSummary::from_outcomes(&values);
        let second = OutcomeSummary::from_outcomes(&values);
        assert_eq!(first, second);
    }

    #[test]
    fn summary_orders_percentiles_within_bounds() {
        let s = OutcomeSummary::from_outcomes(&[3.0, -1.0, 10.0, 7.5, 0.0, 2.0]);
        assert!(s.min <= s.p10 && s.p10 <= s.p50 && s.p50 <= s.p90 && s.p90 <= s.max);
        assert_approx(s.min, -1.0);
        assert_approx(s.max, 10.0);
        assert!(s.contingency() >= 0.0);
    }

    #[test]
    fn constant_series_have_zero_spread() {
        let s = OutcomeSummary::from_outcomes(&[4.0; 10]);
        assert_eq!(s.std_dev, 0.0);
        assert_eq!(s.p10, 4.0);
        assert_eq!(s.p90, 4.0);
        assert_eq!(pearson_correlation(&[4.0; 10], &[1.0; 10]), 0.0);
    }

    #[test]
    fn pearson_detects_linear_relationships() {
        let xs: Vec<f64> = (0..100).map(|i| i as f64).collect();
        let ys: Vec<f64> = xs.iter().map(|x| 3.0 * x - 2.0).collect();
        let zs: Vec<f64> = xs.iter().map(|x| -x).collect();
        assert_approx(pearson_correlation(&xs, &ys), 1.0);
        assert_approx(pearson_correlation(&xs, &zs), -1.0);
    }
}
