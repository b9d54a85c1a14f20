//! Small descriptive-statistics helpers shared by the metric modules.
//!
//! Population variance throughout (divide by `n`), and percentiles use
//! linear interpolation between closest ranks.

/// Arithmetic mean; 0.0 for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation; 0.0 for an empty slice.
pub fn std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    var.sqrt()
}

/// The p-th percentile (0..=100) with linear interpolation.
pub fn percentile(values: &[f64], p: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let rank = (p / 100.0).clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    if lo == hi {
        return sorted[lo];
    }
    let frac = rank - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

/// Median, i.e. the 50th percentile.
pub fn median(values: &[f64]) -> f64 {
    percentile(values, 50.0)
}

/// Least-squares slope of `y` against `x`; 0.0 when `x` has no spread.
pub fn slope(x: &[f64], y: &[f64]) -> f64 {
    if x.len() < 2 || x.len() != y.len() {
        return 0.0;
    }
    let xm = mean(x);
    let ym = mean(y);
    let num: f64 = x.iter().zip(y).map(|(a, b)| (a - xm) * (b - ym)).sum();
    let den: f64 = x.iter().map(|a| (a - xm).powi(2)).sum();
    if den == 0.0 { 0.0 } else { num / den }
}

/// Pearson correlation coefficient; 0.0 when either series is constant.
pub fn correlation(x: &[f64], y: &[f64]) -> f64 {
    if x.len() < 2 || x.len() != y.len() {
        return 0.0;
    }
    let xs = std_dev(x);
    let ys = std_dev(y);
    if xs == 0.0 || ys == 0.0 {
        return 0.0;
    }
    let xm = mean(x);
    let ym = mean(y);
    let num: f64 = x.iter().zip(y).map(|(a, b)| (a - xm) * (b - ym)).sum();
    num / (x.len() as f64 * xs * ys)
}

/// Coefficient of variation (`std / mean`); 0.0 for a non-positive mean.
pub fn coefficient_of_variation(values: &[f64]) -> f64 {
    let m = mean(values);
    if m <= 0.0 { 0.0 } else { std_dev(values) / m }
}

/* ===== tests ===== */

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentile_interpolates() {
        let values = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(percentile(&values, 0.0), 1.0);
        assert_eq!(percentile(&values, 100.0), 4.0);
        assert_eq!(percentile(&values, 50.0), 2.5);
        assert_eq!(percentile(&values, 25.0), 1.75);
    }

    #[test]
    fn median_of_odd_count_is_middle_value() {
        assert_eq!(median(&[9.0, 1.0, 5.0]), 5.0);
    }

    #[test]
    fn std_dev_is_population_variance() {
        // var([2,4,4,4,5,5,7,9]) = 4 with ddof=0
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert!((std_dev(&values) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn perfect_linear_relation() {
        let x = [0.0, 1.0, 2.0, 3.0];
        let y = [1.0, 3.0, 5.0, 7.0];
        assert!((slope(&x, &y) - 2.0).abs() < 1e-12);
        assert!((correlation(&x, &y) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn constant_series_has_no_correlation() {
        let x = [0.0, 1.0, 2.0];
        let y = [5.0, 5.0, 5.0];
        assert_eq!(correlation(&x, &y), 0.0);
        assert_eq!(slope(&x, &y), 0.0);
    }

    #[test]
    fn empty_inputs_are_zero() {
        assert_eq!(mean(&[]), 0.0);
        assert_eq!(std_dev(&[]), 0.0);
        assert_eq!(percentile(&[], 95.0), 0.0);
    }
}
