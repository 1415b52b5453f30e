// Numeric helpers shared by the evaluation services

use crate::error::{AppError, Result};

/// Arithmetic mean; 0.0 for an empty slice
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Median with midpoint averaging for even lengths; 0.0 for an empty slice
pub fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Percentile `q` in [0, 100] with linear interpolation between closest ranks
pub fn percentile(values: &[f64], q: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let rank = (q.clamp(0.0, 100.0) / 100.0) * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let weight = rank - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * weight
}

/// `numerator / denominator`, or 0.0 when the denominator is zero.
/// Only for quantities that are defined as zero on empty input.
pub fn fraction(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        0.0
    } else {
        numerator / denominator
    }
}

/// `numerator / denominator`, failing when the denominator is zero
pub fn checked_ratio(numerator: f64, denominator: f64, what: &str) -> Result<f64> {
    if denominator == 0.0 || !denominator.is_finite() {
        return Err(AppError::UndefinedRatio(format!(
            "{}: denominator is {}",
            what, denominator
        )));
    }
    Ok(numerator / denominator)
}

/// Relative improvement of `a` over `b` in percent: `(a / b - 1) * 100`
pub fn relative_improvement(a: f64, b: f64, what: &str) -> Result<f64> {
    Ok((checked_ratio(a, b, what)? - 1.0) * 100.0)
}
