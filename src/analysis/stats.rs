//! Small descriptive statistics over `f64` slices.

/// Arithmetic mean, `None` for an empty slice.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Median, `None` for an empty slice.
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let n = sorted.len();
    if n % 2 == 1 {
        Some(sorted[n / 2])
    } else {
        Some((sorted[n / 2 - 1] + sorted[n / 2]) / 2.0)
    }
}

/// Sample standard deviation; 0 with fewer than two values.
pub fn stdev(values: &[f64]) -> f64 {
    let Some(m) = mean(values) else {
        return 0.0;
    };
    if values.len() < 2 {
        return 0.0;
    }
    let ss: f64 = values.iter().map(|v| (v - m) * (v - m)).sum();
    (ss / (values.len() - 1) as f64).sqrt()
}

/// `numerator / denominator`, `None` when the denominator is not positive.
pub fn ratio(numerator: f64, denominator: f64) -> Option<f64> {
    if denominator > 0.0 {
        Some(numerator / denominator)
    } else {
        None
    }
}

/// Relative change from `from` to `to`, `None` when `from` is zero.
pub fn relative_change(from: f64, to: f64) -> Option<f64> {
    if from.abs() > f64::EPSILON {
        Some((to - from) / from.abs())
    } else {
        None
    }
}
