/// Computes the arithmetic mean of a slice of values. Returns 0.0 for empty input.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Divides, treating a zero denominator as "no data" (0.0).
pub fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        0.0
    } else {
        numerator / denominator
    }
}

/// Percentage of `part` in `total`, 0.0 when `total` is zero.
pub fn pct(part: u64, total: u64) -> f64 {
    ratio(part as f64, total as f64) * 100.0
}
