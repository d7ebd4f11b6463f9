//! Small statistics helpers used across the pipeline
//!
//! Predictor behavior is numerically sensitive to these definitions, so the
//! tie-breaking is explicit: an even-count median is the arithmetic mean of
//! the two middle values, and the standard deviation is the population form
//! (divide by N, not N-1).

/// Median of a slice. Returns 0.0 for an empty slice.
pub fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let n = sorted.len();
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    }
}

/// Median of integer samples, truncated toward zero
pub fn median_u32(values: &[u32]) -> u32 {
    let as_f64: Vec<f64> = values.iter().map(|&v| v as f64).collect();
    median(&as_f64) as u32
}

/// Population standard deviation. Returns 0.0 for fewer than two values.
pub fn population_stddev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    variance.sqrt()
}
