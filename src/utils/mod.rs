pub mod plot;

/// Evenly spaced values `low, low + step, ..` strictly below `high`
pub fn arange(low: f64, high: f64, step: f64) -> Vec<f64> {
    if step <= 0.0 || high <= low {
        return Vec::new();
    }
    let n = ((high - low) / step).ceil() as usize;
    (0..n).map(|i| low + i as f64 * step).collect()
}
