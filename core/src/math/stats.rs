pub struct StatsHelper;

impl StatsHelper {
    /// Arithmetic mean, `None` for an empty sequence.
    pub fn mean(samples: &[f64]) -> Option<f64> {
        if samples.is_empty() {
            return None;
        }
        let sum: f64 = samples.iter().sum();
        Some(sum / samples.len() as f64)
    }

    pub fn mean_or_zero(samples: &[f64]) -> f64 {
        Self::mean(samples).unwrap_or(0.0)
    }
}
