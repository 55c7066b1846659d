use std::collections::VecDeque;

pub const DEFAULT_WINDOW_SIZE: usize = 60;
pub const DEFAULT_THRESHOLD_SIGMA: f64 = 3.0;

/// Intensity saturates at this many sigmas above the mean.
const SATURATION_SIGMA: f64 = 5.0;

/// Online z-score spike detection over a bounded window of message-rate
/// samples.
///
/// Running sum and sum-of-squares give O(1) updates per sample. The
/// running-sums variance is numerically inferior to Welford's recurrence
/// but holds up fine for chat rates (0..1000 msg/s, short windows).
pub struct SpikeDetector {
    samples: VecDeque<f64>,
    window_size: usize,
    threshold_sigma: f64,
    sum: f64,
    sum_sq: f64,
}

impl SpikeDetector {
    pub fn new(window_size: usize, threshold_sigma: f64) -> Self {
        Self {
            samples: VecDeque::with_capacity(window_size.max(1)),
            window_size: window_size.max(1),
            threshold_sigma,
            sum: 0.0,
            sum_sq: 0.0,
        }
    }

    /// Push a rate sample, evicting the oldest once the window is full.
    pub fn add_sample(&mut self, rate: f64) {
        self.samples.push_back(rate);
        self.sum += rate;
        self.sum_sq += rate * rate;

        if self.samples.len() > self.window_size {
            if let Some(evicted) = self.samples.pop_front() {
                self.sum -= evicted;
                self.sum_sq -= evicted * evicted;
            }
        }
    }

    /// Whether the latest sample sits more than `threshold_sigma` above
    /// the window mean. Degenerate windows (fewer than two samples, zero
    /// deviation) never count as spikes.
    pub fn is_spike(&self) -> bool {
        self.z_score()
            .is_some_and(|z| z > self.threshold_sigma)
    }

    /// Latest z-score scaled into [0, 1], saturating at five sigma.
    /// 0.0 on degenerate windows.
    pub fn spike_intensity(&self) -> f64 {
        self.z_score()
            .map(|z| (z / SATURATION_SIGMA).clamp(0.0, 1.0))
            .unwrap_or(0.0)
    }

    /// Mean of the current window; 0.0 when empty.
    pub fn baseline(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        self.sum / self.samples.len() as f64
    }

    pub fn reset(&mut self) {
        self.samples.clear();
        self.sum = 0.0;
        self.sum_sq = 0.0;
    }

    fn z_score(&self) -> Option<f64> {
        if self.samples.len() < 2 {
            return None;
        }
        let n = self.samples.len() as f64;
        let mean = self.sum / n;
        let variance = (self.sum_sq / n - mean * mean).max(0.0);
        let std_dev = variance.sqrt();
        if std_dev == 0.0 {
            return None;
        }
        let latest = *self.samples.back()?;
        Some((latest - mean) / std_dev)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn too_few_samples_are_neutral() {
        let mut detector = SpikeDetector::new(60, 3.0);
        assert!(!detector.is_spike());
        assert_eq!(detector.spike_intensity(), 0.0);
        assert_eq!(detector.baseline(), 0.0);

        detector.add_sample(5.0);
        assert!(!detector.is_spike());
        assert_eq!(detector.spike_intensity(), 0.0);
        assert_eq!(detector.baseline(), 5.0);
    }

    #[test]
    fn flat_window_is_never_a_spike() {
        let mut detector = SpikeDetector::new(60, 3.0);
        for _ in 0..50 {
            detector.add_sample(5.0);
        }
        assert!(!detector.is_spike());
        assert_eq!(detector.spike_intensity(), 0.0);
        assert_eq!(detector.baseline(), 5.0);
    }

    #[test]
    fn jump_after_flat_baseline_spikes() {
        let mut detector = SpikeDetector::new(60, 3.0);
        for _ in 0..50 {
            detector.add_sample(5.0);
        }
        detector.add_sample(25.0);

        assert!(detector.is_spike());
        let intensity = detector.spike_intensity();
        assert!(intensity > 0.6, "intensity {intensity} too low");
        assert!(intensity <= 1.0);
    }

    #[test]
    fn spike_implies_intensity_above_scaled_threshold() {
        let mut detector = SpikeDetector::new(60, 3.0);
        for i in 0..40 {
            detector.add_sample(5.0 + f64::from(i % 3) * 0.1);
        }
        detector.add_sample(50.0);
        assert!(detector.is_spike());
        assert!(detector.spike_intensity() > 3.0 / 5.0);
    }

    #[test]
    fn below_mean_sample_has_zero_intensity() {
        let mut detector = SpikeDetector::new(60, 3.0);
        for i in 0..20 {
            detector.add_sample(5.0 + f64::from(i % 2));
        }
        detector.add_sample(0.0);
        assert!(!detector.is_spike());
        assert_eq!(detector.spike_intensity(), 0.0);
    }

    #[test]
    fn eviction_keeps_running_sums_consistent() {
        let mut detector = SpikeDetector::new(8, 3.0);
        for i in 0..100 {
            detector.add_sample(f64::from(i % 13));
        }
        assert_eq!(detector.samples.len(), 8);

        let expected_mean =
            detector.samples.iter().sum::<f64>() / detector.samples.len() as f64;
        assert!((detector.baseline() - expected_mean).abs() < 1e-9);

        let expected_sum_sq: f64 = detector.samples.iter().map(|s| s * s).sum();
        assert!((detector.sum_sq - expected_sum_sq).abs() < 1e-6);
    }

    #[test]
    fn reset_clears_state() {
        let mut detector = SpikeDetector::new(60, 3.0);
        for _ in 0..10 {
            detector.add_sample(7.0);
        }
        detector.reset();
        assert_eq!(detector.baseline(), 0.0);
        assert!(!detector.is_spike());
        assert_eq!(detector.spike_intensity(), 0.0);
    }

    #[test]
    fn intensity_saturates_at_one() {
        let mut detector = SpikeDetector::new(60, 3.0);
        for i in 0..59 {
            detector.add_sample(10.0 + f64::from(i % 2) * 0.001);
        }
        detector.add_sample(10_000.0);
        assert_eq!(detector.spike_intensity(), 1.0);
    }
}
