//! Outlier-trimmed moving average for noisy temperature sensors

use std::collections::VecDeque;

use crate::constants::smoothing;

/// Keeps the last 13 samples and averages them after trimming extremes
///
/// While at least 9 samples remain, the current minimum and maximum are
/// dropped in pairs, so a full buffer is averaged over its middle 7 values.
/// With fewer than 9 samples the plain mean is returned.
#[derive(Debug, Clone)]
pub struct TemperatureSmoother {
    samples: VecDeque<i32>,
    capacity: usize,
}

impl Default for TemperatureSmoother {
    fn default() -> Self {
        Self::new()
    }
}

impl TemperatureSmoother {
    pub fn new() -> Self {
        Self {
            samples: VecDeque::with_capacity(smoothing::BUFFER_CAPACITY),
            capacity: smoothing::BUFFER_CAPACITY,
        }
    }

    /// Append a sample, evicting the oldest one when full
    pub fn add_value(&mut self, value: i32) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(value);
    }

    /// Trimmed, rounded mean of the buffered samples (0 when empty)
    pub fn filtered_value(&self) -> i32 {
        if self.samples.is_empty() {
            return 0;
        }

        let mut sorted: Vec<i32> = self.samples.iter().copied().collect();
        sorted.sort_unstable();

        let mut kept = &sorted[..];
        while kept.len() >= smoothing::TRIM_THRESHOLD {
            kept = &kept[1..kept.len() - 1];
        }

        let sum: i64 = kept.iter().map(|&v| v as i64).sum();
        (sum as f64 / kept.len() as f64).round() as i32
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_returns_zero() {
        assert_eq!(TemperatureSmoother::new().filtered_value(), 0);
    }

    #[test]
    fn test_cold_start_plain_mean() {
        let mut s = TemperatureSmoother::new();
        for v in [10, 20, 30] {
            s.add_value(v);
        }
        assert_eq!(s.filtered_value(), 20);
    }

    #[test]
    fn test_spike_rejected() {
        let mut s = TemperatureSmoother::new();
        for _ in 0..12 {
            s.add_value(30);
        }
        s.add_value(90);
        assert_eq!(s.len(), 13);
        assert_eq!(s.filtered_value(), 30);
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let mut s = TemperatureSmoother::new();
        for _ in 0..13 {
            s.add_value(100);
        }
        for _ in 0..13 {
            s.add_value(40);
        }
        assert_eq!(s.len(), 13);
        assert_eq!(s.filtered_value(), 40);
    }

    #[test]
    fn test_trims_to_middle_seven() {
        let mut s = TemperatureSmoother::new();
        // 1..=13: middle seven are 4..=10, mean 7
        for v in 1..=13 {
            s.add_value(v);
        }
        assert_eq!(s.filtered_value(), 7);

        let mut s = TemperatureSmoother::new();
        // 9 samples trim once to 7: drops 0 and 100
        for v in [0, 50, 50, 50, 50, 50, 50, 50, 100] {
            s.add_value(v);
        }
        assert_eq!(s.filtered_value(), 50);
    }

    #[test]
    fn test_eight_samples_not_trimmed() {
        let mut s = TemperatureSmoother::new();
        for v in [0, 0, 0, 0, 0, 0, 0, 100] {
            s.add_value(v);
        }
        // 100 / 8 = 12.5 rounds up
        assert_eq!(s.filtered_value(), 13);
    }

    #[test]
    fn test_mean_rounds() {
        let mut s = TemperatureSmoother::new();
        s.add_value(40);
        s.add_value(41);
        s.add_value(41);
        assert_eq!(s.filtered_value(), 41);
    }
}
