//! Last-known fan speed and temperature per channel
//!
//! Written by the fan coordinator once per tick, read by the IPC layer.
//! Readers get copies; the lock is only held for the copy.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;

use crate::data::{FanReading, Reading};

/// Current time in epoch milliseconds
pub fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

#[derive(Debug, Clone, Default)]
pub struct SharedTelemetryStore {
    readings: Arc<Mutex<Vec<FanReading>>>,
}

impl SharedTelemetryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite the readings of one channel
    pub fn publish(&self, channel: usize, temp: Reading, speed: Reading) {
        let mut readings = self.readings.lock();
        if readings.len() <= channel {
            readings.resize(channel + 1, FanReading::default());
        }
        readings[channel] = FanReading { speed, temp };
    }

    /// Drop all readings and size the store for `fan_count` channels
    pub fn reset(&self, fan_count: usize) {
        let mut readings = self.readings.lock();
        readings.clear();
        readings.resize(fan_count, FanReading::default());
    }

    pub fn fan_reading(&self, channel: usize) -> Option<FanReading> {
        self.readings.lock().get(channel).copied()
    }

    pub fn all(&self) -> Vec<FanReading> {
        self.readings.lock().clone()
    }

    pub fn fan_count(&self) -> usize {
        self.readings.lock().len()
    }
}
