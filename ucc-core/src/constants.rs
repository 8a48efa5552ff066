//! Constants and configuration values for the fan control core
//!
//! Centralizes the control-loop thresholds, timing defaults and paths.

use std::time::Duration;

/// Default filesystem locations
pub mod paths {
    /// Daemon configuration file
    pub const CONFIG_FILE: &str = "/etc/ucc/uccd.json";

    /// Unix socket the daemon listens on
    pub const SOCKET_PATH: &str = "/run/uccd.sock";
}

/// Worker timing
pub mod timing {
    use super::Duration;

    /// Default fan control tick interval in milliseconds
    pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;

    /// Shortest accepted tick interval in milliseconds
    pub const MIN_POLL_INTERVAL_MS: u64 = 100;

    /// How long `stop()` waits for a worker before reporting that it is still busy
    pub const WORKER_STOP_GRACE: Duration = Duration::from_millis(100);
}

/// Temperature smoothing
pub mod smoothing {
    /// Number of samples retained by the smoother
    pub const BUFFER_CAPACITY: usize = 13;

    /// Min/max trimming continues while at least this many samples remain
    pub const TRIM_THRESHOLD: usize = 9;
}

/// Per-channel control decision thresholds
pub mod control {
    /// Rate limiting only applies once the last applied speed is above this
    pub const RATE_LIMIT_ABOVE_PERCENT: i32 = 20;

    /// Largest allowed decrease per tick (percentage points)
    pub const MAX_DECREASE_PER_TICK: i32 = 2;

    /// At or above this temperature the fan is forced to full speed
    pub const CRITICAL_TEMP_C: i32 = 90;

    /// At or above this temperature the fan runs at least `HIGH_TEMP_MIN_SPEED`
    pub const HIGH_TEMP_C: i32 = 85;

    pub const HIGH_TEMP_MIN_SPEED: i32 = 80;

    /// Telemetry sentinel for an unavailable temperature or speed
    pub const UNAVAILABLE: i32 = -1;

    /// Channel count assumed when the fan count query fails but channel 0 reads
    pub const FALLBACK_FAN_COUNT: u32 = 2;

    pub const MIN_PERCENT: i32 = 0;
    pub const MAX_PERCENT: i32 = 100;

    /// Offset range accepted by policy setters
    pub const MAX_OFFSET_PERCENT: i32 = 100;
}

/// Curve presets
pub mod presets {
    /// Preset used when the requested name is unknown
    pub const FALLBACK: &str = "Balanced";

    /// Preset name that selects the profile's own custom curves
    pub const CUSTOM: &str = "Custom";

    /// Highest temperature covered by expanded preset tables
    pub const TABLE_MAX_TEMP_C: i32 = 100;
}

/// PWM register values
pub mod pwm {
    /// Maximum PWM value (full speed)
    pub const MAX_VALUE: u8 = 255;

    /// Value written to `pwmN_enable` for manual control
    pub const ENABLE_MANUAL: u8 = 1;

    /// Convert percentage (0-100) to PWM value (0-255)
    #[inline]
    pub fn from_percent(percent: i32) -> u8 {
        let clamped = percent.clamp(0, 100) as f32;
        (clamped / 100.0 * MAX_VALUE as f32).round() as u8
    }

    /// Convert PWM value (0-255) to percentage (0-100)
    #[inline]
    pub fn to_percent(value: u8) -> i32 {
        (value as f32 / MAX_VALUE as f32 * 100.0).round() as i32
    }
}

/// hwmon temperatures are reported in millidegrees Celsius
pub mod temperature {
    pub const MILLIDEGREE_DIVISOR: f32 = 1000.0;
}

/// IPC client timeouts
pub mod ipc {
    use super::Duration;

    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);
    pub const READ_TIMEOUT: Duration = Duration::from_secs(5);
    pub const WRITE_TIMEOUT: Duration = Duration::from_secs(5);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pwm_conversion() {
        assert_eq!(pwm::from_percent(0), 0);
        assert_eq!(pwm::from_percent(100), 255);
        assert_eq!(pwm::from_percent(50), 128);
        assert_eq!(pwm::from_percent(150), 255);
        assert_eq!(pwm::to_percent(255), 100);
        assert_eq!(pwm::to_percent(128), 50);
    }

    #[test]
    fn test_thresholds_are_ordered() {
        assert!(control::HIGH_TEMP_C < control::CRITICAL_TEMP_C);
        assert!(smoothing::TRIM_THRESHOLD <= smoothing::BUFFER_CAPACITY);
        assert!(timing::MIN_POLL_INTERVAL_MS <= timing::DEFAULT_POLL_INTERVAL_MS);
    }
}
