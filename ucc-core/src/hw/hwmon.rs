//! sysfs hwmon backend
//!
//! Every channel is configured with explicit file paths; nothing is
//! discovered. Temperatures are read in millidegrees Celsius, speeds are
//! written as PWM values 0-255.
//!
//! PWM enable modes:
//! - 0 = disabled (no PWM output)
//! - 1 = manual (software control)
//! - 2 = automatic (hardware thermal control)

use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{HardwareActuatorPort, HardwareFloorPort, HardwareSensorPort};
use crate::constants::{pwm, temperature};
use crate::data::HardwareFloor;
use crate::error::{Result, UccError};

/// Files backing one fan channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HwmonChannelConfig {
    /// e.g. /sys/class/hwmon/hwmon3/temp1_input
    pub temp_input: PathBuf,
    /// e.g. /sys/class/hwmon/hwmon3/pwm1
    pub pwm: PathBuf,
    /// e.g. /sys/class/hwmon/hwmon3/pwm1_enable
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pwm_enable: Option<PathBuf>,
}

#[derive(Debug)]
pub struct HwmonBackend {
    channels: Vec<HwmonChannelConfig>,
    floor: HardwareFloor,
    /// Channels already switched to manual mode
    manual: Mutex<Vec<bool>>,
}

impl HwmonBackend {
    pub fn new(channels: Vec<HwmonChannelConfig>, floor: HardwareFloor) -> Self {
        let manual = Mutex::new(vec![false; channels.len()]);
        Self {
            channels,
            floor,
            manual,
        }
    }

    fn channel(&self, channel: usize) -> Result<&HwmonChannelConfig> {
        self.channels.get(channel).ok_or(UccError::ChannelOutOfRange {
            channel,
            count: self.channels.len(),
        })
    }

    /// Write `1` to `pwmN_enable` once per channel
    fn ensure_manual(&self, channel: usize, config: &HwmonChannelConfig) -> Result<()> {
        let mut manual = self.manual.lock();
        if manual.get(channel).copied().unwrap_or(false) {
            return Ok(());
        }
        if let Some(enable) = &config.pwm_enable {
            if enable.exists() {
                write_value(enable, pwm::ENABLE_MANUAL)?;
                info!(channel, path = %enable.display(), "Enabled manual PWM control");
            }
        }
        if let Some(flag) = manual.get_mut(channel) {
            *flag = true;
        }
        Ok(())
    }
}

fn read_trimmed(path: &Path) -> Result<String> {
    fs::read_to_string(path)
        .map(|s| s.trim().to_string())
        .map_err(|source| UccError::FileRead {
            path: path.to_path_buf(),
            source,
        })
}

fn write_value(path: &Path, value: u8) -> Result<()> {
    fs::write(path, value.to_string()).map_err(|source| UccError::FileWrite {
        path: path.to_path_buf(),
        source,
    })
}

impl HardwareSensorPort for HwmonBackend {
    fn read_temperature(&self, channel: usize) -> Result<i32> {
        let config = self.channel(channel)?;
        let content = read_trimmed(&config.temp_input).map_err(|e| UccError::TemperatureRead {
            channel,
            reason: e.to_string(),
        })?;

        let millidegrees = content.parse::<i32>().map_err(|e| UccError::TemperatureRead {
            channel,
            reason: format!("failed to parse '{}': {}", content, e),
        })?;

        Ok((millidegrees as f32 / temperature::MILLIDEGREE_DIVISOR).round() as i32)
    }

    fn read_fan_count(&self) -> Result<u32> {
        if self.channels.is_empty() {
            return Err(UccError::FanCountUnavailable("no hwmon channels configured".into()));
        }
        Ok(self.channels.len() as u32)
    }
}

impl HardwareActuatorPort for HwmonBackend {
    fn write_speed_percent(&self, channel: usize, percent: i32) -> Result<()> {
        let config = self.channel(channel)?;
        let to_write_error = |e: UccError| UccError::SpeedWrite {
            channel,
            percent,
            reason: e.to_string(),
        };

        self.ensure_manual(channel, config).map_err(to_write_error)?;

        let value = pwm::from_percent(percent);
        write_value(&config.pwm, value).map_err(to_write_error)?;
        debug!(channel, percent, pwm = value, "PWM written");
        Ok(())
    }

    fn read_speed_percent(&self, channel: usize) -> Result<i32> {
        let config = self.channel(channel)?;
        let content = read_trimmed(&config.pwm).map_err(|e| UccError::SpeedRead {
            channel,
            reason: e.to_string(),
        })?;
        let value = content.parse::<u8>().map_err(|e| UccError::SpeedRead {
            channel,
            reason: format!("failed to parse '{}': {}", content, e),
        })?;
        Ok(pwm::to_percent(value))
    }
}

impl HardwareFloorPort for HwmonBackend {
    fn min_speed_floor_percent(&self) -> i32 {
        self.floor.min_speed_floor
    }

    fn off_available(&self) -> bool {
        self.floor.off_available
    }
}
