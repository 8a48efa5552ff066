//! Core data types for the fan control core
//!
//! Defines the policy, profile and telemetry structures shared by the engine,
//! the coordinator and the IPC layer.

use serde::{Deserialize, Serialize};

use crate::constants::{control, presets};
use crate::engine::FanCurve;
use crate::error::{Result, UccError};
use ucc_protocol::{CurvePoint, FanData, ProfileInfo, TimedValue};

use super::validation::{validate_offset, validate_percent};

/// One temperature -> speed entry of a fan curve
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Breakpoint {
    /// Temperature in °C
    pub temp: i32,
    /// Fan speed in percent (0-100)
    pub speed: i32,
}

impl Breakpoint {
    pub const fn new(temp: i32, speed: i32) -> Self {
        Self { temp, speed }
    }
}

impl From<CurvePoint> for Breakpoint {
    fn from(p: CurvePoint) -> Self {
        Self::new(p.temp, p.speed)
    }
}

impl From<Breakpoint> for CurvePoint {
    fn from(b: Breakpoint) -> Self {
        CurvePoint { temp: b.temp, speed: b.speed }
    }
}

/// Speed policy of the active profile, copied into every channel controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FanPolicy {
    pub min_speed: i32,
    pub max_speed: i32,
    /// Signed offset added to the curve output
    pub offset: i32,
    /// Drive every fan at the highest computed speed
    pub same_speed: bool,
}

impl Default for FanPolicy {
    fn default() -> Self {
        Self {
            min_speed: control::MIN_PERCENT,
            max_speed: control::MAX_PERCENT,
            offset: 0,
            same_speed: true,
        }
    }
}

/// Hardware limits queried once at startup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct HardwareFloor {
    /// Lowest speed the fans run reliably at (percent)
    pub min_speed_floor: i32,
    /// Whether the hardware can switch fans fully off
    pub off_available: bool,
}

impl HardwareFloor {
    pub fn new(min_speed_floor: i32, off_available: bool) -> Self {
        Self {
            min_speed_floor: min_speed_floor.clamp(control::MIN_PERCENT, control::MAX_PERCENT),
            off_available,
        }
    }
}

/// Which curve of a preset drives a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelRole {
    Cpu,
    Gpu,
}

impl ChannelRole {
    /// Channel 0 is the CPU fan, every other channel a GPU fan
    pub fn for_channel(index: usize) -> Self {
        if index == 0 {
            ChannelRole::Cpu
        } else {
            ChannelRole::Gpu
        }
    }
}

impl std::fmt::Display for ChannelRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChannelRole::Cpu => write!(f, "cpu"),
            ChannelRole::Gpu => write!(f, "gpu"),
        }
    }
}

/// A physical fan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FanChannel {
    pub index: usize,
    pub role: ChannelRole,
}

impl FanChannel {
    pub fn new(index: usize) -> Self {
        Self {
            index,
            role: ChannelRole::for_channel(index),
        }
    }
}

/// Timestamped sample (epoch milliseconds)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reading {
    pub timestamp_ms: i64,
    pub value: i32,
}

impl Reading {
    pub fn new(timestamp_ms: i64, value: i32) -> Self {
        Self { timestamp_ms, value }
    }

    pub fn unavailable() -> Self {
        Self::new(0, control::UNAVAILABLE)
    }

    pub fn is_available(&self) -> bool {
        self.value != control::UNAVAILABLE
    }
}

impl From<Reading> for TimedValue {
    fn from(r: Reading) -> Self {
        TimedValue { timestamp: r.timestamp_ms, data: r.value }
    }
}

/// Latest speed and temperature of one fan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FanReading {
    pub speed: Reading,
    pub temp: Reading,
}

impl Default for FanReading {
    fn default() -> Self {
        Self {
            speed: Reading::unavailable(),
            temp: Reading::unavailable(),
        }
    }
}

impl FanReading {
    pub fn to_fan_data(&self, channel: usize) -> FanData {
        FanData {
            channel: channel as u32,
            speed: self.speed.into(),
            temp: self.temp.into(),
        }
    }
}

/// Optional CPU and GPU curves
///
/// Used both for a profile's custom curves and for the runtime-only
/// temporary override applied through IPC.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CurvePair {
    #[serde(default)]
    pub cpu: Option<FanCurve>,
    #[serde(default)]
    pub gpu: Option<FanCurve>,
}

/// Runtime-only curve replacement that outranks the profile's curves
pub type TemporaryCurveOverride = CurvePair;

impl CurvePair {
    pub fn new(cpu: Option<FanCurve>, gpu: Option<FanCurve>) -> Self {
        Self { cpu, gpu }
    }

    /// The curve covering channels of the given role, if any
    pub fn curve_for(&self, role: ChannelRole) -> Option<&FanCurve> {
        match role {
            ChannelRole::Cpu => self.cpu.as_ref(),
            ChannelRole::Gpu => self.gpu.as_ref(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.cpu.is_none() && self.gpu.is_none()
    }
}

/// Fan-related part of a power profile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// Name of the curve preset, or `Custom` for `custom_curves`
    #[serde(default = "default_preset")]
    pub curve_preset: String,
    #[serde(flatten)]
    pub policy: FanPolicy,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_curves: Option<CurvePair>,
}

fn default_preset() -> String {
    presets::FALLBACK.to_string()
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            id: "default".to_string(),
            name: "Default".to_string(),
            curve_preset: default_preset(),
            policy: FanPolicy::default(),
            custom_curves: None,
        }
    }
}

impl Profile {
    /// Check policy ranges
    pub fn validate(&self) -> Result<()> {
        if self.id.is_empty() {
            return Err(UccError::invalid_profile("id", "must not be empty"));
        }
        validate_percent("min_speed", self.policy.min_speed)?;
        validate_percent("max_speed", self.policy.max_speed)?;
        validate_offset(self.policy.offset)?;
        if self.policy.min_speed > self.policy.max_speed {
            return Err(UccError::invalid_profile(
                "min_speed",
                format!(
                    "{} exceeds max_speed {}",
                    self.policy.min_speed, self.policy.max_speed
                ),
            ));
        }
        Ok(())
    }

    /// Copy of this profile with a different same-speed flag
    pub fn with_same_speed(&self, same_speed: bool) -> Self {
        let mut profile = self.clone();
        profile.policy.same_speed = same_speed;
        profile
    }
}

impl From<&Profile> for ProfileInfo {
    fn from(p: &Profile) -> Self {
        let custom = p.custom_curves.as_ref();
        ProfileInfo {
            id: p.id.clone(),
            name: p.name.clone(),
            fan_profile: p.curve_preset.clone(),
            minimum_fanspeed: p.policy.min_speed,
            maximum_fanspeed: p.policy.max_speed,
            offset_fanspeed: p.policy.offset,
            same_speed: p.policy.same_speed,
            custom_cpu: custom.and_then(|c| c.cpu.as_ref()).map(FanCurve::to_curve_points),
            custom_gpu: custom.and_then(|c| c.gpu.as_ref()).map(FanCurve::to_curve_points),
        }
    }
}

impl TryFrom<ProfileInfo> for Profile {
    type Error = UccError;

    fn try_from(info: ProfileInfo) -> Result<Self> {
        let cpu = info.custom_cpu.map(FanCurve::from_curve_points).transpose()?;
        let gpu = info.custom_gpu.map(FanCurve::from_curve_points).transpose()?;
        let custom_curves = Some(CurvePair::new(cpu, gpu)).filter(|c| !c.is_empty());

        let profile = Profile {
            id: info.id,
            name: info.name,
            curve_preset: info.fan_profile,
            policy: FanPolicy {
                min_speed: info.minimum_fanspeed,
                max_speed: info.maximum_fanspeed,
                offset: info.offset_fanspeed,
                same_speed: info.same_speed,
            },
            custom_curves,
        };
        profile.validate()?;
        Ok(profile)
    }
}
