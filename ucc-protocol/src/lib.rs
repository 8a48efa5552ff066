//! Shared IPC protocol types for uccd
//!
//! Requests and responses are exchanged as one JSON document per line over
//! the daemon's Unix socket. Both sides validate requests before acting on them.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Global request ID counter for correlation
static REQUEST_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Maximum message size for IPC (16KB)
pub const MAX_MESSAGE_SIZE: usize = 16 * 1024;

/// Maximum number of breakpoints accepted in one curve
pub const MAX_CURVE_POINTS: usize = 128;

/// Maximum number of temperatures in one preview request
pub const MAX_PREVIEW_TEMPERATURES: usize = 256;

/// Highest fan channel index a client may address
pub const MAX_CHANNEL_INDEX: u32 = 15;

/// Plausible temperature range for curve points and previews (°C)
pub const MIN_TEMPERATURE: i32 = -50;
pub const MAX_TEMPERATURE: i32 = 150;

/// Maximum length of profile ids, names and preset names
const MAX_NAME_LENGTH: usize = 64;

/// Generate a unique request ID for correlation
pub fn generate_request_id() -> u64 {
    REQUEST_ID_COUNTER.fetch_add(1, Ordering::SeqCst)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestEnvelope {
    /// Unique request ID for correlation and debugging
    pub id: u64,
    /// The actual request
    #[serde(flatten)]
    pub request: Request,
}

impl RequestEnvelope {
    pub fn new(request: Request) -> Self {
        Self {
            id: generate_request_id(),
            request,
        }
    }

    pub fn with_id(request: Request, id: u64) -> Self {
        Self { id, request }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "cmd", content = "data")]
pub enum Request {
    Ping,
    Version,
    GetFanData { channel: u32 },
    GetAllFanData,
    GetHardwareInfo,
    GetFanControlEnabled,
    SetFanControlEnabled { enabled: bool },
    GetActiveProfile,
    SetActiveProfile { profile: ProfileInfo },
    SetSameSpeed { same_speed: bool },
    ListPresets,
    /// Evaluate a preset curve at the given temperatures (profile editor preview)
    PreviewCurve {
        preset: String,
        gpu: bool,
        temperatures: Vec<i32>,
    },
    SetTemporaryCurves {
        cpu: Option<Vec<CurvePoint>>,
        gpu: Option<Vec<CurvePoint>>,
    },
    ClearTemporaryCurves,
}

impl Request {
    /// Validate request parameters before sending to daemon
    pub fn validate(&self) -> Result<(), String> {
        match self {
            Request::Ping
            | Request::Version
            | Request::GetAllFanData
            | Request::GetHardwareInfo
            | Request::GetFanControlEnabled
            | Request::SetFanControlEnabled { .. }
            | Request::GetActiveProfile
            | Request::SetSameSpeed { .. }
            | Request::ListPresets
            | Request::ClearTemporaryCurves => Ok(()),

            Request::GetFanData { channel } => validate_channel(*channel),

            Request::SetActiveProfile { profile } => profile.validate(),

            Request::PreviewCurve { preset, temperatures, .. } => {
                validate_name("preset", preset)?;
                if temperatures.len() > MAX_PREVIEW_TEMPERATURES {
                    return Err(format!(
                        "Too many preview temperatures: {} > {}",
                        temperatures.len(),
                        MAX_PREVIEW_TEMPERATURES
                    ));
                }
                temperatures.iter().try_for_each(|t| validate_temperature(*t))
            }

            Request::SetTemporaryCurves { cpu, gpu } => {
                if let Some(points) = cpu {
                    validate_curve_points(points)?;
                }
                if let Some(points) = gpu {
                    validate_curve_points(points)?;
                }
                Ok(())
            }
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Request::Ping => "Ping",
            Request::Version => "Version",
            Request::GetFanData { .. } => "GetFanData",
            Request::GetAllFanData => "GetAllFanData",
            Request::GetHardwareInfo => "GetHardwareInfo",
            Request::GetFanControlEnabled => "GetFanControlEnabled",
            Request::SetFanControlEnabled { .. } => "SetFanControlEnabled",
            Request::GetActiveProfile => "GetActiveProfile",
            Request::SetActiveProfile { .. } => "SetActiveProfile",
            Request::SetSameSpeed { .. } => "SetSameSpeed",
            Request::ListPresets => "ListPresets",
            Request::PreviewCurve { .. } => "PreviewCurve",
            Request::SetTemporaryCurves { .. } => "SetTemporaryCurves",
            Request::ClearTemporaryCurves => "ClearTemporaryCurves",
        }
    }

    /// Requests that change daemon state (audited by the server)
    pub fn is_mutating(&self) -> bool {
        matches!(
            self,
            Request::SetFanControlEnabled { .. }
                | Request::SetActiveProfile { .. }
                | Request::SetSameSpeed { .. }
                | Request::SetTemporaryCurves { .. }
                | Request::ClearTemporaryCurves
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    /// Request ID this response corresponds to
    pub id: u64,
    /// The actual response
    #[serde(flatten)]
    pub response: Response,
}

impl ResponseEnvelope {
    pub fn new(id: u64, response: Response) -> Self {
        Self { id, response }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status")]
pub enum Response {
    #[serde(rename = "ok")]
    Ok(ResponseData),
    #[serde(rename = "error")]
    Error { message: String },
}

/// Response payload; only the field matching the request is populated
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResponseData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fan: Option<FanData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fans: Option<Vec<FanData>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hardware: Option<HardwareInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<ProfileInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub presets: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speeds: Option<Vec<i32>>,
}

impl ResponseData {
    pub fn none() -> Self { Self::default() }
    pub fn string(v: String) -> Self { Self { value: Some(v), ..Self::default() } }
    pub fn fan_data(f: FanData) -> Self { Self { fan: Some(f), ..Self::default() } }
    pub fn fan_list(f: Vec<FanData>) -> Self { Self { fans: Some(f), ..Self::default() } }
    pub fn hw(h: HardwareInfo) -> Self { Self { hardware: Some(h), ..Self::default() } }
    pub fn flag(e: bool) -> Self { Self { enabled: Some(e), ..Self::default() } }
    pub fn active_profile(p: ProfileInfo) -> Self { Self { profile: Some(p), ..Self::default() } }
    pub fn preset_names(p: Vec<String>) -> Self { Self { presets: Some(p), ..Self::default() } }
    pub fn speed_list(s: Vec<i32>) -> Self { Self { speeds: Some(s), ..Self::default() } }
}

impl Response {
    pub fn ok() -> Self {
        Response::Ok(ResponseData::none())
    }

    pub fn ok_string(s: impl Into<String>) -> Self {
        Response::Ok(ResponseData::string(s.into()))
    }

    pub fn ok_data(data: ResponseData) -> Self {
        Response::Ok(data)
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Response::Error { message: msg.into() }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Response::Ok(_))
    }
}

/// One temperature -> speed breakpoint on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurvePoint {
    pub temp: i32,
    pub speed: i32,
}

/// Timestamped sample (epoch milliseconds)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TimedValue {
    pub timestamp: i64,
    pub data: i32,
}

/// Latest speed and temperature of one fan; `-1` marks an unavailable value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FanData {
    pub channel: u32,
    pub speed: TimedValue,
    pub temp: TimedValue,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HardwareInfo {
    pub fan_count: u32,
    pub min_speed_floor: i32,
    pub off_available: bool,
    pub temporary_curves_active: bool,
}

/// Fan-related part of the active profile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileInfo {
    pub id: String,
    pub name: String,
    pub fan_profile: String,
    pub minimum_fanspeed: i32,
    pub maximum_fanspeed: i32,
    pub offset_fanspeed: i32,
    pub same_speed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_cpu: Option<Vec<CurvePoint>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_gpu: Option<Vec<CurvePoint>>,
}

impl ProfileInfo {
    pub fn validate(&self) -> Result<(), String> {
        validate_name("id", &self.id)?;
        validate_name("name", &self.name)?;
        validate_name("fan_profile", &self.fan_profile)?;
        validate_percent(self.minimum_fanspeed)?;
        validate_percent(self.maximum_fanspeed)?;
        if self.minimum_fanspeed > self.maximum_fanspeed {
            return Err(format!(
                "Minimum fan speed {} exceeds maximum {}",
                self.minimum_fanspeed, self.maximum_fanspeed
            ));
        }
        if !(-100..=100).contains(&self.offset_fanspeed) {
            return Err(format!("Fan speed offset out of range (-100..100): {}", self.offset_fanspeed));
        }
        if let Some(points) = &self.custom_cpu {
            validate_curve_points(points)?;
        }
        if let Some(points) = &self.custom_gpu {
            validate_curve_points(points)?;
        }
        Ok(())
    }
}

pub fn validate_channel(channel: u32) -> Result<(), String> {
    if channel > MAX_CHANNEL_INDEX {
        return Err(format!("Fan channel out of range (0-{}): {}", MAX_CHANNEL_INDEX, channel));
    }
    Ok(())
}

pub fn validate_percent(percent: i32) -> Result<(), String> {
    if !(0..=100).contains(&percent) {
        return Err(format!("Percentage out of range (0-100): {}", percent));
    }
    Ok(())
}

pub fn validate_temperature(temp: i32) -> Result<(), String> {
    if !(MIN_TEMPERATURE..=MAX_TEMPERATURE).contains(&temp) {
        return Err(format!(
            "Temperature out of range ({}-{}): {}",
            MIN_TEMPERATURE, MAX_TEMPERATURE, temp
        ));
    }
    Ok(())
}

/// Curve points must be non-empty, bounded, in range and sorted by temperature
pub fn validate_curve_points(points: &[CurvePoint]) -> Result<(), String> {
    if points.is_empty() {
        return Err("Curve must contain at least one point".into());
    }
    if points.len() > MAX_CURVE_POINTS {
        return Err(format!("Too many curve points: {} > {}", points.len(), MAX_CURVE_POINTS));
    }
    for point in points {
        validate_temperature(point.temp)?;
        validate_percent(point.speed)?;
    }
    if points.windows(2).any(|w| w[1].temp < w[0].temp) {
        return Err("Curve temperatures must be non-decreasing".into());
    }
    Ok(())
}

fn validate_name(field: &str, value: &str) -> Result<(), String> {
    if value.len() > MAX_NAME_LENGTH {
        return Err(format!("{} too long: {} > {} chars", field, value.len(), MAX_NAME_LENGTH));
    }
    if value.chars().any(|c| c.is_control()) {
        return Err(format!("{} contains control characters", field));
    }
    Ok(())
}
