//! Data types and validation
//!
//! Contains the policy, profile and telemetry structures.

mod types;
mod validation;

pub use types::{
    Breakpoint, ChannelRole, CurvePair, FanChannel, FanPolicy, FanReading, HardwareFloor,
    Profile, Reading, TemporaryCurveOverride,
};
pub use validation::{validate_breakpoints, validate_offset, validate_percent};
