//! Fan control engine modules
//!
//! Contains the curve engine, the temperature smoother, the preset library,
//! the per-channel controller and the coordinator worker.

mod controller;
mod coordinator;
mod curve;
mod presets;
mod smoother;

pub use controller::{FanChannelController, SpeedDecision};
pub use coordinator::{CoordinatorPorts, FanControlHandle, FanSubsystemCoordinator, HardwareSummary};
pub use curve::FanCurve;
pub use presets::{CurvePreset, PresetLibrary};
pub use smoother::TemperatureSmoother;
