//! UCC Core Library
//!
//! Closed-loop fan control for laptops.
//!
//! # Features
//!
//! - **Periodic workers**: start/tick/stop lifecycle on a dedicated thread
//! - **Smoothing**: outlier-trimmed moving average of sensor samples
//! - **Fan curves**: interpolated temperature -> speed tables and built-in presets
//! - **Control decisions**: policy clamps, hardware floor, rate limiting, critical overrides
//! - **Coordination**: one loop over all fans with same-speed mode and temporary curves
//!
//! # Module Structure
//!
//! - `data/` - Data types and validation
//! - `engine/` - Curves, smoothing, per-channel control and the coordinator
//! - `hw/` - Hardware ports and backends
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use ucc_core::{
//!     ControlSettings, CoordinatorPorts, FanSubsystemCoordinator, HardwareFloor,
//!     PeriodicWorker, SimulatedBackend,
//! };
//!
//! let backend = Arc::new(SimulatedBackend::new(2, HardwareFloor::default()));
//! let settings = Arc::new(ControlSettings::default());
//! let coordinator = FanSubsystemCoordinator::new(CoordinatorPorts::from_backend(backend, settings));
//! let handle = coordinator.handle();
//!
//! let mut worker = PeriodicWorker::new(coordinator, Duration::from_secs(1), true).unwrap();
//! println!("{:?}", handle.telemetry().all());
//! worker.stop();
//! ```

// Grouped modules
pub mod data;
pub mod engine;
pub mod hw;

// Standalone modules
pub mod constants;
pub mod daemon_client;
pub mod settings;
pub mod telemetry;
pub mod worker;

pub use ucc_error as error;

pub use data::{
    Breakpoint, ChannelRole, CurvePair, FanChannel, FanPolicy, FanReading, HardwareFloor,
    Profile, Reading, TemporaryCurveOverride,
};

pub use error::{Result, UccError};

pub use engine::{
    CoordinatorPorts, CurvePreset, FanChannelController, FanControlHandle, FanCurve,
    FanSubsystemCoordinator, HardwareSummary, PresetLibrary, SpeedDecision, TemperatureSmoother,
};

pub use hw::{
    ActiveProfileAccessor, ControlEnabledAccessor, HardwareActuatorPort, HardwareFloorPort,
    HardwareSensorPort, HwmonBackend, HwmonChannelConfig, SimulatedBackend,
};

pub use daemon_client::{is_daemon_available, DaemonClient};
pub use settings::ControlSettings;
pub use telemetry::{now_ms, SharedTelemetryStore};
pub use worker::{PeriodicWorker, Worker};
