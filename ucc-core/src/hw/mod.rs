//! Hardware access ports and backends
//!
//! The control loop only talks to hardware through these traits, so the
//! sysfs backend, the simulator and test fakes are interchangeable.
//!
//! - `hwmon` - explicitly configured sysfs files
//! - `simulated` - in-memory fans with a small thermal model

mod hwmon;
mod simulated;

use std::sync::Arc;

use crate::data::{HardwareFloor, Profile};
use crate::error::Result;

pub use hwmon::{HwmonBackend, HwmonChannelConfig};
pub use simulated::SimulatedBackend;

/// Temperature and fan count source
pub trait HardwareSensorPort: Send + Sync {
    /// Temperature of the sensor associated with `channel`, in °C
    fn read_temperature(&self, channel: usize) -> Result<i32>;

    fn read_fan_count(&self) -> Result<u32>;
}

/// Fan speed sink
pub trait HardwareActuatorPort: Send + Sync {
    fn write_speed_percent(&self, channel: usize, percent: i32) -> Result<()>;

    /// Speed currently reported by the hardware (used while control is disabled)
    fn read_speed_percent(&self, channel: usize) -> Result<i32>;
}

/// Fan limits of the machine
pub trait HardwareFloorPort: Send + Sync {
    fn min_speed_floor_percent(&self) -> i32;

    fn off_available(&self) -> bool;

    fn hardware_floor(&self) -> HardwareFloor {
        HardwareFloor::new(self.min_speed_floor_percent(), self.off_available())
    }
}

pub trait ActiveProfileAccessor: Send + Sync {
    fn current_profile(&self) -> Arc<Profile>;
}

pub trait ControlEnabledAccessor: Send + Sync {
    fn enabled(&self) -> bool;
}
