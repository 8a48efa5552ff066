//! In-memory fan backend
//!
//! Each fan has a temperature that drifts toward an equilibrium set by its
//! load and pulled down by its current speed. Every temperature read
//! advances the model by one step, so a coordinator ticking once per
//! interval sees a plausible thermal response.

use parking_lot::Mutex;

use super::{HardwareActuatorPort, HardwareFloorPort, HardwareSensorPort};
use crate::constants::control;
use crate::data::HardwareFloor;
use crate::error::{Result, UccError};

/// °C removed from the equilibrium at 100% fan speed
const FULL_SPEED_COOLING_C: f64 = 30.0;

/// Fraction of the distance to equilibrium covered per step
const RESPONSE_RATE: f64 = 0.2;

const AMBIENT_C: f64 = 35.0;

#[derive(Debug, Clone)]
struct SimFan {
    temp: f64,
    load_temp: f64,
    speed: i32,
    sensor_failed: bool,
}

#[derive(Debug)]
pub struct SimulatedBackend {
    fans: Mutex<Vec<SimFan>>,
    floor: HardwareFloor,
}

impl SimulatedBackend {
    /// `fan_count` fans idling at a moderate load
    pub fn new(fan_count: usize, floor: HardwareFloor) -> Self {
        let fans = (0..fan_count)
            .map(|i| SimFan {
                temp: AMBIENT_C,
                load_temp: if i == 0 { 70.0 } else { 60.0 },
                speed: 0,
                sensor_failed: false,
            })
            .collect();
        Self {
            fans: Mutex::new(fans),
            floor,
        }
    }

    /// Equilibrium temperature of a fan at 0% speed
    pub fn set_load(&self, channel: usize, load_temp: i32) -> Result<()> {
        self.with_fan(channel, |fan| fan.load_temp = load_temp as f64)
    }

    /// Force a temperature, e.g. to script a heat spike
    pub fn set_temperature(&self, channel: usize, temp: i32) -> Result<()> {
        self.with_fan(channel, |fan| fan.temp = temp as f64)
    }

    /// Make temperature reads of `channel` fail
    pub fn set_sensor_failure(&self, channel: usize, failed: bool) -> Result<()> {
        self.with_fan(channel, |fan| fan.sensor_failed = failed)
    }

    fn with_fan<T>(&self, channel: usize, f: impl FnOnce(&mut SimFan) -> T) -> Result<T> {
        let mut fans = self.fans.lock();
        let count = fans.len();
        fans.get_mut(channel)
            .map(f)
            .ok_or(UccError::ChannelOutOfRange { channel, count })
    }
}

impl HardwareSensorPort for SimulatedBackend {
    fn read_temperature(&self, channel: usize) -> Result<i32> {
        self.with_fan(channel, |fan| {
            if fan.sensor_failed {
                return Err(UccError::TemperatureRead {
                    channel,
                    reason: "simulated sensor failure".into(),
                });
            }
            let equilibrium = fan.load_temp - FULL_SPEED_COOLING_C * fan.speed as f64 / 100.0;
            fan.temp += (equilibrium - fan.temp) * RESPONSE_RATE;
            Ok(fan.temp.round() as i32)
        })?
    }

    fn read_fan_count(&self) -> Result<u32> {
        Ok(self.fans.lock().len() as u32)
    }
}

impl HardwareActuatorPort for SimulatedBackend {
    fn write_speed_percent(&self, channel: usize, percent: i32) -> Result<()> {
        self.with_fan(channel, |fan| {
            fan.speed = percent.clamp(control::MIN_PERCENT, control::MAX_PERCENT)
        })
    }

    fn read_speed_percent(&self, channel: usize) -> Result<i32> {
        self.with_fan(channel, |fan| fan.speed)
    }
}

impl HardwareFloorPort for SimulatedBackend {
    fn min_speed_floor_percent(&self) -> i32 {
        self.floor.min_speed_floor
    }

    fn off_available(&self) -> bool {
        self.floor.off_available
    }
}
