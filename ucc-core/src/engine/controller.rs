//! Per-channel speed decision
//!
//! Each tick a raw temperature is smoothed, mapped through the channel's
//! curve and then passed through the policy pipeline:
//!
//! 1. profile offset, then profile min/max, then 0-100
//! 2. hardware floor (snap up to the floor, or switch off below half of it
//!    when the hardware allows)
//! 3. rate limit: above 20% the speed falls by at most 2 points per tick
//! 4. critical temperature: >= 90 °C forces 100%, >= 85 °C at least 80%
//!
//! Policy and curve changes apply from the next tick on and never reset the
//! smoother or the rate-limit history.

use crate::constants::control;
use crate::data::{ChannelRole, FanChannel, FanPolicy, HardwareFloor};
use crate::engine::{FanCurve, TemperatureSmoother};

/// Outcome of one controller tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpeedDecision {
    pub smoothed_temp: i32,
    pub speed: i32,
}

#[derive(Debug, Clone)]
pub struct FanChannelController {
    channel: FanChannel,
    smoother: TemperatureSmoother,
    curve: FanCurve,
    min_speed: i32,
    max_speed: i32,
    offset: i32,
    floor: HardwareFloor,
    last_applied_speed: i32,
}

impl FanChannelController {
    pub fn new(channel: FanChannel, curve: FanCurve) -> Self {
        Self {
            channel,
            smoother: TemperatureSmoother::new(),
            curve,
            min_speed: control::MIN_PERCENT,
            max_speed: control::MAX_PERCENT,
            offset: 0,
            floor: HardwareFloor::default(),
            last_applied_speed: 0,
        }
    }

    pub fn channel(&self) -> FanChannel {
        self.channel
    }

    pub fn role(&self) -> ChannelRole {
        self.channel.role
    }

    pub fn curve(&self) -> &FanCurve {
        &self.curve
    }

    pub fn last_applied_speed(&self) -> i32 {
        self.last_applied_speed
    }

    pub fn set_minimum(&mut self, percent: i32) {
        self.min_speed = percent.clamp(control::MIN_PERCENT, control::MAX_PERCENT);
    }

    pub fn set_maximum(&mut self, percent: i32) {
        self.max_speed = percent.clamp(control::MIN_PERCENT, control::MAX_PERCENT);
    }

    pub fn set_offset(&mut self, percent: i32) {
        self.offset = percent.clamp(-control::MAX_OFFSET_PERCENT, control::MAX_OFFSET_PERCENT);
    }

    /// Copy min/max/offset from a profile policy
    pub fn apply_policy(&mut self, policy: &FanPolicy) {
        self.set_minimum(policy.min_speed);
        self.set_maximum(policy.max_speed);
        self.set_offset(policy.offset);
    }

    pub fn update_curve(&mut self, curve: FanCurve) {
        self.curve = curve;
    }

    pub fn set_hardware_floor(&mut self, floor: HardwareFloor) {
        self.floor = HardwareFloor::new(floor.min_speed_floor, floor.off_available);
    }

    /// Feed a raw sample and decide the channel's speed
    pub fn tick(&mut self, raw_temp: i32) -> SpeedDecision {
        self.smoother.add_value(raw_temp);
        let smoothed_temp = self.smoother.filtered_value();
        let speed = self.decide(smoothed_temp);
        SpeedDecision { smoothed_temp, speed }
    }

    /// Run the decision pipeline on an already smoothed temperature
    pub fn decide(&mut self, smoothed_temp: i32) -> i32 {
        let mut speed = self.curve.lookup(smoothed_temp) + self.offset;

        // min/max can cross after a partial update; min wins
        speed = speed.min(self.max_speed).max(self.min_speed);
        speed = speed.clamp(control::MIN_PERCENT, control::MAX_PERCENT);

        speed = self.apply_floor(speed);
        speed = self.apply_rate_limit(speed);
        speed = apply_critical_override(speed, smoothed_temp);

        self.last_applied_speed = speed;
        speed
    }

    fn apply_floor(&self, speed: i32) -> i32 {
        let floor = self.floor.min_speed_floor;
        let half = floor / 2;
        if speed >= floor {
            speed
        } else if self.floor.off_available && speed < half {
            0
        } else {
            floor
        }
    }

    fn apply_rate_limit(&self, speed: i32) -> i32 {
        let last = self.last_applied_speed;
        if last > control::RATE_LIMIT_ABOVE_PERCENT && speed - last <= -control::MAX_DECREASE_PER_TICK {
            last - control::MAX_DECREASE_PER_TICK
        } else {
            speed
        }
    }
}

fn apply_critical_override(speed: i32, smoothed_temp: i32) -> i32 {
    if smoothed_temp >= control::CRITICAL_TEMP_C {
        control::MAX_PERCENT
    } else if smoothed_temp >= control::HIGH_TEMP_C {
        speed.max(control::HIGH_TEMP_MIN_SPEED)
    } else {
        speed
    }
}
