//! Fan subsystem coordinator
//!
//! Runs one decision loop across all physical fans. Each tick:
//!
//! 1. re-resolve curves and policy if the active profile or the temporary
//!    override changed
//! 2. read every channel's temperature and let its controller decide
//! 3. if control is enabled, write speeds; channels in same-speed mode and
//!    channels whose sensor failed get the highest decision of the tick
//! 4. publish temperature and speed of every channel to telemetry
//!
//! Channels are detected once in `on_start`. With no fans detected the
//! worker stays idle until restarted.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::constants::control;
use crate::data::{ChannelRole, FanChannel, HardwareFloor, Profile, Reading, TemporaryCurveOverride};
use crate::engine::{FanChannelController, FanCurve, PresetLibrary};
use crate::error::Result;
use crate::hw::{
    ActiveProfileAccessor, ControlEnabledAccessor, HardwareActuatorPort, HardwareFloorPort,
    HardwareSensorPort,
};
use crate::settings::ControlSettings;
use crate::telemetry::{now_ms, SharedTelemetryStore};
use crate::worker::Worker;

/// Collaborators injected into the coordinator
#[derive(Clone)]
pub struct CoordinatorPorts {
    pub sensor: Arc<dyn HardwareSensorPort>,
    pub actuator: Arc<dyn HardwareActuatorPort>,
    pub floor: Arc<dyn HardwareFloorPort>,
    pub profile: Arc<dyn ActiveProfileAccessor>,
    pub enabled: Arc<dyn ControlEnabledAccessor>,
}

impl CoordinatorPorts {
    /// Ports for a backend implementing all hardware traits, driven by `settings`
    pub fn from_backend<B>(backend: Arc<B>, settings: Arc<ControlSettings>) -> Self
    where
        B: HardwareSensorPort + HardwareActuatorPort + HardwareFloorPort + 'static,
    {
        Self {
            sensor: backend.clone(),
            actuator: backend.clone(),
            floor: backend,
            profile: settings.clone(),
            enabled: settings,
        }
    }
}

/// What `on_start` found
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HardwareSummary {
    pub fan_count: usize,
    pub floor: HardwareFloor,
}

#[derive(Debug, Default)]
struct OverrideSlot {
    curves: Option<TemporaryCurveOverride>,
    /// Bumped on every apply/clear
    generation: u64,
}

/// Cloneable access to the coordinator for the IPC layer
#[derive(Clone, Default)]
pub struct FanControlHandle {
    overrides: Arc<Mutex<OverrideSlot>>,
    hardware: Arc<Mutex<HardwareSummary>>,
    telemetry: SharedTelemetryStore,
}

impl FanControlHandle {
    /// Replace the CPU and/or GPU curve until cleared; takes effect next tick
    ///
    /// Passing no curve at all clears the override.
    pub fn apply_temporary_curves(&self, cpu: Option<FanCurve>, gpu: Option<FanCurve>) {
        let curves = TemporaryCurveOverride::new(cpu, gpu);
        let mut slot = self.overrides.lock();
        slot.generation += 1;
        if curves.is_empty() {
            slot.curves = None;
        } else {
            info!(cpu = curves.cpu.is_some(), gpu = curves.gpu.is_some(), "Temporary fan curves applied");
            slot.curves = Some(curves);
        }
    }

    pub fn clear_temporary_curves(&self) {
        let mut slot = self.overrides.lock();
        if slot.curves.take().is_some() {
            info!("Temporary fan curves cleared");
        }
        slot.generation += 1;
    }

    pub fn has_temporary_curves(&self) -> bool {
        self.overrides.lock().curves.is_some()
    }

    pub fn temporary_curves(&self) -> Option<TemporaryCurveOverride> {
        self.overrides.lock().curves.clone()
    }

    pub fn telemetry(&self) -> &SharedTelemetryStore {
        &self.telemetry
    }

    pub fn hardware_info(&self) -> HardwareSummary {
        *self.hardware.lock()
    }
}

/// Log-once state per channel
#[derive(Debug, Default, Clone, Copy)]
struct ChannelHealth {
    sensor_failing: bool,
    write_failing: bool,
}

pub struct FanSubsystemCoordinator {
    ports: CoordinatorPorts,
    presets: &'static PresetLibrary,
    handle: FanControlHandle,
    controllers: Vec<FanChannelController>,
    health: Vec<ChannelHealth>,
    applied_profile: Option<Arc<Profile>>,
    applied_override_generation: u64,
    same_speed: bool,
    unavailable_logged: bool,
    no_decision_logged: bool,
}

impl FanSubsystemCoordinator {
    pub fn new(ports: CoordinatorPorts) -> Self {
        Self::with_handle(ports, FanControlHandle::default())
    }

    /// Coordinator sharing overrides and telemetry with an existing handle
    pub fn with_handle(ports: CoordinatorPorts, handle: FanControlHandle) -> Self {
        Self {
            ports,
            presets: PresetLibrary::builtin(),
            handle,
            controllers: Vec::new(),
            health: Vec::new(),
            applied_profile: None,
            applied_override_generation: 0,
            same_speed: false,
            unavailable_logged: false,
            no_decision_logged: false,
        }
    }

    pub fn handle(&self) -> FanControlHandle {
        self.handle.clone()
    }

    pub fn channel_count(&self) -> usize {
        self.controllers.len()
    }

    pub fn controllers(&self) -> &[FanChannelController] {
        &self.controllers
    }

    /// Number of fans, falling back to a CPU+GPU layout when only channel 0 answers
    fn detect_fan_count(&self) -> usize {
        match self.ports.sensor.read_fan_count() {
            Ok(count) if count > 0 => return count as usize,
            Ok(_) => debug!("Hardware reports no fans"),
            Err(e) => debug!(error = %e, "Fan count query failed"),
        }

        match self.ports.sensor.read_temperature(0) {
            Ok(temp) if temp >= 0 => {
                info!("Detected fans by temperature reading, assuming CPU and GPU fans");
                control::FALLBACK_FAN_COUNT as usize
            }
            _ => 0,
        }
    }

    fn resolve_curve(
        &self,
        profile: &Profile,
        role: ChannelRole,
        overrides: Option<&TemporaryCurveOverride>,
    ) -> FanCurve {
        overrides
            .and_then(|o| o.curve_for(role))
            .cloned()
            .unwrap_or_else(|| self.presets.curve_for_profile(profile, role))
    }

    /// Push curves and policy into every controller if anything changed
    fn refresh_curves(&mut self) {
        let profile = self.ports.profile.current_profile();
        if profile.id.is_empty() {
            return;
        }

        let profile_changed = match &self.applied_profile {
            Some(applied) => !Arc::ptr_eq(applied, &profile) && **applied != *profile,
            None => true,
        };

        let (overrides, generation) = {
            let slot = self.handle.overrides.lock();
            if !profile_changed && slot.generation == self.applied_override_generation {
                return;
            }
            (slot.curves.clone(), slot.generation)
        };

        let curves: Vec<FanCurve> = self
            .controllers
            .iter()
            .map(|c| self.resolve_curve(&profile, c.role(), overrides.as_ref()))
            .collect();

        for (controller, curve) in self.controllers.iter_mut().zip(curves) {
            controller.update_curve(curve);
            controller.apply_policy(&profile.policy);
        }
        self.same_speed = profile.policy.same_speed;

        info!(
            profile = %profile.id,
            preset = %profile.curve_preset,
            same_speed = self.same_speed,
            temporary = overrides.is_some(),
            "Fan curves updated"
        );

        self.applied_profile = Some(profile);
        self.applied_override_generation = generation;
    }

    /// One control iteration
    pub fn tick(&mut self) {
        if self.controllers.is_empty() {
            if !self.unavailable_logged {
                info!("Fan control unavailable (no fans)");
                self.unavailable_logged = true;
            }
            return;
        }

        self.refresh_curves();

        let enabled = self.ports.enabled.enabled();
        let timestamp = now_ms();
        let count = self.controllers.len();

        let mut temps: Vec<Option<i32>> = Vec::with_capacity(count);
        let mut decisions: Vec<Option<i32>> = Vec::with_capacity(count);

        for (index, controller) in self.controllers.iter_mut().enumerate() {
            let health = &mut self.health[index];
            match self.ports.sensor.read_temperature(index) {
                Ok(temp) => {
                    if health.sensor_failing {
                        info!(channel = index, "Temperature sensor recovered");
                        health.sensor_failing = false;
                    }
                    let decision = controller.tick(temp);
                    debug!(
                        channel = index,
                        temp,
                        smoothed = decision.smoothed_temp,
                        speed = decision.speed,
                        "Fan decision"
                    );
                    temps.push(Some(temp));
                    decisions.push(Some(decision.speed));
                }
                Err(e) => {
                    if !health.sensor_failing {
                        warn!(channel = index, error = %e, "Temperature read failed, using highest fan speed");
                        health.sensor_failing = true;
                    }
                    temps.push(None);
                    decisions.push(None);
                }
            }
        }

        let max_decision = decisions.iter().flatten().copied().max();
        let mut written: Vec<Option<i32>> = vec![None; count];

        if enabled {
            match max_decision {
                None => {
                    if !self.no_decision_logged {
                        warn!("No fan produced a decision, skipping speed writes");
                        self.no_decision_logged = true;
                    }
                }
                Some(max) => {
                    self.no_decision_logged = false;
                    for index in 0..count {
                        let speed = match decisions[index] {
                            Some(own) if !self.same_speed => own,
                            _ => max,
                        };
                        self.write_speed(index, speed);
                        written[index] = Some(speed);
                    }
                }
            }
        }

        for index in 0..count {
            let temp = temps[index].unwrap_or(control::UNAVAILABLE);
            let speed = if temps[index].is_none() {
                control::UNAVAILABLE
            } else if enabled {
                written[index].unwrap_or(control::UNAVAILABLE)
            } else {
                self.ports
                    .actuator
                    .read_speed_percent(index)
                    .unwrap_or(control::UNAVAILABLE)
            };
            self.handle.telemetry.publish(
                index,
                Reading::new(timestamp, temp),
                Reading::new(timestamp, speed),
            );
        }
    }

    fn write_speed(&mut self, index: usize, speed: i32) {
        let health = &mut self.health[index];
        match self.ports.actuator.write_speed_percent(index, speed) {
            Ok(()) => {
                if health.write_failing {
                    info!(channel = index, "Fan speed writes recovered");
                    health.write_failing = false;
                }
            }
            Err(e) => {
                if !health.write_failing {
                    warn!(channel = index, speed, error = %e, "Failed to write fan speed");
                    health.write_failing = true;
                } else {
                    debug!(channel = index, speed, error = %e, "Fan speed write still failing");
                }
            }
        }
    }
}

impl Worker for FanSubsystemCoordinator {
    fn name(&self) -> &str {
        "fan-control"
    }

    fn on_start(&mut self) -> Result<()> {
        self.controllers.clear();
        self.health.clear();
        self.applied_profile = None;
        self.unavailable_logged = false;
        self.no_decision_logged = false;

        let fan_count = self.detect_fan_count();
        if fan_count == 0 {
            info!("No fans detected");
            *self.handle.hardware.lock() = HardwareSummary::default();
            self.handle.telemetry.reset(0);
            return Ok(());
        }

        let profile = self.ports.profile.current_profile();
        let floor = self.ports.floor.hardware_floor();

        for index in 0..fan_count {
            let channel = FanChannel::new(index);
            let curve = self.presets.curve_for_profile(&profile, channel.role);
            let mut controller = FanChannelController::new(channel, curve);
            controller.apply_policy(&profile.policy);
            controller.set_hardware_floor(floor);
            self.controllers.push(controller);
        }
        self.health = vec![ChannelHealth::default(); fan_count];
        self.same_speed = profile.policy.same_speed;
        self.applied_profile = Some(profile);
        // overrides applied before start are picked up by the first tick
        self.applied_override_generation = 0;

        *self.handle.hardware.lock() = HardwareSummary { fan_count, floor };
        self.handle.telemetry.reset(fan_count);

        info!(
            fans = fan_count,
            floor = floor.min_speed_floor,
            off_available = floor.off_available,
            "Fan control started"
        );
        Ok(())
    }

    fn on_work(&mut self) -> Result<()> {
        self.tick();
        Ok(())
    }

    fn on_exit(&mut self) -> Result<()> {
        // Fans keep their last speed; no safe-speed write on shutdown
        info!(fans = self.controllers.len(), "Fan control stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Breakpoint, CurvePair};
    use crate::error::UccError;

    #[derive(Default)]
    struct FakeState {
        fan_count: Option<u32>,
        temps: Vec<Option<i32>>,
        hw_speeds: Vec<i32>,
        writes: Vec<(usize, i32)>,
        failing_writes: Vec<usize>,
    }

    #[derive(Default)]
    struct FakeHardware {
        state: Mutex<FakeState>,
        floor: HardwareFloor,
    }

    impl FakeHardware {
        fn new(fan_count: Option<u32>, temps: Vec<Option<i32>>) -> Arc<Self> {
            let hw_speeds = vec![42; temps.len()];
            Arc::new(Self {
                state: Mutex::new(FakeState {
                    fan_count,
                    temps,
                    hw_speeds,
                    ..FakeState::default()
                }),
                floor: HardwareFloor::default(),
            })
        }

        fn set_temp(&self, channel: usize, temp: Option<i32>) {
            self.state.lock().temps[channel] = temp;
        }

        fn take_writes(&self) -> Vec<(usize, i32)> {
            std::mem::take(&mut self.state.lock().writes)
        }
    }

    impl HardwareSensorPort for FakeHardware {
        fn read_temperature(&self, channel: usize) -> Result<i32> {
            self.state
                .lock()
                .temps
                .get(channel)
                .copied()
                .flatten()
                .ok_or(UccError::TemperatureRead { channel, reason: "fake".into() })
        }

        fn read_fan_count(&self) -> Result<u32> {
            self.state
                .lock()
                .fan_count
                .ok_or_else(|| UccError::FanCountUnavailable("fake".into()))
        }
    }

    impl HardwareActuatorPort for FakeHardware {
        fn write_speed_percent(&self, channel: usize, percent: i32) -> Result<()> {
            let mut state = self.state.lock();
            if state.failing_writes.contains(&channel) {
                return Err(UccError::SpeedWrite { channel, percent, reason: "fake".into() });
            }
            state.writes.push((channel, percent));
            Ok(())
        }

        fn read_speed_percent(&self, channel: usize) -> Result<i32> {
            Ok(self.state.lock().hw_speeds[channel])
        }
    }

    impl HardwareFloorPort for FakeHardware {
        fn min_speed_floor_percent(&self) -> i32 {
            self.floor.min_speed_floor
        }

        fn off_available(&self) -> bool {
            self.floor.off_available
        }
    }

    fn flat(speed: i32) -> FanCurve {
        FanCurve::new(vec![Breakpoint::new(0, speed)]).unwrap()
    }

    /// Profile with fixed CPU and GPU speeds
    fn custom_profile(cpu: i32, gpu: i32, same_speed: bool) -> Profile {
        let mut profile = Profile {
            id: "test".into(),
            curve_preset: "Custom".into(),
            custom_curves: Some(CurvePair::new(Some(flat(cpu)), Some(flat(gpu)))),
            ..Profile::default()
        };
        profile.policy.same_speed = same_speed;
        profile
    }

    fn coordinator(
        hw: &Arc<FakeHardware>,
        profile: Profile,
    ) -> (FanSubsystemCoordinator, Arc<ControlSettings>) {
        let settings = Arc::new(ControlSettings::new(profile, true));
        let ports = CoordinatorPorts::from_backend(hw.clone(), settings.clone());
        let mut coordinator = FanSubsystemCoordinator::new(ports);
        coordinator.on_start().unwrap();
        (coordinator, settings)
    }

    #[test]
    fn test_same_speed_flattening() {
        let hw = FakeHardware::new(Some(2), vec![Some(50), Some(50)]);
        let (mut c, _) = coordinator(&hw, custom_profile(30, 55, true));
        c.tick();
        assert_eq!(hw.take_writes(), vec![(0, 55), (1, 55)]);
    }

    #[test]
    fn test_independent_speeds() {
        let hw = FakeHardware::new(Some(2), vec![Some(50), Some(50)]);
        let (mut c, _) = coordinator(&hw, custom_profile(30, 55, false));
        c.tick();
        assert_eq!(hw.take_writes(), vec![(0, 30), (1, 55)]);

        let telemetry = c.handle().telemetry().all();
        assert_eq!(telemetry[0].speed.value, 30);
        assert_eq!(telemetry[1].speed.value, 55);
        assert_eq!(telemetry[1].temp.value, 50);
    }

    #[test]
    fn test_failed_sensor_gets_max_speed() {
        let hw = FakeHardware::new(Some(3), vec![Some(50), None, Some(50)]);
        let (mut c, _) = coordinator(&hw, custom_profile(30, 55, false));
        c.tick();
        assert_eq!(hw.take_writes(), vec![(0, 30), (1, 55), (2, 55)]);

        let failed = c.handle().telemetry().fan_reading(1).unwrap();
        assert_eq!(failed.temp.value, control::UNAVAILABLE);
        assert_eq!(failed.speed.value, control::UNAVAILABLE);
    }

    #[test]
    fn test_no_decisions_skip_writes() {
        let hw = FakeHardware::new(Some(2), vec![Some(50), Some(50)]);
        let (mut c, _) = coordinator(&hw, custom_profile(30, 55, false));
        hw.set_temp(0, None);
        hw.set_temp(1, None);
        c.tick();
        assert!(hw.take_writes().is_empty());
        assert_eq!(c.handle().telemetry().fan_reading(0).unwrap().temp.value, control::UNAVAILABLE);
    }

    #[test]
    fn test_disabled_reports_hardware_speed() {
        let hw = FakeHardware::new(Some(2), vec![Some(50), Some(50)]);
        let (mut c, settings) = coordinator(&hw, custom_profile(30, 55, false));
        settings.set_enabled(false);
        c.tick();
        assert!(hw.take_writes().is_empty());
        let reading = c.handle().telemetry().fan_reading(0).unwrap();
        assert_eq!(reading.speed.value, 42);
        assert_eq!(reading.temp.value, 50);
        assert!(reading.temp.timestamp_ms > 0);
    }

    #[test]
    fn test_write_failure_does_not_block_other_channels() {
        let hw = FakeHardware::new(Some(2), vec![Some(50), Some(50)]);
        hw.state.lock().failing_writes.push(0);
        let (mut c, _) = coordinator(&hw, custom_profile(30, 55, false));
        c.tick();
        c.tick();
        assert_eq!(hw.take_writes(), vec![(1, 55), (1, 55)]);
    }

    #[test]
    fn test_fan_count_fallback() {
        let hw = FakeHardware::new(None, vec![Some(45), Some(50), Some(60)]);
        let (c, _) = coordinator(&hw, Profile::default());
        assert_eq!(c.channel_count(), 2);
        assert_eq!(c.controllers()[0].role(), ChannelRole::Cpu);
        assert_eq!(c.controllers()[1].role(), ChannelRole::Gpu);
        assert_eq!(c.handle().hardware_info().fan_count, 2);

        let hw = FakeHardware::new(Some(0), vec![Some(45)]);
        let (c, _) = coordinator(&hw, Profile::default());
        assert_eq!(c.channel_count(), 2);
    }

    #[test]
    fn test_no_fans_stays_idle() {
        let hw = FakeHardware::new(None, vec![None, None]);
        let (mut c, _) = coordinator(&hw, Profile::default());
        assert_eq!(c.channel_count(), 0);
        c.tick();
        c.tick();
        assert!(hw.take_writes().is_empty());
        assert_eq!(c.handle().telemetry().fan_count(), 0);

        // negative temperature is not trusted for detection
        let hw = FakeHardware::new(None, vec![Some(-1)]);
        let (c, _) = coordinator(&hw, Profile::default());
        assert_eq!(c.channel_count(), 0);
    }

    #[test]
    fn test_seeded_from_named_preset() {
        let hw = FakeHardware::new(Some(2), vec![Some(50), Some(50)]);
        let profile = Profile { curve_preset: "Cool".into(), ..Profile::default() };
        let (c, _) = coordinator(&hw, profile);
        let cool = PresetLibrary::builtin().resolve("Cool");
        assert_eq!(c.controllers()[0].curve(), cool.curve(ChannelRole::Cpu));
        assert_eq!(c.controllers()[1].curve(), cool.curve(ChannelRole::Gpu));
    }

    #[test]
    fn test_temporary_override_precedence() {
        let hw = FakeHardware::new(Some(2), vec![Some(50), Some(50)]);
        let (mut c, _) = coordinator(&hw, custom_profile(30, 55, false));
        let handle = c.handle();

        handle.apply_temporary_curves(Some(flat(70)), None);
        assert!(handle.has_temporary_curves());
        c.tick();
        assert_eq!(c.controllers()[0].curve(), &flat(70));
        assert_eq!(c.controllers()[1].curve(), &flat(55));

        handle.clear_temporary_curves();
        assert!(!handle.has_temporary_curves());
        c.tick();
        assert_eq!(c.controllers()[0].curve(), &flat(30));
    }

    #[test]
    fn test_override_survives_profile_switch() {
        let hw = FakeHardware::new(Some(2), vec![Some(50), Some(50)]);
        let (mut c, settings) = coordinator(&hw, custom_profile(30, 55, false));
        c.handle().apply_temporary_curves(None, Some(flat(90)));
        c.tick();

        settings.set_profile(custom_profile(10, 20, false)).unwrap();
        c.tick();
        assert_eq!(c.controllers()[0].curve(), &flat(10));
        assert_eq!(c.controllers()[1].curve(), &flat(90));
    }

    #[test]
    fn test_profile_switch_updates_policy() {
        let hw = FakeHardware::new(Some(2), vec![Some(50), Some(50)]);
        let (mut c, settings) = coordinator(&hw, custom_profile(30, 55, false));
        c.tick();
        hw.take_writes();

        let mut next = custom_profile(30, 55, false);
        next.policy.max_speed = 40;
        settings.set_profile(next).unwrap();
        c.tick();
        // 55 falls toward 40 by at most 2 per tick
        assert_eq!(hw.take_writes(), vec![(0, 30), (1, 53)]);

        settings.set_same_speed(true);
        c.tick();
        assert_eq!(hw.take_writes(), vec![(0, 51), (1, 51)]);
    }

    #[test]
    fn test_hardware_floor_pushed_to_controllers() {
        let hw = Arc::new(FakeHardware {
            state: Mutex::new(FakeState {
                fan_count: Some(1),
                temps: vec![Some(40)],
                hw_speeds: vec![0],
                ..FakeState::default()
            }),
            floor: HardwareFloor::new(25, false),
        });
        let (mut c, _) = coordinator(&hw, custom_profile(10, 10, false));
        c.tick();
        assert_eq!(hw.take_writes(), vec![(0, 25)]);
        assert_eq!(c.handle().hardware_info().floor, HardwareFloor::new(25, false));
    }

    #[test]
    fn test_restart_rebuilds_channels() {
        let hw = FakeHardware::new(Some(2), vec![Some(50), Some(50)]);
        let (mut c, _) = coordinator(&hw, Profile::default());
        c.on_exit().unwrap();
        hw.state.lock().fan_count = Some(1);
        c.on_start().unwrap();
        assert_eq!(c.channel_count(), 1);
    }
}
