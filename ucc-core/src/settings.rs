//! Runtime control settings shared between the IPC layer and the fan worker
//!
//! The active profile is swapped as a whole (`Arc<Profile>`), so the
//! coordinator never observes a half-updated profile mid-tick.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::info;

use crate::data::Profile;
use crate::error::Result;
use crate::hw::{ActiveProfileAccessor, ControlEnabledAccessor};

#[derive(Debug)]
pub struct ControlSettings {
    profile: RwLock<Arc<Profile>>,
    enabled: AtomicBool,
}

impl ControlSettings {
    pub fn new(profile: Profile, enabled: bool) -> Self {
        Self {
            profile: RwLock::new(Arc::new(profile)),
            enabled: AtomicBool::new(enabled),
        }
    }

    pub fn profile(&self) -> Arc<Profile> {
        Arc::clone(&self.profile.read())
    }

    /// Replace the active profile after validating it
    pub fn set_profile(&self, profile: Profile) -> Result<()> {
        profile.validate()?;
        info!(profile = %profile.id, preset = %profile.curve_preset, "Active profile changed");
        *self.profile.write() = Arc::new(profile);
        Ok(())
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    pub fn set_enabled(&self, enabled: bool) {
        let previous = self.enabled.swap(enabled, Ordering::SeqCst);
        if previous != enabled {
            info!(enabled, "Fan control toggled");
        }
    }

    /// Swap in a copy of the active profile with a new same-speed flag
    pub fn set_same_speed(&self, same_speed: bool) {
        let mut guard = self.profile.write();
        if guard.policy.same_speed != same_speed {
            let updated = Arc::new(guard.with_same_speed(same_speed));
            *guard = updated;
            info!(same_speed, "Same-speed mode changed");
        }
    }
}

impl Default for ControlSettings {
    fn default() -> Self {
        Self::new(Profile::default(), true)
    }
}

impl ActiveProfileAccessor for ControlSettings {
    fn current_profile(&self) -> Arc<Profile> {
        self.profile()
    }
}

impl ControlEnabledAccessor for ControlSettings {
    fn enabled(&self) -> bool {
        self.is_enabled()
    }
}
