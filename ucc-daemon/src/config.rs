//! Daemon configuration
//!
//! Loaded once at startup from a JSON file. Every field has a default, so an
//! empty object (or a missing file) gives a working simulated setup.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use ucc_core::constants::{paths, timing};
use ucc_core::{
    ControlSettings, CoordinatorPorts, HardwareFloor, HwmonBackend, HwmonChannelConfig, Profile,
    SimulatedBackend,
};
use ucc_error::{Result, UccError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    pub poll_interval_ms: u64,
    pub socket_path: PathBuf,
    pub fan_control_enabled: bool,
    pub profile: Profile,
    pub backend: BackendConfig,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: timing::DEFAULT_POLL_INTERVAL_MS,
            socket_path: PathBuf::from(paths::SOCKET_PATH),
            fan_control_enabled: true,
            profile: Profile::default(),
            backend: BackendConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BackendConfig {
    /// In-memory fans, for development machines
    Simulated {
        #[serde(default = "default_sim_fans")]
        fan_count: usize,
        #[serde(default)]
        floor: HardwareFloor,
    },
    /// Explicit sysfs files per channel
    Hwmon {
        channels: Vec<HwmonChannelConfig>,
        #[serde(default)]
        min_speed_floor: i32,
        #[serde(default)]
        off_available: bool,
    },
}

fn default_sim_fans() -> usize {
    2
}

impl Default for BackendConfig {
    fn default() -> Self {
        BackendConfig::Simulated {
            fan_count: default_sim_fans(),
            floor: HardwareFloor::default(),
        }
    }
}

impl BackendConfig {
    pub fn kind(&self) -> &'static str {
        match self {
            BackendConfig::Simulated { .. } => "simulated",
            BackendConfig::Hwmon { .. } => "hwmon",
        }
    }

    /// Build the backend and wire it to `settings`
    pub fn ports(&self, settings: Arc<ControlSettings>) -> CoordinatorPorts {
        match self {
            BackendConfig::Simulated { fan_count, floor } => {
                let backend = SimulatedBackend::new(
                    *fan_count,
                    HardwareFloor::new(floor.min_speed_floor, floor.off_available),
                );
                CoordinatorPorts::from_backend(Arc::new(backend), settings)
            }
            BackendConfig::Hwmon {
                channels,
                min_speed_floor,
                off_available,
            } => {
                let backend = HwmonBackend::new(
                    channels.clone(),
                    HardwareFloor::new(*min_speed_floor, *off_available),
                );
                CoordinatorPorts::from_backend(Arc::new(backend), settings)
            }
        }
    }
}

impl DaemonConfig {
    /// Load from `path`; a missing file yields the defaults
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            warn!("No config file at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path).map_err(|e| UccError::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;

        let config: DaemonConfig = serde_json::from_str(&contents)
            .map_err(|e| UccError::config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;

        info!("Loaded config from {:?} (backend: {})", path, config.backend.kind());
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_ms < timing::MIN_POLL_INTERVAL_MS {
            return Err(UccError::config(format!(
                "poll_interval_ms must be at least {} (got {})",
                timing::MIN_POLL_INTERVAL_MS,
                self.poll_interval_ms
            )));
        }
        if !self.socket_path.is_absolute() {
            return Err(UccError::config("socket_path must be absolute"));
        }
        self.profile.validate()?;
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}
