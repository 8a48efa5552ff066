//! Unified error handling for the UCC fan control stack
//!
//! This crate provides a single error type used across all UCC components.
//! It uses thiserror for ergonomic error definitions with proper Display and Error trait impls.

use std::io;
use std::path::PathBuf;

/// Result type alias using UccError
pub type Result<T> = std::result::Result<T, UccError>;

/// Unified error type for all UCC operations
#[derive(thiserror::Error, Debug)]
pub enum UccError {
    // ============================================================================
    // I/O and File System Errors
    // ============================================================================
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: io::Error,
    },

    #[error("Failed to write file {path}: {source}")]
    FileWrite {
        path: PathBuf,
        source: io::Error,
    },

    // ============================================================================
    // Hardware Access Errors
    // ============================================================================
    #[error("Failed to read temperature of fan {channel}: {reason}")]
    TemperatureRead {
        channel: usize,
        reason: String,
    },

    #[error("Failed to read speed of fan {channel}: {reason}")]
    SpeedRead {
        channel: usize,
        reason: String,
    },

    #[error("Failed to write speed {percent}% to fan {channel}: {reason}")]
    SpeedWrite {
        channel: usize,
        percent: i32,
        reason: String,
    },

    #[error("Fan count not available: {0}")]
    FanCountUnavailable(String),

    #[error("Fan channel {channel} out of range (0..{count})")]
    ChannelOutOfRange {
        channel: usize,
        count: usize,
    },

    // ============================================================================
    // Curve and Profile Errors
    // ============================================================================
    #[error("Curve validation failed: {0}")]
    InvalidCurve(String),

    #[error("Invalid profile value for {field}: {reason}")]
    InvalidProfile {
        field: String,
        reason: String,
    },

    // ============================================================================
    // Configuration Errors
    // ============================================================================
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    // ============================================================================
    // Daemon and IPC Errors
    // ============================================================================
    #[error("Daemon not available")]
    DaemonNotAvailable,

    #[error("Daemon connection failed: {0}")]
    DaemonConnection(String),

    #[error("Daemon request failed: {0}")]
    DaemonRequest(String),

    #[error("IPC protocol error: {0}")]
    IpcProtocol(String),

    #[error("Message too large: {size} bytes (max {max_size} bytes)")]
    MessageTooLarge {
        size: usize,
        max_size: usize,
    },

    // ============================================================================
    // Worker Errors
    // ============================================================================
    #[error("Worker '{name}' failed: {reason}")]
    Worker {
        name: String,
        reason: String,
    },

    // ============================================================================
    // Generic Errors
    // ============================================================================
    #[error("{0}")]
    Generic(String),

    #[error("Operation timed out: {0}")]
    Timeout(String),
}

impl UccError {
    /// Create a generic error from a string
    pub fn generic(msg: impl Into<String>) -> Self {
        Self::Generic(msg.into())
    }

    /// Create a config error from a string
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a curve validation error from a string
    pub fn invalid_curve(msg: impl Into<String>) -> Self {
        Self::InvalidCurve(msg.into())
    }

    /// Create a profile validation error
    pub fn invalid_profile(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidProfile {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create a daemon error from a string
    pub fn daemon(msg: impl Into<String>) -> Self {
        Self::DaemonRequest(msg.into())
    }

    /// Create a worker error
    pub fn worker(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Worker {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// True for errors caused by the hardware layer (sensor or actuator I/O)
    pub fn is_hardware(&self) -> bool {
        matches!(
            self,
            Self::TemperatureRead { .. }
                | Self::SpeedRead { .. }
                | Self::SpeedWrite { .. }
                | Self::FanCountUnavailable(_)
                | Self::ChannelOutOfRange { .. }
        )
    }
}

// Allow converting from String to UccError
impl From<String> for UccError {
    fn from(s: String) -> Self {
        Self::Generic(s)
    }
}

// Allow converting from &str to UccError
impl From<&str> for UccError {
    fn from(s: &str) -> Self {
        Self::Generic(s.to_string())
    }
}
