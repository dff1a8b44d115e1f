//! Raw TOML schema for rsvpd configuration
//!
//! The raw types mirror the file format exactly; validation and conversion
//! into the typed [`Settings`](crate::Settings) happen separately.

use serde::Deserialize;
use std::path::PathBuf;

/// Top-level raw configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfig {
    pub config_version: u32,

    #[serde(default)]
    pub service: RawService,

    #[serde(default)]
    pub engine: RawEngine,

    #[serde(default)]
    pub reaper: RawReaper,

    /// Principal IDs holding the Manager role
    #[serde(default)]
    pub managers: Vec<String>,
}

/// Service-level settings
#[derive(Debug, Clone, Deserialize)]
pub struct RawService {
    /// Data directory for the SQLite database
    pub data_dir: Option<PathBuf>,
}

impl Default for RawService {
    fn default() -> Self {
        Self { data_dir: None }
    }
}

/// Scheduling engine settings
#[derive(Debug, Clone, Deserialize)]
pub struct RawEngine {
    /// Clock-skew tolerance for "start must be in the future" (seconds)
    pub start_grace_seconds: Option<u64>,
}

impl Default for RawEngine {
    fn default() -> Self {
        Self {
            start_grace_seconds: None,
        }
    }
}

/// Stale-reservation reaper settings
#[derive(Debug, Clone, Deserialize)]
pub struct RawReaper {
    /// How often the reaper runs (seconds)
    pub interval_seconds: Option<u64>,

    /// Pending reservations older than this are auto-cancelled (seconds)
    pub max_pending_age_seconds: Option<u64>,

    /// Delay before the first run, to avoid racing service start (seconds)
    pub warmup_seconds: Option<u64>,
}

impl Default for RawReaper {
    fn default() -> Self {
        Self {
            interval_seconds: None,
            max_pending_age_seconds: None,
            warmup_seconds: None,
        }
    }
}
