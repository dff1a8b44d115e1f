//! Typed settings derived from the raw configuration

use crate::RawConfig;
use rsvp_util::PrincipalId;
use std::path::PathBuf;
use std::time::Duration;

/// Default clock-skew grace for "start must be in the future": one minute
pub const DEFAULT_START_GRACE: Duration = Duration::from_secs(60);

/// Default reaper interval: one hour
pub const DEFAULT_REAPER_INTERVAL: Duration = Duration::from_secs(3600);

/// Default retention threshold for Pending reservations: three days
pub const DEFAULT_MAX_PENDING_AGE: Duration = Duration::from_secs(3 * 24 * 3600);

/// Default reaper warm-up delay after process start
pub const DEFAULT_REAPER_WARMUP: Duration = Duration::from_secs(10);

/// Validated, typed configuration for the service
#[derive(Debug, Clone, Default)]
pub struct Settings {
    pub service: ServiceSettings,
    pub engine: EngineSettings,
    pub reaper: ReaperSettings,
    pub managers: Vec<PrincipalId>,
}

#[derive(Debug, Clone)]
pub struct ServiceSettings {
    pub data_dir: PathBuf,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            data_dir: rsvp_util::data_dir_without_env(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct EngineSettings {
    /// How far in the past a submission's start instant may lie
    pub start_grace: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            start_grace: DEFAULT_START_GRACE,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ReaperSettings {
    pub interval: Duration,
    pub max_pending_age: Duration,
    pub warmup: Duration,
}

impl Default for ReaperSettings {
    fn default() -> Self {
        Self {
            interval: DEFAULT_REAPER_INTERVAL,
            max_pending_age: DEFAULT_MAX_PENDING_AGE,
            warmup: DEFAULT_REAPER_WARMUP,
        }
    }
}

impl Settings {
    /// Convert a validated raw config into typed settings.
    pub fn from_raw(raw: RawConfig) -> Self {
        let service = ServiceSettings {
            data_dir: raw
                .service
                .data_dir
                .unwrap_or_else(rsvp_util::data_dir_without_env),
        };

        let engine = EngineSettings {
            start_grace: raw
                .engine
                .start_grace_seconds
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_START_GRACE),
        };

        let reaper = ReaperSettings {
            interval: raw
                .reaper
                .interval_seconds
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_REAPER_INTERVAL),
            max_pending_age: raw
                .reaper
                .max_pending_age_seconds
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_MAX_PENDING_AGE),
            warmup: raw
                .reaper
                .warmup_seconds
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_REAPER_WARMUP),
        };

        let managers = raw.managers.into_iter().map(PrincipalId::new).collect();

        Self {
            service,
            engine,
            reaper,
            managers,
        }
    }
}
