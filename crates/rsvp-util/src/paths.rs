//! Default paths for rsvpd components
//!
//! Paths are user-writable by default (no root required):
//! - Config: `$XDG_CONFIG_HOME/rsvpd/config.toml` or `~/.config/rsvpd/config.toml`
//! - Data: `$XDG_DATA_HOME/rsvpd` or `~/.local/share/rsvpd`

use std::path::PathBuf;

/// Environment variable for overriding the data directory
pub const RSVP_DATA_DIR_ENV: &str = "RSVPD_DATA_DIR";

/// Application subdirectory name
const APP_DIR: &str = "rsvpd";

/// Get the default config file path.
///
/// Order of precedence:
/// 1. `$XDG_CONFIG_HOME/rsvpd/config.toml` (if XDG_CONFIG_HOME is set)
/// 2. `~/.config/rsvpd/config.toml` (fallback)
pub fn default_config_path() -> PathBuf {
    if let Ok(config_home) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(config_home).join(APP_DIR).join("config.toml");
    }

    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home)
            .join(".config")
            .join(APP_DIR)
            .join("config.toml");
    }

    PathBuf::from("/etc").join(APP_DIR).join("config.toml")
}

/// Get the default data directory.
///
/// Order of precedence:
/// 1. `$RSVPD_DATA_DIR` environment variable (if set)
/// 2. `$XDG_DATA_HOME/rsvpd` (if XDG_DATA_HOME is set)
/// 3. `~/.local/share/rsvpd` (fallback)
pub fn default_data_dir() -> PathBuf {
    if let Ok(path) = std::env::var(RSVP_DATA_DIR_ENV) {
        return PathBuf::from(path);
    }

    data_dir_without_env()
}

/// Get the data directory without checking RSVPD_DATA_DIR env var.
/// Used for default values in configs where the env var is checked separately.
pub fn data_dir_without_env() -> PathBuf {
    if let Ok(data_home) = std::env::var("XDG_DATA_HOME") {
        return PathBuf::from(data_home).join(APP_DIR);
    }

    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home)
            .join(".local")
            .join("share")
            .join(APP_DIR);
    }

    // Last resort
    PathBuf::from("/tmp").join(APP_DIR).join("data")
}
