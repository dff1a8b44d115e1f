//! Configuration validation

use crate::RawConfig;
use std::collections::HashSet;
use thiserror::Error;

/// Validation error
#[derive(Debug, Clone, Error)]
pub enum ValidationError {
    #[error("Reaper interval must be greater than zero")]
    ZeroReaperInterval,

    #[error("Pending retention threshold must be greater than zero")]
    ZeroMaxPendingAge,

    #[error("Manager principal ID cannot be empty")]
    EmptyManagerId,

    #[error("Duplicate manager principal ID: {0}")]
    DuplicateManagerId(String),
}

/// Validate a raw configuration, collecting every error.
pub fn validate_config(config: &RawConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if config.reaper.interval_seconds == Some(0) {
        errors.push(ValidationError::ZeroReaperInterval);
    }

    if config.reaper.max_pending_age_seconds == Some(0) {
        errors.push(ValidationError::ZeroMaxPendingAge);
    }

    let mut seen = HashSet::new();
    for manager in &config.managers {
        if manager.trim().is_empty() {
            errors.push(ValidationError::EmptyManagerId);
        } else if !seen.insert(manager) {
            errors.push(ValidationError::DuplicateManagerId(manager.clone()));
        }
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(content: &str) -> RawConfig {
        toml::from_str(content).unwrap()
    }

    #[test]
    fn defaults_pass_validation() {
        let config = raw("config_version = 1");
        assert!(validate_config(&config).is_empty());
    }

    #[test]
    fn zero_durations_are_rejected() {
        let config = raw(r#"
            config_version = 1

            [reaper]
            interval_seconds = 0
            max_pending_age_seconds = 0
        "#);

        let errors = validate_config(&config);
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::ZeroReaperInterval)));
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::ZeroMaxPendingAge)));
    }

    #[test]
    fn duplicate_and_empty_managers_are_rejected() {
        let config = raw(r#"
            config_version = 1
            managers = ["alice", "alice", ""]
        "#);

        let errors = validate_config(&config);
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::DuplicateManagerId(id) if id == "alice")));
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::EmptyManagerId)));
    }
}
