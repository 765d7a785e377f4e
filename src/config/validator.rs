//! Configuration validation rules.
//!
//! This module validates configuration for correctness:
//! - The elevation command can't contain blank entries
//! - Reload retries need at least one attempt and a sane delay range

use crate::config::schema::UmakeConfig;
use crate::error::{Result, UmakeError};

/// Validation error with context.
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// Rule identifier
    pub rule: String,
    /// Human-readable error message
    pub message: String,
}

impl ValidationError {
    fn new(rule: &str, message: String) -> Self {
        Self {
            rule: rule.to_string(),
            message,
        }
    }
}

/// Validate a configuration and return all errors.
///
/// This function collects all validation errors rather than stopping
/// at the first one, allowing users to fix multiple issues at once.
pub fn validate_config(config: &UmakeConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let settings = &config.requirements;

    if settings
        .elevation_command
        .iter()
        .any(|part| part.trim().is_empty())
    {
        errors.push(ValidationError::new(
            "blank-elevation-arg",
            "requirements.elevation_command can't contain blank entries".to_string(),
        ));
    }

    let retry = &settings.reload_retry;
    if retry.max_attempts == 0 {
        errors.push(ValidationError::new(
            "zero-attempts",
            "requirements.reload_retry.max_attempts must be at least 1".to_string(),
        ));
    }
    if retry.initial_delay_ms > retry.max_delay_ms {
        errors.push(ValidationError::new(
            "inverted-delays",
            format!(
                "requirements.reload_retry.initial_delay_ms ({}) exceeds max_delay_ms ({})",
                retry.initial_delay_ms, retry.max_delay_ms
            ),
        ));
    }

    errors
}

/// Validate a configuration, returning the first error as a Result.
pub fn validate(config: &UmakeConfig) -> Result<()> {
    let errors = validate_config(config);

    if errors.is_empty() {
        Ok(())
    } else {
        let messages: Vec<_> = errors.iter().map(|e| e.message.clone()).collect();
        Err(UmakeError::ConfigValidationError {
            message: messages.join("; "),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(validate(&UmakeConfig::default()).is_ok());
    }

    #[test]
    fn empty_elevation_command_is_allowed() {
        let mut config = UmakeConfig::default();
        config.requirements.elevation_command.clear();
        assert!(validate_config(&config).is_empty());
    }

    #[test]
    fn blank_elevation_entry_is_rejected() {
        let mut config = UmakeConfig::default();
        config.requirements.elevation_command = vec!["sudo".into(), " ".into()];

        let errors = validate_config(&config);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].rule, "blank-elevation-arg");
    }

    #[test]
    fn zero_attempts_is_rejected() {
        let mut config = UmakeConfig::default();
        config.requirements.reload_retry.max_attempts = 0;

        let errors = validate_config(&config);
        assert!(errors.iter().any(|e| e.rule == "zero-attempts"));
    }

    #[test]
    fn collects_multiple_errors() {
        let mut config = UmakeConfig::default();
        config.requirements.elevation_command = vec![String::new()];
        config.requirements.reload_retry.initial_delay_ms = 5000;
        config.requirements.reload_retry.max_delay_ms = 100;

        let errors = validate_config(&config);
        assert_eq!(errors.len(), 2);

        let err = validate(&config).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("blank entries"));
        assert!(msg.contains("exceeds max_delay_ms"));
    }
}
