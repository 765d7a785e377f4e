//! Configuration schema definitions for umake.
//!
//! This module contains the struct definitions that map to the YAML
//! configuration file format.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure for `config.yml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UmakeConfig {
    /// Settings for system package requirements
    pub requirements: RequirementsSettings,
}

/// How system package requirements are installed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RequirementsSettings {
    /// Command prefix used to run the privileged helper (e.g. `[pkexec]`
    /// or `[sudo, -n]`). Ignored when umake already runs as root.
    #[serde(default = "default_elevation_command")]
    pub elevation_command: Vec<String>,

    /// Directory for exchange files (defaults to the system temp dir)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exchange_dir: Option<PathBuf>,

    /// Retry behaviour while the package database is locked
    pub reload_retry: ReloadRetrySettings,
}

impl Default for RequirementsSettings {
    fn default() -> Self {
        Self {
            elevation_command: default_elevation_command(),
            exchange_dir: None,
            reload_retry: ReloadRetrySettings::default(),
        }
    }
}

/// Bounded exponential backoff for package cache reloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReloadRetrySettings {
    /// Total attempts before giving up with "database busy"
    pub max_attempts: u32,

    /// Delay after the first failed attempt, in milliseconds
    pub initial_delay_ms: u64,

    /// Maximum delay between attempts, in milliseconds
    pub max_delay_ms: u64,
}

impl Default for ReloadRetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            initial_delay_ms: 1000,
            max_delay_ms: 16000,
        }
    }
}

fn default_elevation_command() -> Vec<String> {
    vec!["pkexec".to_string()]
}
