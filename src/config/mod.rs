//! Configuration loading, parsing, and validation for umake.
//!
//! - Schema definitions in [`schema`]
//! - File discovery and loading in [`loader`]
//! - Layer stacking in [`layer`]
//! - Validation in [`validator`]
//!
//! # Example
//!
//! ```
//! use umake::config::{load_config_file, validate};
//! use tempfile::TempDir;
//! use std::fs;
//!
//! let temp = TempDir::new().unwrap();
//! let path = temp.path().join("config.yml");
//! fs::write(&path, "requirements:\n  elevation_command: [sudo, -n]\n").unwrap();
//!
//! let config = load_config_file(&path).unwrap();
//! validate(&config).unwrap();
//! assert_eq!(config.requirements.elevation_command, vec!["sudo", "-n"]);
//! ```
//!
//! # Configuration File Locations
//!
//! umake merges configuration in this order:
//! 1. Built-in defaults
//! 2. User config (`~/.config/umake/config.yml`)
//! 3. Explicit config (`--config <path>`)

pub mod layer;
pub mod loader;
pub mod schema;
pub mod validator;

pub use schema::{ReloadRetrySettings, RequirementsSettings, UmakeConfig};

pub use loader::{
    load_config, load_config_file, load_config_layer, load_from_paths, parse_config, ConfigPaths,
};

pub use layer::{apply_layers, ConfigLayer, ReloadRetryLayer, RequirementsLayer};

pub use validator::{validate, validate_config, ValidationError};
