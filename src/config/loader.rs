//! Configuration file discovery and loading.
//!
//! This module handles finding and loading configuration files from
//! various locations in the correct priority order.

use crate::config::layer::{apply_layers, ConfigLayer};
use crate::config::schema::UmakeConfig;
use crate::error::{Result, UmakeError};
use std::fs;
use std::path::{Path, PathBuf};

/// Paths to configuration files in priority order (later overrides earlier).
///
/// Merge order:
/// 1. User config (`$XDG_CONFIG_HOME/umake/config.yml`)
/// 2. Explicit config (`--config <path>`)
#[derive(Debug, Clone, Default)]
pub struct ConfigPaths {
    /// User's config: ~/.config/umake/config.yml
    pub user: Option<PathBuf>,

    /// File passed on the command line
    pub explicit: Option<PathBuf>,
}

impl ConfigPaths {
    /// Discover config files, adding an explicit path if given.
    pub fn discover(explicit: Option<&Path>) -> Self {
        Self {
            user: Self::find_user_config(),
            explicit: explicit.map(Path::to_path_buf),
        }
    }

    /// Find the user's config under the XDG config directory.
    fn find_user_config() -> Option<PathBuf> {
        let path = dirs::config_dir()?.join("umake").join("config.yml");
        if path.exists() {
            Some(path)
        } else {
            None
        }
    }

    /// Returns all config paths in merge order.
    ///
    /// The explicit path is always included so that a missing `--config`
    /// file is reported instead of silently ignored.
    pub fn all(&self) -> Vec<&PathBuf> {
        self.user.iter().chain(self.explicit.iter()).collect()
    }
}

/// Load a single config file on top of the built-in defaults.
///
/// # Errors
///
/// Returns `ConfigNotFound` if the file doesn't exist.
/// Returns `ConfigParseError` if the YAML is invalid.
pub fn load_config_file(path: &Path) -> Result<UmakeConfig> {
    Ok(apply_layers([load_config_layer(path)?]))
}

/// Parse YAML content on top of the built-in defaults.
///
/// # Arguments
///
/// * `content` - The YAML content to parse
/// * `source_path` - Path for error reporting
pub fn parse_config(content: &str, source_path: &Path) -> Result<UmakeConfig> {
    Ok(apply_layers([parse_layer(content, source_path)?]))
}

/// Load one config file as a layer.
pub fn load_config_layer(path: &Path) -> Result<ConfigLayer> {
    let content = fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            UmakeError::ConfigNotFound {
                path: path.to_path_buf(),
            }
        } else {
            UmakeError::Io(e)
        }
    })?;
    parse_layer(&content, path)
}

fn parse_layer(content: &str, source_path: &Path) -> Result<ConfigLayer> {
    let parse_error = |e: serde_yaml::Error| UmakeError::ConfigParseError {
        path: source_path.to_path_buf(),
        message: e.to_string(),
    };
    let value: serde_yaml::Value = serde_yaml::from_str(content).map_err(parse_error)?;

    // An empty file parses to Null; treat it as "no settings".
    if value.is_null() {
        return Ok(ConfigLayer::default());
    }
    serde_yaml::from_value(value).map_err(parse_error)
}

/// Load and stack every config layer.
///
/// With no config files at all, the built-in defaults are returned.
pub fn load_config(explicit: Option<&Path>) -> Result<UmakeConfig> {
    load_from_paths(&ConfigPaths::discover(explicit))
}

/// Load and stack the given config layers.
pub fn load_from_paths(paths: &ConfigPaths) -> Result<UmakeConfig> {
    let layers = paths
        .all()
        .into_iter()
        .map(|path| load_config_layer(path))
        .collect::<Result<Vec<_>>>()?;
    Ok(apply_layers(layers))
}
