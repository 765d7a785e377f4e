//! Config layers and how they stack.
//!
//! Every config file is read as a [`ConfigLayer`], where each setting is
//! optional. Layers are applied onto the built-in defaults in order:
//!
//! - `elevation_command` is replaced as a whole; `[]` means "run the
//!   helper directly"
//! - `exchange_dir` is replaced, and `null` goes back to the system temp dir
//! - `reload_retry` is merged field by field

use serde::{Deserialize, Deserializer};
use std::path::PathBuf;

use crate::config::schema::{ReloadRetrySettings, RequirementsSettings, UmakeConfig};

/// Settings from one config file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ConfigLayer {
    pub requirements: RequirementsLayer,
}

/// The `requirements` section of one config file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RequirementsLayer {
    pub elevation_command: Option<Vec<String>>,

    /// `Some(None)` is an explicit `null`.
    #[serde(deserialize_with = "present")]
    pub exchange_dir: Option<Option<PathBuf>>,

    pub reload_retry: ReloadRetryLayer,
}

/// The `requirements.reload_retry` section of one config file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ReloadRetryLayer {
    pub max_attempts: Option<u32>,
    pub initial_delay_ms: Option<u64>,
    pub max_delay_ms: Option<u64>,
}

/// Tells a key set to `null` apart from a missing key.
fn present<'de, D, T>(deserializer: D) -> std::result::Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

impl ConfigLayer {
    /// Apply this layer on top of `config`.
    pub fn apply(self, config: &mut UmakeConfig) {
        self.requirements.apply(&mut config.requirements);
    }
}

impl RequirementsLayer {
    fn apply(self, settings: &mut RequirementsSettings) {
        if let Some(command) = self.elevation_command {
            settings.elevation_command = command;
        }
        if let Some(dir) = self.exchange_dir {
            settings.exchange_dir = dir;
        }
        self.reload_retry.apply(&mut settings.reload_retry);
    }
}

impl ReloadRetryLayer {
    fn apply(self, retry: &mut ReloadRetrySettings) {
        if let Some(attempts) = self.max_attempts {
            retry.max_attempts = attempts;
        }
        if let Some(delay) = self.initial_delay_ms {
            retry.initial_delay_ms = delay;
        }
        if let Some(delay) = self.max_delay_ms {
            retry.max_delay_ms = delay;
        }
    }
}

/// The built-in defaults with every layer applied, first to last.
pub fn apply_layers(layers: impl IntoIterator<Item = ConfigLayer>) -> UmakeConfig {
    let mut config = UmakeConfig::default();
    for layer in layers {
        layer.apply(&mut config);
    }
    config
}
