//! Service configuration.
//!
//! Settings are deserialised from a TOML file with compiled-in defaults for
//! every field, so a missing file or a partial file both work. The loaded
//! `Settings` value is constructed once in `main` and passed explicitly into
//! the scheduler and evaluator; there is no ambient global configuration.
//!
//! ## Loading order
//!
//! 1. Explicit `--config` path (must exist)
//! 2. `FIELDWATCH_CONFIG` environment variable
//! 3. `fieldwatch.toml` in the current working directory
//! 4. Built-in defaults

pub mod defaults;

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Errors raised while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub server: ServerSettings,
    pub store: StoreSettings,
    pub scheduler: SchedulerSettings,
    pub solar: SolarSettings,
    pub model: ModelSettings,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ServerSettings {
    /// HTTP bind address.
    pub addr: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            addr: defaults::DEFAULT_SERVER_ADDR.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct StoreSettings {
    /// Directory for the embedded record store.
    pub data_dir: PathBuf,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(defaults::DEFAULT_DATA_DIR),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct SchedulerSettings {
    /// Seconds between fleet passes.
    pub pass_interval_secs: u64,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            pass_interval_secs: defaults::PASS_INTERVAL_SECS,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct SolarSettings {
    /// Site coordinates used when a station reports none of its own.
    pub default_latitude: Option<f64>,
    pub default_longitude: Option<f64>,
}

impl SolarSettings {
    /// Default site coordinates, when both are configured.
    pub fn default_coords(&self) -> Option<(f64, f64)> {
        Some((self.default_latitude?, self.default_longitude?))
    }
}

impl Default for SolarSettings {
    fn default() -> Self {
        Self {
            default_latitude: Some(defaults::DEFAULT_SITE_LATITUDE),
            default_longitude: Some(defaults::DEFAULT_SITE_LONGITUDE),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ModelSettings {
    /// JSON export of the fitted feature scaler.
    pub scaler_path: PathBuf,
    /// JSON export of the autoencoder weights.
    pub weights_path: PathBuf,
    /// One-line text file with the anomaly threshold.
    pub threshold_path: PathBuf,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            scaler_path: PathBuf::from(defaults::DEFAULT_SCALER_PATH),
            weights_path: PathBuf::from(defaults::DEFAULT_WEIGHTS_PATH),
            threshold_path: PathBuf::from(defaults::DEFAULT_THRESHOLD_PATH),
        }
    }
}

impl Settings {
    /// Load settings following the documented precedence.
    ///
    /// An explicitly passed path must exist; the fallback locations may be
    /// absent, in which case the defaults apply.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }

        if let Ok(env_path) = std::env::var("FIELDWATCH_CONFIG") {
            return Self::from_file(Path::new(&env_path));
        }

        let default_path = Path::new("fieldwatch.toml");
        if default_path.exists() {
            return Self::from_file(default_path);
        }

        Ok(Self::default())
    }

    /// Parse a TOML settings file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }
}
