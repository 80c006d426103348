//! Configuration file handling for waste-scanner.
//!
//! Loads configuration from `<config dir>/waste-scanner/config.toml` or a custom path.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::camera::{Orientation, Resolution};
use crate::capture::{NegotiatorSettings, DEFAULT_ACQUIRE_TIMEOUT, DEFAULT_MAX_UPLOAD_BYTES};
use crate::retry::DEFAULT_ACQUIRE_RETRIES;

/// Configuration file structure for waste-scanner.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub camera: CameraConfig,
    #[serde(default)]
    pub upload: UploadConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraConfig {
    /// Camera to open first
    #[serde(default)]
    pub orientation: Orientation,
    #[serde(default = "default_ideal_resolution")]
    pub ideal_resolution: Resolution,
    #[serde(default = "default_max_resolution")]
    pub max_resolution: Resolution,
    /// Bound on waiting for the camera (and its permission prompt)
    #[serde(default = "default_acquire_timeout_ms")]
    pub acquire_timeout_ms: u64,
    #[serde(default = "default_acquire_retries")]
    pub acquire_retries: u32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            orientation: Orientation::default(),
            ideal_resolution: default_ideal_resolution(),
            max_resolution: default_max_resolution(),
            acquire_timeout_ms: default_acquire_timeout_ms(),
            acquire_retries: default_acquire_retries(),
        }
    }
}

impl CameraConfig {
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }

    pub fn negotiator_settings(&self) -> NegotiatorSettings {
        NegotiatorSettings {
            ideal: self.ideal_resolution,
            max: self.max_resolution,
            acquire_timeout: self.acquire_timeout(),
            retries: self.acquire_retries,
            ..NegotiatorSettings::default()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    #[serde(default = "default_max_upload_bytes")]
    pub max_bytes: usize,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_bytes: default_max_upload_bytes(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Where `capture` writes images when no `--output` is given
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directory: Option<PathBuf>,
}

fn default_ideal_resolution() -> Resolution {
    Resolution::IDEAL
}

fn default_max_resolution() -> Resolution {
    Resolution::MAX
}

fn default_acquire_timeout_ms() -> u64 {
    DEFAULT_ACQUIRE_TIMEOUT.as_millis() as u64
}

fn default_acquire_retries() -> u32 {
    DEFAULT_ACQUIRE_RETRIES
}

fn default_max_upload_bytes() -> usize {
    DEFAULT_MAX_UPLOAD_BYTES
}

impl Config {
    /// Load configuration from a file path.
    /// Returns default config if the file doesn't exist.
    /// Returns an error if the file exists but cannot be parsed.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = path.map(PathBuf::from).unwrap_or_else(default_path);

        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Config::default())
        }
    }

    /// Load from a path that must exist.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::IoError {
            path: path.to_path_buf(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Render as TOML, as written by `config init`.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{}': {source}", .path.display())]
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config file '{}': {source}", .path.display())]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Get the default config file path.
pub fn default_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(home).join(".config")
        })
        .join("waste-scanner")
        .join("config.toml")
}
