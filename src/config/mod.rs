//! Configuration file reading, validation, and data directory paths.

pub mod paths;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::detect::{
    DetectionConfig, DEFAULT_BLOCK_MILLIS, DEFAULT_MAX_PAIR_WINDOW_SECS, DEFAULT_MIN_GAP_SECS,
    DEFAULT_VOLUME_THRESHOLD,
};
use paths::get_data_dir;

/// Top-level clapper_config.json shape.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClapperConfig {
    #[serde(default)]
    pub detection: DetectionSettings,
    #[serde(default)]
    pub audio: AudioSettings,
    #[serde(default)]
    pub bridge: Option<BridgeSettings>,
    /// Log filter directive (e.g. "debug"). `RUST_LOG` wins over this.
    #[serde(default)]
    pub log_level: Option<String>,
}

/// Detection tuning. Unset fields fall back to the built-in defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionSettings {
    #[serde(default)]
    pub volume_threshold: Option<f32>,
    #[serde(default)]
    pub min_gap_seconds: Option<f64>,
    #[serde(default)]
    pub max_pair_window_seconds: Option<f64>,
    #[serde(default)]
    pub block_millis: Option<u32>,
}

impl DetectionSettings {
    /// Apply defaults and validate.
    pub fn resolve(&self) -> Result<DetectionConfig, ConfigError> {
        DetectionConfig::new(
            self.volume_threshold.unwrap_or(DEFAULT_VOLUME_THRESHOLD),
            self.min_gap_seconds.unwrap_or(DEFAULT_MIN_GAP_SECS),
            self.max_pair_window_seconds
                .unwrap_or(DEFAULT_MAX_PAIR_WINDOW_SECS),
            self.block_millis.unwrap_or(DEFAULT_BLOCK_MILLIS),
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioSettings {
    /// Input device name; `None` uses the system default.
    #[serde(default)]
    pub input_device: Option<String>,
}

/// Hue bridge connection and the lights to toggle.
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeSettings {
    /// Bridge host or IP, optionally with an `http://` prefix.
    pub address: String,
    /// API username issued by the bridge.
    pub username: String,
    #[serde(default)]
    pub lights: Vec<u32>,
}

// The username is the bridge API key; keep it out of logs.
impl std::fmt::Debug for BridgeSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BridgeSettings")
            .field("address", &self.address)
            .field("username", &"<redacted>")
            .field("lights", &self.lights)
            .finish()
    }
}

/// Configuration problems. All are fatal at startup.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Threshold is negative or not a number.
    InvalidThreshold(f32),
    /// A duration is zero, negative, or not finite.
    NonPositiveDuration { field: &'static str, value: f64 },
    /// `minGapSeconds` must be strictly below `maxPairWindowSeconds`.
    GapNotBelowWindow { min_gap: f64, max_pair_window: f64 },
    ZeroBlockLength,
    /// Config file could not be read.
    Read { path: PathBuf, message: String },
    /// Config file is not valid JSON for this shape.
    Parse { path: PathBuf, message: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidThreshold(v) => {
                write!(f, "volumeThreshold must be a non-negative number, got {}", v)
            }
            Self::NonPositiveDuration { field, value } => {
                write!(f, "{} must be a positive number of seconds, got {}", field, value)
            }
            Self::GapNotBelowWindow {
                min_gap,
                max_pair_window,
            } => write!(
                f,
                "minGapSeconds ({}) must be less than maxPairWindowSeconds ({})",
                min_gap, max_pair_window
            ),
            Self::ZeroBlockLength => write!(f, "blockMillis must be at least 1"),
            Self::Read { path, message } => {
                write!(f, "Failed to read {}: {}", path.display(), message)
            }
            Self::Parse { path, message } => {
                write!(f, "Failed to parse {}: {}", path.display(), message)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Path to clapper_config.json.
pub fn get_config_path() -> PathBuf {
    get_data_dir().join("clapper_config.json")
}

/// Read the config from the data directory, or `path` if given.
///
/// An explicit `path` must load. The default file is optional: when it is
/// missing the defaults are used, and when it cannot be read or parsed the
/// defaults are used and the problem is returned alongside them so the
/// caller can report it once logging is up.
pub fn load_config(
    path: Option<&Path>,
) -> Result<(ClapperConfig, Option<ConfigError>), ConfigError> {
    match path {
        Some(path) => match read_config_file(path)? {
            Some(cfg) => Ok((cfg, None)),
            None => Err(ConfigError::Read {
                path: path.to_path_buf(),
                message: "file not found".into(),
            }),
        },
        None => Ok(load_optional(&get_config_path())),
    }
}

fn load_optional(path: &Path) -> (ClapperConfig, Option<ConfigError>) {
    match read_config_file(path) {
        Ok(cfg) => (cfg.unwrap_or_default(), None),
        Err(e) => (ClapperConfig::default(), Some(e)),
    }
}

/// Read and deserialize a config file. `Ok(None)` if it does not exist.
fn read_config_file(path: &Path) -> Result<Option<ClapperConfig>, ConfigError> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(ConfigError::Read {
                path: path.to_path_buf(),
                message: e.to_string(),
            })
        }
    };
    serde_json::from_str(&contents)
        .map(Some)
        .map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
}
