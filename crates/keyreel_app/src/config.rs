// SPDX-License-Identifier: MIT OR Apache-2.0
//! Application configuration.
//!
//! Settings live in a RON file next to the manifests. A missing file yields
//! the defaults; a malformed one is an error.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default configuration file name
pub const CONFIG_FILE_NAME: &str = "keyreel.ron";

/// Errors that can occur while loading or saving configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Reading or writing the file failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// The file is not valid RON for this structure
    #[error("Failed to parse {path}: {source}")]
    Parse {
        /// Offending file
        path: PathBuf,
        /// Parser error with position
        source: ron::error::SpannedError,
    },
    /// Serialization failed
    #[error("Failed to serialize: {0}")]
    Serialize(#[from] ron::Error),
}

/// Export settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportSettings {
    /// Internal rendering resolution multiplier
    pub supersample: u32,
    /// Wall-clock limit for animated file encoding, in seconds
    pub encode_timeout_secs: u64,
    /// GIF quantizer speed (1 = best quality, 30 = fastest)
    pub gif_speed: i32,
    /// Prefix of artifact file names
    pub file_prefix: String,
    /// Directory artifacts are written to
    pub output_dir: PathBuf,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            supersample: 2,
            encode_timeout_secs: 120,
            gif_speed: 10,
            file_prefix: "keyreel".to_string(),
            output_dir: PathBuf::from("."),
        }
    }
}

impl ExportSettings {
    /// Encode timeout as a duration
    pub fn encode_timeout(&self) -> Duration {
        Duration::from_secs(self.encode_timeout_secs)
    }
}

/// Playback settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackSettings {
    /// Minimum interval between live target writes, in milliseconds
    pub throttle_ms: u64,
    /// Host refresh interval of the preview driver, in milliseconds
    pub refresh_interval_ms: u64,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            throttle_ms: 50,
            refresh_interval_ms: 16,
        }
    }
}

impl PlaybackSettings {
    /// Write throttle as a duration
    pub fn throttle(&self) -> Duration {
        Duration::from_millis(self.throttle_ms)
    }

    /// Refresh interval as a duration, never zero
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms.max(1))
    }
}

/// Complete application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Export settings
    pub export: ExportSettings,
    /// Playback settings
    pub playback: PlaybackSettings,
}

impl AppConfig {
    /// Load configuration, falling back to defaults if the file does not exist
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        Self::load(path)
    }

    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config = ron::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let pretty = ron::ser::PrettyConfig::default()
            .depth_limit(3)
            .separate_tuple_members(true);
        let content = ron::ser::to_string_pretty(self, pretty)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
