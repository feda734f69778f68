//! Analysis configuration.
//!
//! Detection geometry is tuned for one specific recording setup (a
//! 1920x1080 capture with the launch indicator in the bottom-right
//! corner). Changing the capture resolution means changing these numbers.

use crate::analysis::{FirstBlankThreshold, LaunchIndicator};
use crate::extraction::RectFilter;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Playback is sampled at this rate regardless of the encoding rate.
pub const NOMINAL_FPS: u32 = 60;

/// Worker pool sizing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Number of parallel diff units.
    pub workers: usize,
    /// Frame pairs that may wait in a single unit's queue before dispatch blocks.
    pub queue_depth: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            queue_depth: 4,
        }
    }
}

/// Playback sampling configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Frames per second used to estimate the total frame count.
    pub nominal_fps: u32,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            nominal_fps: NOMINAL_FPS,
        }
    }
}

/// Frame difference engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiffConfig {
    /// Minimum absolute luma change for a pixel to count as changed.
    pub pixel_threshold: u8,
    /// Rects dropped by the worker before reporting (text cursor blink).
    pub cursor_filter: RectFilter,
}

impl Default for DiffConfig {
    fn default() -> Self {
        Self {
            pixel_threshold: 24,
            cursor_filter: RectFilter::default(),
        }
    }
}

/// Timeline detection geometry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    pub launch: LaunchIndicator,
    pub first_blank: FirstBlankThreshold,
}

/// Full configuration file format.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FileConfig {
    #[serde(default)]
    pub pool: PoolConfig,
    #[serde(default)]
    pub playback: PlaybackConfig,
    #[serde(default)]
    pub diff: DiffConfig,
    #[serde(default)]
    pub detection: DetectionConfig,
}

/// Configuration validation errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid worker count {0} (must be 1-256)")]
    InvalidWorkers(usize),
    #[error("invalid queue depth (must be at least 1)")]
    InvalidQueueDepth,
    #[error("invalid frame rate {0} (must be 1-240 fps)")]
    InvalidFrameRate(u32),
    #[error("failed to read config file: {0}")]
    FileReadError(String),
    #[error("failed to parse config file: {0}")]
    ParseError(String),
}

impl PoolConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 || self.workers > 256 {
            return Err(ConfigError::InvalidWorkers(self.workers));
        }
        if self.queue_depth == 0 {
            return Err(ConfigError::InvalidQueueDepth);
        }
        Ok(())
    }
}

impl PlaybackConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.nominal_fps == 0 || self.nominal_fps > 240 {
            return Err(ConfigError::InvalidFrameRate(self.nominal_fps));
        }
        Ok(())
    }
}

impl FileConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::FileReadError(e.to_string()))?;
        Self::from_toml(&content)
    }

    /// Parses and validates configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: FileConfig =
            toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates every section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.pool.validate()?;
        self.playback.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_valid() {
        let config = FileConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.playback.nominal_fps, 60);
        assert_eq!(config.detection.launch.x, 1883);
        assert_eq!(config.detection.first_blank.min_width, 1276);
    }

    #[test]
    fn test_zero_workers_invalid() {
        let mut config = FileConfig::default();
        config.pool.workers = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidWorkers(0))
        ));
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = FileConfig::from_toml("").unwrap();
        assert_eq!(config.pool.queue_depth, 4);
        assert_eq!(config.diff.pixel_threshold, 24);
    }

    #[test]
    fn test_partial_sections_override() {
        let config = FileConfig::from_toml(
            r#"
            [pool]
            workers = 2

            [detection.launch]
            x = 100
            y = 200
            "#,
        )
        .unwrap();

        assert_eq!(config.pool.workers, 2);
        assert_eq!(config.pool.queue_depth, 4);
        assert_eq!(config.detection.launch.x, 100);
        assert_eq!(config.detection.launch.width, 23);
        assert_eq!(config.detection.launch.tolerance, 3);
    }

    #[test]
    fn test_bad_frame_rate_rejected() {
        assert!(matches!(
            FileConfig::from_toml("[playback]\nnominal_fps = 0\n"),
            Err(ConfigError::InvalidFrameRate(0))
        ));
    }
}
