//! Updater configuration, loaded once at startup.
//!
//! ```toml
//! async_batch = true
//! line_gap = 0.25
//! idle_interval_ms = 1
//! max_frame_size = 2097152
//! worker_name = "hologram-updater"
//! ```
//!
//! Every key is optional.

use crate::error::{ConfigError, ConfigResult};
use crate::{DEFAULT_IDLE_INTERVAL_MS, DEFAULT_LINE_GAP, DEFAULT_MAX_FRAME_SIZE};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Configuration for [`crate::HologramUpdater`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdaterConfig {
    /// Compress packets into one batch on the worker (`true`) or hand them
    /// to the scheduler one by one (`false`).
    pub async_batch: bool,
    /// Vertical distance between stacked lines.
    pub line_gap: f32,
    /// Worker pause between empty drain cycles (ms).
    pub idle_interval_ms: u64,
    /// Largest serialized packet accepted into a batch.
    pub max_frame_size: usize,
    /// Name of the worker thread.
    pub worker_name: String,
}

impl Default for UpdaterConfig {
    fn default() -> Self {
        Self {
            async_batch: true,
            line_gap: DEFAULT_LINE_GAP,
            idle_interval_ms: DEFAULT_IDLE_INTERVAL_MS,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            worker_name: "hologram-updater".to_owned(),
        }
    }
}

impl UpdaterConfig {
    /// Parses and validates a TOML document.
    pub fn from_toml_str(source: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    /// Rejects values the updater cannot work with.
    pub fn validate(&self) -> ConfigResult<()> {
        if !self.line_gap.is_finite() || self.line_gap <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "line_gap must be finite and positive, got {}",
                self.line_gap
            )));
        }
        if self.max_frame_size == 0 {
            return Err(ConfigError::Invalid("max_frame_size must be non-zero".to_owned()));
        }
        if self.worker_name.is_empty() {
            return Err(ConfigError::Invalid("worker_name must not be empty".to_owned()));
        }
        Ok(())
    }

    /// Worker pause as a [`Duration`].
    #[must_use]
    pub const fn idle_interval(&self) -> Duration {
        Duration::from_millis(self.idle_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = UpdaterConfig::from_toml_str("").unwrap();
        assert_eq!(config, UpdaterConfig::default());
        assert!(config.async_batch);
        assert_eq!(config.idle_interval(), Duration::from_millis(1));
    }

    #[test]
    fn test_partial_document() {
        let config = UpdaterConfig::from_toml_str("async_batch = false\nline_gap = 0.3\n").unwrap();
        assert!(!config.async_batch);
        assert!((config.line_gap - 0.3).abs() < f32::EPSILON);
        assert_eq!(config.max_frame_size, DEFAULT_MAX_FRAME_SIZE);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            UpdaterConfig::from_toml_str("line_gap = -1.0"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            UpdaterConfig::from_toml_str("max_frame_size = 0"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            UpdaterConfig::from_toml_str("line_gap = \"tall\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let id = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let path = std::env::temp_dir().join(format!("phantasm_updater_{id}.toml"));
        std::fs::write(&path, "worker_name = \"holo\"\n").unwrap();

        let config = UpdaterConfig::load(&path).unwrap();
        assert_eq!(config.worker_name, "holo");

        std::fs::remove_file(&path).unwrap();
        assert!(matches!(UpdaterConfig::load(&path), Err(ConfigError::Io(_))));
    }
}
