use std::fs;
use std::path::Path;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::ReaderError;

/// Tunables for the reader pipeline. Every field has a default; a missing or
/// partial config file never blocks startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
    /// Extra distance beyond the visible window within which pages preload.
    pub lookahead_margin_px: f32,
    /// Minimum fraction of a page that must intersect the extended window.
    pub min_visible_fraction: f32,
    /// Quiet period before a text-context extraction runs.
    pub text_debounce_ms: u64,
    /// Quiet period coalescing frame-capture triggers.
    pub frame_debounce_ms: u64,
    /// Period of the live-session frame-capture timer.
    pub frame_interval_ms: u64,
    /// Fixed padding subtracted from the container in fit computations.
    pub fit_padding_px: f32,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            lookahead_margin_px: 200.0,
            min_visible_fraction: 0.1,
            text_debounce_ms: 500,
            frame_debounce_ms: 500,
            frame_interval_ms: 2000,
            fit_padding_px: 32.0,
        }
    }
}

impl ReaderConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self, ReaderError> {
        toml::from_str(raw).map_err(|err| ReaderError::Store(format!("invalid config: {err}")))
    }

    pub fn load_from(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(raw) => match Self::from_toml_str(&raw) {
                Ok(config) => config,
                Err(err) => {
                    warn!(path = %path.display(), %err, "ignoring malformed config");
                    Self::default()
                }
            },
            Err(_) => Self::default(),
        }
    }

    /// Loads `studypad.toml` from the platform config directory, falling
    /// back to defaults when absent or unreadable.
    pub fn load_or_default() -> Self {
        match ProjectDirs::from("net", "studypad", "studypad") {
            Some(dirs) => Self::load_from(&dirs.config_dir().join("studypad.toml")),
            None => Self::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reader_contract() {
        let config = ReaderConfig::default();
        assert_eq!(config.lookahead_margin_px, 200.0);
        assert_eq!(config.min_visible_fraction, 0.1);
        assert_eq!(config.text_debounce_ms, 500);
        assert_eq!(config.frame_debounce_ms, 500);
        assert_eq!(config.frame_interval_ms, 2000);
    }

    #[test]
    fn partial_toml_keeps_remaining_defaults() {
        let config = ReaderConfig::from_toml_str("text_debounce_ms = 750\n").unwrap();
        assert_eq!(config.text_debounce_ms, 750);
        assert_eq!(config.frame_interval_ms, 2000);
    }

    #[test]
    fn malformed_toml_is_an_error() {
        assert!(ReaderConfig::from_toml_str("text_debounce_ms = \"soon\"").is_err());
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = ReaderConfig::load_from(&dir.path().join("absent.toml"));
        assert_eq!(config, ReaderConfig::default());
    }
}
