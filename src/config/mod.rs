// SPDX-License-Identifier: MPL-2.0
//! This module handles the player configuration, including loading and saving
//! user preferences to a `settings.toml` file.
//!
//! # Examples
//!
//! ```no_run
//! use avpace::config::{self, PlayerConfig};
//! use avpace::domain::video::SyncMode;
//!
//! // Load existing configuration
//! let mut config = config::load().unwrap_or_default();
//!
//! // Modify a setting
//! config.sync_mode = SyncMode::External;
//!
//! // Save the modified configuration
//! config::save(&config).expect("Failed to save config");
//! ```

pub mod defaults;

pub use defaults::*;

use crate::domain::video::{FrameDropPolicy, SyncMode};
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const CONFIG_FILE: &str = "settings.toml";
const APP_NAME: &str = "avpace";

/// Whether seeks address byte offsets instead of timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeekByBytes {
    /// Byte seeking for inputs with discontinuous timestamps, time seeking otherwise.
    #[default]
    Auto,
    On,
    Off,
}

#[derive(Serialize, Deserialize)]
#[serde(remote = "SyncMode", rename_all = "lowercase")]
enum SyncModeDef {
    Audio,
    Video,
    External,
}

#[derive(Serialize, Deserialize)]
#[serde(remote = "FrameDropPolicy", rename_all = "lowercase")]
enum FrameDropPolicyDef {
    Auto,
    Always,
    Never,
}

/// Persisted player preferences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    #[serde(with = "SyncModeDef")]
    pub sync_mode: SyncMode,
    #[serde(with = "FrameDropPolicyDef")]
    pub frame_drop: FrameDropPolicy,
    /// Disable read back-pressure (useful for realtime streams).
    pub infinite_buffer: bool,
    /// Number of plays; 0 loops forever, 1 plays once.
    pub loop_count: u32,
    /// Terminate the read loop once every component has drained.
    pub exit_on_finish: bool,
    pub start_time_secs: Option<f64>,
    pub play_duration_secs: Option<f64>,
    pub seek_by_bytes: SeekByBytes,
    pub seek_interval_secs: f64,
    pub volume: f32,
    pub muted: bool,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            sync_mode: SyncMode::Audio,
            frame_drop: FrameDropPolicy::Auto,
            infinite_buffer: false,
            loop_count: 1,
            exit_on_finish: false,
            start_time_secs: None,
            play_duration_secs: None,
            seek_by_bytes: SeekByBytes::Auto,
            seek_interval_secs: crate::domain::video::newtypes::seek_step_bounds::DEFAULT,
            volume: crate::domain::video::newtypes::volume_bounds::DEFAULT,
            muted: false,
        }
    }
}

fn get_default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|mut path| {
        path.push(APP_NAME);
        path.push(CONFIG_FILE);
        path
    })
}

pub fn load() -> Result<PlayerConfig> {
    if let Some(path) = get_default_config_path() {
        if path.exists() {
            return load_from_path(&path);
        }
    }
    Ok(PlayerConfig::default())
}

pub fn save(config: &PlayerConfig) -> Result<()> {
    if let Some(path) = get_default_config_path() {
        return save_to_path(config, &path);
    }
    Ok(())
}

pub fn load_from_path(path: &Path) -> Result<PlayerConfig> {
    let content = fs::read_to_string(path)?;
    match toml::from_str(&content) {
        Ok(config) => Ok(config),
        Err(err) => {
            tracing::warn!(path = %path.display(), "ignoring invalid settings: {err}");
            Ok(PlayerConfig::default())
        }
    }
}

pub fn save_to_path(config: &PlayerConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let content = toml::to_string_pretty(config)?;
    fs::write(path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn save_and_load_round_trip_preserves_settings() {
        let config = PlayerConfig {
            sync_mode: SyncMode::External,
            frame_drop: FrameDropPolicy::Never,
            loop_count: 0,
            start_time_secs: Some(12.5),
            ..PlayerConfig::default()
        };
        let temp_dir = tempdir().expect("failed to create temp dir");
        let config_path = temp_dir.path().join("nested").join("settings.toml");

        save_to_path(&config, &config_path).expect("failed to save config");
        let loaded = load_from_path(&config_path).expect("failed to load config");

        assert_eq!(loaded, config);
    }

    #[test]
    fn load_from_path_returns_default_on_invalid_toml() {
        let temp_dir = tempdir().expect("failed to create temp dir");
        let config_path = temp_dir.path().join("settings.toml");
        fs::write(&config_path, "not = valid = toml").expect("failed to write invalid toml");

        let loaded = load_from_path(&config_path).expect("load should not error");
        assert_eq!(loaded, PlayerConfig::default());
    }

    #[test]
    fn missing_fields_take_defaults() {
        let temp_dir = tempdir().expect("failed to create temp dir");
        let config_path = temp_dir.path().join("settings.toml");
        fs::write(&config_path, "sync_mode = \"video\"\n").expect("failed to write toml");

        let loaded = load_from_path(&config_path).expect("load should not error");
        assert_eq!(loaded.sync_mode, SyncMode::Video);
        assert_eq!(loaded.loop_count, 1);
        assert_eq!(loaded.seek_by_bytes, SeekByBytes::Auto);
    }

    #[test]
    fn default_config_plays_once_synced_to_audio() {
        let config = PlayerConfig::default();
        assert_eq!(config.sync_mode, SyncMode::Audio);
        assert_eq!(config.loop_count, 1);
        assert!(!config.exit_on_finish);
    }
}
