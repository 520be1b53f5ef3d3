// SPDX-License-Identifier: MPL-2.0
//! Runtime playback options.
//!
//! [`PlaybackOptions`] is the in-memory form of the persisted
//! [`PlayerConfig`], extended with per-session settings that are never
//! saved: which components to open and what the renderer can display.

use crate::config::{PlayerConfig, SeekByBytes};
use crate::domain::media::{MediaKind, PixelFormat};
use crate::domain::video::{FrameDropPolicy, SeekStep, SyncMode, Volume};

/// Pixel formats the renderer accepts, in order of preference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputCapabilities {
    pub pixel_formats: Vec<PixelFormat>,
}

impl Default for OutputCapabilities {
    fn default() -> Self {
        Self {
            pixel_formats: vec![PixelFormat::Rgba],
        }
    }
}

/// Options a session is opened with.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackOptions {
    pub sync_mode: SyncMode,
    pub frame_drop: FrameDropPolicy,
    /// `None` enables unlimited buffering for realtime inputs only.
    pub infinite_buffer: Option<bool>,
    /// Number of plays; 0 loops forever.
    pub loop_count: u32,
    pub exit_on_finish: bool,
    /// Initial position in seconds.
    pub start_time: Option<f64>,
    /// Packets past `start_time + play_duration` are discarded.
    pub play_duration: Option<f64>,
    pub seek_by_bytes: SeekByBytes,
    pub seek_interval: SeekStep,
    pub volume: Volume,
    pub muted: bool,
    pub audio_enabled: bool,
    pub video_enabled: bool,
    pub subtitles_enabled: bool,
    pub capabilities: OutputCapabilities,
}

impl Default for PlaybackOptions {
    fn default() -> Self {
        PlayerConfig::default().into()
    }
}

impl From<PlayerConfig> for PlaybackOptions {
    fn from(config: PlayerConfig) -> Self {
        Self {
            sync_mode: config.sync_mode,
            frame_drop: config.frame_drop,
            infinite_buffer: config.infinite_buffer.then_some(true),
            loop_count: config.loop_count,
            exit_on_finish: config.exit_on_finish,
            start_time: config.start_time_secs,
            play_duration: config.play_duration_secs,
            seek_by_bytes: config.seek_by_bytes,
            seek_interval: SeekStep::new(config.seek_interval_secs),
            volume: Volume::new(config.volume),
            muted: config.muted,
            audio_enabled: true,
            video_enabled: true,
            subtitles_enabled: true,
            capabilities: OutputCapabilities::default(),
        }
    }
}

impl PlaybackOptions {
    /// Whether a component of `kind` may be opened.
    #[must_use]
    pub fn is_enabled(&self, kind: MediaKind) -> bool {
        match kind {
            MediaKind::Audio => self.audio_enabled,
            MediaKind::Video => self.video_enabled,
            MediaKind::Subtitle => self.subtitles_enabled,
        }
    }

    /// Resolves the byte-seek setting for an input.
    #[must_use]
    pub fn seeks_by_bytes(&self, discontinuous_timestamps: bool) -> bool {
        match self.seek_by_bytes {
            SeekByBytes::On => true,
            SeekByBytes::Off => false,
            SeekByBytes::Auto => discontinuous_timestamps,
        }
    }
}
