// SPDX-License-Identifier: MPL-2.0
//! Playback newtypes.
//!
//! This module provides type-safe wrappers for playback values,
//! ensuring they are always within valid ranges.

// =============================================================================
// Volume
// =============================================================================

/// Volume bounds (0.0 to 1.5, where 1.0 = 100%).
pub mod volume_bounds {
    /// Minimum volume level.
    pub const MIN: f32 = 0.0;
    /// Maximum volume level (1.5 = 150% amplification).
    pub const MAX: f32 = 1.5;
    /// Default volume level.
    pub const DEFAULT: f32 = 1.0;
    /// Volume adjustment step (5%).
    pub const STEP: f32 = 0.05;
}

/// Volume level, guaranteed to be within valid range (0.0–1.5).
///
/// Values above 1.0 represent amplification (up to 150%).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Volume(f32);

impl Volume {
    /// Creates a new volume level, clamping to valid range.
    #[must_use]
    pub fn new(volume: f32) -> Self {
        Self(volume.clamp(volume_bounds::MIN, volume_bounds::MAX))
    }

    /// Returns the volume value as f32.
    #[must_use]
    pub fn value(self) -> f32 {
        self.0
    }

    /// Returns the sample multiplier for this volume.
    ///
    /// A quadratic curve is applied so the slider feels linear:
    /// 50% → 0.25 (-12 dB), 100% → 1.0, 150% → 2.25.
    #[must_use]
    pub fn gain(self) -> f32 {
        self.0 * self.0
    }

    /// Returns true if volume is effectively muted (below audible threshold).
    #[must_use]
    pub fn is_muted(self) -> bool {
        self.0 < 0.001
    }

    /// Increases volume by one step, clamping to maximum.
    #[must_use]
    pub fn increase(self) -> Self {
        Self::new(self.0 + volume_bounds::STEP)
    }

    /// Decreases volume by one step, clamping to minimum.
    #[must_use]
    pub fn decrease(self) -> Self {
        Self::new(self.0 - volume_bounds::STEP)
    }
}

impl Default for Volume {
    fn default() -> Self {
        Self(volume_bounds::DEFAULT)
    }
}

// =============================================================================
// SeekStep
// =============================================================================

/// Seek step bounds in seconds.
pub mod seek_step_bounds {
    /// Minimum seek step.
    pub const MIN: f64 = 0.5;
    /// Maximum seek step.
    pub const MAX: f64 = 600.0;
    /// Default seek step.
    pub const DEFAULT: f64 = 10.0;
}

/// Relative seek increment in seconds, guaranteed to be within 0.5–600 s.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeekStep(f64);

impl SeekStep {
    /// Creates a new seek step, clamping to valid range.
    #[must_use]
    pub fn new(secs: f64) -> Self {
        Self(secs.clamp(seek_step_bounds::MIN, seek_step_bounds::MAX))
    }

    /// Returns the step in seconds.
    #[must_use]
    pub fn value(self) -> f64 {
        self.0
    }
}

impl Default for SeekStep {
    fn default() -> Self {
        Self(seek_step_bounds::DEFAULT)
    }
}

// =============================================================================
// SyncMode / FrameDropPolicy
// =============================================================================

/// Which timeline the presentation treats as ground truth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncMode {
    /// Audio clock is master; video is corrected toward it.
    #[default]
    Audio,
    /// Video clock is master; audio is resampled toward it.
    Video,
    /// Wall-clock-driven external clock is master.
    External,
}

/// When the presenter may drop late frames instead of showing them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FrameDropPolicy {
    /// Drop only when video is not the sync master.
    #[default]
    Auto,
    /// Always allow dropping.
    Always,
    /// Never drop.
    Never,
}

impl FrameDropPolicy {
    /// Returns whether dropping is allowed given the effective master.
    #[must_use]
    pub fn allows_drop(self, master: SyncMode) -> bool {
        match self {
            Self::Always => true,
            Self::Auto => master != SyncMode::Video,
            Self::Never => false,
        }
    }
}
