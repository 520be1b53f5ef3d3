// SPDX-License-Identifier: MPL-2.0
//! Centralized default values for all synchronization and buffering constants.
//!
//! This module serves as the single source of truth for the tuning values
//! used across the playback core. Constants are organized by category.
//!
//! # Categories
//!
//! - **Clock sync**: thresholds used by the pacer and clock resync
//! - **External clock speed**: realtime-input speed nudging
//! - **Buffering**: read-thread back-pressure limits
//! - **Frame queues**: per-kind ring capacities
//! - **Audio correction**: drift averaging for audio-side sync

// ==========================================================================
// Clock Sync Defaults
// ==========================================================================

/// Drift (seconds) beyond which clocks are considered unrelated and hard-reset
/// instead of corrected.
pub const NOSYNC_THRESHOLD: f64 = 10.0;

/// Lower bound of the video sync threshold (seconds).
pub const SYNC_THRESHOLD_MIN: f64 = 0.04;

/// Upper bound of the video sync threshold (seconds).
pub const SYNC_THRESHOLD_MAX: f64 = 0.1;

/// Frames longer than this are stretched by the drift instead of duplicated.
pub const SYNC_FRAMEDUP_THRESHOLD: f64 = 0.1;

/// Maximum plausible frame duration for inputs with discontinuous timestamps.
pub const MAX_PICTURE_DURATION_DISCONTINUOUS: f64 = 10.0;

/// Maximum plausible frame duration for all other inputs.
pub const MAX_PICTURE_DURATION: f64 = 3600.0;

/// Presentation driver poll interval (seconds).
pub const REFRESH_RATE: f64 = 0.01;

// ==========================================================================
// External Clock Speed Defaults
// ==========================================================================

/// Queue depth at or below which the external clock is slowed down.
pub const EXTERNAL_CLOCK_MIN_FRAMES: usize = 2;

/// Queue depth above which the external clock is sped up.
pub const EXTERNAL_CLOCK_MAX_FRAMES: usize = 10;

/// Slowest external clock speed.
pub const EXTERNAL_CLOCK_SPEED_MIN: f64 = 0.900;

/// Fastest external clock speed.
pub const EXTERNAL_CLOCK_SPEED_MAX: f64 = 1.010;

/// Speed adjustment applied per refresh.
pub const EXTERNAL_CLOCK_SPEED_STEP: f64 = 0.001;

// ==========================================================================
// Buffering Defaults
// ==========================================================================

/// Total buffered packet bytes across all components before reads pause.
pub const MAX_QUEUE_BYTES: usize = 15 * 1024 * 1024;

/// Packet count a component needs before it "has enough".
pub const MIN_FRAMES: usize = 25;

/// Buffered duration (seconds) a component needs before it "has enough".
pub const MIN_BUFFERED_SECS: f64 = 1.0;

/// Bounded wait used by blocking queue operations and the read loop (milliseconds).
pub const QUEUE_WAIT_TIMEOUT_MS: u64 = 10;

/// Byte rate assumed for byte seeking when the input reports no bit rate.
pub const FALLBACK_SEEK_BYTES_PER_SEC: f64 = 180_000.0;

// ==========================================================================
// Frame Queue Defaults
// ==========================================================================

/// Decoded picture slots. Small to bound display latency.
pub const VIDEO_PICTURE_QUEUE_SIZE: usize = 3;

/// Decoded audio chunk slots.
pub const SAMPLE_QUEUE_SIZE: usize = 9;

/// Decoded subtitle slots. Large to absorb bursty cues.
pub const SUBPICTURE_QUEUE_SIZE: usize = 16;

// ==========================================================================
// Audio Correction Defaults
// ==========================================================================

/// Number of callbacks over which the audio drift is averaged.
pub const AUDIO_DIFF_AVG_NB: u32 = 20;

/// Maximum sample-count change per chunk, in percent.
pub const SAMPLE_CORRECTION_PERCENT_MAX: usize = 10;

/// Smallest hardware buffer the audio device is asked for, in sample frames.
pub const AUDIO_MIN_BUFFER_FRAMES: u32 = 512;

/// Target number of device callbacks per second.
pub const AUDIO_MAX_CALLBACKS_PER_SEC: u32 = 30;

// ==========================================================================
// Compile-time Validation
// ==========================================================================

const _: () = {
    assert!(SYNC_THRESHOLD_MIN > 0.0);
    assert!(SYNC_THRESHOLD_MAX > SYNC_THRESHOLD_MIN);
    assert!(NOSYNC_THRESHOLD > SYNC_THRESHOLD_MAX);
    assert!(MAX_PICTURE_DURATION > MAX_PICTURE_DURATION_DISCONTINUOUS);

    assert!(EXTERNAL_CLOCK_MAX_FRAMES > EXTERNAL_CLOCK_MIN_FRAMES);
    assert!(EXTERNAL_CLOCK_SPEED_MIN < 1.0);
    assert!(EXTERNAL_CLOCK_SPEED_MAX > 1.0);
    assert!(EXTERNAL_CLOCK_SPEED_STEP > 0.0);

    assert!(MAX_QUEUE_BYTES > 0);
    assert!(MIN_FRAMES > 0);
    assert!(QUEUE_WAIT_TIMEOUT_MS > 0);

    // Video small, audio larger, subtitle largest.
    assert!(VIDEO_PICTURE_QUEUE_SIZE >= 2);
    assert!(SAMPLE_QUEUE_SIZE > VIDEO_PICTURE_QUEUE_SIZE);
    assert!(SUBPICTURE_QUEUE_SIZE > SAMPLE_QUEUE_SIZE);

    assert!(AUDIO_DIFF_AVG_NB > 0);
    assert!(SAMPLE_CORRECTION_PERCENT_MAX < 100);
};
