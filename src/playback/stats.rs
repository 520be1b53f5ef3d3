// SPDX-License-Identifier: MPL-2.0
//! Playback statistics.

use std::sync::atomic::{AtomicU64, Ordering};

/// Frame drop counters, bumped by the decode loop and the pacer.
#[derive(Debug, Default)]
pub struct DropCounters {
    early: AtomicU64,
    late: AtomicU64,
}

impl DropCounters {
    /// A decoded picture was discarded before conversion.
    pub fn record_early(&self) {
        self.early.fetch_add(1, Ordering::Relaxed);
    }

    /// A queued picture was skipped by the pacer.
    pub fn record_late(&self) {
        self.late.fetch_add(1, Ordering::Relaxed);
    }

    #[must_use]
    pub fn early(&self) -> u64 {
        self.early.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn late(&self) -> u64 {
        self.late.load(Ordering::Relaxed)
    }
}

/// Buffer occupancy of one component.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    pub packets: usize,
    pub bytes: usize,
    pub pending_frames: usize,
}

/// Point-in-time snapshot of a session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackStats {
    /// Master clock in seconds, NaN before the first frame.
    pub master_clock: f64,
    /// Audio clock minus video clock, NaN unless both are defined.
    pub av_drift: f64,
    pub audio: QueueStats,
    pub video: QueueStats,
    pub subtitle: QueueStats,
    pub frame_drops_early: u64,
    pub frame_drops_late: u64,
}

impl PlaybackStats {
    /// Total buffered packet bytes.
    #[must_use]
    pub fn total_bytes(&self) -> usize {
        self.audio.bytes + self.video.bytes + self.subtitle.bytes
    }

    /// Total dropped pictures.
    #[must_use]
    pub fn total_drops(&self) -> u64 {
        self.frame_drops_early + self.frame_drops_late
    }
}
