// SPDX-License-Identifier: MPL-2.0
//! Playback clocks.
//!
//! A session owns three [`Clock`]s: audio, video and external. Each one
//! extrapolates a presentation time from its last update point, honours a
//! speed ratio and a paused flag, and is tied to an epoch source (the packet
//! queue that feeds it). Once that source has moved on to a newer epoch the
//! clock reads as NaN until it is set again.
//!
//! Clocks are lock-free: every field is an atomic, written by a single owner
//! thread and read by any. A reader may observe a mix of two updates; consumers
//! already treat NaN and slightly stale values as normal.

use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU64, Ordering};
use std::sync::Arc;

use crate::config::NOSYNC_THRESHOLD;
use crate::domain::media::GroupIndex;
use crate::playback::time::now_secs;

/// Anything that publishes a current epoch a clock can be checked against.
pub trait EpochSource: Send + Sync {
    /// Returns the epoch new data is currently stamped with.
    fn group_index(&self) -> GroupIndex;
}

/// `f64` stored as bits in an `AtomicU64`.
#[derive(Debug)]
struct AtomicF64(AtomicU64);

impl AtomicF64 {
    fn new(value: f64) -> Self {
        Self(AtomicU64::new(value.to_bits()))
    }

    fn load(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Acquire))
    }

    fn store(&self, value: f64) {
        self.0.store(value.to_bits(), Ordering::Release);
    }
}

/// A speed-adjustable, pausable time source tied to an epoch.
pub struct Clock {
    /// Base time at the last update.
    pts: AtomicF64,
    /// `pts - last_updated`, the offset extrapolation starts from.
    pts_drift: AtomicF64,
    /// Wall time of the last update.
    last_updated: AtomicF64,
    speed: AtomicF64,
    group_index: AtomicI32,
    paused: AtomicBool,
    /// `None` means the clock is its own epoch source and never goes stale.
    source: Option<Arc<dyn EpochSource>>,
    nosync_threshold: f64,
}

impl std::fmt::Debug for Clock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Clock")
            .field("pts", &self.pts.load())
            .field("speed", &self.speed.load())
            .field("group_index", &self.group_index())
            .field("paused", &self.is_paused())
            .finish_non_exhaustive()
    }
}

impl Clock {
    /// Creates a clock checked against `source`, or against itself if `None`.
    #[must_use]
    pub fn new(source: Option<Arc<dyn EpochSource>>) -> Self {
        Self::with_nosync_threshold(source, NOSYNC_THRESHOLD)
    }

    /// Creates a clock with a custom hard-resync threshold.
    #[must_use]
    pub fn with_nosync_threshold(source: Option<Arc<dyn EpochSource>>, threshold: f64) -> Self {
        let clock = Self {
            pts: AtomicF64::new(f64::NAN),
            pts_drift: AtomicF64::new(f64::NAN),
            last_updated: AtomicF64::new(0.0),
            speed: AtomicF64::new(1.0),
            group_index: AtomicI32::new(-1),
            paused: AtomicBool::new(false),
            source,
            nosync_threshold: threshold,
        };
        clock.set(f64::NAN, -1);
        clock
    }

    /// Returns the current time in seconds, or NaN if unset or stale.
    #[must_use]
    pub fn value(&self) -> f64 {
        self.value_at(now_secs())
    }

    /// Returns the time the clock reads at wall time `now`.
    #[must_use]
    pub fn value_at(&self, now: f64) -> f64 {
        if self.is_stale() {
            return f64::NAN;
        }
        if self.is_paused() {
            return self.pts.load();
        }
        let last_updated = self.last_updated.load();
        let speed = self.speed.load();
        self.pts_drift.load() + now - (now - last_updated) * (1.0 - speed)
    }

    /// Returns true if the epoch source has moved past this clock's epoch.
    #[must_use]
    pub fn is_stale(&self) -> bool {
        self.source
            .as_ref()
            .is_some_and(|source| source.group_index() != self.group_index())
    }

    /// Sets the clock to `pts` in epoch `group_index` at the current wall time.
    pub fn set(&self, pts: f64, group_index: GroupIndex) {
        self.set_at(pts, group_index, now_secs());
    }

    /// Sets the clock to `pts` in epoch `group_index` as of wall time `time`.
    pub fn set_at(&self, pts: f64, group_index: GroupIndex, time: f64) {
        self.pts.store(pts);
        self.last_updated.store(time);
        self.pts_drift.store(pts - time);
        self.group_index.store(group_index, Ordering::Release);
    }

    /// Changes the speed ratio without a discontinuity in `value`.
    pub fn set_speed(&self, speed: f64) {
        self.set(self.value(), self.group_index());
        self.speed.store(speed);
    }

    /// Snaps this clock to `slave` when they have drifted unrecoverably apart.
    ///
    /// Mutates only if `slave` is defined and this clock is either undefined
    /// or more than the no-sync threshold away from it.
    pub fn sync_to_slave(&self, slave: &Clock) {
        let clock = self.value();
        let slave_clock = slave.value();
        if !slave_clock.is_nan()
            && (clock.is_nan() || (clock - slave_clock).abs() > self.nosync_threshold)
        {
            self.set(slave_clock, slave.group_index());
        }
    }

    #[must_use]
    pub fn group_index(&self) -> GroupIndex {
        self.group_index.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn speed(&self) -> f64 {
        self.speed.load()
    }

    /// Base time of the last update, regardless of staleness.
    #[must_use]
    pub fn pts(&self) -> f64 {
        self.pts.load()
    }

    #[must_use]
    pub fn last_updated(&self) -> f64 {
        self.last_updated.load()
    }

    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    pub fn set_paused(&self, paused: bool) {
        self.paused.store(paused, Ordering::Release);
    }
}

/// The three clocks of a playback session.
#[derive(Debug)]
pub struct Clocks {
    pub audio: Clock,
    pub video: Clock,
    pub external: Clock,
}

impl Clocks {
    /// Creates the session clocks, audio and video checked against their
    /// packet queues and the external clock against itself.
    #[must_use]
    pub fn new(audio_source: Arc<dyn EpochSource>, video_source: Arc<dyn EpochSource>) -> Self {
        Self {
            audio: Clock::new(Some(audio_source)),
            video: Clock::new(Some(video_source)),
            external: Clock::new(None),
        }
    }

    /// Applies the paused flag to all three clocks.
    pub fn set_paused(&self, paused: bool) {
        self.audio.set_paused(paused);
        self.video.set_paused(paused);
        self.external.set_paused(paused);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    struct TestEpoch(AtomicI32);

    impl TestEpoch {
        fn shared(value: GroupIndex) -> Arc<Self> {
            Arc::new(Self(AtomicI32::new(value)))
        }

        fn bump(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    impl EpochSource for TestEpoch {
        fn group_index(&self) -> GroupIndex {
            self.0.load(Ordering::SeqCst)
        }
    }

    fn source(epoch: &Arc<TestEpoch>) -> Option<Arc<dyn EpochSource>> {
        Some(Arc::clone(epoch) as Arc<dyn EpochSource>)
    }

    #[test]
    fn new_clock_is_undefined() {
        let clock = Clock::new(None);
        assert!(clock.value().is_nan());
        assert_eq!(clock.group_index(), -1);
        assert_abs_diff_eq!(clock.speed(), 1.0);
    }

    #[test]
    fn value_extrapolates_from_set_point() {
        let clock = Clock::new(None);
        clock.set_at(10.0, 0, 100.0);
        assert_abs_diff_eq!(clock.value_at(100.0), 10.0, epsilon = 1e-9);
        assert_abs_diff_eq!(clock.value_at(102.5), 12.5, epsilon = 1e-9);
    }

    #[test]
    fn value_honours_speed() {
        let clock = Clock::new(None);
        clock.set_at(10.0, 0, 100.0);
        clock.speed.store(0.5);
        assert_abs_diff_eq!(clock.value_at(102.0), 11.0, epsilon = 1e-9);
    }

    #[test]
    fn paused_clock_returns_frozen_base() {
        let clock = Clock::new(None);
        clock.set_at(4.0, 0, 100.0);
        clock.set_paused(true);
        assert_abs_diff_eq!(clock.value_at(150.0), 4.0);
    }

    #[test]
    fn value_is_nan_once_source_epoch_moves_on() {
        let epoch = TestEpoch::shared(1);
        let clock = Clock::new(source(&epoch));
        clock.set(3.0, 1);
        assert!(!clock.value().is_nan());

        epoch.bump();
        assert!(clock.value().is_nan());
        assert!(clock.is_stale());

        clock.set(0.0, 2);
        assert!(!clock.value().is_nan());
    }

    #[test]
    fn set_speed_is_continuous() {
        let clock = Clock::new(None);
        clock.set(20.0, 0);
        let before = clock.value();
        clock.set_speed(0.9);
        let after = clock.value();
        assert_abs_diff_eq!(before, after, epsilon = 0.01);
        assert_abs_diff_eq!(clock.speed(), 0.9);
    }

    #[test]
    fn sync_to_slave_is_noop_under_threshold() {
        let master = Clock::new(None);
        let slave = Clock::new(None);
        master.set_at(10.0, 3, 0.0);
        slave.set_at(10.5, 7, 0.0);
        master.set_paused(true);
        slave.set_paused(true);

        slave.sync_to_slave(&master);
        assert_abs_diff_eq!(slave.value(), 10.5);
        assert_eq!(slave.group_index(), 7);
    }

    #[test]
    fn sync_to_slave_snaps_past_threshold() {
        let master = Clock::new(None);
        let slave = Clock::with_nosync_threshold(None, 0.1);
        master.set_at(10.0, 3, 0.0);
        slave.set_at(10.5, 7, 0.0);
        master.set_paused(true);
        slave.set_paused(true);

        slave.sync_to_slave(&master);
        assert_abs_diff_eq!(slave.value(), 10.0, epsilon = 1e-9);
        assert_eq!(slave.group_index(), 3);
    }

    #[test]
    fn sync_to_slave_fills_undefined_clock() {
        let defined = Clock::new(None);
        defined.set(5.0, 2);
        let undefined = Clock::new(None);
        undefined.sync_to_slave(&defined);
        assert_eq!(undefined.group_index(), 2);
        assert!(!undefined.value().is_nan());
    }

    #[test]
    fn sync_to_undefined_slave_is_noop() {
        let target = Clock::new(None);
        target.set(5.0, 2);
        let undefined = Clock::new(None);
        target.sync_to_slave(&undefined);
        assert_eq!(target.group_index(), 2);
    }

    #[test]
    fn clocks_pause_together() {
        let audio = TestEpoch::shared(0);
        let video = TestEpoch::shared(0);
        let clocks = Clocks::new(audio, video);
        clocks.set_paused(true);
        assert!(clocks.audio.is_paused());
        assert!(clocks.video.is_paused());
        assert!(clocks.external.is_paused());
    }
}
