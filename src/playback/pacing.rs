// SPDX-License-Identifier: MPL-2.0
//! Video presentation pacing.
//!
//! [`VideoPacer::tick`] is called repeatedly by a presentation driver. Each
//! call decides whether the next picture is due, whether it must be dropped
//! to catch up with the master clock, and when the driver should call again.
//!
//! The order of the checks matters: stale pictures are discarded first, the
//! picture timer is reset on an epoch change, pause short-circuits to a
//! redraw, and only then is the corrected display duration compared with the
//! wall clock.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use crate::config::{
    EXTERNAL_CLOCK_MAX_FRAMES, EXTERNAL_CLOCK_MIN_FRAMES, EXTERNAL_CLOCK_SPEED_MAX,
    EXTERNAL_CLOCK_SPEED_MIN, EXTERNAL_CLOCK_SPEED_STEP, SYNC_FRAMEDUP_THRESHOLD,
    SYNC_THRESHOLD_MAX, SYNC_THRESHOLD_MIN,
};
use crate::domain::media::{GroupIndex, MediaKind};
use crate::domain::video::SyncMode;
use crate::playback::frame::FrameTiming;
use crate::playback::session::Session;
use crate::playback::time::now_secs;

/// Nominal time between two consecutive pictures.
///
/// Falls back to the current picture's own duration when the timestamps are
/// missing, non-increasing or implausibly far apart. Pictures from different
/// epochs have no duration between them.
#[must_use]
pub fn nominal_duration(current: &FrameTiming, next: &FrameTiming, max_frame_duration: f64) -> f64 {
    if current.group_index != next.group_index {
        return 0.0;
    }
    let duration = next.time - current.time;
    if duration.is_nan() || duration <= 0.0 || duration > max_frame_duration {
        current.duration
    } else {
        duration
    }
}

/// Corrects a nominal display duration by the video-minus-master drift.
///
/// `drift` is NaN when video is the master or either clock is undefined, in
/// which case `nominal` is returned unchanged.
#[must_use]
pub fn compute_picture_display_duration(nominal: f64, drift: f64, max_frame_duration: f64) -> f64 {
    let sync_threshold = nominal.min(SYNC_THRESHOLD_MAX).max(SYNC_THRESHOLD_MIN);
    if drift.is_nan() || drift.abs() >= max_frame_duration {
        return nominal;
    }
    if drift <= -sync_threshold {
        (nominal + drift).max(0.0)
    } else if drift >= sync_threshold && nominal > SYNC_FRAMEDUP_THRESHOLD {
        nominal + drift
    } else if drift >= sync_threshold {
        2.0 * nominal
    } else {
        nominal
    }
}

/// Paces the video frame queue against the session clocks.
#[derive(Debug, Clone)]
pub struct VideoPacer {
    session: Arc<Session>,
}

impl VideoPacer {
    #[must_use]
    pub fn new(session: Arc<Session>) -> Self {
        Self { session }
    }

    #[must_use]
    pub fn is_aborted(&self) -> bool {
        self.session.is_aborted()
    }

    /// Runs one refresh step; lowers `remaining` to the time until the next
    /// picture is due.
    pub fn tick(&self, remaining: &mut f64) {
        let session = &self.session;
        if !session.is_paused()
            && session.master_sync() == SyncMode::External
            && session.input.realtime
        {
            self.check_external_clock_speed();
        }

        if session.has_stream(MediaKind::Video) {
            self.advance(remaining);
            let frames = &session.queues(MediaKind::Video).frames;
            if session.force_refresh.load(Ordering::Acquire) && frames.is_head_shown() {
                self.display();
            }
        }
        session.force_refresh.store(false, Ordering::Release);
    }

    fn advance(&self, remaining: &mut f64) {
        let session = &self.session;
        let queues = session.queues(MediaKind::Video);
        let max_frame_duration = session.max_frame_duration;

        loop {
            if queues.frames.pending_count() == 0 {
                return;
            }
            let last = queues.frames.peek_last().timing();
            let Some(current) = queues.frames.peek_showable().map(|frame| frame.timing()) else {
                return;
            };

            if current.group_index != queues.packets.group_index() {
                queues.frames.dequeue();
                continue;
            }

            let mut frame_timer = session.frame_timer.lock();
            if last.group_index != current.group_index {
                *frame_timer = now_secs();
            }
            if session.is_paused() {
                return;
            }

            let last_duration = nominal_duration(&last, &current, max_frame_duration);
            let delay = self.compute_target_delay(last_duration);

            let time = now_secs();
            if time < *frame_timer + delay {
                *remaining = remaining.min(*frame_timer + delay - time);
                return;
            }

            *frame_timer += delay;
            if delay > 0.0 && time - *frame_timer > SYNC_THRESHOLD_MAX {
                *frame_timer = time;
            }
            let timer = *frame_timer;
            drop(frame_timer);

            if !current.time.is_nan() {
                self.update_video_clock(current.time, current.group_index);
            }

            if queues.frames.pending_count() > 1 {
                let next = queues.frames.peek_showable_plus().map(|frame| frame.timing());
                if let Some(next) = next {
                    let duration = nominal_duration(&current, &next, max_frame_duration);
                    let allows_drop = session.options.frame_drop.allows_drop(session.master_sync());
                    if !session.step.load(Ordering::Acquire) && allows_drop && time > timer + duration {
                        session.drops.record_late();
                        tracing::trace!(time = current.time, "late frame drop");
                        queues.frames.dequeue();
                        continue;
                    }
                }
            }

            self.expire_subtitles();

            queues.frames.dequeue();
            session.force_refresh.store(true, Ordering::Release);

            if session.step.load(Ordering::Acquire) && !session.is_paused() {
                session.finish_step();
            }
            return;
        }
    }

    fn compute_target_delay(&self, delay: f64) -> f64 {
        let session = &self.session;
        if session.master_sync() == SyncMode::Video {
            return delay;
        }
        let drift = session.clocks.video.value() - session.master_clock().value();
        let corrected = compute_picture_display_duration(delay, drift, session.max_frame_duration);
        tracing::trace!(delay = corrected, drift, "video delay");
        corrected
    }

    fn update_video_clock(&self, time: f64, group_index: GroupIndex) {
        let clocks = &self.session.clocks;
        clocks.video.set(time, group_index);
        clocks.external.sync_to_slave(&clocks.video);
    }

    /// Drops subtitles that are stale, over, or superseded by the next cue.
    fn expire_subtitles(&self) {
        let session = &self.session;
        if !session.has_stream(MediaKind::Subtitle) {
            return;
        }
        let queues = session.queues(MediaKind::Subtitle);
        let video_time = session.clocks.video.pts();
        while queues.frames.pending_count() > 0 {
            let Some((group_index, window)) = queues
                .frames
                .peek_showable()
                .map(|frame| (frame.group_index, frame.subtitle_window()))
            else {
                return;
            };
            let next_start = if queues.frames.pending_count() > 1 {
                queues
                    .frames
                    .peek_showable_plus()
                    .and_then(|frame| frame.subtitle_window())
                    .map(|(start, _)| start)
            } else {
                None
            };
            let expired = group_index != queues.packets.group_index()
                || window.is_none_or(|(_, end)| video_time > end)
                || next_start.is_some_and(|start| video_time > start);
            if !expired {
                return;
            }
            queues.frames.dequeue();
        }
    }

    /// Hands the last shown picture and any due subtitle to the presenter.
    fn display(&self) {
        let session = &self.session;
        let mut picture = session.queues(MediaKind::Video).frames.peek_last();

        let subtitles = &session.queues(MediaKind::Subtitle).frames;
        let subtitle = if session.has_stream(MediaKind::Subtitle) {
            subtitles.peek_showable().filter(|cue| {
                cue.subtitle_window()
                    .is_some_and(|(start, _)| picture.time >= start)
            })
        } else {
            None
        };

        session.presenter.render_frame(&picture, subtitle.as_deref());
        picture.is_uploaded = true;
    }

    /// Nudges the external clock speed to keep realtime buffers level.
    fn check_external_clock_speed(&self) {
        let session = &self.session;
        let packet_count = |kind| {
            session
                .has_stream(kind)
                .then(|| session.queues(kind).packets.count())
        };
        let video = packet_count(MediaKind::Video);
        let audio = packet_count(MediaKind::Audio);
        let external = &session.clocks.external;

        let starving = |count: Option<usize>| count.is_some_and(|c| c <= EXTERNAL_CLOCK_MIN_FRAMES);
        let full = |count: Option<usize>| count.is_none_or(|c| c > EXTERNAL_CLOCK_MAX_FRAMES);

        if starving(video) || starving(audio) {
            external.set_speed(EXTERNAL_CLOCK_SPEED_MIN.max(external.speed() - EXTERNAL_CLOCK_SPEED_STEP));
        } else if full(video) && full(audio) {
            external.set_speed(EXTERNAL_CLOCK_SPEED_MAX.min(external.speed() + EXTERNAL_CLOCK_SPEED_STEP));
        } else {
            let speed = external.speed();
            if speed != 1.0 {
                let towards_one = (1.0 - speed) / (1.0 - speed).abs();
                external.set_speed(speed + EXTERNAL_CLOCK_SPEED_STEP * towards_one);
            }
        }
    }
}
