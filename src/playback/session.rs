// SPDX-License-Identifier: MPL-2.0
//! State shared by every thread of a playback session.
//!
//! The read thread, the decode threads, the pacer and the audio callback all
//! hold an `Arc<Session>`. Cross-thread data flows through the queues and the
//! clocks; the remaining fields are flags and requests with a single writer.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use crate::application::port::Presenter;
use crate::config::{
    MAX_PICTURE_DURATION, MAX_PICTURE_DURATION_DISCONTINUOUS, SAMPLE_QUEUE_SIZE,
    SUBPICTURE_QUEUE_SIZE, VIDEO_PICTURE_QUEUE_SIZE,
};
use crate::domain::media::MediaKind;
use crate::domain::video::{SyncMode, Volume};
use crate::error::Error;
use crate::playback::clock::{Clock, Clocks, EpochSource};
use crate::playback::events::{EventSink, PlayerEvent};
use crate::playback::frame_queue::FrameQueue;
use crate::playback::options::PlaybackOptions;
use crate::playback::packet_queue::PacketQueue;
use crate::playback::stats::DropCounters;
use crate::playback::time::now_secs;

/// The persistent queue pair of one component kind.
///
/// Queues outlive the components that use them, so clocks can keep checking
/// against the same epoch source across stream switches.
#[derive(Debug)]
pub struct ComponentQueues {
    pub packets: Arc<PacketQueue>,
    pub frames: FrameQueue,
}

impl ComponentQueues {
    fn new(capacity: usize, keep_last: bool) -> Self {
        let packets = Arc::new(PacketQueue::new());
        let frames = FrameQueue::new(Arc::clone(&packets), capacity, keep_last);
        Self { packets, frames }
    }
}

/// A pending seek.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeekRequest {
    /// Microseconds, or a byte offset when `by_bytes`.
    pub target: i64,
    /// Relative increment that produced `target`, 0 for absolute seeks.
    pub increment: i64,
    pub by_bytes: bool,
}

#[derive(Debug, Default)]
struct Control {
    seek: Option<SeekRequest>,
    /// Target of the most recent seek request, for relative seeks without a clock.
    last_seek_target: i64,
    cycles: VecDeque<MediaKind>,
}

/// Facts about the input fixed at open time.
#[derive(Debug, Clone, Copy, Default)]
pub struct InputTraits {
    pub realtime: bool,
    pub discontinuous_timestamps: bool,
    pub start_time_micros: Option<i64>,
    pub bit_rate: Option<u64>,
}

pub struct Session {
    pub options: PlaybackOptions,
    pub presenter: Arc<dyn Presenter>,
    pub events: EventSink,
    pub clocks: Clocks,
    pub input: InputTraits,
    pub max_frame_duration: f64,
    pub seek_by_bytes: bool,
    pub drops: DropCounters,
    /// Shared with the input adapter for interrupting blocking I/O.
    pub abort: Arc<AtomicBool>,
    pub paused: AtomicBool,
    pub step: AtomicBool,
    pub force_refresh: AtomicBool,
    /// Wall time the current picture became due. Also read by pause toggling.
    pub frame_timer: Mutex<f64>,
    /// Byte position of the last packet read, used by byte seeks.
    pub last_read_position: AtomicI64,
    queues: [ComponentQueues; 3],
    stream_indices: [AtomicI64; 3],
    volume: AtomicU32,
    muted: AtomicBool,
    control: Mutex<Control>,
    reader_wakeup: Condvar,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("paused", &self.paused.load(Ordering::Relaxed))
            .field("clocks", &self.clocks)
            .finish_non_exhaustive()
    }
}

impl Session {
    #[must_use]
    pub fn new(
        options: PlaybackOptions,
        input: InputTraits,
        presenter: Arc<dyn Presenter>,
        events: EventSink,
    ) -> Self {
        let queues = [
            ComponentQueues::new(SAMPLE_QUEUE_SIZE, true),
            ComponentQueues::new(VIDEO_PICTURE_QUEUE_SIZE, true),
            ComponentQueues::new(SUBPICTURE_QUEUE_SIZE, false),
        ];
        let clocks = Clocks::new(
            Arc::clone(&queues[0].packets) as Arc<dyn EpochSource>,
            Arc::clone(&queues[1].packets) as Arc<dyn EpochSource>,
        );
        let max_frame_duration = if input.discontinuous_timestamps {
            MAX_PICTURE_DURATION_DISCONTINUOUS
        } else {
            MAX_PICTURE_DURATION
        };
        let seek_by_bytes = options.seeks_by_bytes(input.discontinuous_timestamps);
        let volume = options.volume.value();
        let muted = options.muted;
        Self {
            options,
            presenter,
            events,
            clocks,
            input,
            max_frame_duration,
            seek_by_bytes,
            drops: DropCounters::default(),
            abort: Arc::new(AtomicBool::new(false)),
            paused: AtomicBool::new(false),
            step: AtomicBool::new(false),
            force_refresh: AtomicBool::new(false),
            frame_timer: Mutex::new(0.0),
            last_read_position: AtomicI64::new(-1),
            queues,
            stream_indices: [AtomicI64::new(-1), AtomicI64::new(-1), AtomicI64::new(-1)],
            volume: AtomicU32::new(volume.to_bits()),
            muted: AtomicBool::new(muted),
            control: Mutex::new(Control::default()),
            reader_wakeup: Condvar::new(),
        }
    }

    #[must_use]
    pub fn queues(&self, kind: MediaKind) -> &ComponentQueues {
        &self.queues[kind.index()]
    }

    /// Stream currently decoded by the component of `kind`.
    #[must_use]
    pub fn stream_index(&self, kind: MediaKind) -> Option<usize> {
        usize::try_from(self.stream_indices[kind.index()].load(Ordering::Acquire)).ok()
    }

    pub fn set_stream_index(&self, kind: MediaKind, index: Option<usize>) {
        let value = index.and_then(|i| i64::try_from(i).ok()).unwrap_or(-1);
        self.stream_indices[kind.index()].store(value, Ordering::Release);
    }

    #[must_use]
    pub fn has_stream(&self, kind: MediaKind) -> bool {
        self.stream_index(kind).is_some()
    }

    /// The effective master, falling back when the requested one has no stream.
    #[must_use]
    pub fn master_sync(&self) -> SyncMode {
        match self.options.sync_mode {
            SyncMode::Video if self.has_stream(MediaKind::Video) => SyncMode::Video,
            SyncMode::Video | SyncMode::Audio if self.has_stream(MediaKind::Audio) => {
                SyncMode::Audio
            }
            _ => SyncMode::External,
        }
    }

    #[must_use]
    pub fn master_clock(&self) -> &Clock {
        match self.master_sync() {
            SyncMode::Audio => &self.clocks.audio,
            SyncMode::Video => &self.clocks.video,
            SyncMode::External => &self.clocks.external,
        }
    }

    #[must_use]
    pub fn is_aborted(&self) -> bool {
        self.abort.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    /// Flips pause state and cancels any frame step.
    pub fn toggle_pause(&self) {
        self.flip_pause();
        self.step.store(false, Ordering::Release);
    }

    /// Pauses again once the stepped picture has been shown.
    pub fn finish_step(&self) {
        self.flip_pause();
    }

    /// Flips pause state, keeping the picture timer and clocks continuous.
    fn flip_pause(&self) {
        let paused = self.is_paused();
        if paused {
            let mut frame_timer = self.frame_timer.lock();
            *frame_timer += now_secs() - self.clocks.video.last_updated();
            drop(frame_timer);
            self.clocks
                .video
                .set(self.clocks.video.value(), self.clocks.video.group_index());
        }
        self.clocks
            .external
            .set(self.clocks.external.value(), self.clocks.external.group_index());
        self.paused.store(!paused, Ordering::Release);
        self.clocks.set_paused(!paused);
        tracing::debug!(paused = !paused, "pause toggled");
    }

    /// Unpauses if needed and lets exactly one picture through.
    pub fn step_to_next_frame(&self) {
        if self.is_paused() {
            self.flip_pause();
        }
        self.step.store(true, Ordering::Release);
    }

    /// Records a seek request unless one is already pending.
    pub fn request_seek(&self, request: SeekRequest) {
        let mut control = self.control.lock();
        if control.seek.is_none() {
            control.seek = Some(request);
            control.last_seek_target = request.target;
            drop(control);
            self.notify_reader();
        }
    }

    #[must_use]
    pub fn take_seek(&self) -> Option<SeekRequest> {
        self.control.lock().seek.take()
    }

    #[must_use]
    pub fn has_pending_seek(&self) -> bool {
        self.control.lock().seek.is_some()
    }

    #[must_use]
    pub fn last_seek_target(&self) -> i64 {
        self.control.lock().last_seek_target
    }

    pub fn request_cycle(&self, kind: MediaKind) {
        self.control.lock().cycles.push_back(kind);
        self.notify_reader();
    }

    #[must_use]
    pub fn take_cycle(&self) -> Option<MediaKind> {
        self.control.lock().cycles.pop_front()
    }

    /// Wakes the read thread out of a back-pressure or EOF wait.
    pub fn notify_reader(&self) {
        self.reader_wakeup.notify_all();
    }

    /// Sleeps the read thread for at most `timeout` or until notified.
    pub fn wait_reader(&self, timeout: Duration) {
        let mut control = self.control.lock();
        let _ = self.reader_wakeup.wait_for(&mut control, timeout);
    }

    #[must_use]
    pub fn volume(&self) -> Volume {
        Volume::new(f32::from_bits(self.volume.load(Ordering::Relaxed)))
    }

    pub fn set_volume(&self, volume: Volume) {
        self.volume.store(volume.value().to_bits(), Ordering::Relaxed);
    }

    #[must_use]
    pub fn is_muted(&self) -> bool {
        self.muted.load(Ordering::Relaxed)
    }

    pub fn set_muted(&self, muted: bool) {
        self.muted.store(muted, Ordering::Relaxed);
    }

    /// Reports a fatal worker error to the presenter and the host.
    pub fn report_fatal(&self, error: Error) {
        tracing::error!("{error}");
        self.presenter.on_fatal_error(&error);
        self.events.emit(PlayerEvent::Fatal(error));
    }
}
