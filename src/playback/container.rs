// SPDX-License-Identifier: MPL-2.0
//! The container: stream selection, the read thread and the public controls.
//!
//! [`Container::open`] picks and opens the components on the caller's thread,
//! then hands the input to the read thread. The read thread applies pause and
//! seek requests, keeps the packet queues topped up without exceeding the
//! buffering limits, signals end of file, and handles looping and exit once
//! every component has drained.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tokio::sync::mpsc::UnboundedReceiver;

use crate::application::port::{
    AudioDevice, AudioSource, FilterFactory, MediaInput, Presenter, ReadOutcome, SeekTarget,
};
use crate::config::{FALLBACK_SEEK_BYTES_PER_SEC, MAX_QUEUE_BYTES, QUEUE_WAIT_TIMEOUT_MS};
use crate::domain::error::InputError;
use crate::domain::media::{AudioSpec, MediaKind, StreamInfo, TargetFormat};
use crate::domain::video::Volume;
use crate::error::{Error, Result};
use crate::playback::audio_renderer::AudioRenderer;
use crate::playback::component::Component;
use crate::playback::events::{EventSink, PlayerEvent};
use crate::playback::options::PlaybackOptions;
use crate::playback::packet::Packet;
use crate::playback::pacing::VideoPacer;
use crate::playback::session::{InputTraits, SeekRequest, Session};
use crate::playback::stats::{PlaybackStats, QueueStats};
use crate::playback::time::{micros_to_secs, secs_to_micros};

/// Device format requested when an audio stream does not declare one.
const FALLBACK_AUDIO_SPEC: AudioSpec = AudioSpec {
    sample_rate: 48_000,
    channels: 2,
};

/// Where a stream cycle lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleTarget {
    Stream(usize),
    /// Subtitles only: switch the component off.
    Disabled,
    Unchanged,
}

/// Finds the stream that follows `current` among streams of `kind`.
///
/// The search stays within the program of `current`, wraps around once, and
/// skips audio streams without a usable sample format. Subtitle cycling goes
/// through "no subtitle" instead of wrapping.
#[must_use]
pub fn next_in_cycle(streams: &[StreamInfo], kind: MediaKind, current: Option<usize>) -> CycleTarget {
    let program = current
        .and_then(|index| streams.iter().find(|s| s.index == index))
        .and_then(|stream| stream.program);
    let candidates: Vec<&StreamInfo> = streams
        .iter()
        .filter(|stream| program.is_none() || stream.program == program)
        .collect();
    let start = current.and_then(|index| candidates.iter().position(|s| s.index == index));

    let mut position = start;
    loop {
        let next = position.map_or(0, |p| p + 1);
        if next >= candidates.len() {
            if kind == MediaKind::Subtitle {
                return CycleTarget::Disabled;
            }
            if start.is_none() {
                return CycleTarget::Unchanged;
            }
            position = None;
            continue;
        }
        if Some(next) == start {
            return CycleTarget::Unchanged;
        }
        position = Some(next);

        let stream = candidates[next];
        let usable = match kind {
            MediaKind::Audio => stream
                .audio_spec
                .is_some_and(|spec| spec.sample_rate > 0 && spec.channels > 0),
            MediaKind::Video | MediaKind::Subtitle => true,
        };
        if stream.kind == Some(kind) && usable {
            return CycleTarget::Stream(stream.index);
        }
    }
}

/// Whether a packet falls inside the requested play range.
#[must_use]
pub fn in_play_range(
    packet: &Packet,
    stream: &StreamInfo,
    start_time: Option<f64>,
    play_duration: Option<f64>,
) -> bool {
    let Some(duration) = play_duration else {
        return true;
    };
    let Some(timestamp) = packet.timestamp() else {
        return true;
    };
    let elapsed = stream
        .time_base
        .ts_to_secs(timestamp - stream.start_time.unwrap_or(0))
        - start_time.unwrap_or(0.0);
    elapsed <= duration
}

/// An open media session.
///
/// Dropping the container stops every thread and releases the audio device.
pub struct Container {
    session: Arc<Session>,
    events: Option<UnboundedReceiver<PlayerEvent>>,
    streams: Vec<StreamInfo>,
    duration_micros: Option<i64>,
    read_thread: Option<JoinHandle<ReadLoop>>,
}

impl std::fmt::Debug for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Container")
            .field("streams", &self.streams.len())
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

impl Container {
    /// Opens the best streams of `input` and starts reading.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoStream`] if neither an audio nor a video component
    /// could be opened, or [`Error::Spawn`] if a thread cannot be started.
    pub fn open(
        mut input: Box<dyn MediaInput>,
        filters: Arc<dyn FilterFactory>,
        audio_device: Box<dyn AudioDevice>,
        presenter: Arc<dyn Presenter>,
        options: PlaybackOptions,
    ) -> Result<Self> {
        let traits = InputTraits {
            realtime: input.is_realtime(),
            discontinuous_timestamps: input.has_discontinuous_timestamps(),
            start_time_micros: input.start_time_micros(),
            bit_rate: input.bit_rate(),
        };
        let (events, receiver) = EventSink::channel();
        let session = Arc::new(Session::new(options, traits, presenter, events));
        input.set_interrupt(Arc::clone(&session.abort));

        let streams = input.streams().to_vec();
        let duration_micros = input.duration_micros();

        let mut read_loop = ReadLoop::new(Arc::clone(&session), input, filters, audio_device);
        read_loop.seek_to_start_time();
        read_loop.open_best_streams()?;

        let read_thread = thread::Builder::new()
            .name("avpace/read".to_string())
            .spawn(move || {
                read_loop.run();
                read_loop
            })
            .map_err(|err| Error::Spawn(err.to_string()))?;

        Ok(Self {
            session,
            events: Some(receiver),
            streams,
            duration_micros,
            read_thread: Some(read_thread),
        })
    }

    /// Takes the event receiver. Returns `None` after the first call.
    pub fn take_events(&mut self) -> Option<UnboundedReceiver<PlayerEvent>> {
        self.events.take()
    }

    /// A pacer for driving video presentation.
    #[must_use]
    pub fn pacer(&self) -> VideoPacer {
        VideoPacer::new(Arc::clone(&self.session))
    }

    #[must_use]
    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    #[must_use]
    pub fn streams(&self) -> &[StreamInfo] {
        &self.streams
    }

    /// Input duration in seconds, if known.
    #[must_use]
    pub fn duration(&self) -> Option<f64> {
        self.duration_micros.map(micros_to_secs)
    }

    pub fn toggle_pause(&self) {
        self.session.toggle_pause();
        self.session.notify_reader();
    }

    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.session.is_paused()
    }

    /// Shows the next picture, then pauses.
    pub fn step_to_next_frame(&self) {
        self.session.step_to_next_frame();
        self.session.notify_reader();
    }

    /// Redraws the current picture on the next tick.
    pub fn force_refresh(&self) {
        self.session.force_refresh.store(true, Ordering::Release);
    }

    /// Seeks to an absolute position in seconds from the start of the input.
    pub fn seek(&self, position_secs: f64) {
        let start = self.session.input.start_time_micros.unwrap_or(0);
        self.session.request_seek(SeekRequest {
            target: secs_to_micros(position_secs.max(0.0)) + start,
            increment: 0,
            by_bytes: false,
        });
    }

    /// Seeks relative to the current position.
    ///
    /// In byte mode the increment is converted with the input bit rate.
    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    pub fn seek_relative(&self, increment_secs: f64) {
        let session = &self.session;
        if session.seek_by_bytes {
            let position = byte_seek_origin(session);
            let bytes_per_sec = session
                .input
                .bit_rate
                .filter(|rate| *rate > 0)
                .map_or(FALLBACK_SEEK_BYTES_PER_SEC, |rate| rate as f64 / 8.0);
            let increment = (increment_secs * bytes_per_sec) as i64;
            session.request_seek(SeekRequest {
                target: position + increment,
                increment,
                by_bytes: true,
            });
        } else {
            let mut position = session.master_clock().value();
            if position.is_nan() {
                position = micros_to_secs(session.last_seek_target());
            }
            position += increment_secs;
            if let Some(start) = session.input.start_time_micros {
                position = position.max(micros_to_secs(start));
            }
            session.request_seek(SeekRequest {
                target: secs_to_micros(position),
                increment: secs_to_micros(increment_secs),
                by_bytes: false,
            });
        }
    }

    /// Seeks forward by the configured interval.
    pub fn seek_forward(&self) {
        self.seek_relative(self.session.options.seek_interval.value());
    }

    /// Seeks backward by the configured interval.
    pub fn seek_backward(&self) {
        self.seek_relative(-self.session.options.seek_interval.value());
    }

    /// Switches the component of `kind` to the next stream of that kind.
    pub fn cycle_stream(&self, kind: MediaKind) {
        self.session.request_cycle(kind);
    }

    #[must_use]
    pub fn volume(&self) -> Volume {
        self.session.volume()
    }

    pub fn set_volume(&self, volume: Volume) {
        self.session.set_volume(volume);
    }

    #[must_use]
    pub fn is_muted(&self) -> bool {
        self.session.is_muted()
    }

    pub fn set_muted(&self, muted: bool) {
        self.session.set_muted(muted);
    }

    pub fn toggle_mute(&self) {
        self.session.set_muted(!self.session.is_muted());
    }

    /// Master clock in seconds, NaN before the first frame is presented.
    #[must_use]
    pub fn position(&self) -> f64 {
        self.session.master_clock().value()
    }

    #[must_use]
    pub fn stats(&self) -> PlaybackStats {
        let session = &self.session;
        let queue = |kind| {
            if !session.has_stream(kind) {
                return QueueStats::default();
            }
            let queues = session.queues(kind);
            QueueStats {
                packets: queues.packets.count(),
                bytes: queues.packets.bytes(),
                pending_frames: queues.frames.pending_count(),
            }
        };
        PlaybackStats {
            master_clock: session.master_clock().value(),
            av_drift: session.clocks.audio.value() - session.clocks.video.value(),
            audio: queue(MediaKind::Audio),
            video: queue(MediaKind::Video),
            subtitle: queue(MediaKind::Subtitle),
            frame_drops_early: session.drops.early(),
            frame_drops_late: session.drops.late(),
        }
    }

    /// Stops reading and decoding and releases the audio device.
    pub fn close(&mut self) {
        let Some(read_thread) = self.read_thread.take() else {
            return;
        };
        self.session.abort.store(true, Ordering::Release);
        self.session.notify_reader();
        for kind in MediaKind::ALL {
            self.session.queues(kind).frames.signal();
        }
        match read_thread.join() {
            Ok(read_loop) => drop(read_loop),
            Err(_) => tracing::error!("read thread panicked"),
        }
        tracing::debug!("container closed");
    }
}

impl Drop for Container {
    fn drop(&mut self) {
        self.close();
    }
}

/// State owned by the read thread.
struct ReadLoop {
    session: Arc<Session>,
    input: Box<dyn MediaInput>,
    filters: Arc<dyn FilterFactory>,
    audio_device: Box<dyn AudioDevice>,
    components: [Option<Component>; 3],
    last_subtitle: Option<usize>,
    infinite_buffer: bool,
    last_paused: bool,
    eof: bool,
    queue_attachments: bool,
    loops_left: u32,
    finished_reported: bool,
}

enum Flow {
    Continue,
    Stop,
}

impl ReadLoop {
    fn new(
        session: Arc<Session>,
        input: Box<dyn MediaInput>,
        filters: Arc<dyn FilterFactory>,
        audio_device: Box<dyn AudioDevice>,
    ) -> Self {
        let infinite_buffer = session
            .options
            .infinite_buffer
            .unwrap_or(session.input.realtime);
        let loops_left = session.options.loop_count;
        Self {
            session,
            input,
            filters,
            audio_device,
            components: [None, None, None],
            last_subtitle: None,
            infinite_buffer,
            last_paused: false,
            eof: false,
            queue_attachments: false,
            loops_left,
            finished_reported: false,
        }
    }

    fn component(&self, kind: MediaKind) -> Option<&Component> {
        self.components[kind.index()].as_ref()
    }

    /// Input-level timestamp of the configured start position.
    fn start_target(&self) -> i64 {
        let offset = self.session.options.start_time.map_or(0, secs_to_micros);
        offset + self.session.input.start_time_micros.unwrap_or(0)
    }

    fn seek_to_start_time(&mut self) {
        if self.session.options.start_time.is_none() {
            return;
        }
        let target = self.start_target();
        if let Err(err) = self.input.seek(SeekTarget::new(target, 0, false)) {
            tracing::warn!(target, "could not seek to start position: {err}");
        }
    }

    fn open_best_streams(&mut self) -> Result<()> {
        let options = &self.session.options;
        let pick = |input: &dyn MediaInput, kind, related| {
            if options.is_enabled(kind) {
                input.best_stream(kind, related)
            } else {
                None
            }
        };
        let video = pick(self.input.as_ref(), MediaKind::Video, None);
        let audio = pick(self.input.as_ref(), MediaKind::Audio, video);
        let subtitle = pick(self.input.as_ref(), MediaKind::Subtitle, audio.or(video));

        for (kind, index) in [
            (MediaKind::Audio, audio),
            (MediaKind::Video, video),
            (MediaKind::Subtitle, subtitle),
        ] {
            if let Some(index) = index {
                if let Err(err) = self.open_component(kind, index) {
                    tracing::warn!(kind = kind.label(), stream = index, "could not open stream: {err}");
                }
            }
        }

        if self.component(MediaKind::Audio).is_none() && self.component(MediaKind::Video).is_none() {
            let kind = if video.is_some() || audio.is_none() {
                MediaKind::Video
            } else {
                MediaKind::Audio
            };
            return Err(Error::NoStream(kind));
        }
        Ok(())
    }

    fn open_component(&mut self, kind: MediaKind, index: usize) -> Result<()> {
        let stream = self
            .input
            .streams()
            .iter()
            .find(|stream| stream.index == index && stream.kind == Some(kind))
            .cloned()
            .ok_or(Error::NoStream(kind))?;
        let decoder = self.input.open_decoder(index)?;

        let filter = match kind {
            MediaKind::Audio => {
                let renderer = Arc::new(AudioRenderer::new(Arc::clone(&self.session)));
                let wanted = stream.audio_spec.unwrap_or(FALLBACK_AUDIO_SPEC);
                let opened = self
                    .audio_device
                    .open(wanted, Arc::clone(&renderer) as Arc<dyn AudioSource>)?;
                renderer.configure(opened);
                tracing::debug!(
                    sample_rate = opened.spec.sample_rate,
                    channels = opened.spec.channels,
                    "audio device opened"
                );
                Some((self.filters.create(kind), TargetFormat::Audio(opened.spec)))
            }
            MediaKind::Video => Some((
                self.filters.create(kind),
                TargetFormat::Video {
                    pixel_formats: self.session.options.capabilities.pixel_formats.clone(),
                },
            )),
            MediaKind::Subtitle => None,
        };

        self.session.set_stream_index(kind, Some(index));
        let attached_picture = stream.is_attached_picture;
        match Component::start(Arc::clone(&self.session), kind, stream, decoder, filter) {
            Ok(component) => {
                self.components[kind.index()] = Some(component);
            }
            Err(err) => {
                self.session.set_stream_index(kind, None);
                if kind == MediaKind::Audio {
                    self.audio_device.close();
                }
                return Err(err);
            }
        }

        if kind == MediaKind::Video && attached_picture {
            self.queue_attachments = true;
        }
        if kind == MediaKind::Subtitle {
            self.last_subtitle = Some(index);
        }
        self.session.events.emit(PlayerEvent::StreamOpened {
            kind,
            stream_index: index,
        });
        Ok(())
    }

    fn close_component(&mut self, kind: MediaKind) {
        let Some(mut component) = self.components[kind.index()].take() else {
            return;
        };
        if kind == MediaKind::Audio {
            self.audio_device.close();
        }
        let stream_index = component.stream().index;
        component.close();
        self.session.set_stream_index(kind, None);
        self.session.events.emit(PlayerEvent::StreamClosed { kind, stream_index });
    }

    fn run(&mut self) {
        while !self.session.is_aborted() {
            match self.iterate() {
                Ok(Flow::Continue) => {}
                Ok(Flow::Stop) => break,
                Err(err) => {
                    if !self.session.is_aborted() {
                        self.session.report_fatal(err);
                    }
                    break;
                }
            }
        }
        tracing::debug!("read thread stopped");
    }

    fn iterate(&mut self) -> Result<Flow> {
        let paused = self.session.is_paused();
        if paused != self.last_paused {
            self.last_paused = paused;
            if let Err(err) = self.input.set_paused(paused) {
                tracing::warn!("input rejected pause change: {err}");
            }
        }

        if let Some(request) = self.session.take_seek() {
            self.perform_seek(request);
        }
        while let Some(kind) = self.session.take_cycle() {
            self.cycle_stream(kind);
        }
        if self.queue_attachments {
            self.enqueue_attachments();
        }

        // Closed queues read as full, so finished playback never waits here.
        let finished = self.all_finished();
        if !self.infinite_buffer
            && !finished
            && (self.buffered_bytes() > MAX_QUEUE_BYTES || self.has_enough_packets())
        {
            self.session.wait_reader(Duration::from_millis(QUEUE_WAIT_TIMEOUT_MS));
            return Ok(Flow::Continue);
        }

        if !paused && !self.session.has_pending_seek() && finished {
            if let Some(remaining) = self.take_loop() {
                self.session.request_seek(SeekRequest {
                    target: self.start_target(),
                    increment: 0,
                    by_bytes: false,
                });
                self.session.events.emit(PlayerEvent::Looped { remaining });
                tracing::debug!(?remaining, "looping");
            } else if !self.finished_reported {
                self.finished_reported = true;
                self.session.events.emit(PlayerEvent::Finished);
                tracing::debug!("playback finished");
                if self.session.options.exit_on_finish {
                    self.session.abort.store(true, Ordering::Release);
                    return Ok(Flow::Stop);
                }
            }
        }

        match self.input.read_packet() {
            Ok(ReadOutcome::Packet(packet)) => {
                self.eof = false;
                self.route(packet);
            }
            Ok(ReadOutcome::Again) => {
                self.session.wait_reader(Duration::from_millis(QUEUE_WAIT_TIMEOUT_MS));
            }
            Ok(ReadOutcome::EndOfFile) => {
                if !self.eof {
                    for component in self.components.iter().flatten() {
                        let queues = self.session.queues(component.kind());
                        queues.packets.enqueue_null(component.stream().index);
                    }
                    self.eof = true;
                    tracing::debug!("end of input");
                }
                self.session.wait_reader(Duration::from_millis(QUEUE_WAIT_TIMEOUT_MS));
            }
            Err(InputError::Interrupted) => return Ok(Flow::Stop),
            Err(err) => return Err(err.into()),
        }
        Ok(Flow::Continue)
    }

    fn perform_seek(&mut self, request: SeekRequest) {
        let target = SeekTarget::new(request.target, request.increment, request.by_bytes);
        match self.input.seek(target) {
            Ok(()) => {
                for component in self.components.iter().flatten() {
                    let packets = &self.session.queues(component.kind()).packets;
                    packets.clear();
                    packets.enqueue_flush();
                }
                #[allow(clippy::cast_precision_loss)]
                let landed = if request.by_bytes {
                    self.session.clocks.external.set(f64::NAN, 0);
                    request.target as f64
                } else {
                    let secs = micros_to_secs(request.target);
                    self.session.clocks.external.set(secs, 0);
                    secs
                };
                tracing::debug!(target = landed, by_bytes = request.by_bytes, "seek completed");
                self.session.events.emit(PlayerEvent::SeekCompleted {
                    target: landed,
                    by_bytes: request.by_bytes,
                });
            }
            Err(err) => {
                tracing::warn!(target = request.target, "seek failed: {err}");
                self.session.events.emit(PlayerEvent::SeekFailed {
                    reason: err.to_string(),
                });
            }
        }
        self.queue_attachments = true;
        self.eof = false;
        self.finished_reported = false;
        if self.session.is_paused() {
            self.session.step_to_next_frame();
        }
    }

    fn cycle_stream(&mut self, kind: MediaKind) {
        let current = match kind {
            MediaKind::Subtitle => self
                .component(kind)
                .map(|c| c.stream().index)
                .or(self.last_subtitle),
            MediaKind::Audio | MediaKind::Video => self.component(kind).map(|c| c.stream().index),
        };
        match next_in_cycle(self.input.streams(), kind, current) {
            CycleTarget::Unchanged => {}
            CycleTarget::Disabled => {
                self.close_component(kind);
                self.last_subtitle = None;
            }
            CycleTarget::Stream(index) => {
                tracing::debug!(kind = kind.label(), stream = index, "switching stream");
                self.close_component(kind);
                if let Err(err) = self.open_component(kind, index) {
                    tracing::warn!(kind = kind.label(), stream = index, "could not switch stream: {err}");
                }
            }
        }
    }

    fn enqueue_attachments(&mut self) {
        self.queue_attachments = false;
        let Some(component) = self.component(MediaKind::Video) else {
            return;
        };
        if !component.stream().is_attached_picture {
            return;
        }
        let index = component.stream().index;
        if let Some(picture) = self.input.attached_picture(index) {
            let packets = &self.session.queues(MediaKind::Video).packets;
            packets.enqueue(picture);
            packets.enqueue_null(index);
        }
    }

    fn route(&self, packet: Packet) {
        if let Some(position) = packet.position {
            self.session.last_read_position.store(position, Ordering::Release);
        }
        let options = &self.session.options;
        let Some(component) = self
            .components
            .iter()
            .flatten()
            .find(|component| component.stream().index == packet.stream_index)
        else {
            return;
        };
        let stream = component.stream();
        if component.kind() == MediaKind::Video && stream.is_attached_picture {
            return;
        }
        if !in_play_range(&packet, stream, options.start_time, options.play_duration) {
            return;
        }
        self.session.queues(component.kind()).packets.enqueue(packet);
    }

    fn buffered_bytes(&self) -> usize {
        self.components
            .iter()
            .flatten()
            .map(|component| self.session.queues(component.kind()).packets.bytes())
            .sum()
    }

    /// Absent components count as having enough.
    fn has_enough_packets(&self) -> bool {
        MediaKind::ALL
            .into_iter()
            .all(|kind| self.component(kind).is_none_or(Component::has_enough_packets))
    }

    /// Audio and video drained; subtitles never hold playback open.
    fn all_finished(&self) -> bool {
        [MediaKind::Audio, MediaKind::Video]
            .into_iter()
            .all(|kind| self.component(kind).is_none_or(Component::is_finished))
    }

    /// Consumes one loop iteration. `Some(remaining)` means play again.
    fn take_loop(&mut self) -> Option<Option<u32>> {
        match self.loops_left {
            0 => Some(None),
            1 => None,
            n => {
                self.loops_left = n - 1;
                Some(Some(self.loops_left - 1))
            }
        }
    }

    fn shutdown(&mut self) {
        if self.components[MediaKind::Audio.index()].is_some() {
            self.audio_device.close();
        }
        for slot in &mut self.components {
            if let Some(mut component) = slot.take() {
                component.close();
            }
        }
    }
}

impl Drop for ReadLoop {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Byte position a relative byte seek starts from: the last shown video
/// frame, then audio frame, with a known position, else the last read packet.
fn byte_seek_origin(session: &Session) -> i64 {
    [MediaKind::Video, MediaKind::Audio]
        .into_iter()
        .filter(|kind| session.has_stream(*kind))
        .find_map(|kind| {
            session
                .queues(kind)
                .frames
                .last_position()
                .filter(|position| *position >= 0)
        })
        .unwrap_or_else(|| session.last_read_position.load(Ordering::Acquire).max(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::media::Rational;

    fn stream(index: usize, kind: MediaKind, program: Option<usize>) -> StreamInfo {
        StreamInfo {
            index,
            kind: Some(kind),
            time_base: Rational::new(1, 1000),
            start_time: Some(0),
            frame_rate: None,
            is_attached_picture: false,
            program,
            codec_name: String::new(),
            audio_spec: (kind == MediaKind::Audio).then_some(AudioSpec {
                sample_rate: 44_100,
                channels: 2,
            }),
        }
    }

    #[test]
    fn cycle_wraps_within_kind() {
        let streams = vec![
            stream(0, MediaKind::Video, None),
            stream(1, MediaKind::Audio, None),
            stream(2, MediaKind::Subtitle, None),
            stream(3, MediaKind::Audio, None),
        ];
        assert_eq!(next_in_cycle(&streams, MediaKind::Audio, Some(1)), CycleTarget::Stream(3));
        assert_eq!(next_in_cycle(&streams, MediaKind::Audio, Some(3)), CycleTarget::Stream(1));
        assert_eq!(next_in_cycle(&streams, MediaKind::Video, Some(0)), CycleTarget::Unchanged);
    }

    #[test]
    fn subtitle_cycle_passes_through_disabled() {
        let streams = vec![
            stream(0, MediaKind::Video, None),
            stream(1, MediaKind::Subtitle, None),
            stream(2, MediaKind::Subtitle, None),
        ];
        assert_eq!(next_in_cycle(&streams, MediaKind::Subtitle, Some(1)), CycleTarget::Stream(2));
        assert_eq!(next_in_cycle(&streams, MediaKind::Subtitle, Some(2)), CycleTarget::Disabled);
        assert_eq!(next_in_cycle(&streams, MediaKind::Subtitle, None), CycleTarget::Stream(1));
    }

    #[test]
    fn cycle_stays_in_program_and_skips_unusable_audio() {
        let mut silent = stream(3, MediaKind::Audio, Some(1));
        silent.audio_spec = None;
        let streams = vec![
            stream(0, MediaKind::Audio, Some(1)),
            stream(1, MediaKind::Audio, Some(2)),
            stream(2, MediaKind::Video, Some(1)),
            silent,
            stream(4, MediaKind::Audio, Some(1)),
        ];
        assert_eq!(next_in_cycle(&streams, MediaKind::Audio, Some(0)), CycleTarget::Stream(4));
        assert_eq!(next_in_cycle(&streams, MediaKind::Audio, Some(4)), CycleTarget::Stream(0));
    }

    #[test]
    fn play_range_limits_packets_after_start() {
        let video = stream(0, MediaKind::Video, None);
        let packet = |ms| Packet::new(0, vec![0]).with_pts(ms);
        assert!(in_play_range(&packet(90_000), &video, None, None));
        assert!(in_play_range(&packet(12_000), &video, Some(10.0), Some(2.0)));
        assert!(!in_play_range(&packet(12_001), &video, Some(10.0), Some(2.0)));
        assert!(in_play_range(&Packet::new(0, vec![0]), &video, Some(10.0), Some(2.0)));
    }
    fn show_frame_at(session: &Session, kind: MediaKind, position: Option<i64>) {
        let queues = session.queues(kind);
        queues.packets.open();
        let mut slot = queues.frames.lease_frame_for_writing().expect("free slot");
        slot.group_index = queues.packets.group_index();
        slot.position = position;
        queues.frames.enqueue_leased_frame(slot);
        queues.frames.dequeue();
        session.set_stream_index(kind, Some(0));
    }

    #[test]
    fn byte_seek_starts_from_audio_when_video_position_is_unknown() {
        let session = crate::playback::session::tests::session(PlaybackOptions::default());
        show_frame_at(&session, MediaKind::Video, Some(-1));
        show_frame_at(&session, MediaKind::Audio, Some(500));
        assert_eq!(byte_seek_origin(&session), 500);
    }

    #[test]
    fn byte_seek_prefers_the_shown_video_position() {
        let session = crate::playback::session::tests::session(PlaybackOptions::default());
        show_frame_at(&session, MediaKind::Video, Some(320));
        show_frame_at(&session, MediaKind::Audio, Some(500));
        assert_eq!(byte_seek_origin(&session), 320);
    }

    #[test]
    fn byte_seek_falls_back_to_the_last_read_packet() {
        let session = crate::playback::session::tests::session(PlaybackOptions::default());
        assert_eq!(byte_seek_origin(&session), 0);
        session.last_read_position.store(4096, Ordering::Release);
        show_frame_at(&session, MediaKind::Video, None);
        assert_eq!(byte_seek_origin(&session), 4096);
    }
}
