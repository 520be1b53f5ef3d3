// SPDX-License-Identifier: MPL-2.0
//! Stream components and their decode loops.
//!
//! A [`Component`] is one opened elementary stream. Its decode thread drains
//! the component's packet queue into the decoder, converts output through the
//! filter and publishes frames into the frame queue, all while tracking the
//! epoch of the packets it consumes so nothing predating a flush is ever
//! delivered.

use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::application::port::{
    DecodeStatus, Decoder, FilterStatus, FrameFilter, RawFrame, SendStatus,
};
use crate::config::{MIN_BUFFERED_SECS, MIN_FRAMES, NOSYNC_THRESHOLD};
use crate::domain::error::FilterError;
use crate::domain::media::{
    GroupIndex, MediaKind, Rational, SourceFormat, StreamInfo, SubtitleCue, TargetFormat,
};
use crate::error::{Error, Result};
use crate::playback::frame::FrameData;
use crate::playback::packet::Packet;
use crate::playback::packet_queue::PacketQueue;
use crate::playback::session::Session;

/// An opened stream and its decode thread.
pub struct Component {
    kind: MediaKind,
    stream: StreamInfo,
    /// Epoch in which the decoder reached end of stream, 0 if not yet.
    finished: Arc<AtomicI32>,
    thread: Option<JoinHandle<()>>,
    session: Arc<Session>,
}

impl std::fmt::Debug for Component {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Component")
            .field("kind", &self.kind)
            .field("stream", &self.stream.index)
            .field("finished", &self.finished.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl Component {
    /// Opens the component's queues and spawns its decode thread.
    ///
    /// `filter` and `target` are required for audio and video.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Spawn`] if the thread cannot be started.
    pub fn start(
        session: Arc<Session>,
        kind: MediaKind,
        stream: StreamInfo,
        decoder: Box<dyn Decoder>,
        filter: Option<(Box<dyn FrameFilter>, TargetFormat)>,
    ) -> Result<Self> {
        let finished = Arc::new(AtomicI32::new(0));
        session.queues(kind).packets.open();

        let start_time_base = stream.time_base;
        let decode_loop = DecodeLoop {
            kind,
            session: Arc::clone(&session),
            frame_duration: stream.frame_duration_secs(),
            decoder,
            filter,
            finished: Arc::clone(&finished),
            pending: None,
            packet_group: -1,
            start_pts: stream.start_time,
            start_pts_time_base: start_time_base,
            next_pts: stream.start_time,
            next_pts_time_base: start_time_base,
            configured: None,
            scratch: FrameData::Empty,
            picture_size: None,
        };
        let thread = thread::Builder::new()
            .name(format!("avpace/{}", kind.label()))
            .spawn(move || decode_loop.run())
            .map_err(|err| {
                session.queues(kind).packets.close();
                Error::Spawn(err.to_string())
            })?;

        tracing::debug!(kind = kind.label(), stream = stream.index, "component started");
        Ok(Self {
            kind,
            stream,
            finished,
            thread: Some(thread),
            session,
        })
    }

    #[must_use]
    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    #[must_use]
    pub fn stream(&self) -> &StreamInfo {
        &self.stream
    }

    #[must_use]
    pub fn finished_group(&self) -> GroupIndex {
        self.finished.load(Ordering::Acquire)
    }

    /// True once the decoder drained in the live epoch and every frame was shown.
    ///
    /// A component whose thread stopped on an error counts as finished.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        let queues = self.session.queues(self.kind);
        if queues.packets.is_closed() {
            return true;
        }
        self.finished_group() == queues.packets.group_index() && queues.frames.pending_count() == 0
    }

    /// Whether enough packets are buffered for reading to pause.
    #[must_use]
    pub fn has_enough_packets(&self) -> bool {
        stream_has_enough_packets(&self.stream, &self.session.queues(self.kind).packets)
    }

    /// Closes the packet queue, joins the decode thread and drops leftovers.
    pub fn close(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };
        let queues = self.session.queues(self.kind);
        queues.packets.close();
        queues.frames.signal();
        if thread.join().is_err() {
            tracing::error!(kind = self.kind.label(), "decode thread panicked");
        }
        queues.packets.clear();
        tracing::debug!(kind = self.kind.label(), stream = self.stream.index, "component closed");
    }
}

impl Drop for Component {
    fn drop(&mut self) {
        self.close();
    }
}

/// Closed queues and attached pictures always have enough. Otherwise more
/// than [`MIN_FRAMES`] packets are needed, covering over
/// [`MIN_BUFFERED_SECS`] unless the packets carry no duration.
pub(crate) fn stream_has_enough_packets(stream: &StreamInfo, packets: &PacketQueue) -> bool {
    if packets.is_closed() || stream.is_attached_picture {
        return true;
    }
    let duration = packets.duration();
    packets.count() > MIN_FRAMES
        && (duration == 0 || stream.time_base.ts_to_secs(duration) > MIN_BUFFERED_SECS)
}

/// Output of one decode step.
enum Decoded {
    Frame(RawFrame),
    Subtitle(SubtitleCue),
}

/// Metadata carried from a raw frame to the frames the filter makes of it.
#[derive(Clone, Copy)]
struct SourceMeta {
    position: Option<i64>,
    sample_aspect_ratio: Rational,
}

struct DecodeLoop {
    kind: MediaKind,
    session: Arc<Session>,
    /// Nominal picture duration from the stream frame rate.
    frame_duration: f64,
    decoder: Box<dyn Decoder>,
    filter: Option<(Box<dyn FrameFilter>, TargetFormat)>,
    finished: Arc<AtomicI32>,
    /// Packet refused with [`SendStatus::Full`], resent after draining.
    pending: Option<Packet>,
    /// Epoch of the last packet taken from the queue.
    packet_group: GroupIndex,
    start_pts: Option<i64>,
    start_pts_time_base: Rational,
    next_pts: Option<i64>,
    next_pts_time_base: Rational,
    /// Source format and epoch the filter was last built for.
    configured: Option<(SourceFormat, GroupIndex)>,
    /// Staging payload swapped into leased slots.
    scratch: FrameData,
    picture_size: Option<(u32, u32, Rational)>,
}

impl DecodeLoop {
    fn run(mut self) {
        let result = match self.kind {
            MediaKind::Video | MediaKind::Audio => self.run_frames(),
            MediaKind::Subtitle => self.run_subtitles(),
        };
        if let Err(err) = result {
            let queues = self.session.queues(self.kind);
            queues.packets.close();
            queues.frames.signal();
            self.session.report_fatal(err);
        }
        tracing::debug!(kind = self.kind.label(), "decode loop exited");
    }

    fn run_frames(&mut self) -> Result<()> {
        while let Some(decoded) = self.decode_next()? {
            let Decoded::Frame(frame) = decoded else {
                continue;
            };
            if self.kind == MediaKind::Video && self.should_drop_early(&frame) {
                self.session.drops.record_early();
                tracing::trace!(pts = ?frame.pts, "early frame drop");
                continue;
            }
            if !self.filter_and_queue(frame)? {
                break;
            }
        }
        Ok(())
    }

    fn run_subtitles(&mut self) -> Result<()> {
        while let Some(decoded) = self.decode_next()? {
            let Decoded::Subtitle(cue) = decoded else {
                continue;
            };
            let time = match cue.pts_secs() {
                t if t.is_nan() => 0.0,
                t => t,
            };
            let duration = cue.display_secs();
            self.scratch = FrameData::Subtitle(cue);
            let meta = SourceMeta {
                position: None,
                sample_aspect_ratio: Rational::default(),
            };
            if !self.queue_frame(time, duration, meta, self.packet_group) {
                break;
            }
        }
        Ok(())
    }

    /// Runs the decoder until it yields output.
    ///
    /// Returns `None` once the packet queue is closed. End of stream records
    /// the finished epoch and keeps waiting for packets of a later epoch.
    fn decode_next(&mut self) -> Result<Option<Decoded>> {
        let session = Arc::clone(&self.session);
        let packets = &session.queues(self.kind).packets;
        loop {
            if packets.group_index() == self.packet_group {
                loop {
                    if packets.is_closed() {
                        return Ok(None);
                    }
                    match self.decoder.receive()? {
                        DecodeStatus::Frame(frame) => {
                            return Ok(Some(Decoded::Frame(self.stamp_pts(frame))));
                        }
                        DecodeStatus::Subtitle(cue) => return Ok(Some(Decoded::Subtitle(cue))),
                        DecodeStatus::EndOfStream => {
                            self.finished.store(self.packet_group, Ordering::Release);
                            self.decoder.flush();
                            tracing::debug!(
                                kind = self.kind.label(),
                                group = self.packet_group,
                                "decoder drained"
                            );
                            break;
                        }
                        DecodeStatus::NeedsMoreInput => break,
                    }
                }
            }

            let packet = loop {
                if packets.count() == 0 {
                    session.notify_reader();
                }
                let packet = match self.pending.take() {
                    Some(packet) => packet,
                    None => {
                        let Some(packet) = packets.dequeue(true) else {
                            return Ok(None);
                        };
                        if packet.group_index != self.packet_group {
                            self.packet_group = packet.group_index;
                            self.enter_group();
                        }
                        packet
                    }
                };
                if packets.group_index() == self.packet_group {
                    break packet;
                }
            };

            if packet.is_flush() {
                continue;
            }
            if self.decoder.send_packet(&packet)? == SendStatus::Full {
                self.pending = Some(packet);
            }
        }
    }

    fn enter_group(&mut self) {
        self.decoder.flush();
        self.finished.store(0, Ordering::Release);
        self.next_pts = self.start_pts;
        self.next_pts_time_base = self.start_pts_time_base;
        tracing::debug!(kind = self.kind.label(), group = self.packet_group, "new epoch");
    }

    /// Audio frames get their pts in 1/sample_rate units, extrapolated from
    /// the previous frame when the decoder reports none.
    fn stamp_pts(&mut self, mut frame: RawFrame) -> RawFrame {
        let SourceFormat::Audio { sample_rate, .. } = frame.format else {
            return frame;
        };
        let Ok(rate) = i32::try_from(sample_rate) else {
            return frame;
        };
        let sample_base = Rational::new(1, rate.max(1));
        let pts = match (frame.pts, self.next_pts) {
            (Some(pts), _) => Some(Rational::rescale(pts, frame.time_base, sample_base)),
            (None, Some(next)) => Some(Rational::rescale(next, self.next_pts_time_base, sample_base)),
            (None, None) => None,
        };
        if let Some(pts) = pts {
            self.next_pts = Some(pts + i64::try_from(frame.sample_count).unwrap_or(0));
            self.next_pts_time_base = sample_base;
        }
        frame.pts = pts;
        frame.time_base = sample_base;
        frame
    }

    /// Drops a late picture before conversion when the master is ahead.
    fn should_drop_early(&self, frame: &RawFrame) -> bool {
        let session = &self.session;
        if !session.options.frame_drop.allows_drop(session.master_sync()) {
            return false;
        }
        let Some(pts) = frame.pts else {
            return false;
        };
        let diff = frame.time_base.ts_to_secs(pts) - session.master_clock().value();
        !diff.is_nan()
            && diff.abs() < NOSYNC_THRESHOLD
            && diff < 0.0
            && self.packet_group == session.clocks.video.group_index()
            && session.queues(MediaKind::Video).packets.count() > 0
    }

    /// Pushes a raw frame through the filter and queues everything it yields.
    ///
    /// Returns false once the frame queue is closed.
    fn filter_and_queue(&mut self, frame: RawFrame) -> Result<bool> {
        let group = self.packet_group;
        let meta = SourceMeta {
            position: frame.position,
            sample_aspect_ratio: match frame.format {
                SourceFormat::Video {
                    sample_aspect_ratio,
                    ..
                } => sample_aspect_ratio,
                SourceFormat::Audio { .. } => Rational::default(),
            },
        };
        let Some((filter, target)) = self.filter.as_mut() else {
            return Err(FilterError::NotConfigured.into());
        };
        if self.configured != Some((frame.format, group)) {
            filter.reconfigure(&frame.format, target)?;
            self.configured = Some((frame.format, group));
            tracing::debug!(kind = self.kind.label(), group, format = ?frame.format, "filter reconfigured");
        }
        filter.push(frame)?;

        loop {
            let Some((filter, _)) = self.filter.as_mut() else {
                return Err(FilterError::NotConfigured.into());
            };
            match filter.pull(&mut self.scratch)? {
                FilterStatus::Ready { pts, time_base } => {
                    let time = pts.map_or(f64::NAN, |pts| time_base.ts_to_secs(pts));
                    let duration = self.output_duration();
                    if !self.queue_frame(time, duration, meta, group) {
                        return Ok(false);
                    }
                }
                FilterStatus::WouldBlock => return Ok(true),
                FilterStatus::Eof => {
                    self.finished.store(group, Ordering::Release);
                    return Ok(true);
                }
            }
        }
    }

    fn output_duration(&self) -> f64 {
        match &self.scratch {
            FrameData::Audio(audio) if audio.spec.sample_rate > 0 => {
                #[allow(clippy::cast_precision_loss)]
                let frames = audio.frame_count() as f64;
                frames / f64::from(audio.spec.sample_rate)
            }
            _ => self.frame_duration,
        }
    }

    /// Moves the staged payload into a leased slot and publishes it.
    fn queue_frame(&mut self, time: f64, duration: f64, meta: SourceMeta, group: GroupIndex) -> bool {
        let session = Arc::clone(&self.session);
        let frames = &session.queues(self.kind).frames;

        if let FrameData::Video(picture) = &self.scratch {
            let size = (picture.width, picture.height, meta.sample_aspect_ratio);
            if self.picture_size != Some(size) {
                self.picture_size = Some(size);
                session
                    .presenter
                    .on_picture_size_changed(size.0, size.1, size.2);
            }
        }

        let Some(mut slot) = frames.lease_frame_for_writing() else {
            return false;
        };
        slot.group_index = group;
        slot.time = time;
        slot.duration = duration;
        slot.position = meta.position;
        slot.sample_aspect_ratio = meta.sample_aspect_ratio;
        slot.is_uploaded = false;
        if let FrameData::Video(picture) = &self.scratch {
            slot.width = picture.width;
            slot.height = picture.height;
        }
        std::mem::swap(&mut slot.data, &mut self.scratch);
        frames.enqueue_leased_frame(slot);
        true
    }
}
