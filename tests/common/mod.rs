// SPDX-License-Identifier: MPL-2.0
//! Scripted collaborators for driving the playback core without `FFmpeg`.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::mpsc::UnboundedReceiver;

use avpace::application::port::{
    AudioDevice, AudioSource, DecodeStatus, Decoder, FilterFactory, FilterStatus, FrameFilter,
    MediaInput, OpenedAudio, Presenter, RawFrame, ReadOutcome, SeekTarget, SendStatus,
};
use avpace::domain::error::{AudioDeviceError, DecoderError, FilterError, InputError};
use avpace::domain::media::{
    AudioSpec, MediaKind, PixelFormat, Rational, SourceFormat, StreamInfo, TargetFormat,
};
use avpace::playback::frame::{AudioSamples, VideoPicture};
use avpace::playback::{Frame, FrameData, Packet, PlayerEvent};
use avpace::Error;

pub const PICTURE_WIDTH: u32 = 4;
pub const PICTURE_HEIGHT: u32 = 2;
pub const SAMPLE_RATE: u32 = 48_000;
pub const SAMPLES_PER_PACKET: usize = 1024;

pub fn video_stream(index: usize) -> StreamInfo {
    StreamInfo {
        index,
        kind: Some(MediaKind::Video),
        time_base: Rational::new(1, 25),
        start_time: Some(0),
        frame_rate: Some(Rational::new(25, 1)),
        is_attached_picture: false,
        program: None,
        codec_name: "scripted-video".into(),
        audio_spec: None,
    }
}

pub fn audio_stream(index: usize) -> StreamInfo {
    StreamInfo {
        index,
        kind: Some(MediaKind::Audio),
        time_base: Rational::new(1, 48_000),
        start_time: Some(0),
        frame_rate: None,
        is_attached_picture: false,
        program: None,
        codec_name: "scripted-audio".into(),
        audio_spec: Some(AudioSpec {
            sample_rate: SAMPLE_RATE,
            channels: 2,
        }),
    }
}

/// `count` one-frame video packets at 25 fps.
pub fn video_packets(stream_index: usize, count: i64) -> Vec<Packet> {
    (0..count)
        .map(|i| {
            Packet::new(stream_index, vec![0; 16])
                .with_pts(i)
                .with_duration(1)
                .with_position(i * 16)
        })
        .collect()
}

/// `count` audio packets of [`SAMPLES_PER_PACKET`] samples each.
#[allow(clippy::cast_possible_wrap)]
pub fn audio_packets(stream_index: usize, count: i64) -> Vec<Packet> {
    let step = SAMPLES_PER_PACKET as i64;
    (0..count)
        .map(|i| {
            Packet::new(stream_index, vec![0; 64])
                .with_pts(i * step)
                .with_duration(step)
        })
        .collect()
}

/// Interleaves packet lists by presentation time.
pub fn interleave(streams: &[StreamInfo], lists: Vec<Vec<Packet>>) -> Vec<Packet> {
    let mut all: Vec<Packet> = lists.into_iter().flatten().collect();
    all.sort_by(|a, b| {
        let secs = |p: &Packet| {
            let tb = streams[p.stream_index].time_base;
            tb.ts_to_secs(p.pts.unwrap_or(0))
        };
        secs(a).total_cmp(&secs(b))
    });
    all
}

/// Input replaying a fixed packet list; seeks rewind to the first packet at
/// or after the target time or byte position.
pub struct ScriptedInput {
    streams: Vec<StreamInfo>,
    packets: Vec<Packet>,
    cursor: usize,
    pub seeks: Arc<Mutex<Vec<SeekTarget>>>,
    interrupt: Option<Arc<AtomicBool>>,
    bit_rate: Option<u64>,
    failing_decoders: bool,
}

impl ScriptedInput {
    pub fn new(streams: Vec<StreamInfo>, packets: Vec<Packet>) -> Self {
        Self {
            streams,
            packets,
            cursor: 0,
            seeks: Arc::new(Mutex::new(Vec::new())),
            interrupt: None,
            bit_rate: None,
            failing_decoders: false,
        }
    }

    /// Reports a container bit rate, in bits per second.
    pub fn with_bit_rate(mut self, bits_per_sec: u64) -> Self {
        self.bit_rate = Some(bits_per_sec);
        self
    }

    /// Opens decoders that reject every data packet.
    pub fn with_failing_decoders(mut self) -> Self {
        self.failing_decoders = true;
        self
    }
}

impl MediaInput for ScriptedInput {
    fn streams(&self) -> &[StreamInfo] {
        &self.streams
    }

    fn best_stream(&self, kind: MediaKind, _related: Option<usize>) -> Option<usize> {
        self.streams
            .iter()
            .find(|stream| stream.kind == Some(kind))
            .map(|stream| stream.index)
    }

    fn read_packet(&mut self) -> Result<ReadOutcome, InputError> {
        if self
            .interrupt
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
        {
            return Err(InputError::Interrupted);
        }
        match self.packets.get(self.cursor) {
            Some(packet) => {
                self.cursor += 1;
                Ok(ReadOutcome::Packet(packet.clone()))
            }
            None => Ok(ReadOutcome::EndOfFile),
        }
    }

    fn seek(&mut self, target: SeekTarget) -> Result<(), InputError> {
        self.seeks.lock().push(target);
        let landed = match target {
            SeekTarget::Bytes { target, .. } => self
                .packets
                .iter()
                .position(|packet| packet.position.is_some_and(|position| position >= target)),
            SeekTarget::Time { target, .. } => {
                let secs = Rational::MICROS.ts_to_secs(target);
                self.packets.iter().position(|packet| {
                    let tb = self.streams[packet.stream_index].time_base;
                    tb.ts_to_secs(packet.pts.unwrap_or(0)) >= secs - 1e-9
                })
            }
        };
        self.cursor = landed.unwrap_or(self.packets.len());
        Ok(())
    }

    fn duration_micros(&self) -> Option<i64> {
        let end = self
            .packets
            .iter()
            .map(|packet| {
                let tb = self.streams[packet.stream_index].time_base;
                tb.ts_to_secs(packet.pts.unwrap_or(0) + packet.duration)
            })
            .fold(0.0, f64::max);
        #[allow(clippy::cast_possible_truncation)]
        Some((end * 1_000_000.0) as i64)
    }

    fn start_time_micros(&self) -> Option<i64> {
        Some(0)
    }

    fn bit_rate(&self) -> Option<u64> {
        self.bit_rate
    }

    fn open_decoder(&mut self, stream_index: usize) -> Result<Box<dyn Decoder>, DecoderError> {
        let stream = self
            .streams
            .iter()
            .find(|stream| stream.index == stream_index)
            .ok_or_else(|| DecoderError::Open(format!("no stream {stream_index}")))?;
        let kind = stream
            .kind
            .ok_or_else(|| DecoderError::UnsupportedCodec(stream.codec_name.clone()))?;
        if self.failing_decoders {
            return Ok(Box::new(FailingDecoder { kind }));
        }
        Ok(Box::new(PassthroughDecoder::new(kind, stream.time_base)))
    }

    fn set_interrupt(&mut self, flag: Arc<AtomicBool>) {
        self.interrupt = Some(flag);
    }
}

/// Turns every data packet into one raw frame of a fixed format.
pub struct PassthroughDecoder {
    kind: MediaKind,
    time_base: Rational,
    ready: VecDeque<RawFrame>,
    draining: bool,
}

impl PassthroughDecoder {
    pub fn new(kind: MediaKind, time_base: Rational) -> Self {
        Self {
            kind,
            time_base,
            ready: VecDeque::new(),
            draining: false,
        }
    }

    fn raw_frame(&self, packet: &Packet) -> RawFrame {
        let (format, sample_count) = match self.kind {
            MediaKind::Audio => (
                SourceFormat::Audio {
                    sample_rate: SAMPLE_RATE,
                    channels: 2,
                    format: 0,
                },
                SAMPLES_PER_PACKET,
            ),
            MediaKind::Video | MediaKind::Subtitle => (
                SourceFormat::Video {
                    width: PICTURE_WIDTH,
                    height: PICTURE_HEIGHT,
                    format: 0,
                    sample_aspect_ratio: Rational::new(1, 1),
                },
                0,
            ),
        };
        RawFrame {
            pts: packet.pts,
            time_base: self.time_base,
            format,
            position: packet.position,
            sample_count,
            payload: Box::new(()),
        }
    }
}

impl Decoder for PassthroughDecoder {
    fn kind(&self) -> MediaKind {
        self.kind
    }

    fn send_packet(&mut self, packet: &Packet) -> Result<SendStatus, DecoderError> {
        if packet.is_null() {
            self.draining = true;
        } else {
            let frame = self.raw_frame(packet);
            self.ready.push_back(frame);
        }
        Ok(SendStatus::Accepted)
    }

    fn receive(&mut self) -> Result<DecodeStatus, DecoderError> {
        if let Some(frame) = self.ready.pop_front() {
            return Ok(DecodeStatus::Frame(frame));
        }
        if self.draining {
            self.draining = false;
            return Ok(DecodeStatus::EndOfStream);
        }
        Ok(DecodeStatus::NeedsMoreInput)
    }

    fn flush(&mut self) {
        self.ready.clear();
        self.draining = false;
    }
}

/// Decoder whose every data packet is corrupt.
pub struct FailingDecoder {
    kind: MediaKind,
}

impl Decoder for FailingDecoder {
    fn kind(&self) -> MediaKind {
        self.kind
    }

    fn send_packet(&mut self, packet: &Packet) -> Result<SendStatus, DecoderError> {
        if packet.is_null() {
            return Ok(SendStatus::Accepted);
        }
        Err(DecoderError::DecodingFailed("corrupt packet".into()))
    }

    fn receive(&mut self) -> Result<DecodeStatus, DecoderError> {
        Ok(DecodeStatus::NeedsMoreInput)
    }

    fn flush(&mut self) {}
}

/// Emits a blank picture or a silent buffer for every pushed frame.
#[derive(Default)]
pub struct BlankFilter {
    target: Option<TargetFormat>,
    pending: Option<(Option<i64>, Rational, usize)>,
    reconfigures: Arc<AtomicUsize>,
}

impl FrameFilter for BlankFilter {
    fn reconfigure(
        &mut self,
        _source: &SourceFormat,
        target: &TargetFormat,
    ) -> Result<(), FilterError> {
        self.reconfigures.fetch_add(1, Ordering::SeqCst);
        self.target = Some(target.clone());
        self.pending = None;
        Ok(())
    }

    fn push(&mut self, frame: RawFrame) -> Result<(), FilterError> {
        if self.target.is_none() {
            return Err(FilterError::NotConfigured);
        }
        self.pending = Some((frame.pts, frame.time_base, frame.sample_count));
        Ok(())
    }

    fn pull(&mut self, out: &mut FrameData) -> Result<FilterStatus, FilterError> {
        let Some((pts, time_base, sample_count)) = self.pending.take() else {
            return Ok(FilterStatus::WouldBlock);
        };
        match &self.target {
            Some(TargetFormat::Video { pixel_formats }) => {
                let format = pixel_formats.first().copied().unwrap_or(PixelFormat::Rgba);
                *out = FrameData::Video(VideoPicture {
                    format,
                    width: PICTURE_WIDTH,
                    height: PICTURE_HEIGHT,
                    stride: PICTURE_WIDTH as usize * 4,
                    data: vec![0; (PICTURE_WIDTH * PICTURE_HEIGHT * 4) as usize],
                });
            }
            Some(TargetFormat::Audio(spec)) => {
                *out = FrameData::Audio(AudioSamples {
                    spec: *spec,
                    samples: vec![0.0; sample_count * usize::from(spec.channels)],
                });
            }
            None => return Err(FilterError::NotConfigured),
        }
        Ok(FilterStatus::Ready { pts, time_base })
    }
}

/// Hands out [`BlankFilter`]s sharing one rebuild counter.
#[derive(Debug, Default, Clone)]
pub struct BlankFilterFactory {
    pub reconfigures: Arc<AtomicUsize>,
}

impl BlankFilterFactory {
    pub fn reconfigure_count(&self) -> usize {
        self.reconfigures.load(Ordering::SeqCst)
    }
}

impl FilterFactory for BlankFilterFactory {
    fn create(&self, _kind: MediaKind) -> Box<dyn FrameFilter> {
        Box::new(BlankFilter {
            reconfigures: Arc::clone(&self.reconfigures),
            ..BlankFilter::default()
        })
    }
}

/// Device that accepts any spec and pulls from a plain thread, like a sound
/// card callback would.
#[derive(Default)]
pub struct ThreadAudioDevice {
    worker: Option<(Arc<AtomicBool>, JoinHandle<()>)>,
}

impl ThreadAudioDevice {
    const PERIOD_FRAMES: usize = 480;
}

impl AudioDevice for ThreadAudioDevice {
    fn open(
        &mut self,
        wanted: AudioSpec,
        source: Arc<dyn AudioSource>,
    ) -> Result<OpenedAudio, AudioDeviceError> {
        self.close();
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);
        let samples = Self::PERIOD_FRAMES * usize::from(wanted.channels);
        let handle = std::thread::Builder::new()
            .name("test/audio-out".into())
            .spawn(move || {
                let mut buffer = vec![0.0f32; samples];
                while !stop_flag.load(Ordering::Relaxed) {
                    source.refill_output_buffer(&mut buffer, avpace::playback::time::now_secs());
                    std::thread::sleep(Duration::from_millis(10));
                }
            })
            .map_err(|e| AudioDeviceError::Stream(e.to_string()))?;
        self.worker = Some((stop, handle));
        Ok(OpenedAudio {
            spec: wanted,
            hw_buffer_bytes: Self::PERIOD_FRAMES * wanted.frame_bytes(),
        })
    }

    fn close(&mut self) {
        if let Some((stop, handle)) = self.worker.take() {
            stop.store(true, Ordering::Relaxed);
            let _ = handle.join();
        }
    }
}

impl Drop for ThreadAudioDevice {
    fn drop(&mut self) {
        self.close();
    }
}

/// Device that refuses to open.
#[derive(Debug, Default)]
pub struct MissingAudioDevice;

impl AudioDevice for MissingAudioDevice {
    fn open(
        &mut self,
        _wanted: AudioSpec,
        _source: Arc<dyn AudioSource>,
    ) -> Result<OpenedAudio, AudioDeviceError> {
        Err(AudioDeviceError::NoDevice)
    }

    fn close(&mut self) {}
}

/// Records first renders of each picture.
#[derive(Debug, Default)]
pub struct RecordingPresenter {
    pub rendered: Mutex<Vec<f64>>,
    pub sizes: Mutex<Vec<(u32, u32)>>,
    pub fatal: Mutex<Vec<String>>,
}

impl RecordingPresenter {
    pub fn rendered_times(&self) -> Vec<f64> {
        self.rendered.lock().clone()
    }
}

impl Presenter for RecordingPresenter {
    fn on_picture_size_changed(&self, width: u32, height: u32, _sar: Rational) {
        self.sizes.lock().push((width, height));
    }

    fn render_frame(&self, picture: &Frame, _subtitle: Option<&Frame>) {
        if !picture.is_uploaded {
            self.rendered.lock().push(picture.time);
        }
    }

    fn on_fatal_error(&self, error: &Error) {
        self.fatal.lock().push(error.to_string());
    }
}

/// Collects events until `done` matches one or `timeout` passes.
pub fn collect_events_until(
    events: &mut UnboundedReceiver<PlayerEvent>,
    timeout: Duration,
    mut done: impl FnMut(&PlayerEvent) -> bool,
) -> (Vec<PlayerEvent>, bool) {
    let deadline = Instant::now() + timeout;
    let mut seen = Vec::new();
    while Instant::now() < deadline {
        match events.try_recv() {
            Ok(event) => {
                let finished = done(&event);
                seen.push(event);
                if finished {
                    return (seen, true);
                }
            }
            Err(_) => std::thread::sleep(Duration::from_millis(5)),
        }
    }
    (seen, false)
}

pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    condition()
}
