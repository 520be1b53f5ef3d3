// SPDX-License-Identifier: MPL-2.0
//! `FFmpeg` demultiplexer implementing the [`MediaInput`] port.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use ffmpeg_next::format::stream::Disposition;
use ffmpeg_next::media::Type;

use crate::application::port::{Decoder, MediaInput, ReadOutcome, SeekTarget};
use crate::domain::error::{DecoderError, InputError};
use crate::domain::media::{AudioSpec, MediaKind, StreamInfo};
use crate::infrastructure::ffmpeg::decoder::FfmpegDecoder;
use crate::infrastructure::ffmpeg::{from_ffmpeg_rational, init_ffmpeg, timestamp};
use crate::playback::packet::Packet;

/// Formats whose timestamps follow a live clock.
const REALTIME_FORMATS: [&str; 3] = ["rtp", "rtsp", "sdp"];

/// An opened input file or URL.
pub struct FfmpegInput {
    context: ffmpeg_next::format::context::Input,
    url: String,
    streams: Vec<StreamInfo>,
    /// Filled by `set_interrupt`; polled by FFmpeg during blocking I/O.
    interrupt: Arc<OnceLock<Arc<AtomicBool>>>,
}

// SAFETY: the format context holds raw pointers into FFmpeg state that is
// not shared with any other object. `FfmpegInput` is moved to the read
// thread and used exclusively from there.
unsafe impl Send for FfmpegInput {}

impl std::fmt::Debug for FfmpegInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FfmpegInput")
            .field("url", &self.url)
            .field("streams", &self.streams.len())
            .finish_non_exhaustive()
    }
}

impl FfmpegInput {
    /// Opens and probes `path`.
    ///
    /// # Errors
    ///
    /// Returns [`InputError::Open`] if the input cannot be opened or probed.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, InputError> {
        init_ffmpeg()?;

        let path = path.as_ref();
        let interrupt: Arc<OnceLock<Arc<AtomicBool>>> = Arc::new(OnceLock::new());
        let flag = Arc::clone(&interrupt);
        let context = ffmpeg_next::format::input_with_interrupt(&path, move || {
            flag.get().is_some_and(|abort| abort.load(Ordering::Relaxed))
        })
        .map_err(|e| InputError::Open(format!("{}: {e}", path.display())))?;

        let streams = context.streams().map(|stream| describe_stream(&stream)).collect();
        let input = Self {
            context,
            url: path.display().to_string(),
            streams,
            interrupt,
        };
        tracing::info!(
            url = %input.url,
            format = input.context.format().name(),
            streams = input.streams.len(),
            "input opened"
        );
        Ok(input)
    }

    fn is_interrupted(&self) -> bool {
        self.interrupt
            .get()
            .is_some_and(|abort| abort.load(Ordering::Relaxed))
    }

    #[allow(clippy::cast_possible_wrap)]
    fn convert_packet(packet: &ffmpeg_next::Packet) -> Packet {
        let mut converted = Packet::new(
            packet.stream(),
            packet.data().map(<[u8]>::to_vec).unwrap_or_default(),
        );
        converted.pts = packet.pts();
        converted.dts = packet.dts();
        converted.duration = packet.duration();
        converted.position = (packet.position() >= 0).then(|| packet.position() as i64);
        converted.is_key = packet.is_key();
        converted
    }
}

fn media_kind(medium: Type) -> Option<MediaKind> {
    match medium {
        Type::Audio => Some(MediaKind::Audio),
        Type::Video => Some(MediaKind::Video),
        Type::Subtitle => Some(MediaKind::Subtitle),
        _ => None,
    }
}

fn media_type(kind: MediaKind) -> Type {
    match kind {
        MediaKind::Audio => Type::Audio,
        MediaKind::Video => Type::Video,
        MediaKind::Subtitle => Type::Subtitle,
    }
}

/// Probes the native audio format by opening a throwaway decoder.
fn audio_spec(parameters: ffmpeg_next::codec::Parameters) -> Option<AudioSpec> {
    let decoder = ffmpeg_next::codec::context::Context::from_parameters(parameters)
        .ok()?
        .decoder()
        .audio()
        .ok()?;
    Some(AudioSpec {
        sample_rate: decoder.rate(),
        channels: u16::try_from(decoder.channels()).ok()?,
    })
}

fn describe_stream(stream: &ffmpeg_next::format::stream::Stream<'_>) -> StreamInfo {
    let parameters = stream.parameters();
    let kind = media_kind(parameters.medium());
    let codec_name = parameters.id().name().to_string();

    let frame_rate = [stream.avg_frame_rate(), stream.rate()]
        .into_iter()
        .map(from_ffmpeg_rational)
        .find(|rate| rate.is_valid() && rate.num > 0);

    let audio_spec = if kind == Some(MediaKind::Audio) {
        audio_spec(parameters)
    } else {
        None
    };

    StreamInfo {
        index: stream.index(),
        kind,
        time_base: from_ffmpeg_rational(stream.time_base()),
        start_time: timestamp(stream.start_time()),
        frame_rate,
        is_attached_picture: stream.disposition().contains(Disposition::ATTACHED_PIC),
        program: None,
        codec_name,
        audio_spec,
    }
}

impl MediaInput for FfmpegInput {
    fn streams(&self) -> &[StreamInfo] {
        &self.streams
    }

    fn best_stream(&self, kind: MediaKind, related: Option<usize>) -> Option<usize> {
        let related = related.and_then(|i| i32::try_from(i).ok()).unwrap_or(-1);
        // SAFETY: the format context is valid for the lifetime of `self` and
        // av_find_best_stream only reads it. No decoder is requested.
        let index = unsafe {
            ffmpeg_next::ffi::av_find_best_stream(
                self.context.as_ptr().cast_mut(),
                media_type(kind).into(),
                -1,
                related,
                std::ptr::null_mut(),
                0,
            )
        };
        usize::try_from(index).ok()
    }

    fn read_packet(&mut self) -> Result<ReadOutcome, InputError> {
        let mut packet = ffmpeg_next::Packet::empty();
        match packet.read(&mut self.context) {
            Ok(()) => Ok(ReadOutcome::Packet(Self::convert_packet(&packet))),
            Err(ffmpeg_next::Error::Eof) => Ok(ReadOutcome::EndOfFile),
            Err(ffmpeg_next::Error::Exit) => Err(InputError::Interrupted),
            Err(_) if self.is_interrupted() => Err(InputError::Interrupted),
            Err(ffmpeg_next::Error::Other { errno }) if errno == ffmpeg_next::util::error::EAGAIN => {
                Ok(ReadOutcome::Again)
            }
            Err(e) => Err(InputError::Io(e.to_string())),
        }
    }

    #[allow(clippy::cast_possible_wrap)]
    fn seek(&mut self, target: SeekTarget) -> Result<(), InputError> {
        let (ts, min, max, flags) = match target {
            SeekTarget::Time { target, min, max } => (target, min, max, 0),
            SeekTarget::Bytes { target, min, max } => {
                (target, min, max, ffmpeg_next::ffi::AVSEEK_FLAG_BYTE as i32)
            }
        };
        // SAFETY: the format context is exclusively owned and valid; the
        // call does not retain any pointer passed to it.
        let ret = unsafe {
            ffmpeg_next::ffi::avformat_seek_file(self.context.as_mut_ptr(), -1, min, ts, max, flags)
        };
        if ret < 0 {
            return Err(InputError::Seek(ffmpeg_next::Error::from(ret).to_string()));
        }
        Ok(())
    }

    fn set_paused(&mut self, paused: bool) -> Result<(), InputError> {
        if !self.is_realtime() {
            return Ok(());
        }
        let result = if paused {
            self.context.pause()
        } else {
            self.context.play()
        };
        result.map_err(|e| InputError::Other(e.to_string()))
    }

    fn duration_micros(&self) -> Option<i64> {
        timestamp(self.context.duration()).filter(|duration| *duration > 0)
    }

    fn start_time_micros(&self) -> Option<i64> {
        // SAFETY: reading a plain field of a valid format context.
        timestamp(unsafe { (*self.context.as_ptr()).start_time })
    }

    fn bit_rate(&self) -> Option<u64> {
        u64::try_from(self.context.bit_rate())
            .ok()
            .filter(|rate| *rate > 0)
    }

    fn is_realtime(&self) -> bool {
        let format = self.context.format();
        REALTIME_FORMATS.contains(&format.name())
            || self.url.starts_with("rtp:")
            || self.url.starts_with("udp:")
    }

    fn has_discontinuous_timestamps(&self) -> bool {
        self.context
            .format()
            .flags()
            .contains(ffmpeg_next::format::Flags::TS_DISCONT)
    }

    fn open_decoder(&mut self, stream_index: usize) -> Result<Box<dyn Decoder>, DecoderError> {
        let stream = self
            .context
            .stream(stream_index)
            .ok_or_else(|| DecoderError::Open(format!("no stream {stream_index}")))?;
        let decoder = FfmpegDecoder::open(&stream)?;
        Ok(Box::new(decoder))
    }

    #[allow(clippy::cast_sign_loss)]
    fn attached_picture(&self, stream_index: usize) -> Option<Packet> {
        let stream = self.context.stream(stream_index)?;
        if !stream.disposition().contains(Disposition::ATTACHED_PIC) {
            return None;
        }
        // SAFETY: `attached_pic` is owned by the stream and stays valid while
        // the format context lives. The payload is copied before returning.
        let (data, pts, dts) = unsafe {
            let picture = &(*stream.as_ptr()).attached_pic;
            if picture.data.is_null() || picture.size <= 0 {
                return None;
            }
            let data = std::slice::from_raw_parts(picture.data, picture.size as usize).to_vec();
            (data, picture.pts, picture.dts)
        };
        let mut packet = Packet::new(stream_index, data);
        packet.pts = timestamp(pts);
        packet.dts = timestamp(dts);
        packet.is_key = true;
        Some(packet)
    }

    fn set_interrupt(&mut self, flag: Arc<AtomicBool>) {
        if self.interrupt.set(flag).is_err() {
            tracing::warn!("interrupt flag already set");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_fails_for_missing_file() {
        let result = FfmpegInput::open("/nonexistent/video.mp4");
        assert!(matches!(result, Err(InputError::Open(_))));
    }

    #[test]
    fn open_fails_for_garbage_file() {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let path = temp_dir.path().join("garbage.mp4");
        std::fs::write(&path, b"definitely not a media container").expect("write");
        assert!(FfmpegInput::open(&path).is_err());
    }

    #[test]
    fn media_types_map_to_kinds() {
        for kind in MediaKind::ALL {
            assert_eq!(media_kind(media_type(kind)), Some(kind));
        }
        assert_eq!(media_kind(Type::Data), None);
    }

    fn assert_send<T: Send>() {}

    #[test]
    fn input_is_send() {
        assert_send::<FfmpegInput>();
    }
}
