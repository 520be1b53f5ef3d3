// SPDX-License-Identifier: MPL-2.0
//! `FFmpeg` codec wrapper implementing the [`Decoder`] port.
//!
//! Audio and video use the send/receive API directly. Subtitle decoding is
//! one-shot in `FFmpeg`, so cues are decoded on send and handed out on the
//! next receive.

use ffmpeg_next::codec::subtitle::Rect;

use crate::application::port::{DecodeStatus, Decoder, RawFrame, SendStatus};
use crate::domain::error::DecoderError;
use crate::domain::media::{MediaKind, Rational, SourceFormat, SubtitleCue, SubtitleRect};
use crate::infrastructure::ffmpeg::from_ffmpeg_rational;
use crate::playback::packet::Packet;

/// A decoded video frame travelling to the matching filter.
pub(crate) struct VideoPayload(pub(crate) ffmpeg_next::frame::Video);

/// A decoded audio frame travelling to the matching filter.
pub(crate) struct AudioPayload(pub(crate) ffmpeg_next::frame::Audio);

// SAFETY: a decoded frame is reference-counted FFmpeg memory with a single
// owner. It is moved from the decode thread into the filter and never
// aliased.
unsafe impl Send for VideoPayload {}
// SAFETY: see `VideoPayload`.
unsafe impl Send for AudioPayload {}

enum Codec {
    Video(ffmpeg_next::decoder::Video),
    Audio(ffmpeg_next::decoder::Audio),
    Subtitle {
        decoder: ffmpeg_next::decoder::Subtitle,
        ready: Option<SubtitleCue>,
        draining: bool,
    },
}

/// Per-stream `FFmpeg` decoder.
pub struct FfmpegDecoder {
    codec: Codec,
    time_base: Rational,
    /// Byte position of the most recently accepted packet.
    last_position: Option<i64>,
}

// SAFETY: the codec context is exclusively owned by this decoder and only
// used from the component's decode thread.
unsafe impl Send for FfmpegDecoder {}

impl std::fmt::Debug for FfmpegDecoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FfmpegDecoder")
            .field("kind", &self.kind())
            .field("time_base", &self.time_base)
            .finish_non_exhaustive()
    }
}

fn is_again(error: &ffmpeg_next::Error) -> bool {
    matches!(error, ffmpeg_next::Error::Other { errno } if *errno == ffmpeg_next::util::error::EAGAIN)
}

impl FfmpegDecoder {
    /// Opens a decoder for `stream`.
    ///
    /// # Errors
    ///
    /// Returns [`DecoderError::UnsupportedCodec`] for streams that are not
    /// audio, video or subtitles, and [`DecoderError::Open`] if the codec
    /// fails to open.
    pub fn open(stream: &ffmpeg_next::format::stream::Stream<'_>) -> Result<Self, DecoderError> {
        let parameters = stream.parameters();
        let medium = parameters.medium();
        let codec_name = parameters.id().name().to_string();

        let context = ffmpeg_next::codec::context::Context::from_parameters(parameters)
            .map_err(|e| DecoderError::Open(format!("Failed to create codec context: {e}")))?;
        let decoder = context.decoder();

        let codec = match medium {
            ffmpeg_next::media::Type::Video => Codec::Video(
                decoder
                    .video()
                    .map_err(|e| DecoderError::Open(format!("{codec_name}: {e}")))?,
            ),
            ffmpeg_next::media::Type::Audio => Codec::Audio(
                decoder
                    .audio()
                    .map_err(|e| DecoderError::Open(format!("{codec_name}: {e}")))?,
            ),
            ffmpeg_next::media::Type::Subtitle => Codec::Subtitle {
                decoder: decoder
                    .subtitle()
                    .map_err(|e| DecoderError::Open(format!("{codec_name}: {e}")))?,
                ready: None,
                draining: false,
            },
            _ => return Err(DecoderError::UnsupportedCodec(codec_name)),
        };

        tracing::debug!(stream = stream.index(), codec = %codec_name, "decoder opened");
        Ok(Self {
            codec,
            time_base: from_ffmpeg_rational(stream.time_base()),
            last_position: None,
        })
    }

    #[allow(clippy::cast_possible_truncation)]
    fn to_ffmpeg_packet(packet: &Packet) -> ffmpeg_next::Packet {
        let mut converted = ffmpeg_next::Packet::copy(&packet.data);
        converted.set_stream(packet.stream_index);
        converted.set_pts(packet.pts);
        converted.set_dts(packet.dts);
        converted.set_duration(packet.duration);
        converted.set_position(packet.position.map_or(-1, |p| p as isize));
        if packet.is_key {
            converted.set_flags(ffmpeg_next::packet::Flags::KEY);
        }
        converted
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
    fn video_frame(&self, frame: ffmpeg_next::frame::Video) -> RawFrame {
        let format = SourceFormat::Video {
            width: frame.width(),
            height: frame.height(),
            format: ffmpeg_next::ffi::AVPixelFormat::from(frame.format()) as i32,
            sample_aspect_ratio: from_ffmpeg_rational(frame.aspect_ratio()),
        };
        RawFrame {
            pts: frame.timestamp(),
            time_base: self.time_base,
            format,
            position: self.last_position,
            sample_count: 0,
            payload: Box::new(VideoPayload(frame)),
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    fn audio_frame(&self, frame: ffmpeg_next::frame::Audio) -> RawFrame {
        let format = SourceFormat::Audio {
            sample_rate: frame.rate(),
            channels: u16::try_from(frame.channels()).unwrap_or(u16::MAX),
            format: ffmpeg_next::ffi::AVSampleFormat::from(frame.format()) as i32,
        };
        let sample_count = frame.samples();
        RawFrame {
            pts: frame.pts(),
            time_base: self.time_base,
            format,
            position: None,
            sample_count,
            payload: Box::new(AudioPayload(frame)),
        }
    }
}

/// Converts a decoded `FFmpeg` subtitle into a cue.
fn convert_subtitle(subtitle: &ffmpeg_next::Subtitle) -> SubtitleCue {
    let rects = subtitle
        .rects()
        .filter_map(|rect| match rect {
            Rect::Text(text) => Some(SubtitleRect::Text(text.get().to_string())),
            Rect::Ass(ass) => Some(SubtitleRect::Text(ass.get().to_string())),
            Rect::Bitmap(bitmap) => bitmap_rect(&bitmap),
            Rect::None(_) => None,
        })
        .collect();
    SubtitleCue {
        pts_micros: subtitle.pts(),
        start_display_ms: subtitle.start(),
        end_display_ms: subtitle.end(),
        rects,
    }
}

/// Expands a paletted subtitle bitmap to RGBA.
#[allow(clippy::cast_sign_loss)]
fn bitmap_rect(bitmap: &ffmpeg_next::codec::subtitle::Bitmap<'_>) -> Option<SubtitleRect> {
    let width = bitmap.width();
    let height = bitmap.height();
    let (w, h) = (width as usize, height as usize);
    let mut rgba = Vec::with_capacity(w * h * 4);

    // SAFETY: for bitmap rects FFmpeg guarantees `data[0]` holds `h` rows of
    // `linesize[0]` palette indices and `data[1]` holds `nb_colors` ARGB
    // entries. Both stay valid while the subtitle is alive.
    unsafe {
        let rect = &*bitmap.as_ptr();
        if rect.data[0].is_null() || rect.data[1].is_null() || rect.linesize[0] <= 0 {
            return None;
        }
        let stride = rect.linesize[0] as usize;
        let indices = std::slice::from_raw_parts(rect.data[0], stride * h);
        let palette = std::slice::from_raw_parts(
            rect.data[1].cast::<u32>(),
            usize::try_from(rect.nb_colors).unwrap_or(0),
        );
        for row in indices.chunks_exact(stride).take(h) {
            for &index in &row[..w.min(stride)] {
                let argb = palette.get(usize::from(index)).copied().unwrap_or(0);
                rgba.extend_from_slice(&[
                    (argb >> 16) as u8,
                    (argb >> 8) as u8,
                    argb as u8,
                    (argb >> 24) as u8,
                ]);
            }
        }
    }

    Some(SubtitleRect::Bitmap {
        x: i32::try_from(bitmap.x()).unwrap_or(0),
        y: i32::try_from(bitmap.y()).unwrap_or(0),
        width,
        height,
        rgba,
    })
}

impl Decoder for FfmpegDecoder {
    fn kind(&self) -> MediaKind {
        match self.codec {
            Codec::Video(_) => MediaKind::Video,
            Codec::Audio(_) => MediaKind::Audio,
            Codec::Subtitle { .. } => MediaKind::Subtitle,
        }
    }

    fn send_packet(&mut self, packet: &Packet) -> Result<SendStatus, DecoderError> {
        if packet.position.is_some() {
            self.last_position = packet.position;
        }
        let result = match &mut self.codec {
            Codec::Video(decoder) if packet.is_null() => decoder.send_eof(),
            Codec::Audio(decoder) if packet.is_null() => decoder.send_eof(),
            Codec::Video(decoder) => decoder.send_packet(&Self::to_ffmpeg_packet(packet)),
            Codec::Audio(decoder) => decoder.send_packet(&Self::to_ffmpeg_packet(packet)),
            Codec::Subtitle {
                decoder,
                ready,
                draining,
            } => {
                let input = if packet.is_null() {
                    *draining = true;
                    ffmpeg_next::Packet::empty()
                } else {
                    Self::to_ffmpeg_packet(packet)
                };
                let mut subtitle = ffmpeg_next::Subtitle::new();
                match decoder.decode(&input, &mut subtitle) {
                    Ok(true) => {
                        *ready = Some(convert_subtitle(&subtitle));
                        Ok(())
                    }
                    Ok(false) => Ok(()),
                    Err(e) => Err(e),
                }
            }
        };
        match result {
            Ok(()) => Ok(SendStatus::Accepted),
            Err(e) if is_again(&e) => Ok(SendStatus::Full),
            Err(ffmpeg_next::Error::Eof) => Ok(SendStatus::Accepted),
            Err(e) => {
                tracing::warn!(kind = self.kind().label(), "packet rejected: {e}");
                Ok(SendStatus::Accepted)
            }
        }
    }

    fn receive(&mut self) -> Result<DecodeStatus, DecoderError> {
        match &mut self.codec {
            Codec::Video(decoder) => {
                let mut frame = ffmpeg_next::frame::Video::empty();
                match decoder.receive_frame(&mut frame) {
                    Ok(()) => Ok(DecodeStatus::Frame(self.video_frame(frame))),
                    Err(ffmpeg_next::Error::Eof) => Ok(DecodeStatus::EndOfStream),
                    Err(e) if is_again(&e) => Ok(DecodeStatus::NeedsMoreInput),
                    Err(e) => Err(DecoderError::DecodingFailed(e.to_string())),
                }
            }
            Codec::Audio(decoder) => {
                let mut frame = ffmpeg_next::frame::Audio::empty();
                match decoder.receive_frame(&mut frame) {
                    Ok(()) => Ok(DecodeStatus::Frame(self.audio_frame(frame))),
                    Err(ffmpeg_next::Error::Eof) => Ok(DecodeStatus::EndOfStream),
                    Err(e) if is_again(&e) => Ok(DecodeStatus::NeedsMoreInput),
                    Err(e) => Err(DecoderError::DecodingFailed(e.to_string())),
                }
            }
            Codec::Subtitle {
                ready, draining, ..
            } => {
                if let Some(cue) = ready.take() {
                    Ok(DecodeStatus::Subtitle(cue))
                } else if *draining {
                    *draining = false;
                    Ok(DecodeStatus::EndOfStream)
                } else {
                    Ok(DecodeStatus::NeedsMoreInput)
                }
            }
        }
    }

    fn flush(&mut self) {
        self.last_position = None;
        match &mut self.codec {
            Codec::Video(decoder) => decoder.flush(),
            Codec::Audio(decoder) => decoder.flush(),
            Codec::Subtitle {
                decoder,
                ready,
                draining,
            } => {
                decoder.flush();
                *ready = None;
                *draining = false;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eagain_is_recognised() {
        let again = ffmpeg_next::Error::Other {
            errno: ffmpeg_next::util::error::EAGAIN,
        };
        assert!(is_again(&again));
        assert!(!is_again(&ffmpeg_next::Error::Eof));
    }

    #[test]
    fn packets_keep_timing_when_handed_to_ffmpeg() {
        let mut packet = Packet::new(3, vec![1, 2, 3]).with_pts(90).with_duration(40);
        packet.dts = Some(80);
        packet.is_key = true;
        let converted = FfmpegDecoder::to_ffmpeg_packet(&packet);
        assert_eq!(converted.stream(), 3);
        assert_eq!(converted.pts(), Some(90));
        assert_eq!(converted.dts(), Some(80));
        assert_eq!(converted.duration(), 40);
        assert!(converted.is_key());
        assert_eq!(converted.data(), Some(&[1u8, 2, 3][..]));
    }

    fn assert_send<T: Send>() {}

    #[test]
    fn decoder_is_send() {
        assert_send::<FfmpegDecoder>();
    }
}
