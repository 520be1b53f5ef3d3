// SPDX-License-Identifier: MPL-2.0
//! swscale and swresample converters implementing the [`FrameFilter`] port.
//!
//! Each filter yields exactly one converted frame per pushed frame.

use ffmpeg_next::format::Pixel;
use ffmpeg_next::software::{resampling, scaling};

use crate::application::port::{FilterFactory, FilterStatus, FrameFilter, RawFrame};
use crate::domain::error::FilterError;
use crate::domain::media::{AudioSpec, MediaKind, PixelFormat, Rational, SourceFormat, TargetFormat};
use crate::infrastructure::ffmpeg::decoder::{AudioPayload, VideoPayload};
use crate::infrastructure::ffmpeg::{from_pixel, to_pixel};
use crate::playback::frame::{AudioSamples, FrameData, VideoPicture};

/// Builds `FFmpeg` filters for opened components.
#[derive(Debug, Default, Clone, Copy)]
pub struct FfmpegFilterFactory;

impl FilterFactory for FfmpegFilterFactory {
    fn create(&self, kind: MediaKind) -> Box<dyn FrameFilter> {
        match kind {
            MediaKind::Audio => Box::new(FfmpegAudioFilter::default()),
            // Subtitles bypass filtering.
            MediaKind::Video | MediaKind::Subtitle => Box::new(FfmpegVideoFilter::default()),
        }
    }
}

/// Converted output held until the next pull.
#[derive(Debug, Clone, Copy)]
struct Pending {
    pts: Option<i64>,
    time_base: Rational,
}

/// Pixel format conversion through swscale.
#[derive(Default)]
pub struct FfmpegVideoFilter {
    accepted: Vec<PixelFormat>,
    /// Built lazily from the first pushed frame.
    scaler: Option<(scaling::Context, PixelFormat)>,
    converted: Option<ffmpeg_next::frame::Video>,
    pending: Option<Pending>,
}

// SAFETY: the swscale context is owned exclusively by this filter, which
// lives on a single decode thread.
unsafe impl Send for FfmpegVideoFilter {}

impl FfmpegVideoFilter {
    /// Keeps the source layout when the renderer accepts it.
    fn output_format(&self, source: Pixel) -> Option<PixelFormat> {
        from_pixel(source)
            .filter(|format| self.accepted.contains(format))
            .or_else(|| self.accepted.first().copied())
    }

    fn create_scaler(
        source: Pixel,
        width: u32,
        height: u32,
        output: PixelFormat,
    ) -> Result<scaling::Context, FilterError> {
        scaling::Context::get(
            source,
            width,
            height,
            to_pixel(output),
            width,
            height,
            scaling::Flags::BILINEAR,
        )
        .map_err(|e| FilterError::Configure(format!("Failed to create scaler: {e}")))
    }
}

/// Bytes of pixel data per row of `plane`.
fn plane_row_bytes(format: PixelFormat, plane: usize, plane_width: usize) -> usize {
    match (format, plane) {
        (PixelFormat::Rgba | PixelFormat::Bgra, _) => plane_width * 4,
        (PixelFormat::Rgb24, _) => plane_width * 3,
        (PixelFormat::Nv12, 1) => plane_width * 2,
        (PixelFormat::Yuv420p | PixelFormat::Nv12, _) => plane_width,
    }
}

/// Copies every plane of `frame` into `out` without row padding.
fn copy_planes(frame: &ffmpeg_next::frame::Video, format: PixelFormat, out: &mut Vec<u8>) -> usize {
    out.clear();
    let mut stride = 0;
    for plane in 0..frame.planes() {
        let row_bytes = plane_row_bytes(format, plane, frame.plane_width(plane) as usize);
        if plane == 0 {
            stride = row_bytes;
        }
        let data = frame.data(plane);
        let line = frame.stride(plane);
        for row in 0..frame.plane_height(plane) as usize {
            let start = row * line;
            if let Some(bytes) = data.get(start..start + row_bytes) {
                out.extend_from_slice(bytes);
            }
        }
    }
    stride
}

impl FrameFilter for FfmpegVideoFilter {
    fn reconfigure(&mut self, source: &SourceFormat, target: &TargetFormat) -> Result<(), FilterError> {
        let (SourceFormat::Video { width, height, .. }, TargetFormat::Video { pixel_formats }) =
            (source, target)
        else {
            return Err(FilterError::Configure("video filter given a non-video format".into()));
        };
        if pixel_formats.is_empty() {
            return Err(FilterError::Configure("no accepted pixel format".into()));
        }
        if *width == 0 || *height == 0 {
            return Err(FilterError::Configure(format!("invalid picture size {width}x{height}")));
        }
        self.accepted.clone_from(pixel_formats);
        self.scaler = None;
        self.converted = None;
        self.pending = None;
        Ok(())
    }

    fn push(&mut self, frame: RawFrame) -> Result<(), FilterError> {
        if self.accepted.is_empty() {
            return Err(FilterError::NotConfigured);
        }
        let payload = frame
            .payload
            .downcast::<VideoPayload>()
            .map_err(|_| FilterError::Process("unexpected frame payload".into()))?;
        let source = &payload.0;

        if self.scaler.is_none() {
            let output = self
                .output_format(source.format())
                .ok_or(FilterError::NotConfigured)?;
            let scaler = Self::create_scaler(source.format(), source.width(), source.height(), output)?;
            tracing::debug!(
                source = ?source.format(),
                output = ?output,
                width = source.width(),
                height = source.height(),
                "scaler created"
            );
            self.scaler = Some((scaler, output));
        }
        let Some((scaler, _)) = self.scaler.as_mut() else {
            return Err(FilterError::NotConfigured);
        };

        let mut converted = self
            .converted
            .take()
            .unwrap_or_else(ffmpeg_next::frame::Video::empty);
        scaler
            .run(source, &mut converted)
            .map_err(|e| FilterError::Process(format!("Scaling failed: {e}")))?;
        self.converted = Some(converted);
        self.pending = Some(Pending {
            pts: frame.pts,
            time_base: frame.time_base,
        });
        Ok(())
    }

    fn pull(&mut self, out: &mut FrameData) -> Result<FilterStatus, FilterError> {
        let Some(pending) = self.pending.take() else {
            return Ok(FilterStatus::WouldBlock);
        };
        let (Some(converted), Some((_, format))) = (self.converted.as_ref(), self.scaler.as_ref())
        else {
            return Err(FilterError::NotConfigured);
        };

        if !matches!(out, FrameData::Video(_)) {
            *out = FrameData::Video(VideoPicture {
                format: *format,
                width: 0,
                height: 0,
                stride: 0,
                data: Vec::new(),
            });
        }
        if let FrameData::Video(picture) = out {
            picture.format = *format;
            picture.width = converted.width();
            picture.height = converted.height();
            picture.stride = copy_planes(converted, *format, &mut picture.data);
        }
        Ok(FilterStatus::Ready {
            pts: pending.pts,
            time_base: pending.time_base,
        })
    }
}

/// Resampling to interleaved `f32` at the device rate through swresample.
#[derive(Default)]
pub struct FfmpegAudioFilter {
    target: Option<AudioSpec>,
    resampler: Option<resampling::Context>,
    converted: Option<ffmpeg_next::frame::Audio>,
    pending: Option<Pending>,
}

// SAFETY: the swresample context is owned exclusively by this filter, which
// lives on a single decode thread.
unsafe impl Send for FfmpegAudioFilter {}

fn output_layout(channels: u16) -> ffmpeg_next::ChannelLayout {
    match channels {
        1 => ffmpeg_next::ChannelLayout::MONO,
        // Anything else is downmixed to stereo.
        _ => ffmpeg_next::ChannelLayout::STEREO,
    }
}

/// Reads `count` little-endian `f32` samples from packed audio bytes.
fn read_samples(data: &[u8], count: usize, out: &mut Vec<f32>) {
    out.clear();
    let bytes = data.get(..count * 4).unwrap_or(data);
    match bytemuck::try_cast_slice::<u8, f32>(bytes) {
        Ok(samples) => out.extend_from_slice(samples),
        Err(_) => out.extend(
            bytes
                .chunks_exact(4)
                .map(bytemuck::pod_read_unaligned::<f32>),
        ),
    }
}

impl FrameFilter for FfmpegAudioFilter {
    fn reconfigure(&mut self, source: &SourceFormat, target: &TargetFormat) -> Result<(), FilterError> {
        let (SourceFormat::Audio { .. }, TargetFormat::Audio(spec)) = (source, target) else {
            return Err(FilterError::Configure("audio filter given a non-audio format".into()));
        };
        if spec.sample_rate == 0 || spec.channels == 0 {
            return Err(FilterError::Configure(format!("invalid output spec {spec:?}")));
        }
        self.target = Some(*spec);
        self.resampler = None;
        self.converted = None;
        self.pending = None;
        Ok(())
    }

    fn push(&mut self, frame: RawFrame) -> Result<(), FilterError> {
        let Some(target) = self.target else {
            return Err(FilterError::NotConfigured);
        };
        let payload = frame
            .payload
            .downcast::<AudioPayload>()
            .map_err(|_| FilterError::Process("unexpected frame payload".into()))?;
        let source = &payload.0;

        if self.resampler.is_none() {
            let resampler = resampling::Context::get(
                source.format(),
                source.channel_layout(),
                source.rate(),
                ffmpeg_next::format::Sample::F32(ffmpeg_next::format::sample::Type::Packed),
                output_layout(target.channels),
                target.sample_rate,
            )
            .map_err(|e| FilterError::Configure(format!("Failed to create resampler: {e}")))?;
            tracing::debug!(
                source_rate = source.rate(),
                target_rate = target.sample_rate,
                channels = target.channels,
                "resampler created"
            );
            self.resampler = Some(resampler);
        }
        let Some(resampler) = self.resampler.as_mut() else {
            return Err(FilterError::NotConfigured);
        };

        let mut converted = ffmpeg_next::frame::Audio::empty();
        resampler
            .run(source, &mut converted)
            .map_err(|e| FilterError::Process(format!("Resampling failed: {e}")))?;
        self.converted = Some(converted);
        self.pending = Some(Pending {
            pts: frame.pts,
            time_base: frame.time_base,
        });
        Ok(())
    }

    fn pull(&mut self, out: &mut FrameData) -> Result<FilterStatus, FilterError> {
        let Some(pending) = self.pending.take() else {
            return Ok(FilterStatus::WouldBlock);
        };
        let (Some(converted), Some(target)) = (self.converted.take(), self.target) else {
            return Err(FilterError::NotConfigured);
        };
        let spec = AudioSpec {
            sample_rate: target.sample_rate,
            channels: target.channels.min(2),
        };

        if !matches!(out, FrameData::Audio(_)) {
            *out = FrameData::Audio(AudioSamples {
                spec,
                samples: Vec::new(),
            });
        }
        if let FrameData::Audio(audio) = out {
            audio.spec = spec;
            let count = converted.samples() * usize::from(spec.channels);
            read_samples(converted.data(0), count, &mut audio.samples);
        }
        Ok(FilterStatus::Ready {
            pts: pending.pts,
            time_base: pending.time_base,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn video_source() -> SourceFormat {
        SourceFormat::Video {
            width: 64,
            height: 48,
            format: 0,
            sample_aspect_ratio: Rational::new(1, 1),
        }
    }

    #[test]
    fn factory_builds_filters_for_each_kind() {
        let factory = FfmpegFilterFactory;
        let mut audio = factory.create(MediaKind::Audio);
        let spec = AudioSpec {
            sample_rate: 48_000,
            channels: 2,
        };
        let source = SourceFormat::Audio {
            sample_rate: 44_100,
            channels: 2,
            format: 1,
        };
        assert!(audio.reconfigure(&source, &TargetFormat::Audio(spec)).is_ok());
        let mut video = factory.create(MediaKind::Video);
        let target = TargetFormat::Video {
            pixel_formats: vec![PixelFormat::Rgba],
        };
        assert!(video.reconfigure(&video_source(), &target).is_ok());
    }

    #[test]
    fn video_filter_rejects_empty_format_list() {
        let mut filter = FfmpegVideoFilter::default();
        let target = TargetFormat::Video {
            pixel_formats: Vec::new(),
        };
        assert!(matches!(
            filter.reconfigure(&video_source(), &target),
            Err(FilterError::Configure(_))
        ));
    }

    #[test]
    fn video_filter_keeps_accepted_source_format() {
        let mut filter = FfmpegVideoFilter::default();
        let target = TargetFormat::Video {
            pixel_formats: vec![PixelFormat::Rgba, PixelFormat::Yuv420p],
        };
        filter.reconfigure(&video_source(), &target).expect("configure");
        assert_eq!(filter.output_format(Pixel::YUV420P), Some(PixelFormat::Yuv420p));
        assert_eq!(filter.output_format(Pixel::YUV444P), Some(PixelFormat::Rgba));
    }

    #[test]
    fn pull_without_push_would_block() {
        let mut filter = FfmpegAudioFilter::default();
        let mut out = FrameData::Empty;
        assert_eq!(filter.pull(&mut out).expect("pull"), FilterStatus::WouldBlock);
    }

    #[test]
    fn push_before_configure_fails() {
        let mut filter = FfmpegVideoFilter::default();
        let frame = RawFrame {
            pts: Some(0),
            time_base: Rational::new(1, 25),
            format: video_source(),
            position: None,
            sample_count: 0,
            payload: Box::new(()),
        };
        assert!(matches!(filter.push(frame), Err(FilterError::NotConfigured)));
    }

    #[test]
    fn samples_read_from_unaligned_bytes() {
        let mut bytes = vec![0u8];
        bytes.extend_from_slice(&1.5f32.to_le_bytes());
        bytes.extend_from_slice(&(-0.25f32).to_le_bytes());
        let mut out = Vec::new();
        read_samples(&bytes[1..], 2, &mut out);
        assert_eq!(out, vec![1.5, -0.25]);
    }

    #[test]
    fn planar_rows_use_plane_widths() {
        assert_eq!(plane_row_bytes(PixelFormat::Rgba, 0, 10), 40);
        assert_eq!(plane_row_bytes(PixelFormat::Rgb24, 0, 10), 30);
        assert_eq!(plane_row_bytes(PixelFormat::Nv12, 1, 5), 10);
        assert_eq!(plane_row_bytes(PixelFormat::Yuv420p, 2, 5), 5);
    }
}
