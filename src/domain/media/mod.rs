// SPDX-License-Identifier: MPL-2.0
//! Media domain types.
//!
//! Stream descriptions, time bases and the format descriptors that drive
//! filter reconfiguration. None of these types reference a codec library.

pub mod subtitle;

pub use subtitle::{SubtitleCue, SubtitleRect};

/// Epoch stamped on packets, frames and clocks. Bumped on every flush.
pub type GroupIndex = i32;

/// Elementary stream category handled by a stream component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Audio,
    Video,
    Subtitle,
}

impl MediaKind {
    /// All kinds, in component order.
    pub const ALL: [MediaKind; 3] = [MediaKind::Audio, MediaKind::Video, MediaKind::Subtitle];

    /// Position of this kind in [`MediaKind::ALL`].
    #[must_use]
    pub fn index(self) -> usize {
        match self {
            Self::Audio => 0,
            Self::Video => 1,
            Self::Subtitle => 2,
        }
    }

    /// Short lowercase name used for thread names and logs.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Audio => "audio",
            Self::Video => "video",
            Self::Subtitle => "subtitle",
        }
    }
}

/// A rational number, used for time bases, frame rates and aspect ratios.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rational {
    pub num: i32,
    pub den: i32,
}

impl Rational {
    /// One microsecond; the time base used for seek targets and input-level timestamps.
    pub const MICROS: Rational = Rational { num: 1, den: 1_000_000 };

    #[must_use]
    pub const fn new(num: i32, den: i32) -> Self {
        Self { num, den }
    }

    /// Returns the value as `f64`, or `0.0` when the denominator is zero.
    #[must_use]
    pub fn to_f64(self) -> f64 {
        if self.den == 0 {
            0.0
        } else {
            f64::from(self.num) / f64::from(self.den)
        }
    }

    /// Returns true when both terms are non-zero.
    #[must_use]
    pub fn is_valid(self) -> bool {
        self.num != 0 && self.den != 0
    }

    /// Rescales `ts` from time base `from` to time base `to`, rounding to nearest.
    #[allow(clippy::cast_possible_truncation)]
    #[must_use]
    pub fn rescale(ts: i64, from: Rational, to: Rational) -> i64 {
        let num = i128::from(ts) * i128::from(from.num) * i128::from(to.den);
        let den = i128::from(from.den) * i128::from(to.num);
        if den == 0 {
            return 0;
        }
        let half = den.abs() / 2;
        let rounded = if (num < 0) == (den < 0) {
            (num.abs() + half) / den.abs()
        } else {
            -((num.abs() + half) / den.abs())
        };
        rounded as i64
    }

    /// Converts a timestamp in this time base to seconds.
    #[allow(clippy::cast_precision_loss)]
    #[must_use]
    pub fn ts_to_secs(self, ts: i64) -> f64 {
        ts as f64 * self.to_f64()
    }
}

impl Default for Rational {
    fn default() -> Self {
        Self { num: 0, den: 1 }
    }
}

/// Pixel layouts a renderer may accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    Rgba,
    Bgra,
    Rgb24,
    Yuv420p,
    Nv12,
}

/// Output audio specification, interleaved `f32` samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioSpec {
    pub sample_rate: u32,
    pub channels: u16,
}

impl AudioSpec {
    /// Size of one interleaved sample frame in bytes.
    #[must_use]
    pub fn frame_bytes(self) -> usize {
        usize::from(self.channels) * std::mem::size_of::<f32>()
    }

    /// Bytes consumed per second of playback.
    #[must_use]
    pub fn bytes_per_sec(self) -> usize {
        self.sample_rate as usize * self.frame_bytes()
    }
}

/// Format of a raw decoded frame, as declared by the decoder.
///
/// The `format` codes are backend-native identifiers; the core compares
/// them for equality only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Video {
        width: u32,
        height: u32,
        format: i32,
        sample_aspect_ratio: Rational,
    },
    Audio {
        sample_rate: u32,
        channels: u16,
        format: i32,
    },
}

/// Target a filter pipeline should convert to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetFormat {
    /// Any of these pixel formats, in order of preference.
    Video { pixel_formats: Vec<PixelFormat> },
    /// The opened audio device specification.
    Audio(AudioSpec),
}

/// Static description of one demuxed stream.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamInfo {
    pub index: usize,
    /// `None` for data or attachment streams the player never decodes.
    pub kind: Option<MediaKind>,
    pub time_base: Rational,
    /// Stream start time in `time_base` units.
    pub start_time: Option<i64>,
    /// Guessed frame rate, used as the nominal frame duration.
    pub frame_rate: Option<Rational>,
    /// Cover-art style stream carrying a single attached picture.
    pub is_attached_picture: bool,
    /// Owning program, if the container groups streams.
    pub program: Option<usize>,
    pub codec_name: String,
    /// Native sample rate and channel count of an audio stream.
    pub audio_spec: Option<AudioSpec>,
}

impl StreamInfo {
    /// Returns the nominal frame duration in seconds, or `0.0` if unknown.
    #[must_use]
    pub fn frame_duration_secs(&self) -> f64 {
        match self.frame_rate {
            Some(rate) if rate.is_valid() => f64::from(rate.den) / f64::from(rate.num),
            _ => 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rational_to_f64_handles_zero_denominator() {
        assert_eq!(Rational::new(1, 0).to_f64(), 0.0);
        assert!((Rational::new(1, 4).to_f64() - 0.25).abs() < 1e-12);
    }

    #[test]
    fn rational_converts_timestamps() {
        let tb = Rational::new(1, 90_000);
        assert!((tb.ts_to_secs(180_000) - 2.0).abs() < 1e-12);
        assert!((Rational::MICROS.ts_to_secs(1_500_000) - 1.5).abs() < 1e-12);
    }

    #[test]
    fn rescale_between_time_bases() {
        let stream = Rational::new(1, 90_000);
        let samples = Rational::new(1, 48_000);
        assert_eq!(Rational::rescale(90_000, stream, samples), 48_000);
        assert_eq!(Rational::rescale(-45_000, stream, Rational::MICROS), -500_000);
        assert_eq!(Rational::rescale(1, Rational::new(1, 3), Rational::new(1, 2)), 1);
    }

    #[test]
    fn audio_spec_byte_rates() {
        let spec = AudioSpec {
            sample_rate: 48_000,
            channels: 2,
        };
        assert_eq!(spec.frame_bytes(), 8);
        assert_eq!(spec.bytes_per_sec(), 384_000);
    }

    #[test]
    fn frame_duration_from_rate() {
        let mut info = StreamInfo {
            index: 0,
            kind: Some(MediaKind::Video),
            time_base: Rational::new(1, 25),
            start_time: None,
            frame_rate: Some(Rational::new(25, 1)),
            is_attached_picture: false,
            program: None,
            codec_name: "test".into(),
            audio_spec: None,
        };
        assert!((info.frame_duration_secs() - 0.04).abs() < 1e-12);
        info.frame_rate = None;
        assert_eq!(info.frame_duration_secs(), 0.0);
    }
}
