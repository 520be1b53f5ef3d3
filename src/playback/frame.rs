// SPDX-License-Identifier: MPL-2.0
//! Reusable decoded-frame slots.
//!
//! Slots are allocated once per frame queue and refilled in place. Resetting a
//! slot releases its contents but keeps pixel and sample buffer capacity.

use crate::domain::media::{AudioSpec, GroupIndex, PixelFormat, Rational, SubtitleCue};

/// Converted picture ready for the renderer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoPicture {
    pub format: PixelFormat,
    pub width: u32,
    pub height: u32,
    /// Bytes per row of `data`.
    pub stride: usize,
    pub data: Vec<u8>,
}

/// Resampled interleaved `f32` samples in the device format.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioSamples {
    pub spec: AudioSpec,
    pub samples: Vec<f32>,
}

impl AudioSamples {
    /// Number of sample frames (one sample per channel).
    #[must_use]
    pub fn frame_count(&self) -> usize {
        let channels = usize::from(self.spec.channels.max(1));
        self.samples.len() / channels
    }

    /// Size of the samples in bytes.
    #[must_use]
    pub fn byte_len(&self) -> usize {
        self.samples.len() * std::mem::size_of::<f32>()
    }
}

/// Payload of a frame slot.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum FrameData {
    #[default]
    Empty,
    Video(VideoPicture),
    Audio(AudioSamples),
    Subtitle(SubtitleCue),
}

impl FrameData {
    /// Drops the contents while keeping buffer capacity where there is one.
    pub fn clear(&mut self) {
        match self {
            FrameData::Video(picture) => picture.data.clear(),
            FrameData::Audio(audio) => audio.samples.clear(),
            FrameData::Subtitle(_) => *self = FrameData::Empty,
            FrameData::Empty => {}
        }
    }

    #[must_use]
    pub fn as_video(&self) -> Option<&VideoPicture> {
        match self {
            FrameData::Video(picture) => Some(picture),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_audio(&self) -> Option<&AudioSamples> {
        match self {
            FrameData::Audio(audio) => Some(audio),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_subtitle(&self) -> Option<&SubtitleCue> {
        match self {
            FrameData::Subtitle(cue) => Some(cue),
            _ => None,
        }
    }
}

/// A decoded frame slot and its timing metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub group_index: GroupIndex,
    /// Presentation time in seconds, NaN when unknown.
    pub time: f64,
    /// Nominal duration in seconds.
    pub duration: f64,
    /// Byte offset of the source packet, if known.
    pub position: Option<i64>,
    pub width: u32,
    pub height: u32,
    pub sample_aspect_ratio: Rational,
    /// Set once the renderer has consumed the picture.
    pub is_uploaded: bool,
    pub data: FrameData,
}

impl Default for Frame {
    fn default() -> Self {
        Self {
            group_index: 0,
            time: f64::NAN,
            duration: 0.0,
            position: None,
            width: 0,
            height: 0,
            sample_aspect_ratio: Rational::default(),
            is_uploaded: false,
            data: FrameData::Empty,
        }
    }
}

impl Frame {
    /// Releases the slot contents for reuse.
    pub fn reset(&mut self) {
        self.group_index = 0;
        self.time = f64::NAN;
        self.duration = 0.0;
        self.position = None;
        self.is_uploaded = false;
        self.data.clear();
    }

    /// Copies the metadata the pacer needs once the slot lock is released.
    #[must_use]
    pub fn timing(&self) -> FrameTiming {
        FrameTiming {
            group_index: self.group_index,
            time: self.time,
            duration: self.duration,
            position: self.position,
        }
    }

    /// Absolute display window of a subtitle cue, in seconds.
    #[must_use]
    pub fn subtitle_window(&self) -> Option<(f64, f64)> {
        self.data.as_subtitle().map(|cue| {
            (
                self.time + f64::from(cue.start_display_ms) / 1000.0,
                self.time + f64::from(cue.end_display_ms) / 1000.0,
            )
        })
    }
}

/// Timing metadata of a frame, detached from its slot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameTiming {
    pub group_index: GroupIndex,
    pub time: f64,
    pub duration: f64,
    pub position: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_keeps_buffer_capacity() {
        let mut frame = Frame {
            group_index: 4,
            time: 1.0,
            data: FrameData::Video(VideoPicture {
                format: PixelFormat::Rgba,
                width: 2,
                height: 2,
                stride: 8,
                data: vec![0; 16],
            }),
            ..Frame::default()
        };
        frame.reset();
        assert!(frame.time.is_nan());
        let picture = frame.data.as_video().expect("video payload survives reset");
        assert!(picture.data.is_empty());
        assert!(picture.data.capacity() >= 16);
    }

    #[test]
    fn subtitle_reset_empties_payload() {
        let mut frame = Frame {
            data: FrameData::Subtitle(SubtitleCue::default()),
            ..Frame::default()
        };
        frame.reset();
        assert_eq!(frame.data, FrameData::Empty);
    }

    #[test]
    fn subtitle_window_is_relative_to_time() {
        let frame = Frame {
            time: 10.0,
            data: FrameData::Subtitle(SubtitleCue {
                pts_micros: Some(10_000_000),
                start_display_ms: 500,
                end_display_ms: 2500,
                rects: Vec::new(),
            }),
            ..Frame::default()
        };
        let (start, end) = frame.subtitle_window().expect("subtitle window");
        assert!((start - 10.5).abs() < 1e-9);
        assert!((end - 12.5).abs() < 1e-9);
    }

    #[test]
    fn audio_frame_count_divides_by_channels() {
        let audio = AudioSamples {
            spec: AudioSpec {
                sample_rate: 48_000,
                channels: 2,
            },
            samples: vec![0.0; 960],
        };
        assert_eq!(audio.frame_count(), 480);
        assert_eq!(audio.byte_len(), 3840);
    }
}
