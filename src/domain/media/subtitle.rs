// SPDX-License-Identifier: MPL-2.0
//! Decoded subtitle cues.

/// A decoded subtitle event.
///
/// Display times are relative to `pts_micros`, in milliseconds.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubtitleCue {
    /// Presentation time in microseconds, if known.
    pub pts_micros: Option<i64>,
    pub start_display_ms: u32,
    pub end_display_ms: u32,
    pub rects: Vec<SubtitleRect>,
}

impl SubtitleCue {
    /// Returns the cue start in seconds, or NaN when the pts is unknown.
    #[allow(clippy::cast_precision_loss)]
    #[must_use]
    pub fn pts_secs(&self) -> f64 {
        self.pts_micros.map_or(f64::NAN, |us| us as f64 / 1_000_000.0)
    }

    /// Seconds between start and end of display.
    #[must_use]
    pub fn display_secs(&self) -> f64 {
        f64::from(self.end_display_ms.saturating_sub(self.start_display_ms)) / 1000.0
    }

    /// Returns true if every rect is a bitmap.
    #[must_use]
    pub fn is_graphic(&self) -> bool {
        !self.rects.is_empty()
            && self
                .rects
                .iter()
                .all(|rect| matches!(rect, SubtitleRect::Bitmap { .. }))
    }
}

/// One drawable region of a subtitle cue.
#[derive(Debug, Clone, PartialEq)]
pub enum SubtitleRect {
    /// Plain or ASS-formatted text.
    Text(String),
    /// RGBA bitmap placed at (`x`, `y`) in picture coordinates.
    Bitmap {
        x: i32,
        y: i32,
        width: u32,
        height: u32,
        rgba: Vec<u8>,
    },
}
