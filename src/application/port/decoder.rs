// SPDX-License-Identifier: MPL-2.0
//! Decoder port.
//!
//! The decoder turns compressed packets into raw frames or subtitle cues. Raw
//! frames are opaque to the playback core: it reads their declared format and
//! timestamp and hands them on to a [`FrameFilter`](super::FrameFilter).

use std::any::Any;

use crate::domain::error::DecoderError;
use crate::domain::media::{MediaKind, Rational, SourceFormat, SubtitleCue};
use crate::playback::packet::Packet;

/// An undecoded-by-us frame as produced by the codec backend.
pub struct RawFrame {
    /// Best-effort presentation timestamp in `time_base` units.
    pub pts: Option<i64>,
    pub time_base: Rational,
    pub format: SourceFormat,
    /// Byte position of the source packet, if known.
    pub position: Option<i64>,
    /// Sample frames carried (audio only).
    pub sample_count: usize,
    /// Backend frame handle, only meaningful to the matching filter.
    pub payload: Box<dyn Any + Send>,
}

impl std::fmt::Debug for RawFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawFrame")
            .field("pts", &self.pts)
            .field("time_base", &self.time_base)
            .field("format", &self.format)
            .field("position", &self.position)
            .field("sample_count", &self.sample_count)
            .finish_non_exhaustive()
    }
}

/// Outcome of submitting a packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendStatus {
    Accepted,
    /// The decoder has output pending; drain it and resend the same packet.
    Full,
}

/// Outcome of asking for output.
#[derive(Debug)]
pub enum DecodeStatus {
    NeedsMoreInput,
    Frame(RawFrame),
    Subtitle(SubtitleCue),
    /// Fully drained after an end-of-stream packet.
    EndOfStream,
}

/// Port for a stateful per-stream decoder.
pub trait Decoder: Send {
    fn kind(&self) -> MediaKind;

    /// Submits a packet. A null packet starts draining.
    ///
    /// # Errors
    ///
    /// Returns a [`DecoderError`] when the bitstream cannot be decoded.
    fn send_packet(&mut self, packet: &Packet) -> Result<SendStatus, DecoderError>;

    /// Retrieves the next output, if any is ready.
    ///
    /// # Errors
    ///
    /// Returns a [`DecoderError`] on hard decoding failure.
    fn receive(&mut self) -> Result<DecodeStatus, DecoderError>;

    /// Drops all buffered state; called on every flush marker.
    fn flush(&mut self);
}
