// SPDX-License-Identifier: MPL-2.0
//! Demultiplexed input port.
//!
//! The input owns the container-level state (format context, I/O) and hands
//! out compressed packets one at a time. It also constructs the decoder for
//! one of its streams, since decoder parameters live with the stream.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use crate::application::port::decoder::Decoder;
use crate::domain::error::{DecoderError, InputError};
use crate::domain::media::{MediaKind, StreamInfo};
use crate::playback::packet::Packet;

/// Result of one read.
#[derive(Debug)]
pub enum ReadOutcome {
    Packet(Packet),
    /// Nothing could be read right now; try again shortly.
    Again,
    EndOfFile,
}

/// Where a seek should land.
///
/// The input picks any position within `min..=max` it can reach, closest to
/// `target`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekTarget {
    /// Input-level timestamps in microseconds.
    Time { target: i64, min: i64, max: i64 },
    /// Byte offsets.
    Bytes { target: i64, min: i64, max: i64 },
}

impl SeekTarget {
    /// Builds the seek window for a target and the increment that led to it.
    ///
    /// A forward increment only ever moves forward and a backward one only
    /// ever moves backward.
    #[must_use]
    pub fn new(target: i64, increment: i64, by_bytes: bool) -> Self {
        let min = if increment > 0 { target - increment + 2 } else { i64::MIN };
        let max = if increment < 0 { target - increment - 2 } else { i64::MAX };
        if by_bytes {
            SeekTarget::Bytes { target, min, max }
        } else {
            SeekTarget::Time { target, min, max }
        }
    }

    #[must_use]
    pub fn target(self) -> i64 {
        match self {
            SeekTarget::Time { target, .. } | SeekTarget::Bytes { target, .. } => target,
        }
    }

    #[must_use]
    pub fn is_bytes(self) -> bool {
        matches!(self, SeekTarget::Bytes { .. })
    }
}

/// Port for a demultiplexed media source.
///
/// Implementations must be `Send`; the read thread takes ownership.
pub trait MediaInput: Send {
    /// Every stream of the input, indexed by stream index.
    fn streams(&self) -> &[StreamInfo];

    /// Picks the preferred stream of `kind`, optionally related to another one
    /// (same program, for instance).
    fn best_stream(&self, kind: MediaKind, related: Option<usize>) -> Option<usize>;

    /// Reads the next packet.
    ///
    /// # Errors
    ///
    /// Returns an [`InputError`] on I/O failure or when interrupted.
    fn read_packet(&mut self) -> Result<ReadOutcome, InputError>;

    /// Seeks the input.
    ///
    /// # Errors
    ///
    /// Returns [`InputError::Seek`] if the position cannot be reached.
    fn seek(&mut self, target: SeekTarget) -> Result<(), InputError>;

    /// Applies pause state at the input level (network streams).
    ///
    /// # Errors
    ///
    /// Returns an [`InputError`] if the input rejects the request.
    fn set_paused(&mut self, _paused: bool) -> Result<(), InputError> {
        Ok(())
    }

    /// Total duration in microseconds, if known.
    fn duration_micros(&self) -> Option<i64>;

    /// Start time in microseconds, if known.
    fn start_time_micros(&self) -> Option<i64>;

    /// Overall bit rate in bits per second, if known.
    fn bit_rate(&self) -> Option<u64>;

    /// True for live sources (RTP, RTSP, UDP and similar).
    fn is_realtime(&self) -> bool {
        false
    }

    /// True for formats whose timestamps may jump (MPEG-TS, Ogg and similar).
    fn has_discontinuous_timestamps(&self) -> bool {
        false
    }

    /// Opens a decoder for `stream_index`.
    ///
    /// # Errors
    ///
    /// Returns a [`DecoderError`] if the codec is unsupported or fails to open.
    fn open_decoder(&mut self, stream_index: usize) -> Result<Box<dyn Decoder>, DecoderError>;

    /// The attached picture of a cover-art stream.
    fn attached_picture(&self, _stream_index: usize) -> Option<Packet> {
        None
    }

    /// Hands the input the session abort flag; blocking reads must return
    /// [`InputError::Interrupted`] once it is set.
    fn set_interrupt(&mut self, _flag: Arc<AtomicBool>) {}
}
