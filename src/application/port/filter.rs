// SPDX-License-Identifier: MPL-2.0
//! Filter/convert port.
//!
//! A filter converts raw decoder frames into the renderer's pixel format or
//! the audio device's sample format. The playback core rebuilds it whenever
//! the source format or the epoch changes.

use crate::application::port::decoder::RawFrame;
use crate::domain::error::FilterError;
use crate::domain::media::{MediaKind, Rational, SourceFormat, TargetFormat};
use crate::playback::frame::FrameData;

/// Outcome of pulling converted output.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FilterStatus {
    /// `out` was filled; `pts` is in `time_base` units.
    Ready { pts: Option<i64>, time_base: Rational },
    WouldBlock,
    Eof,
}

/// Port for a per-component conversion pipeline.
pub trait FrameFilter: Send {
    /// Tears down any existing pipeline and builds one for `source`.
    ///
    /// # Errors
    ///
    /// Returns [`FilterError::Configure`] if no pipeline can be built.
    fn reconfigure(&mut self, source: &SourceFormat, target: &TargetFormat)
        -> Result<(), FilterError>;

    /// Feeds one raw frame.
    ///
    /// # Errors
    ///
    /// Returns a [`FilterError`] if the frame cannot be processed.
    fn push(&mut self, frame: RawFrame) -> Result<(), FilterError>;

    /// Writes the next converted frame into `out`, reusing its buffers.
    ///
    /// # Errors
    ///
    /// Returns a [`FilterError`] on conversion failure.
    fn pull(&mut self, out: &mut FrameData) -> Result<FilterStatus, FilterError>;
}

/// Creates filters for newly opened components.
pub trait FilterFactory: Send + Sync {
    fn create(&self, kind: MediaKind) -> Box<dyn FrameFilter>;
}
