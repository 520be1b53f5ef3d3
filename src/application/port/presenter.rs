// SPDX-License-Identifier: MPL-2.0
//! Presenter port: where pictures, subtitles and fatal errors end up.

use crate::domain::media::Rational;
use crate::error::Error;
use crate::playback::frame::Frame;

/// Port for the renderer side of the player.
///
/// Called from the decode and presentation threads, hence `Sync`.
pub trait Presenter: Send + Sync {
    /// The decoded picture size or aspect ratio changed.
    fn on_picture_size_changed(&self, width: u32, height: u32, sample_aspect_ratio: Rational);

    /// Paints `picture`, with the current subtitle overlay if one is showing.
    ///
    /// Called again with the same frame on forced redraws; `is_uploaded` tells
    /// the renderer whether the pixels were consumed already.
    fn render_frame(&self, picture: &Frame, subtitle: Option<&Frame>);

    /// A worker thread hit a fatal error and stopped. Called once per thread.
    fn on_fatal_error(&self, error: &Error);
}
