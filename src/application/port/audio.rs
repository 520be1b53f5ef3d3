// SPDX-License-Identifier: MPL-2.0
//! Audio device port.
//!
//! The device pulls interleaved `f32` samples from an [`AudioSource`] on its
//! own callback thread.

use std::sync::Arc;

use crate::domain::error::AudioDeviceError;
use crate::domain::media::AudioSpec;

/// Supplies samples to the device callback.
pub trait AudioSource: Send + Sync {
    /// Fills `out` completely. `callback_time` is the wall time (see
    /// [`now_secs`](crate::playback::time::now_secs)) the callback started.
    fn refill_output_buffer(&self, out: &mut [f32], callback_time: f64);
}

/// What the device actually opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenedAudio {
    pub spec: AudioSpec,
    /// Hardware buffer size in bytes, used for latency compensation.
    pub hw_buffer_bytes: usize,
}

/// Port for an audio output device.
pub trait AudioDevice: Send {
    /// Opens the device as close to `wanted` as it can and starts pulling.
    ///
    /// # Errors
    ///
    /// Returns an [`AudioDeviceError`] if no output can be opened.
    fn open(
        &mut self,
        wanted: AudioSpec,
        source: Arc<dyn AudioSource>,
    ) -> Result<OpenedAudio, AudioDeviceError>;

    /// Stops pulling and releases the device.
    fn close(&mut self);
}
