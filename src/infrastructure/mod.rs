// SPDX-License-Identifier: MPL-2.0
//! Infrastructure layer adapters.
//!
//! Concrete implementations of the port traits defined in
//! `application::port`.
//!
//! # Available Adapters
//!
//! - [`ffmpeg`]: Demuxing, decoding and conversion via `FFmpeg` (implements
//!   [`MediaInput`], [`Decoder`] and [`FilterFactory`])
//! - [`audio_output`]: Audio playback via cpal (implements [`AudioDevice`])
//!
//! [`MediaInput`]: crate::application::port::MediaInput
//! [`Decoder`]: crate::application::port::Decoder
//! [`FilterFactory`]: crate::application::port::FilterFactory
//! [`AudioDevice`]: crate::application::port::AudioDevice

pub mod audio_output;
pub mod ffmpeg;

pub use audio_output::CpalAudioDevice;
pub use ffmpeg::{FfmpegDecoder, FfmpegFilterFactory, FfmpegInput};
