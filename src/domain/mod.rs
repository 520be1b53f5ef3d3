// SPDX-License-Identifier: MPL-2.0
//! Domain layer - playback value types with ZERO external dependencies.
//!
//! This module contains pure domain types shared by the synchronizer core,
//! the port traits and the infrastructure adapters. It depends on `std` only.
//!
//! # Modules
//!
//! - [`error`]: Collaborator error types ([`InputError`](error::InputError),
//!   [`DecoderError`](error::DecoderError), [`FilterError`](error::FilterError),
//!   [`AudioDeviceError`](error::AudioDeviceError))
//! - [`media`]: Stream and format descriptions ([`MediaKind`](media::MediaKind),
//!   [`Rational`](media::Rational), [`StreamInfo`](media::StreamInfo),
//!   [`SourceFormat`](media::SourceFormat), [`SubtitleCue`](media::SubtitleCue))
//! - [`video`]: Playback value objects ([`Volume`](video::Volume),
//!   [`SeekStep`](video::SeekStep), [`SyncMode`](video::SyncMode))

pub mod error;
pub mod media;
pub mod video;
