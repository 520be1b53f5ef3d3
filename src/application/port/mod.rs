// SPDX-License-Identifier: MPL-2.0
//! Port definitions (traits) for dependency inversion.
//!
//! The playback core talks to its collaborators only through these traits.
//! Infrastructure adapters (`FFmpeg`, cpal) implement them; tests substitute
//! scripted doubles.
//!
//! # Available Ports
//!
//! - [`input`]: Demultiplexed packet source and seeking
//! - [`decoder`]: Packet to raw frame decoding
//! - [`filter`]: Pixel format conversion and resampling
//! - [`presenter`]: Picture output and fatal error reporting
//! - [`audio`]: Pull-based audio output
//!
//! # Design Notes
//!
//! - No codec library types cross these traits
//! - Ports used from a single worker thread are `Send`; ports called from
//!   several threads are `Send + Sync`
//! - No `async fn`: every caller is a dedicated thread

pub mod audio;
pub mod decoder;
pub mod filter;
pub mod input;
pub mod presenter;

pub use audio::{AudioDevice, AudioSource, OpenedAudio};
pub use decoder::{DecodeStatus, Decoder, RawFrame, SendStatus};
pub use filter::{FilterFactory, FilterStatus, FrameFilter};
pub use input::{MediaInput, ReadOutcome, SeekTarget};
pub use presenter::Presenter;
