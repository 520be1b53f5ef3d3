// SPDX-License-Identifier: MPL-2.0
//! `avpace` keeps audio, video and subtitles of one media input in sync.
//!
//! It provides the playback clocks, epoch-aware packet and frame queues, a
//! per-stream decode loop, the demuxer read loop and the picture pacing
//! logic. Demuxing and decoding go through `FFmpeg`, audio output through
//! cpal. Everything external sits behind the traits in
//! [`application::port`], so the core can be driven by other backends.

#![doc(html_root_url = "https://docs.rs/avpace/0.1.0")]

pub mod application;
pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod playback;

pub use error::{Error, Result};
