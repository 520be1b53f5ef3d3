// SPDX-License-Identifier: MPL-2.0
//! Playback domain types.
//!
//! This module contains playback-related value objects and enums that are
//! independent of any presentation or infrastructure concerns.

pub mod newtypes;

pub use newtypes::{FrameDropPolicy, SeekStep, SyncMode, Volume};
