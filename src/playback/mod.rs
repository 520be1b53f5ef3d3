// SPDX-License-Identifier: MPL-2.0
//! Playback synchronizer core.
//!
//! A [`Container`] owns the read thread and one [`Component`] per opened
//! stream kind. Components decode packets from their [`PacketQueue`] into
//! their [`FrameQueue`]. Audio is pulled by the [`AudioRenderer`] from the
//! device callback, and pictures are paced by the [`VideoPacer`] against the
//! master [`Clock`].
//!
//! All shared state lives in a [`Session`]. Every flush bumps the group index
//! of a packet queue; frames and clock readings from an older group are
//! discarded wherever they are found.

pub mod audio_renderer;
pub mod clock;
pub mod component;
pub mod container;
pub mod events;
pub mod frame;
pub mod frame_queue;
pub mod options;
pub mod pacing;
pub mod packet;
pub mod packet_queue;
pub mod presentation;
pub mod session;
pub mod stats;
pub mod time;

pub use audio_renderer::AudioRenderer;
pub use clock::{Clock, Clocks};
pub use component::Component;
pub use container::Container;
pub use events::PlayerEvent;
pub use frame::{Frame, FrameData};
pub use frame_queue::FrameQueue;
pub use options::{OutputCapabilities, PlaybackOptions};
pub use pacing::VideoPacer;
pub use packet::Packet;
pub use packet_queue::PacketQueue;
pub use session::Session;
pub use stats::PlaybackStats;
