// SPDX-License-Identifier: MPL-2.0
//! Notifications sent from the worker threads to the host.

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::domain::media::MediaKind;
use crate::error::Error;

/// Something the host may want to react to.
#[derive(Debug, Clone)]
pub enum PlayerEvent {
    /// A component started decoding `stream_index`.
    StreamOpened { kind: MediaKind, stream_index: usize },
    /// A component stopped, e.g. after a stream cycle to "none".
    StreamClosed { kind: MediaKind, stream_index: usize },
    /// A seek landed; target in seconds, or a byte offset for byte seeks.
    SeekCompleted { target: f64, by_bytes: bool },
    /// A seek failed and playback continues from the previous position.
    SeekFailed { reason: String },
    /// Playback restarted from the beginning. `None` when looping forever.
    Looped { remaining: Option<u32> },
    /// Every component drained and no loop is left.
    Finished,
    /// A worker thread stopped on an unrecoverable error.
    Fatal(Error),
}

/// Sending half; a dropped receiver silently discards events.
#[derive(Debug, Clone)]
pub struct EventSink(UnboundedSender<PlayerEvent>);

impl EventSink {
    #[must_use]
    pub fn channel() -> (Self, UnboundedReceiver<PlayerEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self(tx), rx)
    }

    pub fn emit(&self, event: PlayerEvent) {
        if self.0.send(event).is_err() {
            tracing::trace!("event dropped, receiver gone");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn events_arrive_in_order() {
        let (sink, mut rx) = EventSink::channel();
        sink.emit(PlayerEvent::Looped { remaining: Some(2) });
        sink.emit(PlayerEvent::Finished);

        assert!(matches!(
            rx.recv().await,
            Some(PlayerEvent::Looped { remaining: Some(2) })
        ));
        assert!(matches!(rx.recv().await, Some(PlayerEvent::Finished)));
    }

    #[test]
    fn emit_after_receiver_drop_is_harmless() {
        let (sink, rx) = EventSink::channel();
        drop(rx);
        sink.emit(PlayerEvent::Finished);
    }
}
