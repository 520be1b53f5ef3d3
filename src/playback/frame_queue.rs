// SPDX-License-Identifier: MPL-2.0
//! Bounded ring of pre-allocated frame slots.
//!
//! One decode loop writes, one consumer (pacer or audio callback) reads. The
//! ring is split into a writable partition starting at `windex` and a readable
//! partition of `size` slots starting at `rindex`. With `keep_last`, the slot
//! at `rindex` stays readable after it has been shown so it can be redrawn;
//! `rindex_shown` records that the head has been shown.
//!
//! Peek and lease operations hand out the slot's lock guard. The writer and
//! the reader never address the same slot, but a caller must drop any guard
//! it holds before calling [`FrameQueue::dequeue`].

use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex, MutexGuard};

use crate::config::QUEUE_WAIT_TIMEOUT_MS;
use crate::playback::frame::Frame;
use crate::playback::packet_queue::PacketQueue;

#[derive(Debug, Default)]
struct RingState {
    rindex: usize,
    windex: usize,
    size: usize,
    rindex_shown: usize,
}

/// Fixed-capacity frame ring tied to the packet queue that feeds it.
#[derive(Debug)]
pub struct FrameQueue {
    slots: Vec<Mutex<Frame>>,
    ring: Mutex<RingState>,
    changed: Condvar,
    keep_last: bool,
    /// Closing this queue closes the frame queue as well.
    packets: Arc<PacketQueue>,
}

impl FrameQueue {
    #[must_use]
    pub fn new(packets: Arc<PacketQueue>, capacity: usize, keep_last: bool) -> Self {
        let capacity = capacity.max(1);
        Self {
            slots: (0..capacity).map(|_| Mutex::new(Frame::default())).collect(),
            ring: Mutex::new(RingState::default()),
            changed: Condvar::new(),
            keep_last,
            packets,
        }
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    fn is_closed(&self) -> bool {
        self.packets.is_closed()
    }

    /// Wakes every waiter so it can re-check the closed state.
    pub fn signal(&self) {
        self.changed.notify_all();
    }

    /// Waits for a writable slot and returns it locked for in-place filling.
    ///
    /// Returns `None` once the feeding packet queue is closed.
    pub fn lease_frame_for_writing(&self) -> Option<MutexGuard<'_, Frame>> {
        let timeout = Duration::from_millis(QUEUE_WAIT_TIMEOUT_MS);
        let mut ring = self.ring.lock();
        while ring.size >= self.slots.len() && !self.is_closed() {
            let _ = self.changed.wait_for(&mut ring, timeout);
        }
        if self.is_closed() {
            return None;
        }
        let index = ring.windex;
        drop(ring);
        Some(self.slots[index].lock())
    }

    /// Publishes the slot returned by the last lease.
    pub fn enqueue_leased_frame(&self, leased: MutexGuard<'_, Frame>) {
        drop(leased);
        let mut ring = self.ring.lock();
        ring.windex = (ring.windex + 1) % self.slots.len();
        ring.size += 1;
        drop(ring);
        self.changed.notify_all();
    }

    /// Returns the next frame to show, if one is pending.
    pub fn peek_showable(&self) -> Option<MutexGuard<'_, Frame>> {
        let ring = self.ring.lock();
        if ring.size <= ring.rindex_shown {
            return None;
        }
        let index = (ring.rindex + ring.rindex_shown) % self.slots.len();
        drop(ring);
        Some(self.slots[index].lock())
    }

    /// Returns the frame after the next one to show, if there is one.
    pub fn peek_showable_plus(&self) -> Option<MutexGuard<'_, Frame>> {
        let ring = self.ring.lock();
        if ring.size <= ring.rindex_shown + 1 {
            return None;
        }
        let index = (ring.rindex + ring.rindex_shown + 1) % self.slots.len();
        drop(ring);
        Some(self.slots[index].lock())
    }

    /// Returns the head slot: the last shown frame under `keep_last`.
    pub fn peek_last(&self) -> MutexGuard<'_, Frame> {
        let index = self.ring.lock().rindex;
        self.slots[index].lock()
    }

    /// Waits until a frame is pending and returns it.
    ///
    /// Returns `None` once the feeding packet queue is closed.
    pub fn wait_peek_showable(&self) -> Option<MutexGuard<'_, Frame>> {
        let timeout = Duration::from_millis(QUEUE_WAIT_TIMEOUT_MS);
        let mut ring = self.ring.lock();
        while ring.size <= ring.rindex_shown && !self.is_closed() {
            let _ = self.changed.wait_for(&mut ring, timeout);
        }
        if self.is_closed() {
            return None;
        }
        let index = (ring.rindex + ring.rindex_shown) % self.slots.len();
        drop(ring);
        Some(self.slots[index].lock())
    }

    /// Advances the read side.
    ///
    /// Under `keep_last`, the first call on a fresh head only marks it shown.
    /// Otherwise the head slot is reset and returned to the writable pool.
    pub fn dequeue(&self) {
        let mut ring = self.ring.lock();
        if ring.size == 0 {
            return;
        }
        if self.keep_last && ring.rindex_shown == 0 {
            ring.rindex_shown = 1;
            return;
        }
        let index = ring.rindex;
        self.slots[index].lock().reset();
        ring.rindex = (index + 1) % self.slots.len();
        ring.size -= 1;
        drop(ring);
        self.changed.notify_all();
    }

    /// Frames not yet shown.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        let ring = self.ring.lock();
        ring.size.saturating_sub(ring.rindex_shown)
    }

    /// Readable slots including a kept shown frame.
    #[must_use]
    pub fn count(&self) -> usize {
        self.ring.lock().size
    }

    /// Returns true once the head frame has been shown.
    #[must_use]
    pub fn is_head_shown(&self) -> bool {
        self.ring.lock().rindex_shown == 1
    }

    /// Byte position of the last shown frame, if it belongs to the live epoch.
    #[must_use]
    pub fn last_position(&self) -> Option<i64> {
        let ring = self.ring.lock();
        if ring.rindex_shown == 0 {
            return None;
        }
        let index = ring.rindex;
        drop(ring);
        let frame = self.slots[index].lock();
        if frame.group_index == self.packets.group_index() {
            frame.position
        } else {
            None
        }
    }
}
