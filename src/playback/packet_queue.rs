// SPDX-License-Identifier: MPL-2.0
//! Thread-safe packet FIFO between the read thread and one decode loop.
//!
//! The queue is size-tracked but never capacity-bounded; read back-pressure
//! is decided by the container from [`PacketQueue::bytes`],
//! [`PacketQueue::count`] and [`PacketQueue::duration`]. Every flush marker
//! enqueued opens a new epoch, and every packet is stamped with the epoch
//! current at enqueue time.

use std::collections::VecDeque;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use crate::config::QUEUE_WAIT_TIMEOUT_MS;
use crate::domain::media::GroupIndex;
use crate::playback::clock::EpochSource;
use crate::playback::packet::Packet;

#[derive(Debug)]
struct QueueState {
    packets: VecDeque<Packet>,
    bytes: usize,
    /// Sum of packet durations in stream time-base units.
    duration: i64,
    closed: bool,
    group_index: GroupIndex,
}

/// FIFO of compressed packets with flush/close/epoch semantics.
#[derive(Debug)]
pub struct PacketQueue {
    state: Mutex<QueueState>,
    available: Condvar,
}

impl Default for PacketQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl PacketQueue {
    /// Creates a closed, empty queue at epoch 0. Call [`open`](Self::open)
    /// before use.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(QueueState {
                packets: VecDeque::new(),
                bytes: 0,
                duration: 0,
                closed: true,
                group_index: 0,
            }),
            available: Condvar::new(),
        }
    }

    /// Reopens the queue and enqueues a flush marker, starting a new epoch.
    pub fn open(&self) {
        let mut state = self.state.lock();
        state.closed = false;
        Self::push_locked(&mut state, Packet::flush());
        drop(state);
        self.available.notify_one();
    }

    /// Appends `packet`, stamping it with the current epoch.
    ///
    /// Returns false and drops the packet if the queue is closed.
    pub fn enqueue(&self, packet: Packet) -> bool {
        let mut state = self.state.lock();
        if state.closed {
            return false;
        }
        Self::push_locked(&mut state, packet);
        drop(state);
        self.available.notify_one();
        true
    }

    /// Enqueues a flush marker.
    pub fn enqueue_flush(&self) -> bool {
        self.enqueue(Packet::flush())
    }

    /// Enqueues an end-of-stream marker for `stream_index`.
    pub fn enqueue_null(&self, stream_index: usize) -> bool {
        self.enqueue(Packet::null(stream_index))
    }

    fn push_locked(state: &mut QueueState, mut packet: Packet) {
        if packet.is_flush() {
            state.group_index += 1;
        }
        packet.group_index = state.group_index;
        state.bytes += packet.size();
        state.duration += packet.duration;
        state.packets.push_back(packet);
    }

    /// Pops the head packet.
    ///
    /// When empty and `blocking`, waits in bounded slices until a packet
    /// arrives or the queue closes. Returns `None` once closed.
    pub fn dequeue(&self, blocking: bool) -> Option<Packet> {
        let timeout = Duration::from_millis(QUEUE_WAIT_TIMEOUT_MS);
        let mut state = self.state.lock();
        loop {
            if state.closed {
                return None;
            }
            if let Some(packet) = state.packets.pop_front() {
                state.bytes -= packet.size();
                state.duration -= packet.duration;
                return Some(packet);
            }
            if !blocking {
                return None;
            }
            let _ = self.available.wait_for(&mut state, timeout);
        }
    }

    /// Marks the queue closed and releases every waiter. Idempotent.
    pub fn close(&self) {
        self.state.lock().closed = true;
        self.available.notify_all();
    }

    /// Drops every queued packet without touching the closed flag or epoch.
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.packets.clear();
        state.bytes = 0;
        state.duration = 0;
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    #[must_use]
    pub fn count(&self) -> usize {
        self.state.lock().packets.len()
    }

    #[must_use]
    pub fn bytes(&self) -> usize {
        self.state.lock().bytes
    }

    /// Buffered duration in stream time-base units.
    #[must_use]
    pub fn duration(&self) -> i64 {
        self.state.lock().duration
    }

    #[must_use]
    pub fn group_index(&self) -> GroupIndex {
        self.state.lock().group_index
    }
}

impl EpochSource for PacketQueue {
    fn group_index(&self) -> GroupIndex {
        PacketQueue::group_index(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Instant;

    fn data(stream: usize, len: usize, duration: i64) -> Packet {
        Packet::new(stream, vec![0; len]).with_duration(duration)
    }

    #[test]
    fn new_queue_is_closed() {
        let queue = PacketQueue::new();
        assert!(queue.is_closed());
        assert!(!queue.enqueue(data(0, 4, 1)));
        assert_eq!(queue.count(), 0);
    }

    #[test]
    fn open_bumps_epoch_with_flush_marker() {
        let queue = PacketQueue::new();
        queue.open();
        assert_eq!(queue.group_index(), 1);
        let flush = queue.dequeue(false).expect("flush marker");
        assert!(flush.is_flush());
        assert_eq!(flush.group_index, 1);
    }

    #[test]
    fn flush_increments_epoch_by_one_and_stamps_followers() {
        let queue = PacketQueue::new();
        queue.open();
        queue.enqueue(data(0, 1, 1));
        queue.enqueue_flush();
        queue.enqueue(data(0, 1, 1));

        let stamps: Vec<_> = std::iter::from_fn(|| queue.dequeue(false))
            .map(|p| (p.kind, p.group_index))
            .collect();
        use crate::playback::packet::PacketKind::{Data, Flush};
        assert_eq!(stamps, vec![(Flush, 1), (Data, 1), (Flush, 2), (Data, 2)]);
    }

    #[test]
    fn counters_track_contents() {
        let queue = PacketQueue::new();
        queue.open();
        queue.dequeue(false);
        queue.enqueue(data(0, 100, 3));
        queue.enqueue(data(0, 50, 2));
        assert_eq!(queue.count(), 2);
        assert_eq!(queue.bytes(), 150);
        assert_eq!(queue.duration(), 5);

        queue.dequeue(false);
        assert_eq!(queue.bytes(), 50);
        assert_eq!(queue.duration(), 2);

        queue.clear();
        assert_eq!((queue.count(), queue.bytes(), queue.duration()), (0, 0, 0));
        assert!(!queue.is_closed());
    }

    #[test]
    fn close_rejects_and_releases() {
        let queue = PacketQueue::new();
        queue.open();
        queue.close();
        queue.close();
        assert!(!queue.enqueue(data(0, 1, 1)));
        assert!(queue.dequeue(true).is_none());
    }

    #[test]
    fn close_wakes_blocked_consumer() {
        let queue = Arc::new(PacketQueue::new());
        queue.open();
        queue.dequeue(false);

        let consumer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.dequeue(true))
        };
        thread::sleep(Duration::from_millis(30));
        let start = Instant::now();
        queue.close();
        assert!(consumer.join().expect("consumer panicked").is_none());
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn blocking_dequeue_receives_later_packet() {
        let queue = Arc::new(PacketQueue::new());
        queue.open();
        queue.dequeue(false);

        let producer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                queue.enqueue(data(3, 8, 1))
            })
        };
        let packet = queue.dequeue(true).expect("packet");
        assert_eq!(packet.stream_index, 3);
        assert!(producer.join().expect("producer panicked"));
    }
}
