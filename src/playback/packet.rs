// SPDX-License-Identifier: MPL-2.0
//! Compressed packets as they travel from the read thread to a decode loop.

use crate::domain::media::GroupIndex;

/// What a packet carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketKind {
    /// Real compressed payload.
    Data,
    /// Sentinel that resets the decoder and opens a new epoch.
    Flush,
    /// End-of-stream sentinel; lets the decoder drain.
    Null,
}

/// A compressed data unit owned by exactly one queue at a time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub kind: PacketKind,
    pub stream_index: usize,
    /// Presentation timestamp in stream time-base units.
    pub pts: Option<i64>,
    /// Decode timestamp in stream time-base units.
    pub dts: Option<i64>,
    /// Duration in stream time-base units.
    pub duration: i64,
    /// Byte offset in the input, if known.
    pub position: Option<i64>,
    pub data: Vec<u8>,
    pub is_key: bool,
    /// Epoch stamped at enqueue time.
    pub group_index: GroupIndex,
}

impl Packet {
    /// Creates a data packet.
    #[must_use]
    pub fn new(stream_index: usize, data: Vec<u8>) -> Self {
        Self {
            kind: PacketKind::Data,
            stream_index,
            pts: None,
            dts: None,
            duration: 0,
            position: None,
            data,
            is_key: false,
            group_index: 0,
        }
    }

    /// Creates a flush marker.
    #[must_use]
    pub fn flush() -> Self {
        Self {
            kind: PacketKind::Flush,
            ..Self::new(usize::MAX, Vec::new())
        }
    }

    /// Creates an end-of-stream marker for `stream_index`.
    #[must_use]
    pub fn null(stream_index: usize) -> Self {
        Self {
            kind: PacketKind::Null,
            ..Self::new(stream_index, Vec::new())
        }
    }

    #[must_use]
    pub fn with_pts(mut self, pts: i64) -> Self {
        self.pts = Some(pts);
        self
    }

    #[must_use]
    pub fn with_duration(mut self, duration: i64) -> Self {
        self.duration = duration;
        self
    }

    #[must_use]
    pub fn with_position(mut self, position: i64) -> Self {
        self.position = Some(position);
        self
    }

    #[must_use]
    pub fn is_flush(&self) -> bool {
        self.kind == PacketKind::Flush
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        self.kind == PacketKind::Null
    }

    /// Bytes accounted against the queue.
    #[must_use]
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Timestamp used for play-range checks: pts, else dts.
    #[must_use]
    pub fn timestamp(&self) -> Option<i64> {
        self.pts.or(self.dts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn markers_carry_no_payload() {
        assert!(Packet::flush().is_flush());
        assert_eq!(Packet::flush().size(), 0);
        let null = Packet::null(2);
        assert!(null.is_null());
        assert_eq!(null.stream_index, 2);
    }

    #[test]
    fn timestamp_prefers_pts() {
        let mut packet = Packet::new(0, vec![1, 2, 3]).with_pts(40);
        packet.dts = Some(20);
        assert_eq!(packet.timestamp(), Some(40));
        packet.pts = None;
        assert_eq!(packet.timestamp(), Some(20));
        assert_eq!(packet.size(), 3);
    }
}
