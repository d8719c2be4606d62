//! Outbound backlog
//!
//! Holds frames produced while no connection is open. The queue belongs to
//! the client, not to a connection, so it survives reconnects. Frames leave
//! strictly in arrival order.

use crate::traits::Frame;
use std::collections::VecDeque;

/// Default backlog bound; past it the oldest frame is evicted
pub const DEFAULT_QUEUE_CAPACITY: usize = 10_000;

/// A queued frame and the sequence number it was given on arrival
#[derive(Debug)]
struct Queued {
    seq: u64,
    frame: Frame,
}

/// Frames stay queued while they are being written: the writer reads the
/// head with [`SendQueue::front`] and takes it off with
/// [`SendQueue::remove`] only once the write has gone through.
#[derive(Debug)]
pub struct SendQueue {
    frames: VecDeque<Queued>,
    capacity: Option<usize>,
    next_seq: u64,
}

impl SendQueue {
    /// `None` keeps every frame until it is delivered
    pub fn new(capacity: Option<usize>) -> Self {
        Self {
            frames: VecDeque::new(),
            capacity,
            next_seq: 0,
        }
    }

    /// Append a frame, returning the evicted oldest frame when full
    pub fn push(&mut self, frame: Frame) -> Option<Frame> {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.frames.push_back(Queued { seq, frame });

        match self.capacity {
            Some(capacity) if self.frames.len() > capacity => {
                self.frames.pop_front().map(|queued| queued.frame)
            }
            _ => None,
        }
    }

    /// The oldest frame and its sequence number, left in place
    pub fn front(&self) -> Option<(u64, &Frame)> {
        self.frames.front().map(|queued| (queued.seq, &queued.frame))
    }

    /// Remove the head if it is still the frame numbered `seq`
    ///
    /// Returns `None` when that frame has already left the queue, e.g.
    /// evicted by an overflowing push while it was being written.
    pub fn remove(&mut self, seq: u64) -> Option<Frame> {
        match self.frames.front() {
            Some(head) if head.seq == seq => self.frames.pop_front().map(|queued| queued.frame),
            _ => None,
        }
    }

    /// Take the oldest frame
    pub fn pop(&mut self) -> Option<Frame> {
        self.frames.pop_front().map(|queued| queued.frame)
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = &Frame> {
        self.frames.iter().map(|queued| &queued.frame)
    }
}

impl Default for SendQueue {
    fn default() -> Self {
        Self::new(Some(DEFAULT_QUEUE_CAPACITY))
    }
}
