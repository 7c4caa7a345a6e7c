//! Per-deck write/read pointer header
//!
//! Pointers are monotonic 32-bit frame counters shared between the
//! coordinator and the render context without a lock. Each pointer has one
//! normal writer:
//!
//! | Pointer | Normal writer        | Occasional writer               |
//! |---------|----------------------|---------------------------------|
//! | write   | stream writer        | -                               |
//! | read    | render (per quantum) | coordinator (align/skip/seek)   |
//! | played  | render (per quantum) | -                               |
//!
//! `played` counts every frame the render context advanced over. Unlike the
//! read pointer it never jumps: loop wraps, seeks and phase alignment leave
//! it alone.
//!
//! Consistency is eventual: a teleported read pointer becomes visible to the
//! render side on its next load. The write pointer is published with
//! `Release` after the samples it covers, so a reader that loads it with
//! `Acquire` sees those samples.

use std::sync::atomic::{AtomicU32, Ordering};

/// Classified distance between a deck's write and read pointers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerGap {
    /// `0 < write - read <= capacity`
    Buffered(u32),
    /// Reader caught up with (`behind == 0`) or passed the writer
    Underrun { behind: u32 },
    /// Writer is more than a full ring ahead; unread frames were overwritten
    Overrun { buffered: u32 },
}

impl PointerGap {
    /// Classify `write - read` against a ring of `capacity` frames
    ///
    /// Counters wrap at 2^32; the difference is taken modulo 2^32 and read
    /// as signed, so a reader up to 2^31 frames ahead is an underrun.
    pub fn classify(write: u32, read: u32, capacity: u32) -> Self {
        let diff = write.wrapping_sub(read) as i32;
        if diff <= 0 {
            PointerGap::Underrun {
                behind: diff.unsigned_abs(),
            }
        } else if diff as u32 > capacity {
            PointerGap::Overrun {
                buffered: diff as u32,
            }
        } else {
            PointerGap::Buffered(diff as u32)
        }
    }

    /// Frames available to the reader (0 on underrun)
    pub fn buffered_frames(&self) -> u32 {
        match *self {
            PointerGap::Buffered(frames) => frames,
            PointerGap::Underrun { .. } => 0,
            PointerGap::Overrun { buffered } => buffered,
        }
    }
}

/// Write and read pointer for one deck
#[derive(Debug, Default)]
pub struct DeckPointers {
    write: AtomicU32,
    read: AtomicU32,
    played: AtomicU32,
}

impl DeckPointers {
    /// Create pointers at frame zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Current write pointer
    #[inline]
    pub fn current_write(&self) -> u32 {
        self.write.load(Ordering::Acquire)
    }

    /// Current read pointer
    #[inline]
    pub fn current_read(&self) -> u32 {
        self.read.load(Ordering::Relaxed)
    }

    /// Frames advanced over by the render context since creation (wrapping)
    #[inline]
    pub fn played(&self) -> u32 {
        self.played.load(Ordering::Relaxed)
    }

    /// Publish `frames` newly written frames; returns the new write pointer
    #[inline]
    pub fn advance_write(&self, frames: u32) -> u32 {
        self.write
            .fetch_add(frames, Ordering::Release)
            .wrapping_add(frames)
    }

    /// Per-quantum advance by the render context; returns the new read pointer
    #[inline]
    pub fn advance_read(&self, frames: u32) -> u32 {
        self.played.fetch_add(frames, Ordering::Relaxed);
        self.read
            .fetch_add(frames, Ordering::Relaxed)
            .wrapping_add(frames)
    }

    /// Move the read pointer to an arbitrary frame (phase align, skip, loop seek)
    #[inline]
    pub fn teleport_read(&self, frame: u32) {
        self.read.store(frame, Ordering::Relaxed);
    }

    /// Classified write/read distance
    pub fn gap(&self, capacity: u32) -> PointerGap {
        PointerGap::classify(self.current_write(), self.current_read(), capacity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_gap() {
        assert_eq!(PointerGap::classify(200_000, 150_000, 1_000_000), PointerGap::Buffered(50_000));
        assert_eq!(PointerGap::classify(100, 100, 1000), PointerGap::Underrun { behind: 0 });
        assert_eq!(PointerGap::classify(100, 130, 1000), PointerGap::Underrun { behind: 30 });
        assert_eq!(PointerGap::classify(5000, 100, 1000), PointerGap::Overrun { buffered: 4900 });
    }

    #[test]
    fn test_classify_across_counter_wrap() {
        let write = 10u32;
        let read = u32::MAX - 9;
        assert_eq!(PointerGap::classify(write, read, 1000), PointerGap::Buffered(20));
    }

    #[test]
    fn test_pointer_advances() {
        let pointers = DeckPointers::new();
        assert_eq!(pointers.advance_write(480), 480);
        assert_eq!(pointers.advance_write(20), 500);
        assert_eq!(pointers.advance_read(128), 128);
        assert_eq!(pointers.gap(1000), PointerGap::Buffered(372));

        pointers.teleport_read(64);
        assert_eq!(pointers.current_read(), 64);
        assert_eq!(pointers.current_write(), 500);
    }

    #[test]
    fn test_played_ignores_teleports() {
        let pointers = DeckPointers::new();
        pointers.advance_read(100);
        pointers.teleport_read(20);
        pointers.advance_read(50);
        assert_eq!(pointers.current_read(), 70);
        assert_eq!(pointers.played(), 150);

        pointers.teleport_read(5000);
        assert_eq!(pointers.played(), 150);
    }
}
