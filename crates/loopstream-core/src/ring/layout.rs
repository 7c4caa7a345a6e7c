//! Frame addressing for the two-deck sample region

use crate::types::{Deck, CHANNELS, NUM_DECKS};

/// Geometry of the shared sample region
///
/// One contiguous region of interleaved samples split into two equal halves,
/// one per deck. Frame counters are monotonic; wrapping into the physical
/// half happens only here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RingLayout {
    /// Samples in one deck half
    half_size: usize,
    /// Whole frames that fit in one half (`floor(half_size / 2)`)
    max_frames: u32,
}

impl RingLayout {
    /// Layout for a region of `total_samples` samples
    ///
    /// Odd leftovers (a half with an odd sample count, or an odd total) are
    /// never addressed.
    pub fn from_total_samples(total_samples: usize) -> Self {
        let half_size = total_samples / NUM_DECKS;
        let max_frames = (half_size / CHANNELS).min(u32::MAX as usize) as u32;
        Self {
            half_size,
            max_frames,
        }
    }

    /// Layout holding exactly `frames` frames per deck
    pub fn with_frames_per_deck(frames: u32) -> Self {
        Self::from_total_samples(frames as usize * CHANNELS * NUM_DECKS)
    }

    /// Frames per deck half
    #[inline]
    pub fn max_frames(&self) -> u32 {
        self.max_frames
    }

    /// Samples per deck half
    #[inline]
    pub fn half_size(&self) -> usize {
        self.half_size
    }

    /// Total samples in the region
    #[inline]
    pub fn total_samples(&self) -> usize {
        self.half_size * NUM_DECKS
    }

    /// Position of a monotonic frame counter inside a deck half
    #[inline]
    pub fn local_frame(&self, frame: u32) -> u32 {
        frame % self.max_frames
    }

    /// Sample offset of the left channel of `frame` on `deck`
    ///
    /// Always stereo-pair aligned and inside the deck's half.
    #[inline]
    pub fn sample_offset(&self, deck: Deck, frame: u32) -> usize {
        deck.index() * self.half_size + self.local_frame(frame) as usize * CHANNELS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_max_frames_floors_half() {
        let layout = RingLayout::from_total_samples(22);
        assert_eq!(layout.half_size(), 11);
        assert_eq!(layout.max_frames(), 5);

        let layout = RingLayout::with_frames_per_deck(1000);
        assert_eq!(layout.max_frames(), 1000);
        assert_eq!(layout.total_samples(), 4000);
    }

    #[test]
    fn test_offsets_stay_in_deck_half() {
        let layout = RingLayout::from_total_samples(22);
        for frame in 0..50u32 {
            let a = layout.sample_offset(Deck::A, frame);
            let b = layout.sample_offset(Deck::B, frame);
            assert!(a + 1 < layout.half_size());
            assert!(b >= layout.half_size() && b + 1 < layout.total_samples());
            assert_eq!(a % 2, 0);
            assert_eq!((b - layout.half_size()) % 2, 0);
        }
    }

    #[test]
    fn test_local_frame_wraps() {
        let layout = RingLayout::with_frames_per_deck(100);
        assert_eq!(layout.local_frame(99), 99);
        assert_eq!(layout.local_frame(100), 0);
        assert_eq!(layout.local_frame(250), 50);
        assert_eq!(layout.sample_offset(Deck::B, 101), 200 + 2);
    }
}
