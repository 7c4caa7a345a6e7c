//! Common types for Loopstream
//!
//! Sample and frame types shared by the ring buffer, the stream writer and
//! the render side, plus the deck identifier used to index every per-deck
//! array in the coordinator.

use serde::{Deserialize, Serialize};

/// Default sample rate of the upstream producer (48kHz)
pub const SAMPLE_RATE: u32 = 48000;

/// Number of decks sharing the ring buffer
pub const NUM_DECKS: usize = 2;

/// Samples per frame (interleaved left, right)
pub const CHANNELS: usize = 2;

/// Beats per musical bar (4/4 time)
pub const BEATS_PER_BAR: u32 = 4;

/// Audio sample type
pub type Sample = f32;

/// Deck identifier
///
/// Both decks run identical logic over mirrored data; everything per-deck is
/// stored in `[T; NUM_DECKS]` arrays indexed by [`Deck::index`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(usize)]
pub enum Deck {
    A = 0,
    B = 1,
}

impl Deck {
    /// Both decks in index order
    pub const ALL: [Deck; NUM_DECKS] = [Deck::A, Deck::B];

    /// Convert from index (0-1) to Deck
    pub fn from_index(idx: usize) -> Option<Self> {
        match idx {
            0 => Some(Deck::A),
            1 => Some(Deck::B),
            _ => None,
        }
    }

    /// Array index for this deck
    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    /// The opposite deck (phase reference for alignment)
    #[inline]
    pub fn other(self) -> Self {
        match self {
            Deck::A => Deck::B,
            Deck::B => Deck::A,
        }
    }

    /// Display name
    pub fn name(&self) -> &'static str {
        match self {
            Deck::A => "A",
            Deck::B => "B",
        }
    }
}

impl std::fmt::Display for Deck {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "deck {}", self.name())
    }
}

/// A single stereo frame (left and right channels)
///
/// Uses `#[repr(C)]` so `&[StereoSample]` and interleaved `&[f32]` are the
/// same memory; incoming producer chunks are viewed as frames with bytemuck
/// instead of being copied.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct StereoSample {
    pub left: Sample,
    pub right: Sample,
}

impl StereoSample {
    /// Create a new stereo sample
    #[inline]
    pub fn new(left: Sample, right: Sample) -> Self {
        Self { left, right }
    }

    /// Create a silent stereo sample
    #[inline]
    pub fn silence() -> Self {
        Self::default()
    }

    /// Get the peak amplitude (max of abs(left), abs(right))
    #[inline]
    pub fn peak(&self) -> Sample {
        self.left.abs().max(self.right.abs())
    }

    /// View interleaved samples `[L, R, L, R, ...]` as frames
    ///
    /// Returns `None` when the slice does not hold a whole number of frames.
    pub fn frames_from_interleaved(interleaved: &[Sample]) -> Option<&[StereoSample]> {
        if interleaved.len() % CHANNELS != 0 {
            return None;
        }
        Some(bytemuck::cast_slice(interleaved))
    }
}

impl std::ops::Add for StereoSample {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Self {
            left: self.left + other.left,
            right: self.right + other.right,
        }
    }
}

impl std::ops::Mul<Sample> for StereoSample {
    type Output = Self;

    #[inline]
    fn mul(self, factor: Sample) -> Self {
        Self {
            left: self.left * factor,
            right: self.right * factor,
        }
    }
}

/// Frames per beat at the given tempo
#[inline]
pub fn beat_frames(bpm: f64, sample_rate: u32) -> f64 {
    sample_rate as f64 * 60.0 / bpm
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stereo_sample_operations() {
        let a = StereoSample::new(1.0, 2.0);
        let b = StereoSample::new(0.5, 0.5);

        let sum = a + b;
        assert_eq!(sum.left, 1.5);
        assert_eq!(sum.right, 2.5);

        let scaled = a * 0.5;
        assert_eq!(scaled.left, 0.5);
        assert_eq!(scaled.right, 1.0);
        assert_eq!(StereoSample::new(-3.0, 2.0).peak(), 3.0);
    }

    #[test]
    fn test_frames_from_interleaved() {
        let interleaved = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let frames = StereoSample::frames_from_interleaved(&interleaved).unwrap();

        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0], StereoSample::new(1.0, 2.0));
        assert_eq!(frames[2], StereoSample::new(5.0, 6.0));

        assert!(StereoSample::frames_from_interleaved(&[1.0, 2.0, 3.0]).is_none());
    }

    #[test]
    fn test_deck_enumeration() {
        assert_eq!(Deck::ALL.len(), NUM_DECKS);
        assert_eq!(Deck::A.other(), Deck::B);
        assert_eq!(Deck::B.other(), Deck::A);
        assert_eq!(Deck::from_index(1), Some(Deck::B));
        assert_eq!(Deck::from_index(2), None);
        assert_eq!(Deck::B.to_string(), "deck B");
    }

    #[test]
    fn test_beat_frames() {
        assert_eq!(beat_frames(120.0, 48000), 24000.0);
        assert_eq!(beat_frames(128.0, 48000), 22500.0);
    }
}
