//! Per-deck musical context owned by the coordinator
//!
//! Tempo, beat-grid offset and user flags live in an explicit [`DeckContext`]
//! that is passed by reference into the configurator, the synchronizer and
//! the controllers.

use crate::types::beat_frames;

/// Musical and user state of one deck
#[derive(Debug, Clone, PartialEq)]
pub struct DeckContext {
    /// Natural tempo of the generated audio (0.0 = unknown)
    pub bpm: f64,
    /// Beat-grid phase offset in seconds
    pub offset_seconds: f64,
    /// Producer paused by the user; suppresses backpressure and auto-stop resumes
    pub manual_pause: bool,
    /// Last playback-speed ratio forwarded to the render side
    pub speed_ratio: f64,
}

impl Default for DeckContext {
    fn default() -> Self {
        Self {
            bpm: 0.0,
            offset_seconds: 0.0,
            manual_pause: false,
            speed_ratio: 1.0,
        }
    }
}

impl DeckContext {
    /// Beat grid of this deck, or `None` when the tempo is unset
    pub fn grid(&self, sample_rate: u32, min_bpm: f64) -> Option<BeatGrid> {
        if self.bpm.is_finite() && self.bpm >= min_bpm {
            Some(BeatGrid::new(self.bpm, self.offset_seconds, sample_rate))
        } else {
            None
        }
    }
}

/// Sample positions of integer beats from a deck's musical offset
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BeatGrid {
    /// Frames per beat
    pub beat_frames: f64,
    /// Frame of beat zero (`offset_seconds * sample_rate`)
    pub anchor: f64,
}

impl BeatGrid {
    /// Grid for a tempo and offset
    pub fn new(bpm: f64, offset_seconds: f64, sample_rate: u32) -> Self {
        Self {
            beat_frames: beat_frames(bpm, sample_rate),
            anchor: offset_seconds * sample_rate as f64,
        }
    }

    /// Nearest grid position to `frame`
    pub fn snap(&self, frame: f64) -> f64 {
        let n = ((frame - self.anchor) / self.beat_frames).round();
        self.anchor + n * self.beat_frames
    }

    /// Frames per bar of `beats_per_bar` beats
    pub fn bar_frames(&self, beats_per_bar: u32) -> f64 {
        self.beat_frames * beats_per_bar as f64
    }

    /// Distance from `frame` to the nearest beat, in frames
    pub fn distance_to_beat(&self, frame: f64) -> f64 {
        let phase = (frame - self.anchor).rem_euclid(self.beat_frames);
        phase.min(self.beat_frames - phase)
    }
}
