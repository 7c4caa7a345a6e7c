//! Stream writer and loop blend mixer
//!
//! Appends producer chunks to a deck's half of the ring, wrapping circularly.
//! While a loop with a crossfade is configured, frames landing inside the
//! overlap window at the loop start are mixed with the sample already resident
//! at that address (the tail of the previous pass) using an equal-power
//! quarter-sine law:
//!
//! ```text
//! progress = distance / (overlap - 1)
//! new_gain = sin(progress * π/2) * alignment
//! old_gain = sqrt(max(0, 1 - new_gain²))
//! out      = old * old_gain + new * new_gain
//! ```
//!
//! The alignment quality is measured once when the writer enters the overlap
//! window and held for the whole pass, so the gain never steps mid-seam.

use std::f64::consts::FRAC_PI_2;
use std::sync::Arc;

use crate::context::BeatGrid;
use crate::error::{StreamError, StreamResult};
use crate::loops::LoopBlendState;
use crate::ring::SharedRing;
use crate::types::{Deck, Sample, StereoSample, NUM_DECKS};

/// Equal-power crossfade gains `(new, old)` for a seam position
///
/// `progress` is clamped to `0..=1`; `alignment` scales the incoming side.
/// `new² + old² <= 1` for every input.
#[inline]
pub fn crossfade_gains(progress: f64, alignment: f64) -> (Sample, Sample) {
    let theta = progress.clamp(0.0, 1.0) * FRAC_PI_2;
    let new_gain = theta.sin() * alignment.clamp(0.0, 1.0);
    let old_gain = (1.0 - new_gain * new_gain).max(0.0).sqrt();
    (new_gain as Sample, old_gain as Sample)
}

/// Alignment quality of an overlap entry at absolute frame `frame`
///
/// Triangular falloff: 1.0 on a beat of the loop's grid, decreasing linearly
/// to zero at `beat_tolerance_frames`, floored at `min_alignment`. Loops
/// without a grid always count as aligned.
pub fn alignment_quality(frame: f64, state: &LoopBlendState, min_alignment: f64) -> f64 {
    if state.beat_frames <= 0.0 || state.beat_tolerance_frames <= 0.0 {
        return 1.0;
    }
    let grid = BeatGrid {
        beat_frames: state.beat_frames,
        anchor: state.offset_frames,
    };
    let distance = grid.distance_to_beat(frame);
    (1.0 - distance / state.beat_tolerance_frames).max(min_alignment)
}

/// Producer-side writer for both decks
pub struct StreamWriter {
    ring: Arc<SharedRing>,
    blends: [LoopBlendState; NUM_DECKS],
    min_alignment: f64,
}

impl StreamWriter {
    /// Create a writer over a shared ring
    pub fn new(ring: Arc<SharedRing>, min_alignment: f64) -> Self {
        Self {
            ring,
            blends: [LoopBlendState::default(); NUM_DECKS],
            min_alignment,
        }
    }

    /// Loop blend state of a deck
    pub fn loop_state(&self, deck: Deck) -> &LoopBlendState {
        &self.blends[deck.index()]
    }

    /// Replace a deck's loop blend state
    pub fn set_loop(&mut self, deck: Deck, state: LoopBlendState) {
        self.blends[deck.index()] = state;
    }

    /// Drop a deck's loop blend state
    pub fn clear_loop(&mut self, deck: Deck) {
        self.blends[deck.index()] = LoopBlendState::default();
    }

    /// Append an interleaved stereo chunk to a deck
    ///
    /// Returns the number of frames written. A chunk holding a partial frame is
    /// rejected before anything is written.
    pub fn push_chunk(&mut self, deck: Deck, interleaved: &[Sample]) -> StreamResult<u32> {
        let frames = StereoSample::frames_from_interleaved(interleaved).ok_or(
            StreamError::MalformedChunk {
                deck,
                samples: interleaved.len(),
            },
        )?;

        let pointers = self.ring.pointers(deck);
        let write = pointers.current_write();
        let max_frames = self.ring.capacity() as u64;
        let state = &mut self.blends[deck.index()];
        let local_start = self.ring.layout().local_frame(state.start_frame) as u64;

        for (i, &incoming) in frames.iter().enumerate() {
            let frame = write.wrapping_add(i as u32);

            if !state.blends() {
                self.ring.store_frame(deck, frame, incoming);
                continue;
            }

            let local = self.ring.layout().local_frame(frame) as u64;
            let distance = (local + max_frames - local_start) % max_frames;
            let overlap = state.overlap_frames as u64;

            if distance >= overlap {
                state.in_overlap = false;
                self.ring.store_frame(deck, frame, incoming);
                continue;
            }

            if !state.in_overlap {
                state.in_overlap = true;
                state.overlap_alignment = alignment_quality(frame as f64, state, self.min_alignment);
                log::debug!(
                    "StreamWriter: {} entered loop overlap at frame {} (alignment {:.2})",
                    deck,
                    frame,
                    state.overlap_alignment
                );
            }

            let progress = if overlap > 1 {
                distance as f64 / (overlap - 1) as f64
            } else {
                1.0
            };
            let (new_gain, old_gain) = crossfade_gains(progress, state.overlap_alignment);
            let resident = self.ring.sample_at(deck, frame);
            self.ring
                .store_frame(deck, frame, resident * old_gain + incoming * new_gain);
        }

        let written = frames.len() as u32;
        pointers.advance_write(written);
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ring::RingLayout;

    fn writer(frames_per_deck: u32) -> (StreamWriter, Arc<SharedRing>) {
        let ring = Arc::new(SharedRing::new(RingLayout::with_frames_per_deck(frames_per_deck)).unwrap());
        (StreamWriter::new(Arc::clone(&ring), 0.35), ring)
    }

    fn constant_chunk(frames: usize, value: Sample) -> Vec<Sample> {
        vec![value; frames * 2]
    }

    #[test]
    fn test_pass_through_without_loop() {
        let (mut writer, ring) = writer(16);
        let chunk: Vec<Sample> = (0..20).map(|i| i as Sample).collect();

        assert_eq!(writer.push_chunk(Deck::A, &chunk).unwrap(), 10);
        assert_eq!(ring.current_write(Deck::A), 10);
        assert_eq!(ring.current_write(Deck::B), 0);
        assert_eq!(ring.sample_at(Deck::A, 3), StereoSample::new(6.0, 7.0));
    }

    #[test]
    fn test_write_wraps_circularly() {
        let (mut writer, ring) = writer(8);
        writer.push_chunk(Deck::B, &constant_chunk(6, 1.0)).unwrap();
        writer.push_chunk(Deck::B, &constant_chunk(4, 2.0)).unwrap();

        assert_eq!(ring.current_write(Deck::B), 10);
        // frames 8 and 9 landed on local 0 and 1
        assert_eq!(ring.sample_at(Deck::B, 0), StereoSample::new(2.0, 2.0));
        assert_eq!(ring.sample_at(Deck::B, 1), StereoSample::new(2.0, 2.0));
        assert_eq!(ring.sample_at(Deck::B, 2), StereoSample::new(1.0, 1.0));
    }

    #[test]
    fn test_malformed_chunk_rejected() {
        let (mut writer, ring) = writer(8);
        let err = writer.push_chunk(Deck::A, &[0.1, 0.2, 0.3]).unwrap_err();
        assert_eq!(err, StreamError::MalformedChunk { deck: Deck::A, samples: 3 });
        assert_eq!(ring.current_write(Deck::A), 0);
    }

    #[test]
    fn test_zero_overlap_is_pass_through() {
        let (mut writer, ring) = writer(8);
        writer.push_chunk(Deck::A, &constant_chunk(8, 1.0)).unwrap();
        writer.set_loop(
            Deck::A,
            LoopBlendState {
                active: true,
                start_frame: 0,
                end_frame: 4,
                overlap_frames: 0,
                ..Default::default()
            },
        );
        writer.push_chunk(Deck::A, &constant_chunk(8, 0.5)).unwrap();
        for frame in 0..8 {
            assert_eq!(ring.sample_at(Deck::A, frame), StereoSample::new(0.5, 0.5));
        }
    }

    #[test]
    fn test_overlap_blends_with_resident() {
        let (mut writer, ring) = writer(16);
        writer.push_chunk(Deck::A, &constant_chunk(16, 1.0)).unwrap();
        writer.set_loop(
            Deck::A,
            LoopBlendState {
                active: true,
                start_frame: 4,
                end_frame: 12,
                overlap_frames: 5,
                ..Default::default()
            },
        );

        // Second lap writes silence; frames 20..24 map onto local 4..8
        writer.push_chunk(Deck::A, &constant_chunk(16, 0.0)).unwrap();

        // Start of the seam keeps the resident sample at full gain
        assert!((ring.sample_at(Deck::A, 4).left - 1.0).abs() < 1e-6);
        // Resident gain falls along the quarter-sine
        let mid = ring.sample_at(Deck::A, 6).left;
        let (_, old_gain) = crossfade_gains(0.5, 1.0);
        assert!((mid - old_gain).abs() < 1e-6);
        // Seam end is all new material
        assert!(ring.sample_at(Deck::A, 8).left.abs() < 1e-6);
        // Outside the window the incoming chunk is written verbatim
        assert_eq!(ring.sample_at(Deck::A, 9), StereoSample::silence());
        assert_eq!(ring.sample_at(Deck::A, 3), StereoSample::silence());
        assert!(!writer.loop_state(Deck::A).in_overlap);
    }

    #[test]
    fn test_alignment_snapshot_held_across_chunks() {
        let (mut writer, ring) = writer(64);
        writer.push_chunk(Deck::A, &constant_chunk(64, 0.0)).unwrap();
        writer.set_loop(
            Deck::A,
            LoopBlendState {
                active: true,
                start_frame: 10,
                end_frame: 42,
                overlap_frames: 8,
                beat_frames: 16.0,
                beat_tolerance_frames: 4.0,
                offset_frames: 0.0,
                ..Default::default()
            },
        );

        // Frame 74 (local 10) is 6 frames from the nearest beat: beyond tolerance
        writer.push_chunk(Deck::A, &constant_chunk(12, 1.0)).unwrap();
        assert!(writer.loop_state(Deck::A).in_overlap);
        assert!((writer.loop_state(Deck::A).overlap_alignment - 0.35).abs() < 1e-9);

        writer.push_chunk(Deck::A, &constant_chunk(6, 1.0)).unwrap();
        assert!((writer.loop_state(Deck::A).overlap_alignment - 0.35).abs() < 1e-9);

        // Last overlap frame: new gain capped by the alignment snapshot
        let (new_gain, old_gain) = crossfade_gains(1.0, 0.35);
        let seam_end = ring.sample_at(Deck::A, 17).left;
        assert!((seam_end - new_gain).abs() < 1e-6);
        assert!(old_gain > 0.9);
    }

    #[test]
    fn test_equal_power_never_amplifies() {
        for p in 0..=20 {
            for q in 0..=10 {
                let (new_gain, old_gain) = crossfade_gains(p as f64 / 20.0, q as f64 / 10.0);
                assert!(new_gain * new_gain + old_gain * old_gain <= 1.0 + 1e-6);
                assert!(new_gain >= 0.0 && old_gain >= 0.0);
            }
        }
        let (new_gain, old_gain) = crossfade_gains(0.0, 1.0);
        assert_eq!((new_gain, old_gain), (0.0, 1.0));
    }

    #[test]
    fn test_alignment_quality_falloff() {
        let state = LoopBlendState {
            active: true,
            beat_frames: 24000.0,
            beat_tolerance_frames: 3000.0,
            offset_frames: 0.0,
            ..Default::default()
        };
        assert_eq!(alignment_quality(48_000.0, &state, 0.35), 1.0);
        assert!((alignment_quality(49_500.0, &state, 0.35) - 0.5).abs() < 1e-9);
        assert_eq!(alignment_quality(60_000.0, &state, 0.35), 0.35);

        let ungridded = LoopBlendState::default();
        assert_eq!(alignment_quality(12_345.0, &ungridded, 0.35), 1.0);
    }
}
