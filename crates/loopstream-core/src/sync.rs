//! Phase and tempo synchronization between the two decks
//!
//! Tempo sync is a plain speed ratio forwarded to the render side. Phase sync
//! equalizes each deck's position *within its current bar*: the absolute read
//! positions of the decks stay unrelated, only their bar phase matches. This
//! works across different tempos and beat-grid offsets.

use crate::config::SyncConfig;
use crate::context::DeckContext;
use crate::ring::SharedRing;
use crate::types::{Deck, NUM_DECKS};

/// Outcome of a phase alignment
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhaseAlignment {
    /// Read pointer before the teleport
    pub previous: u32,
    /// Read pointer written
    pub target: u32,
    /// Bar phase (0..1) copied from the other deck
    pub bar_progress: f64,
}

/// Playback-speed ratio that brings a deck from `natural_bpm` to `target_bpm`
///
/// Returns `None` when either tempo is below `config.min_bpm`. The ratio is
/// clamped to the configured speed range.
pub fn tempo_ratio(natural_bpm: f64, target_bpm: f64, config: &SyncConfig) -> Option<f64> {
    if !(natural_bpm >= config.min_bpm && target_bpm >= config.min_bpm) {
        return None;
    }
    Some(clamp_ratio(target_bpm / natural_bpm, config))
}

/// Clamp a speed ratio to the configured range
pub fn clamp_ratio(ratio: f64, config: &SyncConfig) -> f64 {
    ratio.clamp(config.min_speed_ratio, config.max_speed_ratio)
}

/// Bar phase (0..1) of `frame` for a bar of `bar_frames` anchored at `offset_frames`
pub fn bar_phase(frame: f64, offset_frames: f64, bar_frames: f64) -> f64 {
    (frame - offset_frames).rem_euclid(bar_frames) / bar_frames
}

/// Teleport `deck`'s read pointer so its bar phase matches the other deck's
///
/// Skipped (returns `None`) when either deck has no valid tempo.
pub fn align_phase(
    deck: Deck,
    ring: &SharedRing,
    contexts: &[DeckContext; NUM_DECKS],
    sample_rate: u32,
    config: &SyncConfig,
) -> Option<PhaseAlignment> {
    let other = deck.other();
    let self_grid = contexts[deck.index()].grid(sample_rate, config.min_bpm)?;
    let other_grid = contexts[other.index()].grid(sample_rate, config.min_bpm)?;

    let self_bar = self_grid.bar_frames(config.beats_per_bar);
    let other_bar = other_grid.bar_frames(config.beats_per_bar);

    let other_read = ring.current_read(other) as f64;
    let bar_progress = bar_phase(other_read, other_grid.anchor, other_bar);

    let previous = ring.current_read(deck);
    let self_read = previous as f64;
    let self_bar_start = self_read - (self_read - self_grid.anchor).rem_euclid(self_bar);
    let target = (self_bar_start + bar_progress * self_bar).round().max(0.0) as u32;

    ring.pointers(deck).teleport_read(target);

    Some(PhaseAlignment {
        previous,
        target,
        bar_progress,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ring::RingLayout;

    fn contexts(a: (f64, f64), b: (f64, f64)) -> [DeckContext; NUM_DECKS] {
        [
            DeckContext {
                bpm: a.0,
                offset_seconds: a.1,
                ..Default::default()
            },
            DeckContext {
                bpm: b.0,
                offset_seconds: b.1,
                ..Default::default()
            },
        ]
    }

    #[test]
    fn test_tempo_ratio() {
        let config = SyncConfig::default();
        assert_eq!(tempo_ratio(120.0, 128.0, &config), Some(128.0 / 120.0));
        assert_eq!(tempo_ratio(60.0, 240.0, &config), Some(2.0));
        assert_eq!(tempo_ratio(0.0, 128.0, &config), None);
        assert_eq!(tempo_ratio(128.0, 0.5, &config), None);
    }

    #[test]
    fn test_align_phase_matches_bar_progress() {
        let config = SyncConfig::default();
        let ring = SharedRing::new(RingLayout::with_frames_per_deck(48000 * 30)).unwrap();
        let ctx = contexts((120.0, 0.0), (128.0, 0.0));

        ring.pointers(Deck::A).teleport_read(1_000_000);
        ring.pointers(Deck::B).teleport_read(777_777);

        let result = align_phase(Deck::B, &ring, &ctx, 48000, &config).unwrap();
        assert_eq!(result.previous, 777_777);

        let phase_a = bar_phase(ring.current_read(Deck::A) as f64, 0.0, 96_000.0);
        let phase_b = bar_phase(ring.current_read(Deck::B) as f64, 0.0, 90_000.0);
        assert!((phase_a - phase_b).abs() < 1e-4, "{} vs {}", phase_a, phase_b);

        // Stays within the deck's current bar
        assert!(result.target >= 720_000 && result.target < 810_000);
        // The reference deck is untouched
        assert_eq!(ring.current_read(Deck::A), 1_000_000);
    }

    #[test]
    fn test_align_phase_with_grid_offsets() {
        let config = SyncConfig::default();
        let ring = SharedRing::new(RingLayout::with_frames_per_deck(48000 * 30)).unwrap();
        let ctx = contexts((120.0, 0.25), (128.0, 0.1));

        ring.pointers(Deck::A).teleport_read(523_456);
        ring.pointers(Deck::B).teleport_read(612_345);

        align_phase(Deck::A, &ring, &ctx, 48000, &config).unwrap();

        let phase_a = bar_phase(ring.current_read(Deck::A) as f64, 12_000.0, 96_000.0);
        let phase_b = bar_phase(ring.current_read(Deck::B) as f64, 4_800.0, 90_000.0);
        assert!((phase_a - phase_b).abs() < 1e-4, "{} vs {}", phase_a, phase_b);
    }

    #[test]
    fn test_align_phase_skips_without_tempo() {
        let config = SyncConfig::default();
        let ring = SharedRing::new(RingLayout::with_frames_per_deck(4800)).unwrap();
        let ctx = contexts((120.0, 0.0), (0.0, 0.0));
        ring.pointers(Deck::A).teleport_read(1234);

        assert!(align_phase(Deck::A, &ring, &ctx, 48000, &config).is_none());
        assert_eq!(ring.current_read(Deck::A), 1234);
    }
}
