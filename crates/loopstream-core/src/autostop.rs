//! Loop auto-stop monitor
//!
//! Once a deck has played through a whole loop plus its trailing crossfade,
//! the loop replays buffered content and needs no new generation. The monitor
//! detects that point and tells the coordinator to pause the producer until
//! the loop is cleared.
//!
//! The render context wraps the read pointer back to the loop start, so the
//! wrapped position never gets past the arm-time write pointer. The monitor
//! instead tracks an un-wrapped read position: the read pointer at arm time
//! plus the frames played since (see [`DeckPointers::played`]). It fires once
//! that position is `loop_length + overlap` frames past the arm-time write
//! pointer. Teleports (loop wrap, seek, phase align) do not move it.
//!
//! [`DeckPointers::played`]: crate::ring::DeckPointers::played

use crate::loops::LoopBlendState;
use crate::types::{Deck, NUM_DECKS};

/// Auto-stop state of one deck
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LoopAutoStopState {
    pub armed: bool,
    /// Write pointer when the loop was armed
    pub armed_write_ptr: u32,
    /// Read pointer when the loop was armed
    pub armed_read_ptr: u32,
    /// Played-frame counter when the loop was armed
    pub armed_played: u32,
    pub loop_length_frames: u32,
    pub overlap_frames: u32,
    /// Producer has been paused for this loop
    pub auto_stopped: bool,
}

impl LoopAutoStopState {
    /// Frames the reader must advance past the arm point before stopping
    pub fn threshold_frames(&self) -> u64 {
        self.loop_length_frames as u64 + self.overlap_frames as u64
    }

    /// Un-wrapped read position for a played-frame counter value
    pub fn monotonic_read(&self, played: u32) -> u32 {
        self.armed_read_ptr
            .wrapping_add(played.wrapping_sub(self.armed_played))
    }
}

/// Deck position captured when a loop is armed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ArmPosition {
    pub write: u32,
    pub read: u32,
    pub played: u32,
}

/// Auto-stop monitor for both decks
#[derive(Debug, Default)]
pub struct LoopAutoStopMonitor {
    decks: [LoopAutoStopState; NUM_DECKS],
}

impl LoopAutoStopMonitor {
    /// Create a monitor with nothing armed
    pub fn new() -> Self {
        Self::default()
    }

    /// State of a deck
    pub fn state(&self, deck: Deck) -> &LoopAutoStopState {
        &self.decks[deck.index()]
    }

    /// Whether the deck's loop has silenced the producer
    pub fn is_auto_stopped(&self, deck: Deck) -> bool {
        self.decks[deck.index()].auto_stopped
    }

    /// Arm for a newly configured loop; an inactive loop disarms
    pub fn arm(&mut self, deck: Deck, loop_state: &LoopBlendState, at: ArmPosition) {
        if !loop_state.active {
            self.reset(deck);
            return;
        }
        self.decks[deck.index()] = LoopAutoStopState {
            armed: true,
            armed_write_ptr: at.write,
            armed_read_ptr: at.read,
            armed_played: at.played,
            loop_length_frames: loop_state.length_frames(),
            overlap_frames: loop_state.overlap_frames,
            auto_stopped: false,
        };
    }

    /// Disarm a deck; returns whether it had auto-stopped
    pub fn reset(&mut self, deck: Deck) -> bool {
        let was_stopped = self.decks[deck.index()].auto_stopped;
        self.decks[deck.index()] = LoopAutoStopState::default();
        was_stopped
    }

    /// Check a deck against its played-frame counter
    ///
    /// Returns `true` exactly once, on the tick where the un-wrapped read
    /// position first gets `loop_length + overlap` frames past the arm point.
    pub fn check(&mut self, deck: Deck, played: u32) -> bool {
        let state = &mut self.decks[deck.index()];
        if !state.armed || state.auto_stopped {
            return false;
        }
        // Reader still behind the arm point counts as nothing played
        let past = state
            .monotonic_read(played)
            .wrapping_sub(state.armed_write_ptr) as i32;
        if past > 0 && past as u64 >= state.threshold_frames() {
            state.auto_stopped = true;
            return true;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn active_loop(start: u32, end: u32, overlap: u32) -> LoopBlendState {
        LoopBlendState {
            active: true,
            start_frame: start,
            end_frame: end,
            overlap_frames: overlap,
            ..Default::default()
        }
    }

    fn at(write: u32, read: u32, played: u32) -> ArmPosition {
        ArmPosition {
            write,
            read,
            played,
        }
    }

    #[test]
    fn test_stops_exactly_at_threshold() {
        let mut monitor = LoopAutoStopMonitor::new();
        // W = 500000, L = 24000, O = 6000, reader level with the writer
        monitor.arm(Deck::A, &active_loop(100_000, 124_000, 6000), at(500_000, 500_000, 0));

        assert!(!monitor.check(Deck::A, 0));
        assert!(!monitor.check(Deck::A, 29_999));
        assert!(!monitor.is_auto_stopped(Deck::A));

        assert!(monitor.check(Deck::A, 30_000));
        assert!(monitor.is_auto_stopped(Deck::A));

        // Fires once
        assert!(!monitor.check(Deck::A, 100_000));
        assert!(monitor.is_auto_stopped(Deck::A));
    }

    #[test]
    fn test_buffered_frames_play_out_first() {
        let mut monitor = LoopAutoStopMonitor::new();
        // Reader 2000 frames behind W; played counter already at 70000
        monitor.arm(Deck::B, &active_loop(2000, 4000, 187), at(10_000, 8000, 70_000));

        assert!(!monitor.check(Deck::B, 70_000 + 2000));
        assert!(!monitor.check(Deck::B, 70_000 + 4186));
        assert!(monitor.check(Deck::B, 70_000 + 4187));
    }

    #[test]
    fn test_played_counter_wraps() {
        let mut monitor = LoopAutoStopMonitor::new();
        monitor.arm(Deck::A, &active_loop(0, 1000, 100), at(5000, 5000, u32::MAX - 99));

        assert!(!monitor.check(Deck::A, 999));
        assert!(monitor.check(Deck::A, 1000));
    }

    #[test]
    fn test_unarmed_never_fires() {
        let mut monitor = LoopAutoStopMonitor::new();
        assert!(!monitor.check(Deck::B, u32::MAX / 4));

        monitor.arm(Deck::B, &LoopBlendState::default(), ArmPosition::default());
        assert!(!monitor.state(Deck::B).armed);
        assert!(!monitor.check(Deck::B, 10_000_000));
    }

    #[test]
    fn test_rearm_and_reset() {
        let mut monitor = LoopAutoStopMonitor::new();
        monitor.arm(Deck::A, &active_loop(0, 1000, 100), at(2000, 2000, 0));
        assert!(monitor.check(Deck::A, 1100));

        assert!(monitor.reset(Deck::A));
        assert_eq!(*monitor.state(Deck::A), LoopAutoStopState::default());
        assert!(!monitor.reset(Deck::A));

        monitor.arm(Deck::A, &active_loop(0, 1000, 100), at(5000, 4000, 1100));
        let state = monitor.state(Deck::A);
        assert!(state.armed && !state.auto_stopped);
        assert_eq!(state.armed_write_ptr, 5000);
        assert_eq!(state.monotonic_read(1600), 4500);
        assert_eq!(state.threshold_frames(), 1100);
    }
}
