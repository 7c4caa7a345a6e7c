//! Buffer health controller
//!
//! Periodically compares each deck's buffered depth with two thresholds and
//! decides whether the upstream producer should run. The thresholds differ
//! (hysteresis) so the producer does not flap around a single level:
//!
//! - above `pause_above_seconds` and outside the burst window: pause
//! - below `resume_below_seconds`, or inside the burst window: resume
//! - in between: keep the previous decision
//!
//! The burst window is a grace period after a prompt/context change. A fresh
//! request has to reach the buffer before anything else is queued behind it,
//! so pausing is suppressed while it lasts.

use std::time::Instant;

use crate::config::HealthConfig;
use crate::types::{Deck, NUM_DECKS};

/// Health state of one deck
#[derive(Debug, Clone, Default)]
pub struct BufferHealth {
    /// Smoothed buffered seconds (`None` until the first measurement)
    pub smoothed_seconds: Option<f64>,
    /// Controller's current decision
    pub is_paused: bool,
    /// Time of the last prompt/context change
    pub last_context_change: Option<Instant>,
}

/// Result of one controller evaluation for a deck
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HealthReport {
    pub deck: Deck,
    /// Raw `write - read` distance (0 on underrun)
    pub buffered_frames: u32,
    /// Smoothed buffered seconds
    pub buffered_seconds: f64,
    /// Smoothed depth relative to the target, in percent
    pub fill_percent: f64,
    /// Whether the producer should be paused
    pub paused: bool,
    /// Decision differs from the previous tick
    pub changed: bool,
    /// Deck is inside its burst window
    pub in_burst_window: bool,
    /// Controller was overridden (manual pause or auto-stopped loop)
    pub suppressed: bool,
}

/// Hysteresis backpressure controller for both decks
pub struct BufferHealthController {
    config: HealthConfig,
    sample_rate: u32,
    decks: [BufferHealth; NUM_DECKS],
}

impl BufferHealthController {
    /// Create a controller; thresholds are assumed validated
    pub fn new(config: HealthConfig, sample_rate: u32) -> Self {
        Self {
            config,
            sample_rate,
            decks: std::array::from_fn(|_| BufferHealth::default()),
        }
    }

    /// Health state of a deck
    pub fn state(&self, deck: Deck) -> &BufferHealth {
        &self.decks[deck.index()]
    }

    /// Whether the controller currently wants the deck's producer paused
    pub fn is_paused(&self, deck: Deck) -> bool {
        self.decks[deck.index()].is_paused
    }

    /// Record a prompt/context change, opening the burst window
    pub fn mark_context_change(&mut self, deck: Deck, now: Instant) {
        self.decks[deck.index()].last_context_change = Some(now);
    }

    /// Whether the deck is inside its burst window at `now`
    pub fn in_burst_window(&self, deck: Deck, now: Instant) -> bool {
        self.decks[deck.index()]
            .last_context_change
            .map(|at| now.saturating_duration_since(at) < self.config.burst_window())
            .unwrap_or(false)
    }

    /// Forget smoothing and decisions for a deck (buffer cleared)
    pub fn reset(&mut self, deck: Deck) {
        let last_context_change = self.decks[deck.index()].last_context_change;
        self.decks[deck.index()] = BufferHealth {
            last_context_change,
            ..Default::default()
        };
    }

    /// Evaluate one deck
    ///
    /// With `suppressed` set the smoothed estimate is still updated and
    /// reported, but the pause decision is left untouched.
    pub fn evaluate(
        &mut self,
        deck: Deck,
        buffered_frames: u32,
        now: Instant,
        suppressed: bool,
    ) -> HealthReport {
        let in_burst_window = self.in_burst_window(deck, now);
        let raw_seconds = buffered_frames as f64 / self.sample_rate as f64;
        let alpha = self.config.smoothing;

        let state = &mut self.decks[deck.index()];
        let smoothed = match state.smoothed_seconds {
            Some(previous) => previous + alpha * (raw_seconds - previous),
            None => raw_seconds,
        };
        state.smoothed_seconds = Some(smoothed);

        let was_paused = state.is_paused;
        if !suppressed {
            if smoothed > self.config.pause_above_seconds && !in_burst_window {
                state.is_paused = true;
            } else if smoothed < self.config.resume_below_seconds || in_burst_window {
                state.is_paused = false;
            }
        }

        let fill_percent = if self.config.target_seconds > 0.0 {
            smoothed / self.config.target_seconds * 100.0
        } else {
            0.0
        };

        HealthReport {
            deck,
            buffered_frames,
            buffered_seconds: smoothed,
            fill_percent,
            paused: state.is_paused,
            changed: state.is_paused != was_paused,
            in_burst_window,
            suppressed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn controller() -> BufferHealthController {
        let config = HealthConfig {
            smoothing: 1.0,
            ..Default::default()
        };
        BufferHealthController::new(config, 48000)
    }

    fn seconds(s: f64) -> u32 {
        (s * 48000.0) as u32
    }

    #[test]
    fn test_shallow_buffer_stays_running() {
        let mut health = BufferHealthController::new(HealthConfig::default(), 48000);
        let report = health.evaluate(Deck::A, 200_000 - 150_000, Instant::now(), false);

        assert_eq!(report.buffered_frames, 50_000);
        assert!((report.buffered_seconds - 1.0417).abs() < 1e-3);
        assert!(!report.paused);
        assert!(!report.changed);
    }

    #[test]
    fn test_hysteresis() {
        let mut health = controller();
        let now = Instant::now();

        assert!(!health.evaluate(Deck::A, seconds(8.0), now, false).paused);

        let report = health.evaluate(Deck::A, seconds(13.0), now, false);
        assert!(report.paused && report.changed);

        // Between thresholds: keep paused
        let report = health.evaluate(Deck::A, seconds(8.0), now, false);
        assert!(report.paused && !report.changed);

        let report = health.evaluate(Deck::A, seconds(5.0), now, false);
        assert!(!report.paused && report.changed);

        // Between thresholds again: keep running
        assert!(!health.evaluate(Deck::A, seconds(8.0), now, false).paused);
        assert!(!health.is_paused(Deck::B));
    }

    #[test]
    fn test_burst_window_suppresses_pause() {
        let mut health = controller();
        let start = Instant::now();
        health.mark_context_change(Deck::B, start);

        let report = health.evaluate(Deck::B, seconds(20.0), start + Duration::from_millis(1000), false);
        assert!(report.in_burst_window);
        assert!(!report.paused);

        let report = health.evaluate(Deck::B, seconds(20.0), start + Duration::from_millis(6000), false);
        assert!(!report.in_burst_window);
        assert!(report.paused);

        // A new context change resumes even a full buffer
        health.mark_context_change(Deck::B, start + Duration::from_millis(7000));
        let report = health.evaluate(Deck::B, seconds(20.0), start + Duration::from_millis(7100), false);
        assert!(!report.paused && report.changed);
    }

    #[test]
    fn test_suppressed_keeps_decision() {
        let mut health = controller();
        let now = Instant::now();
        let report = health.evaluate(Deck::A, seconds(20.0), now, true);
        assert!(report.suppressed);
        assert!(!report.paused);
        assert_eq!(health.state(Deck::A).smoothed_seconds, Some(20.0));
    }

    #[test]
    fn test_smoothing_and_reset() {
        let mut health = BufferHealthController::new(HealthConfig::default(), 48000);
        let now = Instant::now();
        health.evaluate(Deck::A, seconds(10.0), now, false);
        let report = health.evaluate(Deck::A, seconds(2.0), now, false);
        assert!((report.buffered_seconds - 6.0).abs() < 1e-3);
        assert!((report.fill_percent - 50.0).abs() < 0.1);

        health.mark_context_change(Deck::A, now);
        health.reset(Deck::A);
        assert!(health.state(Deck::A).smoothed_seconds.is_none());
        assert!(health.in_burst_window(Deck::A, now));
    }
}
