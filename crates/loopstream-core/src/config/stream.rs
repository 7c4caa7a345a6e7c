//! Stream configuration
//!
//! Every tunable of the coordinator lives here: ring size, backpressure
//! thresholds, loop sanitizing constants and monitor cadences. Sections use
//! `#[serde(default)]` so a partial YAML file only overrides what it names.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{StreamError, StreamResult};
use crate::types::{BEATS_PER_BAR, SAMPLE_RATE};

/// Root configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Sample rate of the producer and the ring (Hz)
    pub sample_rate: u32,
    /// Ring capacity per deck in frames
    /// Default: 30 seconds at 48kHz
    pub frames_per_deck: u32,
    /// Capacity of the coordinator → render command queue
    pub command_queue_capacity: usize,
    /// Buffer health (backpressure) controller
    pub health: HealthConfig,
    /// Loop region sanitizing and blend constants
    pub loops: LoopConfig,
    /// Loop auto-stop monitor
    pub autostop: AutoStopConfig,
    /// Tempo/phase synchronization
    pub sync: SyncConfig,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            sample_rate: SAMPLE_RATE,
            frames_per_deck: SAMPLE_RATE * 30,
            command_queue_capacity: 64,
            health: HealthConfig::default(),
            loops: LoopConfig::default(),
            autostop: AutoStopConfig::default(),
            sync: SyncConfig::default(),
        }
    }
}

impl StreamConfig {
    /// Ring capacity per deck in seconds
    pub fn capacity_seconds(&self) -> f64 {
        self.frames_per_deck as f64 / self.sample_rate as f64
    }

    /// Reject configurations the controllers cannot run with
    pub fn validate(&self) -> StreamResult<()> {
        if self.sample_rate == 0 {
            return Err(StreamError::InvalidConfig("sample_rate must be positive".into()));
        }
        if self.frames_per_deck == 0 {
            return Err(StreamError::InvalidConfig("frames_per_deck must be positive".into()));
        }
        if self.command_queue_capacity == 0 {
            return Err(StreamError::InvalidConfig(
                "command_queue_capacity must be positive".into(),
            ));
        }
        if self.health.tick_ms == 0 || self.autostop.tick_ms == 0 {
            return Err(StreamError::InvalidConfig("tick periods must be positive".into()));
        }
        if self.health.pause_above_seconds <= self.health.resume_below_seconds {
            return Err(StreamError::InvalidConfig(format!(
                "health.pause_above_seconds ({}) must exceed health.resume_below_seconds ({})",
                self.health.pause_above_seconds, self.health.resume_below_seconds
            )));
        }
        if self.health.pause_above_seconds >= self.capacity_seconds() {
            return Err(StreamError::InvalidConfig(format!(
                "health.pause_above_seconds ({}) must be below the ring capacity ({:.2}s)",
                self.health.pause_above_seconds,
                self.capacity_seconds()
            )));
        }
        if !(0.0..=1.0).contains(&self.health.smoothing) {
            return Err(StreamError::InvalidConfig("health.smoothing must be within 0..=1".into()));
        }
        if !(0.0..=0.5).contains(&self.loops.max_crossfade_fraction) {
            return Err(StreamError::InvalidConfig(
                "loops.max_crossfade_fraction must be within 0..=0.5".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.loops.min_alignment) {
            return Err(StreamError::InvalidConfig("loops.min_alignment must be within 0..=1".into()));
        }
        if self.sync.beats_per_bar == 0 {
            return Err(StreamError::InvalidConfig("sync.beats_per_bar must be positive".into()));
        }
        // A zero floor lets a 0 BPM deck through as an infinite beat
        if !(self.sync.min_bpm.is_finite() && self.sync.min_bpm > 0.0) {
            return Err(StreamError::InvalidConfig("sync.min_bpm must be positive".into()));
        }
        if self.sync.min_speed_ratio <= 0.0 || self.sync.min_speed_ratio > self.sync.max_speed_ratio {
            return Err(StreamError::InvalidConfig("sync speed ratio range is empty".into()));
        }
        Ok(())
    }
}

/// Buffer health controller configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthConfig {
    /// Controller period in milliseconds
    pub tick_ms: u64,
    /// Pause the producer above this many buffered seconds
    pub pause_above_seconds: f64,
    /// Resume the producer below this many buffered seconds
    pub resume_below_seconds: f64,
    /// Buffered seconds reported as 100% fill
    pub target_seconds: f64,
    /// Grace period after a prompt/context change during which pausing is suppressed
    pub burst_window_ms: u64,
    /// Weight of the newest measurement in the smoothed estimate (1.0 = no smoothing)
    pub smoothing: f64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            tick_ms: 250,
            pause_above_seconds: 12.0,
            resume_below_seconds: 6.0,
            target_seconds: 12.0,
            burst_window_ms: 5000,
            smoothing: 0.5,
        }
    }
}

impl HealthConfig {
    /// Controller period
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    /// Burst window length
    pub fn burst_window(&self) -> Duration {
        Duration::from_millis(self.burst_window_ms)
    }
}

/// Loop region configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopConfig {
    /// Frames kept between a loop end and the write pointer
    pub safety_margin_frames: u32,
    /// Crossfade upper bound as a fraction of loop length
    pub max_crossfade_fraction: f64,
    /// Crossfade lower bound in beats (applies to non-zero requests)
    pub min_crossfade_beats: f64,
    /// Crossfade rounding quantum in beats
    pub crossfade_quantum_beats: f64,
    /// Beat distance (in beats) within which an overlap entry counts as aligned
    pub beat_tolerance_beats: f64,
    /// Alignment quality floor for off-beat overlap entries
    pub min_alignment: f64,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            safety_margin_frames: 256,
            max_crossfade_fraction: 0.25,
            min_crossfade_beats: 1.0 / 32.0,
            crossfade_quantum_beats: 1.0 / 16.0,
            beat_tolerance_beats: 0.125,
            min_alignment: 0.35,
        }
    }
}

/// Loop auto-stop monitor configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoStopConfig {
    /// Whether active loops silence the producer once self-sufficient
    pub enabled: bool,
    /// Monitor period in milliseconds
    pub tick_ms: u64,
}

impl Default for AutoStopConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            tick_ms: 100,
        }
    }
}

impl AutoStopConfig {
    /// Monitor period
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }
}

/// Tempo and phase synchronization configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Beats per bar used for phase alignment
    pub beats_per_bar: u32,
    /// BPM below which a deck's grid counts as unset
    pub min_bpm: f64,
    /// Slowest playback-speed ratio forwarded to the render side
    pub min_speed_ratio: f64,
    /// Fastest playback-speed ratio forwarded to the render side
    pub max_speed_ratio: f64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            beats_per_bar: BEATS_PER_BAR,
            min_bpm: 1.0,
            min_speed_ratio: 0.5,
            max_speed_ratio: 2.0,
        }
    }
}
