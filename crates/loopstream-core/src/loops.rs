//! Loop region configurator
//!
//! Turns a raw loop request from the UI or automation into a sanitized
//! [`LoopBlendState`] the stream writer can blend against:
//!
//! 1. Snap start and end to the deck's beat grid
//! 2. Enforce a minimum length of one beat
//! 3. Clamp both bounds into the generation window (frames the producer has
//!    written and the ring still holds)
//! 4. Disable degenerate loops
//! 5. Bound and quantize the crossfade
//!
//! Invalid requests are clamped or disabled, never returned as errors: loop
//! requests come from live interaction and must not interrupt playback.
//! The configurator is a pure function of its inputs, so applying the same
//! request twice yields the same state.

use crate::config::StreamConfig;
use crate::context::DeckContext;

/// A loop request as issued by the control surface
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LoopRequest {
    /// Requested start frame (monotonic frame space)
    pub start: u32,
    /// Requested end frame (monotonic frame space)
    pub end: u32,
    /// Requested crossfade length in frames (0 = hard seam)
    pub crossfade_frames: u32,
    /// Requested repeat count, carried through unchanged
    pub repeat_count: u32,
    /// `false` disables the loop
    pub active: bool,
}

/// Loop blend state consulted by the stream writer for one deck
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LoopBlendState {
    /// Whether a loop is configured
    pub active: bool,
    /// Loop start (monotonic frame space)
    pub start_frame: u32,
    /// Loop end (monotonic frame space)
    pub end_frame: u32,
    /// Crossfade window length at the loop seam
    pub overlap_frames: u32,
    /// Frames per beat at the loop's tempo (0.0 without a grid)
    pub beat_frames: f64,
    /// Distance from a beat still counted as aligned
    pub beat_tolerance_frames: f64,
    /// Beat-grid phase offset of the deck in frames
    pub offset_frames: f64,
    /// Repeat count as requested
    pub repeat_count: u32,
    /// Writer is currently inside the overlap window
    pub in_overlap: bool,
    /// Alignment quality snapshotted on overlap entry (0..1)
    pub overlap_alignment: f64,
}

impl LoopBlendState {
    /// Loop length in frames
    pub fn length_frames(&self) -> u32 {
        self.end_frame.saturating_sub(self.start_frame)
    }

    /// Whether the writer has anything to blend
    pub fn blends(&self) -> bool {
        self.active && self.overlap_frames > 0
    }
}

/// Sanitize a loop request against the deck's grid and the generation window
///
/// `write_pointer` is the deck's current write pointer and `capacity` the
/// ring's frames per deck.
pub fn configure_loop(
    request: &LoopRequest,
    ctx: &DeckContext,
    write_pointer: u32,
    capacity: u32,
    config: &StreamConfig,
) -> LoopBlendState {
    if !request.active {
        return LoopBlendState::default();
    }

    let loops = &config.loops;
    let grid = ctx.grid(config.sample_rate, config.sync.min_bpm);

    let mut start = request.start as f64;
    let mut end = request.end as f64;
    if let Some(grid) = grid {
        start = grid.snap(start);
        end = grid.snap(end);
        if end <= start {
            end = start + grid.beat_frames;
        }
    }

    // Generation window: never past what has been written, never older than the ring
    let write = write_pointer as i64;
    let lo = (write - capacity as i64).max(0);
    let hi = (write - loops.safety_margin_frames as i64).max(lo);
    let start = (start.round() as i64).clamp(lo, hi);
    let end = (end.round() as i64).clamp(lo, hi);

    let length = end - start;
    if length <= 1 {
        log::debug!(
            "configure_loop: degenerate loop {}..{} after clamping to window {}..{}, disabling",
            request.start,
            request.end,
            lo,
            hi
        );
        return LoopBlendState::default();
    }

    let max_crossfade = (length as f64 * loops.max_crossfade_fraction).floor();
    let requested = request.crossfade_frames as f64;
    let overlap = if requested <= 0.0 || max_crossfade < 1.0 {
        0.0
    } else if let Some(grid) = grid {
        let floor = grid.beat_frames * loops.min_crossfade_beats;
        let quantum = grid.beat_frames * loops.crossfade_quantum_beats;
        let bounded = requested.max(floor).min(max_crossfade);
        quantize(bounded, quantum, max_crossfade)
    } else {
        requested.min(max_crossfade)
    };

    if (overlap as u32) != request.crossfade_frames {
        log::debug!(
            "configure_loop: crossfade {} -> {} frames (loop length {})",
            request.crossfade_frames,
            overlap as u32,
            length
        );
    }

    let (beat_frames, beat_tolerance_frames, offset_frames) = match grid {
        Some(grid) => (
            grid.beat_frames,
            grid.beat_frames * loops.beat_tolerance_beats,
            grid.anchor,
        ),
        None => (0.0, 0.0, 0.0),
    };

    LoopBlendState {
        active: true,
        start_frame: start as u32,
        end_frame: end as u32,
        overlap_frames: overlap as u32,
        beat_frames,
        beat_tolerance_frames,
        offset_frames,
        repeat_count: request.repeat_count,
        in_overlap: false,
        overlap_alignment: 1.0,
    }
}

/// Round `frames` to the nearest multiple of `quantum` without exceeding `max`
///
/// A fractional quantum lands on the nearest whole frame of that multiple.
/// `max` is a whole frame count.
fn quantize(frames: f64, quantum: f64, max: f64) -> f64 {
    if quantum < 1.0 {
        return frames.floor().min(max);
    }
    let mut q = (frames / quantum).round() * quantum;
    if q > max {
        q = (max / quantum).floor() * quantum;
    }
    if q < 1.0 {
        // Loop too short for even one quantum; keep the bounded value
        return frames.floor().min(max);
    }
    q.round().min(max)
}
