//! Render-side handle
//!
//! The real-time render callback (and its resampling) is external. This
//! handle is what it holds: pointer and sample accessors over the shared ring,
//! the per-quantum read advance, and the consumer end of a wait-free queue
//! carrying speed-ratio and loop updates from the coordinator.
//!
//! Nothing here allocates, locks or logs.

use std::sync::Arc;

use crate::ring::SharedRing;
use crate::types::{Deck, Sample, StereoSample, CHANNELS, NUM_DECKS};

/// Commands sent from the coordinator to the render context
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RenderCommand {
    /// Relative playback speed for a deck
    SetSpeedRatio { deck: Deck, ratio: f64 },
    /// Loop the read pointer over `[start, end)`
    SetLoop { deck: Deck, region: LoopRegion },
    /// Stop looping
    ClearLoop { deck: Deck },
}

/// Loop bounds as seen by the render context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopRegion {
    pub start: u32,
    pub end: u32,
    /// Wraps before playing through (0 = loop until cleared)
    pub repeat_count: u32,
}

#[derive(Debug, Clone, Copy)]
struct RenderDeck {
    speed_ratio: f64,
    loop_region: Option<LoopRegion>,
    wraps: u32,
}

impl Default for RenderDeck {
    fn default() -> Self {
        Self {
            speed_ratio: 1.0,
            loop_region: None,
            wraps: 0,
        }
    }
}

/// Render-context view of the stream
pub struct RenderHandle {
    ring: Arc<SharedRing>,
    commands: rtrb::Consumer<RenderCommand>,
    decks: [RenderDeck; NUM_DECKS],
}

impl RenderHandle {
    pub(crate) fn new(ring: Arc<SharedRing>, commands: rtrb::Consumer<RenderCommand>) -> Self {
        Self {
            ring,
            commands,
            decks: [RenderDeck::default(); NUM_DECKS],
        }
    }

    /// Write pointer of a deck
    #[inline]
    pub fn write_pointer(&self, deck: Deck) -> u32 {
        self.ring.current_write(deck)
    }

    /// Read pointer of a deck
    #[inline]
    pub fn read_pointer(&self, deck: Deck) -> u32 {
        self.ring.current_read(deck)
    }

    /// Raw frame at a monotonic frame index
    #[inline]
    pub fn sample_at(&self, deck: Deck, frame: u32) -> StereoSample {
        self.ring.sample_at(deck, frame)
    }

    /// Current playback-speed ratio of a deck
    #[inline]
    pub fn speed_ratio(&self, deck: Deck) -> f64 {
        self.decks[deck.index()].speed_ratio
    }

    /// Loop the render context is honouring for a deck
    #[inline]
    pub fn loop_region(&self, deck: Deck) -> Option<LoopRegion> {
        self.decks[deck.index()].loop_region
    }

    /// Apply pending coordinator commands; call once per render quantum
    ///
    /// Returns the number of commands applied.
    pub fn apply_commands(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(command) = self.commands.pop() {
            match command {
                RenderCommand::SetSpeedRatio { deck, ratio } => {
                    self.decks[deck.index()].speed_ratio = ratio;
                }
                RenderCommand::SetLoop { deck, region } => {
                    let state = &mut self.decks[deck.index()];
                    state.loop_region = Some(region);
                    state.wraps = 0;
                }
                RenderCommand::ClearLoop { deck } => {
                    let state = &mut self.decks[deck.index()];
                    state.loop_region = None;
                    state.wraps = 0;
                }
            }
            applied += 1;
        }
        applied
    }

    /// Advance a deck's read pointer by `frames`, wrapping inside an active loop
    ///
    /// Returns the new read pointer.
    pub fn advance(&mut self, deck: Deck, frames: u32) -> u32 {
        let pointers = self.ring.pointers(deck);
        let next = pointers.advance_read(frames);

        let state = &mut self.decks[deck.index()];
        let Some(region) = state.loop_region else {
            return next;
        };
        let length = region.end.wrapping_sub(region.start);
        let past_end = next.wrapping_sub(region.end) as i32;
        if length == 0 || past_end < 0 {
            return next;
        }

        state.wraps += 1;
        if region.repeat_count > 0 && state.wraps > region.repeat_count {
            state.loop_region = None;
            return next;
        }
        let target = region.start.wrapping_add(past_end as u32 % length);
        pointers.teleport_read(target);
        target
    }

    /// Copy up to `out.len() / 2` frames at unity speed into an interleaved buffer
    ///
    /// Frames that are not buffered yet are written as silence and the read
    /// pointer only advances over frames actually available. Returns the
    /// number of buffered frames copied.
    pub fn read_interleaved(&mut self, deck: Deck, out: &mut [Sample]) -> usize {
        let requested = out.len() / CHANNELS;
        let available = self
            .ring
            .pointers(deck)
            .gap(self.ring.capacity())
            .buffered_frames()
            .min(self.ring.capacity()) as usize;
        let copied = requested.min(available);
        let read = self.read_pointer(deck);

        for (i, frame_out) in out.chunks_exact_mut(CHANNELS).enumerate() {
            let frame = if i < copied {
                self.ring.sample_at(deck, read.wrapping_add(i as u32))
            } else {
                StereoSample::silence()
            };
            frame_out[0] = frame.left;
            frame_out[1] = frame.right;
        }

        if copied > 0 {
            self.advance(deck, copied as u32);
        }
        copied
    }
}
