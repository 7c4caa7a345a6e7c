//! Shared two-deck ring buffer
//!
//! A fixed region of interleaved stereo samples, one half per deck, plus the
//! atomic pointer header. The ring performs no business logic: it maps a deck
//! and a monotonic frame counter to storage and exposes pointer accessors.
//!
//! Samples are stored as `f32` bits in `AtomicU32` cells. Only the stream
//! writer mutates them and the render side only reads them, so there is no
//! write/write race; the atomics keep cross-thread reads free of torn values
//! without a lock.

mod header;
mod layout;

pub use header::{DeckPointers, PointerGap};
pub use layout::RingLayout;

use std::sync::atomic::{AtomicU32, Ordering};

use crate::error::{StreamError, StreamResult};
use crate::types::{Deck, StereoSample, NUM_DECKS};

/// The shared sample region and pointer header
///
/// Wrap in an `Arc` and hand one clone to the coordinator and one to the
/// render context.
pub struct SharedRing {
    layout: RingLayout,
    samples: Box<[AtomicU32]>,
    pointers: [DeckPointers; NUM_DECKS],
}

impl SharedRing {
    /// Allocate a silent ring with the given layout
    pub fn new(layout: RingLayout) -> StreamResult<Self> {
        if layout.max_frames() == 0 {
            return Err(StreamError::InvalidConfig(
                "ring must hold at least one frame per deck".to_string(),
            ));
        }
        let samples = (0..layout.total_samples())
            .map(|_| AtomicU32::new(0.0f32.to_bits()))
            .collect::<Vec<_>>()
            .into_boxed_slice();

        log::info!(
            "SharedRing: {} frames per deck ({} samples total)",
            layout.max_frames(),
            layout.total_samples()
        );

        Ok(Self {
            layout,
            samples,
            pointers: std::array::from_fn(|_| DeckPointers::new()),
        })
    }

    /// Ring geometry
    #[inline]
    pub fn layout(&self) -> &RingLayout {
        &self.layout
    }

    /// Frames per deck
    #[inline]
    pub fn capacity(&self) -> u32 {
        self.layout.max_frames()
    }

    /// Pointer header for a deck
    #[inline]
    pub fn pointers(&self, deck: Deck) -> &DeckPointers {
        &self.pointers[deck.index()]
    }

    /// Current write pointer of a deck
    #[inline]
    pub fn current_write(&self, deck: Deck) -> u32 {
        self.pointers(deck).current_write()
    }

    /// Current read pointer of a deck
    #[inline]
    pub fn current_read(&self, deck: Deck) -> u32 {
        self.pointers(deck).current_read()
    }

    /// Frames the render context has played on a deck, loop wraps included
    #[inline]
    pub fn current_played(&self, deck: Deck) -> u32 {
        self.pointers(deck).played()
    }

    /// Raw frame at a monotonic frame index
    #[inline]
    pub fn sample_at(&self, deck: Deck, frame: u32) -> StereoSample {
        let offset = self.layout.sample_offset(deck, frame);
        StereoSample::new(
            f32::from_bits(self.samples[offset].load(Ordering::Relaxed)),
            f32::from_bits(self.samples[offset + 1].load(Ordering::Relaxed)),
        )
    }

    /// Overwrite the frame at a monotonic frame index
    ///
    /// Writer side only; publishing happens through
    /// [`DeckPointers::advance_write`].
    #[inline]
    pub(crate) fn store_frame(&self, deck: Deck, frame: u32, value: StereoSample) {
        let offset = self.layout.sample_offset(deck, frame);
        self.samples[offset].store(value.left.to_bits(), Ordering::Relaxed);
        self.samples[offset + 1].store(value.right.to_bits(), Ordering::Relaxed);
    }

    /// Silence a deck's half
    pub(crate) fn silence_deck(&self, deck: Deck) {
        let start = deck.index() * self.layout.half_size();
        let end = start + self.layout.half_size();
        let silent = 0.0f32.to_bits();
        for cell in &self.samples[start..end] {
            cell.store(silent, Ordering::Relaxed);
        }
    }
}
