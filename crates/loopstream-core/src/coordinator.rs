//! Stream coordinator
//!
//! Owns everything on the coordinating side of the stream: the writer and its
//! loop blend states, the per-deck contexts, the health controller, the
//! auto-stop monitor, the producer control and the producer end of the render
//! command queue. All control-surface operations and both controller ticks go
//! through here, on one thread, so none of that state needs a lock.
//!
//! The render context only ever sees the shared ring and the commands it
//! pops from its [`RenderHandle`].

use std::sync::Arc;
use std::time::Instant;

use crossbeam::channel::Sender;

use crate::autostop::{ArmPosition, LoopAutoStopMonitor};
use crate::config::StreamConfig;
use crate::context::DeckContext;
use crate::error::{StreamError, StreamResult};
use crate::health::{BufferHealthController, HealthReport};
use crate::loops::{self, LoopBlendState, LoopRequest};
use crate::messages::{PauseReason, StreamEvent};
use crate::producer::ProducerControl;
use crate::render::{LoopRegion, RenderCommand, RenderHandle};
use crate::ring::{PointerGap, RingLayout, SharedRing};
use crate::sync::{self, PhaseAlignment};
use crate::types::{Deck, Sample, NUM_DECKS};
use crate::writer::StreamWriter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PointerFault {
    Underrun,
    Overrun,
}

/// Coordinating side of the two-deck stream
pub struct StreamCoordinator {
    config: StreamConfig,
    ring: Arc<SharedRing>,
    writer: StreamWriter,
    contexts: [DeckContext; NUM_DECKS],
    health: BufferHealthController,
    autostop: LoopAutoStopMonitor,
    producer: Box<dyn ProducerControl>,
    render_tx: rtrb::Producer<RenderCommand>,
    events: Option<Sender<StreamEvent>>,
    /// Last reported pointer fault per deck, so faults are reported on entry only
    faults: [Option<PointerFault>; NUM_DECKS],
}

impl StreamCoordinator {
    /// Build the ring and its controllers from a validated config
    ///
    /// Returns the coordinator together with the handle the render context
    /// reads through.
    pub fn new(
        config: StreamConfig,
        producer: Box<dyn ProducerControl>,
    ) -> StreamResult<(Self, RenderHandle)> {
        config.validate()?;

        let ring = Arc::new(SharedRing::new(RingLayout::with_frames_per_deck(
            config.frames_per_deck,
        ))?);
        let (render_tx, render_rx) = rtrb::RingBuffer::new(config.command_queue_capacity);

        let coordinator = Self {
            writer: StreamWriter::new(Arc::clone(&ring), config.loops.min_alignment),
            contexts: std::array::from_fn(|_| DeckContext::default()),
            health: BufferHealthController::new(config.health.clone(), config.sample_rate),
            autostop: LoopAutoStopMonitor::new(),
            producer,
            render_tx,
            events: None,
            faults: [None; NUM_DECKS],
            ring: Arc::clone(&ring),
            config,
        };

        log::info!(
            "StreamCoordinator: {} frames per deck ({:.1}s at {} Hz)",
            coordinator.config.frames_per_deck,
            coordinator.config.capacity_seconds(),
            coordinator.config.sample_rate
        );

        Ok((coordinator, RenderHandle::new(ring, render_rx)))
    }

    /// Publish events to `sender` from now on
    pub fn with_events(mut self, sender: Sender<StreamEvent>) -> Self {
        self.events = Some(sender);
        self
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    pub fn ring(&self) -> &Arc<SharedRing> {
        &self.ring
    }

    pub fn context(&self, deck: Deck) -> &DeckContext {
        &self.contexts[deck.index()]
    }

    pub fn loop_state(&self, deck: Deck) -> &LoopBlendState {
        self.writer.loop_state(deck)
    }

    pub fn health(&self) -> &BufferHealthController {
        &self.health
    }

    pub fn autostop(&self) -> &LoopAutoStopMonitor {
        &self.autostop
    }

    // ------------------------------------------------------------------------
    // Writing
    // ------------------------------------------------------------------------

    /// Append an interleaved stereo chunk to a deck
    ///
    /// Chunks that arrive while the producer is paused are still written.
    pub fn push_chunk(&mut self, deck: Deck, samples: &[Sample]) -> StreamResult<u32> {
        let frames = match self.writer.push_chunk(deck, samples) {
            Ok(frames) => frames,
            Err(e) => {
                log::warn!("StreamCoordinator: {}", e);
                self.publish(StreamEvent::ChunkRejected {
                    deck,
                    error: e.to_string(),
                });
                return Err(e);
            }
        };
        self.observe_pointers(deck);
        Ok(frames)
    }

    /// Classify a deck's pointer distance
    ///
    /// Returns the buffered frames, or the underrun/overrun the gap indicates.
    pub fn check_pointers(&self, deck: Deck) -> StreamResult<u32> {
        let capacity = self.ring.capacity();
        match self.ring.pointers(deck).gap(capacity) {
            PointerGap::Buffered(frames) => Ok(frames),
            PointerGap::Underrun { behind } => Err(StreamError::Underrun { deck, behind }),
            PointerGap::Overrun { buffered } => Err(StreamError::Overrun {
                deck,
                buffered,
                capacity,
            }),
        }
    }

    /// Check a deck's pointers and report a fault when one begins
    ///
    /// A deck that has never been written to is idle, not underrunning.
    fn observe_pointers(&mut self, deck: Deck) -> u32 {
        let result = self.check_pointers(deck);
        let (fault, buffered) = match &result {
            Ok(frames) => (None, *frames),
            Err(StreamError::Underrun { .. }) if self.ring.current_write(deck) == 0 => (None, 0),
            Err(StreamError::Underrun { .. }) => (Some(PointerFault::Underrun), 0),
            Err(StreamError::Overrun { buffered, .. }) => {
                (Some(PointerFault::Overrun), *buffered)
            }
            Err(_) => (None, 0),
        };

        let previous = std::mem::replace(&mut self.faults[deck.index()], fault);
        if fault.is_some() && fault != previous {
            match result {
                Err(StreamError::Underrun { behind, .. }) => {
                    log::warn!("StreamCoordinator: underrun on {} ({} frames)", deck, behind);
                    self.publish(StreamEvent::Underrun { deck, behind });
                }
                Err(StreamError::Overrun { buffered, capacity, .. }) => {
                    log::warn!(
                        "StreamCoordinator: overrun on {} ({} frames buffered, ring holds {})",
                        deck,
                        buffered,
                        capacity
                    );
                    self.publish(StreamEvent::Overrun { deck, buffered });
                }
                _ => {}
            }
        }
        buffered
    }

    // ------------------------------------------------------------------------
    // Loops
    // ------------------------------------------------------------------------

    /// Sanitize and apply a loop request
    ///
    /// An inactive or degenerate request clears the deck's loop. Re-arms the
    /// auto-stop monitor at the current write pointer.
    pub fn configure_loop(
        &mut self,
        deck: Deck,
        request: &LoopRequest,
    ) -> StreamResult<LoopBlendState> {
        let write = self.ring.current_write(deck);
        let state = loops::configure_loop(
            request,
            &self.contexts[deck.index()],
            write,
            self.ring.capacity(),
            &self.config,
        );
        if !state.active {
            self.clear_loop(deck)?;
            return Ok(state);
        }

        self.send_render(
            deck,
            RenderCommand::SetLoop {
                deck,
                region: LoopRegion {
                    start: state.start_frame,
                    end: state.end_frame,
                    repeat_count: state.repeat_count,
                },
            },
        )?;

        let was_stopped = self.autostop.reset(deck);
        self.writer.set_loop(deck, state);
        self.autostop.arm(
            deck,
            &state,
            ArmPosition {
                write,
                read: self.ring.current_read(deck),
                played: self.ring.current_played(deck),
            },
        );

        log::info!(
            "StreamCoordinator: {} loop {}..{} ({} frames, crossfade {})",
            deck,
            state.start_frame,
            state.end_frame,
            state.length_frames(),
            state.overlap_frames
        );
        self.publish(StreamEvent::LoopConfigured { deck, state });

        if was_stopped {
            self.resume_if_eligible(deck, PauseReason::LoopCleared);
        }
        Ok(state)
    }

    /// Remove a deck's loop; resumes a producer the loop had auto-stopped
    ///
    /// Blend and auto-stop state are reset even when the render queue is
    /// full; the `QueueFull` error then only means the render context keeps
    /// wrapping until a later clear reaches it.
    pub fn clear_loop(&mut self, deck: Deck) -> StreamResult<()> {
        self.writer.clear_loop(deck);
        let was_stopped = self.autostop.reset(deck);

        log::info!("StreamCoordinator: {} loop cleared", deck);
        self.publish(StreamEvent::LoopCleared { deck });

        if was_stopped {
            self.resume_if_eligible(deck, PauseReason::LoopCleared);
        }
        self.send_render(deck, RenderCommand::ClearLoop { deck })
    }

    // ------------------------------------------------------------------------
    // Sync
    // ------------------------------------------------------------------------

    /// Update a deck's natural tempo and beat-grid offset
    pub fn set_deck_tempo(&mut self, deck: Deck, bpm: f64, offset_seconds: f64) {
        let ctx = &mut self.contexts[deck.index()];
        ctx.bpm = bpm;
        ctx.offset_seconds = offset_seconds;
        log::info!(
            "StreamCoordinator: {} tempo {:.2} BPM, grid offset {:.3}s",
            deck,
            bpm,
            offset_seconds
        );
    }

    /// Forward a playback-speed ratio to the render side
    ///
    /// The ratio is clamped to the configured range; returns the ratio sent.
    pub fn set_tempo_ratio(&mut self, deck: Deck, ratio: f64) -> StreamResult<f64> {
        let ratio = if ratio.is_finite() {
            sync::clamp_ratio(ratio, &self.config.sync)
        } else {
            log::warn!("StreamCoordinator: ignoring non-finite speed ratio for {}", deck);
            1.0
        };

        self.send_render(deck, RenderCommand::SetSpeedRatio { deck, ratio })?;
        self.contexts[deck.index()].speed_ratio = ratio;

        log::debug!("StreamCoordinator: {} speed ratio {:.4}", deck, ratio);
        self.publish(StreamEvent::TempoRatioChanged { deck, ratio });
        Ok(ratio)
    }

    /// Match a deck's tempo to `master_bpm`
    ///
    /// Returns `None` without touching the deck when either tempo is unknown.
    pub fn match_tempo(&mut self, deck: Deck, master_bpm: f64) -> StreamResult<Option<f64>> {
        let natural = self.contexts[deck.index()].bpm;
        match sync::tempo_ratio(natural, master_bpm, &self.config.sync) {
            Some(ratio) => self.set_tempo_ratio(deck, ratio).map(Some),
            None => {
                log::debug!(
                    "StreamCoordinator: tempo match skipped for {} ({} -> {} BPM)",
                    deck,
                    natural,
                    master_bpm
                );
                Ok(None)
            }
        }
    }

    /// Teleport a deck so its bar phase matches the other deck
    pub fn align_phase(&mut self, deck: Deck) -> Option<PhaseAlignment> {
        let alignment = sync::align_phase(
            deck,
            &self.ring,
            &self.contexts,
            self.config.sample_rate,
            &self.config.sync,
        );
        match alignment {
            Some(alignment) => {
                log::debug!(
                    "StreamCoordinator: {} phase aligned {} -> {} (bar progress {:.3})",
                    deck,
                    alignment.previous,
                    alignment.target,
                    alignment.bar_progress
                );
                self.publish(StreamEvent::PhaseAligned { deck, alignment });
            }
            None => log::debug!("StreamCoordinator: phase align skipped for {}, no tempo", deck),
        }
        alignment
    }

    // ------------------------------------------------------------------------
    // Producer control
    // ------------------------------------------------------------------------

    /// Record a prompt/context change; pausing is suppressed for the burst window
    pub fn mark_context_change(&mut self, deck: Deck, now: Instant) {
        self.health.mark_context_change(deck, now);
    }

    /// User pause toggle; takes effect immediately
    pub fn set_manual_pause(&mut self, deck: Deck, paused: bool) {
        let ctx = &mut self.contexts[deck.index()];
        if ctx.manual_pause == paused {
            return;
        }
        ctx.manual_pause = paused;

        if paused {
            self.producer.pause(deck);
            log::info!("StreamCoordinator: {} paused by user", deck);
            self.publish(StreamEvent::ProducerPaused {
                deck,
                reason: PauseReason::Manual,
            });
        } else {
            self.resume_if_eligible(deck, PauseReason::Manual);
        }
    }

    /// Move a deck's read pointer, clamped to the frames the ring holds
    ///
    /// Returns the read pointer written.
    pub fn seek(&mut self, deck: Deck, frame: u32) -> u32 {
        let write = self.ring.current_write(deck) as i64;
        let oldest = (write - self.ring.capacity() as i64).max(0);
        let target = (frame as i64).clamp(oldest, write) as u32;
        self.ring.pointers(deck).teleport_read(target);
        log::debug!("StreamCoordinator: {} seek {} -> {}", deck, frame, target);
        target
    }

    /// Silence a deck and restart playback at its write pointer
    ///
    /// Drops the loop, the auto-stop state and the health smoothing, then
    /// resumes the producer if nothing else holds it. Like [`clear_loop`],
    /// the local reset happens before the render queue is tried.
    ///
    /// [`clear_loop`]: Self::clear_loop
    pub fn clear_deck_buffer(&mut self, deck: Deck) -> StreamResult<()> {
        self.writer.clear_loop(deck);
        self.autostop.reset(deck);

        self.ring.silence_deck(deck);
        let write = self.ring.current_write(deck);
        self.ring.pointers(deck).teleport_read(write);
        self.health.reset(deck);
        // Empty on purpose; only a later underrun is a fault
        self.faults[deck.index()] = Some(PointerFault::Underrun);

        log::info!("StreamCoordinator: {} buffer cleared at frame {}", deck, write);
        self.publish(StreamEvent::DeckCleared { deck });

        self.resume_if_eligible(deck, PauseReason::BufferCleared);
        self.send_render(deck, RenderCommand::ClearLoop { deck })
    }

    fn resume_if_eligible(&mut self, deck: Deck, reason: PauseReason) -> bool {
        if self.contexts[deck.index()].manual_pause
            || self.autostop.is_auto_stopped(deck)
            || self.health.is_paused(deck)
        {
            return false;
        }
        self.producer.resume(deck);
        log::info!("StreamCoordinator: {} resumed ({})", deck, reason);
        self.publish(StreamEvent::ProducerResumed { deck, reason });
        true
    }

    // ------------------------------------------------------------------------
    // Controller ticks
    // ------------------------------------------------------------------------

    /// Run the buffer health controller for both decks
    ///
    /// The current decision is reissued to the producer on every tick; only
    /// changes are logged and published as pause/resume events.
    pub fn tick_health(&mut self, now: Instant) -> [HealthReport; NUM_DECKS] {
        Deck::ALL.map(|deck| self.evaluate_health(deck, now))
    }

    fn evaluate_health(&mut self, deck: Deck, now: Instant) -> HealthReport {
        let buffered = self.observe_pointers(deck);
        let suppressed =
            self.contexts[deck.index()].manual_pause || self.autostop.is_auto_stopped(deck);
        let report = self.health.evaluate(deck, buffered, now, suppressed);

        if suppressed || report.paused {
            self.producer.pause(deck);
        } else {
            self.producer.resume(deck);
        }

        if !suppressed && report.changed {
            log::info!(
                "StreamCoordinator: {} {} by backpressure ({:.2}s buffered, {:.0}%)",
                deck,
                if report.paused { "paused" } else { "resumed" },
                report.buffered_seconds,
                report.fill_percent
            );
            let reason = PauseReason::Backpressure;
            self.publish(if report.paused {
                StreamEvent::ProducerPaused { deck, reason }
            } else {
                StreamEvent::ProducerResumed { deck, reason }
            });
        }

        log::trace!("StreamCoordinator: {:?}", report);
        self.publish(StreamEvent::HealthUpdated(report));
        report
    }

    /// Run the loop auto-stop monitor for both decks
    ///
    /// Returns which decks stopped on this tick.
    pub fn tick_autostop(&mut self) -> [bool; NUM_DECKS] {
        if !self.config.autostop.enabled {
            return [false; NUM_DECKS];
        }
        Deck::ALL.map(|deck| {
            let played = self.ring.current_played(deck);
            if !self.autostop.check(deck, played) {
                return false;
            }
            self.producer.pause(deck);
            log::info!(
                "StreamCoordinator: {} loop played through at read frame {}, producer paused",
                deck,
                self.ring.current_read(deck)
            );
            self.publish(StreamEvent::LoopAutoStopped { deck });
            self.publish(StreamEvent::ProducerPaused {
                deck,
                reason: PauseReason::LoopAutoStop,
            });
            true
        })
    }

    // ------------------------------------------------------------------------
    // Plumbing
    // ------------------------------------------------------------------------

    fn send_render(&mut self, deck: Deck, command: RenderCommand) -> StreamResult<()> {
        self.render_tx.push(command).map_err(|_| {
            log::warn!("StreamCoordinator: render queue full, dropped {:?}", command);
            StreamError::QueueFull(deck)
        })
    }

    fn publish(&self, event: StreamEvent) {
        if let Some(tx) = &self.events {
            // Never block the coordinator on a slow subscriber
            let _ = tx.try_send(event);
        }
    }
}
