//! Message types for service communication
//!
//! Commands flow from the application into the coordinator service; events
//! flow out of it over an [`EventBus`]. Commands are fire-and-forget: results
//! that matter to the application come back as events.

use std::time::Instant;

use crate::health::HealthReport;
use crate::loops::{LoopBlendState, LoopRequest};
use crate::sync::PhaseAlignment;
use crate::types::{Deck, Sample};

// ============================================================================
// Stream Commands
// ============================================================================

/// Commands sent to the stream coordinator service
#[derive(Debug, Clone)]
pub enum StreamCommand {
    /// Append an interleaved stereo chunk to a deck
    PushChunk { deck: Deck, samples: Vec<Sample> },

    /// Configure (or disable) a deck's loop
    ConfigureLoop { deck: Deck, request: LoopRequest },

    /// Clear a deck's loop
    ClearLoop { deck: Deck },

    /// Teleport a deck so its bar phase matches the other deck
    AlignPhase { deck: Deck },

    /// Set a deck's playback-speed ratio directly
    SetTempoRatio { deck: Deck, ratio: f64 },

    /// Match a deck's tempo to a master BPM
    MatchTempo { deck: Deck, master_bpm: f64 },

    /// Update a deck's natural tempo and beat-grid offset
    SetDeckTempo {
        deck: Deck,
        bpm: f64,
        offset_seconds: f64,
    },

    /// A prompt/context change was sent upstream for a deck
    MarkContextChange { deck: Deck, at: Instant },

    /// User pause toggle
    SetManualPause { deck: Deck, paused: bool },

    /// Move a deck's read pointer
    Seek { deck: Deck, frame: u32 },

    /// Silence a deck's buffer and restart it at the write pointer
    ClearDeckBuffer { deck: Deck },

    /// Shutdown the service
    Shutdown,
}

// ============================================================================
// Stream Events
// ============================================================================

/// Why the producer was paused or resumed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PauseReason {
    /// Buffer health controller
    Backpressure,
    /// Loop played through and replays buffered audio
    LoopAutoStop,
    /// User toggle
    Manual,
    /// Loop cleared after an auto-stop
    LoopCleared,
    /// Deck buffer cleared
    BufferCleared,
}

impl std::fmt::Display for PauseReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Backpressure => write!(f, "backpressure"),
            Self::LoopAutoStop => write!(f, "loop auto-stop"),
            Self::Manual => write!(f, "manual"),
            Self::LoopCleared => write!(f, "loop cleared"),
            Self::BufferCleared => write!(f, "buffer cleared"),
        }
    }
}

/// Events published by the stream coordinator
#[derive(Debug, Clone)]
pub enum StreamEvent {
    // --- Producer Events ---
    /// Producer asked to stop generating for a deck
    ProducerPaused { deck: Deck, reason: PauseReason },

    /// Producer asked to resume generating for a deck
    ProducerResumed { deck: Deck, reason: PauseReason },

    // --- Buffer Events ---
    /// Read pointer caught up with the write pointer
    Underrun { deck: Deck, behind: u32 },

    /// Writer lapped the reader
    Overrun { deck: Deck, buffered: u32 },

    /// Periodic buffer health measurement
    HealthUpdated(HealthReport),

    /// Deck buffer silenced and restarted
    DeckCleared { deck: Deck },

    /// A chunk was rejected
    ChunkRejected { deck: Deck, error: String },

    // --- Loop Events ---
    /// Loop configured (sanitized state)
    LoopConfigured { deck: Deck, state: LoopBlendState },

    /// Loop removed
    LoopCleared { deck: Deck },

    /// Loop played through once plus its crossfade
    LoopAutoStopped { deck: Deck },

    // --- Sync Events ---
    /// Deck read pointer teleported to match the other deck's bar phase
    PhaseAligned {
        deck: Deck,
        alignment: PhaseAlignment,
    },

    /// Speed ratio forwarded to the render side
    TempoRatioChanged { deck: Deck, ratio: f64 },

    // --- Service Events ---
    /// A service started
    ServiceStarted { service_name: String },

    /// A service stopped
    ServiceStopped { service_name: String },

    /// A service encountered an error
    ServiceError { service_name: String, error: String },
}

// ============================================================================
// Service Handle
// ============================================================================

/// Handle for communicating with a background service
pub struct ServiceHandle<Cmd> {
    /// Channel for sending commands to the service
    pub command_tx: crossbeam::channel::Sender<Cmd>,
    /// Thread handle for the service
    pub thread_handle: Option<std::thread::JoinHandle<()>>,
}

impl<Cmd> ServiceHandle<Cmd> {
    /// Send a command to the service
    pub fn send(&self, cmd: Cmd) -> Result<(), crossbeam::channel::SendError<Cmd>> {
        self.command_tx.send(cmd)
    }

    /// Check if the service is still running
    pub fn is_running(&self) -> bool {
        self.thread_handle
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }

    /// Wait for the service thread to exit
    pub fn join(&mut self) {
        if let Some(handle) = self.thread_handle.take() {
            if handle.join().is_err() {
                log::error!("Service thread panicked");
            }
        }
    }
}

impl ServiceHandle<StreamCommand> {
    /// Ask the coordinator service to stop and wait for it
    pub fn shutdown(&mut self) {
        let _ = self.command_tx.send(StreamCommand::Shutdown);
        self.join();
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Event bus for broadcasting events to subscribers
pub struct EventBus {
    sender: crossbeam::channel::Sender<StreamEvent>,
    receiver: crossbeam::channel::Receiver<StreamEvent>,
}

impl EventBus {
    /// Create a new event bus with bounded capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = crossbeam::channel::bounded(capacity);
        Self { sender, receiver }
    }

    /// Get a sender for publishing events
    pub fn sender(&self) -> crossbeam::channel::Sender<StreamEvent> {
        self.sender.clone()
    }

    /// Get a receiver for subscribing to events
    pub fn subscribe(&self) -> crossbeam::channel::Receiver<StreamEvent> {
        self.receiver.clone()
    }

    /// Publish an event; drops it if the bus is full
    pub fn publish(&self, event: StreamEvent) -> bool {
        self.sender.try_send(event).is_ok()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}
