//! Stream error types

use thiserror::Error;

use crate::types::Deck;

/// Errors that can occur on the coordinating side of the stream
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StreamError {
    /// Read pointer caught up with or passed the write pointer
    #[error("Buffer underrun on {deck}: read pointer {behind} frames ahead of write pointer")]
    Underrun { deck: Deck, behind: u32 },

    /// Writer lapped the reader; unread frames were overwritten
    #[error("Buffer overrun on {deck}: {buffered} frames buffered, ring holds {capacity}")]
    Overrun {
        deck: Deck,
        buffered: u32,
        capacity: u32,
    },

    /// Chunk does not hold a whole number of stereo frames
    #[error("Malformed chunk for {deck}: {samples} samples is not a whole number of frames")]
    MalformedChunk { deck: Deck, samples: usize },

    /// Configuration failed validation
    #[error("Invalid stream config: {0}")]
    InvalidConfig(String),

    /// Render command queue is full
    #[error("Render command queue full, dropped update for {0}")]
    QueueFull(Deck),

    /// Failed to start a background service thread
    #[error("Failed to spawn service thread: {0}")]
    ServiceSpawn(String),
}

/// Result type for stream operations
pub type StreamResult<T> = Result<T, StreamError>;
