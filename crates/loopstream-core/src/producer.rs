//! Control channel toward the upstream chunk producer
//!
//! The producer (remote generative session, reconnection, archiving) lives
//! outside this crate. The coordinator only ever asks it to pause or resume a
//! deck; both requests must be idempotent on the producer side, and the
//! controllers reissue their current decision on every tick instead of
//! retrying.

use crossbeam::channel::{Receiver, Sender};

use crate::types::Deck;

/// Pause/resume interface implemented by the upstream producer
pub trait ProducerControl: Send {
    /// Stop generating audio for a deck
    fn pause(&self, deck: Deck);
    /// Resume generating audio for a deck
    fn resume(&self, deck: Deck);
}

/// Message form of a producer control request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProducerCommand {
    Pause(Deck),
    Resume(Deck),
}

/// [`ProducerControl`] that forwards requests over a crossbeam channel
///
/// The producer side owns the receiver and applies requests at its own pace.
#[derive(Clone)]
pub struct ChannelProducer {
    tx: Sender<ProducerCommand>,
}

impl ChannelProducer {
    /// Create a producer control and the receiver the producer listens on
    pub fn new() -> (Self, Receiver<ProducerCommand>) {
        let (tx, rx) = crossbeam::channel::unbounded();
        (Self { tx }, rx)
    }
}

impl ProducerControl for ChannelProducer {
    fn pause(&self, deck: Deck) {
        if self.tx.send(ProducerCommand::Pause(deck)).is_err() {
            log::warn!("ChannelProducer: producer gone, pause for {} dropped", deck);
        }
    }

    fn resume(&self, deck: Deck) {
        if self.tx.send(ProducerCommand::Resume(deck)).is_err() {
            log::warn!("ChannelProducer: producer gone, resume for {} dropped", deck);
        }
    }
}
