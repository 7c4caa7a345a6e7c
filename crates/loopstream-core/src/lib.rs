//! Loopstream Core - Two-deck streaming buffer for generated music
//!
//! A producer pushes generated stereo chunks into a shared ring, a real-time
//! render context reads them back, and a coordinator keeps the two apart:
//! loop crossfades at write time, tempo and phase sync between decks,
//! backpressure on the producer and auto-stop for played-through loops.

pub mod autostop;
pub mod config;
pub mod context;
pub mod coordinator;
pub mod error;
pub mod health;
pub mod loops;
pub mod messages;
pub mod producer;
pub mod render;
pub mod ring;
pub mod service;
pub mod sync;
pub mod types;
pub mod writer;

pub use coordinator::StreamCoordinator;
pub use error::{StreamError, StreamResult};
pub use messages::{EventBus, PauseReason, ServiceHandle, StreamCommand, StreamEvent};
pub use producer::{ChannelProducer, ProducerCommand, ProducerControl};
pub use render::RenderHandle;
pub use service::StreamService;
pub use types::*;
