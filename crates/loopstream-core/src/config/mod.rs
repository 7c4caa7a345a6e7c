//! Configuration for the stream coordinator
//!
//! - Generic YAML config loading/saving
//! - Default config paths
//! - [`StreamConfig`] and its sections
//!
//! # Usage
//!
//! ```ignore
//! use loopstream_core::config::{default_config_path, load_stream_config};
//!
//! let config = load_stream_config(&default_config_path());
//! ```

mod io;
mod paths;
mod stream;

pub use io::{load_config, load_stream_config, read_config, save_config};
pub use paths::{default_config_dir, default_config_path};
pub use stream::{AutoStopConfig, HealthConfig, LoopConfig, StreamConfig, SyncConfig};
