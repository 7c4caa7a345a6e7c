//! Path utilities for loopstream configuration files

use std::path::PathBuf;

/// Directory holding loopstream configuration
///
/// Returns: `~/.config/loopstream` (platform config dir, falling back to home)
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
        .join("loopstream")
}

/// Default stream config file
///
/// Returns: `~/.config/loopstream/config.yaml`
pub fn default_config_path() -> PathBuf {
    default_config_dir().join("config.yaml")
}
