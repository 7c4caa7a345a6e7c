//! Configuration file I/O
//!
//! YAML loading and saving for any serializable configuration type, plus the
//! validating loader the stream uses at startup.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;

use super::StreamConfig;

/// Read and parse a YAML file; `Ok(None)` when it does not exist
pub fn read_config<T>(path: &Path) -> Result<Option<T>>
where
    T: DeserializeOwned,
{
    if !path.exists() {
        return Ok(None);
    }
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;
    let config = serde_yaml::from_str(&contents)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;
    Ok(Some(config))
}

/// Load configuration from a YAML file
///
/// A missing file yields defaults; an unreadable or unparsable one logs a
/// warning and yields defaults too.
pub fn load_config<T>(path: &Path) -> T
where
    T: DeserializeOwned + Default,
{
    match read_config(path) {
        Ok(Some(config)) => {
            log::info!("load_config: loaded {:?}", path);
            config
        }
        Ok(None) => {
            log::info!("load_config: {:?} doesn't exist, using defaults", path);
            T::default()
        }
        Err(e) => {
            log::warn!("load_config: {:#}, using defaults", e);
            T::default()
        }
    }
}

/// Load a stream config and validate it
///
/// A file that parses but fails validation is replaced by defaults, so the
/// stream always starts with thresholds the controllers can run with.
pub fn load_stream_config(path: &Path) -> StreamConfig {
    let config: StreamConfig = load_config(path);
    match config.validate() {
        Ok(()) => config,
        Err(e) => {
            log::warn!("load_stream_config: {}, using defaults", e);
            StreamConfig::default()
        }
    }
}

/// Save configuration to a YAML file
///
/// Creates parent directories if they don't exist.
pub fn save_config<T>(config: &T, path: &Path) -> Result<()>
where
    T: Serialize,
{
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
    }

    let yaml = serde_yaml::to_string(config).context("Failed to serialize config to YAML")?;

    std::fs::write(path, yaml)
        .with_context(|| format!("Failed to write config file: {:?}", path))?;

    log::info!("save_config: saved {:?}", path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StreamConfig;

    #[test]
    fn test_load_nonexistent_returns_default() {
        let config: StreamConfig = load_config(Path::new("/nonexistent/path/config.yaml"));
        assert_eq!(config, StreamConfig::default());
    }

    #[test]
    fn test_stream_config_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.yaml");

        let mut config = StreamConfig::default();
        config.health.pause_above_seconds = 20.0;
        config.loops.safety_margin_frames = 512;

        save_config(&config, &path).unwrap();
        let loaded: StreamConfig = load_config(&path);

        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "sample_rate: 44100\nhealth:\n  burst_window_ms: 9000\n").unwrap();

        let loaded: StreamConfig = load_config(&path);
        assert_eq!(loaded.sample_rate, 44100);
        assert_eq!(loaded.health.burst_window_ms, 9000);
        assert_eq!(loaded.health.pause_above_seconds, StreamConfig::default().health.pause_above_seconds);
    }

    #[test]
    fn test_read_config_reports_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        assert!(read_config::<StreamConfig>(&path).unwrap().is_none());

        std::fs::write(&path, "frames_per_deck: lots").unwrap();
        let err = read_config::<StreamConfig>(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to parse config file"));
    }

    #[test]
    fn test_invalid_thresholds_fall_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(
            &path,
            "health:\n  pause_above_seconds: 4.0\n  resume_below_seconds: 8.0\n",
        )
        .unwrap();

        assert_eq!(load_stream_config(&path), StreamConfig::default());
    }

    #[test]
    fn test_garbage_yaml_returns_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "health: [not, a, map").unwrap();

        let loaded: StreamConfig = load_config(&path);
        assert_eq!(loaded, StreamConfig::default());
    }
}
