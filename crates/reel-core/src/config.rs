//! Pipeline configuration
//!
//! Generic YAML load/save plus the [`PipelineConfig`] struct the library
//! consumers tune. Loading is forgiving: a missing file means defaults, a
//! broken file logs a warning and means defaults. Saving is strict.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::target::ThreadPriority;

/// Knobs for sources and targets, loadable from YAML
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// How many seconds of decoded frames a queued source keeps ahead
    pub lookahead_secs: f64,
    /// Samples per audio frame (per channel)
    pub audio_block_size: usize,
    /// Scheduling class for audio render threads
    pub audio_priority: ThreadPriority,
    /// Scheduling class for video render threads
    pub video_priority: ThreadPriority,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            lookahead_secs: crate::source::DEFAULT_LOOKAHEAD_SECS,
            audio_block_size: crate::types::DEFAULT_BLOCK_SIZE,
            audio_priority: ThreadPriority::TimeCritical,
            video_priority: ThreadPriority::High,
        }
    }
}

/// Load configuration from a YAML file
///
/// A missing file yields `T::default()`; an unreadable or unparsable file
/// logs a warning and also yields the default.
pub fn load_config<T>(path: &Path) -> T
where
    T: DeserializeOwned + Default,
{
    if !path.exists() {
        log::info!("load_config: {path:?} does not exist, using defaults");
        return T::default();
    }

    match std::fs::read_to_string(path) {
        Ok(contents) => match serde_yaml::from_str::<T>(&contents) {
            Ok(config) => {
                log::info!("load_config: loaded {path:?}");
                config
            }
            Err(e) => {
                log::warn!("load_config: failed to parse {path:?}: {e}, using defaults");
                T::default()
            }
        },
        Err(e) => {
            log::warn!("load_config: failed to read {path:?}: {e}, using defaults");
            T::default()
        }
    }
}

/// Save configuration to a YAML file, creating parent directories
pub fn save_config<T>(config: &T, path: &Path) -> Result<()>
where
    T: Serialize,
{
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config directory: {parent:?}"))?;
    }

    let yaml = serde_yaml::to_string(config).context("Failed to serialize config to YAML")?;
    std::fs::write(path, yaml).with_context(|| format!("Failed to write config file: {path:?}"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let config: PipelineConfig = load_config(Path::new("/nonexistent/reel.yaml"));
        assert_eq!(config, PipelineConfig::default());
        assert_eq!(config.lookahead_secs, 5.0);
        assert_eq!(config.audio_block_size, 1024);
    }

    #[test]
    fn roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("reel.yaml");

        let config = PipelineConfig {
            lookahead_secs: 2.5,
            audio_block_size: 512,
            audio_priority: ThreadPriority::Normal,
            video_priority: ThreadPriority::Normal,
        };
        save_config(&config, &path).unwrap();

        let loaded: PipelineConfig = load_config(&path);
        assert_eq!(loaded, config);
    }

    #[test]
    fn broken_yaml_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reel.yaml");
        std::fs::write(&path, "lookahead_secs: [not a number").unwrap();

        let config: PipelineConfig = load_config(&path);
        assert_eq!(config, PipelineConfig::default());
    }

    #[test]
    fn partial_files_keep_defaults_for_the_rest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reel.yaml");
        std::fs::write(&path, "lookahead_secs: 1.0\n").unwrap();

        let config: PipelineConfig = load_config(&path);
        assert_eq!(config.lookahead_secs, 1.0);
        assert_eq!(config.audio_block_size, 1024);
        assert_eq!(config.audio_priority, ThreadPriority::TimeCritical);
    }
}
