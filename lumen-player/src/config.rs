//! Engine configuration persistence
//!
//! Simple key=value text file; unknown keys are ignored and a missing or
//! unparsable file yields defaults.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::transport::DEFAULT_VOLUME;

/// What happens when Next runs off the end of the queue with repeat off
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueueEndPolicy {
    /// Wrap to the head and keep playing
    #[default]
    Wrap,
    /// Load the head but leave playback paused
    Stop,
}

/// Engine configuration
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub queue_end_policy: QueueEndPolicy,
    /// Initial output volume [0, 1]
    pub volume: f32,
    /// Position tick cadence in ms
    pub tick_interval_ms: u64,
    /// Minimum interval between spectrum frames in ms
    pub spectrum_min_interval_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            queue_end_policy: QueueEndPolicy::Wrap,
            volume: DEFAULT_VOLUME,
            tick_interval_ms: 100,
            spectrum_min_interval_ms: 16,
        }
    }
}

impl EngineConfig {
    /// Load config from the default location
    ///
    /// Returns defaults if the file doesn't exist or can't be parsed.
    pub fn load() -> Self {
        let path = Self::config_path();
        Self::load_from(&path).unwrap_or_default()
    }

    pub fn load_from(path: &Path) -> io::Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(Self::parse(&content))
    }

    pub fn save(&self) -> io::Result<()> {
        let path = Self::config_path();
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.serialize())
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("lumen")
            .join("config.txt")
    }

    fn parse(content: &str) -> Self {
        let mut config = Self::default();

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if let Some((key, value)) = line.split_once('=') {
                let key = key.trim();
                let value = value.trim();

                match key {
                    "queue_end_policy" => {
                        config.queue_end_policy = match value {
                            "stop" => QueueEndPolicy::Stop,
                            _ => QueueEndPolicy::Wrap,
                        };
                    }
                    "volume" => {
                        if let Ok(v) = value.parse::<f32>() {
                            config.volume = v.clamp(0.0, 1.0);
                        }
                    }
                    "tick_interval_ms" => {
                        if let Ok(v) = value.parse::<u64>() {
                            config.tick_interval_ms = v.max(10);
                        }
                    }
                    "spectrum_min_interval_ms" => {
                        if let Ok(v) = value.parse::<u64>() {
                            config.spectrum_min_interval_ms = v;
                        }
                    }
                    _ => {} // Ignore unknown keys
                }
            }
        }

        config
    }

    fn serialize(&self) -> String {
        let policy = match self.queue_end_policy {
            QueueEndPolicy::Wrap => "wrap",
            QueueEndPolicy::Stop => "stop",
        };
        [
            "# Lumen Configuration".to_string(),
            format!("queue_end_policy={policy}"),
            format!("volume={}", self.volume),
            format!("tick_interval_ms={}", self.tick_interval_ms),
            format!("spectrum_min_interval_ms={}", self.spectrum_min_interval_ms),
        ]
        .join("\n")
    }
}
