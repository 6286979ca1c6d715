//! Player configuration — loaded from ~/.mmlplay/config.yaml.
//!
//! Every field has a default, so a partial file (or no file at all) is fine.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::audio::Waveform;
use crate::event::PlaybackDefaults;
use crate::playback::{NoteEnvelope, PlayerOptions, INTER_NOTE};

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Yaml {
        path: PathBuf,
        source: serde_yaml::Error,
    },
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Starting octave, tempo, length and volume for every track.
    pub defaults: PlaybackDefaults,
    pub envelope: EnvelopeConfig,
    pub audio: AudioConfig,
}

/// Note edge shaping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvelopeConfig {
    /// Attack and release ramp in seconds.
    #[serde(default = "default_inter_note")]
    pub inter_note: f64,
}

fn default_inter_note() -> f64 {
    INTER_NOTE
}

impl Default for EnvelopeConfig {
    fn default() -> Self {
        Self {
            inter_note: default_inter_note(),
        }
    }
}

/// Output device settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioConfig {
    #[serde(default)]
    pub waveform: Waveform,
    /// Master volume, 0.0 to 1.0.
    #[serde(default = "default_master_volume")]
    pub master_volume: f32,
    /// Overrides the device's preferred sample rate.
    #[serde(default)]
    pub sample_rate: Option<u32>,
    /// Seconds between scheduling and the first note.
    #[serde(default = "default_lead_in")]
    pub lead_in: f64,
}

fn default_master_volume() -> f32 {
    0.5
}

fn default_lead_in() -> f64 {
    0.1
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            waveform: Waveform::default(),
            master_volume: default_master_volume(),
            sample_rate: None,
            lead_in: default_lead_in(),
        }
    }
}

impl Config {
    /// The standard path (~/.mmlplay/config.yaml), if a home directory exists.
    pub fn path() -> Option<PathBuf> {
        Some(dirs::home_dir()?.join(".mmlplay").join("config.yaml"))
    }

    /// Load from the standard path. A missing file yields the defaults; an
    /// unreadable or invalid one is logged and also yields the defaults.
    pub fn load() -> Self {
        let Some(path) = Self::path() else {
            return Self::default();
        };
        if !path.exists() {
            debug!(path = %path.display(), "no config file");
            return Self::default();
        }
        Self::load_from(&path).unwrap_or_else(|e| {
            warn!("{e}; using defaults");
            Self::default()
        })
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_yaml::from_str(&content).map_err(|source| ConfigError::Yaml {
            path: path.to_path_buf(),
            source,
        })
    }
}

impl From<&Config> for PlayerOptions {
    fn from(config: &Config) -> Self {
        Self {
            defaults: config.defaults,
            envelope: NoteEnvelope::new(config.envelope.inter_note),
            lead_in: config.audio.lead_in,
        }
    }
}
