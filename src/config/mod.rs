// Config - group/key/value settings stored as RON
//
// Values are kept as strings and parsed when read, so unknown keys survive a
// load/save round trip untouched.

use crate::audio::format::{Presets, SoundcardFormat};
use crate::thread::scheduling::SchedulingPolicy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const SOUNDCARD: &str = "soundcard";
pub const THREAD: &str = "thread";
pub const RECALL: &str = "recall";

/// Config error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("RON parse error: {0}")]
    Parse(#[from] ron::error::SpannedError),

    #[error("RON error: {0}")]
    Serialize(#[from] ron::Error),

    #[error("Invalid value for {key}: {value:?}")]
    InvalidValue { key: String, value: String },
}

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    groups: BTreeMap<String, BTreeMap<String, String>>,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// `<config dir>/recall_engine/config.ron`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("recall_engine").join("config.ron"))
    }

    pub fn from_ron(text: &str) -> ConfigResult<Self> {
        Ok(ron::from_str(text)?)
    }

    pub fn to_ron(&self) -> ConfigResult<String> {
        Ok(ron::ser::to_string_pretty(
            self,
            ron::ser::PrettyConfig::default(),
        )?)
    }

    pub fn load(path: &Path) -> ConfigResult<Self> {
        Self::from_ron(&fs::read_to_string(path)?)
    }

    /// Load `path`, or an empty config if the file does not exist
    pub fn load_or_default(path: &Path) -> ConfigResult<Self> {
        match fs::read_to_string(path) {
            Ok(text) => Self::from_ron(&text),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(err.into()),
        }
    }

    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.to_ron()?)?;
        Ok(())
    }

    pub fn get(&self, group: &str, key: &str) -> Option<&str> {
        self.groups.get(group)?.get(key).map(String::as_str)
    }

    pub fn set(&mut self, group: &str, key: &str, value: impl Into<String>) {
        self.groups
            .entry(group.to_string())
            .or_default()
            .insert(key.to_string(), value.into());
    }

    pub fn remove(&mut self, group: &str, key: &str) -> Option<String> {
        self.groups.get_mut(group)?.remove(key)
    }

    /// Parse `group.key`, falling back to `default` when unset
    pub fn parse_or<T: FromStr>(&self, group: &str, key: &str, default: T) -> ConfigResult<T> {
        match self.get(group, key) {
            None => Ok(default),
            Some(value) => value.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: format!("{}.{}", group, key),
                value: value.to_string(),
            }),
        }
    }

    pub fn presets(&self) -> ConfigResult<Presets> {
        Ok(Presets {
            samplerate: self.parse_or(SOUNDCARD, "samplerate", Presets::DEFAULT_SAMPLERATE)?,
            buffer_size: self.parse_or(SOUNDCARD, "buffer-size", Presets::DEFAULT_BUFFER_SIZE)?,
            format: self.parse_or(SOUNDCARD, "format", SoundcardFormat::default())?,
            pcm_channels: self.parse_or(
                SOUNDCARD,
                "pcm-channels",
                Presets::DEFAULT_PCM_CHANNELS,
            )?,
        })
    }

    /// Ticks per second, one per buffer unless set
    pub fn max_precision(&self) -> ConfigResult<f64> {
        let presets = self.presets()?;
        let default = presets.samplerate as f64 / presets.buffer_size.max(1) as f64;
        let value: f64 = self.parse_or(THREAD, "max-precision", default)?;
        if value <= 0.0 || !value.is_finite() {
            return Err(ConfigError::InvalidValue {
                key: format!("{}.max-precision", THREAD),
                value: value.to_string(),
            });
        }
        Ok(value)
    }

    pub fn max_unused_threads(&self) -> ConfigResult<usize> {
        self.parse_or(THREAD, "thread-pool-max-unused-threads", 8)
    }

    pub fn scheduling_policy(&self) -> ConfigResult<SchedulingPolicy> {
        self.parse_or(THREAD, "super-threaded-scope", SchedulingPolicy::default())
    }

    pub fn bpm(&self) -> ConfigResult<f64> {
        self.parse_or(RECALL, "bpm", crate::graph::DEFAULT_BPM)
    }
}
