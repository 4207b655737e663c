use std::path::{Path, PathBuf};

use jiff::civil::Time;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::scheduling::bucket::{BucketBoundaries, BucketKey};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config from '{path}': {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config '{path}': {source}")]
    ParseFailed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Board settings, read from `config.json` next to the store.
///
/// Every field falls back to its default, so a partial file is fine:
///
/// ```json
/// { "afternoon_starts": "12:30", "default_duration_minutes": 90 }
/// ```
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct Config {
    /// First minute classified as afternoon
    pub afternoon_starts: Time,
    /// First minute classified as evening
    pub evening_starts: Time,
    /// Where a job lands when dropped into the morning column
    pub morning_slot: Time,
    pub afternoon_slot: Time,
    pub evening_slot: Time,
    /// Length used for jobs that have no window of their own yet
    pub default_duration_minutes: i64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            afternoon_starts: Time::constant(12, 0, 0, 0),
            evening_starts: Time::constant(17, 0, 0, 0),
            morning_slot: Time::constant(8, 0, 0, 0),
            afternoon_slot: Time::constant(13, 0, 0, 0),
            evening_slot: Time::constant(17, 0, 0, 0),
            default_duration_minutes: 60,
        }
    }
}

impl Config {
    /// Missing file means defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => {
                return Err(ConfigError::ReadFailed {
                    path: path.to_path_buf(),
                    source: e,
                });
            }
        };

        let config: Config =
            serde_json::from_str(&content).map_err(|e| ConfigError::ParseFailed {
                path: path.to_path_buf(),
                source: e,
            })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.afternoon_starts >= self.evening_starts {
            return Err(ConfigError::Invalid(format!(
                "afternoon_starts ({}) must be before evening_starts ({})",
                self.afternoon_starts, self.evening_starts
            )));
        }
        if self.default_duration_minutes <= 0 {
            return Err(ConfigError::Invalid(String::from(
                "default_duration_minutes must be positive",
            )));
        }
        let boundaries = self.boundaries();
        // A slot has to classify back into its own column.
        let slots = [
            (self.morning_slot, BucketKey::Morning),
            (self.afternoon_slot, BucketKey::Afternoon),
            (self.evening_slot, BucketKey::Evening),
        ];
        if slots
            .iter()
            .any(|(slot, bucket)| boundaries.classify(*slot) != *bucket)
        {
            return Err(ConfigError::Invalid(String::from(
                "each bucket slot must fall inside its own bucket",
            )));
        }
        Ok(())
    }

    pub fn boundaries(&self) -> BucketBoundaries {
        BucketBoundaries {
            afternoon_starts: self.afternoon_starts,
            evening_starts: self.evening_starts,
            morning_slot: self.morning_slot,
            afternoon_slot: self.afternoon_slot,
            evening_slot: self.evening_slot,
            default_duration: jiff::SignedDuration::from_mins(self.default_duration_minutes),
        }
    }
}
