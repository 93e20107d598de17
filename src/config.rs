use serde::Deserialize;

use crate::error::ConfigError;

/// Fingerprint size used when none is configured
pub const DEFAULT_FINGERPRINT_SIZE: usize = 1000;

/// Smallest accepted fingerprint size. Shorter prefixes collide too easily between unrelated logs that share a header.
pub const MIN_FINGERPRINT_SIZE: usize = 16;

/// Poll cycles an unmatched record survives before it is forgotten
pub const DEFAULT_GRACE_PERIOD: u32 = 3;

/// Where to start reading files that are already present when tracking begins
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StartAt {
    #[default]
    Beginning,
    /// Skip content that existed before the first poll. Files appearing later are always read from the start.
    End,
}

/// Settings consumed by `Fingerprinter` and `FileTracker`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FingerprintConfig {
    /// Number of leading bytes used to identify a file
    #[serde(default = "default_fingerprint_size")]
    pub fingerprint_size: usize,

    /// Number of consecutive poll cycles a file may go unseen before it is forgotten
    #[serde(default = "default_grace_period")]
    pub grace_period: u32,

    #[serde(default)]
    pub start_at: StartAt,
}

fn default_fingerprint_size() -> usize {
    DEFAULT_FINGERPRINT_SIZE
}

fn default_grace_period() -> u32 {
    DEFAULT_GRACE_PERIOD
}

impl Default for FingerprintConfig {
    fn default() -> Self {
        Self {
            fingerprint_size: DEFAULT_FINGERPRINT_SIZE,
            grace_period: DEFAULT_GRACE_PERIOD,
            start_at: StartAt::default(),
        }
    }
}

impl FingerprintConfig {
    pub fn with_fingerprint_size(mut self, size: usize) -> Self {
        self.fingerprint_size = size;
        self
    }

    pub fn with_grace_period(mut self, cycles: u32) -> Self {
        self.grace_period = cycles;
        self
    }

    pub fn with_start_at(mut self, start_at: StartAt) -> Self {
        self.start_at = start_at;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fingerprint_size < MIN_FINGERPRINT_SIZE {
            return Err(ConfigError::FingerprintTooSmall {
                size: self.fingerprint_size,
                min: MIN_FINGERPRINT_SIZE,
            });
        }
        Ok(())
    }
}
