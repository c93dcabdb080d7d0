#![forbid(unsafe_code)]

//! History limits.
//!
//! ```toml
//! # retrace-history.toml
//! min_levels = 5
//! max_bytes = 67108864
//! max_levels = 200
//! ```
//!
//! Eviction drops the oldest undo entries while the stack holds more than
//! `min_levels` entries *and* exceeds `max_bytes`, so small histories always
//! keep a few steps no matter how large they are. `max_levels`, when set, is a
//! hard cap on the number of entries.

#[cfg(feature = "history-config")]
use std::path::Path;

#[cfg(feature = "history-config")]
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Configuration for an [`UndoHistory`](crate::UndoHistory).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "history-config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "history-config", serde(default))]
pub struct HistoryConfig {
    /// Entries always kept, regardless of size.
    pub min_levels: usize,
    /// Byte budget for the undo stack beyond `min_levels`.
    pub max_bytes: usize,
    /// Hard cap on undo stack depth.
    pub max_levels: Option<usize>,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            min_levels: 5,
            max_bytes: 64 * 1024 * 1024, // 64 MiB
            max_levels: None,
        }
    }
}

impl HistoryConfig {
    /// Create a configuration with custom limits.
    #[must_use]
    pub fn new(min_levels: usize, max_bytes: usize) -> Self {
        Self {
            min_levels,
            max_bytes,
            max_levels: None,
        }
    }

    /// Set a hard cap on undo depth.
    #[must_use]
    pub fn with_max_levels(mut self, max_levels: usize) -> Self {
        self.max_levels = Some(max_levels);
        self
    }

    /// Never evict anything (for testing).
    #[must_use]
    pub fn unlimited() -> Self {
        Self {
            min_levels: usize::MAX,
            max_bytes: usize::MAX,
            max_levels: None,
        }
    }

    /// Check the limits for consistency.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(max) = self.max_levels
            && self.min_levels > max
        {
            return Err(ConfigError::Invalid {
                message: format!(
                    "min_levels ({}) exceeds max_levels ({max})",
                    self.min_levels
                ),
            });
        }
        Ok(())
    }

    /// Load from a TOML string.
    #[cfg(feature = "history-config")]
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file on disk.
    #[cfg(feature = "history-config")]
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    /// Load from a JSON string.
    #[cfg(feature = "history-config")]
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to a TOML string.
    #[cfg(feature = "history-config")]
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string(self).map_err(|e| ConfigError::Invalid {
            message: e.to_string(),
        })
    }
}
