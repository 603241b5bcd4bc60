//! Store configuration, loaded from RON.
//!
//! ```ron
//! (
//!     event_capacity: 256,
//!     max_regions_per_session: Some(4),
//!     compact_on_save: true,
//! )
//! ```
//!
//! Every field is optional; omitted fields take their defaults.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Default broadcast channel capacity for document events.
pub const DEFAULT_EVENT_CAPACITY: usize = 1024;

/// Tuning for a [`DocumentStore`](crate::DocumentStore).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Capacity of the event broadcast channel. Slow subscribers lag past this.
    pub event_capacity: usize,

    /// How many regions one session may hold open in one document.
    pub max_regions_per_session: Option<usize>,

    /// Fold closed regions back into the original block before writing.
    pub compact_on_save: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            event_capacity: DEFAULT_EVENT_CAPACITY,
            max_regions_per_session: None,
            compact_on_save: true,
        }
    }
}

impl StoreConfig {
    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    pub fn with_max_regions_per_session(mut self, limit: usize) -> Self {
        self.max_regions_per_session = Some(limit);
        self
    }

    pub fn with_compact_on_save(mut self, compact: bool) -> Self {
        self.compact_on_save = compact;
        self
    }

    /// Parse a RON config string.
    pub fn from_ron(text: &str) -> Result<Self, ConfigError> {
        Ok(ron::from_str(text)?)
    }

    /// Load a RON config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_ron(&text)
    }

    /// Load a RON config file, falling back to defaults if it does not exist.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        match Self::load(path) {
            Err(ConfigError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no config file, using defaults");
                Ok(Self::default())
            }
            other => other,
        }
    }
}

/// Error type for config loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON parse error: {0}")]
    Ron(#[from] ron::error::SpannedError),
}
