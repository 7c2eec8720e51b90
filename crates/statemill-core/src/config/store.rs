use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// What happens to a delete tracker's bookkeeping when it is closed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackerDurability {
    /// Bookkeeping is dropped on close. A later registration under the same
    /// name starts from the retention floor and tombstones recorded while no
    /// tracker was registered are gone.
    #[default]
    Ephemeral,

    /// The tracker's cursor survives close. A later registration under the
    /// same name resumes from it and tombstones after it are retained.
    Durable,
}

/// Configuration for the in-memory table store
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemDbConfig {
    /// Delete tracker durability
    #[serde(default)]
    pub tracker_durability: TrackerDurability,

    /// Maximum time to wait for a table write lock, in milliseconds.
    /// Default: `None`, wait indefinitely
    #[serde(default)]
    pub lock_timeout_ms: Option<u64>,
}

impl MemDbConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a configuration from JSON; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn with_tracker_durability(mut self, durability: TrackerDurability) -> Self {
        self.tracker_durability = durability;
        self
    }

    pub fn with_lock_timeout_ms(mut self, ms: u64) -> Self {
        self.lock_timeout_ms = Some(ms);
        self
    }

    pub fn lock_timeout(&self) -> Option<Duration> {
        self.lock_timeout_ms.map(Duration::from_millis)
    }
}
