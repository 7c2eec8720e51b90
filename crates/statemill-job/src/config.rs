//! Job runtime configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration shared by every group of a [`JobRegistry`](crate::JobRegistry).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobConfig {
    /// How long `stop` waits for each job to return after cancellation.
    #[serde(default = "default_stop_timeout_ms")]
    pub stop_timeout_ms: u64,
}

fn default_stop_timeout_ms() -> u64 {
    5000
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            stop_timeout_ms: default_stop_timeout_ms(),
        }
    }
}

impl JobConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the stop timeout in milliseconds.
    pub fn with_stop_timeout_ms(mut self, timeout: u64) -> Self {
        self.stop_timeout_ms = timeout;
        self
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }
}
