use crate::error::Result;
use crate::types::Revision;
use serde::{Deserialize, Serialize};

/// Configuration for a derivation job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeriveConfig {
    /// Commit the effects applied before a failing change event.
    ///
    /// When `true` (default), a batch that fails partway keeps the effects of
    /// the events that succeeded and the tracker advances past them. When
    /// `false`, the whole batch is aborted and the tracker does not advance.
    #[serde(default = "default_commit_on_error")]
    pub commit_on_error: bool,

    /// Revision to start processing after.
    ///
    /// Default: `None`, start from the tracker's start revision (the
    /// retention floor, or the persisted cursor for durable trackers).
    #[serde(default)]
    pub initial_revision: Option<Revision>,
}

fn default_commit_on_error() -> bool {
    true
}

impl Default for DeriveConfig {
    fn default() -> Self {
        Self {
            commit_on_error: default_commit_on_error(),
            initial_revision: None,
        }
    }
}

impl DeriveConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a configuration from JSON; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn with_commit_on_error(mut self, commit: bool) -> Self {
        self.commit_on_error = commit;
        self
    }

    pub fn with_initial_revision(mut self, revision: Revision) -> Self {
        self.initial_revision = Some(revision);
        self
    }
}
