//! Statemill Prelude
//!
//! Import this to get all commonly used types and traits:
//!
//! ```
//! use statemill::prelude::*;
//! ```

// Core types
pub use crate::{Change, CommitInfo, Result, Revision, StateError, Watch};

// Configs
pub use crate::{DeriveConfig, JobConfig, MemDbConfig, TrackerDurability};

// Traits
pub use crate::{DeleteTracker, Hook, Job, RwTable, StateStore, Table, WriteTxn};

// Tables
pub use crate::{MemDb, MemTable, PrimaryIndexer, Query};

// Derivation
pub use crate::{derive, Derive, DeriveParams, DeriveProgress, DeriveResult};

// Jobs
pub use crate::{
    one_shot, CancelToken, Health, HealthLevel, HealthReporter, JobError, JobRegistry, Lifecycle,
};

// Re-export common external deps
pub use anyhow;
pub use serde::{Deserialize, Serialize};
pub use std::sync::Arc;
pub use tracing;
