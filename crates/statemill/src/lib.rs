//! Statemill: reactive derived tables
//!
//! Statemill keeps tables in sync with each other:
//! - **Table store**: keyed, revisioned tables with exclusive write
//!   transactions and atomic commits ([`MemDb`])
//! - **Delete trackers**: named change subscriptions that include tombstones
//! - **Derivations**: jobs that feed every change of an input table through
//!   a transform and apply the result to an output table ([`Derive`])
//! - **Jobs**: groups of long-running tasks with lifecycle hooks,
//!   cancellation and health reporting ([`JobRegistry`], [`Lifecycle`])
//!
//! # Quick Start
//!
//! ```no_run
//! use statemill::prelude::*;
//!
//! #[derive(Clone)]
//! struct Device { name: String, up: bool }
//!
//! # async fn run() -> anyhow::Result<()> {
//! let db = Arc::new(MemDb::default());
//! let devices = db
//!     .table("devices", PrimaryIndexer::new("name", |d: &Device| d.name.clone()))
//!     .create()?;
//! let up = db
//!     .table("up", PrimaryIndexer::new("name", |d: &Device| d.name.clone()))
//!     .create()?;
//!
//! let jobs = JobRegistry::new(JobConfig::default());
//! let mut lifecycle = Lifecycle::new();
//! let progress = Derive::new("up-devices", db.clone(), devices, up, |d: Device, deleted: bool| {
//!     match (deleted, d.up) {
//!         (false, true) => (d, DeriveResult::Insert),
//!         _ => (d, DeriveResult::Delete),
//!     }
//! })
//! .register(&jobs, "devices", &mut lifecycle)?;
//!
//! lifecycle.start().await?;
//! progress.wait_for(1).await;
//! lifecycle.stop().await?;
//! # Ok(())
//! # }
//! ```

pub mod prelude;

// Re-export core types
pub use statemill_core::{
    config::{DeriveConfig, MemDbConfig, TrackerDurability},
    error::{Result, StateError},
    observe,
    traits::{
        DeleteTracker, PrimaryIndexer, ProcessError, Processed, Query, RwTable, StateStore, Table,
        TrackerGuard, WriteTxn,
    },
    types::{Change, CommitInfo, Revision},
    watch::Watch,
};

// Re-export implementations
pub use statemill_derive::{derive, Derive, DeriveParams, DeriveProgress, DeriveResult};
pub use statemill_job::{
    one_shot, CancelToken, Health, HealthLevel, HealthReport, HealthReporter, Hook, Job,
    JobConfig, JobError, JobGroup, JobRegistry, Lifecycle, OneShot,
};
pub use statemill_memdb::{MemDb, MemDeleteTracker, MemTable, MemTxn, TableBuilder, TableState};
