//! Statemill Job
//!
//! Runtime for the long-running jobs of a statemill application.
//!
//! # Overview
//!
//! - [`Job`]: an async unit of work with a name, run once per start
//! - [`JobGroup`]: jobs started and stopped together, created from a
//!   [`JobRegistry`] under a health scope
//! - [`Lifecycle`]: ordered start/stop hooks; a job group is a hook
//! - [`Health`]: latest [`HealthReport`] per job, keyed by `scope/job`
//! - [`CancelToken`]: cooperative cancellation handed to every job
//!
//! Jobs are not restarted. A job returning an error is logged and marked
//! degraded; retrying is left to the job itself.
//!
//! # Example
//!
//! ```ignore
//! use statemill_job::prelude::*;
//!
//! let registry = JobRegistry::new(JobConfig::default());
//! let group = registry.new_group("example");
//! group.add(one_shot("tick", |cancel, health| async move {
//!     health.ok("running");
//!     cancel.cancelled().await;
//!     Ok(())
//! }))?;
//!
//! let mut lifecycle = Lifecycle::new();
//! lifecycle.append(group);
//! lifecycle.start().await?;
//! // ...
//! lifecycle.stop().await?;
//! ```

pub mod cancel;
pub mod config;
pub mod error;
pub mod health;
pub mod job;
pub mod lifecycle;
pub mod registry;

pub mod prelude;

pub use cancel::CancelToken;
pub use config::JobConfig;
pub use error::{JobError, Result};
pub use health::{Health, HealthLevel, HealthReport, HealthReporter};
pub use job::{one_shot, Job, OneShot};
pub use lifecycle::{Hook, Lifecycle};
pub use registry::{JobGroup, JobRegistry};
