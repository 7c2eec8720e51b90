//! Convenience re-exports for common types.

pub use crate::cancel::CancelToken;
pub use crate::config::JobConfig;
pub use crate::error::{JobError, Result};
pub use crate::health::{Health, HealthLevel, HealthReport, HealthReporter};
pub use crate::job::{one_shot, Job, OneShot};
pub use crate::lifecycle::{Hook, Lifecycle};
pub use crate::registry::{JobGroup, JobRegistry};
