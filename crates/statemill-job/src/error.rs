//! Error types for the job runtime.

use statemill_core::StateError;
use std::time::Duration;
use thiserror::Error;

/// Result type for job runtime operations.
pub type Result<T> = std::result::Result<T, JobError>;

/// Errors that can occur while registering, starting or stopping jobs.
#[derive(Debug, Error)]
pub enum JobError {
    /// A job with the same name already exists in the group.
    #[error("Job {job:?} is already registered in group {scope}")]
    DuplicateJob { scope: String, job: String },

    /// The group or lifecycle was started twice.
    #[error("{0} is already started")]
    AlreadyStarted(String),

    /// Stop was requested before start.
    #[error("{0} is not started")]
    NotStarted(String),

    /// A job did not return within the stop timeout and was aborted.
    #[error("Job {job} did not stop within {timeout:?}")]
    StopTimeout { job: String, timeout: Duration },

    /// The task running a job panicked or was aborted.
    #[error("Job {job} terminated abnormally: {source}")]
    Join {
        job: String,
        #[source]
        source: tokio::task::JoinError,
    },

    /// Store error.
    #[error("State error: {0}")]
    State(#[from] StateError),

    /// Other error.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
