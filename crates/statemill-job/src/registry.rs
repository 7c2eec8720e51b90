use async_trait::async_trait;
use parking_lot::Mutex;
use statemill_core::observe;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::cancel::CancelToken;
use crate::config::JobConfig;
use crate::error::{JobError, Result};
use crate::health::{Health, HealthReporter};
use crate::job::Job;
use crate::lifecycle::Hook;

/// Creates job groups that share a configuration and a health registry
#[derive(Debug, Clone, Default)]
pub struct JobRegistry {
    config: JobConfig,
    health: Health,
}

impl JobRegistry {
    pub fn new(config: JobConfig) -> Self {
        Self {
            config,
            health: Health::new(),
        }
    }

    pub fn config(&self) -> &JobConfig {
        &self.config
    }

    pub fn health(&self) -> &Health {
        &self.health
    }

    /// New, empty group whose jobs report health as `scope/<job>`
    pub fn new_group(&self, scope: impl Into<String>) -> JobGroup {
        JobGroup {
            inner: Arc::new(GroupInner {
                scope: scope.into(),
                config: self.config.clone(),
                health: self.health.clone(),
                names: Mutex::new(HashSet::new()),
                pending: Mutex::new(Vec::new()),
                running: Mutex::new(Vec::new()),
                cancel: CancelToken::new(),
                started: AtomicBool::new(false),
            }),
        }
    }
}

struct RunningJob {
    id: String,
    handle: JoinHandle<()>,
}

struct GroupInner {
    scope: String,
    config: JobConfig,
    health: Health,
    names: Mutex<HashSet<String>>,
    pending: Mutex<Vec<Box<dyn Job>>>,
    running: Mutex<Vec<RunningJob>>,
    cancel: CancelToken,
    started: AtomicBool,
}

/// Set of jobs started and stopped together
///
/// A group is a lifecycle [`Hook`]: starting it spawns one tokio task per
/// job, stopping it cancels every job and waits for them to return.
#[derive(Clone)]
pub struct JobGroup {
    inner: Arc<GroupInner>,
}

impl JobGroup {
    pub fn scope(&self) -> &str {
        &self.inner.scope
    }

    pub fn len(&self) -> usize {
        self.inner.names.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_started(&self) -> bool {
        self.inner.started.load(Ordering::SeqCst)
    }

    /// Add a job; fails if the group already started or the name is taken
    pub fn add(&self, job: impl Job) -> Result<()> {
        if self.is_started() {
            return Err(JobError::AlreadyStarted(format!("job group {}", self.inner.scope)));
        }

        let name = job.name().to_string();
        if !self.inner.names.lock().insert(name.clone()) {
            return Err(JobError::DuplicateJob {
                scope: self.inner.scope.clone(),
                job: name,
            });
        }

        self.inner.pending.lock().push(Box::new(job));
        Ok(())
    }
}

async fn run_job(job: Box<dyn Job>, cancel: CancelToken, health: HealthReporter) {
    let id = health.id().to_string();

    match job.run(cancel, health.clone()).await {
        Ok(()) => {
            tracing::info!(job = %id, "Job stopped");
            health.stopped("job returned");
            observe::record_job_exit(true);
        }
        Err(e) => {
            tracing::error!(job = %id, error = %format!("{e:#}"), "Job failed");
            health.degraded("job failed", &format!("{e:#}"));
            observe::record_job_exit(false);
        }
    }
}

#[async_trait]
impl Hook for JobGroup {
    fn name(&self) -> &str {
        &self.inner.scope
    }

    async fn start(&self) -> Result<()> {
        if self.inner.started.swap(true, Ordering::SeqCst) {
            return Err(JobError::AlreadyStarted(format!("job group {}", self.inner.scope)));
        }

        let jobs = std::mem::take(&mut *self.inner.pending.lock());
        let mut running = Vec::with_capacity(jobs.len());

        for job in jobs {
            let id = format!("{}/{}", self.inner.scope, job.name());
            let reporter = self.inner.health.reporter(id.clone());
            let handle = tokio::spawn(run_job(job, self.inner.cancel.clone(), reporter));
            running.push(RunningJob { id, handle });
        }

        tracing::info!(
            "Started job group {} with {} job(s)",
            self.inner.scope,
            running.len()
        );
        *self.inner.running.lock() = running;
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        if !self.is_started() {
            return Err(JobError::NotStarted(format!(
                "job group {}",
                self.inner.scope
            )));
        }

        self.inner.cancel.cancel();
        let running = std::mem::take(&mut *self.inner.running.lock());
        let timeout = self.inner.config.stop_timeout();
        let mut first_error = None;

        for RunningJob { id, mut handle } in running {
            let outcome = match tokio::time::timeout(timeout, &mut handle).await {
                Ok(Ok(())) => continue,
                Ok(Err(source)) => JobError::Join { job: id, source },
                Err(_) => {
                    handle.abort();
                    JobError::StopTimeout { job: id, timeout }
                }
            };
            tracing::warn!("Job group {}: {}", self.inner.scope, outcome);
            first_error.get_or_insert(outcome);
        }

        tracing::info!("Stopped job group {}", self.inner.scope);
        first_error.map_or(Ok(()), Err)
    }
}
