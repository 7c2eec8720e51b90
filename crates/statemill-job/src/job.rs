use async_trait::async_trait;
use std::future::Future;

use crate::cancel::CancelToken;
use crate::health::HealthReporter;

/// A long-running unit of work owned by a [`JobGroup`](crate::JobGroup)
///
/// `run` is called once when the group starts. It should return promptly
/// after `cancel` fires; returning `Ok(())` marks the job stopped, returning
/// an error marks it degraded.
#[async_trait]
pub trait Job: Send + 'static {
    fn name(&self) -> &str;

    async fn run(self: Box<Self>, cancel: CancelToken, health: HealthReporter)
        -> anyhow::Result<()>;
}

/// Job backed by a closure that runs to completion once
pub struct OneShot<F> {
    name: String,
    run: F,
}

/// Wrap `run` as a job called `name`
pub fn one_shot<F, Fut>(name: impl Into<String>, run: F) -> OneShot<F>
where
    F: FnOnce(CancelToken, HealthReporter) -> Fut + Send + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    OneShot {
        name: name.into(),
        run,
    }
}

#[async_trait]
impl<F, Fut> Job for OneShot<F>
where
    F: FnOnce(CancelToken, HealthReporter) -> Fut + Send + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(
        self: Box<Self>,
        cancel: CancelToken,
        health: HealthReporter,
    ) -> anyhow::Result<()> {
        (self.run)(cancel, health).await
    }
}
