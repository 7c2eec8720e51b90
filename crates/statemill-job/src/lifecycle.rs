use async_trait::async_trait;

use crate::error::{JobError, Result};

/// Something started and stopped with the application
#[async_trait]
pub trait Hook: Send + Sync {
    fn name(&self) -> &str;

    async fn start(&self) -> Result<()>;

    async fn stop(&self) -> Result<()>;
}

/// Ordered list of hooks
///
/// Hooks start in the order they were appended and stop in reverse. If a
/// hook fails to start, the hooks already started are stopped again before
/// the error is returned.
#[derive(Default)]
pub struct Lifecycle {
    hooks: Vec<Box<dyn Hook>>,
    started: usize,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, hook: impl Hook + 'static) {
        self.hooks.push(Box::new(hook));
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    pub fn is_started(&self) -> bool {
        self.started > 0
    }

    pub async fn start(&mut self) -> Result<()> {
        if self.is_started() {
            return Err(JobError::AlreadyStarted("lifecycle".into()));
        }

        for index in 0..self.hooks.len() {
            let hook = &self.hooks[index];
            if let Err(e) = hook.start().await {
                tracing::error!("Start hook {} failed: {}", hook.name(), e);
                self.started = index;
                if let Err(stop_err) = self.stop_started().await {
                    tracing::warn!("Rollback after failed start: {}", stop_err);
                }
                return Err(e);
            }
            self.started = index + 1;
        }
        Ok(())
    }

    /// Stop every started hook in reverse order; returns the first error
    pub async fn stop(&mut self) -> Result<()> {
        if !self.is_started() {
            return Err(JobError::NotStarted("lifecycle".into()));
        }
        self.stop_started().await
    }

    async fn stop_started(&mut self) -> Result<()> {
        let mut first_error = None;
        for hook in self.hooks[..self.started].iter().rev() {
            if let Err(e) = hook.stop().await {
                tracing::warn!("Stop hook {} failed: {}", hook.name(), e);
                first_error.get_or_insert(e);
            }
        }
        self.started = 0;
        first_error.map_or(Ok(()), Err)
    }
}
