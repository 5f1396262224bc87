//! Worker trait shared by all background job processors

use crate::{queue::Job, Result};
use async_trait::async_trait;

#[derive(Debug, Clone, Copy)]
pub struct WorkerConfig {
    pub max_concurrent_jobs: usize,
    pub poll_interval_seconds: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 4,
            poll_interval_seconds: 5,
        }
    }
}

/// A processor for one or more job types.
///
/// `process_job` completes the job itself on success; an error is reported
/// back to the queue by the runner, which reschedules the job while its retry
/// policy allows.
#[async_trait]
pub trait Worker: Send + Sync {
    fn name(&self) -> &str;

    fn supported_job_types(&self) -> &[&str];

    async fn start(&self) -> Result<()> {
        tracing::info!("{} starting...", self.name());
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        tracing::info!("{} stopping...", self.name());
        Ok(())
    }

    async fn process_job(&self, job: Job) -> Result<()>;
}
