//! Periodic housekeeping: yearly application rollover and old job cleanup

use super::base::Worker;
use crate::{
    db::ApplicationRepository,
    metrics::APPLICATION_STATUS_CHANGES,
    models::ApplicationStatus,
    queue::{job_types, Job, JobQueue},
    Error, Result,
};
use async_trait::async_trait;
use std::sync::Arc;

pub struct MaintenanceWorker {
    job_queue: Arc<dyn JobQueue>,
    applications: ApplicationRepository,
    job_retention_days: i32,
}

impl MaintenanceWorker {
    pub fn new(
        job_queue: Arc<dyn JobQueue>,
        applications: ApplicationRepository,
        job_retention_days: i32,
    ) -> Self {
        Self {
            job_queue,
            applications,
            job_retention_days,
        }
    }

    async fn approved_to_studying(&self) -> Result<serde_json::Value> {
        let ids = self.applications.approved_to_studying().await?;
        if !ids.is_empty() {
            APPLICATION_STATUS_CHANGES
                .with_label_values(&[ApplicationStatus::StudyingForYears.as_str()])
                .inc_by(ids.len() as u64);
        }
        tracing::info!(updated = ids.len(), "Moved approved applications to studying");
        Ok(serde_json::json!({ "updated": ids.len() }))
    }

    async fn cleanup_jobs(&self, days: i32) -> Result<serde_json::Value> {
        let removed = self.job_queue.cleanup_old_jobs(days).await?;
        tracing::info!(removed, days, "Removed finished jobs");
        Ok(serde_json::json!({ "removed": removed }))
    }
}

#[async_trait]
impl Worker for MaintenanceWorker {
    fn name(&self) -> &str {
        "MaintenanceWorker"
    }

    fn supported_job_types(&self) -> &[&str] {
        &[job_types::APPLICATION_STUDYING, job_types::CLEANUP_JOBS]
    }

    async fn process_job(&self, job: Job) -> Result<()> {
        tracing::info!(job_id = %job.id, job_type = %job.job_type, "{} processing job", self.name());

        let results = match job.job_type.as_str() {
            job_types::APPLICATION_STUDYING => self.approved_to_studying().await?,
            job_types::CLEANUP_JOBS => {
                let days = job
                    .parameters
                    .get("days")
                    .and_then(|v| v.as_i64())
                    .and_then(|v| i32::try_from(v).ok())
                    .unwrap_or(self.job_retention_days);
                if days < 1 {
                    return Err(Error::Validation(format!(
                        "Job retention must be at least one day, got {days}"
                    )));
                }
                self.cleanup_jobs(days).await?
            }
            other => {
                return Err(Error::Internal(format!(
                    "{} can not process job type {other}",
                    self.name()
                )))
            }
        };

        self.job_queue.complete_job(job.id, Some(results)).await
    }
}
