//! In-process job queue.
//!
//! Jobs run to completion inside `enqueue`, so a request that schedules a search
//! sync observes the index already updated. Used by integration tests and
//! single-process deployments without workers.

use super::{job_types, Job, JobPriority, JobQueue, JobStatus, RetryPolicy};
use crate::{db::ApplicationRepository, services::SearchSyncService, Result};
use async_trait::async_trait;
use chrono::Utc;
use futures::stream::BoxStream;
use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
};
use uuid::Uuid;

pub struct InlineJobQueue {
    search_sync: Arc<SearchSyncService>,
    applications: ApplicationRepository,
    jobs: Mutex<HashMap<Uuid, Job>>,
}

impl InlineJobQueue {
    pub fn new(search_sync: Arc<SearchSyncService>, applications: ApplicationRepository) -> Self {
        Self {
            search_sync,
            applications,
            jobs: Mutex::new(HashMap::new()),
        }
    }

    fn jobs(&self) -> MutexGuard<'_, HashMap<Uuid, Job>> {
        self.jobs.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn update_job(&self, job_id: Uuid, f: impl FnOnce(&mut Job)) {
        if let Some(job) = self.jobs().get_mut(&job_id) {
            f(job);
        }
    }

    async fn run(&self, job_type: &str) -> Result<serde_json::Value> {
        match job_type {
            job_types::SEARCH_SYNC => {
                let pass = self.search_sync.synchronize().await?;
                Ok(serde_json::json!({
                    "synchronized": pass.synchronized,
                    "succeeded": pass.succeeded,
                }))
            }
            job_types::APPLICATION_STUDYING => {
                let updated = self.applications.approved_to_studying().await?;
                Ok(serde_json::json!({ "updated": updated.len() }))
            }
            // Nothing persists here, so there is nothing to clean up.
            _ => Ok(serde_json::Value::Null),
        }
    }
}

#[async_trait]
impl JobQueue for InlineJobQueue {
    async fn enqueue(
        &self,
        job_type: String,
        parameters: serde_json::Value,
        priority: JobPriority,
        retry_policy: Option<RetryPolicy>,
    ) -> Result<Uuid> {
        let job_id = Uuid::new_v4();
        let now = Utc::now();
        let retry_policy = serde_json::to_value(retry_policy.unwrap_or_default())
            .map_err(|e| crate::Error::Internal(format!("Failed to encode retry policy: {e}")))?;

        self.jobs().insert(
            job_id,
            Job {
                id: job_id,
                job_type: job_type.clone(),
                status: JobStatus::Running,
                priority: priority as i32,
                parameters,
                progress: None,
                retry_policy,
                retry_count: 0,
                processed_items: 0,
                total_items: None,
                error_message: None,
                last_error_at: None,
                scheduled_at: None,
                cancel_requested: false,
                created_at: now,
                started_at: Some(now),
                completed_at: None,
                worker_id: Some("inline".to_string()),
            },
        );

        match self.run(&job_type).await {
            Ok(result) => self.complete_job(job_id, Some(result)).await?,
            Err(e) => {
                self.fail_job(job_id, e.to_string(), false).await?;
                return Err(e);
            }
        }
        Ok(job_id)
    }

    async fn dequeue(&self, _job_types: &[String], _worker_id: &str) -> Result<Option<Job>> {
        Ok(None)
    }

    async fn listen<'a>(&'a self, _job_types: &'a [String]) -> Result<BoxStream<'a, Result<Job>>> {
        Ok(Box::pin(futures::stream::empty()))
    }

    async fn get_job(&self, job_id: Uuid) -> Result<Option<Job>> {
        Ok(self.jobs().get(&job_id).cloned())
    }

    async fn update_progress(
        &self,
        job_id: Uuid,
        processed_items: i32,
        total_items: Option<i32>,
        progress_data: Option<serde_json::Value>,
    ) -> Result<()> {
        self.update_job(job_id, |job| {
            job.processed_items = processed_items;
            if total_items.is_some() {
                job.total_items = total_items;
            }
            if progress_data.is_some() {
                job.progress = progress_data;
            }
        });
        Ok(())
    }

    async fn complete_job(
        &self,
        job_id: Uuid,
        final_results: Option<serde_json::Value>,
    ) -> Result<()> {
        self.update_job(job_id, |job| {
            job.status = if job.cancel_requested {
                JobStatus::Cancelled
            } else {
                JobStatus::Completed
            };
            job.completed_at = Some(Utc::now());
            if final_results.is_some() {
                job.progress = final_results;
            }
        });
        Ok(())
    }

    async fn fail_job(&self, job_id: Uuid, error_message: String, _retry: bool) -> Result<()> {
        let now = Utc::now();
        self.update_job(job_id, |job| {
            job.status = JobStatus::Failed;
            job.error_message = Some(error_message);
            job.last_error_at = Some(now);
            job.completed_at = Some(now);
        });
        Ok(())
    }

    async fn cancel_job(&self, job_id: Uuid) -> Result<bool> {
        let mut jobs = self.jobs();
        let Some(job) = jobs.get_mut(&job_id) else {
            return Ok(false);
        };
        job.cancel_requested = true;
        if job.status == JobStatus::Pending {
            job.status = JobStatus::Cancelled;
            job.completed_at = Some(Utc::now());
        }
        Ok(true)
    }

    async fn is_cancelled(&self, job_id: Uuid) -> Result<bool> {
        Ok(self
            .jobs()
            .get(&job_id)
            .is_some_and(|job| job.cancel_requested))
    }

    async fn delete_job(&self, job_id: Uuid) -> Result<bool> {
        let mut jobs = self.jobs();
        let deletable = jobs.get(&job_id).is_some_and(|job| {
            matches!(
                job.status,
                JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
            ) || job.cancel_requested
        });
        if deletable {
            jobs.remove(&job_id);
        }
        Ok(deletable)
    }

    async fn health_check(&self) -> Result<serde_json::Value> {
        Ok(serde_json::json!({
            "status": "ok",
            "backend": "inline",
            "jobs": self.jobs().len(),
        }))
    }

    async fn cleanup_old_jobs(&self, days: i32) -> Result<i64> {
        let cutoff = Utc::now() - chrono::Duration::days(i64::from(days));
        let mut jobs = self.jobs();
        let before = jobs.len();
        jobs.retain(|_, job| job.completed_at.map_or(true, |at| at >= cutoff));
        Ok((before - jobs.len()) as i64)
    }
}
