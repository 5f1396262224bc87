//! Job queue abstraction

use super::models::*;
use crate::Result;
use async_trait::async_trait;
use futures::stream::BoxStream;
use uuid::Uuid;

/// Durable hand-off of background work from request handlers to workers.
#[async_trait]
pub trait JobQueue: Send + Sync {
    async fn enqueue(
        &self,
        job_type: String,
        parameters: serde_json::Value,
        priority: JobPriority,
        retry_policy: Option<RetryPolicy>,
    ) -> Result<Uuid>;

    /// Claims the next runnable job of the given types (all types when empty).
    async fn dequeue(&self, job_types: &[String], worker_id: &str) -> Result<Option<Job>>;

    /// Stream of claimed jobs; yields as soon as matching work is enqueued.
    async fn listen<'a>(&'a self, job_types: &'a [String]) -> Result<BoxStream<'a, Result<Job>>>;

    async fn get_job(&self, job_id: Uuid) -> Result<Option<Job>>;

    async fn update_progress(
        &self,
        job_id: Uuid,
        processed_items: i32,
        total_items: Option<i32>,
        progress_data: Option<serde_json::Value>,
    ) -> Result<()>;

    async fn complete_job(
        &self,
        job_id: Uuid,
        final_results: Option<serde_json::Value>,
    ) -> Result<()>;

    /// Records a failure; with `retry` the job is rescheduled while its policy allows.
    async fn fail_job(&self, job_id: Uuid, error_message: String, retry: bool) -> Result<()>;

    async fn cancel_job(&self, job_id: Uuid) -> Result<bool>;

    async fn is_cancelled(&self, job_id: Uuid) -> Result<bool>;

    /// Deletes a finished (or cancel-requested) job.
    async fn delete_job(&self, job_id: Uuid) -> Result<bool>;

    async fn health_check(&self) -> Result<serde_json::Value>;

    /// Removes finished jobs older than `days`.
    async fn cleanup_old_jobs(&self, days: i32) -> Result<i64>;
}
