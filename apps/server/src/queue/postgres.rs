//! Postgres job queue: `jobs` table, LISTEN/NOTIFY wake-ups and SKIP LOCKED claims

use super::{
    helpers::{try_dequeue_job, JOB_COLUMNS},
    models::*,
    traits::JobQueue,
};
use crate::Result;
use async_trait::async_trait;
use chrono::Utc;
use futures::stream::BoxStream;
use sqlx::{postgres::PgListener, PgPool, Row};
use tokio::time::{Duration, MissedTickBehavior};
use uuid::Uuid;

const CHANNEL: &str = "job_queue";

pub struct PostgresJobQueue {
    pool: PgPool,
    listen_poll_interval: Duration,
}

impl PostgresJobQueue {
    pub fn new(pool: PgPool, listen_poll_interval_seconds: u64) -> Self {
        Self {
            pool,
            listen_poll_interval: Duration::from_secs(listen_poll_interval_seconds.max(1)),
        }
    }

    async fn mark_failed(&self, job_id: Uuid, error_message: &str) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'failed', completed_at = $1, last_error_at = $1, error_message = $2
            WHERE id = $3
            "#,
        )
        .bind(Utc::now())
        .bind(error_message)
        .bind(job_id)
        .execute(&self.pool)
        .await?;
        tracing::error!(%job_id, error = error_message, "Job failed permanently");
        Ok(())
    }
}

#[async_trait]
impl JobQueue for PostgresJobQueue {
    async fn enqueue(
        &self,
        job_type: String,
        parameters: serde_json::Value,
        priority: JobPriority,
        retry_policy: Option<RetryPolicy>,
    ) -> Result<Uuid> {
        let job_id = Uuid::new_v4();
        let retry_policy = serde_json::to_value(retry_policy.unwrap_or_default())
            .map_err(|e| crate::Error::Internal(format!("Failed to encode retry policy: {e}")))?;

        let mut tx = self.pool.begin().await?;
        sqlx::query(
            r#"
            INSERT INTO jobs (id, job_type, status, parameters, priority, retry_policy)
            VALUES ($1, $2, 'pending', $3, $4, $5)
            "#,
        )
        .bind(job_id)
        .bind(&job_type)
        .bind(&parameters)
        .bind(priority as i32)
        .bind(retry_policy)
        .execute(&mut *tx)
        .await?;
        // Delivered on commit, so listeners never see a job they cannot claim yet.
        sqlx::query("SELECT pg_notify($1, $2)")
            .bind(CHANNEL)
            .bind(&job_type)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        tracing::debug!(%job_id, %job_type, ?priority, "Enqueued job");
        Ok(job_id)
    }

    async fn dequeue(&self, job_types: &[String], worker_id: &str) -> Result<Option<Job>> {
        let job = try_dequeue_job(&self.pool, job_types, worker_id).await?;
        if let Some(job) = &job {
            tracing::debug!(job_id = %job.id, job_type = %job.job_type, worker_id, "Claimed job");
        }
        Ok(job)
    }

    async fn listen<'a>(&'a self, job_types: &'a [String]) -> Result<BoxStream<'a, Result<Job>>> {
        let mut listener = PgListener::connect_with(&self.pool).await?;
        listener.listen(CHANNEL).await?;
        tracing::info!(?job_types, "Listening for jobs");

        let pool = self.pool.clone();
        let worker_id = format!("listener-{}", Uuid::new_v4());
        let poll_interval = self.listen_poll_interval;

        let stream = async_stream::stream! {
            // Drain the backlog before waiting for notifications.
            loop {
                match try_dequeue_job(&pool, job_types, &worker_id).await {
                    Ok(Some(job)) => yield Ok(job),
                    Ok(None) => break,
                    Err(e) => {
                        yield Err(e);
                        break;
                    }
                }
            }

            let mut ticker = tokio::time::interval(poll_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                let wake = tokio::select! {
                    notification = listener.recv() => match notification {
                        Ok(n) => job_types.is_empty() || job_types.iter().any(|t| t == n.payload()),
                        Err(e) => {
                            yield Err(crate::Error::Database(e));
                            break;
                        }
                    },
                    // Scheduled retries never trigger a notification.
                    _ = ticker.tick() => true,
                };
                if !wake {
                    continue;
                }
                loop {
                    match try_dequeue_job(&pool, job_types, &worker_id).await {
                        Ok(Some(job)) => yield Ok(job),
                        Ok(None) => break,
                        Err(e) => {
                            yield Err(e);
                            break;
                        }
                    }
                }
            }
        };

        Ok(Box::pin(stream))
    }

    async fn get_job(&self, job_id: Uuid) -> Result<Option<Job>> {
        let job = sqlx::query_as::<_, Job>(&format!("SELECT {JOB_COLUMNS} FROM jobs WHERE id = $1"))
            .bind(job_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(job)
    }

    async fn update_progress(
        &self,
        job_id: Uuid,
        processed_items: i32,
        total_items: Option<i32>,
        progress_data: Option<serde_json::Value>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE jobs
            SET processed_items = $2,
                total_items = COALESCE($3, total_items),
                progress = COALESCE($4, progress)
            WHERE id = $1
            "#,
        )
        .bind(job_id)
        .bind(processed_items)
        .bind(total_items)
        .bind(progress_data)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn complete_job(
        &self,
        job_id: Uuid,
        final_results: Option<serde_json::Value>,
    ) -> Result<()> {
        let row = sqlx::query(
            r#"
            UPDATE jobs
            SET status = CASE WHEN cancel_requested THEN 'cancelled' ELSE 'completed' END,
                completed_at = $1,
                progress = COALESCE($2, progress)
            WHERE id = $3
            RETURNING status
            "#,
        )
        .bind(Utc::now())
        .bind(final_results)
        .bind(job_id)
        .fetch_optional(&self.pool)
        .await?;

        let status: Option<String> = row.map(|r| r.get("status"));
        tracing::debug!(%job_id, status = status.as_deref().unwrap_or("missing"), "Job finished");
        Ok(())
    }

    async fn fail_job(&self, job_id: Uuid, error_message: String, retry: bool) -> Result<()> {
        if retry {
            if let Some(job) = self.get_job(job_id).await? {
                if job.can_retry() {
                    let now = Utc::now();
                    let delay = job.get_retry_policy().calculate_delay(job.retry_count);
                    let scheduled_at = now + chrono::Duration::seconds(delay as i64);
                    sqlx::query(
                        r#"
                        UPDATE jobs
                        SET status = 'pending',
                            retry_count = retry_count + 1,
                            last_error_at = $1,
                            error_message = $2,
                            scheduled_at = $3,
                            worker_id = NULL
                        WHERE id = $4
                        "#,
                    )
                    .bind(now)
                    .bind(&error_message)
                    .bind(scheduled_at)
                    .bind(job_id)
                    .execute(&self.pool)
                    .await?;
                    tracing::warn!(%job_id, %scheduled_at, error = %error_message, "Job failed, retry scheduled");
                    return Ok(());
                }
            }
        }
        self.mark_failed(job_id, &error_message).await
    }

    async fn cancel_job(&self, job_id: Uuid) -> Result<bool> {
        // Pending jobs stop immediately; running ones see the flag on their next check.
        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET cancel_requested = TRUE,
                status = CASE WHEN status = 'pending' THEN 'cancelled' ELSE status END,
                completed_at = CASE WHEN status = 'pending' THEN $2 ELSE completed_at END
            WHERE id = $1 AND status IN ('pending', 'running')
            "#,
        )
        .bind(job_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        let cancelled = result.rows_affected() > 0;
        tracing::info!(%job_id, cancelled, "Job cancellation requested");
        Ok(cancelled)
    }

    async fn is_cancelled(&self, job_id: Uuid) -> Result<bool> {
        let flag: Option<bool> =
            sqlx::query_scalar("SELECT cancel_requested FROM jobs WHERE id = $1")
                .bind(job_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(flag.unwrap_or(false))
    }

    async fn delete_job(&self, job_id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            r#"
            DELETE FROM jobs
            WHERE id = $1
              AND (status IN ('completed', 'failed', 'cancelled')
                   OR (cancel_requested AND status IN ('running', 'pending')))
            "#,
        )
        .bind(job_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn health_check(&self) -> Result<serde_json::Value> {
        let row = sqlx::query(
            r#"
            SELECT
                COUNT(*) FILTER (WHERE status = 'pending') AS pending,
                COUNT(*) FILTER (WHERE status = 'running') AS running,
                COUNT(*) FILTER (WHERE status = 'completed') AS completed,
                COUNT(*) FILTER (WHERE status = 'failed') AS failed,
                COUNT(*) FILTER (WHERE status = 'cancelled') AS cancelled
            FROM jobs
            WHERE created_at > NOW() - INTERVAL '24 hours'
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        let count = |name: &str| row.try_get::<i64, _>(name).unwrap_or(0);
        Ok(serde_json::json!({
            "status": "ok",
            "backend": "postgres",
            "last24h": {
                "pending": count("pending"),
                "running": count("running"),
                "completed": count("completed"),
                "failed": count("failed"),
                "cancelled": count("cancelled"),
            }
        }))
    }

    async fn cleanup_old_jobs(&self, days: i32) -> Result<i64> {
        let result = sqlx::query(
            r#"
            DELETE FROM jobs
            WHERE status IN ('completed', 'failed', 'cancelled')
              AND completed_at < NOW() - make_interval(days => $1)
            "#,
        )
        .bind(days)
        .execute(&self.pool)
        .await?;

        let deleted = result.rows_affected() as i64;
        tracing::info!(deleted, days, "Removed finished jobs");
        Ok(deleted)
    }
}
