//! Queries shared by the Postgres queue, its listener stream and the jobs API

use super::models::Job;
use crate::Result;
use sqlx::{PgPool, Postgres, QueryBuilder};

pub(crate) const JOB_COLUMNS: &str = "id, job_type, status, priority, parameters, progress, \
    retry_policy, retry_count, processed_items, total_items, error_message, last_error_at, \
    scheduled_at, cancel_requested, created_at, started_at, completed_at, worker_id";

/// Claims the next runnable job of the given types, if any.
pub async fn try_dequeue_job(
    pool: &PgPool,
    job_types: &[String],
    worker_id: &str,
) -> Result<Option<Job>> {
    let now = chrono::Utc::now();
    let sql = format!(
        r#"
        UPDATE jobs
        SET status = 'running',
            started_at = $1,
            worker_id = $2
        WHERE id = (
            SELECT id
            FROM jobs
            WHERE (cardinality($3::varchar[]) = 0 OR job_type = ANY($3))
              AND status = 'pending'
              AND cancel_requested = FALSE
              AND (scheduled_at IS NULL OR scheduled_at <= $1)
            ORDER BY priority DESC, created_at ASC
            LIMIT 1
            FOR UPDATE SKIP LOCKED
        )
        RETURNING {JOB_COLUMNS}
        "#
    );

    let job = sqlx::query_as::<_, Job>(&sql)
        .bind(now)
        .bind(worker_id)
        .bind(job_types)
        .fetch_optional(pool)
        .await?;
    Ok(job)
}

/// Lists jobs newest first with optional type and status filters.
pub async fn list_jobs(
    pool: &PgPool,
    job_type: Option<&str>,
    status: Option<&str>,
    limit: i64,
    offset: i64,
) -> Result<(Vec<Job>, i64)> {
    fn push_filters<'a>(
        qb: &mut QueryBuilder<'a, Postgres>,
        job_type: Option<&'a str>,
        status: Option<&'a str>,
    ) {
        qb.push(" WHERE TRUE");
        if let Some(job_type) = job_type {
            qb.push(" AND job_type = ").push_bind(job_type);
        }
        if let Some(status) = status {
            qb.push(" AND status = ").push_bind(status);
        }
    }

    let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM jobs");
    push_filters(&mut count, job_type, status);
    let total = count.build_query_scalar::<i64>().fetch_one(pool).await?;

    let mut page = QueryBuilder::<Postgres>::new(format!("SELECT {JOB_COLUMNS} FROM jobs"));
    push_filters(&mut page, job_type, status);
    page.push(" ORDER BY created_at DESC LIMIT ")
        .push_bind(limit)
        .push(" OFFSET ")
        .push_bind(offset);
    let jobs = page.build_query_as::<Job>().fetch_all(pool).await?;

    Ok((jobs, total))
}
