//! Background job management (tech admin only)

use crate::{
    api::handlers::require_role,
    auth::CurrentUser,
    models::Role,
    queue::{job_types, Job, JobPriority},
    state::AppState,
    Error, Result,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListJobsQuery {
    pub job_type: Option<String>,
    pub status: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupJobsQuery {
    pub days: Option<i32>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JobView {
    #[serde(flatten)]
    job: Job,
    priority_level: JobPriority,
    progress_percent: Option<f64>,
}

impl From<Job> for JobView {
    fn from(job: Job) -> Self {
        Self {
            priority_level: job.get_priority(),
            progress_percent: job.progress_percent(),
            job,
        }
    }
}

pub async fn list_jobs(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(q): Query<ListJobsQuery>,
) -> Result<Response> {
    require_role(&user, &[Role::TechAdmin])?;
    let limit = q.limit.unwrap_or(50).clamp(1, 1000);
    let offset = q.offset.unwrap_or(0).max(0);

    let (jobs, total) = crate::queue::list_jobs(
        &state.db_pool,
        q.job_type.as_deref(),
        q.status.as_deref(),
        limit,
        offset,
    )
    .await?;
    let jobs: Vec<JobView> = jobs.into_iter().map(JobView::from).collect();

    Ok(Json(json!({
        "jobs": jobs,
        "total": total,
        "limit": limit,
        "offset": offset
    }))
    .into_response())
}

pub async fn get_job(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(job_id): Path<Uuid>,
) -> Result<Response> {
    require_role(&user, &[Role::TechAdmin])?;
    let job = state
        .job_queue
        .get_job(job_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Job {job_id} not found")))?;
    Ok(Json(JobView::from(job)).into_response())
}

pub async fn cancel_job(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(job_id): Path<Uuid>,
) -> Result<Response> {
    require_role(&user, &[Role::TechAdmin])?;
    if state.job_queue.cancel_job(job_id).await? {
        Ok(Json(json!({ "cancelled": true, "jobId": job_id })).into_response())
    } else {
        Err(Error::Validation(
            "Job not found or already completed".to_string(),
        ))
    }
}

pub async fn delete_job(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(job_id): Path<Uuid>,
) -> Result<Response> {
    require_role(&user, &[Role::TechAdmin])?;
    if state.job_queue.delete_job(job_id).await? {
        Ok(StatusCode::NO_CONTENT.into_response())
    } else {
        Err(Error::Validation(
            "Job not found or still running/pending".to_string(),
        ))
    }
}

pub async fn get_queue_health(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Response> {
    require_role(&user, &[Role::TechAdmin])?;
    Ok(Json(state.job_queue.health_check().await?).into_response())
}

pub async fn cleanup_old_jobs(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(q): Query<CleanupJobsQuery>,
) -> Result<Response> {
    require_role(&user, &[Role::TechAdmin])?;
    let days = q.days.unwrap_or(state.config.workers.job_retention_days);
    if days < 1 {
        return Err(Error::Validation("days must be at least 1".to_string()));
    }
    let deleted = state.job_queue.cleanup_old_jobs(days).await?;
    Ok(Json(json!({ "deleted": deleted, "days": days })).into_response())
}

/// Queues an immediate search synchronization run.
pub async fn trigger_search_sync(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Response> {
    require_role(&user, &[Role::TechAdmin])?;
    if !state.search_sync_service.is_enabled() {
        return Err(Error::InvalidArgument(
            "Search synchronization is disabled".to_string(),
        ));
    }
    let job_id = state
        .job_queue
        .enqueue(
            job_types::SEARCH_SYNC.to_string(),
            json!({}),
            JobPriority::High,
            None,
        )
        .await?;
    Ok((StatusCode::ACCEPTED, Json(json!({ "jobId": job_id }))).into_response())
}
