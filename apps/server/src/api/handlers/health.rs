use crate::{state::AppState, Result};
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Liveness plus database and job queue reachability.
pub async fn health(State(state): State<AppState>) -> Response {
    let database = sqlx::query_scalar::<_, i32>("SELECT 1")
        .fetch_one(&state.db_pool)
        .await
        .map(|_| "ok")
        .unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Health check: database unreachable");
            "unavailable"
        });
    let queue = match state.job_queue.health_check().await {
        Ok(report) => report,
        Err(e) => {
            tracing::warn!(error = %e, "Health check: job queue unavailable");
            json!({ "status": "unavailable" })
        }
    };

    let status = if database == "ok" {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (
        status,
        Json(json!({
            "status": if status == StatusCode::OK { "ok" } else { "degraded" },
            "version": env!("CARGO_PKG_VERSION"),
            "database": database,
            "jobQueue": queue,
            "searchEnabled": state.search_sync_service.is_enabled(),
        })),
    )
        .into_response()
}

pub async fn metrics() -> Result<Response> {
    let body = crate::metrics::render()?;
    Ok((
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    )
        .into_response())
}
