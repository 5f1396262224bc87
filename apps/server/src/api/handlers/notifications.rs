use crate::{
    auth::CurrentUser,
    models::{NotificationQuery, NotificationType},
    state::AppState,
    Result,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use uuid::Uuid;

pub async fn list_grouped(State(state): State<AppState>, user: CurrentUser) -> Result<Response> {
    let grouped = state
        .notification_service
        .get_all_grouped(&user.user_id)
        .await?;
    Ok(Json(grouped).into_response())
}

pub async fn list_notifications(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<NotificationQuery>,
) -> Result<Response> {
    let notifications = state
        .notification_service
        .get_all_by_filter(&user.user_id, query.kind)
        .await?;
    Ok(Json(notifications).into_response())
}

pub async fn amount_of_new(State(state): State<AppState>, user: CurrentUser) -> Result<Response> {
    let amount = state
        .notification_service
        .get_amount_of_new(&user.user_id)
        .await?;
    Ok(Json(amount).into_response())
}

pub async fn read(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Response> {
    let notification = state
        .notification_service
        .read(id, &user.user_id)
        .await?;
    Ok(Json(notification).into_response())
}

pub async fn read_by_type(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(kind): Path<String>,
) -> Result<Response> {
    let kind: NotificationType = kind.parse()?;
    let updated = state
        .notification_service
        .read_by_type(&user.user_id, kind)
        .await?;
    tracing::debug!(user_id = %user.user_id, %kind, updated, "Marked notifications as read");
    Ok(StatusCode::NO_CONTENT.into_response())
}

pub async fn delete(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Response> {
    state
        .notification_service
        .delete(id, &user.user_id)
        .await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}
