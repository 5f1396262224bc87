use crate::{
    api::handlers::{ensure_workshop_staff, page},
    auth::CurrentUser,
    models::{AchievementFilter, AchievementInput},
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

pub async fn get_achievement(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response> {
    Ok(Json(state.achievement_service.get_by_id(id).await?).into_response())
}

pub async fn list_achievements(
    State(state): State<AppState>,
    Query(filter): Query<AchievementFilter>,
) -> Result<Response> {
    Ok(page(state.achievement_service.get_by_filter(&filter).await?))
}

pub async fn list_types(State(state): State<AppState>) -> Result<Response> {
    Ok(Json(state.achievement_service.get_types().await?).into_response())
}

pub async fn create_achievement(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(input): Json<AchievementInput>,
) -> Result<Response> {
    ensure_workshop_staff(&state, &user, input.workshop_id).await?;
    let achievement = state.achievement_service.create(&input).await?;
    Ok((StatusCode::CREATED, Json(achievement)).into_response())
}

pub async fn update_achievement(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(input): Json<AchievementInput>,
) -> Result<Response> {
    if let Some(id) = input.id {
        let existing = state.achievement_service.get_by_id(id).await?;
        ensure_workshop_staff(&state, &user, existing.workshop_id).await?;
    }
    ensure_workshop_staff(&state, &user, input.workshop_id).await?;
    let achievement = state.achievement_service.update(&input).await?;
    Ok(Json(achievement).into_response())
}

pub async fn delete_achievement(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Response> {
    let existing = state.achievement_service.get_by_id(id).await?;
    ensure_workshop_staff(&state, &user, existing.workshop_id).await?;
    state.achievement_service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}
