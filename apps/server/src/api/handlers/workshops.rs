use crate::{
    api::handlers::{ok_or_no_content, page},
    auth::CurrentUser,
    models::{OffsetFilter, WorkshopFilter, WorkshopInput, WorkshopStatusUpdate},
    state::AppState,
    Result,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ByProviderQuery {
    pub exclude_id: Option<Uuid>,
    pub from: Option<i64>,
    pub size: Option<i64>,
}

pub async fn create_workshop(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(input): Json<WorkshopInput>,
) -> Result<Response> {
    let workshop = state.workshop_service.create(&input, &user).await?;
    Ok((StatusCode::CREATED, Json(workshop)).into_response())
}

pub async fn update_workshop(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(input): Json<WorkshopInput>,
) -> Result<Response> {
    let workshop = state.workshop_service.update(&input, &user).await?;
    Ok(Json(workshop).into_response())
}

pub async fn get_workshop(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response> {
    Ok(ok_or_no_content(state.workshop_service.get_by_id(id).await?))
}

pub async fn list_workshops(
    State(state): State<AppState>,
    Query(filter): Query<WorkshopFilter>,
) -> Result<Response> {
    Ok(page(state.workshop_service.get_by_filter(&filter).await?))
}

pub async fn list_workshops_by_provider(
    State(state): State<AppState>,
    Path(provider_id): Path<Uuid>,
    Query(query): Query<ByProviderQuery>,
) -> Result<Response> {
    Ok(page(
        state
            .workshop_service
            .get_by_provider_id(
                provider_id,
                query.exclude_id,
                OffsetFilter::new(query.from, query.size),
            )
            .await?,
    ))
}

pub async fn update_workshop_status(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
    Json(request): Json<WorkshopStatusUpdate>,
) -> Result<Response> {
    let workshop = state
        .workshop_service
        .update_status(id, request.status, &user)
        .await?;
    Ok(Json(workshop).into_response())
}

pub async fn delete_workshop(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Response> {
    state.workshop_service.delete(id, &user).await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

pub async fn get_taken_seats(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response> {
    let taken = state.workshop_service.get_taken_seats(id).await?;
    Ok(Json(serde_json::json!({ "workshopId": id, "takenSeats": taken })).into_response())
}
