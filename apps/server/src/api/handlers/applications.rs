use crate::{
    api::handlers::{
        ensure_parent_access, ensure_provider_access, ensure_workshop_staff, ok_or_no_content,
        page, require_admin, require_role, typed,
    },
    auth::CurrentUser,
    models::{ApplicationCreate, ApplicationCreated, ApplicationFilter, ApplicationUpdate, Role},
    state::AppState,
    Result,
};
use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderParentBlock {
    pub provider_id: Uuid,
    pub parent_id: Uuid,
    pub is_blocked: bool,
}

pub async fn create_application(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(request): Json<ApplicationCreate>,
) -> Result<Response> {
    require_role(&user, &[Role::Parent])?;
    match state.application_service.create(&request, &user).await? {
        ApplicationCreated::Created { application } => {
            Ok((StatusCode::CREATED, Json(application)).into_response())
        }
        limited @ ApplicationCreated::LimitExceeded {
            seconds_before_retry,
            ..
        } => Ok((
            StatusCode::TOO_MANY_REQUESTS,
            [(header::RETRY_AFTER, seconds_before_retry.to_string())],
            Json(limited),
        )
            .into_response()),
    }
}

pub async fn update_application(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(request): Json<ApplicationUpdate>,
) -> Result<Response> {
    require_role(&user, &[Role::Parent, Role::Provider, Role::TechAdmin])?;
    Ok(typed(
        state.application_service.update(&request, &user).await?,
    ))
}

pub async fn list_applications(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(filter): Query<ApplicationFilter>,
) -> Result<Response> {
    require_admin(&user)?;
    let scope = state.scope_of(&user).await?;
    Ok(page(state.application_service.get_all(&filter, &scope).await?))
}

pub async fn get_application(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Response> {
    let Some(application) = state.application_service.get_by_id(id).await? else {
        return Ok(ok_or_no_content::<()>(None));
    };
    state
        .application_service
        .ensure_participant(&application, &user)
        .await?;
    Ok(Json(application).into_response())
}

pub async fn list_by_parent(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(parent_id): Path<Uuid>,
    Query(filter): Query<ApplicationFilter>,
) -> Result<Response> {
    ensure_parent_access(&state, &user, parent_id).await?;
    Ok(page(
        state
            .application_service
            .get_all_by_parent(parent_id, &filter)
            .await?,
    ))
}

pub async fn count_by_parent(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(parent_id): Path<Uuid>,
) -> Result<Response> {
    ensure_parent_access(&state, &user, parent_id).await?;
    let count = state
        .application_service
        .get_count_by_parent(parent_id)
        .await?;
    Ok(Json(count).into_response())
}

pub async fn list_by_child(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(child_id): Path<Uuid>,
) -> Result<Response> {
    if user.role == Role::Parent {
        state
            .child_service
            .get_by_id_and_user(child_id, &user.user_id)
            .await?;
    } else {
        require_admin(&user)?;
    }
    let applications = state.application_service.get_all_by_child(child_id).await?;
    Ok(Json(applications).into_response())
}

pub async fn list_by_workshop(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(workshop_id): Path<Uuid>,
    Query(filter): Query<ApplicationFilter>,
) -> Result<Response> {
    ensure_workshop_staff(&state, &user, workshop_id).await?;
    Ok(page(
        state
            .application_service
            .get_all_by_workshop(workshop_id, &filter)
            .await?,
    ))
}

pub async fn list_by_provider(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(provider_id): Path<Uuid>,
    Query(filter): Query<ApplicationFilter>,
) -> Result<Response> {
    ensure_provider_access(&state, &user, provider_id).await?;
    Ok(page(
        state
            .application_service
            .get_all_by_provider(provider_id, &filter)
            .await?,
    ))
}

pub async fn allowed_new_application(
    State(state): State<AppState>,
    user: CurrentUser,
    Path((workshop_id, child_id)): Path<(Uuid, Uuid)>,
) -> Result<Response> {
    require_role(&user, &[Role::Parent])?;
    let allowed = state
        .application_service
        .allowed_new_application_by_child_status(workshop_id, child_id)
        .await?;
    Ok(Json(allowed).into_response())
}

pub async fn allowed_to_review(
    State(state): State<AppState>,
    user: CurrentUser,
    Path((parent_id, workshop_id)): Path<(Uuid, Uuid)>,
) -> Result<Response> {
    ensure_parent_access(&state, &user, parent_id).await?;
    let allowed = state
        .application_service
        .allowed_to_review(parent_id, workshop_id)
        .await?;
    Ok(Json(allowed).into_response())
}

pub async fn block_parent_by_provider(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(request): Json<ProviderParentBlock>,
) -> Result<Response> {
    ensure_provider_access(&state, &user, request.provider_id).await?;
    let updated = state
        .application_service
        .block_by_provider(request.provider_id, request.parent_id, request.is_blocked)
        .await?;
    Ok(Json(serde_json::json!({ "updated": updated })).into_response())
}
