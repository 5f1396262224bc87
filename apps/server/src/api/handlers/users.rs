//! Users, parents and children

use crate::{
    api::handlers::{ensure_parent_access, ok_or_no_content, page, require_admin, require_role, typed},
    auth::CurrentUser,
    models::{
        BlockUnblockParent, ChildFilter, ChildInput, OffsetFilter, ParentCreate,
        ParentPersonalInfo, Role, UserUpdate,
    },
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

pub async fn get_current_user(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Response> {
    let current = state.user_service.get_by_id(&user.user_id).await?;
    Ok(Json(current).into_response())
}

pub async fn update_current_user(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(update): Json<UserUpdate>,
) -> Result<Response> {
    let updated = state.user_service.update(&user.user_id, &update).await?;
    Ok(Json(updated).into_response())
}

pub async fn list_users(State(state): State<AppState>, user: CurrentUser) -> Result<Response> {
    require_role(&user, &[Role::TechAdmin])?;
    Ok(Json(state.user_service.get_all().await?).into_response())
}

pub async fn get_user(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> Result<Response> {
    require_admin(&user)?;
    Ok(Json(state.user_service.get_by_id(&id).await?).into_response())
}

pub async fn delete_user(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> Result<Response> {
    require_role(&user, &[Role::TechAdmin])?;
    state.user_service.delete(&id).await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

pub async fn create_parent(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(info): Json<ParentCreate>,
) -> Result<Response> {
    require_role(&user, &[Role::Parent])?;
    let parent = state.parent_service.create(&user.user_id, &info).await?;
    Ok((StatusCode::CREATED, Json(parent)).into_response())
}

pub async fn get_current_parent(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Response> {
    Ok(ok_or_no_content(
        state.parent_service.get_by_user_id(&user.user_id).await?,
    ))
}

pub async fn get_parent(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Response> {
    ensure_parent_access(&state, &user, id).await?;
    Ok(ok_or_no_content(state.parent_service.get_by_id(id).await?))
}

pub async fn get_personal_info(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Response> {
    require_role(&user, &[Role::Parent])?;
    let info = state
        .parent_service
        .get_personal_info(&user.user_id)
        .await?;
    Ok(Json(info).into_response())
}

pub async fn update_personal_info(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(info): Json<ParentPersonalInfo>,
) -> Result<Response> {
    require_role(&user, &[Role::Parent])?;
    let info = state.parent_service.update(&user.user_id, &info).await?;
    Ok(Json(info).into_response())
}

pub async fn delete_parent(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Response> {
    ensure_parent_access(&state, &user, id).await?;
    state.parent_service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

pub async fn block_parent(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(request): Json<BlockUnblockParent>,
) -> Result<Response> {
    require_admin(&user)?;
    let result = state
        .parent_service
        .block_unblock(&request, &user.user_id)
        .await?;
    Ok(match result {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(error) => typed::<()>(Err(error)),
    })
}

pub async fn create_child(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(input): Json<ChildInput>,
) -> Result<Response> {
    require_role(&user, &[Role::Parent])?;
    let child = state
        .child_service
        .create_for_parent(&user.user_id, &input)
        .await?;
    Ok((StatusCode::CREATED, Json(child)).into_response())
}

pub async fn list_my_children(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(offset): Query<OffsetFilter>,
) -> Result<Response> {
    require_role(&user, &[Role::Parent])?;
    Ok(page(
        state
            .child_service
            .get_by_parent(&user.user_id, offset)
            .await?,
    ))
}

pub async fn list_children(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(filter): Query<ChildFilter>,
) -> Result<Response> {
    require_admin(&user)?;
    Ok(page(state.child_service.get_by_filter(&filter).await?))
}

pub async fn get_child(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Response> {
    require_role(&user, &[Role::Parent])?;
    let child = state
        .child_service
        .get_by_id_and_user(id, &user.user_id)
        .await?;
    Ok(Json(child).into_response())
}

pub async fn update_child(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
    Json(input): Json<ChildInput>,
) -> Result<Response> {
    require_role(&user, &[Role::Parent])?;
    let child = state
        .child_service
        .update_for_user(id, &input, &user.user_id)
        .await?;
    Ok(Json(child).into_response())
}

pub async fn delete_child(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Response> {
    require_role(&user, &[Role::Parent])?;
    state
        .child_service
        .delete_for_user(id, &user.user_id)
        .await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}
