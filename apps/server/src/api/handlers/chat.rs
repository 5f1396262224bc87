use crate::{
    api::handlers::{
        ensure_parent_access, ensure_provider_access, ensure_workshop_staff, ok_or_no_content,
    },
    auth::CurrentUser,
    models::{ChatMessageCreate, OffsetFilter, Role},
    state::AppState,
    Error, Result,
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
pub struct RoomKey {
    pub workshop_id: Uuid,
    pub parent_id: Uuid,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParentProviderQuery {
    pub parent_id: Uuid,
    pub provider_id: Uuid,
}

/// Parent id or provider id of the caller, whichever side they chat on.
enum Side {
    Parent(Uuid),
    Provider(Uuid),
}

async fn side_of(state: &AppState, user: &CurrentUser) -> Result<Side> {
    match user.role {
        Role::Parent => state
            .parent_service
            .get_by_user_id(&user.user_id)
            .await?
            .map(|p| Side::Parent(p.id))
            .ok_or_else(|| Error::InvalidArgument("Parent profile is not created".to_string())),
        Role::Provider => state
            .provider_service
            .get_id_for_staff_user(&user.user_id)
            .await?
            .map(Side::Provider)
            .ok_or_else(|| Error::InvalidArgument("Provider profile is not created".to_string())),
        _ => Err(Error::Forbidden(
            "Only parents and providers take part in chats".to_string(),
        )),
    }
}

pub async fn send_message(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(request): Json<ChatMessageCreate>,
) -> Result<Response> {
    let message = state.chat_service.create_message(&request, &user).await?;
    Ok((StatusCode::CREATED, Json(message)).into_response())
}

pub async fn open_room(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(key): Json<RoomKey>,
) -> Result<Response> {
    ensure_parent_access(&state, &user, key.parent_id).await?;
    let room = state
        .chat_service
        .create_or_return_existing(key.workshop_id, key.parent_id)
        .await?;
    Ok(Json(room).into_response())
}

pub async fn list_my_rooms(State(state): State<AppState>, user: CurrentUser) -> Result<Response> {
    let rooms = match side_of(&state, &user).await? {
        Side::Parent(id) => state.chat_service.get_by_parent_id(id).await?,
        Side::Provider(id) => state.chat_service.get_by_provider_id(id).await?,
    };
    Ok(Json(rooms).into_response())
}

pub async fn list_my_room_ids(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Response> {
    let ids = match side_of(&state, &user).await? {
        Side::Parent(id) => state.chat_service.get_room_ids_by_parent_id(id).await?,
        Side::Provider(id) => state.chat_service.get_room_ids_by_provider_id(id).await?,
    };
    Ok(Json(ids).into_response())
}

pub async fn find_room(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(key): Query<RoomKey>,
) -> Result<Response> {
    let room = state
        .chat_service
        .get_by_parent_and_workshop(key.parent_id, key.workshop_id)
        .await?;
    if let Some(room) = &room {
        state.chat_service.side_in(room, &user).await?;
    }
    Ok(ok_or_no_content(room))
}

pub async fn list_rooms_by_parent_and_provider(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<ParentProviderQuery>,
) -> Result<Response> {
    match user.role {
        Role::Provider => ensure_provider_access(&state, &user, query.provider_id).await?,
        _ => ensure_parent_access(&state, &user, query.parent_id).await?,
    }
    let rooms = state
        .chat_service
        .get_by_parent_and_provider(query.parent_id, query.provider_id)
        .await?;
    Ok(Json(rooms).into_response())
}

pub async fn list_rooms_by_workshop(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(workshop_id): Path<Uuid>,
) -> Result<Response> {
    ensure_workshop_staff(&state, &user, workshop_id).await?;
    let rooms = state
        .chat_service
        .get_by_workshop_ids(vec![workshop_id])
        .await?;
    Ok(Json(rooms).into_response())
}

pub async fn count_unread(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(workshop_id): Path<Uuid>,
) -> Result<Response> {
    ensure_workshop_staff(&state, &user, workshop_id).await?;
    let amount = state.chat_service.count_unread(workshop_id).await?;
    Ok(Json(serde_json::json!({ "amount": amount })).into_response())
}

pub async fn get_room(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Response> {
    let room = state.chat_service.get_by_id(id).await?;
    if let Some(room) = &room {
        state.chat_service.side_in(room, &user).await?;
    }
    Ok(ok_or_no_content(room))
}

pub async fn get_messages(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
    Query(offset): Query<OffsetFilter>,
) -> Result<Response> {
    let messages = state
        .chat_service
        .get_messages_and_mark_read(id, offset, &user)
        .await?;
    Ok(Json(messages).into_response())
}

pub async fn delete_room(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Response> {
    if user.role != Role::TechAdmin {
        let room = state
            .chat_service
            .get_by_id(id)
            .await?
            .ok_or_else(|| Error::OutOfRange(format!("Chat room with Id = {id} doesn't exist")))?;
        state.chat_service.side_in(&room, &user).await?;
    }
    state.chat_service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}
