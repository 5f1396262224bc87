//! HTTP request handlers

pub mod achievements;
pub mod admins;
pub mod applications;
pub mod changes_log;
pub mod chat;
pub mod codeficator;
pub mod health;
pub mod jobs;
pub mod notifications;
pub mod providers;
pub mod stream;
pub mod users;
pub mod workshops;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use uuid::Uuid;

use crate::auth::CurrentUser;
use crate::error::Typed;
use crate::models::{Role, SearchResult};
use crate::state::AppState;
use crate::{Error, Result};

/// Renders a typed service outcome: the value on success, the typed error as-is.
pub(crate) fn typed<T: Serialize>(result: Typed<T>) -> Response {
    match result {
        Ok(value) => Json(value).into_response(),
        Err(error) => error.into_response(),
    }
}

/// 200 with the value, or 204 when there is nothing to return.
pub(crate) fn ok_or_no_content<T: Serialize>(value: Option<T>) -> Response {
    match value {
        Some(value) => Json(value).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    }
}

/// 200 with the page, or 204 when it is empty.
pub(crate) fn page<T: Serialize>(result: SearchResult<T>) -> Response {
    if result.total_amount == 0 {
        StatusCode::NO_CONTENT.into_response()
    } else {
        Json(result).into_response()
    }
}

pub(crate) fn require_role(user: &CurrentUser, roles: &[Role]) -> Result<()> {
    if roles.contains(&user.role) {
        Ok(())
    } else {
        Err(Error::Forbidden(format!(
            "Role {} is not allowed to perform this action",
            user.role
        )))
    }
}

pub(crate) fn require_admin(user: &CurrentUser) -> Result<()> {
    if user.is_admin() {
        Ok(())
    } else {
        Err(Error::Forbidden("Administrator role required".to_string()))
    }
}

/// Parents may only act for themselves; admins for anyone.
pub(crate) async fn ensure_parent_access(
    state: &AppState,
    user: &CurrentUser,
    parent_id: Uuid,
) -> Result<()> {
    match user.role {
        Role::Parent => {
            let own = state.parent_service.get_by_user_id(&user.user_id).await?;
            if own.is_some_and(|p| p.id == parent_id) {
                Ok(())
            } else {
                Err(Error::Forbidden("Access to another parent's data".to_string()))
            }
        }
        _ if user.is_admin() => Ok(()),
        _ => Err(Error::Forbidden("Parent role required".to_string())),
    }
}

/// Provider staff may only act for their provider; admins for any.
pub(crate) async fn ensure_provider_access(
    state: &AppState,
    user: &CurrentUser,
    provider_id: Uuid,
) -> Result<()> {
    match user.role {
        Role::Provider => {
            let own = state
                .provider_service
                .get_id_for_staff_user(&user.user_id)
                .await?;
            if own == Some(provider_id) {
                Ok(())
            } else {
                Err(Error::Forbidden("Access to another provider's data".to_string()))
            }
        }
        _ if user.is_admin() => Ok(()),
        _ => Err(Error::Forbidden("Provider role required".to_string())),
    }
}

/// Provider access to the workshop's owner; missing workshop is InvalidArgument.
pub(crate) async fn ensure_workshop_staff(
    state: &AppState,
    user: &CurrentUser,
    workshop_id: Uuid,
) -> Result<()> {
    let workshop = state
        .workshop_service
        .get_by_id(workshop_id)
        .await?
        .ok_or_else(|| {
            Error::InvalidArgument(format!("Workshop with Id = {workshop_id} doesn't exist"))
        })?;
    ensure_provider_access(state, user, workshop.provider_id).await
}
