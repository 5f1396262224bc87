//! Ministry, region and area administrators.
//!
//! Routes are shared between the three kinds; the kind travels as the first
//! path segment (`/admins/ministry`, `/admins/region`, `/admins/area`).

use crate::{
    api::handlers::{ok_or_no_content, page, require_admin, typed},
    auth::CurrentUser,
    models::{AdminBlock, AdminFilter, AdminInput, AdminKind, Role},
    state::AppState,
    Error, Result,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

fn parse_kind(segment: &str) -> Result<AdminKind> {
    segment.parse()
}

/// Roles allowed to create and change admins of `kind`.
fn managers_of(kind: AdminKind) -> &'static [Role] {
    match kind {
        AdminKind::Ministry => &[Role::TechAdmin],
        AdminKind::Region => &[Role::TechAdmin, Role::MinistryAdmin],
        AdminKind::Area => &[Role::TechAdmin, Role::MinistryAdmin, Role::RegionAdmin],
    }
}

fn require_manager(user: &CurrentUser, kind: AdminKind) -> Result<()> {
    if managers_of(kind).contains(&user.role) {
        Ok(())
    } else {
        Err(Error::Forbidden(format!(
            "Role {} cannot manage {kind} admins",
            user.role
        )))
    }
}

pub async fn list_admins(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(kind): Path<String>,
    Query(filter): Query<AdminFilter>,
) -> Result<Response> {
    require_admin(&user)?;
    let kind = parse_kind(&kind)?;
    Ok(page(
        state
            .admin_service
            .get_by_filter(kind, &filter, &user)
            .await?,
    ))
}

pub async fn get_current_admin(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(kind): Path<String>,
) -> Result<Response> {
    let kind = parse_kind(&kind)?;
    if user.role != kind.role() {
        return Err(Error::Forbidden(format!("Caller is not a {kind} admin")));
    }
    let admin = state
        .admin_service
        .get_by_user_id(kind, &user.user_id)
        .await?;
    Ok(Json(admin).into_response())
}

pub async fn get_admin(
    State(state): State<AppState>,
    user: CurrentUser,
    Path((kind, user_id)): Path<(String, String)>,
) -> Result<Response> {
    require_admin(&user)?;
    let kind = parse_kind(&kind)?;
    Ok(ok_or_no_content(
        state.admin_service.get_by_id(kind, &user_id).await?,
    ))
}

pub async fn create_admin(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(kind): Path<String>,
    Json(input): Json<AdminInput>,
) -> Result<Response> {
    let kind = parse_kind(&kind)?;
    require_manager(&user, kind)?;
    Ok(match state.admin_service.create(kind, &input, &user).await? {
        Ok(admin) => (StatusCode::CREATED, Json(admin)).into_response(),
        Err(error) => error.into_response(),
    })
}

pub async fn update_admin(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(kind): Path<String>,
    Json(input): Json<AdminInput>,
) -> Result<Response> {
    let kind = parse_kind(&kind)?;
    require_manager(&user, kind)?;
    Ok(typed(state.admin_service.update(kind, &input, &user).await?))
}

pub async fn delete_admin(
    State(state): State<AppState>,
    user: CurrentUser,
    Path((kind, user_id)): Path<(String, String)>,
) -> Result<Response> {
    let kind = parse_kind(&kind)?;
    require_manager(&user, kind)?;
    Ok(match state.admin_service.delete(kind, &user_id, &user).await? {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(error) => error.into_response(),
    })
}

pub async fn block_admin(
    State(state): State<AppState>,
    user: CurrentUser,
    Path((kind, user_id)): Path<(String, String)>,
    Json(request): Json<AdminBlock>,
) -> Result<Response> {
    let kind = parse_kind(&kind)?;
    require_manager(&user, kind)?;
    Ok(
        match state
            .admin_service
            .block(kind, &user_id, request.is_blocked, &user)
            .await?
        {
            Ok(()) => StatusCode::NO_CONTENT.into_response(),
            Err(error) => error.into_response(),
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_segment_is_case_insensitive() {
        assert_eq!(parse_kind("ministry").unwrap(), AdminKind::Ministry);
        assert_eq!(parse_kind("Area").unwrap(), AdminKind::Area);
        assert!(parse_kind("district").is_err());
    }

    #[test]
    fn admins_are_managed_from_above() {
        assert_eq!(managers_of(AdminKind::Ministry), &[Role::TechAdmin]);
        assert!(managers_of(AdminKind::Area).contains(&Role::RegionAdmin));
        assert!(!managers_of(AdminKind::Region).contains(&Role::RegionAdmin));
    }
}
