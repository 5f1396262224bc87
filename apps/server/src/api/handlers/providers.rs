use crate::{
    api::handlers::{ok_or_no_content, page, require_admin, require_role, typed},
    auth::CurrentUser,
    models::{
        ProviderBlock, ProviderFilter, ProviderInput, ProviderLicenseStatusUpdate,
        ProviderStatusUpdate, Role,
    },
    state::AppState,
    Error, Result,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use uuid::Uuid;

pub async fn create_provider(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(input): Json<ProviderInput>,
) -> Result<Response> {
    require_role(&user, &[Role::Provider])?;
    let provider = state
        .provider_service
        .create(&input, &user.user_id)
        .await?;
    Ok((StatusCode::CREATED, Json(provider)).into_response())
}

pub async fn update_provider(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(input): Json<ProviderInput>,
) -> Result<Response> {
    require_role(&user, &[Role::Provider, Role::TechAdmin])?;
    match state.provider_service.update(&input, &user).await? {
        Some(provider) => Ok(Json(provider).into_response()),
        None => Err(Error::InvalidArgument(
            "Provider can not be updated with the given data".to_string(),
        )),
    }
}

pub async fn get_provider(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response> {
    Ok(ok_or_no_content(state.provider_service.get_by_id(id).await?))
}

pub async fn get_provider_by_user(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Response> {
    Ok(ok_or_no_content(
        state.provider_service.get_by_user_id(&user.user_id).await?,
    ))
}

pub async fn list_providers(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(filter): Query<ProviderFilter>,
) -> Result<Response> {
    require_admin(&user)?;
    let scope = state.scope_of(&user).await?;
    Ok(page(
        state.provider_service.get_by_filter(&filter, &scope).await?,
    ))
}

pub async fn update_provider_status(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
    Json(request): Json<ProviderStatusUpdate>,
) -> Result<Response> {
    require_admin(&user)?;
    let scope = state.scope_of(&user).await?;
    Ok(typed(
        state
            .provider_service
            .update_status(id, &request, &user, &scope)
            .await?,
    ))
}

pub async fn update_provider_license_status(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
    Json(request): Json<ProviderLicenseStatusUpdate>,
) -> Result<Response> {
    require_admin(&user)?;
    let provider = state
        .provider_service
        .update_license_status(id, request.license_status, &user)
        .await?;
    Ok(Json(provider).into_response())
}

pub async fn block_provider(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
    Json(request): Json<ProviderBlock>,
) -> Result<Response> {
    require_admin(&user)?;
    let scope = state.scope_of(&user).await?;
    Ok(typed(
        state
            .provider_service
            .block(id, &request, &user, &scope)
            .await?,
    ))
}

pub async fn delete_provider(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Response> {
    if user.role != Role::TechAdmin {
        let owned = state
            .provider_service
            .get_by_id(id)
            .await?
            .is_some_and(|p| p.user_id == user.user_id);
        if !owned {
            return Err(Error::Forbidden(
                "Only the owner may delete the provider".to_string(),
            ));
        }
    }
    state.provider_service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}
