use crate::{
    api::handlers::{page, require_admin},
    auth::CurrentUser,
    models::ChangesLogFilter,
    state::AppState,
    Result,
};
use axum::{
    extract::{Query, State},
    response::Response,
};

pub async fn list_changes(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(filter): Query<ChangesLogFilter>,
) -> Result<Response> {
    require_admin(&user)?;
    let scope = state.scope_of(&user).await?;
    Ok(page(
        state
            .changes_log_service
            .get_changes(&filter, &scope)
            .await?,
    ))
}
