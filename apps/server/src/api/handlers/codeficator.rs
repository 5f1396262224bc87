//! Public CATOTTG lookups.

use crate::{
    api::handlers::ok_or_no_content,
    models::{AddressSearchQuery, ChildrenQuery, NearestQuery},
    state::AppState,
    Result,
};
use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
    Json,
};

pub async fn children(
    State(state): State<AppState>,
    Query(query): Query<ChildrenQuery>,
) -> Result<Response> {
    let children = state
        .codeficator_service
        .get_children_by_parent_id(query.id)
        .await?;
    Ok(Json(children).into_response())
}

pub async fn children_names(
    State(state): State<AppState>,
    Query(query): Query<ChildrenQuery>,
) -> Result<Response> {
    let names = state
        .codeficator_service
        .get_children_names(query.id)
        .await?;
    Ok(Json(names).into_response())
}

pub async fn get_by_id(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Response> {
    Ok(ok_or_no_content(
        state.codeficator_service.get_by_id(id).await?,
    ))
}

pub async fn address_parts(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Response> {
    Ok(ok_or_no_content(
        state.codeficator_service.get_all_address_parts(id).await?,
    ))
}

pub async fn search(
    State(state): State<AppState>,
    Query(query): Query<AddressSearchQuery>,
) -> Result<Response> {
    let addresses = state
        .codeficator_service
        .get_full_addresses_by_part_of_name(&query)
        .await?;
    Ok(Json(addresses).into_response())
}

pub async fn nearest(
    State(state): State<AppState>,
    Query(query): Query<NearestQuery>,
) -> Result<Response> {
    Ok(ok_or_no_content(
        state
            .codeficator_service
            .get_nearest_by_coordinates(query.lat, query.lon, query.category)
            .await?,
    ))
}
