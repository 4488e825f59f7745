use std::sync::Arc;

use axum::{
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::Json,
};

use crate::{
    common::{ApiError, types::{UserId, now_ms}},
    protocol::{CreateParty, PartyCreated, PartySnapshot},
    server::AppState,
};

/// POST /v1/parties
pub async fn create_party(
    State(state): State<Arc<AppState>>,
    body: Result<Json<CreateParty>, JsonRejection>,
) -> Result<(StatusCode, Json<PartyCreated>), ApiError> {
    const PATH: &str = "/v1/parties";
    let Json(request) = body.map_err(|e| ApiError::bad_request(e.body_text(), PATH))?;
    tracing::info!("POST {} by {}", PATH, request.creator_id);

    let created = state
        .directory
        .create(request, now_ms())
        .map_err(|e| ApiError::from_party(&e, PATH))?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// GET /v1/parties/{code}
pub async fn get_party(
    Path(code): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<PartySnapshot>, ApiError> {
    let path = format!("/v1/parties/{}", code);
    tracing::debug!("GET {}", path);

    let snapshot = state
        .directory
        .get(&code)
        .and_then(|room| room.snapshot(now_ms()))
        .map_err(|e| ApiError::from_party(&e, &path))?;
    Ok(Json(snapshot))
}

/// DELETE /v1/parties/{code}/members/{userId}
pub async fn remove_member(
    Path((code, user_id)): Path<(String, String)>,
    State(state): State<Arc<AppState>>,
) -> Result<StatusCode, ApiError> {
    let path = format!("/v1/parties/{}/members/{}", code, user_id);
    tracing::info!("DELETE {}", path);

    let room = state
        .directory
        .get(&code)
        .map_err(|e| ApiError::from_party(&e, &path))?;
    let result = room.leave(&UserId::from(user_id), now_ms());
    state.directory.release(&room);
    result.map_err(|e| ApiError::from_party(&e, &path))?;
    Ok(StatusCode::NO_CONTENT)
}
