use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use uuid::Uuid;

use hustleflow_board::view::{project_request, Viewer};
use hustleflow_types::api::{MakeOfferRequest, RequestView};
use hustleflow_types::models::Identity;

use crate::error::{join_error, ApiResult};
use crate::extract;
use crate::state::AppState;

pub async fn make_offer(
    State(state): State<AppState>,
    Path(request_id): Path<Uuid>,
    Json(req): Json<MakeOfferRequest>,
) -> ApiResult<impl IntoResponse> {
    let now = Utc::now();
    let identity: Identity = req.identity.into();

    let worker = state.clone();
    let offerer = identity.clone();
    let updated = tokio::task::spawn_blocking(move || {
        worker.repo.make_offer(request_id, req.amount, &offerer, now)
    })
    .await
    .map_err(join_error)??;

    let viewer = Viewer::Token(&identity.token);
    Ok((StatusCode::CREATED, Json(project_request(&updated, &viewer))))
}

pub async fn accept_offer(
    State(state): State<AppState>,
    Path((request_id, offer_id)): Path<(Uuid, Uuid)>,
    headers: HeaderMap,
) -> ApiResult<Json<RequestView>> {
    let token = extract::require_token(&headers)?;
    let now = Utc::now();

    let worker = state.clone();
    let caller = token.clone();
    let updated = tokio::task::spawn_blocking(move || {
        worker.repo.accept_offer(request_id, offer_id, &caller, now)
    })
    .await
    .map_err(join_error)??;

    Ok(Json(project_request(&updated, &Viewer::Token(&token))))
}

pub async fn reject_offer(
    State(state): State<AppState>,
    Path((request_id, offer_id)): Path<(Uuid, Uuid)>,
    headers: HeaderMap,
) -> ApiResult<Json<RequestView>> {
    let token = extract::require_token(&headers)?;
    let now = Utc::now();

    let worker = state.clone();
    let caller = token.clone();
    let updated = tokio::task::spawn_blocking(move || {
        worker.repo.reject_offer(request_id, offer_id, &caller, now)
    })
    .await
    .map_err(join_error)??;

    Ok(Json(project_request(&updated, &Viewer::Token(&token))))
}
