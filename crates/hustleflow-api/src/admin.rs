use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use chrono::Utc;

use hustleflow_board::view::{project_request, Viewer};
use hustleflow_types::api::RequestView;

use crate::error::{join_error, ApiResult};
use crate::extract;
use crate::state::AppState;

/// Moderation table: every active request with full identity disclosure.
/// The repository rejects non-admin tokens.
pub async fn list_requests(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<Vec<RequestView>>> {
    let token = extract::require_token(&headers)?;
    let now = Utc::now();

    let worker = state.clone();
    let requests =
        tokio::task::spawn_blocking(move || worker.repo.list_all_for_admin(&token, now))
            .await
            .map_err(join_error)??;

    Ok(Json(
        requests
            .iter()
            .map(|r| project_request(r, &Viewer::Admin))
            .collect(),
    ))
}
