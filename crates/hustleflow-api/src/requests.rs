use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use tracing::warn;
use uuid::Uuid;

use hustleflow_board::narrative::RequestSummary;
use hustleflow_board::view::{project_request, Viewer};
use hustleflow_types::api::{
    CreateRequestRequest, CreateRequestResponse, NarrativeView, RequestView,
    UpdateRequestRequest,
};
use hustleflow_types::models::{ExchangeKind, Identity, RequestTerms};

use crate::error::{join_error, ApiResult};
use crate::extract;
use crate::state::{AppState, AppStateInner};

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BoardFilter {
    #[default]
    All,
    Cash,
    Digital,
}

impl BoardFilter {
    fn kind(self) -> Option<ExchangeKind> {
        match self {
            Self::All => None,
            Self::Cash => Some(ExchangeKind::Cash),
            Self::Digital => Some(ExchangeKind::Digital),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub filter: BoardFilter,
}

fn viewer_for<'a>(state: &AppStateInner, token: Option<&'a str>) -> Viewer<'a> {
    let is_admin = token.is_some_and(|t| state.repo.is_admin(t));
    Viewer::classify(token, is_admin)
}

pub async fn list_requests(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
    headers: HeaderMap,
) -> ApiResult<Json<Vec<RequestView>>> {
    let token = extract::bearer_token(&headers).map(str::to_owned);
    let now = Utc::now();

    let worker = state.clone();
    let requests = tokio::task::spawn_blocking(move || {
        worker.repo.list_active(query.filter.kind(), now)
    })
    .await
    .map_err(join_error)??;

    let viewer = viewer_for(&state, token.as_deref());
    Ok(Json(
        requests.iter().map(|r| project_request(r, &viewer)).collect(),
    ))
}

pub async fn list_activity(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<Vec<RequestView>>> {
    let token = extract::require_token(&headers)?;
    let now = Utc::now();

    let worker = state.clone();
    let caller = token.clone();
    let requests =
        tokio::task::spawn_blocking(move || worker.repo.list_activity(&caller, now))
            .await
            .map_err(join_error)??;

    let viewer = viewer_for(&state, Some(&token));
    Ok(Json(
        requests.iter().map(|r| project_request(r, &viewer)).collect(),
    ))
}

pub async fn create_request(
    State(state): State<AppState>,
    Json(req): Json<CreateRequestRequest>,
) -> ApiResult<impl IntoResponse> {
    let now = Utc::now();
    let identity: Identity = req.identity.into();
    let terms = RequestTerms {
        amount: req.amount,
        kind: req.kind,
        urgency: req.urgency,
        duration_days: req.duration_days,
    };

    let worker = state.clone();
    let creator = identity.clone();
    let created =
        tokio::task::spawn_blocking(move || worker.repo.create(&terms, &creator, now))
            .await
            .map_err(join_error)??;

    // Advisory only: a narrator failure or timeout never fails the create.
    let narrative = match &state.narrator {
        Some(narrator) => {
            let summary = RequestSummary::from_request(&created, req.preferences);
            match narrator.narrate(&summary).await {
                Ok(n) => Some(NarrativeView {
                    reasoning: n.reasoning,
                    candidate_tokens: n.candidate_tokens,
                }),
                Err(e) => {
                    warn!(request = %created.id, "match narrative failed: {:#}", e);
                    None
                }
            }
        }
        None => None,
    };

    let viewer = Viewer::Token(&identity.token);
    Ok((
        StatusCode::CREATED,
        Json(CreateRequestResponse {
            request: project_request(&created, &viewer),
            narrative,
        }),
    ))
}

pub async fn update_request(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Json(req): Json<UpdateRequestRequest>,
) -> ApiResult<Json<RequestView>> {
    let token = extract::require_token(&headers)?;
    let now = Utc::now();
    let terms = RequestTerms {
        amount: req.amount,
        kind: req.kind,
        urgency: req.urgency,
        duration_days: req.duration_days,
    };

    let worker = state.clone();
    let caller = token.clone();
    let updated =
        tokio::task::spawn_blocking(move || worker.repo.update(id, &terms, &caller, now))
            .await
            .map_err(join_error)??;

    let viewer = viewer_for(&state, Some(&token));
    Ok(Json(project_request(&updated, &viewer)))
}

pub async fn delete_request(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> ApiResult<StatusCode> {
    let token = extract::require_token(&headers)?;
    let now = Utc::now();

    let worker = state.clone();
    tokio::task::spawn_blocking(move || worker.repo.delete(id, &token, now))
        .await
        .map_err(join_error)??;

    Ok(StatusCode::NO_CONTENT)
}
