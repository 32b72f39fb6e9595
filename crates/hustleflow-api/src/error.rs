use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::error;

use hustleflow_types::api::ErrorBody;
use hustleflow_types::error::BoardError;

/// Board failures carried out of handlers as responses. Typed kinds map to
/// statuses; storage details never reach the wire.
pub struct ApiError(pub BoardError);

pub type ApiResult<T> = Result<T, ApiError>;

impl From<BoardError> for ApiError {
    fn from(err: BoardError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            BoardError::InvalidInput { .. } => StatusCode::BAD_REQUEST,
            BoardError::IdentityRequired => StatusCode::UNAUTHORIZED,
            BoardError::Unauthorized => StatusCode::FORBIDDEN,
            BoardError::NotFound(_) | BoardError::OfferNotFound(_) => StatusCode::NOT_FOUND,
            BoardError::SelfOfferForbidden
            | BoardError::DuplicateOffer
            | BoardError::AlreadyActioned => StatusCode::CONFLICT,
            BoardError::Storage(e) => {
                error!("storage failure: {:#}", e);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let message = match &self.0 {
            BoardError::Storage(_) => "internal storage error".to_string(),
            other => other.to_string(),
        };
        let body = ErrorBody {
            error: self.0.kind().to_string(),
            message,
        };
        (status, Json(body)).into_response()
    }
}

/// A blocking task died before answering; surface as a storage fault.
pub fn join_error(err: tokio::task::JoinError) -> ApiError {
    error!("spawn_blocking join error: {}", err);
    ApiError(BoardError::Storage(anyhow::anyhow!(
        "background task failed: {err}"
    )))
}
