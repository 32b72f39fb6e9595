pub mod admin;
pub mod error;
pub mod extract;
pub mod offers;
pub mod requests;
pub mod state;

use axum::routing::{get, post, put};
use axum::Router;

use crate::state::AppState;

/// The board's HTTP surface. Layers (CORS, tracing) are the binary's
/// concern.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route(
            "/requests",
            get(requests::list_requests).post(requests::create_request),
        )
        .route("/requests/activity", get(requests::list_activity))
        .route(
            "/requests/{id}",
            put(requests::update_request).delete(requests::delete_request),
        )
        .route("/requests/{id}/offers", post(offers::make_offer))
        .route(
            "/requests/{id}/offers/{offer_id}/accept",
            post(offers::accept_offer),
        )
        .route(
            "/requests/{id}/offers/{offer_id}/reject",
            post(offers::reject_offer),
        )
        .route("/admin/requests", get(admin::list_requests))
        .with_state(state)
}
