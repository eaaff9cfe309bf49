use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::handler::{self, AppState};

/// Build the axum router with all filer endpoints.
///
/// The request body limit is lifted; per-file size is enforced by the
/// [`Filer`](filer_core::Filer) held in `state`.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", post(handler::upload_handler))
        .route("/health", get(handler::health_handler))
        .route(
            "/:digest/:instance",
            get(handler::retrieve_handler).delete(handler::delete_handler),
        )
        .layer(DefaultBodyLimit::disable())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
