//! CRUDS routes built from the model registry.
//! Parameterized paths: handlers resolve the model by its path segment.

use crate::handlers::{create, delete as delete_handler, list, method_not_allowed, read, search, update};
use crate::state::AppState;
use axum::{routing::get, Router};

pub fn cruds_routes(state: AppState) -> Router {
    Router::new()
        .route("/:path_segment", get(list).post(create).fallback(method_not_allowed))
        .route("/:path_segment/search", get(search).fallback(method_not_allowed))
        .route(
            "/:path_segment/:id",
            get(read)
                .put(update)
                .patch(update)
                .delete(delete_handler)
                .fallback(method_not_allowed),
        )
        .with_state(state)
}
