//! Router assembly: common routes at the server root, CRUDS collections under the API root.

mod common;
mod resource;

pub use common::common_routes;
pub use resource::cruds_routes;

use crate::config::Settings;
use crate::handlers::{method_not_allowed, not_found, root};
use crate::state::AppState;
use axum::{extract::DefaultBodyLimit, routing::get, Router};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

/// Full application: common routes, the root collection, CRUDS routes, fallbacks, tracing and body limit.
/// The body limit is enforced by the `Bytes` extractor so oversized writes get a Collection+JSON 413.
pub fn build_app(state: AppState, settings: &Settings) -> Router {
    let api_root = state.api_root.clone();
    let root_routes = if api_root.is_empty() {
        Router::new().route("/", get(root).fallback(method_not_allowed))
    } else {
        Router::new()
            .route(&api_root, get(root).fallback(method_not_allowed))
            .route(&format!("{}/", api_root), get(root).fallback(method_not_allowed))
    }
    .with_state(state.clone());

    let app = Router::new()
        .merge(common_routes(state.clone()))
        .merge(root_routes);
    let app = if api_root.is_empty() {
        app.merge(cruds_routes(state))
    } else {
        app.nest(&api_root, cruds_routes(state))
    };

    app.fallback(not_found).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(DefaultBodyLimit::max(settings.max_body_bytes)),
    )
}
