//! Shared application state for all routes.

use crate::config::ModelRegistry;
use crate::db::Database;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<dyn Database>,
    pub registry: Arc<ModelRegistry>,
    /// Normalized API root (see `normalize_api_root`); used to build hrefs.
    pub api_root: String,
}
