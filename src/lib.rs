//! crudsdb: CRUDS (create, read, update, delete, search) over pluggable storage backends,
//! served as a Collection+JSON hypermedia API.

pub mod case;
pub mod collection;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod migration;
pub mod response;
pub mod routes;
pub mod service;
pub mod sql;
pub mod state;

pub use collection::{CollectionDocument, Template, MEDIA_TYPE};
pub use config::{load_models_from_path, load_models_from_str, resolve, BackendKind, Model, ModelRegistry, Settings};
pub use db::{connect, Database, FlatDatabase, ListParams, Record, RecordId, SqlDatabase};
pub use error::{AppError, ConfigError};
pub use routes::{build_app, common_routes, cruds_routes};
pub use service::CrudService;
pub use state::AppState;
