//! Runtime settings read from the environment (`.env` honored via dotenvy).

use crate::error::ConfigError;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

pub const DEFAULT_API_ROOT: &str = "/api";
pub const DEFAULT_FLAT_DATABASE_FILE: &str = "crudsdb.json";
pub const DEFAULT_MODELS_PATH: &str = "models.json";
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3000";
pub const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;

/// Storage backend selected by `CRUDS_BACKEND`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BackendKind {
    Flatfile,
    Sql,
    CouchDb,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Flatfile => "flatfile",
            BackendKind::Sql => "sql",
            BackendKind::CouchDb => "couchdb",
        }
    }
}

impl FromStr for BackendKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "flatfile" | "flat" => Ok(BackendKind::Flatfile),
            "sql" | "sqlalchemy" => Ok(BackendKind::Sql),
            "couchdb" | "couch_db" => Ok(BackendKind::CouchDb),
            other => Err(ConfigError::Settings(format!("unknown CRUDS_BACKEND '{}'", other))),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Settings {
    /// Normalized: leading `/`, no trailing `/`; empty when mounted at the server root.
    pub api_root: String,
    pub backend: BackendKind,
    pub flat_database_file: PathBuf,
    pub database_url: Option<String>,
    pub models_path: PathBuf,
    pub bind_addr: SocketAddr,
    pub max_body_bytes: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            api_root: DEFAULT_API_ROOT.to_string(),
            backend: BackendKind::Flatfile,
            flat_database_file: PathBuf::from(DEFAULT_FLAT_DATABASE_FILE),
            database_url: None,
            models_path: PathBuf::from(DEFAULT_MODELS_PATH),
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

/// `"api/"` -> `"/api"`, `"/"` -> `""`.
pub fn normalize_api_root(raw: &str) -> String {
    let trimmed = raw.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{}", trimmed)
    }
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| dotenvy::var(key).ok())
    }

    /// Build settings from any key lookup (environment, map in tests).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_root = normalize_api_root(&lookup("API_ROOT").unwrap_or_else(|| DEFAULT_API_ROOT.into()));
        let backend = match lookup("CRUDS_BACKEND") {
            Some(s) => s.parse()?,
            None => BackendKind::Flatfile,
        };
        let flat_database_file =
            PathBuf::from(lookup("FLAT_DATABASE_FILE").unwrap_or_else(|| DEFAULT_FLAT_DATABASE_FILE.into()));
        let database_url = lookup("DATABASE_URL").filter(|s| !s.trim().is_empty());
        if backend == BackendKind::Sql && database_url.is_none() {
            return Err(ConfigError::Settings("DATABASE_URL is required for the sql backend".into()));
        }
        let models_path = PathBuf::from(lookup("MODELS_PATH").unwrap_or_else(|| DEFAULT_MODELS_PATH.into()));
        let bind_raw = lookup("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.into());
        let bind_addr = bind_raw
            .parse::<SocketAddr>()
            .map_err(|_| ConfigError::Settings(format!("invalid BIND_ADDR '{}'", bind_raw)))?;
        let max_body_bytes = match lookup("MAX_BODY_BYTES") {
            Some(s) => s
                .trim()
                .parse::<usize>()
                .map_err(|_| ConfigError::Settings(format!("invalid MAX_BODY_BYTES '{}'", s)))?,
            None => DEFAULT_MAX_BODY_BYTES,
        };
        Ok(Settings {
            api_root,
            backend,
            flat_database_file,
            database_url,
            models_path,
            bind_addr,
            max_body_bytes,
        })
    }
}
