//! Storage adapter interface and backend selection.
//!
//! A backend stores plain records per model; rendering to Collection+JSON happens above it,
//! so every backend produces the same documents.

mod flatfile;
mod sql;

pub use flatfile::FlatDatabase;
pub use sql::{Dialect, SqlDatabase};

use crate::config::{BackendKind, FieldType, Model, ModelRegistry, Settings};
use crate::error::{AppError, ConfigError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

pub const DEFAULT_LIMIT: u32 = 100;
pub const MAX_LIMIT: u32 = 1000;

/// Field values of one record, keyed by field name. Never contains `id`.
pub type Fields = Map<String, Value>;

/// Positive integer record id, assigned by the backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordId(pub i64);

impl RecordId {
    pub fn parse(s: &str) -> Result<Self, AppError> {
        match s.parse::<i64>() {
            Ok(n) if n > 0 => Ok(RecordId(n)),
            _ => Err(AppError::BadRequest(format!("invalid id '{}'", s))),
        }
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Record {
    pub id: RecordId,
    pub fields: Fields,
}

/// Paging and ordering for list and search.
#[derive(Clone, Debug, PartialEq)]
pub struct ListParams {
    pub limit: u32,
    pub offset: u32,
    /// A field name or `id`; checked against the model before reaching a backend.
    pub order_by: String,
    pub descending: bool,
}

impl Default for ListParams {
    fn default() -> Self {
        ListParams {
            limit: DEFAULT_LIMIT,
            offset: 0,
            order_by: "id".to_string(),
            descending: false,
        }
    }
}

impl ListParams {
    /// Limit defaults to 100 and is capped at 1000; offset defaults to 0.
    pub fn new(limit: Option<u32>, offset: Option<u32>, order_by: String, descending: bool) -> Self {
        ListParams {
            limit: limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT),
            offset: offset.unwrap_or(0),
            order_by,
            descending,
        }
    }
}

/// One search constraint. Text fields match a case-insensitive substring, other types match exactly.
#[derive(Clone, Debug, PartialEq)]
pub struct SearchTerm {
    pub field: String,
    pub value: Value,
}

#[async_trait]
pub trait Database: Send + Sync {
    fn backend(&self) -> BackendKind;

    /// Readiness probe.
    async fn ping(&self) -> Result<(), AppError>;

    async fn create(&self, model: &Model, fields: Fields) -> Result<Record, AppError>;

    async fn read(&self, model: &Model, id: RecordId) -> Result<Option<Record>, AppError>;

    async fn list(&self, model: &Model, params: &ListParams) -> Result<Vec<Record>, AppError>;

    /// Overlay `fields` on the stored record. `None` when no record has `id`.
    async fn update(&self, model: &Model, id: RecordId, fields: Fields) -> Result<Option<Record>, AppError>;

    /// `false` when no record had `id`.
    async fn delete(&self, model: &Model, id: RecordId) -> Result<bool, AppError>;

    async fn search(
        &self,
        model: &Model,
        terms: &[SearchTerm],
        params: &ListParams,
    ) -> Result<Vec<Record>, AppError>;
}

/// Open the backend named in settings. SQL backends get their tables created for every registered model.
pub async fn connect(settings: &Settings, registry: &ModelRegistry) -> Result<Arc<dyn Database>, AppError> {
    match settings.backend {
        BackendKind::Flatfile => {
            let db = FlatDatabase::open(&settings.flat_database_file).await?;
            Ok(Arc::new(db))
        }
        BackendKind::Sql => {
            let url = settings
                .database_url
                .as_deref()
                .ok_or_else(|| ConfigError::Settings("DATABASE_URL is required for the sql backend".into()))?;
            let db = SqlDatabase::connect(url).await?;
            db.ensure_tables(registry).await?;
            Ok(Arc::new(db))
        }
        BackendKind::CouchDb => Err(ConfigError::UnsupportedBackend(BackendKind::CouchDb.as_str().into()).into()),
    }
}

/// Ordering used by backends without a query engine: null/missing < bool < number < string < other.
pub(crate) fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    fn rank(v: Option<&Value>) -> u8 {
        match v {
            None | Some(Value::Null) => 0,
            Some(Value::Bool(_)) => 1,
            Some(Value::Number(_)) => 2,
            Some(Value::String(_)) => 3,
            Some(_) => 4,
        }
    }
    match (a, b) {
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

/// Whether a stored value satisfies a search term for a field of `field_type`.
pub(crate) fn term_matches(field_type: FieldType, stored: Option<&Value>, wanted: &Value) -> bool {
    match (field_type, stored, wanted) {
        (_, _, Value::Null) => matches!(stored, None | Some(Value::Null)),
        (FieldType::Text, Some(Value::String(s)), Value::String(w)) => s.to_lowercase().contains(&w.to_lowercase()),
        (_, Some(Value::Number(s)), Value::Number(w)) => s.as_f64() == w.as_f64(),
        (_, Some(s), w) => s == w,
        (_, None, _) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn record_id_must_be_positive_integer() {
        assert_eq!(RecordId::parse("12").expect("valid"), RecordId(12));
        for bad in ["0", "-3", "abc", "1.5", ""] {
            assert!(matches!(RecordId::parse(bad), Err(AppError::BadRequest(_))), "{bad}");
        }
    }

    #[test]
    fn list_params_clamp_limit() {
        let p = ListParams::new(Some(5000), None, "id".into(), false);
        assert_eq!(p.limit, MAX_LIMIT);
        assert_eq!(p.offset, 0);
        assert_eq!(ListParams::new(None, Some(3), "id".into(), true).limit, DEFAULT_LIMIT);
    }

    #[test]
    fn values_order_by_type_then_content() {
        assert_eq!(compare_values(None, Some(&json!(1))), Ordering::Less);
        assert_eq!(compare_values(Some(&json!(2)), Some(&json!(10))), Ordering::Less);
        assert_eq!(compare_values(Some(&json!(2.5)), Some(&json!(2))), Ordering::Greater);
        assert_eq!(compare_values(Some(&json!("b")), Some(&json!("a"))), Ordering::Greater);
        assert_eq!(compare_values(Some(&json!(true)), Some(&json!("a"))), Ordering::Less);
    }

    #[test]
    fn text_terms_match_substrings_case_insensitively() {
        assert!(term_matches(FieldType::Text, Some(&json!("Dune Messiah")), &json!("dune")));
        assert!(!term_matches(FieldType::Text, Some(&json!("Emma")), &json!("dune")));
        assert!(term_matches(FieldType::Integer, Some(&json!(300)), &json!(300)));
        assert!(!term_matches(FieldType::Integer, Some(&json!(3000)), &json!(300)));
        assert!(term_matches(FieldType::Float, Some(&json!(2.0)), &json!(2)));
        assert!(!term_matches(FieldType::Boolean, None, &json!(true)));
    }
}
