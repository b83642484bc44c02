//! Convert coerced JSON field values to types sqlx can bind through the `Any` driver.

use crate::config::FieldType;
use serde_json::Value;
use sqlx::any::AnyArguments;
use sqlx::query::Query;
use sqlx::Any;

/// A value that can be bound to a query on either dialect.
#[derive(Clone, Debug, PartialEq)]
pub enum SqlBindValue {
    Null,
    Bool(bool),
    I64(i64),
    F64(f64),
    Text(String),
}

impl SqlBindValue {
    /// Values are already coerced to `field_type`; `json` fields are stored as serialized text.
    pub fn from_field(field_type: FieldType, v: &Value) -> Self {
        match (field_type, v) {
            (_, Value::Null) => SqlBindValue::Null,
            (FieldType::Json, v) => SqlBindValue::Text(v.to_string()),
            (FieldType::Float, Value::Number(n)) => SqlBindValue::F64(n.as_f64().unwrap_or(0.0)),
            (_, Value::Number(n)) => match n.as_i64() {
                Some(i) => SqlBindValue::I64(i),
                None => SqlBindValue::F64(n.as_f64().unwrap_or(0.0)),
            },
            (_, Value::Bool(b)) => SqlBindValue::Bool(*b),
            (_, Value::String(s)) => SqlBindValue::Text(s.clone()),
            (_, other) => SqlBindValue::Text(other.to_string()),
        }
    }

    pub fn bind<'q>(self, query: Query<'q, Any, AnyArguments<'q>>) -> Query<'q, Any, AnyArguments<'q>> {
        match self {
            SqlBindValue::Null => query.bind(Option::<String>::None),
            SqlBindValue::Bool(b) => query.bind(b),
            SqlBindValue::I64(n) => query.bind(n),
            SqlBindValue::F64(n) => query.bind(n),
            SqlBindValue::Text(s) => query.bind(s),
        }
    }
}
