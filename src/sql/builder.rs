//! Builds parameterized CREATE TABLE, INSERT, SELECT, UPDATE, DELETE from a resolved model.

use crate::config::{FieldType, Model};
use crate::db::{Fields, ListParams, RecordId, SearchTerm};
use crate::error::ConfigError;
use crate::sql::SqlBindValue;
use serde_json::Value;

/// SQL flavor behind the `Any` pool. Picked from the connection URL.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Dialect {
    Postgres,
    Sqlite,
}

impl Dialect {
    pub fn from_url(url: &str) -> Result<Self, ConfigError> {
        if url.starts_with("postgres://") || url.starts_with("postgresql://") {
            Ok(Dialect::Postgres)
        } else if url.starts_with("sqlite:") {
            Ok(Dialect::Sqlite)
        } else {
            let scheme = url.split(':').next().unwrap_or(url);
            Err(ConfigError::UnsupportedBackend(format!("database url scheme '{}'", scheme)))
        }
    }

    /// SQLite booleans are stored as INTEGER: the `Any` driver cannot decode a declared BOOLEAN column.
    fn column_type(&self, t: FieldType) -> &'static str {
        match (self, t) {
            (Dialect::Postgres, FieldType::Integer) => "BIGINT",
            (Dialect::Postgres, FieldType::Float) => "DOUBLE PRECISION",
            (Dialect::Postgres, FieldType::Boolean) => "BOOLEAN",
            (Dialect::Sqlite, FieldType::Integer | FieldType::Boolean) => "INTEGER",
            (Dialect::Sqlite, FieldType::Float) => "REAL",
            (_, FieldType::Text | FieldType::Date | FieldType::Datetime | FieldType::Uuid | FieldType::Json) => "TEXT",
        }
    }

    fn id_column(&self) -> &'static str {
        match self {
            Dialect::Postgres => "BIGSERIAL PRIMARY KEY",
            Dialect::Sqlite => "INTEGER PRIMARY KEY AUTOINCREMENT",
        }
    }

    /// Placeholder for parameter `n`. Postgres gets an explicit cast so text-typed NULLs bind to any column.
    fn placeholder(&self, n: usize, t: Option<FieldType>) -> String {
        match self {
            Dialect::Postgres => {
                let ty = t.map(|t| self.column_type(t)).unwrap_or("BIGINT");
                format!("${}::{}", n, ty)
            }
            Dialect::Sqlite => format!("${}", n),
        }
    }

    fn like(&self) -> &'static str {
        match self {
            Dialect::Postgres => "ILIKE",
            Dialect::Sqlite => "LIKE",
        }
    }
}

/// Quote identifier (safe: names come from validated config only).
fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

#[derive(Debug)]
pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<SqlBindValue>,
}

impl QueryBuf {
    fn new() -> Self {
        QueryBuf {
            sql: String::new(),
            params: Vec::new(),
        }
    }

    fn push_param(&mut self, v: SqlBindValue) -> usize {
        self.params.push(v);
        self.params.len()
    }
}

/// `"id", "title", ...` in declaration order.
fn select_column_list(model: &Model) -> String {
    std::iter::once(quoted("id"))
        .chain(model.fields.iter().map(|f| quoted(&f.name)))
        .collect::<Vec<_>>()
        .join(", ")
}

fn escape_like(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    for c in s.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// CREATE TABLE IF NOT EXISTS with an auto-increment id and one column per field.
pub fn create_table(dialect: Dialect, model: &Model) -> String {
    let mut defs = vec![format!("{} {}", quoted("id"), dialect.id_column())];
    for f in &model.fields {
        defs.push(format!("{} {}", quoted(&f.name), dialect.column_type(f.field_type)));
    }
    format!("CREATE TABLE IF NOT EXISTS {} ({})", quoted(&model.table_name), defs.join(", "))
}

pub fn select_by_id(dialect: Dialect, model: &Model, id: RecordId) -> QueryBuf {
    let mut q = QueryBuf::new();
    let n = q.push_param(SqlBindValue::I64(id.0));
    q.sql = format!(
        "SELECT {} FROM {} WHERE {} = {}",
        select_column_list(model),
        quoted(&model.table_name),
        quoted("id"),
        dialect.placeholder(n, None)
    );
    q
}

/// SELECT with optional search terms (AND), ORDER BY `order_by` then id, LIMIT/OFFSET.
/// Terms naming unknown fields are skipped.
pub fn select_list(dialect: Dialect, model: &Model, terms: &[SearchTerm], params: &ListParams) -> QueryBuf {
    let mut q = QueryBuf::new();
    let mut where_parts = Vec::new();
    for term in terms {
        let Some(field) = model.field(&term.field) else { continue };
        let col = quoted(&field.name);
        match (&term.value, field.field_type) {
            (Value::Null, _) => where_parts.push(format!("{} IS NULL", col)),
            (Value::String(s), FieldType::Text) => {
                let n = q.push_param(SqlBindValue::Text(format!("%{}%", escape_like(s))));
                where_parts.push(format!(
                    "{} {} {} ESCAPE '\\'",
                    col,
                    dialect.like(),
                    dialect.placeholder(n, Some(FieldType::Text))
                ));
            }
            (v, t) => {
                let n = q.push_param(SqlBindValue::from_field(t, v));
                where_parts.push(format!("{} = {}", col, dialect.placeholder(n, Some(t))));
            }
        }
    }
    let where_clause = if where_parts.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", where_parts.join(" AND "))
    };
    let direction = if params.descending { "DESC" } else { "ASC" };
    let order_clause = if params.order_by == "id" || model.field(&params.order_by).is_none() {
        format!(" ORDER BY {} {}", quoted("id"), direction)
    } else {
        format!(
            " ORDER BY {} {}, {} {}",
            quoted(&params.order_by),
            direction,
            quoted("id"),
            direction
        )
    };
    q.sql = format!(
        "SELECT {} FROM {}{}{} LIMIT {} OFFSET {}",
        select_column_list(model),
        quoted(&model.table_name),
        where_clause,
        order_clause,
        params.limit,
        params.offset
    );
    q
}

/// INSERT the fields present in `fields` (unknown keys skipped); others stay NULL.
pub fn insert(dialect: Dialect, model: &Model, fields: &Fields) -> QueryBuf {
    let mut q = QueryBuf::new();
    let mut cols = Vec::new();
    let mut placeholders = Vec::new();
    for f in &model.fields {
        let Some(v) = fields.get(&f.name) else { continue };
        let n = q.push_param(SqlBindValue::from_field(f.field_type, v));
        cols.push(quoted(&f.name));
        placeholders.push(dialect.placeholder(n, Some(f.field_type)));
    }
    let table = quoted(&model.table_name);
    let returning = select_column_list(model);
    q.sql = if cols.is_empty() {
        format!("INSERT INTO {} DEFAULT VALUES RETURNING {}", table, returning)
    } else {
        format!(
            "INSERT INTO {} ({}) VALUES ({}) RETURNING {}",
            table,
            cols.join(", "),
            placeholders.join(", "),
            returning
        )
    };
    q
}

/// UPDATE by id: SET only fields present in `fields`. With nothing to set, reads the row instead.
pub fn update(dialect: Dialect, model: &Model, id: RecordId, fields: &Fields) -> QueryBuf {
    let mut q = QueryBuf::new();
    let mut sets = Vec::new();
    for f in &model.fields {
        let Some(v) = fields.get(&f.name) else { continue };
        let n = q.push_param(SqlBindValue::from_field(f.field_type, v));
        sets.push(format!("{} = {}", quoted(&f.name), dialect.placeholder(n, Some(f.field_type))));
    }
    if sets.is_empty() {
        return select_by_id(dialect, model, id);
    }
    let n = q.push_param(SqlBindValue::I64(id.0));
    q.sql = format!(
        "UPDATE {} SET {} WHERE {} = {} RETURNING {}",
        quoted(&model.table_name),
        sets.join(", "),
        quoted("id"),
        dialect.placeholder(n, None),
        select_column_list(model)
    );
    q
}

pub fn delete(dialect: Dialect, model: &Model, id: RecordId) -> QueryBuf {
    let mut q = QueryBuf::new();
    let n = q.push_param(SqlBindValue::I64(id.0));
    q.sql = format!(
        "DELETE FROM {} WHERE {} = {} RETURNING {}",
        quoted(&model.table_name),
        quoted("id"),
        dialect.placeholder(n, None),
        quoted("id")
    );
    q
}
