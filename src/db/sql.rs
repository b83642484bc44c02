//! SQL backend over `sqlx::AnyPool` (PostgreSQL or SQLite).

pub use crate::sql::Dialect;

use crate::config::{BackendKind, FieldType, Model, ModelRegistry};
use crate::db::{Database, Fields, ListParams, Record, RecordId, SearchTerm};
use crate::error::AppError;
use crate::migration::apply_migrations;
use crate::sql::{delete, insert, select_by_id, select_list, update, QueryBuf};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::any::{AnyPoolOptions, AnyRow};
use sqlx::{AnyPool, Row};

pub struct SqlDatabase {
    pool: AnyPool,
    dialect: Dialect,
}

impl SqlDatabase {
    /// Connect to `url`. In-memory SQLite is limited to one connection so every query sees the same database.
    pub async fn connect(url: &str) -> Result<Self, AppError> {
        sqlx::any::install_default_drivers();
        let dialect = Dialect::from_url(url)?;
        let in_memory = dialect == Dialect::Sqlite && url.contains(":memory:");
        let options = if in_memory {
            AnyPoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            AnyPoolOptions::new().max_connections(5)
        };
        let pool = options.connect(url).await?;
        tracing::info!(dialect = ?dialect, in_memory, "connected sql backend");
        Ok(SqlDatabase { pool, dialect })
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub async fn ensure_tables(&self, registry: &ModelRegistry) -> Result<(), AppError> {
        apply_migrations(&self.pool, self.dialect, registry).await
    }

    async fn fetch_optional(&self, model: &Model, q: QueryBuf) -> Result<Option<Record>, AppError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let mut query = sqlx::query(&q.sql);
        for p in q.params {
            query = p.bind(query);
        }
        let row = query.fetch_optional(&self.pool).await?;
        row.map(|r| row_to_record(model, &r)).transpose()
    }

    async fn fetch_all(&self, model: &Model, q: QueryBuf) -> Result<Vec<Record>, AppError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let mut query = sqlx::query(&q.sql);
        for p in q.params {
            query = p.bind(query);
        }
        let rows = query.fetch_all(&self.pool).await?;
        rows.iter().map(|r| row_to_record(model, r)).collect()
    }
}

#[async_trait]
impl Database for SqlDatabase {
    fn backend(&self) -> BackendKind {
        BackendKind::Sql
    }

    async fn ping(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1").fetch_optional(&self.pool).await?;
        Ok(())
    }

    async fn create(&self, model: &Model, fields: Fields) -> Result<Record, AppError> {
        let q = insert(self.dialect, model, &fields);
        self.fetch_optional(model, q)
            .await?
            .ok_or(AppError::Db(sqlx::Error::RowNotFound))
    }

    async fn read(&self, model: &Model, id: RecordId) -> Result<Option<Record>, AppError> {
        self.fetch_optional(model, select_by_id(self.dialect, model, id)).await
    }

    async fn list(&self, model: &Model, params: &ListParams) -> Result<Vec<Record>, AppError> {
        self.fetch_all(model, select_list(self.dialect, model, &[], params)).await
    }

    async fn update(&self, model: &Model, id: RecordId, fields: Fields) -> Result<Option<Record>, AppError> {
        self.fetch_optional(model, update(self.dialect, model, id, &fields)).await
    }

    async fn delete(&self, model: &Model, id: RecordId) -> Result<bool, AppError> {
        let q = delete(self.dialect, model, id);
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let mut query = sqlx::query(&q.sql);
        for p in q.params {
            query = p.bind(query);
        }
        Ok(query.fetch_optional(&self.pool).await?.is_some())
    }

    async fn search(
        &self,
        model: &Model,
        terms: &[SearchTerm],
        params: &ListParams,
    ) -> Result<Vec<Record>, AppError> {
        self.fetch_all(model, select_list(self.dialect, model, terms, params)).await
    }
}

fn row_to_record(model: &Model, row: &AnyRow) -> Result<Record, AppError> {
    let id = row
        .try_get::<i64, _>("id")
        .or_else(|_| row.try_get::<i32, _>("id").map(i64::from))?;
    let mut fields = Fields::new();
    for f in &model.fields {
        fields.insert(f.name.clone(), cell_to_value(row, &f.name, f.field_type));
    }
    Ok(Record {
        id: RecordId(id),
        fields,
    })
}

/// Decode by declared field type; SQLite hands booleans back as integers and whole floats may arrive as integers.
fn cell_to_value(row: &AnyRow, name: &str, field_type: FieldType) -> Value {
    match field_type {
        FieldType::Integer => {
            if let Ok(Some(n)) = row.try_get::<Option<i64>, _>(name) {
                return Value::Number(n.into());
            }
        }
        FieldType::Float => {
            if let Ok(Some(n)) = row.try_get::<Option<f64>, _>(name) {
                if let Some(n) = serde_json::Number::from_f64(n) {
                    return Value::Number(n);
                }
            }
            if let Ok(Some(n)) = row.try_get::<Option<i64>, _>(name) {
                if let Some(n) = serde_json::Number::from_f64(n as f64) {
                    return Value::Number(n);
                }
            }
        }
        FieldType::Boolean => {
            if let Ok(Some(b)) = row.try_get::<Option<bool>, _>(name) {
                return Value::Bool(b);
            }
            if let Ok(Some(n)) = row.try_get::<Option<i64>, _>(name) {
                return Value::Bool(n != 0);
            }
        }
        FieldType::Json => {
            if let Ok(Some(s)) = row.try_get::<Option<String>, _>(name) {
                return serde_json::from_str(&s).unwrap_or(Value::String(s));
            }
        }
        FieldType::Text | FieldType::Date | FieldType::Datetime | FieldType::Uuid => {
            if let Ok(Some(s)) = row.try_get::<Option<String>, _>(name) {
                return Value::String(s);
            }
        }
    }
    Value::Null
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{load_models_from_str, resolve};
    use serde_json::json;

    fn registry() -> ModelRegistry {
        let cfg = load_models_from_str(
            r#"{"models":[{"name":"Book","fields":[
                {"name":"title","type":"text"},
                {"name":"pages","type":"integer"},
                {"name":"rating","type":"float"},
                {"name":"in_print","type":"boolean"},
                {"name":"tags","type":"json"}
            ]}]}"#,
        )
        .expect("parses");
        resolve(&cfg).expect("resolves")
    }

    async fn memory_db(registry: &ModelRegistry) -> SqlDatabase {
        let db = SqlDatabase::connect("sqlite::memory:").await.expect("connects");
        db.ensure_tables(registry).await.expect("tables");
        db
    }

    fn book(title: &str, pages: i64) -> Fields {
        let mut f = Fields::new();
        f.insert("title".into(), json!(title));
        f.insert("pages".into(), json!(pages));
        f.insert("rating".into(), json!(4.5));
        f.insert("in_print".into(), json!(true));
        f.insert("tags".into(), json!(["sf", "classic"]));
        f
    }

    #[tokio::test]
    async fn create_read_round_trip_preserves_types() {
        let registry = registry();
        let model = registry.by_name("Book").expect("model");
        let db = memory_db(&registry).await;
        let created = db.create(model, book("Dune", 412)).await.expect("create");
        assert_eq!(created.id, RecordId(1));
        let read = db.read(model, created.id).await.expect("read").expect("exists");
        assert_eq!(read.fields["title"], json!("Dune"));
        assert_eq!(read.fields["pages"], json!(412));
        assert_eq!(read.fields["rating"], json!(4.5));
        assert_eq!(read.fields["in_print"], json!(true));
        assert_eq!(read.fields["tags"], json!(["sf", "classic"]));
        assert!(db.read(model, RecordId(2)).await.expect("read").is_none());
    }

    #[tokio::test]
    async fn update_delete_and_search() {
        let registry = registry();
        let model = registry.by_name("Book").expect("model");
        let db = memory_db(&registry).await;
        db.create(model, book("Dune", 412)).await.expect("create");
        db.create(model, book("Dune Messiah", 256)).await.expect("create");
        db.create(model, book("Emma", 474)).await.expect("create");

        let mut patch = Fields::new();
        patch.insert("pages".into(), json!(300));
        let updated = db.update(model, RecordId(2), patch).await.expect("update").expect("exists");
        assert_eq!(updated.fields["title"], json!("Dune Messiah"));
        assert_eq!(updated.fields["pages"], json!(300));

        let terms = [SearchTerm {
            field: "title".into(),
            value: json!("dune"),
        }];
        let found = db.search(model, &terms, &ListParams::default()).await.expect("search");
        assert_eq!(found.len(), 2);

        assert!(db.delete(model, RecordId(1)).await.expect("delete"));
        assert!(!db.delete(model, RecordId(1)).await.expect("delete again"));
        let all = db
            .list(model, &ListParams::new(None, None, "pages".into(), false))
            .await
            .expect("list");
        let ids: Vec<_> = all.iter().map(|r| r.id).collect();
        assert_eq!(ids, [RecordId(2), RecordId(3)]);
        db.ping().await.expect("ping");
    }

    #[tokio::test]
    async fn boolean_columns_round_trip_on_sqlite() {
        let registry = registry();
        let model = registry.by_name("Book").expect("model");
        let db = memory_db(&registry).await;
        let mut fields = book("Emma", 474);
        fields.insert("in_print".into(), json!(false));
        let created = db.create(model, fields).await.expect("create");
        assert_eq!(created.fields["in_print"], json!(false));

        let mut unset = Fields::new();
        unset.insert("title".into(), json!("Persuasion"));
        let created = db.create(model, unset).await.expect("create without boolean");
        assert_eq!(created.fields["in_print"], Value::Null);

        let terms = [SearchTerm {
            field: "in_print".into(),
            value: json!(false),
        }];
        let found = db.search(model, &terms, &ListParams::default()).await.expect("search");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].fields["title"], json!("Emma"));
    }

    #[tokio::test]
    async fn models_keep_separate_tables() {
        let cfg = load_models_from_str(
            r#"{"models":[
                {"name":"Post","fields":[{"name":"title","type":"text"}]},
                {"name":"Draft","fields":[{"name":"title","type":"text"}]}
            ]}"#,
        )
        .expect("parses");
        let registry = resolve(&cfg).expect("resolves");
        let db = memory_db(&registry).await;
        let post = registry.by_name("Post").expect("post");
        let draft = registry.by_name("Draft").expect("draft");

        let mut fields = Fields::new();
        fields.insert("title".into(), json!("only in posts"));
        db.create(post, fields).await.expect("create");

        assert_eq!(db.list(post, &ListParams::default()).await.expect("list").len(), 1);
        assert!(db.list(draft, &ListParams::default()).await.expect("list").is_empty());
    }
}
