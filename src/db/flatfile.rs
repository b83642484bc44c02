//! Flatfile backend: records held in memory and written to a single JSON file after every change.

use crate::config::{BackendKind, Model};
use crate::db::{compare_values, term_matches, Database, Fields, ListParams, Record, RecordId, SearchTerm};
use crate::error::AppError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

const FORMAT_VERSION: u32 = 1;

/// On-disk layout: `{"version":1,"models":{"Book":{"next_id":3,"records":{"1":{...}}}}}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
struct FlatStore {
    version: u32,
    #[serde(default)]
    models: BTreeMap<String, ModelTable>,
}

impl Default for FlatStore {
    fn default() -> Self {
        FlatStore {
            version: FORMAT_VERSION,
            models: BTreeMap::new(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
struct ModelTable {
    /// Next id to hand out. Only grows, so deleted ids are never reused.
    next_id: i64,
    #[serde(default)]
    records: BTreeMap<i64, Fields>,
}

impl Default for ModelTable {
    fn default() -> Self {
        ModelTable {
            next_id: 1,
            records: BTreeMap::new(),
        }
    }
}

pub struct FlatDatabase {
    path: PathBuf,
    store: RwLock<FlatStore>,
}

impl FlatDatabase {
    /// Load the file, or create it empty when it does not exist yet.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, AppError> {
        let path = path.as_ref().to_path_buf();
        let store = match tokio::fs::read(&path).await {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => FlatStore::default(),
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let store = FlatStore::default();
                write_store(&path, &store).await?;
                tracing::info!(path = %path.display(), "created flatfile database");
                store
            }
            Err(e) => return Err(e.into()),
        };
        tracing::info!(
            path = %path.display(),
            models = store.models.len(),
            "opened flatfile database"
        );
        Ok(FlatDatabase {
            path,
            store: RwLock::new(store),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Apply `f` to a copy of the store; persist and commit only when it returns `Some`.
    /// A failed write leaves the in-memory store untouched.
    async fn mutate<T, F>(&self, f: F) -> Result<Option<T>, AppError>
    where
        F: FnOnce(&mut FlatStore) -> Option<T>,
    {
        let mut guard = self.store.write().await;
        let mut next = guard.clone();
        let Some(out) = f(&mut next) else {
            return Ok(None);
        };
        write_store(&self.path, &next).await?;
        *guard = next;
        Ok(Some(out))
    }

    async fn records(&self, model: &Model) -> Vec<Record> {
        let guard = self.store.read().await;
        guard
            .models
            .get(&model.name)
            .map(|t| {
                t.records
                    .iter()
                    .map(|(id, fields)| Record {
                        id: RecordId(*id),
                        fields: fields.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

async fn write_store(path: &Path, store: &FlatStore) -> Result<(), AppError> {
    let bytes = serde_json::to_vec_pretty(store)?;
    let mut tmp = OsString::from(path.as_os_str());
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    tokio::fs::write(&tmp, &bytes).await?;
    tokio::fs::rename(&tmp, path).await?;
    tracing::debug!(path = %path.display(), bytes = bytes.len(), "flatfile written");
    Ok(())
}

/// Sort by `params.order_by` (id breaks ties), then page.
fn order_and_page(mut records: Vec<Record>, params: &ListParams) -> Vec<Record> {
    records.sort_by(|a, b| {
        let ord = if params.order_by == "id" {
            a.id.cmp(&b.id)
        } else {
            compare_values(a.fields.get(&params.order_by), b.fields.get(&params.order_by)).then(a.id.cmp(&b.id))
        };
        if params.descending {
            ord.reverse()
        } else {
            ord
        }
    });
    records
        .into_iter()
        .skip(params.offset as usize)
        .take(params.limit as usize)
        .collect()
}

#[async_trait]
impl Database for FlatDatabase {
    fn backend(&self) -> BackendKind {
        BackendKind::Flatfile
    }

    async fn ping(&self) -> Result<(), AppError> {
        tokio::fs::metadata(&self.path).await?;
        Ok(())
    }

    async fn create(&self, model: &Model, fields: Fields) -> Result<Record, AppError> {
        let record = self
            .mutate(|store| {
                let table = store.models.entry(model.name.clone()).or_default();
                let id = table.next_id;
                table.next_id += 1;
                table.records.insert(id, fields.clone());
                Some(Record {
                    id: RecordId(id),
                    fields,
                })
            })
            .await?;
        record.ok_or_else(|| AppError::NotFound(model.name.clone()))
    }

    async fn read(&self, model: &Model, id: RecordId) -> Result<Option<Record>, AppError> {
        let guard = self.store.read().await;
        Ok(guard
            .models
            .get(&model.name)
            .and_then(|t| t.records.get(&id.0))
            .map(|fields| Record {
                id,
                fields: fields.clone(),
            }))
    }

    async fn list(&self, model: &Model, params: &ListParams) -> Result<Vec<Record>, AppError> {
        Ok(order_and_page(self.records(model).await, params))
    }

    async fn update(&self, model: &Model, id: RecordId, fields: Fields) -> Result<Option<Record>, AppError> {
        self.mutate(|store| {
            let stored = store.models.get_mut(&model.name)?.records.get_mut(&id.0)?;
            for (k, v) in fields {
                stored.insert(k, v);
            }
            Some(Record {
                id,
                fields: stored.clone(),
            })
        })
        .await
    }

    async fn delete(&self, model: &Model, id: RecordId) -> Result<bool, AppError> {
        let removed = self
            .mutate(|store| store.models.get_mut(&model.name)?.records.remove(&id.0))
            .await?;
        Ok(removed.is_some())
    }

    async fn search(
        &self,
        model: &Model,
        terms: &[SearchTerm],
        params: &ListParams,
    ) -> Result<Vec<Record>, AppError> {
        let matched = self
            .records(model)
            .await
            .into_iter()
            .filter(|r| {
                terms.iter().all(|t| match model.field(&t.field) {
                    Some(f) => term_matches(f.field_type, r.fields.get(&t.field), &t.value),
                    None => false,
                })
            })
            .collect();
        Ok(order_and_page(matched, params))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{load_models_from_str, resolve, ModelRegistry};
    use serde_json::json;

    fn registry() -> ModelRegistry {
        let cfg = load_models_from_str(
            r#"{"models":[{"name":"Book","fields":[
                {"name":"title","type":"text"},
                {"name":"pages","type":"integer"}
            ]}]}"#,
        )
        .expect("parses");
        resolve(&cfg).expect("resolves")
    }

    fn temp_path() -> PathBuf {
        std::env::temp_dir().join(format!("crudsdb-flat-{}.json", uuid::Uuid::new_v4()))
    }

    fn book(title: &str, pages: i64) -> Fields {
        let mut f = Fields::new();
        f.insert("title".into(), json!(title));
        f.insert("pages".into(), json!(pages));
        f
    }

    #[tokio::test]
    async fn open_creates_missing_file() {
        let path = temp_path();
        let db = FlatDatabase::open(&path).await.expect("opens");
        assert!(tokio::fs::metadata(db.path()).await.is_ok());
        let raw = tokio::fs::read_to_string(&path).await.expect("readable");
        let v: serde_json::Value = serde_json::from_str(&raw).expect("json");
        assert_eq!(v["version"], 1);
        let _ = tokio::fs::remove_file(&path).await;
    }

    #[tokio::test]
    async fn open_rejects_corrupt_file() {
        let path = temp_path();
        tokio::fs::write(&path, b"{not json").await.expect("write");
        assert!(matches!(FlatDatabase::open(&path).await, Err(AppError::Serialization(_))));
        let _ = tokio::fs::remove_file(&path).await;
    }

    #[tokio::test]
    async fn ids_increase_and_are_not_reused() {
        let path = temp_path();
        let registry = registry();
        let model = registry.by_name("Book").expect("model");
        let db = FlatDatabase::open(&path).await.expect("opens");
        for (i, title) in ["a", "b", "c"].iter().enumerate() {
            let r = db.create(model, book(title, 1)).await.expect("create");
            assert_eq!(r.id, RecordId(i as i64 + 1));
        }
        assert!(db.delete(model, RecordId(3)).await.expect("delete"));
        assert!(!db.delete(model, RecordId(3)).await.expect("second delete"));
        let r = db.create(model, book("d", 1)).await.expect("create");
        assert_eq!(r.id, RecordId(4));
        let _ = tokio::fs::remove_file(&path).await;
    }

    #[tokio::test]
    async fn records_survive_reopen() {
        let path = temp_path();
        let registry = registry();
        let model = registry.by_name("Book").expect("model");
        {
            let db = FlatDatabase::open(&path).await.expect("opens");
            db.create(model, book("Dune", 412)).await.expect("create");
            db.create(model, book("Emma", 474)).await.expect("create");
            db.delete(model, RecordId(1)).await.expect("delete");
        }
        let db = FlatDatabase::open(&path).await.expect("reopens");
        let all = db.list(model, &ListParams::default()).await.expect("list");
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].fields["title"], json!("Emma"));
        let next = db.create(model, book("Ulysses", 730)).await.expect("create");
        assert_eq!(next.id, RecordId(3));
        let _ = tokio::fs::remove_file(&path).await;
    }

    #[tokio::test]
    async fn update_overlays_partial_fields() {
        let path = temp_path();
        let registry = registry();
        let model = registry.by_name("Book").expect("model");
        let db = FlatDatabase::open(&path).await.expect("opens");
        let r = db.create(model, book("Dune", 412)).await.expect("create");
        let mut patch = Fields::new();
        patch.insert("pages".into(), json!(500));
        let updated = db.update(model, r.id, patch).await.expect("update").expect("exists");
        assert_eq!(updated.fields["title"], json!("Dune"));
        assert_eq!(updated.fields["pages"], json!(500));
        assert!(db.update(model, RecordId(99), Fields::new()).await.expect("update").is_none());
        let _ = tokio::fs::remove_file(&path).await;
    }

    #[tokio::test]
    async fn list_orders_and_pages() {
        let path = temp_path();
        let registry = registry();
        let model = registry.by_name("Book").expect("model");
        let db = FlatDatabase::open(&path).await.expect("opens");
        db.create(model, book("b", 30)).await.expect("create");
        db.create(model, book("a", 10)).await.expect("create");
        db.create(model, book("c", 20)).await.expect("create");
        let by_pages = db
            .list(model, &ListParams::new(None, None, "pages".into(), true))
            .await
            .expect("list");
        let titles: Vec<_> = by_pages.iter().map(|r| r.fields["title"].clone()).collect();
        assert_eq!(titles, [json!("b"), json!("c"), json!("a")]);
        let page = db
            .list(model, &ListParams::new(Some(1), Some(1), "id".into(), false))
            .await
            .expect("list");
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].id, RecordId(2));
        let _ = tokio::fs::remove_file(&path).await;
    }

    #[tokio::test]
    async fn search_combines_terms() {
        let path = temp_path();
        let registry = registry();
        let model = registry.by_name("Book").expect("model");
        let db = FlatDatabase::open(&path).await.expect("opens");
        db.create(model, book("Dune", 412)).await.expect("create");
        db.create(model, book("Dune Messiah", 256)).await.expect("create");
        db.create(model, book("Emma", 474)).await.expect("create");
        let terms = [SearchTerm {
            field: "title".into(),
            value: json!("dune"),
        }];
        let found = db.search(model, &terms, &ListParams::default()).await.expect("search");
        assert_eq!(found.len(), 2);
        let terms = [
            SearchTerm {
                field: "title".into(),
                value: json!("DUNE"),
            },
            SearchTerm {
                field: "pages".into(),
                value: json!(256),
            },
        ];
        let found = db.search(model, &terms, &ListParams::default()).await.expect("search");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].fields["title"], json!("Dune Messiah"));
        let _ = tokio::fs::remove_file(&path).await;
    }
}
