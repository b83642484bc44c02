//! CRUDS orchestration: operation checks, coercion and validation, then the storage backend.

use crate::collection::Template;
use crate::config::{Model, Operation};
use crate::db::{Database, ListParams, Record, RecordId, SearchTerm};
use crate::error::AppError;
use crate::service::validation::{coerce_value, RequestValidator};

pub struct CrudService;

impl CrudService {
    fn ensure_allowed(model: &Model, op: Operation) -> Result<(), AppError> {
        if model.allows(op) {
            Ok(())
        } else {
            Err(AppError::MethodNotAllowed(format!("{} not allowed on {}", op, model.name)))
        }
    }

    fn ensure_sortable(model: &Model, params: &ListParams) -> Result<(), AppError> {
        if model.is_sortable(&params.order_by) {
            Ok(())
        } else {
            Err(AppError::BadRequest(format!(
                "cannot order {} by unknown field '{}'",
                model.name, params.order_by
            )))
        }
    }

    pub async fn create(db: &dyn Database, model: &Model, template: Template) -> Result<Record, AppError> {
        Self::ensure_allowed(model, Operation::Create)?;
        let fields = RequestValidator::coerce(model, template.into_fields())?;
        RequestValidator::validate(model, &fields)?;
        let record = db.create(model, fields).await?;
        tracing::info!(model = %model.name, id = %record.id, backend = db.backend().as_str(), "created");
        Ok(record)
    }

    pub async fn read(db: &dyn Database, model: &Model, id: RecordId) -> Result<Record, AppError> {
        Self::ensure_allowed(model, Operation::Read)?;
        db.read(model, id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("{} {}", model.name, id)))
    }

    pub async fn list(db: &dyn Database, model: &Model, params: &ListParams) -> Result<Vec<Record>, AppError> {
        Self::ensure_allowed(model, Operation::Read)?;
        Self::ensure_sortable(model, params)?;
        db.list(model, params).await
    }

    /// Partial update: only the submitted fields change.
    pub async fn update(
        db: &dyn Database,
        model: &Model,
        id: RecordId,
        template: Template,
    ) -> Result<Record, AppError> {
        Self::ensure_allowed(model, Operation::Update)?;
        let fields = RequestValidator::coerce(model, template.into_fields())?;
        RequestValidator::validate_partial(model, &fields)?;
        let record = db
            .update(model, id, fields)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("{} {}", model.name, id)))?;
        tracing::info!(model = %model.name, id = %id, "updated");
        Ok(record)
    }

    pub async fn delete(db: &dyn Database, model: &Model, id: RecordId) -> Result<(), AppError> {
        Self::ensure_allowed(model, Operation::Delete)?;
        if !db.delete(model, id).await? {
            return Err(AppError::NotFound(format!("{} {}", model.name, id)));
        }
        tracing::info!(model = %model.name, id = %id, "deleted");
        Ok(())
    }

    /// Search by `(field, raw value)` pairs. Blank values are ignored, as search forms submit every field.
    pub async fn search(
        db: &dyn Database,
        model: &Model,
        pairs: Vec<(String, String)>,
        params: &ListParams,
    ) -> Result<Vec<Record>, AppError> {
        Self::ensure_allowed(model, Operation::Search)?;
        Self::ensure_sortable(model, params)?;
        let mut terms = Vec::with_capacity(pairs.len());
        for (name, raw) in pairs {
            if raw.trim().is_empty() {
                continue;
            }
            let field = model
                .field(&name)
                .ok_or_else(|| AppError::BadRequest(format!("cannot search {} by unknown field '{}'", model.name, name)))?;
            let value = coerce_value(field, serde_json::Value::String(raw))
                .map_err(|e| AppError::BadRequest(e.to_string()))?;
            terms.push(SearchTerm { field: name, value });
        }
        tracing::debug!(model = %model.name, terms = terms.len(), "search");
        db.search(model, &terms, params).await
    }
}
