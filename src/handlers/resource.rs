//! Collection handlers: root listing, list, create, search, read, update, delete.

use crate::collection::{collection_for, item_href, root_collection, Template};
use crate::config::Model;
use crate::db::{ListParams, RecordId};
use crate::error::AppError;
use crate::response::{created, ok, CollectionJson};
use crate::service::CrudService;
use crate::state::AppState;
use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, Path, Query, State},
    http::{Method, StatusCode, Uri},
};

fn model_by_path<'a>(state: &'a AppState, path_segment: &str) -> Result<&'a Model, AppError> {
    state
        .registry
        .by_path(path_segment)
        .ok_or_else(|| AppError::NotFound(format!("collection '{}'", path_segment)))
}

/// Split query pairs into paging/ordering params and the rest (search terms).
fn split_query(model: &Model, pairs: Vec<(String, String)>) -> Result<(ListParams, Vec<(String, String)>), AppError> {
    let mut limit = None;
    let mut offset = None;
    let mut order_by = None;
    let mut descending = false;
    let mut rest = Vec::new();
    for (k, v) in pairs {
        match k.as_str() {
            "limit" => {
                limit = Some(v.parse::<u32>().map_err(|_| AppError::BadRequest(format!("invalid limit '{}'", v)))?);
            }
            "offset" => {
                offset = Some(v.parse::<u32>().map_err(|_| AppError::BadRequest(format!("invalid offset '{}'", v)))?);
            }
            "order_by" => order_by = Some(v),
            "order" => {
                descending = match v.to_ascii_lowercase().as_str() {
                    "asc" => false,
                    "desc" => true,
                    _ => return Err(AppError::BadRequest(format!("invalid order '{}'", v))),
                };
            }
            _ => rest.push((k, v)),
        }
    }
    let order_by = order_by.unwrap_or_else(|| model.order_by.clone());
    Ok((ListParams::new(limit, offset, order_by, descending), rest))
}

pub async fn root(State(state): State<AppState>) -> CollectionJson {
    ok(root_collection(&state.api_root, &state.registry))
}

pub async fn list(
    State(state): State<AppState>,
    Path(path_segment): Path<String>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<CollectionJson, AppError> {
    let model = model_by_path(&state, &path_segment)?;
    let (params, rest) = split_query(model, pairs)?;
    if let Some((name, _)) = rest.first() {
        return Err(AppError::BadRequest(format!(
            "unknown list parameter '{}' (search terms go to {}/search)",
            name, path_segment
        )));
    }
    let records = CrudService::list(state.db.as_ref(), model, &params).await?;
    Ok(ok(collection_for(&state.api_root, model, &records)))
}

pub async fn create(
    State(state): State<AppState>,
    Path(path_segment): Path<String>,
    body: Result<Bytes, BytesRejection>,
) -> Result<CollectionJson, AppError> {
    let model = model_by_path(&state, &path_segment)?;
    let template = Template::from_slice(&body?)?;
    let record = CrudService::create(state.db.as_ref(), model, template).await?;
    let location = item_href(&state.api_root, model, record.id);
    Ok(created(collection_for(&state.api_root, model, &[record]), location))
}

pub async fn search(
    State(state): State<AppState>,
    Path(path_segment): Path<String>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<CollectionJson, AppError> {
    let model = model_by_path(&state, &path_segment)?;
    let (params, terms) = split_query(model, pairs)?;
    let records = CrudService::search(state.db.as_ref(), model, terms, &params).await?;
    Ok(ok(collection_for(&state.api_root, model, &records)))
}

pub async fn read(
    State(state): State<AppState>,
    Path((path_segment, id)): Path<(String, String)>,
) -> Result<CollectionJson, AppError> {
    let model = model_by_path(&state, &path_segment)?;
    let id = RecordId::parse(&id)?;
    let record = CrudService::read(state.db.as_ref(), model, id).await?;
    Ok(ok(collection_for(&state.api_root, model, &[record])))
}

pub async fn update(
    State(state): State<AppState>,
    Path((path_segment, id)): Path<(String, String)>,
    body: Result<Bytes, BytesRejection>,
) -> Result<CollectionJson, AppError> {
    let model = model_by_path(&state, &path_segment)?;
    let id = RecordId::parse(&id)?;
    let template = Template::from_slice(&body?)?;
    let record = CrudService::update(state.db.as_ref(), model, id, template).await?;
    Ok(ok(collection_for(&state.api_root, model, &[record])))
}

pub async fn delete(
    State(state): State<AppState>,
    Path((path_segment, id)): Path<(String, String)>,
) -> Result<StatusCode, AppError> {
    let model = model_by_path(&state, &path_segment)?;
    let id = RecordId::parse(&id)?;
    CrudService::delete(state.db.as_ref(), model, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Router fallback for paths no route matches.
pub async fn not_found(uri: Uri) -> AppError {
    AppError::NotFound(format!("no resource at {}", uri.path()))
}

/// Per-route fallback for verbs the route does not serve.
pub async fn method_not_allowed(method: Method, uri: Uri) -> AppError {
    AppError::MethodNotAllowed(format!("{} {}", method, uri.path()))
}
