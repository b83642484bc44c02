//! Shared helpers for router-level tests.

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use crudsdb::{build_app, load_models_from_str, resolve, AppState, Database, Settings};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use tower::ServiceExt;

pub const MODELS: &str = r#"{"models":[
    {"name":"Book","path_segment":"books","fields":[
        {"name":"title","type":"text","prompt":"Title","required":true},
        {"name":"pages","type":"integer","prompt":"Pages","validation":{"minimum":1}},
        {"name":"in_print","type":"boolean"}
    ]},
    {"name":"AuditLog","operations":["create","read"],"fields":[
        {"name":"message","type":"text"}
    ]}
]}"#;

pub fn app_with(db: Arc<dyn Database>, api_root: &str) -> Router {
    let cfg = match load_models_from_str(MODELS) {
        Ok(c) => c,
        Err(e) => panic!("models parse: {e}"),
    };
    let registry = match resolve(&cfg) {
        Ok(r) => r,
        Err(e) => panic!("models resolve: {e}"),
    };
    let settings = Settings {
        api_root: api_root.to_string(),
        ..Settings::default()
    };
    let state = AppState {
        db,
        registry: Arc::new(registry),
        api_root: settings.api_root.clone(),
    };
    build_app(state, &settings)
}

pub fn registry() -> crudsdb::ModelRegistry {
    match load_models_from_str(MODELS).and_then(|c| resolve(&c)) {
        Ok(r) => r,
        Err(e) => panic!("models: {e}"),
    }
}

pub fn temp_db_path() -> PathBuf {
    std::env::temp_dir().join(format!("crudsdb-api-{}.json", uuid::Uuid::new_v4()))
}

pub struct TestResponse {
    pub status: StatusCode,
    pub content_type: Option<String>,
    pub location: Option<String>,
    pub body: Value,
}

pub async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> TestResponse {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(v) => {
            builder = builder.header(header::CONTENT_TYPE, crudsdb::MEDIA_TYPE);
            Body::from(v.to_string())
        }
        None => Body::empty(),
    };
    let req = match builder.body(body) {
        Ok(r) => r,
        Err(e) => panic!("failed to build request: {e}"),
    };
    let resp = match app.clone().oneshot(req).await {
        Ok(r) => r,
        Err(e) => panic!("handler error: {e}"),
    };
    let status = resp.status();
    let header_str = |name: header::HeaderName| resp.headers().get(name).and_then(|v| v.to_str().ok()).map(str::to_string);
    let content_type = header_str(header::CONTENT_TYPE);
    let location = header_str(header::LOCATION);
    let bytes = match axum::body::to_bytes(resp.into_body(), 1 << 20).await {
        Ok(b) => b,
        Err(e) => panic!("failed to read body: {e}"),
    };
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    TestResponse {
        status,
        content_type,
        location,
        body,
    }
}

/// `{"template":{"data":[{"name":..,"value":..}, ...]}}` from name/value pairs.
pub fn template(pairs: &[(&str, Value)]) -> Value {
    let data: Vec<Value> = pairs
        .iter()
        .map(|(n, v)| serde_json::json!({"name": n, "value": v}))
        .collect();
    serde_json::json!({"template": {"data": data}})
}

/// Value of `name` in the item at `idx`.
pub fn item_value<'a>(body: &'a Value, idx: usize, name: &str) -> &'a Value {
    let data = body["collection"]["items"][idx]["data"].as_array();
    data.and_then(|d| d.iter().find(|e| e["name"] == name))
        .map(|e| &e["value"])
        .unwrap_or(&Value::Null)
}

pub fn item_count(body: &Value) -> usize {
    body["collection"]["items"].as_array().map(Vec::len).unwrap_or(0)
}
