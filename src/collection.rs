//! Collection+JSON document types, request template parsing, and builders from models and records.

use crate::config::{Model, ModelRegistry, Operation};
use crate::db::{Record, RecordId};
use crate::error::AppError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Media type for every document this crate produces.
pub const MEDIA_TYPE: &str = "application/vnd.collection+json";
pub const VERSION: &str = "1.0";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CollectionDocument {
    pub collection: Collection,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Collection {
    pub version: String,
    /// Empty only for error documents, which are not tied to a resource.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub href: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<Link>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<Item>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub queries: Vec<Query>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<Template>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorObject>,
}

impl Collection {
    pub fn new(href: String) -> Self {
        Collection {
            version: VERSION.to_string(),
            href,
            links: Vec::new(),
            items: Vec::new(),
            queries: Vec::new(),
            template: None,
            error: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub href: String,
    #[serde(default)]
    pub data: Vec<Data>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<Link>,
}

impl Item {
    /// Value of the named data entry, if present.
    pub fn value(&self, name: &str) -> Option<&Value> {
        self.data.iter().find(|d| d.name == name).map(|d| &d.value)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Data {
    pub name: String,
    #[serde(default)]
    pub value: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub href: String,
    pub rel: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub render: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Query {
    pub href: String,
    pub rel: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(default)]
    pub data: Vec<Data>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Template {
    #[serde(default)]
    pub data: Vec<Data>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ErrorObject {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Template {
    /// Parse a write request body. Accepts `{"template":{"data":[...]}}` or a bare `{"data":[...]}`.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, AppError> {
        let body: Value = serde_json::from_slice(bytes)
            .map_err(|e| AppError::BadRequest(format!("body is not valid JSON: {}", e)))?;
        Self::from_body(body)
    }

    pub fn from_body(body: Value) -> Result<Self, AppError> {
        let inner = match body {
            Value::Object(mut obj) => obj.remove("template").unwrap_or(Value::Object(obj)),
            _ => return Err(AppError::BadRequest("body must be a Collection+JSON template object".into())),
        };
        let entries = match inner {
            Value::Object(mut t) => match t.remove("data") {
                Some(Value::Array(entries)) => entries,
                _ => return Err(AppError::BadRequest("template must contain a data array".into())),
            },
            _ => return Err(AppError::BadRequest("template must be an object".into())),
        };
        let mut data = Vec::with_capacity(entries.len());
        for entry in entries {
            let Value::Object(mut e) = entry else {
                return Err(AppError::BadRequest("template data entries must be objects".into()));
            };
            let name = match e.remove("name") {
                Some(Value::String(s)) if !s.is_empty() => s,
                _ => return Err(AppError::BadRequest("template data entry needs a string name".into())),
            };
            let prompt = match e.remove("prompt") {
                Some(Value::String(s)) => Some(s),
                _ => None,
            };
            data.push(Data {
                name,
                value: e.remove("value").unwrap_or(Value::Null),
                prompt,
            });
        }
        Ok(Template { data })
    }

    /// Name/value pairs as a JSON object. Later entries win on duplicate names.
    pub fn into_fields(self) -> Map<String, Value> {
        self.data.into_iter().map(|d| (d.name, d.value)).collect()
    }
}

pub fn resource_href(api_root: &str, model: &Model) -> String {
    format!("{}/{}", api_root, model.path_segment)
}

pub fn item_href(api_root: &str, model: &Model, id: RecordId) -> String {
    format!("{}/{}/{}", api_root, model.path_segment, id)
}

/// Empty write template: one entry per field with an empty value.
pub fn template_for(model: &Model) -> Template {
    Template {
        data: model
            .fields
            .iter()
            .map(|f| Data {
                name: f.name.clone(),
                value: Value::String(String::new()),
                prompt: f.prompt.clone(),
            })
            .collect(),
    }
}

pub fn search_query_for(api_root: &str, model: &Model) -> Query {
    Query {
        href: format!("{}/search", resource_href(api_root, model)),
        rel: "search".to_string(),
        prompt: Some(format!("Search {}", model.name)),
        data: model
            .fields
            .iter()
            .map(|f| Data {
                name: f.name.clone(),
                value: Value::String(String::new()),
                prompt: f.prompt.clone(),
            })
            .collect(),
    }
}

/// Item with `id` first, then every field in declaration order (missing fields render as null).
pub fn item_for(api_root: &str, model: &Model, record: &Record) -> Item {
    let mut data = Vec::with_capacity(model.fields.len() + 1);
    data.push(Data {
        name: "id".to_string(),
        value: Value::Number(record.id.0.into()),
        prompt: None,
    });
    for f in &model.fields {
        data.push(Data {
            name: f.name.clone(),
            value: record.fields.get(&f.name).cloned().unwrap_or(Value::Null),
            prompt: f.prompt.clone(),
        });
    }
    Item {
        href: item_href(api_root, model, record.id),
        data,
        links: Vec::new(),
    }
}

/// Collection for one model: its records as items plus the write template and search query it allows.
pub fn collection_for(api_root: &str, model: &Model, records: &[Record]) -> CollectionDocument {
    let mut collection = Collection::new(resource_href(api_root, model));
    collection.links.push(Link {
        href: root_href(api_root),
        rel: "up".to_string(),
        prompt: None,
        name: None,
        render: None,
    });
    collection.items = records.iter().map(|r| item_for(api_root, model, r)).collect();
    if model.allows(Operation::Search) {
        collection.queries.push(search_query_for(api_root, model));
    }
    if model.allows(Operation::Create) || model.allows(Operation::Update) {
        collection.template = Some(template_for(model));
    }
    CollectionDocument { collection }
}

/// Entry-point collection linking to every registered model.
pub fn root_collection(api_root: &str, registry: &ModelRegistry) -> CollectionDocument {
    let mut collection = Collection::new(root_href(api_root));
    collection.links = registry
        .iter()
        .map(|m| Link {
            href: resource_href(api_root, m),
            rel: "collection".to_string(),
            prompt: Some(m.name.clone()),
            name: Some(m.path_segment.clone()),
            render: None,
        })
        .collect();
    CollectionDocument { collection }
}

fn root_href(api_root: &str) -> String {
    if api_root.is_empty() {
        "/".to_string()
    } else {
        format!("{}/", api_root)
    }
}
