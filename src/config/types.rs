//! Raw model definition types matching the models JSON file.

use serde::{Deserialize, Serialize};

/// Storage type of a field. Drives request coercion and SQL column types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Text,
    Integer,
    Float,
    Boolean,
    /// `YYYY-MM-DD`
    Date,
    /// RFC 3339
    #[serde(alias = "timestamp")]
    Datetime,
    Uuid,
    Json,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Text => "text",
            FieldType::Integer => "integer",
            FieldType::Float => "float",
            FieldType::Boolean => "boolean",
            FieldType::Date => "date",
            FieldType::Datetime => "datetime",
            FieldType::Uuid => "uuid",
            FieldType::Json => "json",
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ValidationRule {
    #[serde(default)]
    pub required: Option<bool>,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub max_length: Option<u32>,
    #[serde(default)]
    pub min_length: Option<u32>,
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default)]
    pub allowed: Option<Vec<serde_json::Value>>,
    #[serde(default)]
    pub minimum: Option<f64>,
    #[serde(default)]
    pub maximum: Option<f64>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FieldConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub type_: FieldType,
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub validation: ValidationRule,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ModelConfig {
    pub name: String,
    /// URL segment under the API root; defaults to the snake_case model name.
    #[serde(default)]
    pub path_segment: Option<String>,
    /// Allowed operations; all five when omitted.
    #[serde(default)]
    pub operations: Option<Vec<String>>,
    #[serde(default)]
    pub order_by: Option<String>,
    pub fields: Vec<FieldConfig>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ModelsConfig {
    #[serde(default)]
    pub models: Vec<ModelConfig>,
}
