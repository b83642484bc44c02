//! Load model definitions from JSON and resolve them into a registry.

use crate::case::to_snake_case;
use crate::config::resolved::{Field, Model, ModelRegistry, Operation};
use crate::config::{path_segment_of, validate, ModelsConfig};
use crate::error::ConfigError;
use std::path::Path;

pub fn load_models_from_str(json: &str) -> Result<ModelsConfig, ConfigError> {
    serde_json::from_str(json).map_err(|e| ConfigError::Load(e.to_string()))
}

pub async fn load_models_from_path(path: impl AsRef<Path>) -> Result<ModelsConfig, ConfigError> {
    let path = path.as_ref();
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))?;
    load_models_from_str(&raw)
}

/// Build the registry from config (validates first).
pub fn resolve(config: &ModelsConfig) -> Result<ModelRegistry, ConfigError> {
    validate(config)?;
    let mut registry = ModelRegistry::new();
    for m in &config.models {
        let operations = match &m.operations {
            Some(ops) => ops.iter().filter_map(|o| Operation::parse(o)).collect(),
            None => Operation::ALL.to_vec(),
        };
        let fields = m
            .fields
            .iter()
            .map(|f| Field {
                name: f.name.clone(),
                field_type: f.type_,
                prompt: f.prompt.clone(),
                required: f.required || f.validation.required == Some(true),
                validation: f.validation.clone(),
            })
            .collect();
        registry.add_model(Model {
            name: m.name.clone(),
            path_segment: path_segment_of(m),
            table_name: to_snake_case(&m.name),
            fields,
            operations,
            order_by: m.order_by.clone().unwrap_or_else(|| "id".to_string()),
        })?;
    }
    tracing::debug!(models = registry.len(), "resolved model registry");
    Ok(registry)
}
