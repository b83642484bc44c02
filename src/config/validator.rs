//! Model config validation: identifiers, uniqueness, and references.

use crate::case::to_snake_case;
use crate::config::{ModelConfig, ModelsConfig, Operation};
use crate::error::ConfigError;
use regex::Regex;
use std::collections::{HashMap, HashSet};

/// Path segment a model is served under.
pub fn path_segment_of(model: &ModelConfig) -> String {
    model
        .path_segment
        .clone()
        .unwrap_or_else(|| to_snake_case(&model.name))
}

/// Identifiers become SQL column/table names, so they stay within `[A-Za-z_][A-Za-z0-9_]*`.
fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn is_path_segment(s: &str) -> bool {
    !s.is_empty()
        && s
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
}

pub fn validate(config: &ModelsConfig) -> Result<(), ConfigError> {
    let mut names = HashSet::new();
    let mut paths = HashSet::new();
    let mut tables: HashMap<String, &str> = HashMap::new();

    for m in &config.models {
        if !is_identifier(&m.name) {
            return Err(ConfigError::Validation(format!("invalid model name '{}'", m.name)));
        }
        if !names.insert(m.name.as_str()) {
            return Err(ConfigError::DuplicateModel(m.name.clone()));
        }

        let path = path_segment_of(m);
        if !is_path_segment(&path) || path == "search" {
            return Err(ConfigError::Validation(format!(
                "invalid path segment '{}' for model {}",
                path, m.name
            )));
        }
        if !paths.insert(path.clone()) {
            return Err(ConfigError::DuplicatePathSegment(path));
        }

        let table = to_snake_case(&m.name);
        if let Some(first) = tables.insert(table.clone(), m.name.as_str()) {
            return Err(ConfigError::DuplicateTable {
                table,
                first: first.to_string(),
                second: m.name.clone(),
            });
        }

        let mut field_names = HashSet::new();
        for f in &m.fields {
            if !is_identifier(&f.name) {
                return Err(ConfigError::Validation(format!(
                    "invalid field name '{}' in model {}",
                    f.name, m.name
                )));
            }
            if f.name == "id" {
                return Err(ConfigError::Validation(format!("field name 'id' is reserved (model {})", m.name)));
            }
            if !field_names.insert(f.name.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "duplicate field '{}' in model {}",
                    f.name, m.name
                )));
            }
            if let Some(pattern) = &f.validation.pattern {
                Regex::new(pattern).map_err(|e| {
                    ConfigError::Validation(format!("invalid pattern for {}.{}: {}", m.name, f.name, e))
                })?;
            }
        }

        for op in m.operations.iter().flatten() {
            if Operation::parse(op).is_none() {
                return Err(ConfigError::UnknownReference {
                    model: m.name.clone(),
                    kind: "operation",
                    name: op.clone(),
                });
            }
        }

        if let Some(order_by) = &m.order_by {
            if order_by != "id" && !field_names.contains(order_by.as_str()) {
                return Err(ConfigError::UnknownReference {
                    model: m.name.clone(),
                    kind: "order_by field",
                    name: order_by.clone(),
                });
            }
        }
    }

    Ok(())
}
