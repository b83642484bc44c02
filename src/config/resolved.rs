//! Resolved model registry: config validated and flattened for runtime use.

use crate::config::{FieldType, ValidationRule};
use crate::error::ConfigError;
use std::collections::HashMap;
use std::fmt;

/// One of the CRUDS operations a model can expose.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    Create,
    Read,
    Update,
    Delete,
    Search,
}

impl Operation {
    pub const ALL: [Operation; 5] = [
        Operation::Create,
        Operation::Read,
        Operation::Update,
        Operation::Delete,
        Operation::Search,
    ];

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "create" => Some(Operation::Create),
            "read" => Some(Operation::Read),
            "update" => Some(Operation::Update),
            "delete" => Some(Operation::Delete),
            "search" => Some(Operation::Search),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Create => "create",
            Operation::Read => "read",
            Operation::Update => "update",
            Operation::Delete => "delete",
            Operation::Search => "search",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug)]
pub struct Field {
    pub name: String,
    pub field_type: FieldType,
    pub prompt: Option<String>,
    pub required: bool,
    pub validation: ValidationRule,
}

#[derive(Clone, Debug)]
pub struct Model {
    pub name: String,
    pub path_segment: String,
    /// SQL table name (snake_case of the model name).
    pub table_name: String,
    pub fields: Vec<Field>,
    pub operations: Vec<Operation>,
    /// Default list ordering: a field name or `id`.
    pub order_by: String,
}

impl Model {
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn allows(&self, op: Operation) -> bool {
        self.operations.contains(&op)
    }

    /// True for `id` or any declared field.
    pub fn is_sortable(&self, name: &str) -> bool {
        name == "id" || self.field(name).is_some()
    }
}

/// Registered models, addressable by name and by path segment. Iterates in registration order.
#[derive(Clone, Debug, Default)]
pub struct ModelRegistry {
    models: Vec<Model>,
    by_name: HashMap<String, usize>,
    by_path: HashMap<String, usize>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_model(&mut self, model: Model) -> Result<(), ConfigError> {
        if self.by_name.contains_key(&model.name) {
            return Err(ConfigError::DuplicateModel(model.name));
        }
        if self.by_path.contains_key(&model.path_segment) {
            return Err(ConfigError::DuplicatePathSegment(model.path_segment));
        }
        let idx = self.models.len();
        self.by_name.insert(model.name.clone(), idx);
        self.by_path.insert(model.path_segment.clone(), idx);
        self.models.push(model);
        Ok(())
    }

    pub fn by_name(&self, name: &str) -> Option<&Model> {
        self.by_name.get(name).map(|&i| &self.models[i])
    }

    pub fn by_path(&self, path: &str) -> Option<&Model> {
        self.by_path.get(path).map(|&i| &self.models[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Model> {
        self.models.iter()
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}
