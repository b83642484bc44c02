//! Request coercion and validation from model field rules.

use crate::config::{Field, FieldType, Model, ValidationRule};
use crate::db::Fields;
use crate::error::AppError;
use regex::Regex;
use serde_json::{Number, Value};

pub struct RequestValidator;

impl RequestValidator {
    /// Map submitted values onto field types. Unknown names are rejected; `id` is ignored.
    pub fn coerce(model: &Model, fields: Fields) -> Result<Fields, AppError> {
        let mut out = Fields::new();
        for (name, value) in fields {
            if name == "id" {
                continue;
            }
            let field = model
                .field(&name)
                .ok_or_else(|| AppError::Validation(format!("unknown field '{}'", name)))?;
            let value = coerce_value(field, value)?;
            out.insert(name, value);
        }
        Ok(out)
    }

    /// Validate a full record (create). All required fields must be present and non-null.
    pub fn validate(model: &Model, fields: &Fields) -> Result<(), AppError> {
        for field in &model.fields {
            let val = fields.get(&field.name);
            if field.required && matches!(val, None | Some(Value::Null)) {
                return Err(AppError::Validation(format!("{} is required", field.name)));
            }
            if let Some(v) = val {
                validate_field(&field.name, v, &field.validation)?;
            }
        }
        Ok(())
    }

    /// Validate only the fields present (update). A required field may not be cleared.
    pub fn validate_partial(model: &Model, fields: &Fields) -> Result<(), AppError> {
        for (name, v) in fields {
            let Some(field) = model.field(name) else { continue };
            if field.required && v.is_null() {
                return Err(AppError::Validation(format!("{} is required", name)));
            }
            validate_field(name, v, &field.validation)?;
        }
        Ok(())
    }
}

fn type_error(field: &Field, value: &Value) -> AppError {
    AppError::Validation(format!(
        "{} must be {} (got {})",
        field.name,
        field.field_type.as_str(),
        value
    ))
}

/// Coerce one value to the field's type. Empty strings clear non-text fields.
pub fn coerce_value(field: &Field, value: Value) -> Result<Value, AppError> {
    if value.is_null() {
        return Ok(Value::Null);
    }
    if field.field_type != FieldType::Text && value.as_str().is_some_and(|s| s.trim().is_empty()) {
        return Ok(Value::Null);
    }
    let coerced = match (field.field_type, &value) {
        (FieldType::Json, _) => Some(value.clone()),
        (FieldType::Text, Value::String(_)) => Some(value.clone()),
        (FieldType::Text, Value::Number(n)) => Some(Value::String(n.to_string())),
        (FieldType::Text, Value::Bool(b)) => Some(Value::String(b.to_string())),
        (FieldType::Integer, Value::Number(n)) => n.as_i64().map(|i| Value::Number(i.into())),
        (FieldType::Integer, Value::String(s)) => s.trim().parse::<i64>().ok().map(|i| Value::Number(i.into())),
        (FieldType::Float, Value::Number(n)) => n.as_f64().and_then(Number::from_f64).map(Value::Number),
        (FieldType::Float, Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number),
        (FieldType::Boolean, Value::Bool(_)) => Some(value.clone()),
        (FieldType::Boolean, Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "true" => Some(Value::Bool(true)),
            "false" => Some(Value::Bool(false)),
            _ => None,
        },
        (FieldType::Date, Value::String(s)) => chrono::NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
            .ok()
            .map(|d| Value::String(d.format("%Y-%m-%d").to_string())),
        (FieldType::Datetime, Value::String(s)) => chrono::DateTime::parse_from_rfc3339(s.trim())
            .ok()
            .map(|d| Value::String(d.to_rfc3339())),
        (FieldType::Uuid, Value::String(s)) => uuid::Uuid::parse_str(s.trim())
            .ok()
            .map(|u| Value::String(u.to_string())),
        _ => None,
    };
    coerced.ok_or_else(|| type_error(field, &value))
}

fn validate_field(col: &str, v: &Value, rule: &ValidationRule) -> Result<(), AppError> {
    if v.is_null() {
        return Ok(());
    }
    if let Some(format) = &rule.format {
        validate_format(col, v, format)?;
    }
    if let Some(max) = rule.max_length {
        if let Some(s) = v.as_str() {
            if s.chars().count() > max as usize {
                return Err(AppError::Validation(format!(
                    "{} must be at most {} characters",
                    col, max
                )));
            }
        }
    }
    if let Some(min) = rule.min_length {
        if let Some(s) = v.as_str() {
            if s.chars().count() < min as usize {
                return Err(AppError::Validation(format!(
                    "{} must be at least {} characters",
                    col, min
                )));
            }
        }
    }
    if let Some(ref pattern) = rule.pattern {
        let re = Regex::new(pattern).map_err(|_| AppError::Validation(format!("invalid pattern for {}", col)))?;
        if let Some(s) = v.as_str() {
            if !re.is_match(s) {
                return Err(AppError::Validation(format!("{} does not match required pattern", col)));
            }
        }
    }
    if let Some(ref allowed) = rule.allowed {
        if !allowed.iter().any(|a| value_eq(v, a)) {
            return Err(AppError::Validation(format!(
                "{} must be one of: {:?}",
                col,
                allowed.iter().take(5).collect::<Vec<_>>()
            )));
        }
    }
    if let Some(min) = rule.minimum {
        if let Some(n) = v.as_f64() {
            if n < min {
                return Err(AppError::Validation(format!("{} must be at least {}", col, min)));
            }
        }
    }
    if let Some(max) = rule.maximum {
        if let Some(n) = v.as_f64() {
            if n > max {
                return Err(AppError::Validation(format!("{} must be at most {}", col, max)));
            }
        }
    }
    Ok(())
}

fn value_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::String(s), Value::String(t)) => s == t,
        (Value::Number(n), Value::Number(m)) => n.as_f64() == m.as_f64(),
        _ => a == b,
    }
}

fn validate_format(col: &str, v: &Value, format: &str) -> Result<(), AppError> {
    match format.to_lowercase().as_str() {
        "email" => {
            if let Some(s) = v.as_str() {
                if !s.contains('@') || s.len() < 3 {
                    return Err(AppError::Validation(format!("{} must be a valid email", col)));
                }
            }
        }
        "uuid" => {
            if let Some(s) = v.as_str() {
                if uuid::Uuid::parse_str(s).is_err() {
                    return Err(AppError::Validation(format!("{} must be a valid UUID", col)));
                }
            }
        }
        _ => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{load_models_from_str, resolve, ModelRegistry};
    use serde_json::json;

    fn registry() -> ModelRegistry {
        let cfg = load_models_from_str(
            r#"{"models":[{"name":"Member","fields":[
                {"name":"email","type":"text","required":true,"validation":{"format":"email","max_length":40}},
                {"name":"age","type":"integer","validation":{"minimum":0,"maximum":150}},
                {"name":"score","type":"float"},
                {"name":"active","type":"boolean"},
                {"name":"joined","type":"date"},
                {"name":"seen","type":"datetime"},
                {"name":"token","type":"uuid"},
                {"name":"tier","type":"text","validation":{"allowed":["gold","silver"]}},
                {"name":"code","type":"text","validation":{"pattern":"^[A-Z]{3}$"}}
            ]}]}"#,
        )
        .expect("parses");
        resolve(&cfg).expect("resolves")
    }

    fn fields(v: Value) -> Fields {
        match v {
            Value::Object(m) => m,
            _ => panic!("object expected"),
        }
    }

    #[test]
    fn coerce_parses_strings_into_field_types() {
        let registry = registry();
        let model = registry.by_name("Member").expect("model");
        let out = RequestValidator::coerce(
            model,
            fields(json!({
                "id": 99,
                "email": "a@b.c",
                "age": "42",
                "score": "1.5",
                "active": "TRUE",
                "joined": "2024-02-29",
                "seen": "2024-02-29T10:00:00Z",
                "token": "67E55044-10B1-426F-9247-BB680E5FE0C8",
                "tier": ""
            })),
        )
        .expect("coerces");
        assert!(!out.contains_key("id"));
        assert_eq!(out["age"], json!(42));
        assert_eq!(out["score"], json!(1.5));
        assert_eq!(out["active"], json!(true));
        assert_eq!(out["joined"], json!("2024-02-29"));
        assert_eq!(out["seen"], json!("2024-02-29T10:00:00+00:00"));
        assert_eq!(out["token"], json!("67e55044-10b1-426f-9247-bb680e5fe0c8"));
        assert_eq!(out["tier"], json!(""));
    }

    #[test]
    fn coerce_rejects_bad_values_and_unknown_fields() {
        let registry = registry();
        let model = registry.by_name("Member").expect("model");
        for bad in [
            json!({"age": "forty"}),
            json!({"age": 1.5}),
            json!({"active": "yes"}),
            json!({"joined": "2023-02-30"}),
            json!({"token": "nope"}),
            json!({"email": ["x"]}),
            json!({"nickname": "x"}),
        ] {
            let err = RequestValidator::coerce(model, fields(bad.clone())).expect_err("must reject");
            assert!(matches!(err, AppError::Validation(_)), "{bad}");
        }
    }

    #[test]
    fn empty_string_clears_non_text_fields() {
        let registry = registry();
        let model = registry.by_name("Member").expect("model");
        let out = RequestValidator::coerce(model, fields(json!({"age": " ", "active": ""}))).expect("coerces");
        assert_eq!(out["age"], Value::Null);
        assert_eq!(out["active"], Value::Null);
    }

    #[test]
    fn validate_requires_and_applies_rules() {
        let registry = registry();
        let model = registry.by_name("Member").expect("model");
        assert!(RequestValidator::validate(model, &fields(json!({"age": 3}))).is_err());
        assert!(RequestValidator::validate(model, &fields(json!({"email": null}))).is_err());
        assert!(RequestValidator::validate(model, &fields(json!({"email": "a@b.c"}))).is_ok());
        for bad in [
            json!({"email": "nope"}),
            json!({"email": "a@b.c", "age": 200}),
            json!({"email": "a@b.c", "tier": "bronze"}),
            json!({"email": "a@b.c", "code": "abc"}),
            json!({"email": format!("{}@b.c", "x".repeat(40))}),
        ] {
            assert!(RequestValidator::validate(model, &fields(bad.clone())).is_err(), "{bad}");
        }
    }

    #[test]
    fn validate_partial_checks_only_present_fields() {
        let registry = registry();
        let model = registry.by_name("Member").expect("model");
        assert!(RequestValidator::validate_partial(model, &fields(json!({"age": 30}))).is_ok());
        assert!(RequestValidator::validate_partial(model, &fields(json!({"email": null}))).is_err());
        assert!(RequestValidator::validate_partial(model, &fields(json!({"tier": "gold"}))).is_ok());
        assert!(RequestValidator::validate_partial(model, &fields(json!({"age": -1}))).is_err());
    }
}
