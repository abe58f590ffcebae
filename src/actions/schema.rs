//! Parameter validation against the JSON schema generated for each action

use crate::error::{AgentError, FieldViolation, Result};
use jsonschema::error::ValidationErrorKind;
use jsonschema::{Draft, JSONSchema};
use schemars::JsonSchema;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

/// Field name used when the parameter object itself is wrong
const ROOT_FIELD: &str = "<params>";

/// JSON schema for a parameter type
pub fn schema_of<T: JsonSchema>() -> Value {
    serde_json::to_value(schemars::schema_for!(T)).unwrap_or_else(|_| empty_object_schema())
}

/// Schema accepting only an empty object
pub fn empty_object_schema() -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {},
        "additionalProperties": false
    })
}

/// Missing or `null` parameters mean "no parameters"
pub fn normalize_params(params: Value) -> Value {
    match params {
        Value::Null => Value::Object(Map::new()),
        other => other,
    }
}

/// Checks a parameter object against an action's schema
pub trait SchemaValidator: Send + Sync {
    /// Check that `schema` is usable, called once when the action is registered
    fn prepare(&self, _action: &str, _schema: &Value) -> Result<()> {
        Ok(())
    }

    /// Validate `params` for `action`, reporting every offending field
    fn validate(&self, action: &str, schema: &Value, params: &Value) -> Result<()>;
}

/// Validator backed by `jsonschema`. Schemas are compiled when the action is
/// registered and cached by action name alongside the source schema.
#[derive(Default)]
pub struct JsonSchemaValidator {
    compiled: RwLock<HashMap<String, (Value, Arc<JSONSchema>)>>,
}

impl std::fmt::Debug for JsonSchemaValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let compiled = self.compiled.read().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("JsonSchemaValidator")
            .field("compiled", &compiled.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl JsonSchemaValidator {
    pub fn new() -> Self {
        Self::default()
    }

    fn compile(action: &str, schema: &Value) -> Result<JSONSchema> {
        JSONSchema::options()
            .with_draft(Draft::Draft7)
            .compile(schema)
            .map_err(|e| AgentError::Validation {
                action: action.to_string(),
                fields: vec![FieldViolation::new(ROOT_FIELD, format!("invalid parameter schema: {}", e))],
            })
    }

    fn compiled_for(&self, action: &str, schema: &Value) -> Result<Arc<JSONSchema>> {
        if let Some((source, found)) = self
            .compiled
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(action)
        {
            if source == schema {
                return Ok(found.clone());
            }
        }

        let compiled = Arc::new(Self::compile(action, schema)?);
        self.compiled
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(action.to_string(), (schema.clone(), compiled.clone()));
        Ok(compiled)
    }
}

impl SchemaValidator for JsonSchemaValidator {
    fn prepare(&self, action: &str, schema: &Value) -> Result<()> {
        self.compiled_for(action, schema).map(drop)
    }

    fn validate(&self, action: &str, schema: &Value, params: &Value) -> Result<()> {
        let compiled = self.compiled_for(action, schema)?;
        let errors = match compiled.validate(params) {
            Ok(()) => return Ok(()),
            Err(errors) => errors,
        };

        let mut violations = Vec::new();
        for error in errors {
            let path = field_path(&error.instance_path.to_string());
            match &error.kind {
                ValidationErrorKind::Required { property } => {
                    let name = property.as_str().map(str::to_string).unwrap_or_else(|| property.to_string());
                    violations.push(FieldViolation::new(join_path(&path, &name), "missing required field"));
                }
                ValidationErrorKind::AdditionalProperties { unexpected } => {
                    for name in unexpected {
                        violations.push(FieldViolation::new(join_path(&path, name), "unknown field"));
                    }
                }
                _ => violations.push(FieldViolation::new(field_name(&path), error.to_string())),
            }
        }

        Err(AgentError::Validation {
            action: action.to_string(),
            fields: violations,
        })
    }
}

/// Render a JSON pointer such as `/tags/1` as `tags[1]`
fn field_path(pointer: &str) -> String {
    let mut path = String::new();
    for segment in pointer.split('/').skip(1) {
        let segment = segment.replace("~1", "/").replace("~0", "~");
        if !path.is_empty() && segment.parse::<usize>().is_ok() {
            path.push_str(&format!("[{}]", segment));
        } else {
            path = join_path(&path, &segment);
        }
    }
    path
}

fn field_name(path: &str) -> String {
    if path.is_empty() {
        ROOT_FIELD.to_string()
    } else {
        path.to_string()
    }
}

fn join_path(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", path, key)
    }
}
