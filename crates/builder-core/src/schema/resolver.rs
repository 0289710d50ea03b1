//! Schema & defaults resolution
//!
//! Turns raw, loosely-typed properties into a normalized map that matches a
//! schema: known fields are type-checked and copied, absent optional fields
//! receive their defaults, and unknown fields are dropped so older or newer
//! editor clients keep working.

use super::catalog::SchemaCatalog;
use super::field::{FieldSpec, FieldType, Schema};
use crate::artifact::{ArtifactDescriptor, ArtifactKind};
use crate::error::ValidationError;
use crate::value::{Map, Value};
use std::sync::Arc;

/// Validates raw properties against the schema catalog
#[derive(Debug, Clone)]
pub struct Resolver {
    catalog: Arc<SchemaCatalog>,
}

impl Resolver {
    pub fn new(catalog: Arc<SchemaCatalog>) -> Self {
        Self { catalog }
    }

    /// Resolver over the built-in catalog
    pub fn builtin() -> Self {
        Self::new(Arc::new(SchemaCatalog::builtin()))
    }

    pub fn catalog(&self) -> &SchemaCatalog {
        &self.catalog
    }

    /// Resolve raw artifact properties into a normalized descriptor
    ///
    /// The returned descriptor carries an id derived from the normalized
    /// properties; callers with an explicit id override it with
    /// [`ArtifactDescriptor::with_id`].
    pub fn resolve(&self, kind: ArtifactKind, raw: &Value) -> Result<ArtifactDescriptor, ValidationError> {
        let map = raw.as_map().ok_or_else(|| ValidationError::TypeMismatch {
            field: "properties".to_string(),
            expected: "object".to_string(),
            actual: raw.type_name().to_string(),
        })?;

        let schema_name = match kind {
            ArtifactKind::Component => {
                let base = self.schema(kind.as_str())?;
                let head = resolve_record(base, map, "")?;
                let variant = head.get("type").and_then(Value::as_str).unwrap_or_default();
                format!("component.{}", variant)
            }
            _ => kind.as_str().to_string(),
        };

        let schema = self.schema(&schema_name)?;
        let properties = resolve_record(schema, map, "")?;
        Ok(ArtifactDescriptor::new(kind, properties))
    }

    /// Validate a value against a named schema, returning it normalized
    pub fn validate_named(&self, name: &str, raw: &Value) -> Result<Value, ValidationError> {
        let schema = self.schema(name)?;
        let map = raw.as_map().ok_or_else(|| ValidationError::TypeMismatch {
            field: name.to_string(),
            expected: "object".to_string(),
            actual: raw.type_name().to_string(),
        })?;
        resolve_record(schema, map, "").map(Value::Map)
    }

    fn schema(&self, name: &str) -> Result<&Schema, ValidationError> {
        self.catalog
            .get(name)
            .ok_or_else(|| ValidationError::UnknownSchema(name.to_string()))
    }
}

fn join(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", prefix, name)
    }
}

fn resolve_record(schema: &Schema, raw: &Map, prefix: &str) -> Result<Map, ValidationError> {
    let mut resolved = Map::with_capacity(schema.fields().len());

    for spec in schema.fields() {
        let path = join(prefix, spec.name);
        match raw.get(spec.name).filter(|v| !v.is_null()) {
            Some(value) => {
                let value = resolve_field(spec, value, &path)?;
                resolved.insert(spec.name.to_string(), value);
            }
            None if spec.required => return Err(ValidationError::MissingField(path)),
            None => {
                if let Some(default) = default_for(spec, &path)? {
                    resolved.insert(spec.name.to_string(), default);
                }
            }
        }
    }

    Ok(resolved)
}

fn default_for(spec: &FieldSpec, path: &str) -> Result<Option<Value>, ValidationError> {
    if let Some(default) = &spec.default {
        return Ok(Some(default.clone()));
    }
    match &spec.ty {
        FieldType::Array(_) => Ok(Some(Value::Array(Vec::new()))),
        FieldType::Record(schema) => resolve_record(schema, &Map::new(), path).map(|m| Some(Value::Map(m))),
        _ => Ok(None),
    }
}

fn resolve_field(spec: &FieldSpec, value: &Value, path: &str) -> Result<Value, ValidationError> {
    let value = resolve_typed(&spec.ty, value, path)?;
    if let (Some(allowed), Value::String(s)) = (spec.allowed, &value) {
        if !allowed.contains(&s.as_str()) {
            return Err(ValidationError::UnsupportedValue {
                field: path.to_string(),
                value: s.clone(),
                allowed: allowed.iter().map(|a| a.to_string()).collect(),
            });
        }
    }
    Ok(value)
}

fn resolve_typed(ty: &FieldType, value: &Value, path: &str) -> Result<Value, ValidationError> {
    let mismatch = || ValidationError::TypeMismatch {
        field: path.to_string(),
        expected: ty.describe(),
        actual: value.type_name().to_string(),
    };

    match (ty, value) {
        (FieldType::String, Value::String(_)) => Ok(value.clone()),
        (FieldType::Number, Value::Number(_)) => Ok(value.clone()),
        (FieldType::Boolean, Value::Bool(_)) => Ok(value.clone()),
        (FieldType::Boolean, Value::String(s)) => match s.as_str() {
            "true" => Ok(Value::Bool(true)),
            "false" => Ok(Value::Bool(false)),
            _ => Err(mismatch()),
        },
        (FieldType::Array(inner), Value::Array(items)) => items
            .iter()
            .enumerate()
            .map(|(i, item)| resolve_typed(inner, item, &format!("{}[{}]", path, i)))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        (FieldType::Record(schema), Value::Map(map)) => resolve_record(schema, map, path).map(Value::Map),
        _ => Err(mismatch()),
    }
}
