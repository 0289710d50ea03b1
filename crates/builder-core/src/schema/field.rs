//! Schema field definitions

use crate::value::Value;

/// Declared type of a schema field
#[derive(Debug, Clone, PartialEq)]
pub enum FieldType {
    String,
    Number,
    Boolean,
    /// Homogeneous list; each element is validated against the inner type
    Array(Box<FieldType>),
    /// Nested record with its own fields
    Record(Schema),
}

impl FieldType {
    pub fn array_of(element: FieldType) -> Self {
        FieldType::Array(Box::new(element))
    }

    /// Human-readable name used in `TypeMismatch` errors
    pub fn describe(&self) -> String {
        match self {
            FieldType::String => "string".to_string(),
            FieldType::Number => "number".to_string(),
            FieldType::Boolean => "boolean".to_string(),
            FieldType::Array(inner) => format!("array<{}>", inner.describe()),
            FieldType::Record(_) => "object".to_string(),
        }
    }
}

/// One field of a schema
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub ty: FieldType,
    pub required: bool,
    /// Value substituted when the field is absent and optional
    pub default: Option<Value>,
    /// Closed set of accepted string values
    pub allowed: Option<&'static [&'static str]>,
}

impl FieldSpec {
    /// A required field
    pub fn required(name: &'static str, ty: FieldType) -> Self {
        Self {
            name,
            ty,
            required: true,
            default: None,
            allowed: None,
        }
    }

    /// An optional field with a default value
    pub fn optional(name: &'static str, ty: FieldType, default: impl Into<Value>) -> Self {
        Self {
            name,
            ty,
            required: false,
            default: Some(default.into()),
            allowed: None,
        }
    }

    /// An optional field whose default is derived from its type
    /// (empty array, or a record filled with its own defaults)
    pub fn optional_derived(name: &'static str, ty: FieldType) -> Self {
        Self {
            name,
            ty,
            required: false,
            default: None,
            allowed: None,
        }
    }

    pub fn one_of(mut self, allowed: &'static [&'static str]) -> Self {
        self.allowed = Some(allowed);
        self
    }
}

/// Ordered set of fields
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Schema {
    fields: Vec<FieldSpec>,
}

impl Schema {
    pub fn new(fields: Vec<FieldSpec>) -> Self {
        Self { fields }
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Names of the fields that must be supplied
    pub fn required_fields(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields.iter().filter(|f| f.required).map(|f| f.name)
    }
}
