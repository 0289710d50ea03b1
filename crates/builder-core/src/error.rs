//! Error types for resolving, compiling and reconciling

use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while validating raw properties against a schema
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field was absent (or null)
    #[error("missing required field `{0}`")]
    MissingField(String),

    /// A field was present with the wrong type
    #[error("field `{field}` expected {expected}, got {actual}")]
    TypeMismatch {
        field: String,
        expected: String,
        actual: String,
    },

    /// A field was present with a value outside its allowed set
    #[error("field `{field}` has unsupported value `{value}` (allowed: {})", allowed.join(", "))]
    UnsupportedValue {
        field: String,
        value: String,
        allowed: Vec<String>,
    },

    /// No schema is registered under the given name
    #[error("unknown schema `{0}`")]
    UnknownSchema(String),
}

impl ValidationError {
    /// Field path the error refers to, if any
    pub fn field(&self) -> Option<&str> {
        match self {
            ValidationError::MissingField(field) => Some(field),
            ValidationError::TypeMismatch { field, .. } => Some(field),
            ValidationError::UnsupportedValue { field, .. } => Some(field),
            ValidationError::UnknownSchema(_) => None,
        }
    }
}

/// Errors raised by the compile engine
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("no template registered for {kind}{} in dialect {dialect}", variant.as_deref().map(|v| format!("/{}", v)).unwrap_or_default())]
    TemplateNotFound {
        kind: String,
        variant: Option<String>,
        dialect: String,
    },

    #[error("unresolved template slot `{0}`")]
    UnresolvedSlot(String),

    #[error("invalid compile request: {0}")]
    InvalidRequest(String),
}

/// Structured error body returned to compile callers
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub error_kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    pub message: String,
}

impl CompileError {
    /// Convert into the wire-level error body
    pub fn to_body(&self) -> ErrorBody {
        let (error_kind, field) = match self {
            CompileError::Validation(inner) => {
                let kind = match inner {
                    ValidationError::MissingField(_) => "MissingField",
                    ValidationError::TypeMismatch { .. } => "TypeMismatch",
                    ValidationError::UnsupportedValue { .. } => "UnsupportedValue",
                    ValidationError::UnknownSchema(_) => "UnknownSchema",
                };
                (kind, inner.field().map(str::to_string))
            }
            CompileError::TemplateNotFound { .. } => ("TemplateNotFound", None),
            CompileError::UnresolvedSlot(path) => ("UnresolvedSlot", Some(path.clone())),
            CompileError::InvalidRequest(_) => ("InvalidRequest", None),
        };
        ErrorBody {
            error_kind,
            field,
            message: self.to_string(),
        }
    }
}

/// Errors raised while loading template or installation catalogs
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse catalog file {file}: {source}")]
    Parse {
        file: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("duplicate template registered for {0}")]
    DuplicateTemplate(String),

    #[error("invalid template in {file} at line {line}: {message}")]
    InvalidTemplate {
        file: String,
        line: usize,
        message: String,
    },

    #[error("invalid manifest entry {path}: {message}")]
    InvalidManifest { path: String, message: String },

    #[error("unknown manifest feature `{0}`")]
    UnknownFeature(String),

    #[error("failed to fetch {url}: {message}")]
    Fetch { url: String, message: String },
}

/// Errors that abort a whole reconciliation pass
///
/// Per-entry failures never surface here; they are recorded in the report.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("reconciliation task failed: {0}")]
    Task(String),
}

/// Errors raised by artifact stores
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("artifact {kind}/{id} not found")]
    NotFound { kind: String, id: String },

    #[error("invalid artifact id `{0}`")]
    InvalidId(String),

    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
