//! Built-in schema catalog
//!
//! Schemas are addressed by name: artifact kinds use the kind name
//! (`page`, `form`, ...), component variants use `component.<type>` and
//! installation config values use `config.<name>`.

use super::field::{FieldSpec, FieldType, Schema};
use crate::value::Value;
use std::collections::BTreeMap;

/// Component variants with a registered schema
pub const COMPONENT_TYPES: &[&str] = &["accordion", "alert"];

const ALERT_LEVELS: &[&str] = &["info", "success", "warning", "danger"];
const HTTP_METHODS: &[&str] = &["GET", "POST", "PUT", "PATCH", "DELETE"];
const INPUT_TYPES: &[&str] = &["text", "email", "password", "number", "textarea", "checkbox"];
const COLUMN_TYPES: &[&str] = &["string", "text", "integer", "boolean", "date"];
const DIALECTS: &[&str] = &[
    "server-template",
    "reactive-component",
    "component-framework-a",
    "component-framework-b",
];

/// Immutable name -> schema mapping
#[derive(Debug, Clone, Default)]
pub struct SchemaCatalog {
    schemas: BTreeMap<String, Schema>,
}

impl SchemaCatalog {
    /// An empty catalog
    pub fn empty() -> Self {
        Self::default()
    }

    /// Catalog with every built-in artifact and config schema
    pub fn builtin() -> Self {
        let mut catalog = Self::empty();
        catalog.insert("component", component_schema());
        catalog.insert("component.accordion", accordion_schema());
        catalog.insert("component.alert", alert_schema());
        catalog.insert("page", page_schema());
        catalog.insert("api", api_schema());
        catalog.insert("theme", theme_schema());
        catalog.insert("form", form_schema());
        catalog.insert("table", table_schema());
        catalog.insert("config.builder", builder_config_schema());
        catalog.insert("config.theme", theme_config_schema());
        catalog
    }

    pub fn insert(&mut self, name: impl Into<String>, schema: Schema) {
        self.schemas.insert(name.into(), schema);
    }

    pub fn get(&self, name: &str) -> Option<&Schema> {
        self.schemas.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.schemas.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.schemas.keys().map(String::as_str)
    }
}

fn component_schema() -> Schema {
    Schema::new(vec![
        FieldSpec::required("type", FieldType::String).one_of(COMPONENT_TYPES),
    ])
}

fn accordion_schema() -> Schema {
    let item = Schema::new(vec![
        FieldSpec::required("id", FieldType::String),
        FieldSpec::required("title", FieldType::String),
        FieldSpec::optional("content", FieldType::String, ""),
    ]);
    Schema::new(vec![
        FieldSpec::required("type", FieldType::String).one_of(COMPONENT_TYPES),
        FieldSpec::required("items", FieldType::array_of(FieldType::Record(item))),
        FieldSpec::optional("multiple", FieldType::Boolean, false),
        FieldSpec::optional("open", FieldType::String, ""),
    ])
}

fn alert_schema() -> Schema {
    Schema::new(vec![
        FieldSpec::required("type", FieldType::String).one_of(COMPONENT_TYPES),
        FieldSpec::required("message", FieldType::String),
        FieldSpec::optional("title", FieldType::String, ""),
        FieldSpec::optional("level", FieldType::String, "info").one_of(ALERT_LEVELS),
        FieldSpec::optional("dismissible", FieldType::Boolean, true),
    ])
}

fn page_schema() -> Schema {
    let section = Schema::new(vec![
        FieldSpec::required("id", FieldType::String),
        FieldSpec::optional("html", FieldType::String, ""),
    ]);
    Schema::new(vec![
        FieldSpec::required("title", FieldType::String),
        FieldSpec::required("slug", FieldType::String),
        FieldSpec::optional("layout", FieldType::String, "app"),
        FieldSpec::optional("description", FieldType::String, ""),
        FieldSpec::optional_derived("sections", FieldType::array_of(FieldType::Record(section))),
    ])
}

fn api_schema() -> Schema {
    let field = Schema::new(vec![
        FieldSpec::required("name", FieldType::String),
        FieldSpec::optional("type", FieldType::String, "string").one_of(COLUMN_TYPES),
        FieldSpec::optional("nullable", FieldType::Boolean, false),
    ]);
    Schema::new(vec![
        FieldSpec::required("resource", FieldType::String),
        FieldSpec::required("model", FieldType::String),
        FieldSpec::optional("prefix", FieldType::String, "api"),
        FieldSpec::optional_derived("middleware", FieldType::array_of(FieldType::String)),
        FieldSpec::optional("soft_deletes", FieldType::Boolean, false),
        FieldSpec::required("fields", FieldType::array_of(FieldType::Record(field))),
    ])
}

fn theme_schema() -> Schema {
    let colors = Schema::new(vec![
        FieldSpec::optional("primary", FieldType::String, "#4f46e5"),
        FieldSpec::optional("secondary", FieldType::String, "#64748b"),
        FieldSpec::optional("background", FieldType::String, "#ffffff"),
        FieldSpec::optional("text", FieldType::String, "#111827"),
    ]);
    Schema::new(vec![
        FieldSpec::required("name", FieldType::String),
        FieldSpec::optional_derived("colors", FieldType::Record(colors)),
        FieldSpec::optional("font_family", FieldType::String, "system-ui, sans-serif"),
        FieldSpec::optional("radius", FieldType::Number, 6.0),
        FieldSpec::optional("dark_mode", FieldType::Boolean, false),
    ])
}

fn form_schema() -> Schema {
    let field = Schema::new(vec![
        FieldSpec::required("name", FieldType::String),
        FieldSpec::required("label", FieldType::String),
        FieldSpec::optional("type", FieldType::String, "text").one_of(INPUT_TYPES),
        FieldSpec::optional("required", FieldType::Boolean, false),
        FieldSpec::optional("placeholder", FieldType::String, ""),
    ]);
    Schema::new(vec![
        FieldSpec::required("action", FieldType::String),
        FieldSpec::optional("method", FieldType::String, "POST").one_of(HTTP_METHODS),
        FieldSpec::optional("submit_label", FieldType::String, "Submit"),
        FieldSpec::required("fields", FieldType::array_of(FieldType::Record(field))),
    ])
}

fn table_schema() -> Schema {
    let column = Schema::new(vec![
        FieldSpec::required("key", FieldType::String),
        FieldSpec::required("label", FieldType::String),
        FieldSpec::optional("sortable", FieldType::Boolean, false),
    ]);
    Schema::new(vec![
        FieldSpec::required("columns", FieldType::array_of(FieldType::Record(column))),
        FieldSpec::optional("endpoint", FieldType::String, ""),
        FieldSpec::optional("caption", FieldType::String, ""),
        FieldSpec::optional("per_page", FieldType::Number, 15.0),
        FieldSpec::optional("searchable", FieldType::Boolean, false),
    ])
}

fn builder_config_schema() -> Schema {
    Schema::new(vec![
        FieldSpec::required("dialect", FieldType::String).one_of(DIALECTS),
        FieldSpec::optional("route_prefix", FieldType::String, "builder"),
        FieldSpec::optional(
            "middleware",
            FieldType::array_of(FieldType::String),
            Value::Array(vec![Value::from("web")]),
        ),
        FieldSpec::optional("enabled", FieldType::Boolean, true),
    ])
}

fn theme_config_schema() -> Schema {
    Schema::new(vec![
        FieldSpec::optional("name", FieldType::String, "default"),
        FieldSpec::optional("dark_mode", FieldType::Boolean, false),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_has_every_kind() {
        let catalog = SchemaCatalog::builtin();
        for kind in crate::artifact::ArtifactKind::ALL {
            assert!(catalog.contains(kind.as_str()), "missing {}", kind);
        }
        for variant in COMPONENT_TYPES {
            assert!(catalog.contains(&format!("component.{}", variant)));
        }
    }

    #[test]
    fn test_accordion_requires_items() {
        let catalog = SchemaCatalog::builtin();
        let required: Vec<_> = catalog
            .get("component.accordion")
            .unwrap()
            .required_fields()
            .collect();
        assert_eq!(required, vec!["type", "items"]);
    }
}
