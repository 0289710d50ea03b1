//! Artifact descriptors and target dialects

use crate::templates::escape::EscapeMode;
use crate::value::{Map, Value};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

/// Kind of buildable artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Component,
    Page,
    Api,
    Theme,
    Form,
    Table,
}

impl ArtifactKind {
    pub const ALL: [ArtifactKind; 6] = [
        ArtifactKind::Component,
        ArtifactKind::Page,
        ArtifactKind::Api,
        ArtifactKind::Theme,
        ArtifactKind::Form,
        ArtifactKind::Table,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::Component => "component",
            ArtifactKind::Page => "page",
            ArtifactKind::Api => "api",
            ArtifactKind::Theme => "theme",
            ArtifactKind::Form => "form",
            ArtifactKind::Table => "table",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ArtifactKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ArtifactKind::ALL
            .into_iter()
            .find(|k| k.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown artifact kind: {}", s))
    }
}

/// Output flavor a descriptor is compiled into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TargetDialect {
    /// Server-rendered template (Blade)
    #[serde(alias = "blade")]
    ServerTemplate,
    /// Reactive single-file component (Livewire view + class)
    #[serde(alias = "livewire")]
    ReactiveComponent,
    /// Component-tree framework with JSX markup (React)
    #[serde(alias = "react")]
    ComponentFrameworkA,
    /// Component-tree framework with template markup (Vue)
    #[serde(alias = "vue")]
    ComponentFrameworkB,
}

impl TargetDialect {
    pub const ALL: [TargetDialect; 4] = [
        TargetDialect::ServerTemplate,
        TargetDialect::ReactiveComponent,
        TargetDialect::ComponentFrameworkA,
        TargetDialect::ComponentFrameworkB,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TargetDialect::ServerTemplate => "server-template",
            TargetDialect::ReactiveComponent => "reactive-component",
            TargetDialect::ComponentFrameworkA => "component-framework-a",
            TargetDialect::ComponentFrameworkB => "component-framework-b",
        }
    }

    fn alias(&self) -> &'static str {
        match self {
            TargetDialect::ServerTemplate => "blade",
            TargetDialect::ReactiveComponent => "livewire",
            TargetDialect::ComponentFrameworkA => "react",
            TargetDialect::ComponentFrameworkB => "vue",
        }
    }

    /// Default escaping for the markup section
    pub fn markup_escape(&self) -> EscapeMode {
        match self {
            TargetDialect::ServerTemplate | TargetDialect::ReactiveComponent => EscapeMode::Blade,
            TargetDialect::ComponentFrameworkA => EscapeMode::Jsx,
            TargetDialect::ComponentFrameworkB => EscapeMode::Vue,
        }
    }

    /// Default escaping for the script section
    ///
    /// The reactive-component script is the server-side component class.
    pub fn script_escape(&self) -> EscapeMode {
        match self {
            TargetDialect::ReactiveComponent => EscapeMode::PhpString,
            _ => EscapeMode::JsString,
        }
    }

    /// File extension for exported markup
    pub fn markup_extension(&self) -> &'static str {
        match self {
            TargetDialect::ServerTemplate | TargetDialect::ReactiveComponent => "blade.php",
            TargetDialect::ComponentFrameworkA => "jsx",
            TargetDialect::ComponentFrameworkB => "vue",
        }
    }

    /// File extension for exported scripts
    pub fn script_extension(&self) -> &'static str {
        match self {
            TargetDialect::ReactiveComponent => "php",
            _ => "js",
        }
    }
}

impl fmt::Display for TargetDialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TargetDialect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TargetDialect::ALL
            .into_iter()
            .find(|d| d.as_str().eq_ignore_ascii_case(s) || d.alias().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown dialect: {}", s))
    }
}

/// Author-supplied styles
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Styles {
    /// CSS property -> value, scoped to the artifact id
    Map(IndexMap<String, String>),
    /// Raw CSS appended verbatim
    Raw(String),
}

/// A validated, normalized artifact ready for compilation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArtifactDescriptor {
    pub kind: ArtifactKind,
    pub id: String,
    pub properties: Map,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub styles: Option<Styles>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scripts: Option<String>,
}

impl ArtifactDescriptor {
    /// Build a descriptor from normalized properties, deriving a stable id
    pub fn new(kind: ArtifactKind, properties: Map) -> Self {
        let id = derive_id(kind, &properties);
        Self {
            kind,
            id,
            properties,
            styles: None,
            scripts: None,
        }
    }

    /// Replace the derived id with an explicit one
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_styles(mut self, styles: Option<Styles>) -> Self {
        self.styles = styles;
        self
    }

    pub fn with_scripts(mut self, scripts: Option<String>) -> Self {
        self.scripts = scripts;
        self
    }

    /// Template variant, taken from the component `type` property
    pub fn variant(&self) -> Option<&str> {
        match self.kind {
            ArtifactKind::Component => self.properties.get("type").and_then(Value::as_str),
            _ => None,
        }
    }
}

/// Whether `id` can name an artifact on disk: ASCII alphanumerics, `-`, `_`
/// and `.`, not starting with a dot
pub fn is_valid_id(id: &str) -> bool {
    !id.is_empty()
        && !id.starts_with('.')
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

fn derive_id(kind: ArtifactKind, properties: &Map) -> String {
    let canonical = Value::Map(properties.clone()).to_json().to_string();
    let digest = Sha256::digest(canonical.as_bytes());
    let short: String = digest.iter().take(4).map(|b| format!("{:02x}", b)).collect();
    format!("{}-{}", kind, short)
}
