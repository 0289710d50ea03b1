//! Template catalog manifest types and parsing

use super::escape::EscapeMode;
use crate::artifact::{ArtifactKind, TargetDialect};
use serde::{Deserialize, Serialize};

/// Root catalog manifest (templates/template.yaml)
/// Lists the catalog files to load and the engine version they target
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RootManifest {
    /// Minimum engine version the catalog was written for
    pub version: String,

    /// Catalog files relative to the root manifest; when empty, local
    /// sources discover every `*.yaml` file under the directory
    #[serde(default)]
    pub catalogs: Vec<String>,

    /// Installation manifest catalog file, if the source provides one
    #[serde(default)]
    pub install: Option<String>,
}

/// One catalog file: every dialect rendition of a single artifact shape
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogFile {
    pub kind: ArtifactKind,

    /// Component variant (`accordion`, `alert`, ...); absent for other kinds
    #[serde(default)]
    pub variant: Option<String>,

    pub templates: Vec<TemplateSpec>,
}

/// Source text of one (kind, variant, dialect) template
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateSpec {
    pub dialect: TargetDialect,

    /// Markup template body
    pub markup: String,

    /// Behavior sub-template (client initializer or component class)
    #[serde(default)]
    pub script: Option<String>,

    /// Style sub-template
    #[serde(default)]
    pub style: Option<String>,

    /// Slot paths emitted without escaping, e.g. `items.content`
    ///
    /// Raw output is opt-in per field and must be listed here explicitly.
    #[serde(default)]
    pub raw: Vec<String>,

    /// Overrides the dialect's markup escaping (e.g. generated PHP source)
    #[serde(default)]
    pub markup_escape: Option<EscapeMode>,
}

impl CatalogFile {
    pub fn parse(file: &str, content: &str) -> Result<Self, crate::error::CatalogError> {
        serde_yaml::from_str(content).map_err(|source| crate::error::CatalogError::Parse {
            file: file.to_string(),
            source,
        })
    }
}

impl RootManifest {
    pub fn parse(file: &str, content: &str) -> Result<Self, crate::error::CatalogError> {
        serde_yaml::from_str(content).map_err(|source| crate::error::CatalogError::Parse {
            file: file.to_string(),
            source,
        })
    }
}
