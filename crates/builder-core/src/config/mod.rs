//! Project configuration (`builder.yaml`)

use crate::artifact::TargetDialect;
use crate::reconcile::DEFAULT_JOBS;
use crate::templates::fetcher::{CatalogSource, TEMPLATE_DIR_ENV, TEMPLATE_URL_ENV};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Config file name, looked up in the project root
pub const CONFIG_FILE: &str = "builder.yaml";

/// Environment variable overriding the configured dialect
pub const DIALECT_ENV: &str = "BUILDER_DIALECT";

/// Manifest feature every project checks
pub const CORE_FEATURE: &str = "core";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuilderConfig {
    /// Dialect the project compiles to; also selects its manifest feature
    pub dialect: TargetDialect,

    /// Extra manifest features to check, e.g. `themes`
    pub features: Vec<String>,

    /// Local template catalog directory
    pub template_dir: Option<PathBuf>,

    /// Remote template catalog URL
    pub template_url: Option<String>,

    /// Artifact store directory, relative to the project root
    pub store_dir: PathBuf,

    /// Concurrent reconciler jobs
    pub jobs: usize,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            dialect: TargetDialect::ServerTemplate,
            features: Vec::new(),
            template_dir: None,
            template_url: None,
            store_dir: PathBuf::from("storage/app/builder"),
            jobs: DEFAULT_JOBS,
        }
    }
}

impl BuilderConfig {
    /// Load `builder.yaml` from a project root (defaults when absent) and
    /// apply environment overrides
    pub fn load(project_root: &Path) -> Result<Self> {
        let path = project_root.join(CONFIG_FILE);
        let mut config = if path.is_file() {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            Self::parse(&content).with_context(|| format!("Failed to parse {}", path.display()))?
        } else {
            Self::default()
        };
        config.apply_overrides(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }

    /// Apply `BUILDER_*` overrides through a variable lookup
    pub fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(dialect) = var(DIALECT_ENV) {
            self.dialect = dialect
                .parse()
                .map_err(|e: String| anyhow::anyhow!("{} is invalid: {}", DIALECT_ENV, e))?;
        }
        if let Some(dir) = var(TEMPLATE_DIR_ENV) {
            self.template_dir = Some(PathBuf::from(dir));
        }
        if let Some(url) = var(TEMPLATE_URL_ENV) {
            self.template_url = Some(url);
        }
        Ok(())
    }

    /// Manifest features to check: core, the dialect's feature, then extras
    pub fn features(&self) -> Vec<String> {
        let mut features = vec![CORE_FEATURE.to_string(), self.dialect.as_str().to_string()];
        for feature in &self.features {
            if !features.contains(feature) {
                features.push(feature.clone());
            }
        }
        features
    }

    pub fn catalog_source(&self) -> Result<CatalogSource> {
        CatalogSource::select(self.template_dir.clone(), self.template_url.as_deref())
    }

    pub fn store_path(&self, project_root: &Path) -> PathBuf {
        project_root.join(&self.store_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_when_file_missing() {
        let dir = TempDir::new().unwrap();
        let config = BuilderConfig::parse("").unwrap();
        assert_eq!(config, BuilderConfig::default());
        assert_eq!(config.features(), vec!["core", "server-template"]);
        assert_eq!(
            config.store_path(dir.path()),
            dir.path().join("storage/app/builder")
        );
    }

    #[test]
    fn test_parse_with_alias_and_features() {
        let config = BuilderConfig::parse("dialect: vue\nfeatures: [themes, core]\njobs: 8\n").unwrap();
        assert_eq!(config.dialect, TargetDialect::ComponentFrameworkB);
        assert_eq!(config.jobs, 8);
        assert_eq!(config.features(), vec!["core", "component-framework-b", "themes"]);
    }

    #[test]
    fn test_env_overrides() {
        let mut config = BuilderConfig::default();
        config
            .apply_overrides(|name| match name {
                DIALECT_ENV => Some("livewire".to_string()),
                TEMPLATE_DIR_ENV => Some("/srv/catalog".to_string()),
                _ => None,
            })
            .unwrap();
        assert_eq!(config.dialect, TargetDialect::ReactiveComponent);
        assert_eq!(config.template_dir, Some(PathBuf::from("/srv/catalog")));
        assert_eq!(
            config.catalog_source().unwrap(),
            CatalogSource::Local(PathBuf::from("/srv/catalog"))
        );
    }

    #[test]
    fn test_invalid_dialect_override() {
        let mut config = BuilderConfig::default();
        let err = config
            .apply_overrides(|name| (name == DIALECT_ENV).then(|| "svelte".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains(DIALECT_ENV));
    }

    #[test]
    fn test_load_reads_file() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "dialect: react\nstore_dir: data\n").unwrap();
        let config = BuilderConfig::load(dir.path()).unwrap();
        assert_eq!(config.store_dir, PathBuf::from("data"));
    }
}
