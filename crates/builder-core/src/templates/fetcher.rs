//! Template catalog loading from the built-in set, a local directory, or a
//! remote URL
//!
//! All three sources share one layout: a root `template.yaml` listing the
//! catalog files (plus an optional installation manifest catalog), with the
//! catalog files addressed relative to it.

use super::builtin;
use super::manifest::{CatalogFile, RootManifest};
use super::registry::TemplateRegistry;
use crate::error::CatalogError;
use anyhow::{Context, Result};
use std::path::PathBuf;
use tokio::fs;
use tracing::{debug, warn};
use url::Url;
use walkdir::WalkDir;

/// Environment variable overriding the catalog URL
pub const TEMPLATE_URL_ENV: &str = "BUILDER_TEMPLATE_URL";

/// Environment variable overriding the catalog directory
pub const TEMPLATE_DIR_ENV: &str = "BUILDER_TEMPLATE_DIR";

/// Where template catalogs come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogSource {
    Builtin,
    Local(PathBuf),
    Remote(Url),
}

impl CatalogSource {
    /// Pick a source from explicit settings, then the environment, then the
    /// built-in catalog
    pub fn select(dir: Option<PathBuf>, url: Option<&str>) -> Result<Self> {
        if let Some(dir) = dir.or_else(|| std::env::var_os(TEMPLATE_DIR_ENV).map(PathBuf::from)) {
            return Ok(Self::Local(dir));
        }
        let url = url
            .map(str::to_string)
            .or_else(|| std::env::var(TEMPLATE_URL_ENV).ok());
        match url {
            Some(url_str) => {
                let url = Url::parse(&url_str)
                    .with_context(|| format!("Invalid template URL: {}", url_str))?;
                Ok(Self::Remote(url))
            }
            None => Ok(Self::Builtin),
        }
    }

    /// Create a local template source from a path
    pub fn local(path: PathBuf) -> Self {
        Self::Local(path)
    }
}

/// Catalogs loaded from one source
#[derive(Debug, Clone)]
pub struct LoadedCatalog {
    pub root: RootManifest,
    pub files: Vec<(String, CatalogFile)>,
    /// Raw installation manifest catalog, when the source ships one
    pub install: Option<String>,
}

impl LoadedCatalog {
    /// Build the template registry from every loaded catalog file
    pub fn registry(&self) -> Result<TemplateRegistry> {
        TemplateRegistry::from_catalogs(self.files.iter().map(|(name, file)| (name.as_str(), file)))
            .context("Failed to build template registry")
    }
}

/// Template fetcher - handles retrieving catalogs from any source
pub struct TemplateFetcher {
    source: CatalogSource,
    client: reqwest::Client,
}

impl TemplateFetcher {
    /// Create a new fetcher with a custom user agent
    pub fn new(source: CatalogSource, user_agent: &str) -> Self {
        Self {
            source,
            client: reqwest::Client::builder()
                .user_agent(user_agent)
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
        }
    }

    /// Build a URL by appending a relative path, preserving query parameters
    fn build_url(base: &Url, relative: &str) -> Result<Url> {
        let mut url = base.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| anyhow::anyhow!("URL cannot have path segments: {}", base))?;
            segments.pop_if_empty();
            for part in relative.split('/').filter(|p| !p.is_empty()) {
                segments.push(part);
            }
        }
        Ok(url)
    }

    /// Load the root manifest and every catalog file it lists
    pub async fn load(&self) -> Result<LoadedCatalog> {
        let root_text = self.read("template.yaml").await?;
        let root = RootManifest::parse("template.yaml", &root_text)?;

        let names = if root.catalogs.is_empty() {
            self.discover()?
        } else {
            root.catalogs.clone()
        };

        let mut files = Vec::with_capacity(names.len());
        for name in names {
            let text = self.read(&name).await?;
            debug!(catalog = %name, "loaded template catalog");
            files.push((name.clone(), CatalogFile::parse(&name, &text)?));
        }

        let install = match &root.install {
            Some(name) => Some(self.read(name).await?),
            None => None,
        };

        Ok(LoadedCatalog {
            root,
            files,
            install,
        })
    }

    async fn read(&self, name: &str) -> Result<String> {
        match &self.source {
            CatalogSource::Builtin => builtin::file(name)
                .map(str::to_string)
                .ok_or_else(|| anyhow::anyhow!("Built-in catalog has no file '{}'", name)),
            CatalogSource::Local(dir) => {
                let path = dir.join(name);
                let text = fs::read_to_string(&path)
                    .await
                    .map_err(|source| CatalogError::Io {
                        path: path.clone(),
                        source,
                    })?;
                Ok(text)
            }
            CatalogSource::Remote(base_url) => {
                let url = Self::build_url(base_url, name)?;
                let fetch_error = |message: String| CatalogError::Fetch {
                    url: url.to_string(),
                    message,
                };
                let response = self
                    .client
                    .get(url.clone())
                    .send()
                    .await
                    .map_err(|e| fetch_error(e.to_string()))?;

                if !response.status().is_success() {
                    return Err(fetch_error(format!("HTTP {}", response.status())).into());
                }

                let text = response
                    .text()
                    .await
                    .map_err(|e| fetch_error(format!("unreadable body: {}", e)))?;
                Ok(text)
            }
        }
    }

    /// Find catalog files when the root manifest does not list them
    fn discover(&self) -> Result<Vec<String>> {
        let dir = match &self.source {
            CatalogSource::Local(dir) => dir,
            CatalogSource::Builtin => return Ok(builtin::catalog_names()),
            CatalogSource::Remote(url) => {
                anyhow::bail!("Remote catalog {} must list its catalog files", url)
            }
        };

        let mut names = Vec::new();
        for entry in WalkDir::new(dir).sort_by_file_name() {
            let entry = entry.with_context(|| format!("Failed to walk {}", dir.display()))?;
            let path = entry.path();
            if !entry.file_type().is_file()
                || path.extension().and_then(|e| e.to_str()) != Some("yaml")
            {
                continue;
            }
            let relative = path
                .strip_prefix(dir)
                .with_context(|| format!("{} escaped {}", path.display(), dir.display()))?;
            let name = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            if name == "template.yaml" || name == "install.yaml" {
                continue;
            }
            names.push(name);
        }

        if names.is_empty() {
            warn!(dir = %dir.display(), "no catalog files found");
        }
        Ok(names)
    }

    /// Get the template source
    pub fn source(&self) -> &CatalogSource {
        &self.source
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_build_url_appends_nested_path() {
        let base = Url::parse("https://example.com/catalog/?token=abc").unwrap();
        let url = TemplateFetcher::build_url(&base, "component/alert.yaml").unwrap();
        assert_eq!(
            url.as_str(),
            "https://example.com/catalog/component/alert.yaml?token=abc"
        );
    }

    #[test]
    fn test_select_prefers_explicit_dir() {
        let source = CatalogSource::select(Some(PathBuf::from("/tmp/t")), Some("https://x.dev")).unwrap();
        assert_eq!(source, CatalogSource::Local(PathBuf::from("/tmp/t")));
    }

    #[test]
    fn test_select_rejects_bad_url() {
        assert!(CatalogSource::select(None, Some("not a url")).is_err());
    }

    #[tokio::test]
    async fn test_builtin_catalog_loads() {
        let fetcher = TemplateFetcher::new(CatalogSource::Builtin, "builder-test");
        let catalog = fetcher.load().await.unwrap();
        assert!(!catalog.files.is_empty());
        assert!(catalog.install.is_some());
        let registry = catalog.registry().unwrap();
        assert!(!registry.is_empty());
    }

    #[tokio::test]
    async fn test_missing_local_file_is_io_error() {
        let dir = TempDir::new().unwrap();
        let err = TemplateFetcher::new(CatalogSource::local(dir.path().to_path_buf()), "builder-test")
            .load()
            .await
            .unwrap_err();
        match err.downcast_ref::<CatalogError>() {
            Some(CatalogError::Io { path, source }) => {
                assert_eq!(path, &dir.path().join("template.yaml"));
                assert_eq!(source.kind(), std::io::ErrorKind::NotFound);
            }
            other => panic!("expected an io error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unreachable_remote_is_fetch_error() {
        let base = Url::parse("http://127.0.0.1:9/catalog/").unwrap();
        let err = TemplateFetcher::new(CatalogSource::Remote(base), "builder-test")
            .load()
            .await
            .unwrap_err();
        match err.downcast_ref::<CatalogError>() {
            Some(CatalogError::Fetch { url, .. }) => {
                assert_eq!(url, "http://127.0.0.1:9/catalog/template.yaml");
            }
            other => panic!("expected a fetch error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_local_catalog_discovers_files() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("template.yaml"), "version: 0.1.0\n").unwrap();
        std::fs::create_dir_all(dir.path().join("component")).unwrap();
        std::fs::write(
            dir.path().join("component/alert.yaml"),
            "kind: component\nvariant: alert\ntemplates:\n  - dialect: blade\n    markup: \"[[ message ]]\"\n",
        )
        .unwrap();

        let fetcher = TemplateFetcher::new(CatalogSource::local(dir.path().to_path_buf()), "builder-test");
        let catalog = fetcher.load().await.unwrap();
        assert_eq!(catalog.files.len(), 1);
        assert_eq!(catalog.files[0].0, "component/alert.yaml");
        assert!(catalog.install.is_none());
        assert_eq!(catalog.registry().unwrap().len(), 1);
    }
}
