//! Filesystem access for the reconciler

use std::collections::BTreeSet;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Dependency manifests read by [`ProjectFs::list_dependencies`], with the
/// sections that declare packages
pub const DEPENDENCY_MANIFESTS: &[(&str, &[&str])] = &[
    ("composer.json", &["require", "require-dev"]),
    ("package.json", &["dependencies", "devDependencies"]),
];

/// Section new packages are added to when repairing a dependency manifest
pub fn install_section(manifest: &str) -> &'static str {
    if manifest == "composer.json" {
        "require"
    } else {
        "dependencies"
    }
}

/// The filesystem and package state of one project
///
/// Paths are project-relative and `/` separated.
pub trait ProjectFs: Send + Sync {
    fn exists(&self, path: &str) -> bool;

    fn is_dir(&self, path: &str) -> bool;

    fn read_file(&self, path: &str) -> io::Result<Vec<u8>>;

    /// Replace a file's contents; parent directories are created as needed
    fn write_file(&self, path: &str, contents: &[u8]) -> io::Result<()>;

    fn create_dir_all(&self, path: &str) -> io::Result<()>;

    /// Packages declared by one dependency manifest; empty when the manifest
    /// does not exist
    fn list_dependencies(&self, manifest: &str) -> io::Result<BTreeSet<String>>;
}

/// [`ProjectFs`] over a directory on disk
#[derive(Debug, Clone)]
pub struct LocalFs {
    root: PathBuf,
}

impl LocalFs {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> PathBuf {
        self.root
            .join(path.split('/').filter(|p| !p.is_empty() && *p != ".").collect::<PathBuf>())
    }
}

impl ProjectFs for LocalFs {
    fn exists(&self, path: &str) -> bool {
        self.resolve(path).exists()
    }

    fn is_dir(&self, path: &str) -> bool {
        self.resolve(path).is_dir()
    }

    fn read_file(&self, path: &str) -> io::Result<Vec<u8>> {
        std::fs::read(self.resolve(path))
    }

    fn write_file(&self, path: &str, contents: &[u8]) -> io::Result<()> {
        let target = self.resolve(path);
        let parent = target.parent().unwrap_or(&self.root);
        std::fs::create_dir_all(parent)?;

        // Write next to the target and rename so readers never see a partial file
        let mut tmp = NamedTempFile::new_in(parent)?;
        tmp.write_all(contents)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&target).map_err(|e| e.error)?;
        Ok(())
    }

    fn create_dir_all(&self, path: &str) -> io::Result<()> {
        std::fs::create_dir_all(self.resolve(path))
    }

    fn list_dependencies(&self, manifest: &str) -> io::Result<BTreeSet<String>> {
        let sections = DEPENDENCY_MANIFESTS
            .iter()
            .find(|(name, _)| *name == manifest)
            .map(|(_, sections)| *sections)
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("{} is not a dependency manifest", manifest),
                )
            })?;

        let mut packages = BTreeSet::new();
        let path = self.resolve(manifest);
        if !path.is_file() {
            return Ok(packages);
        }
        let bytes = std::fs::read(&path)?;
        let json: serde_json::Value = serde_json::from_slice(&bytes).map_err(|e| {
            io::Error::new(io::ErrorKind::InvalidData, format!("{}: {}", manifest, e))
        })?;
        for section in sections {
            if let Some(deps) = json.get(*section).and_then(|v| v.as_object()) {
                packages.extend(deps.keys().cloned());
            }
        }
        Ok(packages)
    }
}
