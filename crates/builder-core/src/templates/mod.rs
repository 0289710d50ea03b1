//! Template catalogs, registry and the compile engine
//!
//! This module provides:
//! - Catalog manifest types and loading (built-in, local directory, remote URL)
//! - The `[[ ]]` template parser and the immutable template registry
//! - The compiler that turns resolved descriptors into dialect source text
//! - Zip export and version compatibility checking

pub mod builtin;
pub mod engine;
pub mod escape;
pub mod export;
pub mod fetcher;
pub mod manifest;
pub mod parser;
pub mod registry;
pub mod version;

pub use engine::{CompileRequest, CompiledArtifact, Compiler};
pub use escape::EscapeMode;
pub use fetcher::{CatalogSource, LoadedCatalog, TemplateFetcher};
pub use manifest::{CatalogFile, RootManifest, TemplateSpec};
pub use registry::{TemplateEntry, TemplateKey, TemplateRegistry};
pub use version::check_compatibility;
