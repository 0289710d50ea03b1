//! Builder Core - Template compilation engine and installation reconciler
//!
//! This library turns declarative artifact descriptions (components, pages,
//! API resources, themes, forms, tables) into source text for one of four
//! target dialects, and keeps an installed project's scaffolding in shape.
//!
//! # Architecture
//!
//! The library is organized into layers:
//!
//! - **Schema & Defaults Resolver** ([`schema`]) - validates raw properties
//!   and fills in defaults
//! - **Template Registry** ([`templates::registry`]) - immutable
//!   (kind, variant, dialect) -> template table loaded from YAML catalogs
//! - **Render/Compile Engine** ([`templates::engine`]) - one substitution
//!   algorithm shared by every dialect
//! - **Installation State Reconciler** ([`reconcile`]) - audits a project
//!   against an installation manifest and repairs drift
//! - **CLI/TUI Interface** - optional cliclack-based recheck flow
//!   (feature-gated)
//!
//! # Feature Flags
//!
//! - `tui` (default): Enables the cliclack-based recheck prompts
//!
//! # Example Usage (without TUI)
//!
//! ```ignore
//! use builder_core::{ArtifactKind, Compiler, Resolver, TargetDialect};
//! use builder_core::templates::{CatalogSource, TemplateFetcher};
//! use std::sync::Arc;
//!
//! let catalog = TemplateFetcher::new(CatalogSource::Builtin, "my-app").load().await?;
//! let compiler = Compiler::new(Arc::new(catalog.registry()?), Resolver::builtin());
//!
//! let descriptor = compiler.describe(ArtifactKind::Component, &properties, Some("faq"), None, None)?;
//! let output = compiler.compile(&descriptor, TargetDialect::ServerTemplate)?;
//! ```

pub mod artifact;
pub mod config;
pub mod error;
pub mod reconcile;
pub mod schema;
pub mod store;
pub mod templates;
pub mod value;

#[cfg(feature = "tui")]
pub mod tui;

// Re-export main types for convenience
pub use artifact::{ArtifactDescriptor, ArtifactKind, Styles, TargetDialect};
pub use config::BuilderConfig;
pub use error::{CatalogError, CompileError, ErrorBody, ReconcileError, StoreError, ValidationError};
pub use reconcile::{
    InstallationManifest, ManifestCatalog, ManifestEntry, ReconciliationReport, Reconciler,
    RepairOptions,
};
pub use schema::Resolver;
pub use store::{ArtifactStore, DirectoryStore, MemoryStore};
pub use templates::{CompileRequest, CompiledArtifact, Compiler, TemplateRegistry};
pub use value::Value;

#[cfg(feature = "tui")]
pub use tui::run_recheck;
