//! Schema catalog and defaults resolution
//!
//! This module provides:
//! - Field and schema definitions (FieldSpec, FieldType, Schema)
//! - The built-in schema catalog for artifact kinds and config values
//! - The resolver that validates raw properties and fills defaults

pub mod catalog;
pub mod field;
pub mod resolver;

pub use catalog::{SchemaCatalog, COMPONENT_TYPES};
pub use field::{FieldSpec, FieldType, Schema};
pub use resolver::Resolver;
