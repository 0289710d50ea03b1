//! Engine/catalog version compatibility

use semver::Version;
use tracing::warn;

/// Version of this engine, compared against `template.yaml`'s `version`
pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Returns a warning when the engine is older than the catalog expects.
/// Unparseable versions are not compared.
pub fn check_compatibility(engine_version: &str, catalog_version: &str) -> Option<String> {
    let engine = parse_version(engine_version)?;
    let catalog = parse_version(catalog_version)?;

    if engine < catalog {
        Some(format!(
            "Template catalog targets engine {} or newer, running {}. \
             Some templates may use syntax this engine does not understand.",
            catalog, engine
        ))
    } else {
        None
    }
}

/// Log a compatibility warning for the running engine
pub fn warn_if_incompatible(catalog_version: &str) -> Option<String> {
    let message = check_compatibility(ENGINE_VERSION, catalog_version)?;
    warn!(engine = ENGINE_VERSION, catalog = catalog_version, "{}", message);
    Some(message)
}

fn parse_version(version: &str) -> Option<Version> {
    let cleaned = version.trim();
    let cleaned = cleaned.strip_prefix('v').unwrap_or(cleaned);
    Version::parse(cleaned).ok()
}
