//! Zip bundles of compiled artifacts

use super::engine::CompiledArtifact;
use crate::artifact::{is_valid_id, TargetDialect};
use anyhow::{bail, Context, Result};
use std::io::{Cursor, Write};
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

/// Paths inside a bundle for one compiled artifact
pub fn entry_names<'a>(
    id: &str,
    dialect: TargetDialect,
    artifact: &'a CompiledArtifact,
) -> Vec<(String, &'a str)> {
    let base = format!("{}/{}", dialect.as_str(), id);
    let mut names = vec![(
        format!("{}.{}", base, dialect.markup_extension()),
        artifact.markup.as_str(),
    )];
    if let Some(script) = &artifact.script {
        names.push((
            format!("{}.{}", base, dialect.script_extension()),
            script.as_str(),
        ));
    }
    if let Some(style) = &artifact.style {
        names.push((format!("{}.css", base), style.as_str()));
    }
    names
}

/// Build an in-memory zip of `<dialect>/<id>.<ext>` files
pub fn bundle(id: &str, outputs: &[(TargetDialect, CompiledArtifact)]) -> Result<Vec<u8>> {
    if !is_valid_id(id) {
        bail!("Cannot bundle artifact with id `{}`", id);
    }
    let mut zip_buffer = Vec::new();
    {
        let mut zip = ZipWriter::new(Cursor::new(&mut zip_buffer));
        let options =
            SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

        for (dialect, artifact) in outputs {
            for (name, contents) in entry_names(id, *dialect, artifact) {
                zip.start_file(&name, options)
                    .with_context(|| format!("Failed to start {} in bundle", name))?;
                zip.write_all(contents.as_bytes())
                    .with_context(|| format!("Failed to write {} to bundle", name))?;
            }
        }

        zip.finish().context("Failed to finalize bundle")?;
    }
    Ok(zip_buffer)
}
