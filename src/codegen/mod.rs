pub mod models;

use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::Result;
use crate::ir::SchemaDocument;

/// Write `<bundle>.rs` for every bundle plus a `mod.rs` declaring them.
/// Returns the written paths.
pub fn write_models(doc: &SchemaDocument, output_dir: &Path) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(output_dir)?;
    let mut written = Vec::new();
    let mut mod_rs = String::new();

    for bundle in doc.bundles.keys() {
        let code = models::generate_models(doc, bundle)?;
        let path = output_dir.join(format!("{}.rs", bundle));
        fs::write(&path, code)?;
        info!(path = %path.display(), "wrote models");
        mod_rs.push_str(&format!("pub mod {};\n", bundle));
        written.push(path);
    }

    let path = output_dir.join("mod.rs");
    fs::write(&path, mod_rs)?;
    written.push(path);
    Ok(written)
}
