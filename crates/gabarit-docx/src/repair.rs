//! Best-effort raw-markup repair over a saved package.
//!
//! Word splits placeholders across runs on spell-check and revision
//! boundaries, sometimes beyond what any run-level matcher can stitch
//! back. As a last pass the saved word parts are treated as plain text
//! and swept with gap-tolerant token patterns. Non-UTF-8 parts are left
//! alone.

use std::path::Path;

use gabarit_engine::{MarkupRepair, TokenCatalog};
use gabarit_opc::OpcPackage;
use tracing::debug;

use crate::DocxError;

/// Repair split placeholders in the word markup parts of the package at
/// `path`, rewriting the file in place when anything changed. Returns
/// whether a repair was applied.
pub fn repair_saved_package(path: impl AsRef<Path>, catalog: &TokenCatalog) -> Result<bool, DocxError> {
    let path = path.as_ref();
    let repair = MarkupRepair::new(catalog)?;
    let mut pkg = OpcPackage::from_path(path)?;

    let targets: Vec<String> = pkg
        .part_names()
        .filter(|name| is_story_part(name))
        .map(String::from)
        .collect();

    let mut changed = false;
    for name in targets {
        let Some(bytes) = pkg.part(&name) else { continue };
        let Ok(text) = std::str::from_utf8(bytes) else { continue };
        if let Some(repaired) = repair.apply(text) {
            debug!(part = %name, "repaired split placeholders in raw markup");
            pkg.set_part(name, repaired.into_bytes());
            changed = true;
        }
    }

    if changed {
        pkg.save(path)?;
    }
    Ok(changed)
}

/// Document stories live under `word/`: the main story plus headers,
/// footers, footnotes and endnotes.
fn is_story_part(name: &str) -> bool {
    name.starts_with("word/") && name.ends_with(".xml")
}
