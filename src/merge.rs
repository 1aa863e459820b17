use crate::error::TmxError;
use crate::tmx::{TmxDocument, TmxHeader};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Result of folding per-pair documents into a master document
#[derive(Debug)]
pub struct MergeReport {
    pub output: PathBuf,
    /// Inputs whose units made it into the master, in merge order
    pub merged: Vec<PathBuf>,
    /// Inputs that couldn't be loaded, with the reason
    pub skipped: Vec<(PathBuf, String)>,
    pub total_units: usize,
}

/// Concatenate the units of `inputs`, in order, into a new document at `output`.
///
/// An input that is missing, unreadable or malformed is skipped with a
/// warning. Only a failure to write `output` is an error.
pub fn merge_documents(
    inputs: &[PathBuf],
    output: &Path,
    header: &TmxHeader,
) -> Result<MergeReport, TmxError> {
    let mut master = TmxDocument::new(header.clone());
    let mut merged = Vec::new();
    let mut skipped = Vec::new();

    for input in inputs {
        match TmxDocument::load(input) {
            Ok(document) => {
                info!(
                    "Merging {} units from {}",
                    document.len(),
                    input.display()
                );
                master.extend(document.units().iter().cloned());
                merged.push(input.clone());
            }
            Err(e) => {
                warn!("Skipping {} in master merge: {}", input.display(), e);
                skipped.push((input.clone(), e.to_string()));
            }
        }
    }

    master.save(output)?;
    info!(
        "Master TMX created at {} ({} units from {} documents, {} skipped)",
        output.display(),
        master.len(),
        merged.len(),
        skipped.len()
    );

    Ok(MergeReport {
        output: output.to_path_buf(),
        merged,
        skipped,
        total_units: master.len(),
    })
}
