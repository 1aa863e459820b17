use crate::align::{Aligner, AlignmentSummary};
use crate::merge::{merge_documents, MergeReport};
use crate::paragraphs::read_paragraphs;
use crate::parser::PairExtractor;
use crate::progress::ProgressSink;
use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};

/// A source document and its translation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentPair {
    pub source: PathBuf,
    pub target: PathBuf,
}

impl DocumentPair {
    pub fn new(source: impl Into<PathBuf>, target: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
        }
    }

    /// `translation_memory_<source file>_<target file>.tmx`
    pub fn output_file_name(&self) -> String {
        format!(
            "translation_memory_{}_{}.tmx",
            file_name(&self.source),
            file_name(&self.target)
        )
    }

    pub fn display_label(&self) -> String {
        format!("{} - {}", file_name(&self.source), file_name(&self.target))
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// `master_translation_memory_<YYYYmmdd_HHMMSS>.tmx`
pub fn master_file_name(timestamp: DateTime<Local>) -> String {
    format!(
        "master_translation_memory_{}.tmx",
        timestamp.format("%Y%m%d_%H%M%S")
    )
}

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub output_dir: PathBuf,
    pub build_master: bool,
}

#[derive(Debug)]
pub struct DocumentOutcome {
    pub pair: DocumentPair,
    pub output: PathBuf,
    pub summary: AlignmentSummary,
}

#[derive(Debug)]
pub struct DocumentFailure {
    pub pair: DocumentPair,
    pub error: String,
}

#[derive(Debug, Default)]
pub struct RunReport {
    pub documents: Vec<DocumentOutcome>,
    pub failures: Vec<DocumentFailure>,
    pub master: Option<MergeReport>,
}

impl RunReport {
    /// Per-pair TMX files that exist on disk, in processing order
    pub fn generated_files(&self) -> Vec<PathBuf> {
        self.documents
            .iter()
            .filter(|d| d.output.exists())
            .map(|d| d.output.clone())
            .collect()
    }
}

/// Align every document pair in turn, then merge the results.
///
/// Pairs are processed strictly one at a time. A pair that fails (unreadable
/// source, malformed existing TMX) is recorded and the run moves on.
pub async fn run<E: PairExtractor>(
    aligner: &Aligner<E>,
    pairs: &[DocumentPair],
    options: &RunOptions,
    progress: Arc<dyn ProgressSink>,
) -> Result<RunReport> {
    std::fs::create_dir_all(&options.output_dir).with_context(|| {
        format!(
            "Failed to create output directory {}",
            options.output_dir.display()
        )
    })?;

    let mut report = RunReport::default();
    let total = pairs.len();

    for (index, pair) in pairs.iter().enumerate() {
        info!("[{}/{}] Processing {}", index + 1, total, pair.display_label());
        let output = options.output_dir.join(pair.output_file_name());

        match process_pair(aligner, pair, &output, progress.clone()).await {
            Ok(summary) => {
                info!(
                    "[{}/{}] ✓ {} - {} pairs appended",
                    index + 1,
                    total,
                    pair.display_label(),
                    summary.pairs_appended
                );
                report.documents.push(DocumentOutcome {
                    pair: pair.clone(),
                    output,
                    summary,
                });
            }
            Err(e) => {
                error!(
                    "[{}/{}] ✗ {} - {:#}",
                    index + 1,
                    total,
                    pair.display_label(),
                    e
                );
                report.failures.push(DocumentFailure {
                    pair: pair.clone(),
                    error: format!("{:#}", e),
                });
            }
        }
    }

    if options.build_master {
        let generated = report.generated_files();
        if generated.is_empty() {
            warn!("No translation memory files were produced; master will be empty");
        }
        let master_path = options.output_dir.join(master_file_name(Local::now()));
        let merge = merge_documents(&generated, &master_path, aligner.header())
            .context("Failed to write master TMX")?;
        report.master = Some(merge);
    }

    Ok(report)
}

async fn process_pair<E: PairExtractor>(
    aligner: &Aligner<E>,
    pair: &DocumentPair,
    output: &Path,
    progress: Arc<dyn ProgressSink>,
) -> Result<AlignmentSummary> {
    let source = read_paragraphs(&pair.source)?;
    let target = read_paragraphs(&pair.target)?;

    info!(
        "Read {} source and {} target paragraphs",
        source.len(),
        target.len()
    );

    aligner
        .align_document(&source, &target, output, progress)
        .await
}
