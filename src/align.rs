//! Alignment of one document pair.
//!
//! Every usable paragraph pair is sent to the service at once; replies are
//! parsed as they arrive and handed to a single blocking writer that owns the
//! document's TMX file and performs every append in turn. Individual failures
//! contribute nothing and never cancel sibling requests; a failure of the
//! writer (unreadable or malformed TMX) is fatal for the document pair.

use crate::error::TmxError;
use crate::language::LanguagePair;
use crate::openai::{AlignmentClient, ParagraphPair};
use crate::parser::{AlignedPair, PairExtractor};
use crate::progress::ProgressSink;
use crate::tmx::{self, TmxDocument, TmxHeader};
use anyhow::{Context, Result};
use futures::stream::{FuturesUnordered, StreamExt};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Outcome of aligning one document pair
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlignmentSummary {
    /// Paragraph pairs sent to the service
    pub dispatched: usize,
    /// Positions skipped because one side was blank
    pub skipped: usize,
    /// Requests that produced no reply text (failure or timeout)
    pub empty_responses: usize,
    /// Aligned pairs appended to the document
    pub pairs_appended: usize,
    /// Units in the document once alignment finished
    pub total_units: usize,
}

/// One finished request, as seen by the writer
#[derive(Debug)]
struct Completion {
    index: usize,
    response_empty: bool,
    pairs: Vec<AlignedPair>,
}

#[derive(Debug, Default)]
struct WriterStats {
    empty_responses: usize,
    pairs_appended: usize,
    total_units: usize,
}

/// Zip two paragraph sequences by position, skipping blank positions
pub fn build_paragraph_pairs(source: &[String], target: &[String]) -> Vec<ParagraphPair> {
    source
        .iter()
        .zip(target.iter())
        .enumerate()
        .filter_map(|(index, (s, t))| {
            let s = s.trim();
            let t = t.trim();
            if s.is_empty() || t.is_empty() {
                None
            } else {
                Some(ParagraphPair {
                    index,
                    source: s.to_string(),
                    target: t.to_string(),
                })
            }
        })
        .collect()
}

/// Drives the alignment client and extractor for one document pair at a time
pub struct Aligner<E> {
    client: AlignmentClient,
    extractor: E,
    languages: LanguagePair,
    header: TmxHeader,
}

impl<E: PairExtractor> Aligner<E> {
    pub fn new(
        client: AlignmentClient,
        extractor: E,
        languages: LanguagePair,
        header: TmxHeader,
    ) -> Self {
        Self {
            client,
            extractor,
            languages,
            header,
        }
    }

    pub fn languages(&self) -> &LanguagePair {
        &self.languages
    }

    pub fn header(&self) -> &TmxHeader {
        &self.header
    }

    /// Align two paragraph sequences and append the results to `output`.
    ///
    /// Units land in the order replies complete, so their order within this
    /// call is not deterministic; pre-existing units always stay first.
    pub async fn align_document(
        &self,
        source_paragraphs: &[String],
        target_paragraphs: &[String],
        output: &Path,
        progress: Arc<dyn ProgressSink>,
    ) -> Result<AlignmentSummary> {
        if source_paragraphs.len() != target_paragraphs.len() {
            warn!(
                "Paragraph count mismatch ({} source vs {} target); pairing by position",
                source_paragraphs.len(),
                target_paragraphs.len()
            );
        }

        // Fail before spending any request on a document we can't extend
        let existing = TmxDocument::load_if_present(output)
            .with_context(|| format!("Cannot extend existing TMX {}", output.display()))?;

        let pairs = build_paragraph_pairs(source_paragraphs, target_paragraphs);
        let positions = source_paragraphs.len().min(target_paragraphs.len());
        let mut summary = AlignmentSummary {
            dispatched: pairs.len(),
            skipped: positions - pairs.len(),
            total_units: existing.map(|doc| doc.len()).unwrap_or(0),
            ..Default::default()
        };

        if pairs.is_empty() {
            info!("No paragraph pairs to align for {}", output.display());
            return Ok(summary);
        }

        info!(
            "Aligning {} paragraph pairs ({} skipped) into {}",
            summary.dispatched,
            summary.skipped,
            output.display()
        );

        let (tx, rx) = mpsc::unbounded_channel();
        let writer = self.spawn_writer(rx, output.to_path_buf(), pairs.len(), progress);

        let mut in_flight: FuturesUnordered<_> = pairs
            .iter()
            .map(|pair| async move {
                let response = self.client.align(pair, &self.languages).await;
                let extracted = self.extractor.extract(&response);
                Completion {
                    index: pair.index,
                    response_empty: response.trim().is_empty(),
                    pairs: extracted,
                }
            })
            .collect();

        while let Some(completion) = in_flight.next().await {
            debug!(
                "Paragraph {} completed with {} aligned pairs",
                completion.index,
                completion.pairs.len()
            );
            if tx.send(completion).is_err() {
                // Writer stopped on an error; its result is reported below
                break;
            }
        }
        drop(in_flight);
        drop(tx);

        let stats = writer
            .await
            .context("TMX writer task panicked")?
            .with_context(|| format!("Failed to append to {}", output.display()))?;

        summary.empty_responses = stats.empty_responses;
        summary.pairs_appended = stats.pairs_appended;
        if stats.pairs_appended > 0 {
            summary.total_units = stats.total_units;
        }

        info!(
            "Aligned {}: {} pairs appended, {} empty responses",
            output.display(),
            summary.pairs_appended,
            summary.empty_responses
        );

        Ok(summary)
    }

    /// Start the single consumer that serializes all appends to `path`
    fn spawn_writer(
        &self,
        mut rx: mpsc::UnboundedReceiver<Completion>,
        path: PathBuf,
        total: usize,
        progress: Arc<dyn ProgressSink>,
    ) -> JoinHandle<Result<WriterStats, TmxError>> {
        let languages = self.languages.clone();
        let header = self.header.clone();

        tokio::task::spawn_blocking(move || {
            let mut stats = WriterStats::default();
            let mut completed = 0;

            while let Some(completion) = rx.blocking_recv() {
                completed += 1;
                if completion.response_empty {
                    stats.empty_responses += 1;
                }
                if !completion.pairs.is_empty() {
                    stats.total_units = tmx::append(&completion.pairs, &path, &languages, &header)?;
                    stats.pairs_appended += completion.pairs.len();
                }
                progress.report(completed, total);
            }

            Ok(stats)
        })
    }
}
