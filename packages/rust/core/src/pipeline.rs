//! End-to-end `enrich` pipeline: JSONL → dedup → worker pool → enriched JSONL.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{info, instrument};

use paperlens_shared::{EnrichConfig, Result};

use crate::generation::StructuredGenerator;
use crate::loader::{Deduplicated, dedup_records, load_records};
use crate::scheduler::{EnrichmentProgress, PoolStats, run_pool};
use crate::writer::{output_path_for, remove_stale_output, write_jsonl};

/// Result of an `enrich_file` run.
#[derive(Debug, Clone)]
pub struct EnrichSummary {
    /// Path of the enriched JSONL file.
    pub output_path: PathBuf,
    /// Whether a previous output file was removed first.
    pub replaced_existing: bool,
    /// Records read from the input file.
    pub loaded: usize,
    /// Duplicate records dropped.
    pub duplicates_dropped: usize,
    /// Lines written to the output file.
    pub written: usize,
    /// How each record's analysis was obtained.
    pub stats: PoolStats,
    /// Total elapsed time.
    pub elapsed: Duration,
}

/// Run the full enrichment pipeline over one JSONL file.
///
/// 1. Remove any previous output for this input and language
/// 2. Load and deduplicate records
/// 3. Enrich every record through the worker pool
/// 4. Write the enriched batch
///
/// Only run-level problems (unreadable input, unwritable output, bad
/// parameters) return an error. Per-record failures end up as placeholders.
#[instrument(skip_all, fields(data = %data_path.display(), language = %config.language))]
pub async fn enrich_file<G>(
    data_path: &Path,
    config: &EnrichConfig,
    generator: Arc<G>,
    progress: &dyn EnrichmentProgress,
) -> Result<EnrichSummary>
where
    G: StructuredGenerator + 'static,
{
    let start = Instant::now();
    config.validate()?;

    let output_path = output_path_for(data_path, &config.language);

    // --- Phase 1: Clear previous output ---
    progress.phase("Removing previous output");
    let replaced_existing = remove_stale_output(&output_path)?;

    // --- Phase 2: Load + dedup ---
    progress.phase("Loading records");
    let records = load_records(data_path)?;
    let loaded = records.len();
    let Deduplicated { records, dropped } = dedup_records(records);

    // --- Phase 3: Enrich ---
    progress.phase("Enriching records");
    let output = run_pool(
        generator,
        records,
        &config.language,
        config.max_workers,
        progress,
    )
    .await;

    // --- Phase 4: Write ---
    progress.phase("Writing output");
    let written = write_jsonl(&output_path, &output.slots)?;

    let summary = EnrichSummary {
        output_path,
        replaced_existing,
        loaded,
        duplicates_dropped: dropped,
        written,
        stats: output.stats,
        elapsed: start.elapsed(),
    };

    info!(
        loaded = summary.loaded,
        duplicates = summary.duplicates_dropped,
        written = summary.written,
        degraded = summary.stats.degraded(),
        elapsed_ms = summary.elapsed.as_millis() as u64,
        output = %summary.output_path.display(),
        "enrichment complete"
    );

    Ok(summary)
}
