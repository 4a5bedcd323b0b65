//! Record loading and deduplication.
//!
//! Input is newline-delimited JSON. Anything that prevents reading the batch
//! as a whole is fatal; per-record problems (like a missing `summary`) are left
//! for the worker pool to absorb.

use std::collections::HashSet;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use tracing::{debug, info};

use paperlens_shared::{PaperLensError, Record, Result};

/// Records left after dropping repeated identifiers.
#[derive(Debug, Clone)]
pub struct Deduplicated {
    /// Unique records in first-seen order. Position is the output slot index.
    pub records: Vec<Record>,
    /// Number of later occurrences that were dropped.
    pub dropped: usize,
}

/// Read every record from a JSONL file.
///
/// Blank lines are skipped. A line that is not a JSON object with a string
/// `id` aborts the whole load.
pub fn load_records(path: &Path) -> Result<Vec<Record>> {
    let file = File::open(path).map_err(|e| PaperLensError::io(path, e))?;
    let reader = BufReader::new(file);

    let mut records = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| PaperLensError::io(path, e))?;
        if line.trim().is_empty() {
            continue;
        }
        let record: Record = serde_json::from_str(&line)
            .map_err(|e| PaperLensError::parse(path, idx + 1, e.to_string()))?;
        records.push(record);
    }

    info!(path = %path.display(), records = records.len(), "loaded records");
    Ok(records)
}

/// Keep the first occurrence of each `id`, preserving first-seen order.
pub fn dedup_records(records: Vec<Record>) -> Deduplicated {
    let total = records.len();
    let mut seen = HashSet::with_capacity(total);

    let records: Vec<Record> = records
        .into_iter()
        .filter(|record| {
            let fresh = seen.insert(record.id().to_string());
            if !fresh {
                debug!(id = record.id(), "dropping duplicate record");
            }
            fresh
        })
        .collect();

    let dropped = total - records.len();
    if dropped > 0 {
        info!(dropped, unique = records.len(), "removed duplicate records");
    }

    Deduplicated { records, dropped }
}
