//! Output artifact handling.
//!
//! The enriched batch is written in one go after the pool drains: one compact
//! JSON object per line, into a file that was removed before the run started.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument};

use paperlens_shared::{PaperLensError, Record, Result};

/// Path of the enriched file for `input` in `language`.
///
/// `papers.jsonl` → `papers_AI_enhanced_<language>.jsonl`, in the same directory.
pub fn output_path_for(input: &Path, language: &str) -> PathBuf {
    let file_name = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stem = file_name.strip_suffix(".jsonl").unwrap_or(&file_name);
    input.with_file_name(format!("{stem}_AI_enhanced_{language}.jsonl"))
}

/// Delete a previous artifact at `path`. Returns whether one existed.
pub fn remove_stale_output(path: &Path) -> Result<bool> {
    match std::fs::remove_file(path) {
        Ok(()) => {
            info!(path = %path.display(), "removed existing output file");
            Ok(true)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(PaperLensError::io(path, e)),
    }
}

/// Write resolved slots as JSONL, skipping unresolved ones. Returns lines written.
#[instrument(skip_all, fields(path = %path.display(), slots = slots.len()))]
pub fn write_jsonl(path: &Path, slots: &[Option<Record>]) -> Result<usize> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| PaperLensError::io(parent, e))?;
    }

    let file = File::create(path).map_err(|e| PaperLensError::io(path, e))?;
    let mut out = BufWriter::new(file);
    let mut written = 0;

    for (idx, slot) in slots.iter().enumerate() {
        let Some(record) = slot else {
            debug!(slot = idx, "skipping unresolved slot");
            continue;
        };
        serde_json::to_writer(&mut out, record).map_err(|e| {
            PaperLensError::Serialization(format!("record {}: {e}", record.id()))
        })?;
        out.write_all(b"\n").map_err(|e| PaperLensError::io(path, e))?;
        written += 1;
    }

    out.flush().map_err(|e| PaperLensError::io(path, e))?;
    info!(written, "output written");
    Ok(written)
}
