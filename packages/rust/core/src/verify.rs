//! Health check for an enriched JSONL file.
//!
//! Operators tell healthy from degraded analysis by looking for placeholder
//! strings; this does that scan and also catches records whose `AI` object is
//! missing fields or that share an id with an earlier line.

use std::collections::HashSet;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use serde_json::Value;
use tracing::{info, instrument};

use paperlens_shared::{
    AI_FIELD, FIELD_NAMES, PaperLensError, Result, TOTAL_FAILURE_SENTINEL, is_sentinel,
};

/// Health of one enriched record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Health {
    /// Every field carries generated text.
    Healthy,
    /// Some fields carry placeholders.
    Degraded,
    /// Every field carries the total-failure placeholder.
    Failed,
    /// `AI` is absent, not an object, or lacks string fields.
    Incomplete,
}

/// Result of checking one output line.
#[derive(Debug, Clone)]
pub struct RecordCheck {
    /// 1-based line number in the file.
    pub line: usize,
    pub id: Option<String>,
    pub health: Health,
    /// Schema fields that are absent or not strings.
    pub missing_fields: Vec<&'static str>,
}

/// Aggregated verification results for a file.
#[derive(Debug, Clone, Default)]
pub struct VerifyReport {
    pub records: Vec<RecordCheck>,
    pub healthy: usize,
    pub degraded: usize,
    pub failed: usize,
    pub incomplete: usize,
    /// Ids that appear on more than one line, each listed once.
    pub duplicate_ids: Vec<String>,
}

impl VerifyReport {
    /// Number of records checked.
    pub fn total(&self) -> usize {
        self.records.len()
    }

    /// True when every record has all fields and no id repeats.
    pub fn is_complete(&self) -> bool {
        self.incomplete == 0 && self.duplicate_ids.is_empty()
    }
}

/// Classify one output record.
pub fn check_record(line: usize, value: &Value) -> RecordCheck {
    let id = value.get("id").and_then(Value::as_str).map(str::to_string);

    let Some(ai) = value.get(AI_FIELD).and_then(Value::as_object) else {
        return RecordCheck {
            line,
            id,
            health: Health::Incomplete,
            missing_fields: FIELD_NAMES.to_vec(),
        };
    };

    let mut missing_fields = Vec::new();
    let mut texts = Vec::with_capacity(FIELD_NAMES.len());
    for name in FIELD_NAMES {
        match ai.get(name).and_then(Value::as_str) {
            Some(text) => texts.push(text),
            None => missing_fields.push(name),
        }
    }

    let health = if !missing_fields.is_empty() {
        Health::Incomplete
    } else if texts.iter().all(|t| *t == TOTAL_FAILURE_SENTINEL) {
        Health::Failed
    } else if texts.iter().any(|t| is_sentinel(t)) {
        Health::Degraded
    } else {
        Health::Healthy
    };

    RecordCheck {
        line,
        id,
        health,
        missing_fields,
    }
}

/// Check every line of an enriched JSONL file.
#[instrument(skip_all, fields(path = %path.display()))]
pub fn verify_file(path: &Path) -> Result<VerifyReport> {
    let file = File::open(path).map_err(|e| PaperLensError::io(path, e))?;
    let reader = BufReader::new(file);

    let mut report = VerifyReport::default();
    let mut seen = HashSet::new();
    let mut repeated = HashSet::new();

    for (idx, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| PaperLensError::io(path, e))?;
        if line.trim().is_empty() {
            continue;
        }
        let value: Value = serde_json::from_str(&line)
            .map_err(|e| PaperLensError::parse(path, idx + 1, e.to_string()))?;

        let check = check_record(idx + 1, &value);
        if let Some(id) = &check.id {
            if !seen.insert(id.clone()) && repeated.insert(id.clone()) {
                report.duplicate_ids.push(id.clone());
            }
        }
        match check.health {
            Health::Healthy => report.healthy += 1,
            Health::Degraded => report.degraded += 1,
            Health::Failed => report.failed += 1,
            Health::Incomplete => report.incomplete += 1,
        }
        report.records.push(check);
    }

    info!(
        total = report.total(),
        healthy = report.healthy,
        degraded = report.degraded,
        failed = report.failed,
        incomplete = report.incomplete,
        "verification complete"
    );

    Ok(report)
}
