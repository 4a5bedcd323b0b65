//! Bounded-parallel worker pool over a record batch.
//!
//! Every record gets its own task up front; a semaphore caps how many of them
//! talk to the generation service at once. Results land in a slot vector
//! indexed by input position, so completion order never leaks into the output.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, instrument, warn};

use paperlens_shared::Record;

use crate::generation::{GenerationOutcome, GenerationRequest, StructuredGenerator};
use crate::recovery::{Disposition, Resolved, resolve_outcome};

// ---------------------------------------------------------------------------
// Progress trait
// ---------------------------------------------------------------------------

/// Progress callback for enrichment runs.
pub trait EnrichmentProgress: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called once before the first record is dispatched.
    fn started(&self, total: usize);
    /// Called after each record completes, in completion order.
    fn record_done(&self, id: &str, completed: usize, total: usize);
    /// Called when the pool has drained.
    fn finished(&self);
}

/// No-op enrichment progress.
pub struct SilentProgress;

impl EnrichmentProgress for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn started(&self, _total: usize) {}
    fn record_done(&self, _id: &str, _completed: usize, _total: usize) {}
    fn finished(&self) {}
}

// ---------------------------------------------------------------------------
// Pool results
// ---------------------------------------------------------------------------

/// Count of records per [`Disposition`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub generated: usize,
    pub salvaged: usize,
    pub defaulted: usize,
    pub failed: usize,
    pub escaped: usize,
}

impl PoolStats {
    fn record(&mut self, disposition: Disposition) {
        match disposition {
            Disposition::Generated => self.generated += 1,
            Disposition::Salvaged => self.salvaged += 1,
            Disposition::Defaulted => self.defaulted += 1,
            Disposition::Failed => self.failed += 1,
            Disposition::Escaped => self.escaped += 1,
        }
    }

    /// Records whose analysis contains at least one placeholder.
    pub fn degraded(&self) -> usize {
        self.salvaged + self.defaulted + self.failed + self.escaped
    }

    /// All records accounted for.
    pub fn total(&self) -> usize {
        self.generated + self.degraded()
    }
}

/// Slots in input order plus per-disposition counts.
#[derive(Debug)]
pub struct PoolOutput {
    /// One slot per input record; `None` only if a slot was never resolved.
    pub slots: Vec<Option<Record>>,
    pub stats: PoolStats,
}

// ---------------------------------------------------------------------------
// Pool
// ---------------------------------------------------------------------------

/// Enrich one record: generate, then resolve into a complete analysis.
pub async fn enrich_one<G: StructuredGenerator>(
    generator: &G,
    record_id: String,
    content: Option<String>,
    language: String,
) -> Resolved {
    let Some(content) = content else {
        return resolve_outcome(
            GenerationOutcome::OtherFailure("record has no `summary` text".into()),
            &record_id,
        );
    };

    let request = GenerationRequest {
        record_id: record_id.clone(),
        language,
        content,
    };
    let outcome = generator.generate(request).await;
    resolve_outcome(outcome, &record_id)
}

/// Run every record through `generator` with at most `max_workers` in flight.
///
/// Always returns one resolved slot per input record.
#[instrument(skip_all, fields(records = records.len(), max_workers = max_workers))]
pub async fn run_pool<G>(
    generator: Arc<G>,
    records: Vec<Record>,
    language: &str,
    max_workers: usize,
    progress: &dyn EnrichmentProgress,
) -> PoolOutput
where
    G: StructuredGenerator + 'static,
{
    let total = records.len();
    let semaphore = Arc::new(Semaphore::new(max_workers.max(1)));
    let mut tasks = JoinSet::new();

    info!(total, max_workers = max_workers.max(1), "dispatching records");
    progress.started(total);

    for (idx, record) in records.iter().enumerate() {
        let generator = Arc::clone(&generator);
        let semaphore = Arc::clone(&semaphore);
        let record_id = record.id().to_string();
        let content = record.summary().map(str::to_string);
        let language = language.to_string();

        tasks.spawn(async move {
            let Ok(_permit) = semaphore.acquire_owned().await else {
                let closed = GenerationOutcome::OtherFailure("worker pool closed".into());
                return (idx, resolve_outcome(closed, &record_id));
            };
            (idx, enrich_one(generator.as_ref(), record_id, content, language).await)
        });
    }

    // Each task owns exactly one index; a slot is written once, when its task joins.
    let mut pending: Vec<Option<Record>> = records.into_iter().map(Some).collect();
    let mut slots: Vec<Option<Record>> = vec![None; total];
    let mut stats = PoolStats::default();
    let mut completed = 0;

    while let Some(joined) = tasks.join_next().await {
        let (idx, resolved) = match joined {
            Ok(pair) => pair,
            Err(e) => {
                // The slot is recovered after the pool drains.
                warn!(error = %e, "worker task escaped");
                continue;
            }
        };
        let Some(record) = pending.get_mut(idx).and_then(Option::take) else {
            continue;
        };

        completed += 1;
        progress.record_done(record.id(), completed, total);
        stats.record(resolved.disposition);
        slots[idx] = Some(record.with_analysis(&resolved.fields));
    }

    // Anything still pending belongs to a task that never returned.
    for (idx, record) in pending.into_iter().enumerate() {
        let Some(record) = record else {
            continue;
        };
        warn!(id = record.id(), slot = idx, "no result from worker, using failure placeholders");

        let resolved = Resolved::escaped();
        completed += 1;
        progress.record_done(record.id(), completed, total);
        stats.record(resolved.disposition);
        slots[idx] = Some(record.with_analysis(&resolved.fields));
    }

    progress.finished();
    info!(
        generated = stats.generated,
        salvaged = stats.salvaged,
        defaulted = stats.defaulted,
        failed = stats.failed,
        escaped = stats.escaped,
        "worker pool drained"
    );

    PoolOutput { slots, stats }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::Ordering;

    use paperlens_shared::{AI_FIELD, AiFields, FIELD_NAMES, TOTAL_FAILURE_SENTINEL};
    use serde_json::Value;

    use crate::test_support::{ScriptedGenerator, record};

    fn ai_of(slot: &Option<Record>) -> AiFields {
        let ai = slot.as_ref().unwrap().get(AI_FIELD).cloned().unwrap();
        serde_json::from_value(ai).unwrap()
    }

    /// Records completion callbacks for assertions.
    #[derive(Default)]
    struct CountingProgress {
        started: Mutex<Option<usize>>,
        done: Mutex<Vec<(String, usize)>>,
    }

    impl EnrichmentProgress for CountingProgress {
        fn phase(&self, _name: &str) {}
        fn started(&self, total: usize) {
            *self.started.lock().unwrap() = Some(total);
        }
        fn record_done(&self, id: &str, completed: usize, _total: usize) {
            self.done.lock().unwrap().push((id.to_string(), completed));
        }
        fn finished(&self) {}
    }

    #[tokio::test]
    async fn output_order_ignores_completion_order() {
        let generator = Arc::new(ScriptedGenerator::default());
        let records = vec![
            record("r0", "sleep:80:zero"),
            record("r1", "sleep:40:one"),
            record("r2", "sleep:1:two"),
            record("r3", "sleep:20:three"),
        ];

        let output = run_pool(Arc::clone(&generator), records, "English", 4, &SilentProgress).await;

        let finished = generator.completion_order.lock().unwrap().clone();
        assert_ne!(finished, ["r0", "r1", "r2", "r3"], "delays should reorder completion");

        let ids: Vec<&str> = output
            .slots
            .iter()
            .map(|s| s.as_ref().unwrap().id())
            .collect();
        assert_eq!(ids, ["r0", "r1", "r2", "r3"]);
        assert_eq!(ai_of(&output.slots[0]).core_problem, "problem of zero");
        assert_eq!(ai_of(&output.slots[2]).core_problem, "problem of two");
        assert_eq!(output.stats.generated, 4);
    }

    #[tokio::test]
    async fn concurrency_is_bounded_by_max_workers() {
        let generator = Arc::new(ScriptedGenerator::default());
        let records: Vec<Record> = (0..12)
            .map(|i| record(&format!("r{i}"), "sleep:15:x"))
            .collect();

        let output = run_pool(Arc::clone(&generator), records, "English", 3, &SilentProgress).await;

        assert_eq!(output.slots.len(), 12);
        assert!(generator.max_in_flight.load(Ordering::SeqCst) <= 3);
        assert!(generator.max_in_flight.load(Ordering::SeqCst) >= 1);
        assert_eq!(generator.calls.load(Ordering::SeqCst), 12);
    }

    #[tokio::test]
    async fn zero_workers_is_clamped_to_one() {
        let generator = Arc::new(ScriptedGenerator::default());
        let records = vec![record("a", "sleep:5:x"), record("b", "sleep:5:y")];

        let output = run_pool(Arc::clone(&generator), records, "English", 0, &SilentProgress).await;

        assert!(output.slots.iter().all(Option::is_some));
        assert_eq!(generator.max_in_flight.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failures_are_isolated_per_record() {
        let generator = Arc::new(ScriptedGenerator::default());
        let records = vec![
            record("a", "fine"),
            record("b", r#"violate:{"core_problem":"partial","key_insight":"#),
            record("c", "fail"),
            record("d", "raw:no markers here"),
            record("e", r#"violate:{"core_problem":"partial"}"#),
            record("f", "also fine"),
        ];

        let output = run_pool(generator, records, "English", 2, &SilentProgress).await;

        assert_eq!(ai_of(&output.slots[0]).core_problem, "problem of fine");

        // Truncated arguments do not reparse, so nothing is salvaged.
        assert_eq!(ai_of(&output.slots[1]), AiFields::partial_failure());
        assert_eq!(ai_of(&output.slots[2]), AiFields::total_failure());
        assert_eq!(ai_of(&output.slots[3]), AiFields::partial_failure());

        let e = ai_of(&output.slots[4]);
        assert_eq!(e.core_problem, "partial");
        assert_eq!(e.method, AiFields::partial_failure().method);

        assert_eq!(ai_of(&output.slots[5]).core_problem, "problem of also fine");

        assert_eq!(
            output.stats,
            PoolStats {
                generated: 2,
                salvaged: 1,
                defaulted: 2,
                failed: 1,
                escaped: 0,
            }
        );
        assert_eq!(output.stats.degraded(), 4);
    }

    #[tokio::test]
    async fn panicking_task_gets_total_failure_slot() {
        let generator = Arc::new(ScriptedGenerator::default());
        let records = vec![
            record("a", "fine"),
            record("boom", "panic"),
            record("c", "fine too"),
        ];

        let output = run_pool(generator, records, "English", 2, &SilentProgress).await;

        assert_eq!(output.slots.len(), 3);
        assert_eq!(output.slots[1].as_ref().unwrap().id(), "boom");
        let ai = ai_of(&output.slots[1]);
        assert!(ai.iter().all(|(_, v)| v == TOTAL_FAILURE_SENTINEL));
        assert_eq!(output.stats.escaped, 1);
        assert_eq!(output.stats.total(), 3);
    }

    #[tokio::test]
    async fn missing_summary_is_other_failure() {
        let generator = Arc::new(ScriptedGenerator::default());
        let no_summary: Record = serde_json::from_str(r#"{"id":"x","title":"T"}"#).unwrap();

        let output = run_pool(Arc::clone(&generator), vec![no_summary], "English", 1, &SilentProgress).await;

        assert_eq!(ai_of(&output.slots[0]), AiFields::total_failure());
        assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
        let slot = output.slots[0].as_ref().unwrap();
        assert_eq!(slot.get("title"), Some(&Value::String("T".into())));
    }

    #[tokio::test]
    async fn every_slot_has_all_fields() {
        let generator = Arc::new(ScriptedGenerator::default());
        let records = vec![
            record("a", "fine"),
            record("b", "fail"),
            record("c", "panic"),
            record("d", "raw:Function Structure arguments: {\"method\":\"m\"}"),
        ];

        let output = run_pool(generator, records, "English", 4, &SilentProgress).await;

        for slot in &output.slots {
            let ai = slot.as_ref().unwrap().get(AI_FIELD).unwrap().as_object().unwrap();
            assert_eq!(ai.len(), FIELD_NAMES.len());
            for name in FIELD_NAMES {
                assert!(ai[name].is_string(), "{name} must be a string");
            }
        }
    }

    #[tokio::test]
    async fn progress_counts_every_completion() {
        let generator = Arc::new(ScriptedGenerator::default());
        let records = vec![record("a", "x"), record("b", "panic"), record("c", "y")];
        let progress = CountingProgress::default();

        run_pool(generator, records, "English", 2, &progress).await;

        assert_eq!(*progress.started.lock().unwrap(), Some(3));
        let done = progress.done.lock().unwrap();
        let counts: Vec<usize> = done.iter().map(|(_, n)| *n).collect();
        assert_eq!(counts, [1, 2, 3]);
        let mut ids: Vec<&str> = done.iter().map(|(id, _)| id.as_str()).collect();
        ids.sort();
        assert_eq!(ids, ["a", "b", "c"]);
    }

    #[tokio::test]
    async fn empty_batch() {
        let generator = Arc::new(ScriptedGenerator::default());
        let output = run_pool(generator, Vec::new(), "English", 4, &SilentProgress).await;
        assert!(output.slots.is_empty());
        assert_eq!(output.stats.total(), 0);
    }
}
