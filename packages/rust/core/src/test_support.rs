//! Scripted generator for pool and pipeline tests.
//!
//! Behaviour is driven by the record's summary text:
//! - `fail`              → other failure
//! - `panic`             → the worker task panics
//! - `raw:<text>`        → schema violation carrying `<text>` verbatim
//! - `violate:<args>`    → arguments parsed like the real client
//! - `sleep:<ms>:<text>` → success after a delay
//! - anything else       → immediate success

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use paperlens_shared::{AnalysisResult, Record, ValueAssessment};

use crate::generation::{GenerationOutcome, GenerationRequest, StructuredGenerator, parse_arguments};

#[derive(Default)]
pub(crate) struct ScriptedGenerator {
    in_flight: AtomicUsize,
    pub(crate) max_in_flight: AtomicUsize,
    pub(crate) calls: AtomicUsize,
    pub(crate) completion_order: Mutex<Vec<String>>,
}

pub(crate) fn analysis_of(content: &str) -> AnalysisResult {
    AnalysisResult {
        core_problem: format!("problem of {content}"),
        key_insight: "insight".into(),
        method: "method".into(),
        method_formula: "a + b".into(),
        core_finding: "finding".into(),
        value: ValueAssessment {
            mechanism_insight: "mechanism".into(),
            action_value: "1-3x".into(),
            transferability: "elsewhere".into(),
            value_score: "medium".into(),
        },
        summary_core: "core".into(),
        summary_layman: "simple".into(),
    }
}

pub(crate) fn record(id: &str, summary: &str) -> Record {
    serde_json::from_value(serde_json::json!({ "id": id, "summary": summary })).unwrap()
}

impl StructuredGenerator for ScriptedGenerator {
    async fn generate(&self, request: GenerationRequest) -> GenerationOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let content = request.content.as_str();
        let outcome = if content == "fail" {
            GenerationOutcome::OtherFailure("scripted failure".into())
        } else if content == "panic" {
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            panic!("scripted panic for {}", request.record_id);
        } else if let Some(raw) = content.strip_prefix("raw:") {
            GenerationOutcome::SchemaViolation(raw.to_string())
        } else if let Some(args) = content.strip_prefix("violate:") {
            parse_arguments(args)
        } else if let Some(rest) = content.strip_prefix("sleep:") {
            let (ms, text) = rest.split_once(':').unwrap_or((rest, ""));
            tokio::time::sleep(Duration::from_millis(ms.parse().unwrap_or(0))).await;
            GenerationOutcome::Success(analysis_of(text))
        } else {
            tokio::task::yield_now().await;
            GenerationOutcome::Success(analysis_of(content))
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.completion_order
            .lock()
            .unwrap()
            .push(request.record_id.clone());
        outcome
    }
}
