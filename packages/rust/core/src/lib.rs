//! Enrichment pipeline and domain logic for PaperLens.
//!
//! This crate ties together loading, structured generation, failure recovery,
//! and output writing into the end-to-end `enrich_file` workflow, plus the
//! `verify_file` health check over its output.

pub mod generation;
pub mod loader;
pub mod pipeline;
pub mod recovery;
pub mod scheduler;
pub mod verify;
pub mod writer;

#[cfg(test)]
mod test_support;

pub use generation::{GenerationOutcome, GenerationRequest, OpenAiGenerator, StructuredGenerator};
pub use pipeline::{EnrichSummary, enrich_file};
pub use recovery::{Disposition, Resolved};
pub use scheduler::{EnrichmentProgress, PoolStats, SilentProgress};
pub use verify::{Health, RecordCheck, VerifyReport, verify_file};
