//! Shared types, error model, and configuration for PaperLens.
//!
//! This crate is the foundation depended on by all other PaperLens crates.
//! It provides:
//! - [`PaperLensError`]: the unified error type
//! - The analysis schema ([`AnalysisResult`], [`AiFields`], sentinel sets)
//! - The pass-through [`Record`] type
//! - Configuration ([`AppConfig`], [`EnrichConfig`], config loading)

pub mod config;
pub mod error;
pub mod schema;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, DefaultsConfig, EnrichConfig, LlmConfig, config_dir, config_file_path,
    init_config, load_config, load_config_from, resolve_api_key,
};
pub use error::{PaperLensError, Result};
pub use schema::{
    AiFields, AnalysisResult, FIELD_NAMES, FUNCTION_NAME, TOTAL_FAILURE_SENTINEL,
    ValueAssessment, is_sentinel, partial_failure_sentinel,
};
pub use types::{AI_FIELD, Record};
