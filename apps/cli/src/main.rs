//! PaperLens CLI: batch enrichment of paper records with structured LLM analysis.
//!
//! Reads a JSONL file of paper records, asks an OpenAI-compatible service for a
//! fixed-schema analysis of each summary, and writes an enriched JSONL file.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
