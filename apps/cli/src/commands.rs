//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use paperlens_core::{
    EnrichSummary, EnrichmentProgress, Health, OpenAiGenerator, enrich_file, verify_file,
};
use paperlens_shared::{
    AppConfig, EnrichConfig, init_config, load_config, resolve_api_key,
};
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// PaperLens: structured analysis for paper digests.
#[derive(Parser)]
#[command(
    name = "paperlens",
    version,
    about = "Enrich JSONL paper records with a structured LLM analysis.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Enrich every record of a JSONL file.
    Enrich {
        /// Input JSONL file.
        #[arg(long)]
        data: PathBuf,

        /// Maximum concurrent generation calls (defaults to config).
        #[arg(long)]
        max_workers: Option<usize>,

        /// Model identifier (defaults to config).
        #[arg(long, env = "MODEL_NAME")]
        model: Option<String>,

        /// Analysis language (defaults to config).
        #[arg(long, env = "LANGUAGE")]
        language: Option<String>,

        /// Base URL of the OpenAI-compatible API (defaults to config).
        #[arg(long, env = "OPENAI_BASE_URL")]
        base_url: Option<String>,
    },

    /// Report placeholder and missing-field counts for an enriched file.
    Verify {
        /// Enriched JSONL file.
        #[arg(long)]
        data: PathBuf,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

/// CLI overrides for the `enrich` command.
struct EnrichOverrides {
    max_workers: Option<usize>,
    model: Option<String>,
    language: Option<String>,
    base_url: Option<String>,
}

impl EnrichOverrides {
    fn apply(self, config: &AppConfig) -> EnrichConfig {
        let mut enrich = EnrichConfig::from(config);
        if let Some(n) = self.max_workers {
            enrich.max_workers = n;
        }
        if let Some(model) = self.model {
            enrich.model = model;
        }
        if let Some(language) = self.language {
            enrich.language = language;
        }
        if let Some(base_url) = self.base_url {
            enrich.base_url = base_url;
        }
        enrich
    }
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "paperlens=info",
        1 => "paperlens=debug",
        _ => "paperlens=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Enrich {
            data,
            max_workers,
            model,
            language,
            base_url,
        } => {
            let overrides = EnrichOverrides {
                max_workers,
                model,
                language,
                base_url,
            };
            cmd_enrich(&data, overrides).await
        }
        Command::Verify { data } => cmd_verify(&data),
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(),
        },
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_enrich(data: &Path, overrides: EnrichOverrides) -> Result<()> {
    // Fail on a missing key before touching any file
    let config = load_config()?;
    let api_key = resolve_api_key(&config)?;

    let enrich = overrides.apply(&config);
    enrich.validate()?;

    info!(
        data = %data.display(),
        model = %enrich.model,
        language = %enrich.language,
        max_workers = enrich.max_workers,
        "starting enrichment"
    );

    let generator = Arc::new(OpenAiGenerator::new(&enrich, api_key)?);
    let reporter = CliProgress::new();

    let summary = enrich_file(data, &enrich, generator, &reporter).await?;
    print_enrich_summary(&summary);

    Ok(())
}

fn print_enrich_summary(summary: &EnrichSummary) {
    let stats = &summary.stats;
    println!();
    println!("  Enrichment complete!");
    println!("  Output:     {}", summary.output_path.display());
    println!("  Loaded:     {}", summary.loaded);
    println!("  Duplicates: {}", summary.duplicates_dropped);
    println!("  Written:    {}", summary.written);
    println!("  Generated:  {}", stats.generated);
    println!("  Salvaged:   {}", stats.salvaged);
    println!("  Defaulted:  {}", stats.defaulted);
    println!("  Failed:     {}", stats.failed + stats.escaped);
    println!("  Time:       {:.1}s", summary.elapsed.as_secs_f64());
    println!();
}

fn cmd_verify(data: &Path) -> Result<()> {
    let report = verify_file(data)?;

    println!();
    println!("  File:       {}", data.display());
    println!("  Records:    {}", report.total());
    println!("  Healthy:    {}", report.healthy);
    println!("  Degraded:   {}", report.degraded);
    println!("  Failed:     {}", report.failed);
    println!("  Incomplete: {}", report.incomplete);

    for check in report
        .records
        .iter()
        .filter(|c| c.health == Health::Incomplete)
    {
        println!(
            "    line {} ({}): missing {}",
            check.line,
            check.id.as_deref().unwrap_or("<no id>"),
            check.missing_fields.join(", ")
        );
    }
    if !report.duplicate_ids.is_empty() {
        println!("  Duplicate ids: {}", report.duplicate_ids.join(", "));
    }
    println!();

    if !report.is_complete() {
        return Err(eyre!(
            "{} incomplete record(s), {} duplicate id(s) in '{}'",
            report.incomplete,
            report.duplicate_ids.len(),
            data.display()
        ));
    }
    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter: a spinner for phases, a bar while the pool runs.
struct CliProgress {
    bar: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let bar = ProgressBar::new_spinner();
        bar.set_style(spinner_style());
        bar.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { bar }
    }
}

fn spinner_style() -> ProgressStyle {
    ProgressStyle::with_template("{spinner:.cyan} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"])
}

fn bar_style() -> ProgressStyle {
    ProgressStyle::with_template("{spinner:.cyan} [{bar:30.cyan/blue}] {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ")
}

impl EnrichmentProgress for CliProgress {
    fn phase(&self, name: &str) {
        self.bar.set_message(name.to_string());
    }

    fn started(&self, total: usize) {
        self.bar.set_length(total as u64);
        self.bar.set_position(0);
        self.bar.set_style(bar_style());
    }

    fn record_done(&self, id: &str, completed: usize, _total: usize) {
        self.bar.set_position(completed as u64);
        self.bar.set_message(id.to_string());
    }

    fn finished(&self) {
        self.bar.set_style(spinner_style());
    }
}

impl Drop for CliProgress {
    fn drop(&mut self) {
        self.bar.finish_and_clear();
    }
}
