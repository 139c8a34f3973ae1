//! CLI command definitions, routing, and tracing setup.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use dictindex_core::{Pipeline, ProgressReporter, registry};
use dictindex_shared::{
    AppConfig, SourceDescriptor, SourceName, SourceOutcome, init_config, load_config,
    load_config_from,
};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// dictindex: load Japanese dictionaries into a search engine.
#[derive(Parser)]
#[command(
    name = "dictindex",
    version,
    about = "Fetch, reshape, and index dictionary datasets into Meilisearch.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Config file to use instead of ~/.dictindex/dictindex.toml.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Search engine URL, overriding the configured host.
    #[arg(long, env = "MEILI_HOST", global = true)]
    pub host: Option<String>,

    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
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
    /// Build the index of each named source, skipping ones that already exist.
    Build {
        /// Sources to build (jmdict, jmnedict, kanjidic2, nhk).
        sources: Vec<String>,

        /// Build every registered source.
        #[arg(long, conflicts_with = "sources")]
        all: bool,
    },

    /// Delete indexes and cached artifacts so the next build starts fresh.
    Purge {
        /// Sources to purge.
        sources: Vec<String>,

        /// Purge every registered source.
        #[arg(long, conflicts_with = "sources")]
        all: bool,
    },

    /// Show every source with its index and cache state.
    List,

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

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "dictindex=info",
        1 => "dictindex=debug",
        _ => "dictindex=trace",
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
    match &cli.command {
        Command::Build { sources, all } => {
            cmd_build(&resolve_config(&cli)?, &select(sources, *all)?).await
        }
        Command::Purge { sources, all } => {
            cmd_purge(&resolve_config(&cli)?, &select(sources, *all)?).await
        }
        Command::List => cmd_list(&resolve_config(&cli)?).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(&resolve_config(&cli)?),
        },
    }
}

/// Load the config file, then apply flag overrides.
fn resolve_config(cli: &Cli) -> Result<AppConfig> {
    let mut config = match &cli.config {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };
    if let Some(host) = &cli.host {
        config.search.host = host.clone();
        config.validate()?;
    }
    Ok(config)
}

/// Descriptors for the named sources, or all of them.
fn select(names: &[String], all: bool) -> Result<Vec<SourceDescriptor>> {
    if all {
        return Ok(registry::all());
    }
    if names.is_empty() {
        return Err(eyre!("name at least one source, or pass --all"));
    }
    // One run per source: duplicates would race on the same cache paths.
    let mut descriptors: Vec<SourceDescriptor> = Vec::with_capacity(names.len());
    for name in names {
        let d = registry::describe(name)?;
        if !descriptors.iter().any(|seen| seen.name == d.name) {
            descriptors.push(d);
        }
    }
    Ok(descriptors)
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_build(config: &AppConfig, sources: &[SourceDescriptor]) -> Result<()> {
    let pipeline = Pipeline::from_config(config)?;

    info!(
        sources = sources.len(),
        host = %config.search.host,
        "building indexes"
    );

    let names: Vec<SourceName> = sources.iter().map(|d| d.name).collect();
    let reporter = CliProgress::new(&names);
    let outcomes = pipeline.build_all(sources, &reporter).await;

    println!();
    for outcome in &outcomes {
        match &outcome.result {
            Ok(report) if report.skipped && report.possibly_partial => println!(
                "  {:<10} skipped   index exists but may be partial (purge to rebuild)",
                outcome.source
            ),
            Ok(report) if report.skipped => {
                println!("  {:<10} skipped   index exists", outcome.source)
            }
            Ok(report) => println!(
                "  {:<10} built     {} documents in {:.1}s",
                outcome.source,
                report.documents,
                report.elapsed.as_secs_f64()
            ),
            Err(message) => println!("  {:<10} FAILED    {message}", outcome.source),
        }
    }
    println!();

    let failed = outcomes.iter().filter(|o| !o.is_success()).count();
    if failed > 0 {
        return Err(eyre!("{failed} of {} source(s) failed", outcomes.len()));
    }
    Ok(())
}

async fn cmd_purge(config: &AppConfig, sources: &[SourceDescriptor]) -> Result<()> {
    let pipeline = Pipeline::from_config(config)?;
    let reports = pipeline.purge_all(sources).await;

    println!();
    let mut failed = 0;
    for (source, report) in &reports {
        if report.is_clean() {
            println!(
                "  {source:<10} purged    {} path(s) removed",
                report.deleted_paths.len()
            );
        } else {
            failed += 1;
            println!("  {source:<10} INCOMPLETE");
            for error in &report.errors {
                println!("               {error}");
            }
        }
    }
    println!();

    if failed > 0 {
        return Err(eyre!("{failed} of {} purge(s) incomplete", reports.len()));
    }
    Ok(())
}

async fn cmd_list(config: &AppConfig) -> Result<()> {
    let pipeline = Pipeline::from_config(config)?;
    let sources = registry::all();
    let statuses = pipeline.status(&sources).await;

    println!();
    for (d, status) in sources.iter().zip(&statuses) {
        let origin = if d.is_remote() { "remote" } else { "local" };
        let index = match &status.index_exists {
            Ok(true) if status.built => "built".to_string(),
            Ok(true) => "exists (no marker)".to_string(),
            Ok(false) => "absent".to_string(),
            Err(e) => format!("unknown ({e})"),
        };
        let cached: Vec<String> = status.cached.iter().map(|s| s.to_string()).collect();
        let cached = if cached.is_empty() {
            "-".to_string()
        } else {
            cached.join(", ")
        };
        println!(
            "  {:<10} {origin:<7} index {:<10} {index:<20} cached: {cached}",
            status.source, status.index
        );
    }
    println!();
    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(config: &AppConfig) -> Result<()> {
    let toml_str = toml::to_string_pretty(config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// One indicatif spinner per source.
struct CliProgress {
    _multi: MultiProgress,
    bars: HashMap<SourceName, ProgressBar>,
}

impl CliProgress {
    fn new(sources: &[SourceName]) -> Self {
        let multi = MultiProgress::new();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:<10} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "✓"]);

        let bars = sources
            .iter()
            .map(|&source| {
                let bar = multi.add(ProgressBar::new_spinner());
                bar.set_style(style.clone());
                bar.set_prefix(source.to_string());
                bar.set_message("waiting");
                bar.enable_steady_tick(Duration::from_millis(80));
                (source, bar)
            })
            .collect();

        Self {
            _multi: multi,
            bars,
        }
    }
}

impl ProgressReporter for CliProgress {
    fn stage(&self, source: SourceName, stage: &str) {
        if let Some(bar) = self.bars.get(&source) {
            bar.set_message(stage.to_string());
        }
    }

    fn done(&self, outcome: &SourceOutcome) {
        if let Some(bar) = self.bars.get(&outcome.source) {
            let message = if outcome.is_success() { "done" } else { "failed" };
            bar.finish_with_message(message);
        }
    }
}
