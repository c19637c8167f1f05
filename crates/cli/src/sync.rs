//! `autocat sync`: config-driven catalog sync.

use std::path::{Path, PathBuf};

use clap::Subcommand;

use autocat_recon::sync::{run_sync, SourceOutcome, SourceReport};
use autocat_recon::SyncConfig;
use autocat_store::SqliteCatalog;

use crate::exit_codes::{
    catalog_exit_code, EXIT_IO, EXIT_SYNC_INVALID_CONFIG, EXIT_SYNC_SOURCE_FAILED, EXIT_SYNC_UNKNOWN_SOURCE,
};
use crate::CliError;

#[derive(Subcommand)]
pub enum SyncCommands {
    /// Run every source of a sync config against its database
    #[command(after_help = "\
Examples:
  autocat sync run nightly.sync.toml
  autocat sync run nightly.sync.toml --only gross
  autocat sync run nightly.sync.toml --json
  autocat sync run nightly.sync.toml --output report.json")]
    Run {
        /// Path to the .sync.toml config file
        config: PathBuf,

        /// Run only the named source
        #[arg(long, value_name = "SOURCE")]
        only: Option<String>,

        /// Output JSON report to stdout instead of human summary
        #[arg(long)]
        json: bool,

        /// Write JSON report to file
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Validate a sync config without running
    #[command(after_help = "\
Examples:
  autocat sync validate nightly.sync.toml")]
    Validate {
        /// Path to the .sync.toml config file
        config: PathBuf,
    },
}

pub fn cmd_sync(cmd: SyncCommands) -> Result<(), CliError> {
    match cmd {
        SyncCommands::Run { config, only, json, output } => cmd_sync_run(config, only, json, output),
        SyncCommands::Validate { config } => cmd_sync_validate(config),
    }
}

fn sync_err(code: u8, msg: impl Into<String>) -> CliError {
    CliError { code, message: msg.into(), hint: None }
}

fn load_config(config_path: &Path) -> Result<SyncConfig, CliError> {
    let config_str = std::fs::read_to_string(config_path)
        .map_err(|e| sync_err(EXIT_IO, format!("cannot read config: {e}")))?;
    SyncConfig::from_toml(&config_str).map_err(|e| sync_err(EXIT_SYNC_INVALID_CONFIG, e.to_string()))
}

fn cmd_sync_run(
    config_path: PathBuf,
    only: Option<String>,
    json_output: bool,
    output_file: Option<PathBuf>,
) -> Result<(), CliError> {
    let config = load_config(&config_path)?;

    if let Some(ref name) = only {
        if config.source(name).is_none() {
            let known: Vec<&str> = config.sources.iter().map(|s| s.name.as_str()).collect();
            return Err(sync_err(EXIT_SYNC_UNKNOWN_SOURCE, format!("unknown source '{name}'"))
                .with_hint(format!("configured sources: {}", known.join(", "))));
        }
    }

    // Database and source files resolve relative to the config file
    let base_dir = config_path.parent().unwrap_or_else(|| Path::new("."));
    let db_path = base_dir.join(&config.database);
    let mut catalog = SqliteCatalog::open(&db_path).map_err(|e| {
        sync_err(catalog_exit_code(&e), e.to_string()).with_hint(format!("database: {}", db_path.display()))
    })?;

    let report = run_sync(&mut catalog, &config, base_dir, only.as_deref());

    let json_str = serde_json::to_string_pretty(&report)
        .map_err(|e| sync_err(EXIT_IO, format!("JSON serialization error: {e}")))?;

    if let Some(ref path) = output_file {
        std::fs::write(path, &json_str).map_err(|e| sync_err(EXIT_IO, format!("cannot write output: {e}")))?;
        eprintln!("wrote {}", path.display());
    }

    if json_output {
        println!("{json_str}");
    }

    // Human summary to stderr
    for source in &report.sources {
        eprintln!("{}", summary_line(source));
    }

    let failed = report.failed();
    if failed > 0 {
        return Err(sync_err(
            EXIT_SYNC_SOURCE_FAILED,
            format!("{failed} of {} source(s) failed", report.sources.len()),
        ));
    }

    Ok(())
}

fn summary_line(source: &SourceReport) -> String {
    match &source.outcome {
        SourceOutcome::Upserted { stats } => format!(
            "{} (upsert): {} records, {} brands / {} models / {} configurations created, {} tokens updated, {} links, {} dropped",
            source.name,
            source.records,
            stats.brands_created,
            stats.models_created,
            stats.configurations_created,
            stats.tokens_updated,
            stats.links_written,
            stats.dropped,
        ),
        SourceOutcome::Linked { stats } => format!(
            "{} (link): {} records, {} linked, {} exact, {} fuzzy, {} created, {} unlinkable, {} dropped",
            source.name,
            stats.total,
            stats.linked,
            stats.exact_matches,
            stats.fuzzy_matches,
            stats.configurations_created,
            stats.unlinkable,
            stats.dropped,
        ),
        SourceOutcome::Failed { error } => format!("{} ({}): FAILED: {error}", source.name, source.mode),
    }
}

fn cmd_sync_validate(config_path: PathBuf) -> Result<(), CliError> {
    let config = load_config(&config_path)?;

    eprintln!(
        "valid: \"{}\" ({} source(s), threshold {}, relink {})",
        config.name,
        config.sources.len(),
        config.reconcile.threshold,
        config.reconcile.relink,
    );

    let base_dir = config_path.parent().unwrap_or_else(|| Path::new("."));
    for source in &config.sources {
        let path = base_dir.join(&source.file);
        let marker = if path.exists() { "" } else { " (missing)" };
        eprintln!("  {} [{}] {}{marker}", source.name, source.mode, path.display());
    }

    Ok(())
}
