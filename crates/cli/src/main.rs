// autocat CLI - vehicle catalog sync and reconciliation

mod exit_codes;
mod sync;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use autocat_recon::{
    link_catalog, tokenize, upsert_catalog, CatalogError, CatalogProvider, JsonFileProvider, ReconcileOptions,
    RelinkPolicy, UpsertOptions,
};
use autocat_store::SqliteCatalog;

use exit_codes::{catalog_exit_code, EXIT_IO, EXIT_SUCCESS, EXIT_USAGE};

#[derive(Parser)]
#[command(name = "autocat")]
#[command(about = "Vehicle catalog sync: reconcile vendor brand/model/trim feeds into one catalog")]
#[command(long_version = long_version())]
#[command(version)]
struct Cli {
    /// Log debug detail (RUST_LOG takes precedence)
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run or validate a sync config
    #[command(subcommand)]
    Sync(sync::SyncCommands),

    /// Load a catalog tree by exact names, backfilling token data
    #[command(after_help = "\
Examples:
  autocat upsert gross.json --db catalog.db
  autocat upsert gross.json --db catalog.db --company-id 8
  autocat upsert gross.json --db catalog.db --force-tokens --json")]
    Upsert {
        /// Catalog tree JSON file
        tree: PathBuf,

        /// SQLite catalog database (created if missing)
        #[arg(long, env = "AUTOCAT_DB")]
        db: PathBuf,

        /// Regenerate token data of every existing configuration
        #[arg(long)]
        force_tokens: bool,

        /// Company id for records that carry none
        #[arg(long, value_parser = clap::value_parser!(i64).range(1..))]
        company_id: Option<i64>,

        /// What to do when an external id moves to another brand
        #[arg(long, default_value_t = RelinkPolicy::Relink)]
        relink: RelinkPolicy,

        /// Print stats as JSON to stdout
        #[arg(long)]
        json: bool,
    },

    /// Resolve every record of a catalog tree through exact and fuzzy matching
    #[command(after_help = "\
Examples:
  autocat link neo.json --db catalog.db
  autocat link neo.json --db catalog.db --threshold 90 --relink keep
  autocat link neo.json --db catalog.db --company-id 6 --json")]
    Link {
        /// Catalog tree JSON file
        tree: PathBuf,

        /// SQLite catalog database (created if missing)
        #[arg(long, env = "AUTOCAT_DB")]
        db: PathBuf,

        /// Minimum fuzzy score (0-100) to reuse an existing configuration
        #[arg(long, default_value_t = 85, value_parser = clap::value_parser!(u32).range(0..=100))]
        threshold: u32,

        /// What to do when an external id moves to another brand
        #[arg(long, default_value_t = RelinkPolicy::Relink)]
        relink: RelinkPolicy,

        /// Company id for records that carry none
        #[arg(long, value_parser = clap::value_parser!(i64).range(1..))]
        company_id: Option<i64>,

        /// Print stats as JSON to stdout
        #[arg(long)]
        json: bool,
    },

    /// Print the derived keys of one brand/model/trim as JSON
    #[command(after_help = "\
Examples:
  autocat tokenize Toyota Camry 'Comfort 2.5 AT'
  autocat tokenize 'Mercedes-Benz' E-Class Avantgarde")]
    Tokenize {
        brand: String,
        model: String,
        trim: String,
    },

    /// Row counts of a catalog database
    Stats {
        /// SQLite catalog database
        #[arg(long, env = "AUTOCAT_DB")]
        db: PathBuf,

        /// Print counts as JSON to stdout
        #[arg(long)]
        json: bool,
    },
}

fn long_version() -> &'static str {
    concat!(
        env!("CARGO_PKG_VERSION"),
        " (", env!("AUTOCAT_COMMIT"), ")",
        "\nengine:  autocat-recon ", env!("CARGO_PKG_VERSION"),
        "\ntarget:  ", env!("AUTOCAT_TARGET"),
    )
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    // Also installs the `log` bridge, so engine records reach the subscriber.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Sync(cmd) => sync::cmd_sync(cmd),
        Commands::Upsert { tree, db, force_tokens, company_id, relink, json } => {
            cmd_upsert(tree, db, force_tokens, company_id, relink, json)
        }
        Commands::Link { tree, db, threshold, relink, company_id, json } => {
            cmd_link(tree, db, threshold, relink, company_id, json)
        }
        Commands::Tokenize { brand, model, trim } => cmd_tokenize(&brand, &model, &trim),
        Commands::Stats { db, json } => cmd_stats(db, json),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

// ============================================================================
// Errors
// ============================================================================

pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn args(msg: impl Into<String>) -> Self {
        Self { code: EXIT_USAGE, message: msg.into(), hint: None }
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self { code: EXIT_IO, message: msg.into(), hint: None }
    }

    /// Create error from a catalog error with its registered exit code.
    pub fn catalog(err: CatalogError) -> Self {
        let hint = match &err {
            CatalogError::LinkConflict { .. } => {
                Some("rerun with --relink keep or --relink relink to accept the move".to_string())
            }
            CatalogError::Constraint(_) => Some("nothing was written; the run was rolled back".to_string()),
            _ => None,
        };
        Self { code: catalog_exit_code(&err), message: err.to_string(), hint }
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

// ============================================================================
// Shared helpers
// ============================================================================

fn open_catalog(db: &Path) -> Result<SqliteCatalog, CliError> {
    SqliteCatalog::open(db).map_err(|e| CliError::catalog(e).with_hint(format!("database: {}", db.display())))
}

fn fetch_tree(path: &Path, company_id: Option<i64>) -> Result<autocat_recon::CatalogTree, CliError> {
    if !path.exists() {
        return Err(CliError::args(format!("no such file: {}", path.display())));
    }
    let name = path.file_stem().and_then(|s| s.to_str()).unwrap_or("tree");
    JsonFileProvider::new(name, path)
        .with_default_company(company_id)
        .fetch_catalog()
        .map_err(CliError::catalog)
}

fn print_json<T: Serialize>(value: &T) -> Result<(), CliError> {
    let json = serde_json::to_string_pretty(value).map_err(|e| CliError::io(format!("JSON serialization error: {e}")))?;
    println!("{json}");
    Ok(())
}

#[derive(Serialize)]
struct CommandReport<'a, T: Serialize> {
    engine_version: &'static str,
    run_at: String,
    command: &'a str,
    input: String,
    stats: T,
}

impl<'a, T: Serialize> CommandReport<'a, T> {
    fn new(command: &'a str, input: &Path, stats: T) -> Self {
        Self {
            engine_version: env!("CARGO_PKG_VERSION"),
            run_at: chrono::Utc::now().to_rfc3339(),
            command,
            input: input.display().to_string(),
            stats,
        }
    }
}

// ============================================================================
// upsert
// ============================================================================

fn cmd_upsert(
    tree_path: PathBuf,
    db: PathBuf,
    force_tokens: bool,
    company_id: Option<i64>,
    relink: RelinkPolicy,
    json: bool,
) -> Result<(), CliError> {
    let tree = fetch_tree(&tree_path, company_id)?;
    let mut catalog = open_catalog(&db)?;

    let options = UpsertOptions { force_token_refresh: force_tokens, relink };
    let stats = upsert_catalog(&mut catalog, &tree, options).map_err(CliError::catalog)?;

    if json {
        print_json(&CommandReport::new("upsert", &tree_path, &stats))?;
    }

    eprintln!(
        "upsert: {} records, {} brands / {} models / {} configurations created, {} tokens updated ({} conflicts), {} links written, {} dropped",
        tree.record_count(),
        stats.brands_created,
        stats.models_created,
        stats.configurations_created,
        stats.tokens_updated,
        stats.token_conflicts,
        stats.links_written,
        stats.dropped,
    );
    Ok(())
}

// ============================================================================
// link
// ============================================================================

fn cmd_link(
    tree_path: PathBuf,
    db: PathBuf,
    threshold: u32,
    relink: RelinkPolicy,
    company_id: Option<i64>,
    json: bool,
) -> Result<(), CliError> {
    let tree = fetch_tree(&tree_path, company_id)?;
    let mut catalog = open_catalog(&db)?;

    let options = ReconcileOptions { threshold, relink };
    let stats = link_catalog(&mut catalog, &tree, options).map_err(CliError::catalog)?;

    if json {
        print_json(&CommandReport::new("link", &tree_path, &stats))?;
    }

    eprintln!(
        "link: {} records, {} linked ({} exact, {} fuzzy, {} created), {} unlinkable, {} dropped, {} relinked",
        stats.total,
        stats.linked,
        stats.exact_matches,
        stats.fuzzy_matches,
        stats.configurations_created,
        stats.unlinkable,
        stats.dropped,
        stats.relinked_across_brands,
    );
    Ok(())
}

// ============================================================================
// tokenize
// ============================================================================

fn cmd_tokenize(brand: &str, model: &str, trim: &str) -> Result<(), CliError> {
    let normalized = [brand, model, trim].map(autocat_recon::normalize::normalize_title);
    if normalized.iter().any(String::is_empty) {
        return Err(CliError::args("brand, model and trim must not be blank"));
    }
    let [brand, model, trim] = normalized;
    print_json(&tokenize(&brand, &model, &trim))
}

// ============================================================================
// stats
// ============================================================================

fn cmd_stats(db: PathBuf, json: bool) -> Result<(), CliError> {
    if !db.exists() {
        return Err(CliError::args(format!("no such database: {}", db.display())));
    }
    let catalog = open_catalog(&db)?;
    let counts = catalog.counts().map_err(CliError::catalog)?;

    if json {
        return print_json(&counts);
    }

    println!("brands:          {}", counts.brands);
    println!("models:          {}", counts.models);
    println!("configurations:  {}", counts.configurations);
    println!("  untokenized:   {}", counts.untokenized);
    println!("external links:  {}", counts.external_links);
    Ok(())
}
