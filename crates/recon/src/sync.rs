//! Runs configured sources against one store.
//!
//! Each source is fetched through its [`CatalogProvider`] and ingested in its
//! own transaction, so a failing source never takes the others down with it.

use std::path::Path;

use serde::Serialize;

use crate::config::{ReconcileOptions, SourceConfig, SourceMode, SyncConfig};
use crate::error::Result;
use crate::link::{link_catalog, LinkStats};
use crate::provider::{CatalogProvider, JsonFileProvider};
use crate::repository::CatalogStore;
use crate::upsert::{upsert_catalog, UpsertOptions, UpsertStats};

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub meta: SyncMeta,
    pub sources: Vec<SourceReport>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncMeta {
    pub config_name: String,
    pub engine_version: String,
    pub run_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SourceReport {
    pub name: String,
    pub mode: SourceMode,
    pub records: usize,
    #[serde(flatten)]
    pub outcome: SourceOutcome,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SourceOutcome {
    Upserted { stats: UpsertStats },
    Linked { stats: LinkStats },
    Failed { error: String },
}

impl SourceReport {
    pub fn is_failed(&self) -> bool {
        matches!(self.outcome, SourceOutcome::Failed { .. })
    }
}

impl SyncReport {
    pub fn failed(&self) -> usize {
        self.sources.iter().filter(|s| s.is_failed()).count()
    }
}

// ---------------------------------------------------------------------------
// Driver
// ---------------------------------------------------------------------------

/// Fetch one provider's tree and ingest it in `mode`.
///
/// An empty tree is not an error: the run reports zero counts.
pub fn sync_source<S: CatalogStore>(
    store: &mut S,
    provider: &dyn CatalogProvider,
    mode: SourceMode,
    options: ReconcileOptions,
    force_tokens: bool,
) -> Result<SourceReport> {
    let tree = provider.fetch_catalog()?;
    let records = tree.record_count();

    let outcome = match mode {
        SourceMode::Upsert => {
            let opts = UpsertOptions {
                force_token_refresh: force_tokens,
                relink: options.relink,
            };
            SourceOutcome::Upserted {
                stats: upsert_catalog(store, &tree, opts)?,
            }
        }
        SourceMode::Link => SourceOutcome::Linked {
            stats: link_catalog(store, &tree, options)?,
        },
    };

    Ok(SourceReport {
        name: provider.name().to_string(),
        mode,
        records,
        outcome,
    })
}

/// Run every source of `config` (or only `only`), resolving source files
/// relative to `base_dir`. Failures are logged and reported per source.
pub fn run_sync<S: CatalogStore>(
    store: &mut S,
    config: &SyncConfig,
    base_dir: &Path,
    only: Option<&str>,
) -> SyncReport {
    let mut sources = Vec::new();

    for source in config.sources.iter().filter(|s| only.map_or(true, |n| s.name == n)) {
        let provider = provider_for(source, base_dir);
        let report = match sync_source(store, &provider, source.mode, config.reconcile, source.force_tokens) {
            Ok(report) => {
                log_success(&report);
                report
            }
            Err(e) => {
                log::error!("source '{}' failed: {e}", source.name);
                SourceReport {
                    name: source.name.clone(),
                    mode: source.mode,
                    records: 0,
                    outcome: SourceOutcome::Failed { error: e.to_string() },
                }
            }
        };
        sources.push(report);
    }

    SyncReport {
        meta: SyncMeta {
            config_name: config.name.clone(),
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
            run_at: chrono::Utc::now().to_rfc3339(),
        },
        sources,
    }
}

fn provider_for(source: &SourceConfig, base_dir: &Path) -> JsonFileProvider {
    JsonFileProvider::new(&source.name, base_dir.join(&source.file)).with_default_company(source.company_id)
}

fn log_success(report: &SourceReport) {
    match &report.outcome {
        SourceOutcome::Upserted { stats } => log::info!(
            "source '{}' upserted {} record(s): {} brand(s), {} model(s), {} configuration(s) created, \
             {} token update(s), {} link(s) written, {} dropped",
            report.name,
            report.records,
            stats.brands_created,
            stats.models_created,
            stats.configurations_created,
            stats.tokens_updated,
            stats.links_written,
            stats.dropped
        ),
        SourceOutcome::Linked { stats } => log::info!(
            "source '{}' linked {}/{} record(s): {} exact, {} fuzzy, {} created, {} unlinkable, {} dropped",
            report.name,
            stats.linked,
            stats.total,
            stats.exact_matches,
            stats.fuzzy_matches,
            stats.configurations_created,
            stats.unlinkable,
            stats.dropped
        ),
        SourceOutcome::Failed { .. } => {}
    }
}
