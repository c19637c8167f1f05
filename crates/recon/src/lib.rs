//! `autocat-recon`: Vehicle catalog reconciliation engine.
//!
//! Pure engine crate: normalizes and tokenizes vendor brand/model/trim names,
//! resolves them onto canonical configurations, and writes external-id links.
//! Persistence goes through [`CatalogRepository`]; no SQL lives here.

pub mod cache;
pub mod config;
pub mod error;
pub mod link;
pub mod mapper;
pub mod matcher;
pub mod memory;
pub mod model;
pub mod normalize;
pub mod provider;
pub mod repository;
pub mod sync;
pub mod tokenize;
pub mod upsert;

pub use config::{ReconcileOptions, RelinkPolicy, SourceConfig, SourceMode, SyncConfig};
pub use error::{CatalogError, Result};
pub use link::{link_catalog, LinkStats};
pub use mapper::{map_one, MapOutcome, ReconcileRun, Resolution};
pub use memory::MemoryCatalog;
pub use model::{CatalogRecord, CatalogTree, ConfigurationId, ExternalLink, LinkWrite};
pub use provider::{CatalogProvider, JsonFileProvider};
pub use repository::{CatalogRepository, CatalogStore};
pub use sync::{run_sync, sync_source, SourceOutcome, SourceReport, SyncReport};
pub use tokenize::{tokenize, ConfigTokens};
pub use upsert::{upsert_catalog, upsert_tree, UpsertOptions, UpsertStats};
