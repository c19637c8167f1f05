//! `autocat-store`: SQLite persistence for the vehicle catalog.
//!
//! [`SqliteCatalog`] owns the connection and hands out transactions;
//! [`SqliteRepository`] implements the engine's repository trait on top of
//! one open transaction.

mod repository;

use std::path::Path;
use std::time::Duration;

use rusqlite::Connection;
use serde::Serialize;

use autocat_recon::error::{CatalogError, Result};
use autocat_recon::repository::{CatalogRepository, CatalogStore};

pub use repository::SqliteRepository;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS brands (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    brand_key TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS models (
    id INTEGER PRIMARY KEY,
    brand_id INTEGER NOT NULL REFERENCES brands(id),
    name TEXT NOT NULL,
    UNIQUE (brand_id, name)
);

CREATE TABLE IF NOT EXISTS configurations (
    id INTEGER PRIMARY KEY,
    model_id INTEGER NOT NULL REFERENCES models(id),
    name TEXT NOT NULL,
    brand_key TEXT NOT NULL,
    model_tokens TEXT NOT NULL DEFAULT '[]',  -- JSON array
    tokens TEXT NOT NULL DEFAULT '[]',        -- JSON array
    token_key TEXT,                           -- NULL for rows never tokenized
    UNIQUE (model_id, name)
);

CREATE INDEX IF NOT EXISTS idx_configurations_brand_key
    ON configurations (brand_key);

CREATE UNIQUE INDEX IF NOT EXISTS idx_configurations_token_key
    ON configurations (brand_key, token_key)
    WHERE token_key IS NOT NULL;

CREATE TABLE IF NOT EXISTS external_links (
    company_id INTEGER NOT NULL,
    external_id TEXT NOT NULL,
    configuration_id INTEGER NOT NULL REFERENCES configurations(id),
    PRIMARY KEY (company_id, external_id)
);

CREATE TABLE IF NOT EXISTS meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

const SCHEMA_VERSION: &str = "1";

/// How long a write waits on a lock held by another connection.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Row counts per table, as reported by `autocat stats`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CatalogCounts {
    pub brands: u64,
    pub models: u64,
    pub configurations: u64,
    /// Configurations with no token data yet.
    pub untokenized: u64,
    pub external_links: u64,
}

pub struct SqliteCatalog {
    conn: Connection,
}

impl SqliteCatalog {
    /// Open (or create) a catalog database at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).map_err(storage_err)?;
        log::debug!("opened catalog database {}", path.display());
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(storage_err)?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.busy_timeout(BUSY_TIMEOUT).map_err(storage_err)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;").map_err(storage_err)?;
        conn.execute_batch(SCHEMA).map_err(storage_err)?;
        conn.execute(
            "INSERT OR IGNORE INTO meta (key, value) VALUES ('schema_version', ?1)",
            [SCHEMA_VERSION],
        )
        .map_err(storage_err)?;
        Ok(Self { conn })
    }

    /// Raw connection, for inspection outside a transaction.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn counts(&self) -> Result<CatalogCounts> {
        let count = |sql: &str| -> Result<u64> {
            let n: i64 = self.conn.query_row(sql, [], |row| row.get(0)).map_err(storage_err)?;
            Ok(n.max(0) as u64)
        };
        Ok(CatalogCounts {
            brands: count("SELECT COUNT(*) FROM brands")?,
            models: count("SELECT COUNT(*) FROM models")?,
            configurations: count("SELECT COUNT(*) FROM configurations")?,
            untokenized: count("SELECT COUNT(*) FROM configurations WHERE token_key IS NULL OR token_key = ''")?,
            external_links: count("SELECT COUNT(*) FROM external_links")?,
        })
    }
}

impl CatalogStore for SqliteCatalog {
    fn transaction<T, F>(&mut self, f: F) -> Result<T>
    where
        F: FnOnce(&mut dyn CatalogRepository) -> Result<T>,
    {
        let tx = self.conn.transaction().map_err(storage_err)?;
        let result = {
            let mut repo = SqliteRepository::new(&tx);
            f(&mut repo)
        };

        match result {
            Ok(value) => {
                tx.commit().map_err(storage_err)?;
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback) = tx.rollback() {
                    log::error!("rollback failed after '{e}': {rollback}");
                }
                Err(e)
            }
        }
    }
}

/// Map a SQLite error onto the engine's error type. Constraint failures keep
/// their own variant so callers can tell them from I/O trouble.
pub(crate) fn storage_err(e: rusqlite::Error) -> CatalogError {
    match &e {
        rusqlite::Error::SqliteFailure(err, _) if err.code == rusqlite::ErrorCode::ConstraintViolation => {
            CatalogError::Constraint(e.to_string())
        }
        _ => CatalogError::Storage(e.to_string()),
    }
}
