use thiserror::Error;

use crate::model::ConfigurationId;

#[derive(Debug, Error)]
pub enum CatalogError {
    /// Backend failure (connectivity, SQL error, poisoned state).
    #[error("storage error: {0}")]
    Storage(String),
    /// A uniqueness or foreign-key rule was violated.
    #[error("constraint violation: {0}")]
    Constraint(String),
    /// A referenced row does not exist.
    #[error("not found: {0}")]
    NotFound(String),
    /// An external id already points at a configuration of another brand
    /// and the run is configured to reject such moves.
    #[error(
        "link conflict: company {company_id} external id '{external_id}' is linked to \
         configuration {existing} of another brand (wanted {requested})"
    )]
    LinkConflict {
        company_id: i64,
        external_id: String,
        existing: ConfigurationId,
        requested: ConfigurationId,
    },
    /// TOML parse / validation error.
    #[error("config error: {0}")]
    Config(String),
    /// A catalog provider could not deliver its tree.
    #[error("provider '{name}': {message}")]
    Provider { name: String, message: String },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CatalogError>;
