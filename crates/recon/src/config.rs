use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::CatalogError;
use crate::matcher::DEFAULT_THRESHOLD;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// A `.sync.toml` file: one database, one or more catalog sources.
#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
    pub name: String,
    /// SQLite database path, relative to the config file.
    pub database: String,
    #[serde(default)]
    pub reconcile: ReconcileOptions,
    pub sources: Vec<SourceConfig>,
}

// ---------------------------------------------------------------------------
// Reconcile options
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct ReconcileOptions {
    /// Minimum fuzzy score (0-100) for reusing an existing configuration.
    #[serde(default = "default_threshold")]
    pub threshold: u32,
    #[serde(default)]
    pub relink: RelinkPolicy,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            relink: RelinkPolicy::default(),
        }
    }
}

fn default_threshold() -> u32 {
    DEFAULT_THRESHOLD
}

/// What to do when a vendor external id, already linked to a configuration
/// of one brand, resolves to a configuration of a different brand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RelinkPolicy {
    /// Repoint the link and log a warning.
    #[default]
    Relink,
    /// Leave the existing link in place.
    Keep,
    /// Fail the run; the transaction rolls back.
    Reject,
}

impl std::fmt::Display for RelinkPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Relink => write!(f, "relink"),
            Self::Keep => write!(f, "keep"),
            Self::Reject => write!(f, "reject"),
        }
    }
}

impl std::str::FromStr for RelinkPolicy {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "relink" => Ok(Self::Relink),
            "keep" => Ok(Self::Keep),
            "reject" => Ok(Self::Reject),
            other => Err(CatalogError::Config(format!(
                "unknown relink policy '{other}' (expected relink, keep or reject)"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Sources
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    pub name: String,
    /// Catalog tree JSON, relative to the config file.
    pub file: String,
    #[serde(default)]
    pub mode: SourceMode,
    /// Regenerate token data of every existing configuration (upsert mode).
    #[serde(default)]
    pub force_tokens: bool,
    /// Applied to records that carry no company id.
    #[serde(default)]
    pub company_id: Option<i64>,
}

/// How a source's tree is ingested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceMode {
    /// Bulk load by exact display name, with token backfill.
    #[default]
    Upsert,
    /// Resolve record by record through exact and fuzzy matching.
    Link,
}

impl std::fmt::Display for SourceMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Upsert => write!(f, "upsert"),
            Self::Link => write!(f, "link"),
        }
    }
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl SyncConfig {
    pub fn from_toml(input: &str) -> Result<Self, CatalogError> {
        let config: SyncConfig =
            toml::from_str(input).map_err(|e| CatalogError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), CatalogError> {
        if self.name.trim().is_empty() {
            return Err(CatalogError::Config("name must not be empty".into()));
        }
        if self.database.trim().is_empty() {
            return Err(CatalogError::Config("database must not be empty".into()));
        }
        self.reconcile.validate()?;

        if self.sources.is_empty() {
            return Err(CatalogError::Config("at least 1 source is required".into()));
        }

        let mut seen = HashSet::new();
        for source in &self.sources {
            if source.name.trim().is_empty() {
                return Err(CatalogError::Config("source name must not be empty".into()));
            }
            if !seen.insert(source.name.as_str()) {
                return Err(CatalogError::Config(format!(
                    "duplicate source name '{}'",
                    source.name
                )));
            }
            if source.file.trim().is_empty() {
                return Err(CatalogError::Config(format!(
                    "source '{}': file must not be empty",
                    source.name
                )));
            }
            if let Some(id) = source.company_id {
                if id <= 0 {
                    return Err(CatalogError::Config(format!(
                        "source '{}': company_id must be positive, got {id}",
                        source.name
                    )));
                }
            }
            if source.force_tokens && source.mode == SourceMode::Link {
                log::warn!(
                    "source '{}': force_tokens has no effect in link mode",
                    source.name
                );
            }
        }

        Ok(())
    }

    pub fn source(&self, name: &str) -> Option<&SourceConfig> {
        self.sources.iter().find(|s| s.name == name)
    }
}

impl ReconcileOptions {
    pub fn validate(&self) -> Result<(), CatalogError> {
        if self.threshold > 100 {
            return Err(CatalogError::Config(format!(
                "threshold must be between 0 and 100, got {}",
                self.threshold
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r#"
name = "nightly"
database = "catalog.db"

[reconcile]
threshold = 90
relink = "reject"

[[sources]]
name = "gross"
file = "gross.json"
mode = "upsert"
force_tokens = true

[[sources]]
name = "neo"
file = "neo.json"
mode = "link"
company_id = 6
"#;

    #[test]
    fn parse_valid() {
        let config = SyncConfig::from_toml(VALID).unwrap();
        assert_eq!(config.name, "nightly");
        assert_eq!(config.reconcile.threshold, 90);
        assert_eq!(config.reconcile.relink, RelinkPolicy::Reject);
        assert_eq!(config.sources.len(), 2);
        assert!(config.sources[0].force_tokens);
        assert_eq!(config.sources[1].mode, SourceMode::Link);
        assert_eq!(config.source("neo").unwrap().company_id, Some(6));
    }

    #[test]
    fn defaults_apply() {
        let input = r#"
name = "minimal"
database = "c.db"

[[sources]]
name = "a"
file = "a.json"
"#;
        let config = SyncConfig::from_toml(input).unwrap();
        assert_eq!(config.reconcile, ReconcileOptions::default());
        assert_eq!(config.reconcile.threshold, 85);
        assert_eq!(config.reconcile.relink, RelinkPolicy::Relink);
        assert_eq!(config.sources[0].mode, SourceMode::Upsert);
        assert!(!config.sources[0].force_tokens);
    }

    #[test]
    fn reject_threshold_over_100() {
        let input = r#"
name = "bad"
database = "c.db"
[reconcile]
threshold = 101
[[sources]]
name = "a"
file = "a.json"
"#;
        let err = SyncConfig::from_toml(input).unwrap_err();
        assert!(err.to_string().contains("between 0 and 100"));
    }

    #[test]
    fn reject_duplicate_source() {
        let input = r#"
name = "bad"
database = "c.db"
[[sources]]
name = "a"
file = "a.json"
[[sources]]
name = "a"
file = "b.json"
"#;
        let err = SyncConfig::from_toml(input).unwrap_err();
        assert!(err.to_string().contains("duplicate source name 'a'"));
    }

    #[test]
    fn reject_non_positive_company() {
        let input = r#"
name = "bad"
database = "c.db"
[[sources]]
name = "a"
file = "a.json"
company_id = 0
"#;
        let err = SyncConfig::from_toml(input).unwrap_err();
        assert!(err.to_string().contains("company_id must be positive"));
    }

    #[test]
    fn reject_no_sources() {
        let input = r#"
name = "bad"
database = "c.db"
sources = []
"#;
        let err = SyncConfig::from_toml(input).unwrap_err();
        assert!(err.to_string().contains("at least 1 source"));
    }

    #[test]
    fn reject_unknown_mode() {
        let input = r#"
name = "bad"
database = "c.db"
[[sources]]
name = "a"
file = "a.json"
mode = "stream"
"#;
        assert!(SyncConfig::from_toml(input).is_err());
    }

    #[test]
    fn relink_policy_from_str() {
        assert_eq!("keep".parse::<RelinkPolicy>().unwrap(), RelinkPolicy::Keep);
        assert!("move".parse::<RelinkPolicy>().is_err());
    }
}
