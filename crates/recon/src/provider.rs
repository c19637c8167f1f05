//! Where catalog trees come from.

use std::fs;
use std::path::PathBuf;

use crate::error::{CatalogError, Result};
use crate::model::CatalogTree;

/// One vendor feed.
///
/// Implementations deliver a fully typed tree; shaping vendor payloads is
/// their job, never the engine's.
pub trait CatalogProvider {
    fn name(&self) -> &str;
    fn fetch_catalog(&self) -> Result<CatalogTree>;
}

/// Reads a tree from a JSON file on disk.
#[derive(Debug, Clone)]
pub struct JsonFileProvider {
    name: String,
    path: PathBuf,
    default_company: Option<i64>,
}

impl JsonFileProvider {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            default_company: None,
        }
    }

    /// Company id given to records that carry none.
    pub fn with_default_company(mut self, company_id: Option<i64>) -> Self {
        self.default_company = company_id;
        self
    }
}

impl CatalogProvider for JsonFileProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn fetch_catalog(&self) -> Result<CatalogTree> {
        let content = fs::read_to_string(&self.path).map_err(|e| CatalogError::Provider {
            name: self.name.clone(),
            message: format!("{}: {e}", self.path.display()),
        })?;
        let mut tree: CatalogTree = serde_json::from_str(&content).map_err(|e| CatalogError::Provider {
            name: self.name.clone(),
            message: format!("{}: invalid catalog JSON: {e}", self.path.display()),
        })?;
        if let Some(company_id) = self.default_company {
            tree.apply_default_company(company_id);
        }
        log::debug!(
            "provider '{}' read {} record(s) from {}",
            self.name,
            tree.record_count(),
            self.path.display()
        );
        Ok(tree)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn reads_tree_and_fills_company() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"brands":[{{"name":"Kia","models":[{{"name":"Rio","configs":[{{"name":"A"}},{{"name":"B","company_id":3}}]}}]}}]}}"#
        )
        .unwrap();

        let provider = JsonFileProvider::new("gross", file.path()).with_default_company(Some(8));
        assert_eq!(provider.name(), "gross");
        let tree = provider.fetch_catalog().unwrap();
        let companies: Vec<_> = tree.records().map(|r| r.company_id).collect();
        assert_eq!(companies, vec![Some(8), Some(3)]);
    }

    #[test]
    fn missing_file_is_provider_error() {
        let provider = JsonFileProvider::new("nope", "/definitely/not/here.json");
        let err = provider.fetch_catalog().unwrap_err();
        assert!(matches!(err, CatalogError::Provider { ref name, .. } if name == "nope"));
    }

    #[test]
    fn malformed_json_is_provider_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{\"brands\": [").unwrap();
        let err = JsonFileProvider::new("bad", file.path()).fetch_catalog().unwrap_err();
        assert!(err.to_string().contains("invalid catalog JSON"));
    }
}
