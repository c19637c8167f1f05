use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

macro_rules! row_id {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

row_id!(BrandId);
row_id!(ModelId);
row_id!(ConfigurationId);

// ---------------------------------------------------------------------------
// Input tree (what a catalog provider delivers)
// ---------------------------------------------------------------------------

/// A full vendor catalog: brands → models → configurations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogTree {
    #[serde(default)]
    pub brands: Vec<BrandNode>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrandNode {
    #[serde(alias = "brandName")]
    pub name: String,
    #[serde(default)]
    pub models: Vec<ModelNode>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelNode {
    #[serde(alias = "modelName")]
    pub name: String,
    #[serde(default)]
    pub configs: Vec<ConfigNode>,
}

/// One vendor configuration record.
///
/// `price` and `meta` are carried through untouched; prices are never
/// synchronized into the catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigNode {
    pub name: String,
    #[serde(default, alias = "externalId", deserialize_with = "external_id_lenient")]
    pub external_id: Option<String>,
    #[serde(default, alias = "companyId")]
    pub company_id: Option<i64>,
    #[serde(default)]
    pub price: Option<i64>,
    #[serde(default)]
    pub meta: serde_json::Map<String, serde_json::Value>,
}

impl CatalogTree {
    /// Number of configuration records across all brands and models.
    pub fn record_count(&self) -> usize {
        self.brands
            .iter()
            .flat_map(|b| &b.models)
            .map(|m| m.configs.len())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.record_count() == 0
    }

    /// Fill `company_id` on every record that lacks one.
    pub fn apply_default_company(&mut self, company_id: i64) {
        for cfg in self
            .brands
            .iter_mut()
            .flat_map(|b| b.models.iter_mut())
            .flat_map(|m| m.configs.iter_mut())
        {
            if cfg.company_id.is_none() {
                cfg.company_id = Some(company_id);
            }
        }
    }

    /// Flatten into typed per-record candidates, tree order preserved.
    pub fn records(&self) -> impl Iterator<Item = CatalogRecord<'_>> {
        self.brands.iter().flat_map(|brand| {
            brand.models.iter().flat_map(move |model| {
                model
                    .configs
                    .iter()
                    .map(move |cfg| cfg.record(&brand.name, &model.name))
            })
        })
    }
}

impl ConfigNode {
    /// View this node as a typed record under the given brand and model.
    pub fn record<'a>(&'a self, brand: &'a str, model: &'a str) -> CatalogRecord<'a> {
        CatalogRecord {
            brand,
            model,
            trim: &self.name,
            company_id: self.company_id,
            external_id: self.external_id.as_deref(),
        }
    }
}

/// Vendors disagree on whether ids are strings or numbers; accept both.
fn external_id_lenient<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde_json::Value;

    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(other) => {
            return Err(serde::de::Error::custom(format!(
                "external_id must be a string or number, got {other}"
            )))
        }
    })
}

// ---------------------------------------------------------------------------
// Single record (input of map_one)
// ---------------------------------------------------------------------------

/// A typed record as the mapper consumes it.
#[derive(Debug, Clone, Copy)]
pub struct CatalogRecord<'a> {
    pub brand: &'a str,
    pub model: &'a str,
    pub trim: &'a str,
    pub company_id: Option<i64>,
    pub external_id: Option<&'a str>,
}

impl<'a> CatalogRecord<'a> {
    pub fn new(brand: &'a str, model: &'a str, trim: &'a str) -> Self {
        Self {
            brand,
            model,
            trim,
            company_id: None,
            external_id: None,
        }
    }

    pub fn linked(mut self, company_id: i64, external_id: &'a str) -> Self {
        self.company_id = Some(company_id);
        self.external_id = Some(external_id);
        self
    }

    /// The (company, external id) pair a link would be written for, if the
    /// record carries both and the external id is not blank.
    pub fn link_key(&self) -> Option<(i64, &'a str)> {
        let company_id = self.company_id?;
        let external_id = self.external_id.map(str::trim).filter(|s| !s.is_empty())?;
        Some((company_id, external_id))
    }

    /// Vendor-supplied ids must be positive when present.
    pub fn has_invalid_company(&self) -> bool {
        matches!(self.company_id, Some(id) if id <= 0)
    }
}

// ---------------------------------------------------------------------------
// Stored rows
// ---------------------------------------------------------------------------

/// What the matcher needs from an existing configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub id: ConfigurationId,
    pub tokens: Vec<String>,
    pub token_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredConfiguration {
    pub id: ConfigurationId,
    pub model_id: ModelId,
    pub name: String,
    pub brand_key: String,
    pub model_tokens: Vec<String>,
    pub tokens: Vec<String>,
    pub token_key: Option<String>,
}

impl StoredConfiguration {
    /// Legacy rows were written before tokenization existed.
    pub fn has_tokens(&self) -> bool {
        self.token_key.as_deref().is_some_and(|k| !k.is_empty()) || !self.tokens.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewConfiguration {
    pub model_id: ModelId,
    pub name: String,
    pub brand_key: String,
    pub model_tokens: Vec<String>,
    pub tokens: Vec<String>,
    pub token_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExternalLink {
    pub company_id: i64,
    pub external_id: String,
    pub configuration_id: ConfigurationId,
}

/// Result of writing one link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkWrite {
    Created,
    /// Repointed to another configuration of the same brand.
    Updated,
    /// Repointed to a configuration of a different brand.
    Relinked,
    Unchanged,
    /// An existing link to another brand was left in place.
    Kept,
}

impl fmt::Display for LinkWrite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Updated => write!(f, "updated"),
            Self::Relinked => write!(f, "relinked"),
            Self::Unchanged => write!(f, "unchanged"),
            Self::Kept => write!(f, "kept"),
        }
    }
}
