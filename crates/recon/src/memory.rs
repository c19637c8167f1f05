//! In-process catalog, used for dry runs and tests.
//!
//! Enforces the same uniqueness rules as the SQLite schema. Transactions
//! snapshot the whole state and restore it on error.

use crate::error::{CatalogError, Result};
use crate::model::{
    BrandId, Candidate, ConfigurationId, ExternalLink, ModelId, NewConfiguration,
    StoredConfiguration,
};
use crate::repository::{CatalogRepository, CatalogStore};
use crate::tokenize::ConfigTokens;

#[derive(Debug, Clone)]
struct BrandRow {
    id: BrandId,
    name: String,
    brand_key: String,
}

#[derive(Debug, Clone)]
struct ModelRow {
    id: ModelId,
    brand_id: BrandId,
    name: String,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryCatalog {
    brands: Vec<BrandRow>,
    models: Vec<ModelRow>,
    configs: Vec<StoredConfiguration>,
    links: Vec<ExternalLink>,
    next_id: i64,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    pub fn brand_count(&self) -> usize {
        self.brands.len()
    }

    pub fn model_count(&self) -> usize {
        self.models.len()
    }

    pub fn configuration_count(&self) -> usize {
        self.configs.len()
    }

    pub fn links(&self) -> &[ExternalLink] {
        &self.links
    }

    pub fn configuration(&self, id: ConfigurationId) -> Option<&StoredConfiguration> {
        self.configs.iter().find(|c| c.id == id)
    }

    pub fn brand_name(&self, id: BrandId) -> Option<&str> {
        self.brands.iter().find(|b| b.id == id).map(|b| b.name.as_str())
    }

    /// Insert a configuration without token data, as rows written before
    /// tokenization existed look.
    pub fn insert_legacy_configuration(
        &mut self,
        model_id: ModelId,
        name: &str,
        brand_key: &str,
    ) -> Result<ConfigurationId> {
        self.check_configuration_slot(model_id, name)?;
        let id = ConfigurationId(self.next_id());
        self.configs.push(StoredConfiguration {
            id,
            model_id,
            name: name.to_string(),
            brand_key: brand_key.to_string(),
            model_tokens: Vec::new(),
            tokens: Vec::new(),
            token_key: None,
        });
        Ok(id)
    }

    fn check_configuration_slot(&self, model_id: ModelId, name: &str) -> Result<()> {
        if !self.models.iter().any(|m| m.id == model_id) {
            return Err(CatalogError::Constraint(format!("model {model_id} does not exist")));
        }
        if self.configs.iter().any(|c| c.model_id == model_id && c.name == name) {
            return Err(CatalogError::Constraint(format!(
                "configuration '{name}' already exists in model {model_id}"
            )));
        }
        Ok(())
    }

    fn check_token_key_free(
        &self,
        brand_key: &str,
        token_key: &str,
        except: Option<ConfigurationId>,
    ) -> Result<()> {
        let taken = self.configs.iter().any(|c| {
            Some(c.id) != except
                && c.brand_key == brand_key
                && c.token_key.as_deref() == Some(token_key)
        });
        if taken {
            return Err(CatalogError::Constraint(format!(
                "token key '{token_key}' already exists in brand '{brand_key}'"
            )));
        }
        Ok(())
    }
}

impl CatalogRepository for MemoryCatalog {
    fn find_brand_by_name(&self, name: &str) -> Result<Option<BrandId>> {
        Ok(self.brands.iter().find(|b| b.name == name).map(|b| b.id))
    }

    fn find_brand_by_key(&self, brand_key: &str) -> Result<Option<BrandId>> {
        Ok(self.brands.iter().find(|b| b.brand_key == brand_key).map(|b| b.id))
    }

    fn create_brand(&mut self, name: &str, brand_key: &str) -> Result<BrandId> {
        if self.brands.iter().any(|b| b.name == name || b.brand_key == brand_key) {
            return Err(CatalogError::Constraint(format!("brand '{name}' already exists")));
        }
        let id = BrandId(self.next_id());
        self.brands.push(BrandRow {
            id,
            name: name.to_string(),
            brand_key: brand_key.to_string(),
        });
        Ok(id)
    }

    fn find_model(&self, brand: BrandId, name: &str) -> Result<Option<ModelId>> {
        Ok(self
            .models
            .iter()
            .find(|m| m.brand_id == brand && m.name == name)
            .map(|m| m.id))
    }

    fn create_model(&mut self, brand: BrandId, name: &str) -> Result<ModelId> {
        if !self.brands.iter().any(|b| b.id == brand) {
            return Err(CatalogError::Constraint(format!("brand {brand} does not exist")));
        }
        if self.models.iter().any(|m| m.brand_id == brand && m.name == name) {
            return Err(CatalogError::Constraint(format!(
                "model '{name}' already exists in brand {brand}"
            )));
        }
        let id = ModelId(self.next_id());
        self.models.push(ModelRow {
            id,
            brand_id: brand,
            name: name.to_string(),
        });
        Ok(id)
    }

    fn candidates_by_brand_key(&self, brand_key: &str) -> Result<Vec<Candidate>> {
        Ok(self
            .configs
            .iter()
            .filter(|c| c.brand_key == brand_key)
            .map(|c| Candidate {
                id: c.id,
                tokens: c.tokens.clone(),
                token_key: c.token_key.clone(),
            })
            .collect())
    }

    fn find_configuration(&self, model: ModelId, name: &str) -> Result<Option<StoredConfiguration>> {
        Ok(self
            .configs
            .iter()
            .find(|c| c.model_id == model && c.name == name)
            .cloned())
    }

    fn create_configuration(&mut self, cfg: &NewConfiguration) -> Result<ConfigurationId> {
        self.check_configuration_slot(cfg.model_id, &cfg.name)?;
        self.check_token_key_free(&cfg.brand_key, &cfg.token_key, None)?;
        let id = ConfigurationId(self.next_id());
        self.configs.push(StoredConfiguration {
            id,
            model_id: cfg.model_id,
            name: cfg.name.clone(),
            brand_key: cfg.brand_key.clone(),
            model_tokens: cfg.model_tokens.clone(),
            tokens: cfg.tokens.clone(),
            token_key: Some(cfg.token_key.clone()),
        });
        Ok(id)
    }

    fn update_configuration_tokens(&mut self, id: ConfigurationId, tokens: &ConfigTokens) -> Result<()> {
        if self.configuration(id).is_none() {
            return Err(CatalogError::NotFound(format!("configuration {id}")));
        }
        self.check_token_key_free(&tokens.brand_key, &tokens.token_key, Some(id))?;

        if let Some(cfg) = self.configs.iter_mut().find(|c| c.id == id) {
            cfg.brand_key = tokens.brand_key.clone();
            cfg.model_tokens = tokens.model_tokens.clone();
            cfg.tokens = tokens.tokens.clone();
            cfg.token_key = Some(tokens.token_key.clone());
        }
        Ok(())
    }

    fn brand_of_configuration(&self, id: ConfigurationId) -> Result<Option<BrandId>> {
        let Some(cfg) = self.configuration(id) else {
            return Ok(None);
        };
        Ok(self
            .models
            .iter()
            .find(|m| m.id == cfg.model_id)
            .map(|m| m.brand_id))
    }

    fn find_link(&self, company_id: i64, external_id: &str) -> Result<Option<ExternalLink>> {
        Ok(self
            .links
            .iter()
            .find(|l| l.company_id == company_id && l.external_id == external_id)
            .cloned())
    }

    fn upsert_link(&mut self, link: &ExternalLink) -> Result<()> {
        if self.configuration(link.configuration_id).is_none() {
            return Err(CatalogError::Constraint(format!(
                "configuration {} does not exist",
                link.configuration_id
            )));
        }
        match self
            .links
            .iter_mut()
            .find(|l| l.company_id == link.company_id && l.external_id == link.external_id)
        {
            Some(existing) => existing.configuration_id = link.configuration_id,
            None => self.links.push(link.clone()),
        }
        Ok(())
    }
}

impl CatalogStore for MemoryCatalog {
    fn transaction<T, F>(&mut self, f: F) -> Result<T>
    where
        F: FnOnce(&mut dyn CatalogRepository) -> Result<T>,
    {
        let snapshot = self.clone();
        let result = f(self);
        if result.is_err() {
            *self = snapshot;
        }
        result
    }
}
