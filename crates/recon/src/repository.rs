//! Persistence boundary.
//!
//! The engine never talks SQL. It sees a [`CatalogRepository`] bound to one
//! open transaction, handed out by a [`CatalogStore`].

use crate::error::Result;
use crate::model::{
    BrandId, Candidate, ConfigurationId, ExternalLink, ModelId, NewConfiguration,
    StoredConfiguration,
};
use crate::tokenize::ConfigTokens;

/// Reads and writes against one transaction.
///
/// Reads must observe writes made earlier through the same repository.
pub trait CatalogRepository {
    fn find_brand_by_name(&self, name: &str) -> Result<Option<BrandId>>;
    fn find_brand_by_key(&self, brand_key: &str) -> Result<Option<BrandId>>;
    fn create_brand(&mut self, name: &str, brand_key: &str) -> Result<BrandId>;

    fn find_model(&self, brand: BrandId, name: &str) -> Result<Option<ModelId>>;
    fn create_model(&mut self, brand: BrandId, name: &str) -> Result<ModelId>;

    /// Every configuration filed under `brand_key`, in id order.
    fn candidates_by_brand_key(&self, brand_key: &str) -> Result<Vec<Candidate>>;
    fn find_configuration(&self, model: ModelId, name: &str) -> Result<Option<StoredConfiguration>>;
    fn create_configuration(&mut self, cfg: &NewConfiguration) -> Result<ConfigurationId>;
    /// Overwrite token fields in place; identity and links are untouched.
    fn update_configuration_tokens(&mut self, id: ConfigurationId, tokens: &ConfigTokens) -> Result<()>;
    fn brand_of_configuration(&self, id: ConfigurationId) -> Result<Option<BrandId>>;

    fn find_link(&self, company_id: i64, external_id: &str) -> Result<Option<ExternalLink>>;
    /// Insert or repoint the link keyed by (company, external id).
    fn upsert_link(&mut self, link: &ExternalLink) -> Result<()>;
}

/// Hands out transactions.
///
/// `f` runs against a repository bound to a fresh transaction. `Ok` commits,
/// `Err` rolls everything back and is returned unchanged.
pub trait CatalogStore {
    fn transaction<T, F>(&mut self, f: F) -> Result<T>
    where
        F: FnOnce(&mut dyn CatalogRepository) -> Result<T>;
}
