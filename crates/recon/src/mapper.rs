//! Record-by-record resolution of vendor records onto canonical
//! configurations.

use serde::Serialize;

use crate::cache::CandidateCache;
use crate::config::{ReconcileOptions, RelinkPolicy};
use crate::error::{CatalogError, Result};
use crate::matcher::{find_exact, resolve, MatchScore};
use crate::model::{
    BrandId, CatalogRecord, ConfigurationId, ExternalLink, LinkWrite, ModelId, NewConfiguration,
};
use crate::normalize::normalize_title;
use crate::repository::{CatalogRepository, CatalogStore};
use crate::tokenize::{tokenize, ConfigTokens};

/// How a record found its configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Resolution {
    /// A new configuration was created.
    Created,
    /// Token-key equality within the brand.
    Exact,
    /// Token overlap at or above the threshold.
    Fuzzy { score: u32 },
    /// Same display name under the same model; the row had no usable tokens.
    Named,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MapOutcome {
    pub configuration_id: ConfigurationId,
    pub resolution: Resolution,
    pub brand_created: bool,
    pub model_created: bool,
    /// `None` when the record carried no linkable id.
    pub link: Option<LinkWrite>,
}

enum Lookup {
    NoCandidates,
    Exact(ConfigurationId),
    Scored(MatchScore),
}

/// One reconciliation run over a single open transaction.
///
/// The candidate cache lives and dies with the run.
pub struct ReconcileRun<'r> {
    repo: &'r mut dyn CatalogRepository,
    cache: CandidateCache,
    options: ReconcileOptions,
}

impl<'r> ReconcileRun<'r> {
    pub fn new(repo: &'r mut dyn CatalogRepository, options: ReconcileOptions) -> Self {
        Self {
            repo,
            cache: CandidateCache::new(),
            options,
        }
    }

    pub fn cache(&self) -> &CandidateCache {
        &self.cache
    }

    /// Resolve one record to a configuration id, creating brand, model and
    /// configuration on demand, then write its link if it has one.
    ///
    /// Returns `Ok(None)` for records that carry no usable name or an
    /// invalid company id.
    pub fn map_one(&mut self, record: &CatalogRecord<'_>) -> Result<Option<MapOutcome>> {
        let brand = normalize_title(record.brand);
        let model = normalize_title(record.model);
        let trim = normalize_title(record.trim);

        if brand.is_empty() || model.is_empty() || trim.is_empty() {
            log::debug!(
                "dropping record with empty name: brand={:?} model={:?} trim={:?}",
                record.brand,
                record.model,
                record.trim
            );
            return Ok(None);
        }
        if record.has_invalid_company() {
            log::debug!("dropping record '{brand} {model} {trim}': invalid company id");
            return Ok(None);
        }

        let tokens = tokenize(&brand, &model, &trim);
        if tokens.brand_key.is_empty() {
            log::debug!("dropping record: brand '{brand}' has no usable key characters");
            return Ok(None);
        }

        let lookup = {
            let candidates = self.cache.candidates(&*self.repo, &tokens.brand_key)?;
            if candidates.is_empty() {
                Lookup::NoCandidates
            } else if let Some(hit) = find_exact(&tokens.token_key, candidates) {
                Lookup::Exact(hit.id)
            } else {
                Lookup::Scored(resolve(&tokens.tokens, candidates))
            }
        };

        let mut outcome = match lookup {
            Lookup::Exact(id) => MapOutcome {
                configuration_id: id,
                resolution: Resolution::Exact,
                brand_created: false,
                model_created: false,
                link: None,
            },
            Lookup::Scored(m) => match m.accepted(self.options.threshold) {
                Some(id) => {
                    log::debug!("'{brand} {model} {trim}' matched configuration {id} with score {}", m.score);
                    MapOutcome {
                        configuration_id: id,
                        resolution: Resolution::Fuzzy { score: m.score },
                        brand_created: false,
                        model_created: false,
                        link: None,
                    }
                }
                None => self.create(&brand, &model, &trim, &tokens)?,
            },
            Lookup::NoCandidates => self.create(&brand, &model, &trim, &tokens)?,
        };

        if let Some((company_id, external_id)) = record.link_key() {
            let link = ExternalLink {
                company_id,
                external_id: external_id.to_string(),
                configuration_id: outcome.configuration_id,
            };
            outcome.link = Some(write_link(&mut *self.repo, self.options.relink, &link)?);
        }

        Ok(Some(outcome))
    }

    fn create(
        &mut self,
        brand: &str,
        model: &str,
        trim: &str,
        tokens: &ConfigTokens,
    ) -> Result<MapOutcome> {
        let (brand_id, brand_created) = ensure_brand(&mut *self.repo, brand, &tokens.brand_key)?;
        let (model_id, model_created) = ensure_model(&mut *self.repo, brand_id, model)?;

        // A same-named row under this model can only have been missed if it
        // predates tokenization; adopt it instead of colliding with it.
        if let Some(existing) = self.repo.find_configuration(model_id, trim)? {
            if !existing.has_tokens() {
                self.repo.update_configuration_tokens(existing.id, tokens)?;
            }
            self.cache.invalidate(&tokens.brand_key);
            return Ok(MapOutcome {
                configuration_id: existing.id,
                resolution: Resolution::Named,
                brand_created,
                model_created,
                link: None,
            });
        }

        let id = self.repo.create_configuration(&new_configuration(model_id, trim, tokens))?;
        self.cache.invalidate(&tokens.brand_key);
        log::debug!("created configuration {id} '{brand} {model} {trim}' ({})", tokens.token_key);

        Ok(MapOutcome {
            configuration_id: id,
            resolution: Resolution::Created,
            brand_created,
            model_created,
            link: None,
        })
    }
}

/// Resolve a single record in its own transaction with a fresh cache.
pub fn map_one<S: CatalogStore>(
    store: &mut S,
    record: &CatalogRecord<'_>,
    options: ReconcileOptions,
) -> Result<Option<MapOutcome>> {
    store.transaction(|repo| ReconcileRun::new(repo, options).map_one(record))
}

// ---------------------------------------------------------------------------
// Shared entity helpers (also used by the bulk upserter)
// ---------------------------------------------------------------------------

/// Find a brand by display name, then by key; create it if neither exists.
pub(crate) fn ensure_brand(
    repo: &mut dyn CatalogRepository,
    name: &str,
    brand_key: &str,
) -> Result<(BrandId, bool)> {
    if let Some(id) = repo.find_brand_by_name(name)? {
        return Ok((id, false));
    }
    if let Some(id) = repo.find_brand_by_key(brand_key)? {
        return Ok((id, false));
    }
    let id = repo.create_brand(name, brand_key)?;
    log::debug!("created brand {id} '{name}'");
    Ok((id, true))
}

pub(crate) fn ensure_model(
    repo: &mut dyn CatalogRepository,
    brand: BrandId,
    name: &str,
) -> Result<(ModelId, bool)> {
    if let Some(id) = repo.find_model(brand, name)? {
        return Ok((id, false));
    }
    let id = repo.create_model(brand, name)?;
    log::debug!("created model {id} '{name}' in brand {brand}");
    Ok((id, true))
}

pub(crate) fn new_configuration(model_id: ModelId, name: &str, tokens: &ConfigTokens) -> NewConfiguration {
    NewConfiguration {
        model_id,
        name: name.to_string(),
        brand_key: tokens.brand_key.clone(),
        model_tokens: tokens.model_tokens.clone(),
        tokens: tokens.tokens.clone(),
        token_key: tokens.token_key.clone(),
    }
}

/// Upsert a link by (company, external id), applying `policy` when the id
/// currently points at a configuration of another brand.
pub(crate) fn write_link(
    repo: &mut dyn CatalogRepository,
    policy: RelinkPolicy,
    link: &ExternalLink,
) -> Result<LinkWrite> {
    let Some(existing) = repo.find_link(link.company_id, &link.external_id)? else {
        repo.upsert_link(link)?;
        return Ok(LinkWrite::Created);
    };

    if existing.configuration_id == link.configuration_id {
        return Ok(LinkWrite::Unchanged);
    }

    let old_brand = repo.brand_of_configuration(existing.configuration_id)?;
    let new_brand = repo.brand_of_configuration(link.configuration_id)?;
    if old_brand == new_brand {
        repo.upsert_link(link)?;
        return Ok(LinkWrite::Updated);
    }

    match policy {
        RelinkPolicy::Relink => {
            log::warn!(
                "company {} external id '{}' moved from configuration {} to {} of another brand",
                link.company_id,
                link.external_id,
                existing.configuration_id,
                link.configuration_id
            );
            repo.upsert_link(link)?;
            Ok(LinkWrite::Relinked)
        }
        RelinkPolicy::Keep => {
            log::warn!(
                "company {} external id '{}' stays on configuration {}; resolved to {} of another brand",
                link.company_id,
                link.external_id,
                existing.configuration_id,
                link.configuration_id
            );
            Ok(LinkWrite::Kept)
        }
        RelinkPolicy::Reject => Err(CatalogError::LinkConflict {
            company_id: link.company_id,
            external_id: link.external_id.clone(),
            existing: existing.configuration_id,
            requested: link.configuration_id,
        }),
    }
}
