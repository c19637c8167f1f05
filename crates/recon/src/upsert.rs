//! Whole-tree ingestion by exact display name, with token backfill.

use serde::Serialize;

use crate::cache::CandidateCache;
use crate::config::RelinkPolicy;
use crate::error::Result;
use crate::mapper::{ensure_brand, ensure_model, new_configuration, write_link};
use crate::matcher::find_exact;
use crate::model::{
    BrandId, CatalogTree, ConfigurationId, ExternalLink, LinkWrite, ModelId, StoredConfiguration,
};
use crate::normalize::normalize_title;
use crate::repository::{CatalogRepository, CatalogStore};
use crate::tokenize::{brand_key, tokenize, ConfigTokens};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UpsertOptions {
    /// Regenerate token data of every existing configuration, not only of
    /// rows that lack it.
    pub force_token_refresh: bool,
    pub relink: RelinkPolicy,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UpsertStats {
    pub brands_created: usize,
    pub models_created: usize,
    pub configurations_created: usize,
    pub tokens_updated: usize,
    /// Refreshes skipped because the new token-key belongs to another
    /// configuration of the brand.
    pub token_conflicts: usize,
    /// New names that resolved to an existing configuration by token-key.
    pub token_key_matches: usize,
    pub links_written: usize,
    pub relinked: usize,
    pub dropped: usize,
}

impl UpsertStats {
    /// Nothing was created.
    pub fn created_nothing(&self) -> bool {
        self.brands_created == 0 && self.models_created == 0 && self.configurations_created == 0
    }
}

/// Ingest `tree` in one transaction.
pub fn upsert_catalog<S: CatalogStore>(
    store: &mut S,
    tree: &CatalogTree,
    options: UpsertOptions,
) -> Result<UpsertStats> {
    store.transaction(|repo| upsert_tree(repo, tree, options))
}

/// Ingest `tree` through an already open repository.
///
/// Brands are looked up by display name (then by brand key), models by
/// (brand, name), configurations by (model, name). Missing rows are
/// created, brands and models only once one of their records survives;
/// existing configurations only have their token data regenerated, and
/// only when forced or when they have none.
pub fn upsert_tree(
    repo: &mut dyn CatalogRepository,
    tree: &CatalogTree,
    options: UpsertOptions,
) -> Result<UpsertStats> {
    let mut stats = UpsertStats::default();
    let mut cache = CandidateCache::new();

    for brand_node in &tree.brands {
        let brand = normalize_title(&brand_node.name);
        let key = brand_key(&brand);
        if brand.is_empty() || key.is_empty() {
            let skipped: usize = brand_node.models.iter().map(|m| m.configs.len()).sum();
            log::debug!("dropping brand {:?} with {skipped} record(s): no usable name", brand_node.name);
            stats.dropped += skipped;
            continue;
        }

        // Brand and model rows are created on their first surviving record.
        let mut brand_row: Option<BrandId> = None;

        for model_node in &brand_node.models {
            let model = normalize_title(&model_node.name);
            if model.is_empty() {
                log::debug!("dropping model {:?} under '{brand}': no usable name", model_node.name);
                stats.dropped += model_node.configs.len();
                continue;
            }

            let mut model_row: Option<ModelId> = None;

            for cfg in &model_node.configs {
                let record = cfg.record(&brand_node.name, &model_node.name);
                let trim = normalize_title(&cfg.name);
                if trim.is_empty() || record.has_invalid_company() {
                    log::debug!("dropping record {:?} under '{brand} {model}'", cfg.name);
                    stats.dropped += 1;
                    continue;
                }

                let model_id = match model_row {
                    Some(id) => id,
                    None => {
                        let brand_id = match brand_row {
                            Some(id) => id,
                            None => {
                                let (id, created) = ensure_brand(repo, &brand, &key)?;
                                if created {
                                    stats.brands_created += 1;
                                }
                                brand_row = Some(id);
                                id
                            }
                        };
                        let (id, created) = ensure_model(repo, brand_id, &model)?;
                        if created {
                            stats.models_created += 1;
                        }
                        model_row = Some(id);
                        id
                    }
                };

                let tokens = tokenize(&brand, &model, &trim);
                let configuration_id = match repo.find_configuration(model_id, &trim)? {
                    Some(existing) => {
                        if options.force_token_refresh || !existing.has_tokens() {
                            refresh_tokens(repo, &mut cache, &existing, &tokens, &mut stats)?;
                        }
                        existing.id
                    }
                    None => {
                        let same_key = find_exact(
                            &tokens.token_key,
                            cache.candidates(&*repo, &tokens.brand_key)?,
                        )
                        .map(|c| c.id);

                        match same_key {
                            Some(id) => {
                                log::debug!(
                                    "'{brand} {model} {trim}' resolves to configuration {id} by token key"
                                );
                                stats.token_key_matches += 1;
                                id
                            }
                            None => {
                                let id = repo.create_configuration(&new_configuration(model_id, &trim, &tokens))?;
                                cache.invalidate(&tokens.brand_key);
                                stats.configurations_created += 1;
                                id
                            }
                        }
                    }
                };

                if let Some((company_id, external_id)) = record.link_key() {
                    let link = ExternalLink {
                        company_id,
                        external_id: external_id.to_string(),
                        configuration_id,
                    };
                    match write_link(repo, options.relink, &link)? {
                        LinkWrite::Created | LinkWrite::Updated => stats.links_written += 1,
                        LinkWrite::Relinked => {
                            stats.links_written += 1;
                            stats.relinked += 1;
                        }
                        LinkWrite::Unchanged | LinkWrite::Kept => {}
                    }
                }
            }
        }
    }

    log::debug!("upsert finished: {stats:?}");
    Ok(stats)
}

fn refresh_tokens(
    repo: &mut dyn CatalogRepository,
    cache: &mut CandidateCache,
    existing: &StoredConfiguration,
    tokens: &ConfigTokens,
    stats: &mut UpsertStats,
) -> Result<()> {
    let owner: Option<ConfigurationId> = find_exact(
        &tokens.token_key,
        cache.candidates(&*repo, &tokens.brand_key)?,
    )
    .map(|c| c.id);

    if let Some(other) = owner.filter(|id| *id != existing.id) {
        log::warn!(
            "token refresh of configuration {} '{}' skipped: key '{}' belongs to configuration {other}",
            existing.id,
            existing.name,
            tokens.token_key
        );
        stats.token_conflicts += 1;
        return Ok(());
    }

    repo.update_configuration_tokens(existing.id, tokens)?;
    cache.invalidate(&tokens.brand_key);
    if existing.brand_key != tokens.brand_key {
        cache.invalidate(&existing.brand_key);
    }
    stats.tokens_updated += 1;
    Ok(())
}
