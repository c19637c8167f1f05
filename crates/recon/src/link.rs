//! Link mode: every record of a tree goes through the matcher.

use serde::Serialize;

use crate::config::ReconcileOptions;
use crate::error::Result;
use crate::mapper::{ReconcileRun, Resolution};
use crate::model::{CatalogTree, LinkWrite};
use crate::repository::CatalogStore;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LinkStats {
    pub total: usize,
    pub linked: usize,
    /// Resolved, but the record had no company or external id.
    pub unlinkable: usize,
    pub dropped: usize,
    pub brands_created: usize,
    pub models_created: usize,
    pub configurations_created: usize,
    pub exact_matches: usize,
    pub fuzzy_matches: usize,
    /// Legacy rows without tokens adopted by display name.
    pub adopted: usize,
    pub relinked_across_brands: usize,
    /// Links left on another brand under [`RelinkPolicy::Keep`](crate::config::RelinkPolicy::Keep).
    pub kept: usize,
}

/// Map every record of `tree` inside one transaction.
///
/// Any error rolls back the whole tree.
pub fn link_catalog<S: CatalogStore>(
    store: &mut S,
    tree: &CatalogTree,
    options: ReconcileOptions,
) -> Result<LinkStats> {
    store.transaction(|repo| {
        let mut run = ReconcileRun::new(repo, options);
        let mut stats = LinkStats::default();

        for record in tree.records() {
            stats.total += 1;
            let Some(outcome) = run.map_one(&record)? else {
                stats.dropped += 1;
                continue;
            };

            if outcome.brand_created {
                stats.brands_created += 1;
            }
            if outcome.model_created {
                stats.models_created += 1;
            }
            match outcome.resolution {
                Resolution::Created => stats.configurations_created += 1,
                Resolution::Exact => stats.exact_matches += 1,
                Resolution::Fuzzy { .. } => stats.fuzzy_matches += 1,
                Resolution::Named => stats.adopted += 1,
            }
            match outcome.link {
                None => stats.unlinkable += 1,
                Some(LinkWrite::Kept) => stats.kept += 1,
                Some(LinkWrite::Relinked) => {
                    stats.linked += 1;
                    stats.relinked_across_brands += 1;
                }
                Some(_) => stats.linked += 1,
            }
        }

        log::debug!(
            "link run finished: {} record(s), {} candidate load(s)",
            stats.total,
            run.cache().loads()
        );
        Ok(stats)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RelinkPolicy;
    use crate::error::CatalogError;
    use crate::memory::MemoryCatalog;

    fn tree(json: &str) -> CatalogTree {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn counts_every_outcome() {
        let t = tree(
            r#"{"brands":[
                {"name":"Toyota","models":[{"name":"Camry","configs":[
                    {"name":"Comfort","external_id":"1","company_id":5},
                    {"name":"комфорт","external_id":"2","company_id":5},
                    {"name":"Comfort Hybrid","external_id":"3","company_id":5},
                    {"name":"Prestige"},
                    {"name":"  ","external_id":"4","company_id":5},
                    {"name":"Base","external_id":"5","company_id":-1}
                ]}]}
            ]}"#,
        );
        let mut repo = MemoryCatalog::new();
        let stats = link_catalog(&mut repo, &t, ReconcileOptions::default()).unwrap();

        assert_eq!(stats.total, 6);
        assert_eq!(stats.dropped, 2);
        assert_eq!(stats.brands_created, 1);
        assert_eq!(stats.models_created, 1);
        assert_eq!(stats.configurations_created, 2);
        assert_eq!(stats.exact_matches, 1);
        assert_eq!(stats.fuzzy_matches, 1);
        assert_eq!(stats.linked, 3);
        assert_eq!(stats.unlinkable, 1);
        assert_eq!(repo.links().len(), 3);
    }

    #[test]
    fn relink_counted() {
        let mut repo = MemoryCatalog::new();
        let first = tree(r#"{"brands":[{"name":"Kia","models":[{"name":"Rio","configs":[{"name":"Comfort","external_id":"x","company_id":1}]}]}]}"#);
        let moved = tree(r#"{"brands":[{"name":"Lada","models":[{"name":"Vesta","configs":[{"name":"Comfort","external_id":"x","company_id":1}]}]}]}"#);
        link_catalog(&mut repo, &first, ReconcileOptions::default()).unwrap();
        let stats = link_catalog(&mut repo, &moved, ReconcileOptions::default()).unwrap();
        assert_eq!(stats.relinked_across_brands, 1);
        assert_eq!(stats.linked, 1);

        let keep = ReconcileOptions { relink: RelinkPolicy::Keep, ..Default::default() };
        let stats = link_catalog(&mut repo, &first, keep).unwrap();
        assert_eq!(stats.kept, 1);
        assert_eq!(stats.linked, 0);
    }

    #[test]
    fn failure_rolls_back_whole_tree() {
        let mut repo = MemoryCatalog::new();
        let first = tree(r#"{"brands":[{"name":"Kia","models":[{"name":"Rio","configs":[{"name":"Comfort","external_id":"x","company_id":1}]}]}]}"#);
        link_catalog(&mut repo, &first, ReconcileOptions::default()).unwrap();

        let conflicting = tree(
            r#"{"brands":[
                {"name":"Skoda","models":[{"name":"Octavia","configs":[{"name":"Ambition"}]}]},
                {"name":"Lada","models":[{"name":"Vesta","configs":[{"name":"Comfort","external_id":"x","company_id":1}]}]}
            ]}"#,
        );
        let reject = ReconcileOptions { relink: RelinkPolicy::Reject, ..Default::default() };
        let err = link_catalog(&mut repo, &conflicting, reject).unwrap_err();
        assert!(matches!(err, CatalogError::LinkConflict { .. }));
        assert_eq!(repo.brand_count(), 1);
        assert_eq!(repo.configuration_count(), 1);
    }

    #[test]
    fn empty_tree_is_a_no_op() {
        let mut repo = MemoryCatalog::new();
        let stats = link_catalog(&mut repo, &CatalogTree::default(), ReconcileOptions::default()).unwrap();
        assert_eq!(stats, LinkStats::default());
    }
}
