use std::collections::HashMap;

use crate::error::Result;
use crate::model::Candidate;
use crate::repository::CatalogRepository;

/// Existing configurations per brand key, loaded once per run.
///
/// Owned by a single run and dropped with it. Callers must
/// [`invalidate`](Self::invalidate) a brand right after creating a
/// configuration under it.
#[derive(Debug, Default)]
pub struct CandidateCache {
    entries: HashMap<String, Vec<Candidate>>,
    loads: usize,
}

impl CandidateCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn candidates(
        &mut self,
        repo: &dyn CatalogRepository,
        brand_key: &str,
    ) -> Result<&[Candidate]> {
        if !self.entries.contains_key(brand_key) {
            let loaded = repo.candidates_by_brand_key(brand_key)?;
            log::debug!("loaded {} candidate(s) for brand key '{brand_key}'", loaded.len());
            self.loads += 1;
            self.entries.insert(brand_key.to_string(), loaded);
        }
        Ok(self.entries.get(brand_key).map(Vec::as_slice).unwrap_or_default())
    }

    pub fn invalidate(&mut self, brand_key: &str) {
        self.entries.remove(brand_key);
    }

    /// Repository round-trips made so far.
    pub fn loads(&self) -> usize {
        self.loads
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryCatalog;
    use crate::model::NewConfiguration;
    use crate::repository::CatalogRepository;

    fn seed(repo: &mut MemoryCatalog, trim: &str) {
        let brand = match repo.find_brand_by_key("toyota").unwrap() {
            Some(b) => b,
            None => repo.create_brand("Toyota", "toyota").unwrap(),
        };
        let model = match repo.find_model(brand, "Camry").unwrap() {
            Some(m) => m,
            None => repo.create_model(brand, "Camry").unwrap(),
        };
        let tokens = vec!["camry".to_string(), trim.to_lowercase()];
        repo.create_configuration(&NewConfiguration {
            model_id: model,
            name: trim.into(),
            brand_key: "toyota".into(),
            model_tokens: vec!["camry".into()],
            token_key: tokens.join("|"),
            tokens,
        })
        .unwrap();
    }

    #[test]
    fn loads_once_until_invalidated() {
        let mut repo = MemoryCatalog::new();
        seed(&mut repo, "Comfort");
        let mut cache = CandidateCache::new();

        assert_eq!(cache.candidates(&repo, "toyota").unwrap().len(), 1);
        seed(&mut repo, "Prestige");
        // Stale until invalidated.
        assert_eq!(cache.candidates(&repo, "toyota").unwrap().len(), 1);
        assert_eq!(cache.loads(), 1);

        cache.invalidate("toyota");
        assert_eq!(cache.candidates(&repo, "toyota").unwrap().len(), 2);
        assert_eq!(cache.loads(), 2);
    }

    #[test]
    fn unknown_brand_caches_empty() {
        let repo = MemoryCatalog::new();
        let mut cache = CandidateCache::new();
        assert!(cache.candidates(&repo, "nobody").unwrap().is_empty());
        assert!(cache.candidates(&repo, "nobody").unwrap().is_empty());
        assert_eq!(cache.loads(), 1);
    }
}
