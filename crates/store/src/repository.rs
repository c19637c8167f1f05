use rusqlite::{params, Connection, OptionalExtension};

use autocat_recon::error::Result;
use autocat_recon::model::{
    BrandId, Candidate, ConfigurationId, ExternalLink, ModelId, NewConfiguration, StoredConfiguration,
};
use autocat_recon::repository::CatalogRepository;
use autocat_recon::tokenize::ConfigTokens;

use crate::storage_err;

/// Repository bound to one open transaction.
///
/// Token lists are stored as JSON text.
pub struct SqliteRepository<'c> {
    conn: &'c Connection,
}

impl<'c> SqliteRepository<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }
}

fn encode(tokens: &[String]) -> Result<String> {
    Ok(serde_json::to_string(tokens)?)
}

fn decode(text: &str) -> Result<Vec<String>> {
    Ok(serde_json::from_str(text)?)
}

type ConfigRow = (i64, i64, String, String, String, String, Option<String>);

impl CatalogRepository for SqliteRepository<'_> {
    fn find_brand_by_name(&self, name: &str) -> Result<Option<BrandId>> {
        self.conn
            .query_row("SELECT id FROM brands WHERE name = ?1", [name], |row| row.get::<_, i64>(0))
            .optional()
            .map(|id| id.map(BrandId))
            .map_err(storage_err)
    }

    fn find_brand_by_key(&self, brand_key: &str) -> Result<Option<BrandId>> {
        self.conn
            .query_row("SELECT id FROM brands WHERE brand_key = ?1", [brand_key], |row| row.get::<_, i64>(0))
            .optional()
            .map(|id| id.map(BrandId))
            .map_err(storage_err)
    }

    fn create_brand(&mut self, name: &str, brand_key: &str) -> Result<BrandId> {
        self.conn
            .execute("INSERT INTO brands (name, brand_key) VALUES (?1, ?2)", params![name, brand_key])
            .map_err(storage_err)?;
        Ok(BrandId(self.conn.last_insert_rowid()))
    }

    fn find_model(&self, brand: BrandId, name: &str) -> Result<Option<ModelId>> {
        self.conn
            .query_row(
                "SELECT id FROM models WHERE brand_id = ?1 AND name = ?2",
                params![brand.0, name],
                |row| row.get::<_, i64>(0),
            )
            .optional()
            .map(|id| id.map(ModelId))
            .map_err(storage_err)
    }

    fn create_model(&mut self, brand: BrandId, name: &str) -> Result<ModelId> {
        self.conn
            .execute("INSERT INTO models (brand_id, name) VALUES (?1, ?2)", params![brand.0, name])
            .map_err(storage_err)?;
        Ok(ModelId(self.conn.last_insert_rowid()))
    }

    fn candidates_by_brand_key(&self, brand_key: &str) -> Result<Vec<Candidate>> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT id, tokens, token_key FROM configurations WHERE brand_key = ?1 ORDER BY id")
            .map_err(storage_err)?;
        let rows: Vec<(i64, String, Option<String>)> = stmt
            .query_map([brand_key], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))
            .map_err(storage_err)?
            .collect::<rusqlite::Result<_>>()
            .map_err(storage_err)?;

        rows.into_iter()
            .map(|(id, tokens, token_key)| {
                Ok(Candidate {
                    id: ConfigurationId(id),
                    tokens: decode(&tokens)?,
                    token_key,
                })
            })
            .collect()
    }

    fn find_configuration(&self, model: ModelId, name: &str) -> Result<Option<StoredConfiguration>> {
        let row: Option<ConfigRow> = self
            .conn
            .query_row(
                "SELECT id, model_id, name, brand_key, model_tokens, tokens, token_key
                 FROM configurations WHERE model_id = ?1 AND name = ?2",
                params![model.0, name],
                |row| {
                    Ok((
                        row.get(0)?,
                        row.get(1)?,
                        row.get(2)?,
                        row.get(3)?,
                        row.get(4)?,
                        row.get(5)?,
                        row.get(6)?,
                    ))
                },
            )
            .optional()
            .map_err(storage_err)?;

        let Some((id, model_id, name, brand_key, model_tokens, tokens, token_key)) = row else {
            return Ok(None);
        };
        Ok(Some(StoredConfiguration {
            id: ConfigurationId(id),
            model_id: ModelId(model_id),
            name,
            brand_key,
            model_tokens: decode(&model_tokens)?,
            tokens: decode(&tokens)?,
            token_key,
        }))
    }

    fn create_configuration(&mut self, cfg: &NewConfiguration) -> Result<ConfigurationId> {
        self.conn
            .execute(
                "INSERT INTO configurations (model_id, name, brand_key, model_tokens, tokens, token_key)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    cfg.model_id.0,
                    cfg.name,
                    cfg.brand_key,
                    encode(&cfg.model_tokens)?,
                    encode(&cfg.tokens)?,
                    cfg.token_key,
                ],
            )
            .map_err(storage_err)?;
        Ok(ConfigurationId(self.conn.last_insert_rowid()))
    }

    fn update_configuration_tokens(&mut self, id: ConfigurationId, tokens: &ConfigTokens) -> Result<()> {
        let changed = self
            .conn
            .execute(
                "UPDATE configurations
                 SET brand_key = ?2, model_tokens = ?3, tokens = ?4, token_key = ?5
                 WHERE id = ?1",
                params![
                    id.0,
                    tokens.brand_key,
                    encode(&tokens.model_tokens)?,
                    encode(&tokens.tokens)?,
                    tokens.token_key,
                ],
            )
            .map_err(storage_err)?;
        if changed == 0 {
            return Err(autocat_recon::CatalogError::NotFound(format!("configuration {id}")));
        }
        Ok(())
    }

    fn brand_of_configuration(&self, id: ConfigurationId) -> Result<Option<BrandId>> {
        self.conn
            .query_row(
                "SELECT m.brand_id FROM configurations c JOIN models m ON m.id = c.model_id WHERE c.id = ?1",
                [id.0],
                |row| row.get::<_, i64>(0),
            )
            .optional()
            .map(|id| id.map(BrandId))
            .map_err(storage_err)
    }

    fn find_link(&self, company_id: i64, external_id: &str) -> Result<Option<ExternalLink>> {
        self.conn
            .query_row(
                "SELECT configuration_id FROM external_links WHERE company_id = ?1 AND external_id = ?2",
                params![company_id, external_id],
                |row| row.get::<_, i64>(0),
            )
            .optional()
            .map(|id| {
                id.map(|configuration_id| ExternalLink {
                    company_id,
                    external_id: external_id.to_string(),
                    configuration_id: ConfigurationId(configuration_id),
                })
            })
            .map_err(storage_err)
    }

    fn upsert_link(&mut self, link: &ExternalLink) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO external_links (company_id, external_id, configuration_id)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT (company_id, external_id)
                 DO UPDATE SET configuration_id = excluded.configuration_id",
                params![link.company_id, link.external_id, link.configuration_id.0],
            )
            .map_err(storage_err)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SqliteCatalog;
    use autocat_recon::repository::CatalogStore;
    use autocat_recon::tokenize::tokenize;
    use autocat_recon::CatalogError;

    fn new_cfg(model_id: ModelId, name: &str, tokens: &ConfigTokens) -> NewConfiguration {
        NewConfiguration {
            model_id,
            name: name.into(),
            brand_key: tokens.brand_key.clone(),
            model_tokens: tokens.model_tokens.clone(),
            tokens: tokens.tokens.clone(),
            token_key: tokens.token_key.clone(),
        }
    }

    #[test]
    fn configuration_round_trips_tokens() {
        let mut catalog = SqliteCatalog::open_in_memory().unwrap();
        catalog
            .transaction(|repo| {
                let b = repo.create_brand("Toyota", "toyota")?;
                let m = repo.create_model(b, "Land Cruiser")?;
                let t = tokenize("Toyota", "Land Cruiser", "Prestige 4.0");
                let id = repo.create_configuration(&new_cfg(m, "Prestige 4.0", &t))?;

                let stored = repo.find_configuration(m, "Prestige 4.0")?.unwrap();
                assert_eq!(stored.id, id);
                assert_eq!(stored.model_tokens, vec!["cruiser", "land"]);
                assert_eq!(stored.tokens, t.tokens);
                assert_eq!(stored.token_key.as_deref(), Some(t.token_key.as_str()));

                let cands = repo.candidates_by_brand_key("toyota")?;
                assert_eq!(cands.len(), 1);
                assert_eq!(repo.brand_of_configuration(id)?, Some(b));
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn token_key_unique_within_brand_only() {
        let mut catalog = SqliteCatalog::open_in_memory().unwrap();
        let err = catalog
            .transaction(|repo| -> Result<()> {
                let kia = repo.create_brand("Kia", "kia")?;
                let lada = repo.create_brand("Lada", "lada")?;
                let rio = repo.create_model(kia, "Rio")?;
                let vesta = repo.create_model(lada, "Rio")?;
                let rio_x = repo.create_model(kia, "Rio X")?;

                let kia_t = tokenize("Kia", "Rio", "Comfort");
                let lada_t = tokenize("Lada", "Rio", "Comfort");
                repo.create_configuration(&new_cfg(rio, "Comfort", &kia_t))?;
                // Same key under another brand is fine.
                repo.create_configuration(&new_cfg(vesta, "Comfort", &lada_t))?;
                // Same key under the same brand is not.
                repo.create_configuration(&new_cfg(rio_x, "Comfort", &kia_t))?;
                Ok(())
            })
            .unwrap_err();
        assert!(matches!(err, CatalogError::Constraint(_)));
    }

    #[test]
    fn legacy_rows_may_share_null_key() {
        let mut catalog = SqliteCatalog::open_in_memory().unwrap();
        catalog
            .transaction(|repo| {
                let b = repo.create_brand("Kia", "kia")?;
                repo.create_model(b, "Rio")?;
                Ok(())
            })
            .unwrap();
        catalog
            .connection()
            .execute_batch(
                "INSERT INTO configurations (model_id, name, brand_key) VALUES (1, 'A', 'kia');
                 INSERT INTO configurations (model_id, name, brand_key) VALUES (1, 'B', 'kia');",
            )
            .unwrap();
        assert_eq!(catalog.counts().unwrap().untokenized, 2);

        catalog
            .transaction(|repo| {
                let row = repo.find_configuration(ModelId(1), "A")?.unwrap();
                assert!(!row.has_tokens());
                repo.update_configuration_tokens(row.id, &tokenize("Kia", "Rio", "A"))?;
                Ok(())
            })
            .unwrap();
        assert_eq!(catalog.counts().unwrap().untokenized, 1);
    }

    #[test]
    fn link_upsert_repoints_in_place() {
        let mut catalog = SqliteCatalog::open_in_memory().unwrap();
        catalog
            .transaction(|repo| {
                let b = repo.create_brand("Kia", "kia")?;
                let m = repo.create_model(b, "Rio")?;
                let a = repo.create_configuration(&new_cfg(m, "A", &tokenize("Kia", "Rio", "A")))?;
                let c = repo.create_configuration(&new_cfg(m, "C", &tokenize("Kia", "Rio", "C")))?;

                let mut link = ExternalLink { company_id: 3, external_id: "v-1".into(), configuration_id: a };
                repo.upsert_link(&link)?;
                link.configuration_id = c;
                repo.upsert_link(&link)?;

                assert_eq!(repo.find_link(3, "v-1")?.unwrap().configuration_id, c);
                assert!(repo.find_link(4, "v-1")?.is_none());
                Ok(())
            })
            .unwrap();
        assert_eq!(catalog.counts().unwrap().external_links, 1);
    }

    #[test]
    fn update_missing_configuration_is_not_found() {
        let mut catalog = SqliteCatalog::open_in_memory().unwrap();
        let err = catalog
            .transaction(|repo| repo.update_configuration_tokens(ConfigurationId(99), &tokenize("A", "B", "C")))
            .unwrap_err();
        assert!(matches!(err, CatalogError::NotFound(_)));
    }
}
