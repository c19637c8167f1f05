use autocat_recon::{
    link_catalog, map_one, upsert_catalog, CatalogError, CatalogRecord, CatalogTree, ReconcileOptions, RelinkPolicy,
    Resolution, UpsertOptions,
};
use autocat_store::SqliteCatalog;

const GROSS: &str = r#"{"brands":[
    {"name":"toyota","models":[
        {"name":" Camry ","configs":[
            {"name":"comfort ","external_id":"g-1","company_id":8},
            {"name":"Prestige 2.5 AT","external_id":"g-2","company_id":8}
        ]}
    ]},
    {"name":"Kia","models":[{"name":"Rio","configs":[{"name":"Luxe","external_id":"g-3","company_id":8}]}]}
]}"#;

const NEO: &str = r#"{"brands":[
    {"name":"TOYOTA","models":[{"name":"camry","configs":[
        {"name":"Comfort (hybrid)","external_id":"n-1","company_id":6},
        {"name":"Business","external_id":"n-2","company_id":6}
    ]}]}
]}"#;

fn tree(json: &str) -> CatalogTree {
    serde_json::from_str(json).unwrap()
}

#[test]
fn upsert_then_link_persists_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("catalog.db");

    {
        let mut catalog = SqliteCatalog::open(&path).unwrap();
        let stats = upsert_catalog(&mut catalog, &tree(GROSS), UpsertOptions::default()).unwrap();
        assert_eq!(stats.configurations_created, 3);
        assert_eq!(stats.links_written, 3);

        let stats = link_catalog(&mut catalog, &tree(NEO), ReconcileOptions::default()).unwrap();
        assert_eq!(stats.fuzzy_matches, 1);
        assert_eq!(stats.configurations_created, 1);
        assert_eq!(stats.linked, 2);
    }

    let catalog = SqliteCatalog::open(&path).unwrap();
    let counts = catalog.counts().unwrap();
    assert_eq!(counts.brands, 2);
    assert_eq!(counts.models, 2);
    assert_eq!(counts.configurations, 4);
    assert_eq!(counts.untokenized, 0);
    assert_eq!(counts.external_links, 5);

    let same: i64 = catalog
        .connection()
        .query_row(
            "SELECT COUNT(DISTINCT configuration_id) FROM external_links WHERE external_id IN ('g-1', 'n-1')",
            [],
            |r| r.get(0),
        )
        .unwrap();
    assert_eq!(same, 1);
}

#[test]
fn second_upsert_changes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let mut catalog = SqliteCatalog::open(&dir.path().join("c.db")).unwrap();
    upsert_catalog(&mut catalog, &tree(GROSS), UpsertOptions::default()).unwrap();
    let before = catalog.counts().unwrap();

    let again = upsert_catalog(&mut catalog, &tree(GROSS), UpsertOptions::default()).unwrap();
    assert!(again.created_nothing());
    assert_eq!(again.links_written, 0);
    assert_eq!(catalog.counts().unwrap(), before);
}

#[test]
fn legacy_rows_backfilled_by_upsert() {
    let mut catalog = SqliteCatalog::open_in_memory().unwrap();
    catalog
        .connection()
        .execute_batch(
            "INSERT INTO brands (name, brand_key) VALUES ('Kia', 'kia');
             INSERT INTO models (brand_id, name) VALUES (1, 'Rio');
             INSERT INTO configurations (model_id, name, brand_key) VALUES (1, 'Luxe', 'kia');",
        )
        .unwrap();
    assert_eq!(catalog.counts().unwrap().untokenized, 1);

    let stats = upsert_catalog(&mut catalog, &tree(GROSS), UpsertOptions::default()).unwrap();
    assert_eq!(stats.tokens_updated, 1);
    assert_eq!(stats.brands_created, 1);
    assert_eq!(catalog.counts().unwrap().untokenized, 0);
}

#[test]
fn rejected_relink_rolls_back_everything() {
    let mut catalog = SqliteCatalog::open_in_memory().unwrap();
    upsert_catalog(&mut catalog, &tree(GROSS), UpsertOptions::default()).unwrap();
    let before = catalog.counts().unwrap();

    // g-3 belongs to Kia; resolving it under Lada must fail and undo Lada.
    let moved = tree(r#"{"brands":[{"name":"Lada","models":[{"name":"Vesta","configs":[{"name":"Luxe","external_id":"g-3","company_id":8}]}]}]}"#);
    let reject = ReconcileOptions { relink: RelinkPolicy::Reject, ..Default::default() };
    let err = link_catalog(&mut catalog, &moved, reject).unwrap_err();
    assert!(matches!(err, CatalogError::LinkConflict { company_id: 8, .. }));
    assert_eq!(catalog.counts().unwrap(), before);
}

#[test]
fn map_one_reads_own_writes() {
    let mut catalog = SqliteCatalog::open_in_memory().unwrap();
    let first = map_one(&mut catalog, &CatalogRecord::new("Kia", "Rio", "Luxe 1.6"), ReconcileOptions::default())
        .unwrap()
        .unwrap();
    let second = map_one(&mut catalog, &CatalogRecord::new("KIA", "rio", "1.6 luxe"), ReconcileOptions::default())
        .unwrap()
        .unwrap();
    assert_eq!(first.resolution, Resolution::Created);
    assert_eq!(second.resolution, Resolution::Exact);
    assert_eq!(first.configuration_id, second.configuration_id);
}
