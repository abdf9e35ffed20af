use cmd_util::env::env_config;
use maplit::btreemap;
use must_let::must_let;
use pretty_assertions::assert_eq;
use proptest::prelude::*;

use super::DiffMerge;
use crate::{
    apply::apply_edit_status,
    catalog::{
        ColumnCatalog,
        DatabaseCatalog,
        SchemaCatalog,
        TableCatalog,
    },
    edit_status::{
        EditStatus,
        EditStatusStore,
    },
    metadata::{
        DatabaseMetadata,
        IndexMetadata,
        ProcedureMetadata,
    },
    resource_key::ResourceKey,
    test_helpers::{
        arb_database,
        column,
        column_config,
        partition,
        schema_config,
        table,
        table_config,
        users_database,
        view,
        TEST_DATABASE,
    },
};

fn public() -> ResourceKey {
    ResourceKey::database(TEST_DATABASE).schema("public")
}

fn merge(source: &DatabaseMetadata, target: &DatabaseMetadata) -> (DatabaseMetadata, EditStatusStore) {
    let mut store = EditStatusStore::new();
    let merged = DiffMerge::new(&mut store, TEST_DATABASE).merge_metadata(source, target);
    (merged, store)
}

#[test]
fn test_unchanged_copy_is_all_normal() {
    let baseline = users_database();
    let (merged, store) = merge(&baseline, &baseline.clone());
    assert!(store.is_empty());
    assert_eq!(merged, baseline);
    assert_eq!(store.effective_status(&public().table("users")), EditStatus::Normal);
}

#[test]
fn test_dropped_column_is_retained_and_marked() {
    let baseline = users_database();
    let mut target = baseline.clone();
    target.schemas[0].tables[0].columns.retain(|c| c.name != "name");

    let (merged, store) = merge(&baseline, &target);
    let users = public().table("users");
    assert_eq!(store.get_edit_status_by_key(&users), None);
    assert_eq!(store.effective_status(&users), EditStatus::Updated);
    assert_eq!(
        store.get_edit_status_by_key(&users.column("name")),
        Some(EditStatus::Dropped)
    );
    must_let!(let Some(merged_users) = merged.schema("public").and_then(|s| s.table("users")));
    let names: Vec<_> = merged_users.columns.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["id", "name"]);
}

#[test]
fn test_created_table_marks_every_column() {
    let baseline = users_database();
    let mut target = baseline.clone();
    target.schemas[0]
        .tables
        .push(table("orders", vec![column("id", "int"), column("total", "decimal")]));

    let (merged, store) = merge(&baseline, &target);
    let orders = public().table("orders");
    assert_eq!(store.get_edit_status_by_key(&orders), Some(EditStatus::Created));
    assert_eq!(
        store.get_edit_status_by_key(&orders.column("id")),
        Some(EditStatus::Created)
    );
    assert_eq!(
        store.get_edit_status_by_key(&orders.column("total")),
        Some(EditStatus::Created)
    );
    assert_eq!(store.effective_status(&public()), EditStatus::Updated);
    assert_eq!(merged, target);
}

#[test]
fn test_created_partition_marks_subpartitions() {
    let baseline = users_database();
    let mut target = baseline.clone();
    target.schemas[0].tables[0].partitions = vec![partition(
        "p0",
        vec![partition("s1", vec![]), partition("s2", vec![])],
    )];

    let (_, store) = merge(&baseline, &target);
    let p0 = public().table("users").partition("p0");
    for key in [p0.clone(), p0.partition("s1"), p0.partition("s2")] {
        assert_eq!(store.get_edit_status_by_key(&key), Some(EditStatus::Created), "{key}");
    }
}

#[test]
fn test_updated_subpartition_is_found_recursively() {
    let mut baseline = users_database();
    baseline.schemas[0].tables[0].partitions =
        vec![partition("p0", vec![partition("s1", vec![])])];
    let mut target = baseline.clone();
    target.schemas[0].tables[0].partitions[0].subpartitions[0].value = "100".to_string();

    let (_, store) = merge(&baseline, &target);
    let p0 = public().table("users").partition("p0");
    assert_eq!(store.get_edit_status_by_key(&p0), None);
    assert_eq!(
        store.get_edit_status_by_key(&p0.partition("s1")),
        Some(EditStatus::Updated)
    );
    assert_eq!(store.effective_status(&p0), EditStatus::Updated);
}

#[test]
fn test_updated_column_ignores_position() {
    let baseline = users_database();
    let mut target = baseline.clone();
    target.schemas[0].tables[0].columns[0].position = 7;
    let (_, store) = merge(&baseline, &target);
    assert!(store.is_empty());

    target.schemas[0].tables[0].columns[0].column_type = "bigint".to_string();
    let (_, store) = merge(&baseline, &target);
    assert_eq!(
        store.dirty_keys().collect::<Vec<_>>(),
        vec![(&public().table("users").column("id"), EditStatus::Updated)]
    );
}

#[test]
fn test_dropped_table_appended_after_target_tables() {
    let mut baseline = users_database();
    baseline.schemas[0]
        .tables
        .insert(0, table("audit", vec![column("at", "timestamp")]));
    let mut target = baseline.clone();
    target.schemas[0].tables.retain(|t| t.name != "audit");
    target.schemas[0]
        .tables
        .push(table("orders", vec![column("id", "int")]));

    let (merged, store) = merge(&baseline, &target);
    let names: Vec<_> = merged.schemas[0]
        .tables
        .iter()
        .map(|t| t.name.as_str())
        .collect();
    assert_eq!(names, vec!["users", "orders", "audit"]);
    let audit = public().table("audit");
    assert_eq!(store.get_edit_status_by_key(&audit), Some(EditStatus::Dropped));
    // Descendants of a dropped table are not marked on their own.
    assert_eq!(store.get_edit_status_by_key(&audit.column("at")), None);
}

#[test]
fn test_index_comparison_matches_by_name() {
    let secondary = IndexMetadata {
        name: "idx_name".to_string(),
        expressions: vec!["name".to_string()],
        ..Default::default()
    };
    let mut baseline = users_database();
    baseline.schemas[0].tables[0].indexes.push(secondary);
    let mut target = baseline.clone();
    target.schemas[0].tables[0].indexes.reverse();
    let (_, store) = merge(&baseline, &target);
    assert!(store.is_empty());

    target.schemas[0].tables[0].indexes.pop();
    let (_, store) = merge(&baseline, &target);
    assert_eq!(
        store.get_edit_status_by_key(&public().table("users")),
        Some(EditStatus::Updated)
    );
}

#[test]
fn test_views_and_routines_are_classified() {
    let mut baseline = users_database();
    baseline.schemas[0].views = vec![view("v1", "SELECT 1"), view("v2", "SELECT 2")];
    baseline.schemas[0].procedures = vec![ProcedureMetadata {
        name: "cleanup".to_string(),
        definition: "BEGIN END".to_string(),
    }];
    let mut target = baseline.clone();
    target.schemas[0].views[0].definition = "SELECT 10".to_string();
    target.schemas[0].views.remove(1);
    target.schemas[0].procedures.clear();

    let (merged, store) = merge(&baseline, &target);
    assert_eq!(
        store.get_edit_status_by_key(&public().view("v1")),
        Some(EditStatus::Updated)
    );
    assert_eq!(
        store.get_edit_status_by_key(&public().view("v2")),
        Some(EditStatus::Dropped)
    );
    assert_eq!(
        store.get_edit_status_by_key(&public().procedure("cleanup")),
        Some(EditStatus::Dropped)
    );
    assert_eq!(merged.schemas[0].views.len(), 2);
    assert_eq!(merged.schemas[0].procedures.len(), 1);
}

#[test]
fn test_merge_clears_previous_statuses() {
    let baseline = users_database();
    let mut store = EditStatusStore::new();
    store.mark_edit_status_by_key(public().table("ghost"), EditStatus::Created);
    DiffMerge::new(&mut store, TEST_DATABASE).merge_metadata(&baseline, &baseline);
    assert!(store.is_empty());
}

#[test]
fn test_configs_of_dropped_tables_are_retained() {
    let mut baseline = users_database();
    baseline.schemas[0]
        .tables
        .push(table("audit", vec![column("at", "timestamp")]));
    baseline.schema_configs = vec![schema_config(
        "public",
        vec![
            table_config("users", vec![column_config("name", "bb.email")]),
            table_config("audit", vec![column_config("at", "bb.time")]),
        ],
    )];
    let mut target = baseline.clone();
    target.schemas[0].tables.retain(|t| t.name != "audit");
    target.schema_configs[0].table_configs.retain(|t| t.name != "audit");

    let (merged, _) = merge(&baseline, &target);
    assert_eq!(merged.schema_configs, baseline.schema_configs);
}

#[test]
fn test_removed_config_of_live_table_stays_removed() {
    let mut baseline = users_database();
    baseline.schema_configs = vec![schema_config(
        "public",
        vec![table_config("users", vec![column_config("name", "bb.name")])],
    )];
    let mut target = baseline.clone();
    target.schema_configs.clear();

    let (merged, store) = merge(&baseline, &target);
    assert!(merged.schema_configs.is_empty());
    let applied = apply_edit_status(TEST_DATABASE, &merged, &store);
    assert!(applied.schema_configs.is_empty());
}

#[test]
fn test_dropped_table_config_joins_remaining_schema_config() {
    let mut baseline = users_database();
    baseline.schemas[0]
        .tables
        .push(table("audit", vec![column("at", "timestamp")]));
    baseline.schemas[0]
        .tables
        .push(table("orders", vec![column("id", "int")]));
    baseline.schema_configs = vec![schema_config(
        "public",
        vec![
            table_config("users", vec![column_config("name", "bb.email")]),
            table_config("audit", vec![column_config("at", "bb.time")]),
        ],
    )];
    // `users` loses its config while `audit` is dropped and `orders` gains one.
    let mut target = baseline.clone();
    target.schemas[0].tables.retain(|t| t.name != "audit");
    target.schema_configs = vec![schema_config(
        "public",
        vec![table_config("orders", vec![column_config("id", "bb.id")])],
    )];

    let (merged, store) = merge(&baseline, &target);
    assert_eq!(
        merged.schema_configs,
        vec![schema_config(
            "public",
            vec![
                table_config("orders", vec![column_config("id", "bb.id")]),
                table_config("audit", vec![column_config("at", "bb.time")]),
            ],
        )]
    );
    let applied = apply_edit_status(TEST_DATABASE, &merged, &store);
    assert_eq!(applied.schema_configs, target.schema_configs);
}

#[test]
fn test_duplicate_dropped_names_keep_last_once() {
    let mut baseline = users_database();
    baseline.schemas[0]
        .tables
        .push(table("audit", vec![column("at", "timestamp")]));
    baseline.schemas[0]
        .tables
        .push(table("audit", vec![column("at", "datetime")]));
    let target = users_database();

    let (merged, store) = merge(&baseline, &target);
    let tables = &merged.schemas[0].tables;
    assert_eq!(tables.len(), 2);
    assert_eq!(tables[1], table("audit", vec![column("at", "datetime")]));
    assert_eq!(
        store.get_edit_status_by_key(&public().table("audit")),
        Some(EditStatus::Dropped)
    );
}

fn users_catalog(classification: &str, name_semantic_type: &str) -> DatabaseCatalog {
    DatabaseCatalog {
        name: TEST_DATABASE.to_string(),
        schemas: vec![SchemaCatalog {
            name: "public".to_string(),
            tables: vec![TableCatalog {
                name: "users".to_string(),
                classification: classification.to_string(),
                columns: vec![ColumnCatalog {
                    name: "name".to_string(),
                    semantic_type: name_semantic_type.to_string(),
                    labels: btreemap! { "owner".to_string() => "hr".to_string() },
                    ..Default::default()
                }],
            }],
        }],
    }
}

#[test]
fn test_catalog_only_change_marks_updated() {
    let baseline = users_database();
    let mut store = EditStatusStore::new();
    let merged = DiffMerge::new(&mut store, TEST_DATABASE).merge(
        &baseline,
        &baseline,
        &users_catalog("1-1", "bb.name"),
        &users_catalog("1-1", "bb.email"),
    );
    let users = public().table("users");
    assert_eq!(store.get_edit_status_by_key(&users), None);
    assert_eq!(
        store.get_edit_status_by_key(&users.column("name")),
        Some(EditStatus::Updated)
    );
    assert_eq!(merged.catalog, users_catalog("1-1", "bb.email"));

    let mut store = EditStatusStore::new();
    DiffMerge::new(&mut store, TEST_DATABASE).merge(
        &baseline,
        &baseline,
        &users_catalog("1-1", "bb.name"),
        &users_catalog("1-2", "bb.name"),
    );
    assert_eq!(
        store.dirty_keys().collect::<Vec<_>>(),
        vec![(&users, EditStatus::Updated)]
    );
}

#[test]
fn test_catalog_mirrors_dropped_and_created_objects() {
    let baseline = users_database();
    let mut target = baseline.clone();
    target.schemas[0].tables[0].name = "members".to_string();
    let mut target_catalog = users_catalog("2-1", "bb.other");
    target_catalog.schemas[0].tables[0].name = "members".to_string();

    let mut store = EditStatusStore::new();
    let merged = DiffMerge::new(&mut store, TEST_DATABASE).merge(
        &baseline,
        &target,
        &users_catalog("1-1", "bb.name"),
        &target_catalog,
    );
    assert_eq!(
        store.get_edit_status_by_key(&public().table("users")),
        Some(EditStatus::Dropped)
    );
    assert_eq!(
        store.get_edit_status_by_key(&public().table("members")),
        Some(EditStatus::Created)
    );
    assert_eq!(
        store.get_edit_status_by_key(&public().table("members").column("name")),
        Some(EditStatus::Created)
    );
    let tables = &merged.catalog.schemas[0].tables;
    assert_eq!(tables[0], target_catalog.schemas[0].tables[0]);
    assert_eq!(tables[1], users_catalog("1-1", "bb.name").schemas[0].tables[0]);
}

#[test]
fn test_catalog_does_not_downgrade_created_column() {
    let baseline = users_database();
    let mut target = baseline.clone();
    target.schemas[0].tables[0].columns.push(column("email", "text"));
    let mut target_catalog = users_catalog("1-1", "bb.name");
    target_catalog.schemas[0].tables[0].columns.push(ColumnCatalog {
        name: "email".to_string(),
        semantic_type: "bb.email".to_string(),
        ..Default::default()
    });

    let mut store = EditStatusStore::new();
    let merged = DiffMerge::new(&mut store, TEST_DATABASE).merge(
        &baseline,
        &target,
        &users_catalog("1-1", "bb.name"),
        &target_catalog,
    );
    assert_eq!(
        store.get_edit_status_by_key(&public().table("users").column("email")),
        Some(EditStatus::Created)
    );
    assert_eq!(merged.catalog, target_catalog);
}

fn all_table_keys(metadata: &DatabaseMetadata) -> Vec<ResourceKey> {
    let database = ResourceKey::database(TEST_DATABASE);
    metadata
        .schemas
        .iter()
        .flat_map(|s| {
            let schema_key = database.schema(&s.name);
            s.tables.iter().map(move |t| schema_key.table(&t.name))
        })
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 64 * env_config("SCHEMA_EDITOR_PROPTEST_MULTIPLIER", 1),
        failure_persistence: None,
        ..ProptestConfig::default()
    })]

    #[test]
    fn proptest_classification_is_complete(
        source in arb_database(),
        target in arb_database(),
    ) {
        let (merged, store) = merge(&source, &target);
        let source_keys = all_table_keys(&source);
        let target_keys = all_table_keys(&target);
        let merged_keys = all_table_keys(&merged);
        for key in &target_keys {
            prop_assert!(merged_keys.contains(key));
            if !source_keys.contains(key) {
                prop_assert_eq!(store.effective_status(key), EditStatus::Created);
            }
        }
        for key in &source_keys {
            prop_assert!(merged_keys.contains(key));
            if !target_keys.contains(key) {
                // A dropped schema keeps its tables without marking them.
                let schema_dropped = key
                    .parent()
                    .and_then(|schema| store.get_edit_status_by_key(&schema))
                    == Some(EditStatus::Dropped);
                prop_assert!(
                    schema_dropped || store.effective_status(key) == EditStatus::Dropped,
                    "{}",
                    key
                );
            }
        }
        for (key, status) in store.dirty_keys() {
            prop_assert_ne!(status, EditStatus::Normal, "{}", key);
        }
    }

    #[test]
    fn proptest_self_merge_is_clean(metadata in arb_database()) {
        let (merged, store) = merge(&metadata, &metadata);
        prop_assert!(store.is_empty());
        prop_assert_eq!(merged, metadata);
    }
}
