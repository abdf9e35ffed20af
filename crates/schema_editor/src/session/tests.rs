use std::collections::BTreeSet;

use cmd_util::env::config_test;
use errors::ErrorMetadataAnyhowExt;
use maplit::btreemap;
use must_let::must_let;
use pretty_assertions::assert_eq;

use super::SchemaEditSession;
use crate::{
    catalog::{
        ColumnCatalog,
        DatabaseCatalog,
        SchemaCatalog,
        TableCatalog,
    },
    diff_ddl::StructuralValidator,
    edit_status::EditStatus,
    metadata::{
        DatabaseMetadata,
        Engine,
        FunctionMetadata,
        ProcedureMetadata,
        TableMetadata,
    },
    resource_key::ResourceKey,
    selection::RolloutSelection,
    test_helpers::{
        column,
        primary_key,
        table,
        users_database,
        users_table,
        view,
        FakeDdlDiffService,
        TEST_DATABASE,
    },
};

fn users_key() -> ResourceKey {
    ResourceKey::database(TEST_DATABASE)
        .schema("public")
        .table("users")
}

fn users_catalog() -> DatabaseCatalog {
    DatabaseCatalog {
        name: TEST_DATABASE.to_string(),
        schemas: vec![SchemaCatalog {
            name: "public".to_string(),
            tables: vec![TableCatalog {
                name: "users".to_string(),
                classification: "1-2".to_string(),
                columns: vec![ColumnCatalog {
                    name: "name".to_string(),
                    semantic_type: "person-name".to_string(),
                    labels: btreemap! { "owner".to_string() => "crm".to_string() },
                    ..Default::default()
                }],
            }],
        }],
    }
}

fn orders_table() -> TableMetadata {
    TableMetadata {
        indexes: vec![primary_key(&["id"])],
        ..table("orders", vec![column("id", "int")])
    }
}

/// `users_database` plus a view, a procedure and a function.
fn routines_database() -> DatabaseMetadata {
    let mut metadata = users_database();
    let public = &mut metadata.schemas[0];
    public.views.push(view("active_users", "SELECT * FROM users"));
    public.procedures.push(ProcedureMetadata {
        name: "purge".to_string(),
        definition: "DELETE FROM users".to_string(),
    });
    public.functions.push(FunctionMetadata {
        name: "user_count".to_string(),
        definition: "SELECT count(*) FROM users".to_string(),
    });
    metadata
}

fn session() -> SchemaEditSession {
    config_test();
    SchemaEditSession::new(TEST_DATABASE, users_database(), users_catalog())
}

#[test]
fn test_new_session_is_clean() {
    let session = session();
    assert!(session.store().is_empty());
    assert_eq!(session.database(), TEST_DATABASE);
    assert_eq!(session.applied_metadata(), users_database());
    assert_eq!(session.applied_catalog(), users_catalog());
}

#[test]
fn test_drop_and_restore_table() -> anyhow::Result<()> {
    let mut session = session();
    session.drop_table("public", "users")?;

    assert_eq!(
        session.store().get_edit_status_by_key(&users_key()),
        Some(EditStatus::Dropped)
    );
    assert_eq!(session.target().schemas[0].tables.len(), 1);
    assert!(session.applied_metadata().schemas[0].tables.is_empty());
    assert!(session.applied_catalog().table("public", "users").is_none());

    session.restore_table("public", "users")?;
    assert!(session.store().is_empty());
    assert_eq!(session.target(), &users_database());
    Ok(())
}

#[test]
fn test_dropping_a_created_table_removes_it() -> anyhow::Result<()> {
    let mut session = session();
    session.add_table("public", orders_table())?;
    let orders = ResourceKey::database(TEST_DATABASE)
        .schema("public")
        .table("orders");
    assert_eq!(
        session.store().get_edit_status_by_key(&orders),
        Some(EditStatus::Created)
    );
    assert_eq!(
        session.store().get_edit_status_by_key(&orders.column("id")),
        Some(EditStatus::Created)
    );

    session.drop_table("public", "orders")?;
    assert!(session.store().is_empty());
    assert_eq!(session.target(), &users_database());
    Ok(())
}

#[test]
fn test_missing_and_duplicate_objects_are_rejected() {
    let mut session = session();

    let err = session.add_table("public", users_table()).unwrap_err();
    assert!(err.is_bad_request());
    assert_eq!(err.short_msg(), "DuplicateTable");

    let err = session.drop_table("public", "orders").unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(err.short_msg(), "TableNotFound");

    let err = session.drop_column("sales", "users", "id").unwrap_err();
    assert_eq!(err.short_msg(), "SchemaNotFound");

    let err = session
        .add_column("public", "users", column("id", "bigint"))
        .unwrap_err();
    assert_eq!(err.short_msg(), "DuplicateColumn");

    let err = session.restore_view("public", "active_users").unwrap_err();
    assert_eq!(err.short_msg(), "ViewNotFound");
    assert!(session.store().is_empty());
}

#[test]
fn test_update_column() -> anyhow::Result<()> {
    let mut session = session();
    let name = users_key().column("name");

    session.update_column("public", "users", "id", |_| {})?;
    assert!(session.store().is_empty());

    session.update_column("public", "users", "name", |c| c.column_type = "text".to_string())?;
    assert_eq!(
        session.store().get_edit_status_by_key(&name),
        Some(EditStatus::Updated)
    );
    assert_eq!(session.store().effective_status(&users_key()), EditStatus::Updated);

    let err = session
        .update_column("public", "users", "name", |c| c.name = "full_name".to_string())
        .unwrap_err();
    assert_eq!(err.short_msg(), "ColumnRenameUnsupported");
    must_let!(let Some(users) = session.target().schemas[0].table("users"));
    assert_eq!(users.column("name").map(|c| c.column_type.as_str()), Some("text"));
    Ok(())
}

#[test]
fn test_updating_a_created_column_keeps_it_created() -> anyhow::Result<()> {
    let mut session = session();
    session.add_column("public", "users", column("email", "text"))?;
    session.update_column("public", "users", "email", |c| c.nullable = true)?;
    assert_eq!(
        session
            .store()
            .get_edit_status_by_key(&users_key().column("email")),
        Some(EditStatus::Created)
    );

    session.drop_column("public", "users", "email")?;
    assert!(session.store().is_empty());
    Ok(())
}

#[test]
fn test_restore_column_keeps_other_edits() -> anyhow::Result<()> {
    let mut session = session();
    session.update_column("public", "users", "id", |c| c.column_type = "bigint".to_string())?;
    session.drop_column("public", "users", "name")?;

    must_let!(let Some(users) = session.applied_metadata().schemas[0].table("users").cloned());
    assert_eq!(
        users.columns.iter().map(|c| c.name.as_str()).collect::<Vec<_>>(),
        vec!["id"]
    );
    assert!(session
        .applied_catalog()
        .column("public", "users", "name")
        .is_none());

    session.restore_column("public", "users", "name")?;
    assert_eq!(
        session.store().dirty_keys().collect::<Vec<_>>(),
        vec![(&users_key().column("id"), EditStatus::Updated)]
    );
    assert_eq!(
        session.target_catalog().column("public", "users", "name"),
        users_catalog().column("public", "users", "name")
    );
    Ok(())
}

#[test]
fn test_with_target_classifies_and_restores_views() -> anyhow::Result<()> {
    let baseline = routines_database();
    let mut target = baseline.clone();
    target.schemas[0].views.clear();
    target.schemas[0].tables[0].columns[1].column_type = "text".to_string();

    let mut session = SchemaEditSession::with_target(
        TEST_DATABASE,
        baseline.clone(),
        users_catalog(),
        &target,
        &users_catalog(),
    );
    let view_key = ResourceKey::database(TEST_DATABASE)
        .schema("public")
        .view("active_users");
    assert_eq!(
        session.store().get_edit_status_by_key(&view_key),
        Some(EditStatus::Dropped)
    );
    assert_eq!(session.target().schemas[0].views.len(), 1);
    assert_eq!(session.applied_metadata(), target);

    session.restore_view("public", "active_users")?;
    assert_eq!(
        session.store().dirty_keys().collect::<Vec<_>>(),
        vec![(&users_key().column("name"), EditStatus::Updated)]
    );
    Ok(())
}

#[test]
fn test_drop_and_restore_routines() -> anyhow::Result<()> {
    let mut session =
        SchemaEditSession::new(TEST_DATABASE, routines_database(), DatabaseCatalog::default());
    session.drop_view("public", "active_users")?;
    session.drop_procedure("public", "purge")?;
    session.drop_function("public", "user_count")?;
    assert_eq!(session.store().summary().dropped, 3);

    let applied = session.applied_metadata();
    assert!(applied.schemas[0].views.is_empty());
    assert!(applied.schemas[0].procedures.is_empty());
    assert!(applied.schemas[0].functions.is_empty());

    session.restore_procedure("public", "purge")?;
    session.restore_function("public", "user_count")?;
    session.restore_view("public", "active_users")?;
    assert!(session.store().is_empty());
    assert_eq!(session.applied_metadata(), routines_database());
    Ok(())
}

#[test]
fn test_rebase_reclassifies_pending_edits() -> anyhow::Result<()> {
    let mut session = session();
    session.add_table("public", orders_table())?;
    session.drop_column("public", "users", "name")?;

    // The new baseline already contains `orders`.
    let mut new_baseline = users_database();
    new_baseline.schemas[0].tables.push(orders_table());
    session.rebase(new_baseline.clone(), users_catalog());

    assert_eq!(session.baseline(), &new_baseline);
    assert_eq!(
        session.store().dirty_keys().collect::<Vec<_>>(),
        vec![(&users_key().column("name"), EditStatus::Dropped)]
    );
    assert_eq!(
        session.target_catalog().column("public", "users", "name"),
        users_catalog().column("public", "users", "name")
    );
    Ok(())
}

#[test]
fn test_selected_metadata_ships_only_selected_tables() -> anyhow::Result<()> {
    let mut session = session();
    session.add_table("public", orders_table())?;
    session.drop_column("public", "users", "name")?;

    let mut selection = RolloutSelection::new(TEST_DATABASE);
    selection.select_table("public", &orders_table(), true);
    let selected = session.selected_metadata(&selection);

    let public = &selected.schemas[0];
    assert_eq!(public.tables.len(), 2);
    assert_eq!(public.table("users"), Some(&users_table()));
    assert_eq!(public.table("orders"), Some(&orders_table()));
    Ok(())
}

#[tokio::test]
async fn test_diff_ddl_uses_the_applied_copy() -> anyhow::Result<()> {
    let mut session = session();
    let service = FakeDdlDiffService::new();
    let validator = StructuralValidator::new(BTreeSet::new());

    let result = session.diff_ddl(&service, &validator, Engine::Mysql).await;
    assert!(result.is_ok());
    assert_eq!(result.statement, "");
    assert!(service.requests().is_empty());

    session.drop_column("public", "users", "name")?;
    service.push_diff("ALTER TABLE `users` DROP COLUMN `name`;");
    let result = session.diff_ddl(&service, &validator, Engine::Mysql).await;
    assert_eq!(result.statement, "ALTER TABLE `users` DROP COLUMN `name`;");

    let requests = service.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].source_metadata, users_database());
    assert_eq!(requests[0].target_metadata, session.applied_metadata());
    assert_eq!(requests[0].target_metadata.schemas[0].tables[0].columns.len(), 1);
    Ok(())
}
