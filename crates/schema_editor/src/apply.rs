//! Produces the tree that is actually submitted: every object whose effective
//! status is dropped is removed, and configs left without an owner are
//! pruned.

use crate::{
    catalog::{
        DatabaseCatalog,
        SchemaCatalog,
        TableCatalog,
    },
    edit_status::{
        EditStatus,
        EditStatusStore,
    },
    metadata::{
        find_by_name,
        DatabaseMetadata,
        NamedObject,
        SchemaConfig,
        SchemaMetadata,
        TableConfig,
        TableMetadata,
        TablePartitionMetadata,
    },
    metrics::apply_timer,
    resource_key::ResourceKey,
};

/// Pure and idempotent.
pub fn apply_edit_status(
    database: &str,
    metadata: &DatabaseMetadata,
    store: &EditStatusStore,
) -> DatabaseMetadata {
    let _timer = apply_timer();
    let database_key = ResourceKey::database(database);
    let schemas = retain_live(&metadata.schemas, store, |s| database_key.schema(&s.name))
        .map(|(schema, key)| apply_schema(schema, &key, store))
        .collect();
    let mut applied = DatabaseMetadata {
        schemas,
        ..metadata.clone()
    };
    cleanup_unused_configs(&mut applied);
    applied
}

fn retain_live<'a, T: NamedObject>(
    objects: &'a [T],
    store: &'a EditStatusStore,
    key: impl Fn(&T) -> ResourceKey + 'a,
) -> impl Iterator<Item = (&'a T, ResourceKey)> + 'a {
    objects
        .iter()
        .map(move |object| (object, key(object)))
        .filter(move |(_, key)| store.effective_status(key) != EditStatus::Dropped)
}

fn apply_schema(schema: &SchemaMetadata, key: &ResourceKey, store: &EditStatusStore) -> SchemaMetadata {
    SchemaMetadata {
        tables: retain_live(&schema.tables, store, |t| key.table(&t.name))
            .map(|(table, key)| apply_table(table, &key, store))
            .collect(),
        views: retain_live(&schema.views, store, |v| key.view(&v.name))
            .map(|(view, _)| view.clone())
            .collect(),
        procedures: retain_live(&schema.procedures, store, |p| key.procedure(&p.name))
            .map(|(procedure, _)| procedure.clone())
            .collect(),
        functions: retain_live(&schema.functions, store, |f| key.function(&f.name))
            .map(|(function, _)| function.clone())
            .collect(),
        ..schema.clone()
    }
}

fn apply_table(table: &TableMetadata, key: &ResourceKey, store: &EditStatusStore) -> TableMetadata {
    TableMetadata {
        columns: retain_live(&table.columns, store, |c| key.column(&c.name))
            .map(|(column, _)| column.clone())
            .collect(),
        partitions: apply_partitions(&table.partitions, key, store),
        ..table.clone()
    }
}

fn apply_partitions(
    partitions: &[TablePartitionMetadata],
    parent: &ResourceKey,
    store: &EditStatusStore,
) -> Vec<TablePartitionMetadata> {
    retain_live(partitions, store, |p| parent.partition(&p.name))
        .map(|(partition, key)| TablePartitionMetadata {
            subpartitions: apply_partitions(&partition.subpartitions, &key, store),
            ..partition.clone()
        })
        .collect()
}

/// Removes configs whose object is gone from `metadata`, columns first so a
/// table config left with no column configs is removed too, and likewise for
/// schema configs.
pub fn cleanup_unused_configs(metadata: &mut DatabaseMetadata) {
    let schemas = &metadata.schemas;
    metadata.schema_configs.retain_mut(|schema_config| {
        let Some(schema) = find_by_name(schemas, &schema_config.name) else {
            return false;
        };
        cleanup_schema_config(schema_config, schema);
        !schema_config.table_configs.is_empty()
    });
}

fn cleanup_schema_config(schema_config: &mut SchemaConfig, schema: &SchemaMetadata) {
    schema_config.table_configs.retain_mut(|table_config| {
        let Some(table) = schema.table(&table_config.name) else {
            return false;
        };
        cleanup_table_config(table_config, table);
        !table_config.column_configs.is_empty()
    });
}

pub(crate) fn cleanup_table_config(table_config: &mut TableConfig, table: &TableMetadata) {
    table_config
        .column_configs
        .retain(|column_config| table.column(&column_config.name).is_some());
}

/// Drops the catalog entries of dropped objects.
pub fn apply_catalog_edit_status(
    database: &str,
    catalog: &DatabaseCatalog,
    store: &EditStatusStore,
) -> DatabaseCatalog {
    let database_key = ResourceKey::database(database);
    let schemas = retain_live(&catalog.schemas, store, |s| database_key.schema(&s.name))
        .map(|(schema, schema_key)| SchemaCatalog {
            name: schema.name.clone(),
            tables: retain_live(&schema.tables, store, |t| schema_key.table(&t.name))
                .map(|(table, table_key)| TableCatalog {
                    columns: retain_live(&table.columns, store, |c| table_key.column(&c.name))
                        .map(|(column, _)| column.clone())
                        .collect(),
                    ..table.clone()
                })
                .collect(),
        })
        .collect();
    DatabaseCatalog {
        name: catalog.name.clone(),
        schemas,
    }
}
