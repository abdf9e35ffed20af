//! Reconciles a baseline schema tree with an edited working copy.
//!
//! Objects are joined by [`ResourceKey`], built from their names. The merged
//! tree keeps the working copy's objects in their order and appends objects
//! that exist only in the baseline after their siblings, so a dropped object
//! can still be rendered and restored. Every difference is recorded in the
//! [`EditStatusStore`].

use std::collections::BTreeMap;

use crate::{
    catalog::DatabaseCatalog,
    edit_status::{
        EditStatus,
        EditStatusStore,
    },
    metadata::{
        find_by_name,
        find_by_name_mut,
        ColumnMetadata,
        DatabaseMetadata,
        FunctionMetadata,
        NamedObject,
        ProcedureMetadata,
        SchemaConfig,
        SchemaMetadata,
        TableConfig,
        TableMetadata,
        TablePartitionMetadata,
        ViewMetadata,
    },
    metrics::{
        log_classified_objects,
        merge_timer,
    },
    resource_key::ResourceKey,
};

mod catalog;
#[cfg(test)]
mod tests;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MergedDatabase {
    pub metadata: DatabaseMetadata,
    pub catalog: DatabaseCatalog,
}

pub struct DiffMerge<'a> {
    store: &'a mut EditStatusStore,
    database: String,
}

impl<'a> DiffMerge<'a> {
    pub fn new(store: &'a mut EditStatusStore, database: impl Into<String>) -> Self {
        Self {
            store,
            database: database.into(),
        }
    }

    /// Merges metadata and then catalog. `source` is the baseline and
    /// `target` the working copy.
    pub fn merge(
        &mut self,
        source: &DatabaseMetadata,
        target: &DatabaseMetadata,
        source_catalog: &DatabaseCatalog,
        target_catalog: &DatabaseCatalog,
    ) -> MergedDatabase {
        let metadata = self.merge_metadata(source, target);
        let catalog = self.merge_catalog(source_catalog, target_catalog, &metadata);
        MergedDatabase { metadata, catalog }
    }

    /// Rebuilds the store from scratch and returns the merged tree.
    pub fn merge_metadata(
        &mut self,
        source: &DatabaseMetadata,
        target: &DatabaseMetadata,
    ) -> DatabaseMetadata {
        let _timer = merge_timer();
        self.store.clear_edit_status();

        let database_key = ResourceKey::database(&self.database);
        let schemas = self.merge_nodes(&database_key, &source.schemas, &target.schemas);
        let schema_configs = merge_configs(source, target);

        let summary = self.store.summary();
        tracing::debug!(
            database = %self.database,
            created = summary.created,
            updated = summary.updated,
            dropped = summary.dropped,
            "Merged schema metadata"
        );
        log_classified_objects(summary);

        DatabaseMetadata {
            schemas,
            schema_configs,
            ..target.clone()
        }
    }

    fn mark(&mut self, key: ResourceKey, status: EditStatus) {
        self.store.mark_edit_status_by_key(key, status);
    }

    /// Three-way classification of one sibling list.
    ///
    /// With duplicate names in `source` the last one wins.
    fn merge_nodes<T: MergeNode>(
        &mut self,
        parent: &ResourceKey,
        source: &[T],
        target: &[T],
    ) -> Vec<T> {
        let mut source_by_name: BTreeMap<&str, &T> =
            source.iter().map(|node| (node.name(), node)).collect();

        let mut merged = Vec::with_capacity(target.len());
        for node in target {
            let key = T::resource_key(parent, node.name());
            let counterpart = source_by_name.get(node.name()).copied();
            match counterpart {
                Some(source_node) if !node.comparable_eq(source_node) => {
                    self.mark(key.clone(), EditStatus::Updated);
                },
                Some(_) => {},
                None => self.mark(key.clone(), EditStatus::Created),
            }
            merged.push(node.merge_descendants(self, &key, counterpart));
        }
        for node in target {
            source_by_name.remove(node.name());
        }

        // What is left was dropped. Walk `source` for its order and take each
        // name once, as the last duplicate.
        for node in source {
            let Some(retained) = source_by_name.remove(node.name()) else {
                continue;
            };
            self.mark(T::resource_key(parent, node.name()), EditStatus::Dropped);
            merged.push(retained.clone());
        }
        merged
    }
}

/// Configs of the working copy, plus the baseline configs of schemas and
/// tables the working copy dropped so they keep their config until the edits
/// are applied. Configs of live objects always come from the working copy.
fn merge_configs(source: &DatabaseMetadata, target: &DatabaseMetadata) -> Vec<SchemaConfig> {
    let mut merged = target.schema_configs.clone();
    for source_config in &source.schema_configs {
        let Some(target_schema) = target.schema(&source_config.name) else {
            if find_by_name(&merged, &source_config.name).is_none() {
                merged.push(source_config.clone());
            }
            continue;
        };
        let dropped_tables: Vec<TableConfig> = source_config
            .table_configs
            .iter()
            .filter(|table_config| target_schema.table(&table_config.name).is_none())
            .cloned()
            .collect();
        if dropped_tables.is_empty() {
            continue;
        }
        match find_by_name_mut(&mut merged, &source_config.name) {
            Some(config) => {
                for table_config in dropped_tables {
                    if find_by_name(&config.table_configs, &table_config.name).is_none() {
                        config.table_configs.push(table_config);
                    }
                }
            },
            None => merged.push(SchemaConfig {
                name: source_config.name.clone(),
                table_configs: dropped_tables,
            }),
        }
    }
    merged
}

/// A node of the schema tree that takes part in the three-way merge.
trait MergeNode: NamedObject + Clone {
    fn resource_key(parent: &ResourceKey, name: &str) -> ResourceKey;

    /// Compares the fields a user can edit. Children and introspection
    /// statistics are not compared.
    fn comparable_eq(&self, other: &Self) -> bool;

    /// Returns this target node with its children merged against `source`.
    /// A node without a source counterpart is merged against an empty
    /// source, which marks every descendant created.
    fn merge_descendants(
        &self,
        _merge: &mut DiffMerge<'_>,
        _key: &ResourceKey,
        _source: Option<&Self>,
    ) -> Self {
        self.clone()
    }
}

impl MergeNode for SchemaMetadata {
    fn resource_key(parent: &ResourceKey, name: &str) -> ResourceKey {
        parent.schema(name)
    }

    fn comparable_eq(&self, other: &Self) -> bool {
        self.owner == other.owner && self.comment == other.comment
    }

    fn merge_descendants(
        &self,
        merge: &mut DiffMerge<'_>,
        key: &ResourceKey,
        source: Option<&Self>,
    ) -> Self {
        let empty = SchemaMetadata::default();
        let source = source.unwrap_or(&empty);
        SchemaMetadata {
            tables: merge.merge_nodes(key, &source.tables, &self.tables),
            views: merge.merge_nodes(key, &source.views, &self.views),
            procedures: merge.merge_nodes(key, &source.procedures, &self.procedures),
            functions: merge.merge_nodes(key, &source.functions, &self.functions),
            ..self.clone()
        }
    }
}

impl MergeNode for TableMetadata {
    fn resource_key(parent: &ResourceKey, name: &str) -> ResourceKey {
        parent.table(name)
    }

    fn comparable_eq(&self, other: &Self) -> bool {
        self.engine == other.engine
            && self.collation == other.collation
            && self.comment == other.comment
            && self.user_comment == other.user_comment
            && self.create_options == other.create_options
            && self.indexes.len() == other.indexes.len()
            && self
                .indexes
                .iter()
                .all(|index| find_by_name(&other.indexes, &index.name) == Some(index))
            && self.foreign_keys == other.foreign_keys
    }

    fn merge_descendants(
        &self,
        merge: &mut DiffMerge<'_>,
        key: &ResourceKey,
        source: Option<&Self>,
    ) -> Self {
        let empty = TableMetadata::default();
        let source = source.unwrap_or(&empty);
        TableMetadata {
            columns: merge.merge_nodes(key, &source.columns, &self.columns),
            partitions: merge.merge_nodes(key, &source.partitions, &self.partitions),
            ..self.clone()
        }
    }
}

impl MergeNode for ColumnMetadata {
    fn resource_key(parent: &ResourceKey, name: &str) -> ResourceKey {
        parent.column(name)
    }

    fn comparable_eq(&self, other: &Self) -> bool {
        self.column_type == other.column_type
            && self.default_value == other.default_value
            && self.on_update == other.on_update
            && self.nullable == other.nullable
            && self.character_set == other.character_set
            && self.collation == other.collation
            && self.comment == other.comment
            && self.user_comment == other.user_comment
    }
}

impl MergeNode for TablePartitionMetadata {
    fn resource_key(parent: &ResourceKey, name: &str) -> ResourceKey {
        parent.partition(name)
    }

    fn comparable_eq(&self, other: &Self) -> bool {
        self.partition_type == other.partition_type
            && self.expression == other.expression
            && self.value == other.value
            && self.use_default == other.use_default
    }

    fn merge_descendants(
        &self,
        merge: &mut DiffMerge<'_>,
        key: &ResourceKey,
        source: Option<&Self>,
    ) -> Self {
        let subpartitions = source.map(|source| &source.subpartitions[..]).unwrap_or(&[]);
        TablePartitionMetadata {
            subpartitions: merge.merge_nodes(key, subpartitions, &self.subpartitions),
            ..self.clone()
        }
    }
}

impl MergeNode for ViewMetadata {
    fn resource_key(parent: &ResourceKey, name: &str) -> ResourceKey {
        parent.view(name)
    }

    fn comparable_eq(&self, other: &Self) -> bool {
        self.definition == other.definition && self.comment == other.comment
    }
}

impl MergeNode for ProcedureMetadata {
    fn resource_key(parent: &ResourceKey, name: &str) -> ResourceKey {
        parent.procedure(name)
    }

    fn comparable_eq(&self, other: &Self) -> bool {
        self.definition == other.definition
    }
}

impl MergeNode for FunctionMetadata {
    fn resource_key(parent: &ResourceKey, name: &str) -> ResourceKey {
        parent.function(name)
    }

    fn comparable_eq(&self, other: &Self) -> bool {
        self.definition == other.definition
    }
}
