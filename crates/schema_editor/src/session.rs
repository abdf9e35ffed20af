//! An editing session over one database.
//!
//! The session keeps the merged tree as its working copy: objects removed by
//! the user stay in it, marked dropped, until the edits are applied. Edits are
//! recorded incrementally. [`SchemaEditSession::recompute`] rebuilds every
//! status from scratch.

use anyhow::Context;
use errors::ErrorMetadata;

use crate::{
    apply::{
        apply_catalog_edit_status,
        apply_edit_status,
    },
    catalog::DatabaseCatalog,
    diff_ddl::{
        self,
        DdlDiffService,
        DiffDdlResult,
        SchemaValidator,
    },
    diff_merge::DiffMerge,
    edit_status::{
        EditStatus,
        EditStatusStore,
    },
    knobs::DDL_DIFF_CLASSIFICATION_FROM_CONFIG,
    metadata::{
        find_by_name,
        find_by_name_mut,
        ColumnMetadata,
        DatabaseMetadata,
        Engine,
        NamedObject,
        SchemaMetadata,
        TableMetadata,
    },
    resource_key::ResourceKey,
    selection::RolloutSelection,
    selective_apply::apply_selected_metadata,
};

#[cfg(test)]
mod tests;

pub struct SchemaEditSession {
    database: String,
    baseline: DatabaseMetadata,
    baseline_catalog: DatabaseCatalog,
    target: DatabaseMetadata,
    target_catalog: DatabaseCatalog,
    store: EditStatusStore,
}

impl SchemaEditSession {
    /// Starts with a working copy identical to `baseline`.
    pub fn new(
        database: impl Into<String>,
        baseline: DatabaseMetadata,
        baseline_catalog: DatabaseCatalog,
    ) -> Self {
        let database = database.into();
        tracing::info!(
            database = %database,
            schemas = baseline.schemas.len(),
            "Opened schema edit session"
        );
        Self {
            database,
            target: baseline.clone(),
            target_catalog: baseline_catalog.clone(),
            baseline,
            baseline_catalog,
            store: EditStatusStore::new(),
        }
    }

    /// Resumes editing from a previously saved working copy.
    pub fn with_target(
        database: impl Into<String>,
        baseline: DatabaseMetadata,
        baseline_catalog: DatabaseCatalog,
        target: &DatabaseMetadata,
        target_catalog: &DatabaseCatalog,
    ) -> Self {
        let mut session = Self::new(database, baseline, baseline_catalog);
        session.merge_from(target, target_catalog);
        session
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn baseline(&self) -> &DatabaseMetadata {
        &self.baseline
    }

    /// The merged working copy, dropped objects included.
    pub fn target(&self) -> &DatabaseMetadata {
        &self.target
    }

    pub fn target_catalog(&self) -> &DatabaseCatalog {
        &self.target_catalog
    }

    pub fn store(&self) -> &EditStatusStore {
        &self.store
    }

    pub fn add_table(&mut self, schema: &str, table: TableMetadata) -> anyhow::Result<()> {
        let key = self.schema_key(schema).table(&table.name);
        let schema_metadata = find_schema(&mut self.target, schema)?;
        if schema_metadata.table(&table.name).is_some() {
            anyhow::bail!(ErrorMetadata::bad_request(
                "DuplicateTable",
                format!("Table \"{}\" already exists in \"{schema}\"", table.name)
            ));
        }
        for column in &table.columns {
            self.store
                .mark_edit_status_by_key(key.column(&column.name), EditStatus::Created);
        }
        self.store.mark_edit_status_by_key(key, EditStatus::Created);
        schema_metadata.tables.push(table);
        Ok(())
    }

    /// A table created in this session disappears. Any other table is
    /// marked dropped and stays until the edits are applied.
    pub fn drop_table(&mut self, schema: &str, table: &str) -> anyhow::Result<()> {
        let key = self.schema_key(schema).table(table);
        let schema_metadata = find_schema(&mut self.target, schema)?;
        if drop_named(&mut self.store, &mut schema_metadata.tables, key, "Table")? {
            if let Some(schema_catalog) = find_by_name_mut(&mut self.target_catalog.schemas, schema)
            {
                schema_catalog.tables.retain(|t| t.name != table);
            }
        }
        Ok(())
    }

    pub fn restore_table(&mut self, schema: &str, table: &str) -> anyhow::Result<()> {
        let key = self.schema_key(schema).table(table);
        let schema_metadata = find_schema(&mut self.target, schema)?;
        if restore_named(&mut self.store, &schema_metadata.tables, &key, "Table")? {
            self.recompute();
        }
        Ok(())
    }

    pub fn add_column(
        &mut self,
        schema: &str,
        table: &str,
        column: ColumnMetadata,
    ) -> anyhow::Result<()> {
        let key = self.schema_key(schema).table(table).column(&column.name);
        let table_metadata = find_table(&mut self.target, schema, table)?;
        if table_metadata.column(&column.name).is_some() {
            anyhow::bail!(ErrorMetadata::bad_request(
                "DuplicateColumn",
                format!("Column \"{}\" already exists in \"{table}\"", column.name)
            ));
        }
        self.store.mark_edit_status_by_key(key, EditStatus::Created);
        table_metadata.columns.push(column);
        Ok(())
    }

    pub fn drop_column(&mut self, schema: &str, table: &str, column: &str) -> anyhow::Result<()> {
        let key = self.schema_key(schema).table(table).column(column);
        let table_metadata = find_table(&mut self.target, schema, table)?;
        if drop_named(&mut self.store, &mut table_metadata.columns, key, "Column")? {
            let table_catalog = find_by_name_mut(&mut self.target_catalog.schemas, schema)
                .and_then(|s| find_by_name_mut(&mut s.tables, table));
            if let Some(table_catalog) = table_catalog {
                table_catalog.columns.retain(|c| c.name != column);
            }
        }
        Ok(())
    }

    pub fn restore_column(
        &mut self,
        schema: &str,
        table: &str,
        column: &str,
    ) -> anyhow::Result<()> {
        let key = self.schema_key(schema).table(table).column(column);
        let table_metadata = find_table(&mut self.target, schema, table)?;
        if restore_named(&mut self.store, &table_metadata.columns, &key, "Column")? {
            self.recompute();
        }
        Ok(())
    }

    /// Edits a column in place. Renames are rejected since the name is the
    /// column's identity; drop and add a column instead.
    pub fn update_column(
        &mut self,
        schema: &str,
        table: &str,
        column: &str,
        update: impl FnOnce(&mut ColumnMetadata),
    ) -> anyhow::Result<()> {
        let key = self.schema_key(schema).table(table).column(column);
        let table_metadata = find_table(&mut self.target, schema, table)?;
        let existing = table_metadata
            .column_mut(column)
            .with_context(|| not_found("Column", column))?;
        let mut updated = existing.clone();
        update(&mut updated);
        if updated.name != existing.name {
            anyhow::bail!(ErrorMetadata::bad_request(
                "ColumnRenameUnsupported",
                format!("Cannot rename column \"{column}\" to \"{}\"", updated.name)
            ));
        }
        if updated == *existing {
            return Ok(());
        }
        *existing = updated;
        match self.store.get_edit_status_by_key(&key) {
            Some(EditStatus::Created | EditStatus::Dropped) => {},
            _ => self.store.mark_edit_status_by_key(key, EditStatus::Updated),
        }
        Ok(())
    }

    pub fn drop_view(&mut self, schema: &str, view: &str) -> anyhow::Result<()> {
        let key = self.schema_key(schema).view(view);
        let schema_metadata = find_schema(&mut self.target, schema)?;
        drop_named(&mut self.store, &mut schema_metadata.views, key, "View")?;
        Ok(())
    }

    pub fn restore_view(&mut self, schema: &str, view: &str) -> anyhow::Result<()> {
        let key = self.schema_key(schema).view(view);
        let schema_metadata = find_schema(&mut self.target, schema)?;
        if restore_named(&mut self.store, &schema_metadata.views, &key, "View")? {
            self.recompute();
        }
        Ok(())
    }

    pub fn drop_procedure(&mut self, schema: &str, procedure: &str) -> anyhow::Result<()> {
        let key = self.schema_key(schema).procedure(procedure);
        let schema_metadata = find_schema(&mut self.target, schema)?;
        drop_named(&mut self.store, &mut schema_metadata.procedures, key, "Procedure")?;
        Ok(())
    }

    pub fn restore_procedure(&mut self, schema: &str, procedure: &str) -> anyhow::Result<()> {
        let key = self.schema_key(schema).procedure(procedure);
        let schema_metadata = find_schema(&mut self.target, schema)?;
        if restore_named(&mut self.store, &schema_metadata.procedures, &key, "Procedure")? {
            self.recompute();
        }
        Ok(())
    }

    pub fn drop_function(&mut self, schema: &str, function: &str) -> anyhow::Result<()> {
        let key = self.schema_key(schema).function(function);
        let schema_metadata = find_schema(&mut self.target, schema)?;
        drop_named(&mut self.store, &mut schema_metadata.functions, key, "Function")?;
        Ok(())
    }

    pub fn restore_function(&mut self, schema: &str, function: &str) -> anyhow::Result<()> {
        let key = self.schema_key(schema).function(function);
        let schema_metadata = find_schema(&mut self.target, schema)?;
        if restore_named(&mut self.store, &schema_metadata.functions, &key, "Function")? {
            self.recompute();
        }
        Ok(())
    }

    /// Replaces the baseline, e.g. after the database changed underneath
    /// the session. Pending edits are kept and classified again.
    pub fn rebase(&mut self, baseline: DatabaseMetadata, baseline_catalog: DatabaseCatalog) {
        let working = self.applied_metadata();
        let working_catalog = self.applied_catalog();
        self.baseline = baseline;
        self.baseline_catalog = baseline_catalog;
        self.merge_from(&working, &working_catalog);
        tracing::info!(
            database = %self.database,
            pending = self.store.len(),
            "Rebased schema edit session"
        );
    }

    pub fn recompute(&mut self) {
        let working = self.applied_metadata();
        let working_catalog = self.applied_catalog();
        self.merge_from(&working, &working_catalog);
    }

    /// The working copy with every dropped object removed.
    pub fn applied_metadata(&self) -> DatabaseMetadata {
        apply_edit_status(&self.database, &self.target, &self.store)
    }

    pub fn applied_catalog(&self) -> DatabaseCatalog {
        apply_catalog_edit_status(&self.database, &self.target_catalog, &self.store)
    }

    pub fn selected_metadata(&self, selection: &RolloutSelection) -> DatabaseMetadata {
        apply_selected_metadata(
            &self.database,
            &self.baseline,
            &self.target,
            &self.store,
            selection,
        )
    }

    /// DDL that takes the baseline to the applied working copy.
    pub async fn diff_ddl(
        &self,
        service: &dyn DdlDiffService,
        validator: &dyn SchemaValidator,
        engine: Engine,
    ) -> DiffDdlResult {
        let applied = self.applied_metadata();
        diff_ddl::diff_ddl(
            service,
            validator,
            &self.baseline,
            &applied,
            engine,
            *DDL_DIFF_CLASSIFICATION_FROM_CONFIG,
        )
        .await
    }

    fn schema_key(&self, schema: &str) -> ResourceKey {
        ResourceKey::database(&self.database).schema(schema)
    }

    fn merge_from(&mut self, working: &DatabaseMetadata, working_catalog: &DatabaseCatalog) {
        let merged = DiffMerge::new(&mut self.store, self.database.as_str()).merge(
            &self.baseline,
            working,
            &self.baseline_catalog,
            working_catalog,
        );
        self.target = merged.metadata;
        self.target_catalog = merged.catalog;
    }
}

fn not_found(kind: &str, name: &str) -> ErrorMetadata {
    ErrorMetadata::not_found(
        format!("{kind}NotFound"),
        format!("{kind} \"{name}\" does not exist"),
    )
}

fn find_schema<'a>(
    metadata: &'a mut DatabaseMetadata,
    schema: &str,
) -> anyhow::Result<&'a mut SchemaMetadata> {
    metadata
        .schema_mut(schema)
        .with_context(|| not_found("Schema", schema))
}

fn find_table<'a>(
    metadata: &'a mut DatabaseMetadata,
    schema: &str,
    table: &str,
) -> anyhow::Result<&'a mut TableMetadata> {
    find_schema(metadata, schema)?
        .table_mut(table)
        .with_context(|| not_found("Table", table))
}

fn key_name(key: &ResourceKey) -> &str {
    key.last().map(|segment| segment.name()).unwrap_or_default()
}

/// Returns whether the object was removed outright.
fn drop_named<T: NamedObject>(
    store: &mut EditStatusStore,
    objects: &mut Vec<T>,
    key: ResourceKey,
    kind: &str,
) -> anyhow::Result<bool> {
    let name = key_name(&key).to_owned();
    if find_by_name(objects, &name).is_none() {
        anyhow::bail!(not_found(kind, &name));
    }
    if store.get_edit_status_by_key(&key) == Some(EditStatus::Created) {
        objects.retain(|object| object.name() != name);
        store.remove_edit_status_tree(&key);
        return Ok(true);
    }
    store.mark_edit_status_by_key(key, EditStatus::Dropped);
    Ok(false)
}

/// Returns whether a dropped mark was removed.
fn restore_named<T: NamedObject>(
    store: &mut EditStatusStore,
    objects: &[T],
    key: &ResourceKey,
    kind: &str,
) -> anyhow::Result<bool> {
    let name = key_name(key);
    if find_by_name(objects, name).is_none() {
        anyhow::bail!(not_found(kind, name));
    }
    if store.get_edit_status_by_key(key) != Some(EditStatus::Dropped) {
        return Ok(false);
    }
    store.remove_edit_status_by_key(key);
    Ok(true)
}
