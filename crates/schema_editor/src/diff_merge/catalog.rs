use super::DiffMerge;
use crate::{
    catalog::{
        ColumnCatalog,
        DatabaseCatalog,
        SchemaCatalog,
        TableCatalog,
    },
    edit_status::EditStatus,
    metadata::DatabaseMetadata,
    resource_key::ResourceKey,
};

/// Which side's catalog entry an object takes without being diffed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Mirror {
    Source,
    Target,
}

impl Mirror {
    fn from_status(status: Option<EditStatus>) -> Option<Self> {
        match status? {
            EditStatus::Dropped => Some(Mirror::Source),
            EditStatus::Created => Some(Mirror::Target),
            EditStatus::Normal | EditStatus::Updated => None,
        }
    }

    fn pick<'a, T>(self, source: Option<&'a T>, target: Option<&'a T>) -> Option<&'a T> {
        match self {
            Mirror::Source => source,
            Mirror::Target => target,
        }
    }
}

impl DiffMerge<'_> {
    /// Builds the catalog for `merged`, which must come from
    /// [`DiffMerge::merge_metadata`] on the same store.
    ///
    /// Created and dropped objects take their catalog entry from the side
    /// they exist on. Other objects keep the working copy's entry and are
    /// marked updated when its payload differs from the baseline's. Catalog
    /// differences never override a created or dropped mark.
    pub fn merge_catalog(
        &mut self,
        source_catalog: &DatabaseCatalog,
        target_catalog: &DatabaseCatalog,
        merged: &DatabaseMetadata,
    ) -> DatabaseCatalog {
        let database_key = ResourceKey::database(&self.database);
        let mut schemas = Vec::new();
        for schema in &merged.schemas {
            let schema_key = database_key.schema(&schema.name);
            let schema_mirror = Mirror::from_status(self.store.get_edit_status_by_key(&schema_key));
            let source_schema = source_catalog.schema(&schema.name);
            let target_schema = target_catalog.schema(&schema.name);

            if let Some(mirror) = schema_mirror {
                if let Some(entry) = mirror.pick(source_schema, target_schema) {
                    schemas.push(entry.clone());
                }
                continue;
            }

            let mut tables = Vec::new();
            for table in &schema.tables {
                let table_key = schema_key.table(&table.name);
                let source_table = source_schema.and_then(|s| s.table(&table.name));
                let target_table = target_schema.and_then(|s| s.table(&table.name));
                let table_status = self.store.get_edit_status_by_key(&table_key);

                if let Some(mirror) = Mirror::from_status(table_status) {
                    if let Some(entry) = mirror.pick(source_table, target_table) {
                        tables.push(entry.clone());
                    }
                    continue;
                }

                let empty = TableCatalog::default();
                if !source_table
                    .unwrap_or(&empty)
                    .payload_eq(target_table.unwrap_or(&empty))
                {
                    self.mark_catalog_updated(table_key.clone());
                }

                let mut columns = Vec::new();
                for column in &table.columns {
                    let column_key = table_key.column(&column.name);
                    let source_column = source_table.and_then(|t| t.column(&column.name));
                    let target_column = target_table.and_then(|t| t.column(&column.name));
                    let column_status = self.store.get_edit_status_by_key(&column_key);
                    let entry = match Mirror::from_status(column_status) {
                        Some(mirror) => mirror.pick(source_column, target_column),
                        None => {
                            let empty = ColumnCatalog::default();
                            if !source_column
                                .unwrap_or(&empty)
                                .payload_eq(target_column.unwrap_or(&empty))
                            {
                                self.mark_catalog_updated(column_key);
                            }
                            target_column
                        },
                    };
                    if let Some(entry) = entry {
                        columns.push(entry.clone());
                    }
                }

                let entry = TableCatalog {
                    name: table.name.clone(),
                    classification: target_table
                        .map(|t| t.classification.clone())
                        .unwrap_or_default(),
                    columns,
                };
                if target_table.is_some() || !entry.is_empty() {
                    tables.push(entry);
                }
            }

            if target_schema.is_some() || !tables.is_empty() {
                schemas.push(SchemaCatalog {
                    name: schema.name.clone(),
                    tables,
                });
            }
        }

        let name = if target_catalog.name.is_empty() {
            merged.name.clone()
        } else {
            target_catalog.name.clone()
        };
        DatabaseCatalog { name, schemas }
    }

    fn mark_catalog_updated(&mut self, key: ResourceKey) {
        if self.store.get_edit_status_by_key(&key).is_none() {
            self.mark(key, EditStatus::Updated);
        }
    }
}
