//! Non-structural annotations (data classification, semantic types, labels)
//! attached in parallel to the schema tree and keyed by the same names.

use std::collections::BTreeMap;

use serde::{
    Deserialize,
    Serialize,
};

use crate::metadata::{
    find_by_name,
    NamedObject,
};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DatabaseCatalog {
    pub name: String,
    pub schemas: Vec<SchemaCatalog>,
}

impl DatabaseCatalog {
    pub fn schema(&self, name: &str) -> Option<&SchemaCatalog> {
        find_by_name(&self.schemas, name)
    }

    pub fn table(&self, schema: &str, table: &str) -> Option<&TableCatalog> {
        self.schema(schema)?.table(table)
    }

    pub fn column(&self, schema: &str, table: &str, column: &str) -> Option<&ColumnCatalog> {
        self.table(schema, table)?.column(column)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SchemaCatalog {
    pub name: String,
    pub tables: Vec<TableCatalog>,
}

impl SchemaCatalog {
    pub fn table(&self, name: &str) -> Option<&TableCatalog> {
        find_by_name(&self.tables, name)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TableCatalog {
    pub name: String,
    pub classification: String,
    pub columns: Vec<ColumnCatalog>,
}

impl TableCatalog {
    pub fn column(&self, name: &str) -> Option<&ColumnCatalog> {
        find_by_name(&self.columns, name)
    }

    /// Whether the table-level payload matches, ignoring columns.
    pub fn payload_eq(&self, other: &Self) -> bool {
        self.classification == other.classification
    }

    pub fn is_empty(&self) -> bool {
        self.classification.is_empty() && self.columns.is_empty()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ColumnCatalog {
    pub name: String,
    pub semantic_type: String,
    pub labels: BTreeMap<String, String>,
    pub classification: String,
}

impl ColumnCatalog {
    pub fn payload_eq(&self, other: &Self) -> bool {
        self.semantic_type == other.semantic_type
            && self.labels == other.labels
            && self.classification == other.classification
    }

    pub fn is_empty(&self) -> bool {
        self.semantic_type.is_empty() && self.labels.is_empty() && self.classification.is_empty()
    }
}

impl NamedObject for SchemaCatalog {
    fn name(&self) -> &str {
        &self.name
    }
}

impl NamedObject for TableCatalog {
    fn name(&self) -> &str {
        &self.name
    }
}

impl NamedObject for ColumnCatalog {
    fn name(&self) -> &str {
        &self.name
    }
}
