//! The schema tree edited by the user, as returned by schema introspection.
//!
//! Every named node's `name` is unique among its siblings. Trees deserialize
//! from the introspection service's camelCase JSON with every field optional.

use std::collections::BTreeMap;

use serde::{
    Deserialize,
    Serialize,
};

/// Anything in the schema, catalog or config trees that is identified by its
/// name among its siblings.
pub trait NamedObject {
    fn name(&self) -> &str;
}

macro_rules! impl_named_object {
    ($($ty:ty),* $(,)?) => {
        $(
            impl NamedObject for $ty {
                fn name(&self) -> &str {
                    &self.name
                }
            }
        )*
    };
}

impl_named_object!(
    SchemaMetadata,
    TableMetadata,
    ColumnMetadata,
    TablePartitionMetadata,
    ViewMetadata,
    ProcedureMetadata,
    FunctionMetadata,
    IndexMetadata,
    SchemaConfig,
    TableConfig,
    ColumnConfig,
);

pub fn find_by_name<'a, T: NamedObject>(objects: &'a [T], name: &str) -> Option<&'a T> {
    objects.iter().find(|object| object.name() == name)
}

pub fn find_by_name_mut<'a, T: NamedObject>(objects: &'a mut [T], name: &str) -> Option<&'a mut T> {
    objects.iter_mut().find(|object| object.name() == name)
}

#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum Engine {
    #[default]
    EngineUnspecified,
    Mysql,
    Tidb,
    Mariadb,
    Oceanbase,
    Postgres,
    Redshift,
    Oracle,
    Mssql,
    Snowflake,
    Clickhouse,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DatabaseMetadata {
    pub name: String,
    pub character_set: String,
    pub collation: String,
    pub owner: String,
    pub schemas: Vec<SchemaMetadata>,
    pub schema_configs: Vec<SchemaConfig>,
}

impl DatabaseMetadata {
    pub fn schema(&self, name: &str) -> Option<&SchemaMetadata> {
        find_by_name(&self.schemas, name)
    }

    pub fn schema_mut(&mut self, name: &str) -> Option<&mut SchemaMetadata> {
        find_by_name_mut(&mut self.schemas, name)
    }

    pub fn schema_config(&self, name: &str) -> Option<&SchemaConfig> {
        find_by_name(&self.schema_configs, name)
    }

    pub fn table_config(&self, schema: &str, table: &str) -> Option<&TableConfig> {
        self.schema_config(schema)?.table_config(table)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SchemaMetadata {
    pub name: String,
    pub owner: String,
    pub comment: String,
    pub tables: Vec<TableMetadata>,
    pub views: Vec<ViewMetadata>,
    pub procedures: Vec<ProcedureMetadata>,
    pub functions: Vec<FunctionMetadata>,
}

impl SchemaMetadata {
    pub fn table(&self, name: &str) -> Option<&TableMetadata> {
        find_by_name(&self.tables, name)
    }

    pub fn table_mut(&mut self, name: &str) -> Option<&mut TableMetadata> {
        find_by_name_mut(&mut self.tables, name)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TableMetadata {
    pub name: String,
    pub columns: Vec<ColumnMetadata>,
    pub indexes: Vec<IndexMetadata>,
    pub foreign_keys: Vec<ForeignKeyMetadata>,
    pub partitions: Vec<TablePartitionMetadata>,
    pub engine: String,
    pub collation: String,
    pub comment: String,
    pub user_comment: String,
    pub create_options: String,
    // Statistics reported by introspection. Never compared.
    pub row_count: i64,
    pub data_size: i64,
    pub index_size: i64,
    pub data_free: i64,
}

impl TableMetadata {
    pub fn column(&self, name: &str) -> Option<&ColumnMetadata> {
        find_by_name(&self.columns, name)
    }

    pub fn column_mut(&mut self, name: &str) -> Option<&mut ColumnMetadata> {
        find_by_name_mut(&mut self.columns, name)
    }

    pub fn primary_key(&self) -> Option<&IndexMetadata> {
        self.indexes.iter().find(|index| index.primary)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ColumnDefault {
    Null,
    Value(String),
    Expression(String),
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ColumnMetadata {
    pub name: String,
    /// Ordinal position reported by introspection. Never compared.
    pub position: i32,
    pub default_value: Option<ColumnDefault>,
    pub on_update: String,
    pub nullable: bool,
    #[serde(rename = "type")]
    pub column_type: String,
    pub character_set: String,
    pub collation: String,
    pub comment: String,
    pub user_comment: String,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PartitionType {
    #[default]
    TypeUnspecified,
    Range,
    RangeColumns,
    List,
    ListColumns,
    Hash,
    LinearHash,
    Key,
    LinearKey,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TablePartitionMetadata {
    pub name: String,
    #[serde(rename = "type")]
    pub partition_type: PartitionType,
    pub expression: String,
    pub value: String,
    pub use_default: String,
    pub subpartitions: Vec<TablePartitionMetadata>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IndexMetadata {
    pub name: String,
    pub expressions: Vec<String>,
    #[serde(rename = "type")]
    pub index_type: String,
    pub unique: bool,
    pub primary: bool,
    pub visible: bool,
    pub comment: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ForeignKeyMetadata {
    pub name: String,
    pub columns: Vec<String>,
    pub referenced_schema: String,
    pub referenced_table: String,
    pub referenced_columns: Vec<String>,
    pub on_delete: String,
    pub on_update: String,
    pub match_type: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ViewMetadata {
    pub name: String,
    pub definition: String,
    pub comment: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProcedureMetadata {
    pub name: String,
    pub definition: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FunctionMetadata {
    pub name: String,
    pub definition: String,
}

/// Sparse per-schema configuration. Pruned when the schema disappears.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SchemaConfig {
    pub name: String,
    pub table_configs: Vec<TableConfig>,
}

impl SchemaConfig {
    pub fn table_config(&self, name: &str) -> Option<&TableConfig> {
        find_by_name(&self.table_configs, name)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TableConfig {
    pub name: String,
    pub classification_id: String,
    pub column_configs: Vec<ColumnConfig>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ColumnConfig {
    pub name: String,
    pub semantic_type_id: String,
    pub labels: BTreeMap<String, String>,
    pub classification_id: String,
}
