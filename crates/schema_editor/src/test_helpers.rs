//! Builders, strategies and fakes shared by tests.

use std::collections::VecDeque;

use async_trait::async_trait;
use parking_lot::Mutex;
use proptest::prelude::*;

use crate::{
    diff_ddl::{
        DdlDiffService,
        DiffMetadataRequest,
        DiffMetadataResponse,
    },
    metadata::{
        ColumnConfig,
        ColumnMetadata,
        DatabaseMetadata,
        IndexMetadata,
        SchemaConfig,
        SchemaMetadata,
        TableConfig,
        TableMetadata,
        TablePartitionMetadata,
        ViewMetadata,
    },
};

pub const TEST_DATABASE: &str = "employee";

pub fn column(name: &str, column_type: &str) -> ColumnMetadata {
    ColumnMetadata {
        name: name.to_string(),
        column_type: column_type.to_string(),
        ..Default::default()
    }
}

pub fn table(name: &str, columns: Vec<ColumnMetadata>) -> TableMetadata {
    TableMetadata {
        name: name.to_string(),
        columns,
        ..Default::default()
    }
}

pub fn primary_key(columns: &[&str]) -> IndexMetadata {
    IndexMetadata {
        name: "PRIMARY".to_string(),
        expressions: columns.iter().map(|c| c.to_string()).collect(),
        primary: true,
        unique: true,
        visible: true,
        ..Default::default()
    }
}

pub fn partition(name: &str, subpartitions: Vec<TablePartitionMetadata>) -> TablePartitionMetadata {
    TablePartitionMetadata {
        name: name.to_string(),
        subpartitions,
        ..Default::default()
    }
}

pub fn view(name: &str, definition: &str) -> ViewMetadata {
    ViewMetadata {
        name: name.to_string(),
        definition: definition.to_string(),
        ..Default::default()
    }
}

pub fn schema(name: &str, tables: Vec<TableMetadata>) -> SchemaMetadata {
    SchemaMetadata {
        name: name.to_string(),
        tables,
        ..Default::default()
    }
}

pub fn database(schemas: Vec<SchemaMetadata>) -> DatabaseMetadata {
    DatabaseMetadata {
        name: TEST_DATABASE.to_string(),
        schemas,
        ..Default::default()
    }
}

pub fn column_config(name: &str, semantic_type_id: &str) -> ColumnConfig {
    ColumnConfig {
        name: name.to_string(),
        semantic_type_id: semantic_type_id.to_string(),
        ..Default::default()
    }
}

pub fn table_config(name: &str, column_configs: Vec<ColumnConfig>) -> TableConfig {
    TableConfig {
        name: name.to_string(),
        column_configs,
        ..Default::default()
    }
}

pub fn schema_config(name: &str, table_configs: Vec<TableConfig>) -> SchemaConfig {
    SchemaConfig {
        name: name.to_string(),
        table_configs,
    }
}

/// `public.users(id, name)` with a primary key on `id`.
pub fn users_table() -> TableMetadata {
    TableMetadata {
        indexes: vec![primary_key(&["id"])],
        ..table("users", vec![column("id", "int"), column("name", "varchar(255)")])
    }
}

pub fn users_database() -> DatabaseMetadata {
    database(vec![schema("public", vec![users_table()])])
}

/// Answers requests from a queue of canned responses and records them.
#[derive(Default)]
pub struct FakeDdlDiffService {
    responses: Mutex<VecDeque<anyhow::Result<DiffMetadataResponse>>>,
    requests: Mutex<Vec<DiffMetadataRequest>>,
}

impl FakeDdlDiffService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_response(&self, response: anyhow::Result<DiffMetadataResponse>) {
        self.responses.lock().push_back(response);
    }

    pub fn push_diff(&self, diff: &str) {
        self.push_response(Ok(DiffMetadataResponse {
            diff: diff.to_string(),
        }));
    }

    pub fn requests(&self) -> Vec<DiffMetadataRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl DdlDiffService for FakeDdlDiffService {
    async fn diff_metadata(
        &self,
        request: DiffMetadataRequest,
    ) -> anyhow::Result<DiffMetadataResponse> {
        self.requests.lock().push(request);
        self.responses
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(anyhow::anyhow!("FakeDdlDiffService has no queued response")))
    }
}

// Names come from small pools so independently generated trees overlap.
const SCHEMA_NAMES: &[&str] = &["public", "sales"];
const TABLE_NAMES: &[&str] = &["users", "orders", "items"];
const COLUMN_NAMES: &[&str] = &["id", "name", "email", "created_at"];
const COLUMN_TYPES: &[&str] = &["int", "text", "varchar(255)"];
const PARTITION_NAMES: &[&str] = &["p0", "p1"];
const VIEW_NAMES: &[&str] = &["active_users", "recent_orders"];
const PARTITION_VALUES: &[&str] = &["10", "20"];
const VIEW_DEFINITIONS: &[&str] = &["SELECT 1", "SELECT 2"];
const COMMENTS: &[&str] = &["", "audited"];

fn arb_column() -> impl Strategy<Value = (String, String, bool, String)> {
    (
        prop::sample::select(COLUMN_NAMES),
        prop::sample::select(COLUMN_TYPES),
        any::<bool>(),
        prop::sample::select(COMMENTS),
    )
        .prop_map(|(name, ty, nullable, comment)| {
            (name.to_string(), ty.to_string(), nullable, comment.to_string())
        })
}

fn arb_partitions(depth: u32) -> BoxedStrategy<Vec<TablePartitionMetadata>> {
    if depth == 0 {
        return prop::collection::btree_map(
            prop::sample::select(PARTITION_NAMES),
            prop::sample::select(PARTITION_VALUES),
            0..=2,
        )
        .prop_map(|partitions| {
            partitions
                .into_iter()
                .map(|(name, value)| TablePartitionMetadata {
                    value: value.to_string(),
                    ..partition(name, vec![])
                })
                .collect()
        })
        .boxed();
    }
    prop::collection::btree_map(
        prop::sample::select(PARTITION_NAMES),
        (prop::sample::select(PARTITION_VALUES), arb_partitions(depth - 1)),
        0..=2,
    )
    .prop_map(|partitions| {
        partitions
            .into_iter()
            .map(|(name, (value, subpartitions))| TablePartitionMetadata {
                value: value.to_string(),
                ..partition(name, subpartitions)
            })
            .collect()
    })
    .boxed()
}

fn arb_table() -> impl Strategy<Value = TableMetadata> {
    (
        prop::collection::vec(arb_column(), 1..4),
        prop::sample::select(COMMENTS),
        arb_partitions(1),
    )
        .prop_map(|(columns, comment, partitions)| {
            // Deduplicate by name, keeping the first occurrence.
            let mut seen = Vec::new();
            let columns = columns
                .into_iter()
                .filter(|(name, ..)| {
                    let fresh = !seen.contains(name);
                    seen.push(name.clone());
                    fresh
                })
                .map(|(name, ty, nullable, comment)| ColumnMetadata {
                    nullable,
                    comment,
                    ..column(&name, &ty)
                })
                .collect();
            TableMetadata {
                comment: comment.to_string(),
                columns,
                partitions,
                ..Default::default()
            }
        })
}

fn arb_schema() -> impl Strategy<Value = SchemaMetadata> {
    (
        prop::collection::btree_map(prop::sample::select(TABLE_NAMES), arb_table(), 0..=3),
        prop::collection::btree_map(
            prop::sample::select(VIEW_NAMES),
            prop::sample::select(VIEW_DEFINITIONS),
            0..=2,
        ),
    )
        .prop_map(|(tables, views)| SchemaMetadata {
            tables: tables
                .into_iter()
                .map(|(name, t)| TableMetadata {
                    name: name.to_string(),
                    ..t
                })
                .collect(),
            views: views
                .into_iter()
                .map(|(name, definition)| view(name, definition))
                .collect(),
            ..Default::default()
        })
}

/// A database whose sibling names are unique at every level.
pub fn arb_database() -> impl Strategy<Value = DatabaseMetadata> {
    prop::collection::btree_map(prop::sample::select(SCHEMA_NAMES), arb_schema(), 1..=2).prop_map(
        |schemas| {
            database(
                schemas
                    .into_iter()
                    .map(|(name, s)| SchemaMetadata {
                        name: name.to_string(),
                        ..s
                    })
                    .collect(),
            )
        },
    )
}
