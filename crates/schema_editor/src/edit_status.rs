use std::collections::{
    BTreeMap,
    HashMap,
};

use serde::{
    Deserialize,
    Serialize,
};

use crate::{
    metadata::{
        FunctionMetadata,
        ProcedureMetadata,
        SchemaMetadata,
        TableMetadata,
        ViewMetadata,
    },
    resource_key::ResourceKey,
};

/// How a node of the working copy differs from the baseline.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    strum::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
#[cfg_attr(any(test, feature = "testing"), derive(proptest_derive::Arbitrary))]
pub enum EditStatus {
    #[default]
    Normal,
    Created,
    Updated,
    Dropped,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StatusSummary {
    pub created: usize,
    pub updated: usize,
    pub dropped: usize,
}

impl StatusSummary {
    pub fn total(&self) -> usize {
        self.created + self.updated + self.dropped
    }
}

/// Explicit statuses keyed by resource key.
///
/// Every explicitly marked key bumps a dirty-descendant count on each of its
/// strict ancestors, so asking whether a table has a changed column is a
/// single lookup instead of a scan over all marked keys.
#[derive(Clone, Debug, Default)]
pub struct EditStatusStore {
    statuses: BTreeMap<ResourceKey, EditStatus>,
    dirty_descendants: HashMap<ResourceKey, usize>,
}

impl EditStatusStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrites any previous status for `key`. Marking `Normal` is the same
    /// as removing the entry.
    pub fn mark_edit_status_by_key(&mut self, key: ResourceKey, status: EditStatus) {
        if status == EditStatus::Normal {
            self.remove_edit_status_by_key(&key);
            return;
        }
        if !self.statuses.contains_key(&key) {
            for ancestor in key.ancestors() {
                *self.dirty_descendants.entry(ancestor).or_default() += 1;
            }
        }
        self.statuses.insert(key, status);
    }

    pub fn get_edit_status_by_key(&self, key: &ResourceKey) -> Option<EditStatus> {
        self.statuses.get(key).copied()
    }

    pub fn remove_edit_status_by_key(&mut self, key: &ResourceKey) -> Option<EditStatus> {
        let removed = self.statuses.remove(key)?;
        for ancestor in key.ancestors() {
            if let Some(count) = self.dirty_descendants.get_mut(&ancestor) {
                *count -= 1;
                if *count == 0 {
                    self.dirty_descendants.remove(&ancestor);
                }
            }
        }
        Some(removed)
    }

    /// Removes the status of `key` and of everything beneath it.
    pub fn remove_edit_status_tree(&mut self, key: &ResourceKey) {
        let keys: Vec<_> = self
            .statuses
            .range(key.clone()..)
            .map(|(k, _)| k)
            .take_while(|k| k.starts_with(key))
            .cloned()
            .collect();
        for key in keys {
            self.remove_edit_status_by_key(&key);
        }
    }

    pub fn has_dirty_descendant(&self, key: &ResourceKey) -> bool {
        self.dirty_descendants.contains_key(key)
    }

    /// The explicit status if there is one, else `Updated` when anything
    /// beneath `key` is marked, else `Normal`.
    pub fn effective_status(&self, key: &ResourceKey) -> EditStatus {
        if let Some(status) = self.get_edit_status_by_key(key) {
            return status;
        }
        if self.has_dirty_descendant(key) {
            EditStatus::Updated
        } else {
            EditStatus::Normal
        }
    }

    pub fn get_schema_status(&self, database: &str, schema: &SchemaMetadata) -> EditStatus {
        self.effective_status(&ResourceKey::database(database).schema(&schema.name))
    }

    pub fn get_table_status(
        &self,
        database: &str,
        schema: &SchemaMetadata,
        table: &TableMetadata,
    ) -> EditStatus {
        self.effective_status(
            &ResourceKey::database(database)
                .schema(&schema.name)
                .table(&table.name),
        )
    }

    pub fn get_column_status(
        &self,
        database: &str,
        schema: &SchemaMetadata,
        table: &TableMetadata,
        column: &str,
    ) -> EditStatus {
        self.effective_status(
            &ResourceKey::database(database)
                .schema(&schema.name)
                .table(&table.name)
                .column(column),
        )
    }

    /// `partition_path` names the partition followed by any subpartitions.
    pub fn get_partition_status(
        &self,
        database: &str,
        schema: &SchemaMetadata,
        table: &TableMetadata,
        partition_path: &[&str],
    ) -> EditStatus {
        let key = partition_path.iter().fold(
            ResourceKey::database(database)
                .schema(&schema.name)
                .table(&table.name),
            |key, partition| key.partition(*partition),
        );
        self.effective_status(&key)
    }

    pub fn get_view_status(
        &self,
        database: &str,
        schema: &SchemaMetadata,
        view: &ViewMetadata,
    ) -> EditStatus {
        self.effective_status(
            &ResourceKey::database(database)
                .schema(&schema.name)
                .view(&view.name),
        )
    }

    pub fn get_procedure_status(
        &self,
        database: &str,
        schema: &SchemaMetadata,
        procedure: &ProcedureMetadata,
    ) -> EditStatus {
        self.effective_status(
            &ResourceKey::database(database)
                .schema(&schema.name)
                .procedure(&procedure.name),
        )
    }

    pub fn get_function_status(
        &self,
        database: &str,
        schema: &SchemaMetadata,
        function: &FunctionMetadata,
    ) -> EditStatus {
        self.effective_status(
            &ResourceKey::database(database)
                .schema(&schema.name)
                .function(&function.name),
        )
    }

    pub fn clear_edit_status(&mut self) {
        self.statuses.clear();
        self.dirty_descendants.clear();
    }

    /// Explicitly marked keys in key order.
    pub fn dirty_keys(&self) -> impl Iterator<Item = (&ResourceKey, EditStatus)> {
        self.statuses.iter().map(|(key, status)| (key, *status))
    }

    pub fn len(&self) -> usize {
        self.statuses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statuses.is_empty()
    }

    pub fn summary(&self) -> StatusSummary {
        let mut summary = StatusSummary::default();
        for status in self.statuses.values() {
            match status {
                EditStatus::Created => summary.created += 1,
                EditStatus::Updated => summary.updated += 1,
                EditStatus::Dropped => summary.dropped += 1,
                EditStatus::Normal => {},
            }
        }
        summary
    }
}

#[cfg(test)]
mod tests;
