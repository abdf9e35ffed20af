use std::collections::BTreeSet;

use crate::{
    metadata::{
        ColumnMetadata,
        FunctionMetadata,
        ProcedureMetadata,
        TableMetadata,
        ViewMetadata,
    },
    resource_key::ResourceKey,
};

/// Checkbox state of a node in a selection tree.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SelectionState {
    pub checked: bool,
    pub indeterminate: bool,
}

impl SelectionState {
    fn of_children(selected: usize, total: usize) -> Self {
        if total == 0 {
            return Self::default();
        }
        Self {
            checked: selected == total,
            indeterminate: selected > 0 && selected < total,
        }
    }
}

/// The objects picked for a partial rollout.
///
/// Selecting a table selects all of its columns, and selecting a column also
/// selects its table. Deselecting a column leaves its table selected.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RolloutSelection {
    database: String,
    selected: BTreeSet<ResourceKey>,
}

impl RolloutSelection {
    pub fn new(database: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            selected: BTreeSet::new(),
        }
    }

    fn schema_key(&self, schema: &str) -> ResourceKey {
        ResourceKey::database(&self.database).schema(schema)
    }

    fn set(&mut self, key: ResourceKey, on: bool) {
        if on {
            self.selected.insert(key);
        } else {
            self.selected.remove(&key);
        }
    }

    pub fn contains(&self, key: &ResourceKey) -> bool {
        self.selected.contains(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &ResourceKey> {
        self.selected.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    pub fn select_table(&mut self, schema: &str, table: &TableMetadata, on: bool) {
        let table_key = self.schema_key(schema).table(&table.name);
        for column in &table.columns {
            self.set(table_key.column(&column.name), on);
        }
        self.set(table_key, on);
    }

    pub fn select_all_tables(&mut self, schema: &str, tables: &[TableMetadata], on: bool) {
        for table in tables {
            self.select_table(schema, table, on);
        }
    }

    pub fn select_column(&mut self, schema: &str, table: &str, column: &str, on: bool) {
        let table_key = self.schema_key(schema).table(table);
        if on {
            self.set(table_key.clone(), true);
        }
        self.set(table_key.column(column), on);
    }

    pub fn select_all_columns(
        &mut self,
        schema: &str,
        table: &str,
        columns: &[ColumnMetadata],
        on: bool,
    ) {
        for column in columns {
            self.select_column(schema, table, &column.name, on);
        }
    }

    pub fn select_view(&mut self, schema: &str, view: &str, on: bool) {
        let key = self.schema_key(schema).view(view);
        self.set(key, on);
    }

    pub fn select_procedure(&mut self, schema: &str, procedure: &str, on: bool) {
        let key = self.schema_key(schema).procedure(procedure);
        self.set(key, on);
    }

    pub fn select_function(&mut self, schema: &str, function: &str, on: bool) {
        let key = self.schema_key(schema).function(function);
        self.set(key, on);
    }

    pub fn is_table_selected(&self, schema: &str, table: &str) -> bool {
        self.contains(&self.schema_key(schema).table(table))
    }

    pub fn is_view_selected(&self, schema: &str, view: &str) -> bool {
        self.contains(&self.schema_key(schema).view(view))
    }

    pub fn is_procedure_selected(&self, schema: &str, procedure: &str) -> bool {
        self.contains(&self.schema_key(schema).procedure(procedure))
    }

    pub fn is_function_selected(&self, schema: &str, function: &str) -> bool {
        self.contains(&self.schema_key(schema).function(function))
    }

    /// A table without columns follows its own mark. Otherwise it is checked
    /// when every column is, and indeterminate when the table or only some
    /// of its columns are marked.
    pub fn table_selection_state(&self, schema: &str, table: &TableMetadata) -> SelectionState {
        let table_key = self.schema_key(schema).table(&table.name);
        let table_checked = self.contains(&table_key);
        if table.columns.is_empty() {
            return SelectionState {
                checked: table_checked,
                indeterminate: false,
            };
        }
        let checked_columns = table
            .columns
            .iter()
            .filter(|column| self.contains(&table_key.column(&column.name)))
            .count();
        let checked = checked_columns == table.columns.len();
        SelectionState {
            checked,
            indeterminate: !checked && (table_checked || checked_columns > 0),
        }
    }

    pub fn column_selection_state(&self, schema: &str, table: &str, column: &str) -> SelectionState {
        SelectionState {
            checked: self.contains(&self.schema_key(schema).table(table).column(column)),
            indeterminate: false,
        }
    }

    pub fn all_tables_selection_state(
        &self,
        schema: &str,
        tables: &[TableMetadata],
    ) -> SelectionState {
        let selected = tables
            .iter()
            .filter(|table| self.is_table_selected(schema, &table.name))
            .count();
        SelectionState::of_children(selected, tables.len())
    }

    pub fn all_columns_selection_state(
        &self,
        schema: &str,
        table: &str,
        columns: &[ColumnMetadata],
    ) -> SelectionState {
        let table_key = self.schema_key(schema).table(table);
        let selected = columns
            .iter()
            .filter(|column| self.contains(&table_key.column(&column.name)))
            .count();
        SelectionState::of_children(selected, columns.len())
    }

    pub fn all_views_selection_state(&self, schema: &str, views: &[ViewMetadata]) -> SelectionState {
        let selected = views
            .iter()
            .filter(|view| self.is_view_selected(schema, &view.name))
            .count();
        SelectionState::of_children(selected, views.len())
    }

    pub fn all_procedures_selection_state(
        &self,
        schema: &str,
        procedures: &[ProcedureMetadata],
    ) -> SelectionState {
        let selected = procedures
            .iter()
            .filter(|procedure| self.is_procedure_selected(schema, &procedure.name))
            .count();
        SelectionState::of_children(selected, procedures.len())
    }

    pub fn all_functions_selection_state(
        &self,
        schema: &str,
        functions: &[FunctionMetadata],
    ) -> SelectionState {
        let selected = functions
            .iter()
            .filter(|function| self.is_function_selected(schema, &function.name))
            .count();
        SelectionState::of_children(selected, functions.len())
    }
}

#[cfg(test)]
mod tests {
    use super::{
        RolloutSelection,
        SelectionState,
    };
    use crate::test_helpers::{
        column,
        table,
        users_table,
        TEST_DATABASE,
    };

    const CHECKED: SelectionState = SelectionState {
        checked: true,
        indeterminate: false,
    };
    const PARTIAL: SelectionState = SelectionState {
        checked: false,
        indeterminate: true,
    };
    const UNCHECKED: SelectionState = SelectionState {
        checked: false,
        indeterminate: false,
    };

    #[test]
    fn test_selecting_table_selects_columns() {
        let users = users_table();
        let mut selection = RolloutSelection::new(TEST_DATABASE);
        selection.select_table("public", &users, true);
        assert_eq!(selection.keys().count(), 3);
        assert_eq!(selection.table_selection_state("public", &users), CHECKED);
        assert_eq!(selection.column_selection_state("public", "users", "name"), CHECKED);

        selection.select_table("public", &users, false);
        assert!(selection.is_empty());
    }

    #[test]
    fn test_column_selection_rules() {
        let users = users_table();
        let mut selection = RolloutSelection::new(TEST_DATABASE);
        selection.select_column("public", "users", "name", true);
        assert!(selection.is_table_selected("public", "users"));
        assert_eq!(selection.table_selection_state("public", &users), PARTIAL);
        assert_eq!(
            selection.all_columns_selection_state("public", "users", &users.columns),
            PARTIAL
        );

        selection.select_column("public", "users", "name", false);
        // Deselecting the column keeps the table selected.
        assert!(selection.is_table_selected("public", "users"));
        assert_eq!(selection.table_selection_state("public", &users), PARTIAL);
        assert_eq!(
            selection.all_columns_selection_state("public", "users", &users.columns),
            UNCHECKED
        );
    }

    #[test]
    fn test_table_without_columns_follows_its_own_mark() {
        let empty = table("empty", vec![]);
        let mut selection = RolloutSelection::new(TEST_DATABASE);
        assert_eq!(selection.table_selection_state("public", &empty), UNCHECKED);
        selection.select_table("public", &empty, true);
        assert_eq!(selection.table_selection_state("public", &empty), CHECKED);
    }

    #[test]
    fn test_all_tables_state() {
        let tables = vec![users_table(), table("orders", vec![column("id", "int")])];
        let mut selection = RolloutSelection::new(TEST_DATABASE);
        assert_eq!(selection.all_tables_selection_state("public", &tables), UNCHECKED);
        assert_eq!(selection.all_tables_selection_state("public", &[]), UNCHECKED);
        selection.select_table("public", &tables[1], true);
        assert_eq!(selection.all_tables_selection_state("public", &tables), PARTIAL);
        selection.select_all_tables("public", &tables, true);
        assert_eq!(selection.all_tables_selection_state("public", &tables), CHECKED);
        // Same table name in another schema is a different object.
        assert_eq!(selection.all_tables_selection_state("sales", &tables), UNCHECKED);
    }

    #[test]
    fn test_routine_selection() {
        let mut selection = RolloutSelection::new(TEST_DATABASE);
        selection.select_view("public", "v1", true);
        selection.select_procedure("public", "p1", true);
        selection.select_function("public", "f1", true);
        assert!(selection.is_view_selected("public", "v1"));
        assert!(selection.is_procedure_selected("public", "p1"));
        assert!(selection.is_function_selected("public", "f1"));
        assert!(!selection.is_function_selected("public", "p1"));
        selection.select_view("public", "v1", false);
        assert!(!selection.is_view_selected("public", "v1"));
    }
}
