use std::collections::BTreeSet;

use crate::{
    knobs::SCHEMA_VALIDATOR_REQUIRE_PRIMARY_KEY,
    metadata::{
        DatabaseMetadata,
        Engine,
        NamedObject,
        SchemaMetadata,
        TableMetadata,
    },
};

/// Checks a tree before it is sent off for DDL generation. Returns one
/// message per problem found.
pub trait SchemaValidator: Send + Sync {
    fn validate(&self, metadata: &DatabaseMetadata, engine: Engine) -> Vec<String>;
}

/// Structural checks that need no knowledge of the SQL dialect.
pub struct StructuralValidator {
    require_primary_key: BTreeSet<Engine>,
}

impl Default for StructuralValidator {
    fn default() -> Self {
        Self {
            require_primary_key: SCHEMA_VALIDATOR_REQUIRE_PRIMARY_KEY.clone(),
        }
    }
}

impl StructuralValidator {
    pub fn new(require_primary_key: BTreeSet<Engine>) -> Self {
        Self {
            require_primary_key,
        }
    }

    fn validate_table(
        &self,
        schema: &SchemaMetadata,
        table: &TableMetadata,
        engine: Engine,
        errors: &mut Vec<String>,
    ) {
        let label = if schema.name.is_empty() {
            format!("Table \"{}\"", table.name)
        } else {
            format!("Table \"{}\".\"{}\"", schema.name, table.name)
        };
        if table.columns.is_empty() {
            errors.push(format!("{label} has no columns"));
        }
        check_names(&table.columns, "column", &label, errors);
        for column in &table.columns {
            if column.column_type.trim().is_empty() {
                errors.push(format!("{label} column \"{}\" has no type", column.name));
            }
        }
        check_names(&table.indexes, "index", &label, errors);
        for index in &table.indexes {
            // Only plain column references can be checked; expressions are
            // left to the DDL service.
            for expression in &index.expressions {
                if is_identifier(expression) && table.column(expression).is_none() {
                    errors.push(format!(
                        "{label} index \"{}\" references unknown column \"{expression}\"",
                        index.name
                    ));
                }
            }
        }
        for foreign_key in &table.foreign_keys {
            for column in &foreign_key.columns {
                if table.column(column).is_none() {
                    errors.push(format!(
                        "{label} foreign key \"{}\" references unknown column \"{column}\"",
                        foreign_key.name
                    ));
                }
            }
            if foreign_key.columns.len() != foreign_key.referenced_columns.len() {
                errors.push(format!(
                    "{label} foreign key \"{}\" has {} columns but references {}",
                    foreign_key.name,
                    foreign_key.columns.len(),
                    foreign_key.referenced_columns.len()
                ));
            }
        }
        if self.require_primary_key.contains(&engine) && table.primary_key().is_none() {
            errors.push(format!("{label} requires a primary key"));
        }
    }
}

fn check_names<T: NamedObject>(objects: &[T], kind: &str, parent: &str, errors: &mut Vec<String>) {
    let mut seen = BTreeSet::new();
    for object in objects {
        let name = object.name();
        if name.is_empty() {
            errors.push(format!("{parent} has a {kind} with an empty name"));
        } else if !seen.insert(name) {
            errors.push(format!("{parent} has more than one {kind} named \"{name}\""));
        }
    }
}

fn schema_label(schema: &SchemaMetadata) -> String {
    if schema.name.is_empty() {
        "Database".to_string()
    } else {
        format!("Schema \"{}\"", schema.name)
    }
}

fn is_identifier(expression: &str) -> bool {
    !expression.is_empty()
        && expression
            .chars()
            .all(|c| c.is_alphanumeric() || c == '_' || c == '$')
}

impl SchemaValidator for StructuralValidator {
    fn validate(&self, metadata: &DatabaseMetadata, engine: Engine) -> Vec<String> {
        let mut errors = Vec::new();
        // Engines without schemas use a single unnamed schema.
        if metadata.schemas.len() > 1 {
            check_names(&metadata.schemas, "schema", "Database", &mut errors);
        }
        for schema in &metadata.schemas {
            let label = schema_label(schema);
            check_names(&schema.tables, "table", &label, &mut errors);
            check_names(&schema.views, "view", &label, &mut errors);
            check_names(&schema.procedures, "procedure", &label, &mut errors);
            check_names(&schema.functions, "function", &label, &mut errors);
            for table in &schema.tables {
                self.validate_table(schema, table, engine, &mut errors);
            }
        }
        errors
    }
}
