//! Projects only the selected edits onto the baseline, for rollouts that ship
//! part of a working copy.

use crate::{
    apply::cleanup_table_config,
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
        TableMetadata,
    },
    metrics::selective_apply_timer,
    resource_key::ResourceKey,
    selection::RolloutSelection,
};

/// Which version of an object goes into the output.
enum Chosen<'a, T> {
    Target(&'a T),
    Baseline(&'a T),
}

/// Selected objects take their target version unless dropped. Unselected
/// objects keep their baseline version, or are left out if they have none.
/// Baseline-only objects that are not selected follow in baseline order.
fn choose<'a, T: NamedObject>(
    target: &'a [T],
    baseline: &'a [T],
    is_selected: impl Fn(&str) -> bool,
    is_dropped: impl Fn(&str) -> bool,
) -> Vec<Chosen<'a, T>> {
    let mut chosen = Vec::with_capacity(target.len());
    for object in target {
        let name = object.name();
        if is_selected(name) {
            if !is_dropped(name) {
                chosen.push(Chosen::Target(object));
            }
        } else if let Some(original) = find_by_name(baseline, name) {
            chosen.push(Chosen::Baseline(original));
        }
    }
    for object in baseline {
        let name = object.name();
        if find_by_name(target, name).is_none() && !is_selected(name) {
            chosen.push(Chosen::Baseline(object));
        }
    }
    chosen
}

fn choose_cloned<T: NamedObject + Clone>(
    target: &[T],
    baseline: &[T],
    is_selected: impl Fn(&str) -> bool,
    is_dropped: impl Fn(&str) -> bool,
) -> Vec<T> {
    choose(target, baseline, is_selected, is_dropped)
        .into_iter()
        .map(|chosen| match chosen {
            Chosen::Target(object) | Chosen::Baseline(object) => object.clone(),
        })
        .collect()
}

/// Builds the tree to roll out when only `selection` should ship.
///
/// `target` is normally the merged tree, whose statuses are in `store`. The
/// schema set and order always come from `target`. Unselected tables
/// round-trip from `baseline` unchanged, together with their configs. Configs
/// of selected tables lose the column configs of columns that do not ship.
pub fn apply_selected_metadata(
    database: &str,
    baseline: &DatabaseMetadata,
    target: &DatabaseMetadata,
    store: &EditStatusStore,
    selection: &RolloutSelection,
) -> DatabaseMetadata {
    let _timer = selective_apply_timer();
    let empty = SchemaMetadata::default();
    let mut schemas = Vec::with_capacity(target.schemas.len());
    let mut schema_configs = Vec::new();

    for target_schema in &target.schemas {
        let schema_name = target_schema.name.as_str();
        let schema_key = ResourceKey::database(database).schema(schema_name);
        let baseline_schema = baseline.schema(schema_name).unwrap_or(&empty);
        let is_dropped = |key: ResourceKey| store.effective_status(&key) == EditStatus::Dropped;

        let mut tables = Vec::new();
        let mut table_configs = Vec::new();
        let chosen_tables = choose(
            &target_schema.tables,
            &baseline_schema.tables,
            |name| selection.is_table_selected(schema_name, name),
            |name| is_dropped(schema_key.table(name)),
        );
        for chosen in chosen_tables {
            let (table, config) = match chosen {
                Chosen::Target(table) => {
                    let table_key = schema_key.table(&table.name);
                    let table = if store.effective_status(&table_key) == EditStatus::Created {
                        table.clone()
                    } else {
                        TableMetadata {
                            columns: table
                                .columns
                                .iter()
                                .filter(|column| !is_dropped(table_key.column(&column.name)))
                                .cloned()
                                .collect(),
                            ..table.clone()
                        }
                    };
                    let config = target
                        .table_config(schema_name, &table.name)
                        .map(|config| {
                            let mut config = config.clone();
                            cleanup_table_config(&mut config, &table);
                            config
                        })
                        .filter(|config| !config.column_configs.is_empty());
                    (table, config)
                },
                Chosen::Baseline(table) => (
                    table.clone(),
                    baseline.table_config(schema_name, &table.name).cloned(),
                ),
            };
            if let Some(config) = config {
                table_configs.push(config);
            }
            tables.push(table);
        }

        if !table_configs.is_empty() {
            schema_configs.push(SchemaConfig {
                name: schema_name.to_string(),
                table_configs,
            });
        }
        schemas.push(SchemaMetadata {
            tables,
            views: choose_cloned(
                &target_schema.views,
                &baseline_schema.views,
                |name| selection.is_view_selected(schema_name, name),
                |name| is_dropped(schema_key.view(name)),
            ),
            procedures: choose_cloned(
                &target_schema.procedures,
                &baseline_schema.procedures,
                |name| selection.is_procedure_selected(schema_name, name),
                |name| is_dropped(schema_key.procedure(name)),
            ),
            functions: choose_cloned(
                &target_schema.functions,
                &baseline_schema.functions,
                |name| selection.is_function_selected(schema_name, name),
                |name| is_dropped(schema_key.function(name)),
            ),
            ..target_schema.clone()
        });
    }

    DatabaseMetadata {
        schemas,
        schema_configs,
        ..target.clone()
    }
}
