use cmd_util::env::env_config;
use pretty_assertions::assert_eq;
use proptest::prelude::*;

use super::{
    EditStatus,
    EditStatusStore,
    StatusSummary,
};
use crate::resource_key::ResourceKey;

fn users() -> ResourceKey {
    ResourceKey::database("employee").schema("public").table("users")
}

#[test]
fn test_descendant_marks_propagate_to_ancestors() {
    let mut store = EditStatusStore::new();
    let column = users().column("name");
    store.mark_edit_status_by_key(column.clone(), EditStatus::Dropped);

    assert_eq!(store.get_edit_status_by_key(&column), Some(EditStatus::Dropped));
    assert_eq!(store.get_edit_status_by_key(&users()), None);
    assert_eq!(store.effective_status(&users()), EditStatus::Updated);
    assert_eq!(
        store.effective_status(&ResourceKey::database("employee").schema("public")),
        EditStatus::Updated
    );
    assert_eq!(
        store.effective_status(&ResourceKey::database("employee").schema("other")),
        EditStatus::Normal
    );
}

#[test]
fn test_explicit_status_wins_over_inherited() {
    let mut store = EditStatusStore::new();
    store.mark_edit_status_by_key(users(), EditStatus::Created);
    store.mark_edit_status_by_key(users().column("id"), EditStatus::Created);
    assert_eq!(store.effective_status(&users()), EditStatus::Created);
}

#[test]
fn test_remove_clears_inherited_status() {
    let mut store = EditStatusStore::new();
    let id = users().column("id");
    let name = users().column("name");
    store.mark_edit_status_by_key(id.clone(), EditStatus::Updated);
    store.mark_edit_status_by_key(name.clone(), EditStatus::Dropped);
    // Overwriting must not double count.
    store.mark_edit_status_by_key(name.clone(), EditStatus::Updated);

    assert_eq!(store.remove_edit_status_by_key(&id), Some(EditStatus::Updated));
    assert_eq!(store.effective_status(&users()), EditStatus::Updated);
    store.mark_edit_status_by_key(name, EditStatus::Normal);
    assert_eq!(store.effective_status(&users()), EditStatus::Normal);
    assert!(store.is_empty());
    assert_eq!(store.remove_edit_status_by_key(&id), None);
}

#[test]
fn test_summary_and_clear() {
    let mut store = EditStatusStore::new();
    store.mark_edit_status_by_key(users(), EditStatus::Updated);
    store.mark_edit_status_by_key(users().column("a"), EditStatus::Created);
    store.mark_edit_status_by_key(users().column("b"), EditStatus::Created);
    store.mark_edit_status_by_key(users().partition("p0"), EditStatus::Dropped);
    assert_eq!(
        store.summary(),
        StatusSummary {
            created: 2,
            updated: 1,
            dropped: 1,
        }
    );
    assert_eq!(store.summary().total(), store.len());

    store.clear_edit_status();
    assert!(store.is_empty());
    assert_eq!(store.effective_status(&users()), EditStatus::Normal);
}

#[test]
fn test_remove_edit_status_tree() {
    let mut store = EditStatusStore::new();
    let orders = ResourceKey::database("employee").schema("public").table("orders");
    store.mark_edit_status_by_key(users(), EditStatus::Created);
    store.mark_edit_status_by_key(users().column("id"), EditStatus::Created);
    store.mark_edit_status_by_key(users().partition("p0").partition("s0"), EditStatus::Created);
    store.mark_edit_status_by_key(orders.column("id"), EditStatus::Dropped);

    store.remove_edit_status_tree(&users());
    assert_eq!(
        store.dirty_keys().collect::<Vec<_>>(),
        vec![(&orders.column("id"), EditStatus::Dropped)]
    );
    assert_eq!(store.effective_status(&users()), EditStatus::Normal);
    assert_eq!(store.effective_status(&orders), EditStatus::Updated);
}

fn arb_key() -> impl Strategy<Value = ResourceKey> {
    let schema = prop::sample::select(vec!["public", "sales"]);
    let table = prop::option::of(prop::sample::select(vec!["users", "orders"]));
    let column = prop::option::of(prop::sample::select(vec!["id", "name"]));
    (schema, table, column).prop_map(|(schema, table, column)| {
        let mut key = ResourceKey::database("db").schema(schema);
        if let Some(table) = table {
            key = key.table(table);
            if let Some(column) = column {
                key = key.column(column);
            }
        }
        key
    })
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256 * env_config("SCHEMA_EDITOR_PROPTEST_MULTIPLIER", 1),
        failure_persistence: None,
        ..ProptestConfig::default()
    })]

    #[test]
    fn proptest_effective_status_matches_prefix_scan(
        ops in prop::collection::vec((arb_key(), any::<EditStatus>()), 0..32),
        probe in arb_key(),
    ) {
        let mut store = EditStatusStore::new();
        for (key, status) in ops {
            store.mark_edit_status_by_key(key, status);
        }
        let expected = match store.get_edit_status_by_key(&probe) {
            Some(status) => status,
            None if store.dirty_keys().any(|(key, _)| probe.is_strict_ancestor_of(key)) => {
                EditStatus::Updated
            },
            None => EditStatus::Normal,
        };
        prop_assert_eq!(store.effective_status(&probe), expected);
    }
}
