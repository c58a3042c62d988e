//! Deleting a row clears its columns and its listeners

use crate::test_utils::*;
use anystore::Store;

#[test]
fn test_deleted_row_reads_null() {
    let store = small_store();
    let table = store.create_table(&all_tags(), None).unwrap();
    let row = table.row("r").unwrap();
    row.set("i", 1).unwrap();
    row.set("s", "x").unwrap();
    row.delete().unwrap();

    for column in ["i", "f", "s", "b"] {
        assert_eq!(row.get(column).unwrap(), None);
    }
    assert!(row.get_row().unwrap().iter().all(Option::is_none));
    assert!(table.get_row("r").unwrap().is_none());
}

#[test]
fn test_deleted_row_listener_never_fires() {
    let store = small_store();
    let table = store.create_table(&all_tags(), None).unwrap();
    let row = table.row("r").unwrap();
    let (counter, f) = counting();
    row.add_listener(f).unwrap();
    row.set("i", 1).unwrap();
    row.delete().unwrap();
    store.notify_all();

    let again = table.row("r").unwrap();
    again.set("i", 2).unwrap();
    store.notify_all();
    assert_eq!(hits(&counter), 0);
    assert_eq!(store.listener_count(), 0);
}

#[test]
fn test_keyed_delete() {
    let store = small_store();
    let table = store.create_keyed_table(&all_tags(), None).unwrap();
    table.insert("k", "i", 1).unwrap();
    table.delete("k").unwrap();
    assert_eq!(table.get("k", "i").unwrap(), None);
    assert_eq!(table.delete("k"), Err(anystore::Error::RowNotFound));
}

#[test]
fn test_clear_drops_rows_and_listeners() {
    let store = small_store();
    let table = store.create_table(&all_tags(), None).unwrap();
    let (counter, f) = counting();
    table.row("a").unwrap().add_listener(f).unwrap();
    table.row("b").unwrap().set("i", 1).unwrap();
    table.clear().unwrap();

    assert!(table.get_row("a").unwrap().is_none());
    assert!(table.get_row("b").unwrap().is_none());
    assert_eq!(store.listener_count(), 0);
    store.notify_all();
    assert_eq!(hits(&counter), 0);
}

#[test]
fn test_delete_by_other_context_drops_local_listeners() {
    let store = small_store();
    let table = store.create_table(&all_tags(), Some("shared")).unwrap();
    let (counter, f) = counting();
    table.row("a").unwrap().add_listener(f).unwrap();
    table.row("a").unwrap().add_listener(|| {}).unwrap();
    table.row("b").unwrap().add_listener(|| {}).unwrap();
    table.row("c").unwrap().cached(|| {}).unwrap();

    let other = Store::attach(store.create_context_descriptor());
    let remote = other.open_table("shared", &all_tags()).unwrap().unwrap();
    remote.delete("a").unwrap();
    remote.delete("b").unwrap();
    remote.clear().unwrap();

    let report = store.notify_all();
    assert_eq!(report.pruned, 4);
    assert_eq!(store.listener_count(), 0);

    // Recreated rows do not revive old registrations
    remote.row("a").unwrap().set("i", 1).unwrap();
    store.notify_all();
    assert_eq!(hits(&counter), 0);
}
