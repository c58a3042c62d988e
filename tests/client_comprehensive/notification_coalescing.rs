//! Each listener runs at most once per drain

use crate::test_utils::*;
use anystore::DispatchReport;

#[test]
fn test_two_drains_one_callback() {
    let store = small_store();
    let table = store.create_table(&counter_schema(), None).unwrap();
    let row = table.row("r").unwrap();
    let (counter, f) = counting();
    row.add_listener(f).unwrap();

    row.set("value", 1).unwrap();
    store.notify_all();
    store.notify_all();
    assert_eq!(hits(&counter), 1);
}

#[test]
fn test_many_writes_one_callback() {
    let store = small_store();
    let table = store.create_table(&counter_schema(), None).unwrap();
    let row = table.row("r").unwrap();
    let (counter, f) = counting();
    row.add_listener(f).unwrap();

    for n in 0..100 {
        row.set("value", n).unwrap();
    }
    assert_eq!(store.notify_all().delivered, 1);
    assert_eq!(hits(&counter), 1);

    row.set("value", 0).unwrap();
    store.notify_all();
    assert_eq!(hits(&counter), 2);
}

#[test]
fn test_drain_without_changes_is_noop() {
    let store = small_store();
    let table = store.create_table(&counter_schema(), None).unwrap();
    let (counter, f) = counting();
    table.row("r").unwrap().add_listener(f).unwrap();
    assert_eq!(store.notify_all(), DispatchReport::default());
    assert_eq!(hits(&counter), 0);
}

#[test]
fn test_only_changed_rows_fire() {
    let store = small_store();
    let table = store.create_table(&counter_schema(), None).unwrap();
    let (a_hits, a) = counting();
    let (b_hits, b) = counting();
    table.row("a").unwrap().add_listener(a).unwrap();
    table.row("b").unwrap().add_listener(b).unwrap();

    table.row("a").unwrap().set("value", 1).unwrap();
    store.notify_all();
    assert_eq!((hits(&a_hits), hits(&b_hits)), (1, 0));
}

#[test]
fn test_callback_may_use_store() {
    let store = small_store();
    let table = store.create_table(&counter_schema(), None).unwrap();
    let row = table.row("r").unwrap();
    let inner = row.clone();
    let (counter, mut count) = counting();
    row.add_listener(move || {
        count();
        assert!(inner.get("value").unwrap().is_some());
    })
    .unwrap();

    row.set("value", 7).unwrap();
    let report = store.notify_all();
    assert_eq!(report.failed, 0);
    assert_eq!(hits(&counter), 1);
}
