//! Cached rows show the state as of the last drain

use crate::test_utils::*;
use anystore::Value;

#[test]
fn test_cache_updates_only_on_drain() {
    let store = small_store();
    let table = store.create_table(&all_tags(), None).unwrap();
    let row = table.row("r").unwrap();
    row.set("s", "before").unwrap();

    let (counter, f) = counting();
    let cached = row.cached(f).unwrap();
    row.set("s", "after").unwrap();

    assert_eq!(cached.get("s").unwrap(), Some(Value::from("before")));
    assert_eq!(row.get("s").unwrap(), Some(Value::from("after")));

    store.notify_all();
    assert_eq!(cached.get("s").unwrap(), Some(Value::from("after")));
    assert_eq!(hits(&counter), 1);
}

#[test]
fn test_cache_of_unset_row_fills_in() {
    let store = small_store();
    let table = store.create_keyed_table(&all_tags(), None).unwrap();
    table.insert("k", "i", 1).unwrap();
    let cached = table.row("k").unwrap().cached(|| {}).unwrap();
    assert_eq!(
        cached.get_row().unwrap(),
        vec![Some(Value::I32(1)), None, None, None]
    );

    table.insert("k", "b", vec![1u8, 2, 3]).unwrap();
    store.notify_all();
    assert_eq!(cached.get_as::<Vec<u8>, _>("b").unwrap(), Some(vec![1, 2, 3]));
}

#[test]
fn test_cache_sees_other_context_writes_after_drain() {
    let store = small_store();
    let table = store.create_table(&all_tags(), Some("shared")).unwrap();
    let row = table.row("r").unwrap();
    row.set("i", 1).unwrap();
    let cached = row.cached(|| {}).unwrap();

    let other = anystore::Store::attach(store.create_context_descriptor());
    let remote = other.open_table("shared", &all_tags()).unwrap().unwrap();
    remote.row("r").unwrap().set("i", 2).unwrap();

    assert_eq!(cached.get_as::<i32, _>("i").unwrap(), Some(1));
    store.notify_all();
    assert_eq!(cached.get_as::<i32, _>("i").unwrap(), Some(2));
}
