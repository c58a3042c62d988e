//! Buffered contexts publish their writes on commit

use crate::test_utils::*;
use anystore::{Store, StoreOptions, Value, WriteMode};

fn buffered() -> Store {
    Store::create(StoreOptions::new().mode(WriteMode::Buffered)).unwrap()
}

#[test]
fn test_writes_invisible_until_commit() {
    let store = buffered();
    let table = store.create_keyed_table(&all_tags(), Some("t")).unwrap();
    table.insert("k", "i", 1).unwrap();

    let other = Store::attach(store.create_context_descriptor());
    let remote = other.open_keyed_table("t", &all_tags()).unwrap().unwrap();
    assert_eq!(remote.get("k", "i").unwrap(), None);

    store.commit().unwrap();
    assert_eq!(remote.get("k", "i").unwrap(), Some(Value::I32(1)));
}

#[test]
fn test_commit_is_per_context() {
    let store = buffered();
    let table = store.create_keyed_table(&all_tags(), Some("t")).unwrap();
    let other = Store::attach(store.create_context_descriptor());
    let remote = other.open_keyed_table("t", &all_tags()).unwrap().unwrap();

    table.insert("a", "i", 1).unwrap();
    remote.insert("b", "i", 2).unwrap();
    other.commit().unwrap();

    assert_eq!(table.get("a", "i").unwrap(), None);
    assert_eq!(table.get("b", "i").unwrap(), Some(Value::I32(2)));
    store.commit().unwrap();
    assert_eq!(table.get("a", "i").unwrap(), Some(Value::I32(1)));
}

#[test]
fn test_commit_reports_failed_delete() {
    let store = buffered();
    let table = store.create_keyed_table(&all_tags(), None).unwrap();
    table.delete("missing").unwrap();
    assert_eq!(store.commit(), Err(anystore::Error::RowNotFound));
    assert_eq!(store.commit(), Ok(()));
}

#[test]
fn test_shared_commit_is_noop() {
    let store = small_store();
    assert_eq!(store.commit(), Ok(()));
}
