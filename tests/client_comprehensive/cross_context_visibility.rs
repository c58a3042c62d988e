//! Contexts attached to one region see the same data

use crate::test_utils::*;
use anystore::{ContextId, Store, Value};
use std::collections::HashSet;
use std::thread;

#[test]
fn test_value_written_before_spawn_is_visible() {
    let store = small_store();
    let table = store.create_table(&all_tags(), Some("shared")).unwrap();
    let row = table.row("r").unwrap();
    row.set("s", "from coordinator").unwrap();
    row.set("b", vec![9u8, 8, 7]).unwrap();

    let descriptor = store.create_context_descriptor();
    let seen = thread::spawn(move || {
        let worker = Store::attach(descriptor);
        let table = worker.open_table("shared", &all_tags()).unwrap().unwrap();
        let row = table.get_row("r").unwrap().unwrap();
        (row.get("s").unwrap(), row.get("b").unwrap())
    })
    .join()
    .unwrap();

    assert_eq!(seen.0, Some(Value::from("from coordinator")));
    assert_eq!(seen.1, Some(Value::Blob(vec![9, 8, 7])));
}

#[test]
fn test_worker_writes_visible_to_coordinator() {
    let store = small_store();
    let table = store.create_keyed_table(&all_tags(), Some("shared")).unwrap();

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let descriptor = store.create_context_descriptor();
            thread::spawn(move || {
                let worker = Store::attach(descriptor);
                let table = worker
                    .open_keyed_table("shared", &all_tags())
                    .unwrap()
                    .unwrap();
                table.insert(i, "i", i * 10).unwrap();
                worker.context_id()
            })
        })
        .collect();
    let contexts: HashSet<ContextId> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(contexts.len(), 4);
    assert!(!contexts.contains(&ContextId::COORDINATOR));
    for i in 0..4 {
        assert_eq!(table.get(i, "i").unwrap(), Some(Value::I32(i * 10)));
    }
}

#[test]
fn test_table_created_by_worker_opens_by_id() {
    let store = small_store();
    let descriptor = store.create_context_descriptor();
    let id = thread::spawn(move || {
        let worker = Store::attach(descriptor);
        let table = worker.create_table(&counter_schema(), None).unwrap();
        table.row(1).unwrap().set("value", 5).unwrap();
        table.id()
    })
    .join()
    .unwrap();

    let table = store.open_table(id, &counter_schema()).unwrap().unwrap();
    assert_eq!(
        table.get_row(1).unwrap().unwrap().get("value").unwrap(),
        Some(Value::I32(5))
    );
}
