//! Insert-then-delete cycles do not grow the region

use crate::test_utils::*;
use anystore::{Store, Table, Value};

const ITERATIONS: usize = 200;
const ROWS: i32 = 50;

fn cycle(tables: &[Table]) {
    for table in tables {
        for key in 0..ROWS {
            table
                .insert_row(
                    key,
                    vec![
                        Value::I32(key),
                        Value::F64(key as f64),
                        Value::from(format!("row {}", key)),
                        Value::Blob(vec![key as u8; 32]),
                    ],
                )
                .unwrap();
        }
        table.clear().unwrap();
    }
}

fn tables(store: &Store) -> Vec<Table> {
    (0..3)
        .map(|_| store.create_keyed_table(&all_tags(), None).unwrap())
        .collect()
}

#[test]
fn test_cycles_reach_steady_state() {
    let store = small_store();
    let tables = tables(&store);

    for _ in 0..ITERATIONS / 2 {
        cycle(&tables);
    }
    let warm_size = store.mem_size();
    let warm_used = store.memory().used_bytes();

    for _ in ITERATIONS / 2..ITERATIONS {
        cycle(&tables);
    }
    assert_eq!(store.mem_size(), warm_size);
    assert_eq!(store.memory().used_bytes(), warm_used);
}

#[test]
fn test_row_delete_cycles_reuse_space() {
    let store = small_store();
    let table = store.create_table(&all_tags(), None).unwrap();
    let baseline = store.memory().used_bytes();
    for round in 0..ITERATIONS {
        let row = table.row(round as i32).unwrap();
        row.set("s", "payload").unwrap();
        row.delete().unwrap();
    }
    assert_eq!(store.memory().used_bytes(), baseline);
}
