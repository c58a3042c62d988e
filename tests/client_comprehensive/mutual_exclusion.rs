//! Read-modify-write under the lock loses no updates

use crate::test_utils::*;
use anystore::{Store, Table, Value};
use std::thread;

const WORKERS: usize = 6;
const INCREMENTS: i32 = 10_000;

fn increment(store: &Store, table: &Table) {
    let row = table.row(0).unwrap();
    store
        .with_lock(|| -> anystore::Result<()> {
            let n = row.get_as::<i32, _>("value")?.unwrap_or(0);
            row.set("value", n + 1)
        })
        .unwrap();
}

#[test]
fn test_blocking_workers_lose_no_updates() {
    let store = small_store();
    let table = store.create_table(&counter_schema(), Some("counter")).unwrap();
    table.row(0).unwrap().set("value", 0).unwrap();

    let handles: Vec<_> = (0..WORKERS)
        .map(|_| {
            let descriptor = store.create_context_descriptor();
            thread::spawn(move || {
                let store = Store::attach(descriptor);
                let table = store
                    .open_table("counter", &counter_schema())
                    .unwrap()
                    .unwrap();
                for _ in 0..INCREMENTS {
                    increment(&store, &table);
                }
            })
        })
        .collect();

    for _ in 0..INCREMENTS {
        increment(&store, &table);
    }
    for handle in handles {
        handle.join().unwrap();
    }

    let expected = INCREMENTS * (WORKERS as i32 + 1);
    assert_eq!(
        table.row(0).unwrap().get("value").unwrap(),
        Some(Value::I32(expected))
    );
    assert!(!store.is_locked());
}

#[test]
fn test_single_context_counts_exactly() {
    let store = small_store();
    let table = store.create_table(&counter_schema(), None).unwrap();
    for _ in 0..100 {
        increment(&store, &table);
    }
    assert_eq!(
        table.row(0).unwrap().get_as::<i32, _>("value").unwrap(),
        Some(100)
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_suspending_workers_lose_no_updates() {
    const TASKS: usize = 6;
    const PER_TASK: i32 = 500;

    let store = small_store();
    let table = store.create_table(&counter_schema(), Some("counter")).unwrap();

    let mut tasks = Vec::new();
    for _ in 0..TASKS {
        let descriptor = store.create_context_descriptor();
        tasks.push(tokio::spawn(async move {
            let store = Store::attach(descriptor);
            let table = store
                .open_table("counter", &counter_schema())
                .unwrap()
                .unwrap();
            let row = table.row(0).unwrap();
            for _ in 0..PER_TASK {
                store
                    .with_lock_async(|| async {
                        let n = row.get_as::<i32, _>("value").unwrap().unwrap_or(0);
                        tokio::task::yield_now().await;
                        row.set("value", n + 1).unwrap();
                    })
                    .await;
            }
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    assert_eq!(
        table.row(0).unwrap().get_as::<i32, _>("value").unwrap(),
        Some(PER_TASK * TASKS as i32)
    );
}

#[test]
fn test_threads_sharing_one_store_lose_no_updates() {
    const THREADS: usize = 4;

    let store = small_store();
    let table = store.create_table(&counter_schema(), None).unwrap();
    table.row(0).unwrap().set("value", 0).unwrap();

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let store = store.clone();
            let table = table.clone();
            thread::spawn(move || {
                for _ in 0..INCREMENTS {
                    increment(&store, &table);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(
        table.row(0).unwrap().get_as::<i32, _>("value").unwrap(),
        Some(INCREMENTS * THREADS as i32)
    );
}

#[tokio::test]
async fn test_tasks_sharing_one_store_lose_no_updates() {
    const PER_TASK: i32 = 100;

    let store = small_store();
    let table = store.create_table(&counter_schema(), None).unwrap();
    table.row(0).unwrap().set("value", 0).unwrap();

    let mut tasks = Vec::new();
    for _ in 0..2 {
        let store = store.clone();
        let row = table.row(0).unwrap();
        tasks.push(tokio::spawn(async move {
            for _ in 0..PER_TASK {
                store
                    .with_lock_async(|| async {
                        let n = row.get_as::<i32, _>("value").unwrap().unwrap_or(0);
                        tokio::task::yield_now().await;
                        row.set("value", n + 1).unwrap();
                    })
                    .await;
            }
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    assert_eq!(
        table.row(0).unwrap().get_as::<i32, _>("value").unwrap(),
        Some(PER_TASK * 2)
    );
    assert!(!store.is_locked());
}
