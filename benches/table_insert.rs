//! Table Insert Benchmarks
//!
//! Inserting 10,000 three-column records into a keyed table, one column per
//! boundary call, against the same records in a `HashMap`.
//!
//! The table is cleared before each measured iteration so the region stays
//! at a fixed size.
//!
//! ## Running
//!
//! ```bash
//! cargo bench --bench table_insert
//! ```

use anystore::{Schema, Store, StoreOptions, Tag, Table, TransferMode, Value};
use criterion::{
    black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion, Throughput,
};
use std::collections::HashMap;
use std::time::Duration;

const RECORDS: usize = 10_000;

// =============================================================================
// Test Utilities
// =============================================================================

struct Record {
    name: Value,
    age: Value,
    height: Value,
}

fn records() -> Vec<Record> {
    (0..RECORDS)
        .map(|i| Record {
            name: Value::from(format!("PETR4{}", i)),
            age: Value::I32((i * 37 % 101) as i32),
            height: Value::F64((i % 200) as f64 / 100.0),
        })
        .collect()
}

fn schema() -> Schema {
    Schema::new()
        .column("name", Tag::String)
        .column("age", Tag::I32)
        .column("height", Tag::F64)
}

fn table(transfer: TransferMode) -> Table {
    let store = Store::create(StoreOptions::new().transfer(transfer)).unwrap();
    store.create_keyed_table(&schema(), None).unwrap()
}

// =============================================================================
// Insert Throughput
// =============================================================================

fn insert_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("table_insert");
    group.throughput(Throughput::Elements(RECORDS as u64));
    let data = records();

    for (label, transfer) in [("per_unit", TransferMode::PerUnit), ("bulk", TransferMode::Bulk)] {
        let table = table(transfer);
        group.bench_with_input(BenchmarkId::new("store", label), &data, |b, data| {
            b.iter_batched(
                || table.clear().unwrap(),
                |()| {
                    for (key, record) in data.iter().enumerate() {
                        let key = key as i32;
                        table.insert(key, "name", record.name.clone()).unwrap();
                        table.insert(key, "age", record.age.clone()).unwrap();
                        table.insert(key, "height", record.height.clone()).unwrap();
                    }
                },
                BatchSize::PerIteration,
            );
        });
    }

    {
        let table = table(TransferMode::Bulk);
        group.bench_function("store_insert_row", |b| {
            b.iter_batched(
                || table.clear().unwrap(),
                |()| {
                    for (key, record) in data.iter().enumerate() {
                        table
                            .insert_row(
                                key as i32,
                                [record.name.clone(), record.age.clone(), record.height.clone()],
                            )
                            .unwrap();
                    }
                },
                BatchSize::PerIteration,
            );
        });
    }

    group.bench_function("hashmap", |b| {
        b.iter(|| {
            let mut map = HashMap::with_capacity(RECORDS);
            for (key, record) in data.iter().enumerate() {
                map.insert(
                    key as i32,
                    (record.name.clone(), record.age.clone(), record.height.clone()),
                );
            }
            black_box(map)
        });
    });

    group.finish();
}

// =============================================================================
// Read Throughput
// =============================================================================

fn read_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("table_read");
    group.throughput(Throughput::Elements(1));

    let table = table(TransferMode::PerUnit);
    for (key, record) in records().into_iter().enumerate() {
        table
            .insert_row(key as i32, [record.name, record.age, record.height])
            .unwrap();
    }

    group.bench_function("get_column", |b| {
        b.iter(|| black_box(table.get(5_000, "name").unwrap()));
    });

    group.bench_function("get_row", |b| {
        let row = table.row(5_000).unwrap();
        b.iter(|| black_box(row.get_row().unwrap()));
    });

    group.bench_function("where_eq", |b| {
        b.iter(|| black_box(table.where_eq("age", 42).unwrap().len()));
    });

    group.finish();
}

criterion_group!(
    name = inserts;
    config = Criterion::default()
        .measurement_time(Duration::from_secs(10))
        .sample_size(10);
    targets = insert_benchmarks
);

criterion_group!(
    name = reads;
    config = Criterion::default().sample_size(50);
    targets = read_benchmarks
);

criterion_main!(inserts, reads);
