//! Values come back from the engine exactly as they were sent

use crate::test_utils::*;
use anystore::engine::{Module, NativeModule, SharedMemory};
use anystore::{ContextId, HostImports, Marshaller, StoreOptions, TransferMode, Value};
use proptest::prelude::*;
use std::sync::Arc;

fn samples() -> Vec<Value> {
    vec![
        Value::I32(0),
        Value::I32(-1),
        Value::I32(i32::MIN),
        Value::I32(i32::MAX),
        Value::F64(0.0),
        Value::F64(-0.0),
        Value::F64(f64::INFINITY),
        Value::F64(f64::MIN_POSITIVE),
        Value::String(String::new()),
        Value::String("plain".into()),
        Value::String("多言語 ✓ 🦀".into()),
        Value::Blob(Vec::new()),
        Value::Blob((0..=255).collect()),
        Value::Null,
    ]
}

fn same(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::F64(x), Value::F64(y)) => x.to_bits() == y.to_bits(),
        _ => a == b,
    }
}

#[test]
fn test_marshaller_round_trip_both_modes() {
    for transfer in [TransferMode::PerUnit, TransferMode::Bulk] {
        let memory = SharedMemory::new(1, 1).unwrap();
        let exports = NativeModule::default()
            .instantiate(&memory, Arc::new(HostImports::new(ContextId::COORDINATOR)));
        let m = Marshaller::new(exports, transfer);
        for value in samples() {
            let back = m.round_trip(&value);
            assert!(same(&back, &value), "{:?}: {:?} != {:?}", transfer, back, value);
        }
        assert!(matches!(m.round_trip(&Value::F64(f64::NAN)), Value::F64(v) if v.is_nan()));
    }
}

#[test]
fn test_stored_values_round_trip() {
    for transfer in [TransferMode::PerUnit, TransferMode::Bulk] {
        let store = anystore::Store::create(
            StoreOptions::new()
                .initial_pages(1)
                .maximum_pages(4)
                .transfer(transfer),
        )
        .unwrap();
        let table = store.create_keyed_table(&all_tags(), None).unwrap();
        for (key, value) in samples().into_iter().enumerate() {
            let column = match value {
                Value::I32(_) => "i",
                Value::F64(_) => "f",
                Value::String(_) => "s",
                Value::Blob(_) => "b",
                Value::Null => continue,
            };
            table.insert(key as i32, column, value.clone()).unwrap();
            let back = table.get(key as i32, column).unwrap().unwrap();
            assert!(same(&back, &value));
        }
    }
}

#[test]
fn test_string_keys_round_trip() {
    let store = small_store();
    let table = store.create_table(&all_tags(), None).unwrap();
    let key = Value::from("clé 🔑");
    table.row(key.clone()).unwrap().set("i", 1).unwrap();
    let row = table.get_row(key.clone()).unwrap().unwrap();
    assert_eq!(row.key(), &key);
    let found = table.where_eq("i", 1).unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].key(), &key);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_strings_survive_storage(text in any::<String>(), bulk in any::<bool>()) {
        let transfer = if bulk { TransferMode::Bulk } else { TransferMode::PerUnit };
        let store = anystore::Store::create(
            StoreOptions::new().initial_pages(1).maximum_pages(4).transfer(transfer),
        )
        .unwrap();
        let table = store.create_keyed_table(&all_tags(), None).unwrap();
        table.insert(text.as_str(), "s", text.as_str()).unwrap();
        prop_assert_eq!(table.get(text.as_str(), "s").unwrap(), Some(Value::from(text.as_str())));
    }
}
