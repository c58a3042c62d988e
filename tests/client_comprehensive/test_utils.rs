//! Shared fixtures for the comprehensive suite

use anystore::{Schema, Store, StoreOptions, Tag};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Route store diagnostics to the test output; safe to call repeatedly
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

/// Store with a small region, enough for every test here
pub fn small_store() -> Store {
    init_tracing();
    Store::create(StoreOptions::new().initial_pages(1).maximum_pages(64)).unwrap()
}

/// One column of every tag
pub fn all_tags() -> Schema {
    Schema::new()
        .column("i", Tag::I32)
        .column("f", Tag::F64)
        .column("s", Tag::String)
        .column("b", Tag::Blob)
}

/// Single integer column
pub fn counter_schema() -> Schema {
    Schema::new().column("value", Tag::I32)
}

/// Callback that counts its invocations
pub fn counting() -> (Arc<AtomicUsize>, impl FnMut() + Send + 'static) {
    let hits = Arc::new(AtomicUsize::new(0));
    let inner = Arc::clone(&hits);
    (hits, move || {
        inner.fetch_add(1, Ordering::SeqCst);
    })
}

pub fn hits(counter: &Arc<AtomicUsize>) -> usize {
    counter.load(Ordering::SeqCst)
}
