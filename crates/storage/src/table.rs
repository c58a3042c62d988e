//! Row storage for one table
//!
//! Rows live in a slab addressed by [`RowId`]. Deleted slots go on a free
//! list and are handed out again by the next `create_row`, so a row id is
//! only meaningful until its row is deleted. A `BTreeMap` index maps each
//! row's key to its slot.
//!
//! # Design
//!
//! - Slab + free list: row ids stay small and dense, memory is reused
//! - Key index: O(log n) key lookups, tag-aware ordering from `Value`
//! - Listeners are recorded per table with the row they watch and the
//!   context that owns them; ids come from a per-table counter and are
//!   never reused

use anystore_core::{ContextId, ListenerId, RowId, Value};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use std::collections::BTreeMap;

/// Fixed accounting cost of one live row, on top of its values
pub const ROW_OVERHEAD: usize = 32;

/// One live row
#[derive(Debug, Clone)]
pub struct RowSlot {
    /// Key the row was created under
    pub key: Value,
    /// Column values; `Null` marks an unset column
    pub values: SmallVec<[Value; 4]>,
    /// Listeners watching this row
    pub listeners: SmallVec<[ListenerId; 2]>,
}

impl RowSlot {
    fn new(key: Value) -> Self {
        Self {
            key,
            values: SmallVec::new(),
            listeners: SmallVec::new(),
        }
    }

    fn footprint(&self) -> usize {
        ROW_OVERHEAD
            + self.key.footprint()
            + self.values.iter().map(Value::footprint).sum::<usize>()
    }
}

/// Who is listening, and to which row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerRecord {
    /// Watched row
    pub row: RowId,
    /// Context that registered the listener and receives its notifications
    pub owner: ContextId,
}

/// Storage for one table
#[derive(Debug, Default)]
pub struct Table {
    name: Option<String>,
    rows: Vec<Option<RowSlot>>,
    free: Vec<RowId>,
    index: BTreeMap<Value, RowId>,
    listeners: FxHashMap<ListenerId, ListenerRecord>,
    next_listener: u32,
    used: usize,
}

impl Table {
    /// Create an empty table
    pub fn new(name: Option<String>) -> Self {
        Self {
            name,
            ..Self::default()
        }
    }

    /// Table name, if it was created with one
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Number of live rows
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Check for a table without live rows
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Accounted bytes held by live rows
    pub fn used_bytes(&self) -> usize {
        self.used
    }

    /// Number of registered listeners
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    // ========================================================================
    // Rows
    // ========================================================================

    /// Row id for a key
    pub fn row_id(&self, key: &Value) -> Option<RowId> {
        self.index.get(key).copied()
    }

    /// Key of a live row
    pub fn row_key(&self, row: RowId) -> Option<&Value> {
        self.slot(row).map(|slot| &slot.key)
    }

    /// Look up the row for `key`, allocating one if absent
    ///
    /// Returns the row id and whether a new row was created.
    pub fn create_row(&mut self, key: Value) -> (RowId, bool) {
        if let Some(&id) = self.index.get(&key) {
            return (id, false);
        }
        let slot = RowSlot::new(key.clone());
        self.used += slot.footprint();
        let id = match self.free.pop() {
            Some(id) => {
                self.rows[id.as_usize()] = Some(slot);
                id
            }
            None => {
                self.rows.push(Some(slot));
                RowId::new((self.rows.len() - 1) as u32)
            }
        };
        self.index.insert(key, id);
        (id, true)
    }

    /// Value stored at `(row, column)`; `None` for unset columns and missing rows
    pub fn get(&self, row: RowId, column: usize) -> Option<&Value> {
        self.slot(row)
            .and_then(|slot| slot.values.get(column))
            .filter(|value| !value.is_null())
    }

    /// All stored values of a row, in column order
    ///
    /// The slice may be shorter than the schema when trailing columns were
    /// never set.
    pub fn row_values(&self, row: RowId) -> Option<&[Value]> {
        self.slot(row).map(|slot| slot.values.as_slice())
    }

    /// Store a value and report the listeners to notify
    ///
    /// Returns `None` if the row does not exist.
    pub fn set(
        &mut self,
        row: RowId,
        column: usize,
        value: Value,
    ) -> Option<SmallVec<[(ListenerId, ContextId); 2]>> {
        let slot = self.rows.get_mut(row.as_usize())?.as_mut()?;
        if slot.values.len() <= column {
            let missing = column + 1 - slot.values.len();
            self.used += missing * Value::Null.footprint();
            slot.values.resize(column + 1, Value::Null);
        }
        let added = value.footprint();
        let old = std::mem::replace(&mut slot.values[column], value);
        self.used = self.used + added - old.footprint();

        let listeners = &self.listeners;
        Some(
            slot.listeners
                .iter()
                .filter_map(|id| listeners.get(id).map(|rec| (*id, rec.owner)))
                .collect(),
        )
    }

    /// Delete a row, returning the listeners that were rooted at it with
    /// their owners
    pub fn delete_row(&mut self, row: RowId) -> Option<SmallVec<[(ListenerId, ContextId); 2]>> {
        let slot = self.rows.get_mut(row.as_usize())?.take()?;
        self.used -= slot.footprint();
        self.index.remove(&slot.key);
        self.free.push(row);
        let listeners = &mut self.listeners;
        Some(
            slot.listeners
                .iter()
                .filter_map(|id| listeners.remove(id).map(|rec| (*id, rec.owner)))
                .collect(),
        )
    }

    /// Delete every row, returning all listeners that were rooted at them
    pub fn clear(&mut self) -> Vec<(ListenerId, ContextId)> {
        let ids: Vec<RowId> = self.index.values().copied().collect();
        let mut removed = Vec::new();
        for id in ids {
            if let Some(listeners) = self.delete_row(id) {
                removed.extend(listeners);
            }
        }
        removed
    }

    /// Rows whose `column` equals `value`, as `(row id, key)` pairs
    ///
    /// Compares with [`Value::matches`], so `0.0` finds `-0.0` and `NaN`
    /// finds nothing. A column the row never stored reads as `Null`.
    pub fn where_eq(&self, column: usize, value: &Value) -> Vec<(RowId, Value)> {
        self.index
            .values()
            .filter_map(|&id| {
                let slot = self.slot(id)?;
                let stored = slot.values.get(column).unwrap_or(&Value::Null);
                stored.matches(value).then(|| (id, slot.key.clone()))
            })
            .collect()
    }

    // ========================================================================
    // Listeners
    // ========================================================================

    /// Register a listener on a live row
    pub fn add_listener(&mut self, row: RowId, owner: ContextId) -> Option<ListenerId> {
        let slot = self.rows.get_mut(row.as_usize())?.as_mut()?;
        let id = ListenerId::new(self.next_listener);
        self.next_listener += 1;
        slot.listeners.push(id);
        self.listeners.insert(id, ListenerRecord { row, owner });
        Some(id)
    }

    /// Remove a listener; returns false if it was not registered
    pub fn remove_listener(&mut self, id: ListenerId) -> bool {
        let Some(record) = self.listeners.remove(&id) else {
            return false;
        };
        if let Some(Some(slot)) = self.rows.get_mut(record.row.as_usize()) {
            slot.listeners.retain(|l| *l != id);
        }
        true
    }

    /// Listener record by id
    pub fn listener(&self, id: ListenerId) -> Option<ListenerRecord> {
        self.listeners.get(&id).copied()
    }

    fn slot(&self, row: RowId) -> Option<&RowSlot> {
        self.rows.get(row.as_usize()).and_then(Option::as_ref)
    }
}
