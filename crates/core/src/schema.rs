//! Table schemas and column maps
//!
//! A [`Schema`] is the caller-supplied description of a table: column names
//! with their declared tags, in order. A [`ColumnMap`] is built from it once
//! when a table is opened and never changes for that handle.

use crate::error::{Error, Result};
use crate::value::{Tag, Value};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// Ordered list of `(column name, declared tag)` pairs
///
/// ```
/// use anystore_core::{Schema, Tag};
///
/// let schema = Schema::new()
///     .column("name", Tag::String)
///     .column("age", Tag::I32);
/// assert_eq!(schema.len(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    columns: Vec<(String, Tag)>,
}

impl Schema {
    /// Empty schema
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a column
    pub fn column(mut self, name: impl Into<String>, tag: Tag) -> Self {
        self.columns.push((name.into(), tag));
        self
    }

    /// Number of columns
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Check for a schema without columns
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Columns in declaration order
    pub fn iter(&self) -> impl Iterator<Item = (&str, Tag)> {
        self.columns.iter().map(|(name, tag)| (name.as_str(), *tag))
    }
}

impl<S: Into<String>> FromIterator<(S, Tag)> for Schema {
    fn from_iter<I: IntoIterator<Item = (S, Tag)>>(iter: I) -> Self {
        Self {
            columns: iter.into_iter().map(|(n, t)| (n.into(), t)).collect(),
        }
    }
}

/// One resolved column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    /// Column name
    pub name: String,
    /// Position in the row, as sent to the engine
    pub index: usize,
    /// Declared tag
    pub tag: Tag,
}

impl Column {
    /// Verify that `value` may be stored in this column
    ///
    /// `Null` is accepted for every column; it is how a column is unset.
    pub fn check(&self, value: &Value) -> Result<()> {
        let actual = value.tag();
        if actual == self.tag || actual == Tag::Null {
            Ok(())
        } else {
            Err(Error::TypeMismatch {
                column: self.name.clone(),
                expected: self.tag,
                actual,
            })
        }
    }
}

/// Insertion-ordered mapping from column name to `(index, tag)`
#[derive(Debug, Clone)]
pub struct ColumnMap {
    columns: Vec<Column>,
    by_name: FxHashMap<String, usize>,
}

impl ColumnMap {
    /// Build the map for a schema
    ///
    /// Indices follow the order in which columns were declared.
    pub fn from_schema(schema: &Schema) -> Result<Self> {
        let mut columns = Vec::with_capacity(schema.len());
        let mut by_name =
            FxHashMap::with_capacity_and_hasher(schema.len(), Default::default());
        for (index, (name, tag)) in schema.iter().enumerate() {
            if by_name.insert(name.to_string(), index).is_some() {
                return Err(Error::DuplicateColumn {
                    column: name.to_string(),
                });
            }
            columns.push(Column {
                name: name.to_string(),
                index,
                tag,
            });
        }
        Ok(Self { columns, by_name })
    }

    /// Number of columns
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Check for a map without columns
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Look up a column by name
    pub fn get(&self, name: &str) -> Option<&Column> {
        self.by_name.get(name).map(|&i| &self.columns[i])
    }

    /// Look up a column by index
    pub fn at(&self, index: usize) -> Option<&Column> {
        self.columns.get(index)
    }

    /// Columns in index order
    pub fn iter(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter()
    }

    /// Resolve a column reference, failing on unknown names or indices
    pub fn resolve<C: ColumnRef>(&self, column: C) -> Result<&Column> {
        column.resolve(self)
    }

    /// Verify a full row of values against the declared tags
    pub fn check_row(&self, values: &[Value]) -> Result<()> {
        if values.len() != self.columns.len() {
            return Err(Error::ArityMismatch {
                expected: self.columns.len(),
                actual: values.len(),
            });
        }
        for (column, value) in self.columns.iter().zip(values) {
            column.check(value)?;
        }
        Ok(())
    }
}

/// Anything that can name a column: its name or its index
pub trait ColumnRef {
    /// Find the column in `map`
    fn resolve<'m>(&self, map: &'m ColumnMap) -> Result<&'m Column>;
}

impl ColumnRef for &str {
    fn resolve<'m>(&self, map: &'m ColumnMap) -> Result<&'m Column> {
        map.get(self).ok_or_else(|| Error::UnknownColumn {
            column: (*self).to_string(),
        })
    }
}

impl ColumnRef for &String {
    fn resolve<'m>(&self, map: &'m ColumnMap) -> Result<&'m Column> {
        self.as_str().resolve(map)
    }
}

impl ColumnRef for usize {
    fn resolve<'m>(&self, map: &'m ColumnMap) -> Result<&'m Column> {
        map.at(*self).ok_or(Error::ColumnOutOfRange {
            index: *self,
            len: map.len(),
        })
    }
}
