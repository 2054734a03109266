//! Fetched rows and column metadata

use super::native::NativeField;
use super::value::DatabaseValue;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// A name-keyed row (column name -> value mapping)
pub type DatabaseRow = HashMap<String, DatabaseValue>;

/// A combined row: addressable by 0-based index and by column name.
///
/// Column names are shared by every row of the same cursor.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Arc<[String]>,
    values: Vec<DatabaseValue>,
}

impl Row {
    pub fn new(columns: Arc<[String]>, values: Vec<DatabaseValue>) -> Self {
        Self { columns, values }
    }

    /// Value at a 0-based column index
    pub fn get(&self, index: usize) -> Option<&DatabaseValue> {
        self.values.get(index)
    }

    /// Value of a named column. When several columns share a name the
    /// right-most one wins, as in a name-keyed container.
    pub fn get_by_name(&self, name: &str) -> Option<&DatabaseValue> {
        self.columns
            .iter()
            .rposition(|column| column == name)
            .and_then(|index| self.values.get(index))
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &[DatabaseValue] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// `(column, value)` pairs in column order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &DatabaseValue)> {
        self.columns
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }

    /// Name-keyed form of the row
    pub fn into_assoc(self) -> DatabaseRow {
        self.columns.iter().cloned().zip(self.values).collect()
    }

    /// Index-keyed form of the row
    pub fn into_values(self) -> Vec<DatabaseValue> {
        self.values
    }
}

/// Canonical column metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMeta {
    pub name: String,
    /// Declared type as reported by the driver
    pub driver_decl_type: String,
    pub table: String,
    /// Width as reported by the driver (see [`NativeField::length`])
    pub len: u64,
    pub precision: u32,
    pub flags: u32,
}

impl From<&NativeField> for ColumnMeta {
    fn from(field: &NativeField) -> Self {
        Self {
            name: field.orgname.clone(),
            driver_decl_type: field.decl_type.clone(),
            table: field.table.clone(),
            len: field.length,
            precision: field.decimals,
            flags: field.flags,
        }
    }
}
