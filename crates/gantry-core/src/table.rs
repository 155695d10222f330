//! Table schema types: write dispositions, columns, and per-table metadata

use crate::serde_helpers::default_true;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// How new data is written into a destination table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum WriteDisposition {
    /// Append new rows to the existing table
    #[default]
    Append,
    /// Replace the full table contents on every load
    Replace,
    /// Merge new rows into the table using primary keys
    Merge,
}

impl WriteDisposition {
    /// True when nested tables must stay in the table chain even without jobs.
    ///
    /// A replace or merge on the root can require destination work on a
    /// nested table (truncation, staging merge) even if the current package
    /// carries no rows for it.
    pub fn requires_full_chain(&self) -> bool {
        matches!(self, WriteDisposition::Replace | WriteDisposition::Merge)
    }
}

impl std::fmt::Display for WriteDisposition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WriteDisposition::Append => write!(f, "append"),
            WriteDisposition::Replace => write!(f, "replace"),
            WriteDisposition::Merge => write!(f, "merge"),
        }
    }
}

/// Column data types supported by destinations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Text,
    Bigint,
    Double,
    Bool,
    Timestamp,
    Date,
}

impl std::fmt::Display for ColumnType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ColumnType::Text => write!(f, "text"),
            ColumnType::Bigint => write!(f, "bigint"),
            ColumnType::Double => write!(f, "double"),
            ColumnType::Bool => write!(f, "bool"),
            ColumnType::Timestamp => write!(f, "timestamp"),
            ColumnType::Date => write!(f, "date"),
        }
    }
}

/// A single column in a table schema
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Column {
    /// Column name
    pub name: String,

    /// Data type; stays unset until the first rows for this column are seen
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_type: Option<ColumnType>,

    /// Whether NULL values are allowed
    #[serde(default = "default_true")]
    pub nullable: bool,

    /// Whether this column belongs to the primary key
    #[serde(default)]
    pub primary_key: bool,
}

impl Column {
    /// Create a column with a known data type
    pub fn new(name: impl Into<String>, data_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            data_type: Some(data_type),
            nullable: true,
            primary_key: false,
        }
    }

    /// Create a column hint whose data type is not known yet
    pub fn incomplete(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: None,
            nullable: true,
            primary_key: false,
        }
    }

    /// Mark this column as part of the primary key
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    /// Mark this column as NOT NULL
    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// Complete columns have a data type and can be materialized at the destination
    pub fn is_complete(&self) -> bool {
        self.data_type.is_some()
    }
}

/// One table in a load schema
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Table {
    /// Table name
    pub name: String,

    /// Parent table for nested tables; root tables have no parent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,

    /// Write disposition; inherited from the nearest ancestor when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub write_disposition: Option<WriteDisposition>,

    /// Columns keyed by name
    #[serde(default)]
    pub columns: BTreeMap<String, Column>,

    /// Whether any load has ever delivered rows for this table
    #[serde(default)]
    pub seen_data: bool,
}

impl Table {
    /// Create a root table with no explicit write disposition
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: None,
            write_disposition: None,
            columns: BTreeMap::new(),
            seen_data: false,
        }
    }

    /// Create a nested table under `parent`
    pub fn nested(name: impl Into<String>, parent: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: Some(parent.into()),
            write_disposition: None,
            columns: BTreeMap::new(),
            seen_data: false,
        }
    }

    /// Set an explicit write disposition
    pub fn with_write_disposition(mut self, disposition: WriteDisposition) -> Self {
        self.write_disposition = Some(disposition);
        self
    }

    /// Add a column
    pub fn with_column(mut self, column: Column) -> Self {
        self.columns.insert(column.name.clone(), column);
        self
    }

    /// Mark the table as having received data in some load
    pub fn with_seen_data(mut self) -> Self {
        self.seen_data = true;
        self
    }

    pub fn has_seen_data(&self) -> bool {
        self.seen_data
    }

    pub fn is_nested(&self) -> bool {
        self.parent.is_some()
    }

    /// Columns that can be materialized at the destination
    pub fn complete_columns(&self) -> impl Iterator<Item = &Column> {
        self.columns.values().filter(|c| c.is_complete())
    }

    /// Names of complete primary key columns
    pub fn primary_key_columns(&self) -> Vec<&str> {
        self.columns
            .values()
            .filter(|c| c.primary_key && c.is_complete())
            .map(|c| c.name.as_str())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_disposition_default() {
        assert_eq!(WriteDisposition::default(), WriteDisposition::Append);
        assert!(!WriteDisposition::Append.requires_full_chain());
        assert!(WriteDisposition::Replace.requires_full_chain());
        assert!(WriteDisposition::Merge.requires_full_chain());
    }

    #[test]
    fn test_write_disposition_serde_names() {
        let json = serde_json::to_string(&WriteDisposition::Merge).unwrap();
        assert_eq!(json, "\"merge\"");
        assert_eq!(WriteDisposition::Merge.to_string(), "merge");
    }

    #[test]
    fn test_column_completeness() {
        let complete = Column::new("id", ColumnType::Bigint).primary_key();
        let incomplete = Column::incomplete("cursor_ts");

        assert!(complete.is_complete());
        assert!(complete.primary_key);
        assert!(!incomplete.is_complete());
        assert!(incomplete.nullable);
    }

    #[test]
    fn test_primary_key_columns_skip_incomplete() {
        let table = Table::new("orders")
            .with_column(Column::new("id", ColumnType::Bigint).primary_key())
            .with_column(Column::incomplete("sku").primary_key())
            .with_column(Column::new("amount", ColumnType::Double));

        // Incomplete hint columns are not part of the materialized key
        assert_eq!(table.primary_key_columns(), vec!["id"]);
    }

    #[test]
    fn test_table_serde_defaults() {
        let table: Table = serde_json::from_str(r#"{"name": "orders"}"#).unwrap();
        assert!(table.parent.is_none());
        assert!(table.write_disposition.is_none());
        assert!(!table.seen_data);
        assert!(table.columns.is_empty());
    }
}
