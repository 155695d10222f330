//! Load schema: a named, versioned collection of tables with nesting,
//! write dispositions, and the bookkeeping tables every dataset carries.

use crate::error::{CoreError, CoreResult};
use crate::graph::TableGraph;
use crate::serde_helpers::default_version;
use crate::table::{Column, ColumnType, Table, WriteDisposition};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashSet};

/// Name of the bookkeeping table recording schema migrations
pub const VERSION_TABLE_NAME: &str = "_gantry_version";

/// Name of the bookkeeping table recording completed loads
pub const LOADS_TABLE_NAME: &str = "_gantry_loads";

/// Prefix shared by all bookkeeping tables
pub const BOOKKEEPING_PREFIX: &str = "_gantry";

/// Partial tables (new tables / new columns per table) expected or applied
/// at a destination, keyed by table name
pub type SchemaUpdate = BTreeMap<String, Table>;

/// A load schema: tables keyed by name, plus identity and version
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schema {
    /// Schema name; also the default dataset name component
    pub name: String,

    /// Monotonic version, bumped by the producer on every content change
    #[serde(default = "default_version")]
    pub version: u64,

    /// Tables keyed by name
    #[serde(default)]
    pub tables: BTreeMap<String, Table>,
}

impl Schema {
    /// Create an empty schema seeded with the bookkeeping tables
    pub fn new(name: impl Into<String>) -> Self {
        let mut schema = Self {
            name: name.into(),
            version: 1,
            tables: BTreeMap::new(),
        };
        schema.ensure_bookkeeping_tables();
        schema
    }

    /// Parse a schema from YAML, seeding bookkeeping tables when absent
    pub fn from_yaml(content: &str) -> CoreResult<Self> {
        let mut schema: Schema = serde_yaml::from_str(content)?;
        schema.ensure_bookkeeping_tables();
        Ok(schema)
    }

    /// Render the schema as YAML
    pub fn to_yaml(&self) -> CoreResult<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Parse a schema from JSON, seeding bookkeeping tables when absent
    pub fn from_json(content: &str) -> CoreResult<Self> {
        let mut schema: Schema = serde_json::from_str(content)?;
        schema.ensure_bookkeeping_tables();
        Ok(schema)
    }

    /// Render the schema as JSON
    pub fn to_json(&self) -> CoreResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    fn ensure_bookkeeping_tables(&mut self) {
        self.tables
            .entry(VERSION_TABLE_NAME.to_string())
            .or_insert_with(version_table);
        self.tables
            .entry(LOADS_TABLE_NAME.to_string())
            .or_insert_with(loads_table);
    }

    /// Whether `name` is a bookkeeping table rather than a data table
    pub fn is_bookkeeping_table(name: &str) -> bool {
        name.starts_with(BOOKKEEPING_PREFIX)
    }

    /// Stable name of the schema-migration bookkeeping table
    pub fn version_table_name(&self) -> &'static str {
        VERSION_TABLE_NAME
    }

    /// Stable name of the completed-loads bookkeeping table
    pub fn loads_table_name(&self) -> &'static str {
        LOADS_TABLE_NAME
    }

    /// Names of the bookkeeping tables
    pub fn bookkeeping_table_names(&self) -> Vec<&'static str> {
        vec![VERSION_TABLE_NAME, LOADS_TABLE_NAME]
    }

    /// Add a table, rejecting duplicates
    pub fn add_table(&mut self, table: Table) -> CoreResult<()> {
        if self.tables.contains_key(&table.name) {
            return Err(CoreError::DuplicateTable { name: table.name });
        }
        self.tables.insert(table.name.clone(), table);
        Ok(())
    }

    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.get(name)
    }

    pub fn contains_table(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    /// Look up a table, failing when it is not defined
    pub fn require_table(&self, name: &str) -> CoreResult<&Table> {
        self.tables
            .get(name)
            .ok_or_else(|| CoreError::TableNotFound {
                name: name.to_string(),
            })
    }

    /// All tables, in name order
    pub fn tables(&self) -> impl Iterator<Item = &Table> {
        self.tables.values()
    }

    /// All table names, in name order
    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(|n| n.as_str())
    }

    /// Tables that carry loaded data (everything except bookkeeping tables)
    pub fn data_tables(&self) -> impl Iterator<Item = &Table> {
        self.tables
            .values()
            .filter(|t| !Self::is_bookkeeping_table(&t.name))
    }

    /// Names of all data tables
    pub fn data_table_names(&self) -> Vec<String> {
        self.data_tables().map(|t| t.name.clone()).collect()
    }

    /// Build and validate the nesting graph for this schema
    pub fn graph(&self) -> CoreResult<TableGraph> {
        TableGraph::build(self)
    }

    /// Walk parent references up to the root table of `name`
    pub fn root_table(&self, name: &str) -> CoreResult<&Table> {
        let mut current = self.require_table(name)?;
        let mut visited = HashSet::new();
        visited.insert(current.name.as_str());

        while let Some(parent) = &current.parent {
            if !visited.insert(parent.as_str()) {
                return Err(CoreError::CircularNesting {
                    cycle: format!("{} -> {}", current.name, parent),
                });
            }
            current = self
                .tables
                .get(parent)
                .ok_or_else(|| CoreError::UnknownParent {
                    table: current.name.clone(),
                    parent: parent.clone(),
                })?;
        }
        Ok(current)
    }

    /// Effective write disposition of `name`: its own when set, otherwise the
    /// nearest ancestor's, otherwise the default (append)
    pub fn resolved_write_disposition(&self, name: &str) -> CoreResult<WriteDisposition> {
        let mut current = self.require_table(name)?;
        let mut visited = HashSet::new();
        visited.insert(current.name.as_str());

        loop {
            if let Some(disposition) = current.write_disposition {
                return Ok(disposition);
            }
            let Some(parent) = &current.parent else {
                return Ok(WriteDisposition::default());
            };
            if !visited.insert(parent.as_str()) {
                return Err(CoreError::CircularNesting {
                    cycle: format!("{} -> {}", current.name, parent),
                });
            }
            current = self
                .tables
                .get(parent)
                .ok_or_else(|| CoreError::UnknownParent {
                    table: current.name.clone(),
                    parent: parent.clone(),
                })?;
        }
    }

    /// Clone of a table with inherited hints filled in (write disposition)
    pub fn resolved_table(&self, name: &str) -> CoreResult<Table> {
        let mut table = self.require_table(name)?.clone();
        table.write_disposition = Some(self.resolved_write_disposition(name)?);
        Ok(table)
    }

    /// The table chain rooted at `root`: hint-resolved clones, root first,
    /// then descendants in pre-order (parents always before their children)
    pub fn nested_tables(&self, root: &str) -> CoreResult<Vec<Table>> {
        let graph = self.graph()?;
        let names = graph.nested_tables(root)?;
        names
            .iter()
            .map(|name| self.resolved_table(name))
            .collect()
    }

    /// Content hash of the schema (name and tables; the version counter is
    /// excluded so re-publishing identical content keeps the same hash)
    pub fn version_hash(&self) -> CoreResult<String> {
        let content = serde_json::to_string(&serde_json::json!({
            "name": self.name,
            "tables": self.tables,
        }))?;
        let mut hasher = Sha256::new();
        hasher.update(content.as_bytes());
        Ok(format!("{:x}", hasher.finalize()))
    }
}

/// Definition of the schema-migration bookkeeping table
fn version_table() -> Table {
    Table::new(VERSION_TABLE_NAME)
        .with_column(Column::new("version", ColumnType::Bigint).not_null())
        .with_column(Column::new("inserted_at", ColumnType::Timestamp).not_null())
        .with_column(Column::new("schema_name", ColumnType::Text).not_null())
        .with_column(Column::new("version_hash", ColumnType::Text).not_null())
        .with_column(Column::new("schema", ColumnType::Text).not_null())
        .with_seen_data()
}

/// Definition of the completed-loads bookkeeping table
fn loads_table() -> Table {
    Table::new(LOADS_TABLE_NAME)
        .with_column(Column::new("load_id", ColumnType::Text).not_null())
        .with_column(Column::new("schema_name", ColumnType::Text))
        .with_column(Column::new("status", ColumnType::Bigint).not_null())
        .with_column(Column::new("inserted_at", ColumnType::Timestamp).not_null())
        .with_column(Column::new("schema_version_hash", ColumnType::Text))
        .with_seen_data()
}

#[cfg(test)]
#[path = "schema_test.rs"]
mod tests;
