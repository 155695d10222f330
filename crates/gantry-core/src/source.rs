//! Declarative source definitions: named resources with write dispositions
//! and key hints, assembled by plain function calls on values the caller
//! owns. Building a source never touches global state.

use crate::error::{CoreError, CoreResult};
use crate::schema::Schema;
use crate::table::{Column, Table, WriteDisposition};
use serde::{Deserialize, Serialize};

/// One resource a source produces (one root table at the destination)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceSpec {
    /// Resource name; becomes the root table name
    pub name: String,

    /// How loads write this resource's rows
    #[serde(default)]
    pub write_disposition: WriteDisposition,

    /// Primary key column names (required for merge to deduplicate)
    #[serde(default)]
    pub primary_key: Vec<String>,

    /// Column used for incremental cursoring, when the source supports it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor_field: Option<String>,
}

impl ResourceSpec {
    pub fn new(name: impl Into<String>, write_disposition: WriteDisposition) -> Self {
        Self {
            name: name.into(),
            write_disposition,
            primary_key: Vec::new(),
            cursor_field: None,
        }
    }

    pub fn with_primary_key(mut self, columns: &[&str]) -> Self {
        self.primary_key = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn with_cursor_field(mut self, field: impl Into<String>) -> Self {
        self.cursor_field = Some(field.into());
        self
    }
}

/// A named collection of resources
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceDefinition {
    /// Source name; becomes the schema name
    pub name: String,

    resources: Vec<ResourceSpec>,
}

impl SourceDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            resources: Vec::new(),
        }
    }

    /// Register a resource, rejecting duplicates by name
    pub fn add_resource(&mut self, resource: ResourceSpec) -> CoreResult<()> {
        if self.resources.iter().any(|r| r.name == resource.name) {
            return Err(CoreError::DuplicateResource {
                resource: resource.name,
                source_name: self.name.clone(),
            });
        }
        self.resources.push(resource);
        Ok(())
    }

    /// Builder-style variant of [`add_resource`](Self::add_resource)
    pub fn with_resource(mut self, resource: ResourceSpec) -> CoreResult<Self> {
        self.add_resource(resource)?;
        Ok(self)
    }

    pub fn resources(&self) -> &[ResourceSpec] {
        &self.resources
    }

    pub fn resource(&self, name: &str) -> Option<&ResourceSpec> {
        self.resources.iter().find(|r| r.name == name)
    }

    /// Build a load schema with one root table per resource.
    ///
    /// Key and cursor columns are declared as incomplete hints; their data
    /// types are filled in once the first rows arrive.
    pub fn build_schema(&self) -> CoreResult<Schema> {
        let mut schema = Schema::new(&self.name);
        for resource in &self.resources {
            let mut table =
                Table::new(&resource.name).with_write_disposition(resource.write_disposition);
            for key_column in &resource.primary_key {
                table = table.with_column(Column::incomplete(key_column).primary_key());
            }
            if let Some(cursor) = &resource.cursor_field {
                if !resource.primary_key.contains(cursor) {
                    table = table.with_column(Column::incomplete(cursor));
                }
            }
            schema.add_table(table)?;
        }
        Ok(schema)
    }
}
