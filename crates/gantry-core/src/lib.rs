//! gantry-core - Core library for Gantry
//!
//! This crate provides the schema model (tables, nesting, write
//! dispositions), the table nesting graph, load package storage with job
//! lifecycle states, and declarative source definitions used across all
//! Gantry components.

pub mod error;
pub mod graph;
pub mod package;
pub mod schema;
pub(crate) mod serde_helpers;
pub mod source;
pub mod table;

pub use error::{CoreError, CoreResult};
pub use graph::TableGraph;
pub use package::{
    FileFormat, JobState, LoadJobInfo, PackageCompletion, PackageState, PackageStatus,
    PackageStorage, ParsedJobFileName,
};
pub use schema::{Schema, SchemaUpdate, LOADS_TABLE_NAME, VERSION_TABLE_NAME};
pub use source::{ResourceSpec, SourceDefinition};
pub use table::{Column, ColumnType, Table, WriteDisposition};
