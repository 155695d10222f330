//! Job client trait definition
//!
//! A job client is the destination-side contract for one load: it is opened
//! for a schema and a dataset, prepares storage, runs job files, and records
//! bookkeeping. Implementations must be Send + Sync for async operation.

use crate::capabilities::DestinationCapabilities;
use crate::error::{DestError, DestResult};
use async_trait::async_trait;
use gantry_core::package::ParsedJobFileName;
use gantry_core::schema::{Schema, SchemaUpdate};
use gantry_core::table::{Table, WriteDisposition};
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

#[async_trait]
pub trait JobClient: Send + Sync {
    /// Destination type identifier for logging
    fn destination_type(&self) -> &'static str;

    /// Capabilities this destination publishes up front
    fn capabilities(&self) -> &DestinationCapabilities;

    /// Schema this client was opened with
    fn schema(&self) -> &Schema;

    /// Destination-side namespace this client writes to
    fn dataset_name(&self) -> &str;

    /// Whether the dataset already exists at the destination
    async fn is_storage_initialized(&self) -> DestResult<bool>;

    /// Create the dataset if missing. When it already exists, truncate
    /// `truncate_tables` instead (the set may be empty).
    async fn initialize_storage(&self, truncate_tables: &BTreeSet<String>) -> DestResult<()>;

    /// Destination-side precondition checks for a load attempt: job file
    /// formats must be supported and every referenced table must be defined
    /// in the schema. Failure is fatal for the attempt.
    async fn verify_schema(
        &self,
        only_tables: &BTreeSet<String>,
        new_jobs: &[ParsedJobFileName],
    ) -> DestResult<()>;

    /// Migrate storage to this client's schema, restricted to `only_tables`.
    /// Returns the partial tables actually applied; an empty map when the
    /// schema version is already present at the destination.
    async fn update_stored_schema(
        &self,
        only_tables: &BTreeSet<String>,
        expected_update: &SchemaUpdate,
    ) -> DestResult<SchemaUpdate>;

    /// Drop tables and, when `delete_schema`, forget stored schema versions.
    /// Only called when `capabilities().supports_table_drop`.
    async fn drop_tables(&self, _tables: &BTreeSet<String>, _delete_schema: bool) -> DestResult<()> {
        Err(DestError::NotImplemented {
            backend: self.destination_type().to_string(),
            feature: "drop_tables".to_string(),
        })
    }

    /// Run one job file against this client's dataset, returning rows loaded
    async fn load_job_file(&self, job: &ParsedJobFileName, file_path: &Path) -> DestResult<u64>;

    /// Destination-side finalization for a completed table chain (tables are
    /// hint-resolved, root first). Append-only destinations have nothing to
    /// do here.
    async fn complete_table_chain(&self, _chain: &[Table]) -> DestResult<()> {
        Ok(())
    }

    /// Record a finished load package in the loads bookkeeping table
    async fn complete_load(&self, load_id: &str) -> DestResult<()>;

    /// Row count of an arbitrary query (for tests and diagnostics)
    async fn query_count(&self, _sql: &str) -> DestResult<u64> {
        Err(DestError::NotImplemented {
            backend: self.destination_type().to_string(),
            feature: "query_count".to_string(),
        })
    }

    /// Whether `table` must be truncated before its jobs run. Expects a
    /// hint-resolved table.
    fn should_truncate_before_load(&self, table: &Table) -> bool {
        table.write_disposition == Some(WriteDisposition::Replace)
    }

    /// Whether `table`'s jobs land in the staging dataset first. Expects a
    /// hint-resolved table.
    fn should_load_to_staging(&self, _table: &Table) -> bool {
        false
    }

    /// Client bound to the staging dataset, when the destination keeps one.
    /// Returns None on destinations without staging and on staging clients
    /// themselves.
    fn staging_client(&self) -> Option<Arc<dyn JobClient>> {
        None
    }
}
