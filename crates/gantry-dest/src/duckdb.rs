//! DuckDB job client implementation
//!
//! Datasets are DuckDB schemas. The staging client for `<dataset>` writes to
//! `<dataset>_staging` over the same connection, and chain completion merges
//! staging rows into the primary dataset.

use crate::capabilities::DestinationCapabilities;
use crate::error::{DestError, DestResult};
use crate::traits::JobClient;
use async_trait::async_trait;
use duckdb::Connection;
use gantry_core::package::{FileFormat, ParsedJobFileName};
use gantry_core::schema::{Schema, SchemaUpdate};
use gantry_core::table::{Column, ColumnType, Table, WriteDisposition};
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

/// DuckDB-backed job client
pub struct DuckDbJobClient {
    conn: Arc<Mutex<Connection>>,
    dataset: String,
    schema: Schema,
    capabilities: DestinationCapabilities,
    is_staging: bool,
}

impl DuckDbJobClient {
    /// Create a client on an in-memory database
    pub fn in_memory(dataset: impl Into<String>, schema: Schema) -> DestResult<Self> {
        let conn =
            Connection::open_in_memory().map_err(|e| DestError::Connection(e.to_string()))?;
        Ok(Self::from_connection(
            Arc::new(Mutex::new(conn)),
            dataset.into(),
            schema,
        ))
    }

    /// Create a client on a database file
    pub fn from_path(path: &Path, dataset: impl Into<String>, schema: Schema) -> DestResult<Self> {
        let conn = Connection::open(path).map_err(|e| DestError::Connection(e.to_string()))?;
        Ok(Self::from_connection(
            Arc::new(Mutex::new(conn)),
            dataset.into(),
            schema,
        ))
    }

    /// Create from a path string (handles :memory: special case)
    pub fn open(path: &str, dataset: impl Into<String>, schema: Schema) -> DestResult<Self> {
        if path == ":memory:" {
            Self::in_memory(dataset, schema)
        } else {
            Self::from_path(Path::new(path), dataset, schema)
        }
    }

    /// Override the published capabilities (mainly for tests)
    pub fn with_capabilities(mut self, capabilities: DestinationCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Capabilities this backend publishes by default
    pub fn default_capabilities() -> DestinationCapabilities {
        DestinationCapabilities {
            supported_file_formats: vec![FileFormat::Csv, FileFormat::Jsonl],
            recommended_file_size: None,
            loader_parallelism_strategy: None,
            max_parallel_load_jobs: None,
            supports_table_drop: true,
        }
    }

    fn from_connection(conn: Arc<Mutex<Connection>>, dataset: String, schema: Schema) -> Self {
        Self {
            conn,
            dataset,
            schema,
            capabilities: Self::default_capabilities(),
            is_staging: false,
        }
    }

    fn lock_conn(&self) -> DestResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| DestError::MutexPoisoned(e.to_string()))
    }

    fn staging_dataset_name(&self) -> String {
        format!("{}_staging", self.dataset)
    }

    fn qualified(&self, table: &str) -> String {
        format!("{}.{}", quote_ident(&self.dataset), quote_ident(table))
    }

    /// Execute SQL synchronously
    fn execute_sync(&self, sql: &str) -> DestResult<usize> {
        let conn = self.lock_conn()?;
        conn.execute(sql, [])
            .map_err(|e| DestError::Execution(format!("{}: {}", e, sql)))
    }

    /// Query a single i64 synchronously
    fn query_i64_sync(&self, sql: &str) -> DestResult<i64> {
        let conn = self.lock_conn()?;
        conn.query_row(sql, [], |row| row.get(0))
            .map_err(|e| DestError::Execution(format!("{}: {}", e, sql)))
    }

    /// Query a single string column synchronously
    fn query_strings_sync(&self, sql: &str) -> DestResult<Vec<String>> {
        let conn = self.lock_conn()?;
        let mut stmt = conn
            .prepare(sql)
            .map_err(|e| DestError::Execution(e.to_string()))?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(|e| DestError::Execution(e.to_string()))?;
        rows.collect::<Result<Vec<String>, _>>()
            .map_err(|e| DestError::Execution(e.to_string()))
    }

    fn is_storage_initialized_sync(&self) -> DestResult<bool> {
        let sql = format!(
            "SELECT COUNT(*) FROM information_schema.schemata WHERE schema_name = {}",
            quote_str(&self.dataset)
        );
        Ok(self.query_i64_sync(&sql)? > 0)
    }

    /// Column names of a stored table in `dataset`, None when the table does
    /// not exist there
    fn storage_columns_in(
        &self,
        dataset: &str,
        table: &str,
    ) -> DestResult<Option<BTreeSet<String>>> {
        let exists = format!(
            "SELECT COUNT(*) FROM information_schema.tables WHERE table_schema = {} AND table_name = {}",
            quote_str(dataset),
            quote_str(table)
        );
        if self.query_i64_sync(&exists)? == 0 {
            return Ok(None);
        }
        let columns = format!(
            "SELECT column_name FROM information_schema.columns WHERE table_schema = {} AND table_name = {}",
            quote_str(dataset),
            quote_str(table)
        );
        Ok(Some(self.query_strings_sync(&columns)?.into_iter().collect()))
    }

    fn storage_columns(&self, table: &str) -> DestResult<Option<BTreeSet<String>>> {
        self.storage_columns_in(&self.dataset, table)
    }

    /// Whether the version table already records `version_hash` for this
    /// schema name
    fn stored_schema_hash_present(&self, version_hash: &str) -> DestResult<bool> {
        let version_table = self.schema.version_table_name();
        if self.storage_columns(version_table)?.is_none() {
            return Ok(false);
        }
        let sql = format!(
            "SELECT COUNT(*) FROM {} WHERE schema_name = {} AND version_hash = {}",
            self.qualified(version_table),
            quote_str(&self.schema.name),
            quote_str(version_hash)
        );
        Ok(self.query_i64_sync(&sql)? > 0)
    }

    fn create_table_sql(&self, table: &Table, if_not_exists: bool) -> String {
        let columns: Vec<String> = table.complete_columns().map(column_def).collect();
        format!(
            "CREATE TABLE {}{} ({})",
            if if_not_exists { "IF NOT EXISTS " } else { "" },
            self.qualified(&table.name),
            columns.join(", ")
        )
    }

    fn insert_version_row(&self, version_hash: &str) -> DestResult<()> {
        let sql = format!(
            "INSERT INTO {} (version, inserted_at, schema_name, version_hash, schema) \
             VALUES ({}, now(), {}, {}, {})",
            self.qualified(self.schema.version_table_name()),
            self.schema.version,
            quote_str(&self.schema.name),
            quote_str(version_hash),
            quote_str(&self.schema.to_json()?)
        );
        self.execute_sync(&sql)?;
        Ok(())
    }
}

#[async_trait]
impl JobClient for DuckDbJobClient {
    fn destination_type(&self) -> &'static str {
        "duckdb"
    }

    fn capabilities(&self) -> &DestinationCapabilities {
        &self.capabilities
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn dataset_name(&self) -> &str {
        &self.dataset
    }

    async fn is_storage_initialized(&self) -> DestResult<bool> {
        self.is_storage_initialized_sync()
    }

    async fn initialize_storage(&self, truncate_tables: &BTreeSet<String>) -> DestResult<()> {
        if !self.is_storage_initialized_sync()? {
            log::info!("creating dataset {} on duckdb", self.dataset);
            self.execute_sync(&format!("CREATE SCHEMA {}", quote_ident(&self.dataset)))?;
            return Ok(());
        }
        for table_name in truncate_tables {
            log::debug!("truncating table {} in dataset {}", table_name, self.dataset);
            self.execute_sync(&format!("DELETE FROM {}", self.qualified(table_name)))?;
        }
        Ok(())
    }

    async fn verify_schema(
        &self,
        only_tables: &BTreeSet<String>,
        new_jobs: &[ParsedJobFileName],
    ) -> DestResult<()> {
        for job in new_jobs {
            if !self
                .capabilities
                .supported_file_formats
                .contains(&job.file_format)
            {
                return Err(DestError::UnsupportedFileFormat {
                    format: job.file_format,
                    destination: self.destination_type().to_string(),
                });
            }
            if !self.schema.contains_table(&job.table_name) {
                return Err(DestError::SchemaMismatch {
                    table: job.table_name.clone(),
                    reason: format!("job {} references a table missing from the schema", job),
                });
            }
        }
        for table_name in only_tables {
            if !self.schema.contains_table(table_name) {
                return Err(DestError::SchemaMismatch {
                    table: table_name.clone(),
                    reason: "table is in load scope but missing from the schema".to_string(),
                });
            }
        }
        Ok(())
    }

    async fn update_stored_schema(
        &self,
        only_tables: &BTreeSet<String>,
        expected_update: &SchemaUpdate,
    ) -> DestResult<SchemaUpdate> {
        let version_hash = self.schema.version_hash()?;
        if self.stored_schema_hash_present(&version_hash)? {
            log::info!(
                "schema '{}' hash {} already stored in dataset {}, nothing to update",
                self.schema.name,
                version_hash,
                self.dataset
            );
            return Ok(SchemaUpdate::new());
        }

        log::info!(
            "schema '{}' hash {} not found in dataset {}, migrating up to {} tables",
            self.schema.name,
            version_hash,
            self.dataset,
            only_tables.len()
        );
        let mut applied = SchemaUpdate::new();
        for table_name in only_tables {
            let Some(table) = self.schema.table(table_name) else {
                log::debug!("table '{}' not in schema, skipping migration", table_name);
                continue;
            };
            match self.storage_columns(table_name)? {
                None => {
                    let if_not_exists = Schema::is_bookkeeping_table(table_name);
                    self.execute_sync(&self.create_table_sql(table, if_not_exists))?;
                    applied.insert(table_name.clone(), table.clone());
                }
                Some(existing) => {
                    let new_columns: Vec<&Column> = table
                        .complete_columns()
                        .filter(|c| !existing.contains(&c.name))
                        .collect();
                    if new_columns.is_empty() {
                        continue;
                    }
                    for column in &new_columns {
                        let sql = format!(
                            "ALTER TABLE {} ADD COLUMN {}",
                            self.qualified(table_name),
                            column_def(column)
                        );
                        self.execute_sync(&sql)?;
                    }
                    let mut partial = table.clone();
                    partial.columns = new_columns
                        .into_iter()
                        .map(|c| (c.name.clone(), c.clone()))
                        .collect();
                    applied.insert(table_name.clone(), partial);
                }
            }
        }
        if applied.len() != expected_update.len() {
            log::debug!(
                "expected update listed {} tables, applied {}",
                expected_update.len(),
                applied.len()
            );
        }
        self.insert_version_row(&version_hash)?;
        Ok(applied)
    }

    async fn drop_tables(&self, tables: &BTreeSet<String>, delete_schema: bool) -> DestResult<()> {
        for table_name in tables {
            log::debug!("dropping table {} in dataset {}", table_name, self.dataset);
            self.execute_sync(&format!("DROP TABLE IF EXISTS {}", self.qualified(table_name)))?;
        }
        if delete_schema {
            let version_table = self.schema.version_table_name();
            if self.storage_columns(version_table)?.is_some() {
                let sql = format!(
                    "DELETE FROM {} WHERE schema_name = {}",
                    self.qualified(version_table),
                    quote_str(&self.schema.name)
                );
                self.execute_sync(&sql)?;
            }
        }
        Ok(())
    }

    async fn load_job_file(&self, job: &ParsedJobFileName, file_path: &Path) -> DestResult<u64> {
        let path_str = file_path
            .to_str()
            .ok_or_else(|| DestError::InvalidPath(file_path.display().to_string()))?;
        let reader = match job.file_format {
            FileFormat::Csv => format!("read_csv_auto({})", quote_str(path_str)),
            FileFormat::Jsonl => format!("read_json_auto({})", quote_str(path_str)),
        };
        let sql = format!(
            "INSERT INTO {} BY NAME SELECT * FROM {}",
            self.qualified(&job.table_name),
            reader
        );
        let rows = self.execute_sync(&sql)?;
        log::debug!(
            "job {} loaded {} rows into {}.{}",
            job,
            rows,
            self.dataset,
            job.table_name
        );
        Ok(rows as u64)
    }

    async fn complete_table_chain(&self, chain: &[Table]) -> DestResult<()> {
        let staging_dataset = self.staging_dataset_name();
        for table in chain {
            if !self.should_load_to_staging(table) {
                continue;
            }
            // Jobless chain members may not exist yet on either side
            if self.storage_columns_in(&staging_dataset, &table.name)?.is_none() {
                continue;
            }
            if self.storage_columns(&table.name)?.is_none() {
                continue;
            }
            let target = self.qualified(&table.name);
            let staging = format!(
                "{}.{}",
                quote_ident(&staging_dataset),
                quote_ident(&table.name)
            );
            let keys = table.primary_key_columns();
            if !keys.is_empty() {
                let predicate = keys
                    .iter()
                    .map(|k| {
                        format!(
                            "stg.{key} = {table}.{key}",
                            key = quote_ident(k),
                            table = quote_ident(&table.name)
                        )
                    })
                    .collect::<Vec<_>>()
                    .join(" AND ");
                let delete_sql =
                    format!("DELETE FROM {target} USING {staging} AS stg WHERE {predicate}");
                self.execute_sync(&delete_sql)?;
            }
            let rows = self.execute_sync(&format!(
                "INSERT INTO {target} BY NAME SELECT * FROM {staging}"
            ))?;
            log::debug!(
                "merged {} staging rows into {}.{}",
                rows,
                self.dataset,
                table.name
            );
        }
        Ok(())
    }

    async fn complete_load(&self, load_id: &str) -> DestResult<()> {
        let sql = format!(
            "INSERT INTO {} (load_id, schema_name, status, inserted_at, schema_version_hash) \
             VALUES ({}, {}, 0, now(), {})",
            self.qualified(self.schema.loads_table_name()),
            quote_str(load_id),
            quote_str(&self.schema.name),
            quote_str(&self.schema.version_hash()?)
        );
        self.execute_sync(&sql)?;
        log::info!("registered load {} in dataset {}", load_id, self.dataset);
        Ok(())
    }

    async fn query_count(&self, sql: &str) -> DestResult<u64> {
        let count = self.query_i64_sync(&format!("SELECT COUNT(*) FROM ({})", sql))?;
        Ok(count as u64)
    }

    fn should_load_to_staging(&self, table: &Table) -> bool {
        table.write_disposition == Some(WriteDisposition::Merge)
    }

    fn staging_client(&self) -> Option<Arc<dyn JobClient>> {
        if self.is_staging {
            return None;
        }
        Some(Arc::new(Self {
            conn: Arc::clone(&self.conn),
            dataset: self.staging_dataset_name(),
            schema: self.schema.clone(),
            capabilities: self.capabilities.clone(),
            is_staging: true,
        }))
    }
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn quote_str(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

fn sql_type(data_type: ColumnType) -> &'static str {
    match data_type {
        ColumnType::Text => "VARCHAR",
        ColumnType::Bigint => "BIGINT",
        ColumnType::Double => "DOUBLE",
        ColumnType::Bool => "BOOLEAN",
        ColumnType::Timestamp => "TIMESTAMP",
        ColumnType::Date => "DATE",
    }
}

fn column_def(column: &Column) -> String {
    let data_type = match column.data_type {
        Some(dt) => sql_type(dt),
        // Incomplete columns are never materialized; callers filter them out
        None => "VARCHAR",
    };
    format!(
        "{} {}{}",
        quote_ident(&column.name),
        data_type,
        if column.nullable { "" } else { " NOT NULL" }
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use gantry_core::schema::{LOADS_TABLE_NAME, VERSION_TABLE_NAME};
    use std::io::Write;

    fn shop_schema() -> Schema {
        let mut schema = Schema::new("shop");
        schema
            .add_table(
                Table::new("orders")
                    .with_write_disposition(WriteDisposition::Merge)
                    .with_column(Column::new("id", ColumnType::Bigint).primary_key())
                    .with_column(Column::new("name", ColumnType::Text))
                    .with_seen_data(),
            )
            .unwrap();
        schema
    }

    fn set(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    fn update_scope() -> BTreeSet<String> {
        set(&["orders", VERSION_TABLE_NAME, LOADS_TABLE_NAME])
    }

    #[tokio::test]
    async fn test_initialize_creates_dataset() {
        let client = DuckDbJobClient::in_memory("shop", shop_schema()).unwrap();

        assert!(!client.is_storage_initialized().await.unwrap());
        client.initialize_storage(&BTreeSet::new()).await.unwrap();
        assert!(client.is_storage_initialized().await.unwrap());
    }

    #[tokio::test]
    async fn test_update_stored_schema_creates_tables_once() {
        let client = DuckDbJobClient::in_memory("shop", shop_schema()).unwrap();
        client.initialize_storage(&BTreeSet::new()).await.unwrap();

        let applied = client
            .update_stored_schema(&update_scope(), &SchemaUpdate::new())
            .await
            .unwrap();
        assert_eq!(applied.len(), 3);
        assert!(applied.contains_key("orders"));

        let versions = client
            .query_count(&format!("SELECT * FROM shop.{}", VERSION_TABLE_NAME))
            .await
            .unwrap();
        assert_eq!(versions, 1);

        // Same schema hash: second call is a no-op and stores nothing new
        let applied = client
            .update_stored_schema(&update_scope(), &SchemaUpdate::new())
            .await
            .unwrap();
        assert!(applied.is_empty());
        let versions = client
            .query_count(&format!("SELECT * FROM shop.{}", VERSION_TABLE_NAME))
            .await
            .unwrap();
        assert_eq!(versions, 1);
    }

    #[tokio::test]
    async fn test_update_stored_schema_adds_new_columns() {
        let client = DuckDbJobClient::in_memory("shop", shop_schema()).unwrap();
        client.initialize_storage(&BTreeSet::new()).await.unwrap();
        client
            .update_stored_schema(&update_scope(), &SchemaUpdate::new())
            .await
            .unwrap();

        let mut evolved = shop_schema();
        evolved.version = 2;
        evolved.tables.get_mut("orders").unwrap().columns.insert(
            "email".to_string(),
            Column::new("email", ColumnType::Text),
        );
        let evolved_client = DuckDbJobClient {
            conn: Arc::clone(&client.conn),
            dataset: "shop".to_string(),
            schema: evolved,
            capabilities: DuckDbJobClient::default_capabilities(),
            is_staging: false,
        };

        let applied = evolved_client
            .update_stored_schema(&update_scope(), &SchemaUpdate::new())
            .await
            .unwrap();

        let orders_partial = applied.get("orders").unwrap();
        assert_eq!(orders_partial.columns.len(), 1);
        assert!(orders_partial.columns.contains_key("email"));
        // New column queryable, two version rows recorded
        evolved_client
            .query_count("SELECT email FROM shop.orders")
            .await
            .unwrap();
        let versions = evolved_client
            .query_count(&format!("SELECT * FROM shop.{}", VERSION_TABLE_NAME))
            .await
            .unwrap();
        assert_eq!(versions, 2);
    }

    #[tokio::test]
    async fn test_initialize_truncates_when_already_initialized() {
        let client = DuckDbJobClient::in_memory("shop", shop_schema()).unwrap();
        client.initialize_storage(&BTreeSet::new()).await.unwrap();
        client
            .update_stored_schema(&update_scope(), &SchemaUpdate::new())
            .await
            .unwrap();
        client
            .execute_sync("INSERT INTO shop.orders VALUES (1, 'ana')")
            .unwrap();

        client
            .initialize_storage(&set(&["orders"]))
            .await
            .unwrap();

        let rows = client.query_count("SELECT * FROM shop.orders").await.unwrap();
        assert_eq!(rows, 0);
    }

    #[tokio::test]
    async fn test_verify_schema_rejects_unknown_table() {
        let client = DuckDbJobClient::in_memory("shop", shop_schema()).unwrap();
        let job = ParsedJobFileName::parse("ghosts.abc123.0.csv").unwrap();

        let result = client.verify_schema(&BTreeSet::new(), &[job]).await;
        assert!(matches!(
            result.unwrap_err(),
            DestError::SchemaMismatch { .. }
        ));

        let result = client.verify_schema(&set(&["ghosts"]), &[]).await;
        assert!(matches!(
            result.unwrap_err(),
            DestError::SchemaMismatch { .. }
        ));
    }

    #[tokio::test]
    async fn test_verify_schema_rejects_unsupported_format() {
        let mut capabilities = DuckDbJobClient::default_capabilities();
        capabilities.supported_file_formats = vec![FileFormat::Csv];
        let client = DuckDbJobClient::in_memory("shop", shop_schema())
            .unwrap()
            .with_capabilities(capabilities);
        let job = ParsedJobFileName::parse("orders.abc123.0.jsonl").unwrap();

        let result = client.verify_schema(&BTreeSet::new(), &[job]).await;
        assert!(matches!(
            result.unwrap_err(),
            DestError::UnsupportedFileFormat { .. }
        ));
    }

    #[tokio::test]
    async fn test_drop_tables_deletes_schema_versions() {
        let client = DuckDbJobClient::in_memory("shop", shop_schema()).unwrap();
        client.initialize_storage(&BTreeSet::new()).await.unwrap();
        client
            .update_stored_schema(&update_scope(), &SchemaUpdate::new())
            .await
            .unwrap();

        client.drop_tables(&set(&["orders"]), true).await.unwrap();

        assert!(client.query_count("SELECT * FROM shop.orders").await.is_err());
        let versions = client
            .query_count(&format!(
                "SELECT * FROM shop.{} WHERE schema_name = 'shop'",
                VERSION_TABLE_NAME
            ))
            .await
            .unwrap();
        assert_eq!(versions, 0);
    }

    #[tokio::test]
    async fn test_load_job_file_csv() {
        let dir = tempfile::tempdir().unwrap();
        let csv_path = dir.path().join("orders.abc123.0.csv");
        let mut file = std::fs::File::create(&csv_path).unwrap();
        writeln!(file, "id,name").unwrap();
        writeln!(file, "1,ana").unwrap();
        writeln!(file, "2,bo").unwrap();

        let client = DuckDbJobClient::in_memory("shop", shop_schema()).unwrap();
        client.initialize_storage(&BTreeSet::new()).await.unwrap();
        client
            .update_stored_schema(&update_scope(), &SchemaUpdate::new())
            .await
            .unwrap();

        let job = ParsedJobFileName::parse("orders.abc123.0.csv").unwrap();
        let rows = client.load_job_file(&job, &csv_path).await.unwrap();

        assert_eq!(rows, 2);
        let count = client.query_count("SELECT * FROM shop.orders").await.unwrap();
        assert_eq!(count, 2);
    }

    #[tokio::test]
    async fn test_complete_load_records_row() {
        let client = DuckDbJobClient::in_memory("shop", shop_schema()).unwrap();
        client.initialize_storage(&BTreeSet::new()).await.unwrap();
        client
            .update_stored_schema(&update_scope(), &SchemaUpdate::new())
            .await
            .unwrap();

        client.complete_load("1692000000000000").await.unwrap();

        let loads = client
            .query_count(&format!(
                "SELECT * FROM shop.{} WHERE load_id = '1692000000000000' AND status = 0",
                LOADS_TABLE_NAME
            ))
            .await
            .unwrap();
        assert_eq!(loads, 1);
    }

    #[tokio::test]
    async fn test_staging_client_shares_database() {
        let client = DuckDbJobClient::in_memory("shop", shop_schema()).unwrap();
        let staging = client.staging_client().unwrap();

        assert_eq!(staging.dataset_name(), "shop_staging");
        assert!(staging.staging_client().is_none());

        staging.initialize_storage(&BTreeSet::new()).await.unwrap();
        staging
            .update_stored_schema(&set(&["orders", VERSION_TABLE_NAME]), &SchemaUpdate::new())
            .await
            .unwrap();

        // Staging tables visible through the primary client's connection
        let count = client
            .query_count("SELECT * FROM shop_staging.orders")
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_complete_table_chain_merges_staging_rows() {
        let schema = shop_schema();
        let client = DuckDbJobClient::in_memory("shop", schema.clone()).unwrap();
        client.initialize_storage(&BTreeSet::new()).await.unwrap();
        client
            .update_stored_schema(&update_scope(), &SchemaUpdate::new())
            .await
            .unwrap();
        client
            .execute_sync("INSERT INTO shop.orders VALUES (1, 'ana'), (2, 'bo')")
            .unwrap();

        let staging = client.staging_client().unwrap();
        staging.initialize_storage(&BTreeSet::new()).await.unwrap();
        staging
            .update_stored_schema(&set(&["orders", VERSION_TABLE_NAME]), &SchemaUpdate::new())
            .await
            .unwrap();
        client
            .execute_sync("INSERT INTO shop_staging.orders VALUES (2, 'bob'), (3, 'cyn')")
            .unwrap();

        let chain = vec![schema.resolved_table("orders").unwrap()];
        client.complete_table_chain(&chain).await.unwrap();

        let total = client.query_count("SELECT * FROM shop.orders").await.unwrap();
        assert_eq!(total, 3);
        // Row with id 2 was replaced by the staging version
        let updated = client
            .query_count("SELECT * FROM shop.orders WHERE id = 2 AND name = 'bob'")
            .await
            .unwrap();
        assert_eq!(updated, 1);
    }

    #[tokio::test]
    async fn test_complete_table_chain_skips_missing_staging_table() {
        let schema = shop_schema();
        let client = DuckDbJobClient::in_memory("shop", schema.clone()).unwrap();
        client.initialize_storage(&BTreeSet::new()).await.unwrap();
        client
            .update_stored_schema(&update_scope(), &SchemaUpdate::new())
            .await
            .unwrap();

        // No staging dataset exists; chain completion must not fail
        let chain = vec![schema.resolved_table("orders").unwrap()];
        client.complete_table_chain(&chain).await.unwrap();
    }
}
