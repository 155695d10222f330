//! Destination initialization for one load package
//!
//! Before the first job of a package runs, the destination must be brought
//! to a state where every job can execute: the schema verified, dropped
//! tables removed, the dataset created, storage migrated to the package's
//! schema, and replace-style tables truncated. The same sequence runs a
//! second time against the staging dataset when any table routes through
//! staging.

use std::collections::BTreeSet;

use gantry_core::package::ParsedJobFileName;
use gantry_core::schema::{Schema, SchemaUpdate};
use gantry_dest::JobClient;

use crate::chain::extend_tables_with_table_chain;
use crate::error::LoadResult;

/// Prepare the destination for a load package and return the schema update
/// actually applied to the primary dataset.
///
/// `truncate_filter` and `load_staging_filter` are given hint-resolved table
/// names and decide destination policy per table; `drop_tables` and
/// `truncate_tables` carry explicit requests recorded in the package state.
#[allow(clippy::too_many_arguments)]
pub async fn init_client<TF, SF>(
    client: &dyn JobClient,
    schema: &Schema,
    new_jobs: &[ParsedJobFileName],
    expected_update: &SchemaUpdate,
    truncate_filter: TF,
    load_staging_filter: SF,
    drop_tables: &BTreeSet<String>,
    truncate_tables: &BTreeSet<String>,
) -> LoadResult<SchemaUpdate>
where
    TF: Fn(&str) -> bool,
    SF: Fn(&str) -> bool,
{
    // Jobs can reference tables that never saw data when a package is
    // replayed against an evolved schema; such tables are not materialized.
    // TODO: make the normalize step refuse to emit jobs for no-data tables,
    // then drop this filter
    let tables_no_data: BTreeSet<String> = schema
        .data_tables()
        .filter(|table| !table.has_seen_data())
        .map(|table| table.name.clone())
        .collect();
    let tables_with_jobs: BTreeSet<String> = new_jobs
        .iter()
        .map(|job| job.table_name.clone())
        .filter(|name| !tables_no_data.contains(name))
        .collect();

    let truncate_table_names = extend_tables_with_table_chain(
        schema,
        &tables_with_jobs,
        &tables_with_jobs,
        |name| truncate_filter(name) || truncate_tables.contains(name),
    )?;

    let mut update_tables = tables_with_jobs.clone();
    for name in schema.bookkeeping_table_names() {
        update_tables.insert(name.to_string());
    }

    client.verify_schema(&update_tables, new_jobs).await?;

    let applied_update = init_dataset_and_update_schema(
        client,
        expected_update,
        &update_tables,
        &truncate_table_names,
        drop_tables,
        false,
    )
    .await?;

    if let Some(staging_client) = client.staging_client() {
        let staging_tables = extend_tables_with_table_chain(
            schema,
            &tables_with_jobs,
            &tables_with_jobs,
            &load_staging_filter,
        )?;
        if !staging_tables.is_empty() {
            let mut staging_update_tables = staging_tables.clone();
            staging_update_tables.insert(schema.version_table_name().to_string());
            // Staging data only lives until the chain is merged, so every
            // staging table is truncated up front
            init_dataset_and_update_schema(
                staging_client.as_ref(),
                expected_update,
                &staging_update_tables,
                &staging_tables,
                drop_tables,
                true,
            )
            .await?;
        }
    }

    Ok(applied_update)
}

async fn init_dataset_and_update_schema(
    client: &dyn JobClient,
    expected_update: &SchemaUpdate,
    update_tables: &BTreeSet<String>,
    truncate_tables: &BTreeSet<String>,
    drop_tables: &BTreeSet<String>,
    staging: bool,
) -> LoadResult<SchemaUpdate> {
    let dataset_kind = if staging { "staging dataset" } else { "dataset" };
    log::info!(
        "initializing {} {} on {}",
        dataset_kind,
        client.dataset_name(),
        client.destination_type()
    );

    if !drop_tables.is_empty() && client.is_storage_initialized().await? {
        if client.capabilities().supports_table_drop {
            log::info!(
                "dropping tables {:?} in {}",
                drop_tables,
                client.dataset_name()
            );
            client.drop_tables(drop_tables, true).await?;
        } else {
            log::warn!(
                "{} does not support dropping tables; {:?} left in place in {}",
                client.destination_type(),
                drop_tables,
                client.dataset_name()
            );
        }
    }

    client.initialize_storage(&BTreeSet::new()).await?;

    log::info!("updating schema in {} {}", dataset_kind, client.dataset_name());
    let applied_update = client
        .update_stored_schema(update_tables, expected_update)
        .await?;

    // Truncation must come after the migration so freshly added columns
    // survive on destinations that truncate by rewriting the table
    if !truncate_tables.is_empty() {
        log::info!(
            "truncating {:?} in {}",
            truncate_tables,
            client.dataset_name()
        );
    }
    client.initialize_storage(truncate_tables).await?;

    Ok(applied_update)
}

#[cfg(test)]
#[path = "init_test.rs"]
mod tests;
