//! Table-chain resolution
//!
//! A table chain is a root table plus all tables nested under it, in
//! root-first order. Chains are the consistency unit for destinations that
//! finalize merge and replace loads in one step: the finalization may only
//! run once every job touching the chain has reached a terminal state.

use std::collections::BTreeSet;

use gantry_core::package::{JobState, PackageStorage, ParsedJobFileName};
use gantry_core::schema::Schema;
use gantry_core::table::Table;

use crate::error::LoadResult;

/// Resolve the completed table chain for `root_table`, or `None` while any
/// job in the chain is still running.
///
/// Tables that never saw data are dropped from the chain. When the root's
/// write disposition does not require the full chain, tables without jobs in
/// this package are dropped as well. A still-running job does not block the
/// chain if its id equals `being_completed_job_id`; callers pass the id of
/// the job they are about to complete so the chain can be finalized before
/// the job file moves out of `started_jobs`.
pub fn completed_table_chain(
    schema: &Schema,
    all_jobs: &[(JobState, ParsedJobFileName)],
    root_table: &Table,
    being_completed_job_id: Option<&str>,
) -> LoadResult<Option<Vec<Table>>> {
    let skip_jobless_table = !schema
        .resolved_write_disposition(&root_table.name)?
        .requires_full_chain();

    let mut table_chain = Vec::new();
    for table in schema.nested_tables(&root_table.name)? {
        let table_jobs = PackageStorage::filter_jobs_for_table(all_jobs, &table.name);
        if !table.has_seen_data() {
            assert!(
                table_jobs.is_empty(),
                "tables that never saw data cannot have load jobs: {}",
                table.name
            );
            continue;
        }
        if table_jobs.is_empty() && skip_jobless_table {
            continue;
        }
        let has_running_job = table_jobs.iter().any(|(state, job)| {
            !state.is_terminal() && being_completed_job_id != Some(job.job_id().as_str())
        });
        if has_running_job {
            return Ok(None);
        }
        table_chain.push(table);
    }
    // Chains are only resolved for roots that have jobs in the package
    assert!(
        !table_chain.is_empty(),
        "resolved an empty table chain for root table '{}'",
        root_table.name
    );
    Ok(Some(table_chain))
}

/// Extend a set of table names with the chains they belong to.
///
/// For each name in `tables` the whole chain of its root is walked; members
/// are kept when they saw data, pass `include_table_filter`, and either have
/// jobs in this package or belong to a chain whose root disposition requires
/// all members present.
pub fn extend_tables_with_table_chain<F>(
    schema: &Schema,
    tables: &BTreeSet<String>,
    tables_with_jobs: &BTreeSet<String>,
    include_table_filter: F,
) -> LoadResult<BTreeSet<String>>
where
    F: Fn(&str) -> bool,
{
    let mut result = BTreeSet::new();
    for table_name in tables {
        let root = schema.root_table(table_name)?;
        let skip_jobless_table = !schema
            .resolved_write_disposition(&root.name)?
            .requires_full_chain();
        for table in schema.nested_tables(&root.name)? {
            if !table.has_seen_data() || !include_table_filter(&table.name) {
                continue;
            }
            if !tables_with_jobs.contains(&table.name) && skip_jobless_table {
                continue;
            }
            result.insert(table.name);
        }
    }
    Ok(result)
}

#[cfg(test)]
#[path = "chain_test.rs"]
mod tests;
