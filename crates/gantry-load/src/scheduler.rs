//! Worker-slot accounting and job admission
//!
//! The dispatch loop asks two questions each round: how many more jobs may
//! run right now, and which of the pending job files should fill those
//! slots. Both answers depend on the effective parallelism strategy, which
//! is the loader configuration's override when set and the destination's
//! preference otherwise.

use std::collections::BTreeSet;

use gantry_core::package::ParsedJobFileName;
use gantry_dest::{DestinationCapabilities, ParallelismStrategy};

use crate::config::LoaderConfig;
use crate::error::LoadResult;

fn effective_strategy(
    config: &LoaderConfig,
    capabilities: &DestinationCapabilities,
) -> Option<ParallelismStrategy> {
    config
        .parallelism_strategy
        .or(capabilities.loader_parallelism_strategy)
}

/// Number of jobs that may be started on top of the ones already running
pub fn available_worker_slots(
    config: &LoaderConfig,
    capabilities: &DestinationCapabilities,
    running_jobs: &[ParsedJobFileName],
) -> usize {
    let mut max_workers = if effective_strategy(config, capabilities)
        == Some(ParallelismStrategy::Sequential)
    {
        1
    } else {
        config.workers
    };
    if let Some(cap) = capabilities.max_parallel_load_jobs {
        max_workers = max_workers.min(cap);
    }
    max_workers.saturating_sub(running_jobs.len())
}

/// Pick the job files to start next, preserving their order.
///
/// Under the table-sequential strategy at most one job per table is admitted,
/// counting tables that already have a running job as taken. Never returns
/// more than `available_slots` names.
pub fn filter_new_jobs(
    file_names: &[String],
    capabilities: &DestinationCapabilities,
    config: &LoaderConfig,
    running_jobs: &[ParsedJobFileName],
    available_slots: usize,
) -> LoadResult<Vec<String>> {
    if file_names.is_empty() || available_slots == 0 {
        return Ok(Vec::new());
    }

    if effective_strategy(config, capabilities) == Some(ParallelismStrategy::TableSequential) {
        let mut taken_tables: BTreeSet<String> = running_jobs
            .iter()
            .map(|job| job.table_name.clone())
            .collect();
        let mut admitted = Vec::new();
        for file_name in file_names {
            let table_name = ParsedJobFileName::parse(file_name)?.table_name;
            if !taken_tables.contains(&table_name) {
                taken_tables.insert(table_name);
                admitted.push(file_name.clone());
            }
            if admitted.len() >= available_slots {
                break;
            }
        }
        Ok(admitted)
    } else {
        Ok(file_names.iter().take(available_slots).cloned().collect())
    }
}

#[cfg(test)]
#[path = "scheduler_test.rs"]
mod tests;
