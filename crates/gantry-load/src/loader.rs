//! Load step
//!
//! The loader drains pending load packages into a destination. For each
//! package it prepares the destination, dispatches job files under the
//! worker-slot scheduler, finalizes table chains as their last jobs finish,
//! and records the outcome both in package storage and in the destination's
//! loads table.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use gantry_core::package::{JobState, PackageStatus, PackageStorage, ParsedJobFileName};
use gantry_core::schema::{Schema, SchemaUpdate};
use gantry_dest::{DestError, JobClient};
use tokio::task::JoinSet;

use crate::chain::{completed_table_chain, extend_tables_with_table_chain};
use crate::config::LoaderConfig;
use crate::error::{LoadError, LoadResult};
use crate::init::init_client;
use crate::scheduler::{available_worker_slots, filter_new_jobs};

/// Outcome of loading one package
#[derive(Debug, Clone)]
pub struct LoadSummary {
    pub load_id: String,
    pub completed_jobs: usize,
    pub failed_jobs: usize,
    /// Schema update actually applied to the primary dataset
    pub applied_update: SchemaUpdate,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Drives load packages from storage into a destination
pub struct Loader {
    storage: PackageStorage,
    client: Arc<dyn JobClient>,
    config: LoaderConfig,
}

impl Loader {
    pub fn new(storage: PackageStorage, client: Arc<dyn JobClient>, config: LoaderConfig) -> Self {
        Self {
            storage,
            client,
            config,
        }
    }

    /// Load every pending package, oldest first
    pub async fn run(&self) -> LoadResult<Vec<LoadSummary>> {
        let mut summaries = Vec::new();
        for load_id in self.storage.pending_packages()? {
            summaries.push(self.load_package(&load_id).await?);
        }
        Ok(summaries)
    }

    /// Load one package end to end
    pub async fn load_package(&self, load_id: &str) -> LoadResult<LoadSummary> {
        if self.config.workers == 0 {
            return Err(LoadError::InvalidConfig {
                message: "workers must be at least 1".to_string(),
            });
        }
        let started_at = Utc::now();
        let schema = self.storage.schema(load_id)?;
        let package_state = self.storage.package_state(load_id)?;
        log::info!(
            "loading package {} (schema '{}') into {}",
            load_id,
            schema.name,
            self.client.destination_type()
        );

        // Jobs sitting in started_jobs are leftovers of an interrupted run
        for job in self.storage.list_jobs(load_id, JobState::StartedJobs)? {
            log::warn!("re-queueing interrupted job {}", job);
            self.storage.retry_job(load_id, &job)?;
        }

        let new_jobs: Vec<ParsedJobFileName> = self
            .storage
            .list_new_jobs(load_id)?
            .iter()
            .map(|name| ParsedJobFileName::parse(name))
            .collect::<Result<_, _>>()?;
        let expected_update = self.storage.schema_update(load_id)?;

        let client = self.client.as_ref();
        let truncate_filter = |name: &str| {
            schema
                .resolved_table(name)
                .map(|table| client.should_truncate_before_load(&table))
                .unwrap_or(false)
        };
        let staging_filter = |name: &str| {
            schema
                .resolved_table(name)
                .map(|table| client.should_load_to_staging(&table))
                .unwrap_or(false)
        };
        let dropped: BTreeSet<String> = package_state.dropped_tables.iter().cloned().collect();
        let truncated: BTreeSet<String> = package_state.truncated_tables.iter().cloned().collect();

        let applied_update = init_client(
            client,
            &schema,
            &new_jobs,
            &expected_update,
            truncate_filter,
            staging_filter,
            &dropped,
            &truncated,
        )
        .await?;

        let (completed_jobs, failed_jobs) = self.run_jobs(load_id, &schema).await?;
        let aborting = failed_jobs > 0 && self.config.raise_on_failed_jobs;

        if !aborting {
            self.client.complete_load(load_id).await?;
        }

        self.maybe_truncate_staging_dataset(&schema).await;

        let status = if aborting {
            PackageStatus::Aborted
        } else {
            PackageStatus::Loaded
        };
        self.storage.complete_package(load_id, status)?;
        log::info!(
            "package {} finished: {} completed, {} failed, status {}",
            load_id,
            completed_jobs,
            failed_jobs,
            status
        );

        if aborting {
            let message = self
                .storage
                .failed_jobs_infos(load_id)?
                .first()
                .and_then(|info| info.failed_message.clone())
                .unwrap_or_default();
            return Err(LoadError::JobsFailed {
                load_id: load_id.to_string(),
                failed: failed_jobs,
                message,
            });
        }

        Ok(LoadSummary {
            load_id: load_id.to_string(),
            completed_jobs,
            failed_jobs,
            applied_update,
            started_at,
            finished_at: Utc::now(),
        })
    }

    /// Dispatch loop: fill worker slots from new_jobs until the package is
    /// drained, finalizing table chains as their last jobs complete
    async fn run_jobs(&self, load_id: &str, schema: &Schema) -> LoadResult<(usize, usize)> {
        let mut tasks: JoinSet<(ParsedJobFileName, Result<u64, DestError>)> = JoinSet::new();
        let mut in_flight: Vec<ParsedJobFileName> = Vec::new();
        let mut completed = 0usize;
        let mut failed = 0usize;

        loop {
            let slots =
                available_worker_slots(&self.config, self.client.capabilities(), &in_flight);
            if slots > 0 {
                let candidates = self.storage.list_new_jobs(load_id)?;
                let admitted = filter_new_jobs(
                    &candidates,
                    self.client.capabilities(),
                    &self.config,
                    &in_flight,
                    slots,
                )?;
                for file_name in admitted {
                    let job = self.storage.start_job(load_id, &file_name)?;
                    let file_path =
                        self.storage
                            .job_file_path(load_id, JobState::StartedJobs, &file_name);
                    let job_client = self.client_for_table(schema, &job.table_name)?;
                    log::info!("starting job {} for package {}", job, load_id);
                    in_flight.push(job.clone());
                    tasks.spawn(async move {
                        let result = job_client.load_job_file(&job, &file_path).await;
                        (job, result)
                    });
                }
            }

            if in_flight.is_empty() {
                if self.storage.list_new_jobs(load_id)?.is_empty() {
                    break;
                }
                // Nothing running and nothing admitted, so the destination
                // limits allow zero parallel jobs
                return Err(LoadError::InvalidConfig {
                    message: "destination allows no parallel load jobs but jobs remain"
                        .to_string(),
                });
            }

            match tasks.join_next().await {
                Some(Ok((job, Ok(row_count)))) => {
                    log::debug!("job {} loaded {} rows", job, row_count);
                    self.complete_chain_for(load_id, schema, &job).await?;
                    self.storage.complete_job(load_id, &job)?;
                    in_flight.retain(|j| j.file_name() != job.file_name());
                    completed += 1;
                }
                Some(Ok((job, Err(error)))) => {
                    log::warn!("job {} failed: {}", job, error);
                    self.storage.fail_job(load_id, &job, &error.to_string())?;
                    in_flight.retain(|j| j.file_name() != job.file_name());
                    failed += 1;
                }
                Some(Err(join_error)) => {
                    return Err(LoadError::JobPanicked {
                        message: join_error.to_string(),
                    });
                }
                None => {}
            }
        }

        Ok((completed, failed))
    }

    /// Client that should run jobs for `table_name`: the staging client for
    /// staging-routed tables, the primary client otherwise
    fn client_for_table(
        &self,
        schema: &Schema,
        table_name: &str,
    ) -> LoadResult<Arc<dyn JobClient>> {
        let table = schema.resolved_table(table_name)?;
        if self.client.should_load_to_staging(&table) {
            if let Some(staging) = self.client.staging_client() {
                return Ok(staging);
            }
        }
        Ok(Arc::clone(&self.client))
    }

    /// Resolve the table chain of a finishing job and run destination-side
    /// finalization when no other work is left in the chain. Runs before the
    /// job file moves out of started_jobs, so the finishing job identifies
    /// itself via its job id.
    async fn complete_chain_for(
        &self,
        load_id: &str,
        schema: &Schema,
        job: &ParsedJobFileName,
    ) -> LoadResult<()> {
        let root = schema.root_table(&job.table_name)?;
        let root = schema.resolved_table(&root.name)?;
        let all_jobs = self.storage.list_all_jobs_with_states(load_id)?;
        let job_id = job.job_id();
        if let Some(chain) =
            completed_table_chain(schema, &all_jobs, &root, Some(job_id.as_str()))?
        {
            log::debug!(
                "table chain for '{}' complete ({} tables), finalizing",
                root.name,
                chain.len()
            );
            self.client.complete_table_chain(&chain).await?;
        }
        Ok(())
    }

    /// Truncate staging tables after a package finishes. Failures are logged
    /// and swallowed; leftover staging rows never affect loaded data.
    async fn maybe_truncate_staging_dataset(&self, schema: &Schema) {
        if !self.config.truncate_staging_dataset {
            return;
        }
        let Some(staging_client) = self.client.staging_client() else {
            return;
        };
        let data_tables: BTreeSet<String> = schema.data_table_names().into_iter().collect();
        let client = self.client.as_ref();
        let staging_filter = |name: &str| {
            schema
                .resolved_table(name)
                .map(|table| client.should_load_to_staging(&table))
                .unwrap_or(false)
        };
        match extend_tables_with_table_chain(schema, &data_tables, &data_tables, staging_filter) {
            Ok(staging_tables) if !staging_tables.is_empty() => {
                log::info!(
                    "truncating staging dataset {}",
                    staging_client.dataset_name()
                );
                if let Err(error) = staging_client.initialize_storage(&staging_tables).await {
                    log::warn!(
                        "could not truncate staging dataset {}: {}",
                        staging_client.dataset_name(),
                        error
                    );
                }
            }
            Ok(_) => {}
            Err(error) => {
                log::warn!("could not resolve staging tables for truncation: {}", error);
            }
        }
    }
}

#[cfg(test)]
#[path = "loader_test.rs"]
mod tests;
